mod console_delegate;
mod scenario;

use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    env_logger::init();

    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = match scenario::load_config(config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            log::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    match scenario::run(config) {
        Ok(report) => match serde_json::to_string_pretty(&report) {
            Ok(json) => {
                println!("{}", json);
                ExitCode::SUCCESS
            }
            Err(e) => {
                log::error!("Failed to encode report: {}", e);
                ExitCode::FAILURE
            }
        },
        Err(e) => {
            log::error!("Demo failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
