use serde::{Deserialize, Serialize};

use super::error::StreamError;
use super::state::Role;

/// Candidate sample rates probed in order; the first one the device accepts wins.
pub const DEFAULT_SAMPLE_RATES: [u32; 6] = [8000, 11025, 16000, 22050, 44100, 48000];

/// Frame size used when no candidate sample rate reports a valid buffer size.
pub const FALLBACK_FRAME_SIZE: usize = 1024;

/// Configuration for one local peer.
///
/// Read-only input from the settings collaborator. Missing JSON fields take
/// their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfiguration {
    /// Local endpoint display name advertised to peers.
    pub name: String,

    /// Service identifier both peers must share (default: `dreamstream<uuid>`).
    pub service_id: String,

    /// Local role (default: receiver).
    pub role: Role,

    /// Initial RMS gate for captured frames (default: 50).
    pub record_threshold: u32,

    /// Fire the warn-level alert on loud frames (default: false).
    pub vibration: bool,

    /// RMS volume at which the alert fires (default: 100).
    pub warn_level: u32,

    /// Candidate sample rates, ascending.
    pub sample_rates: Vec<u32>,

    /// Frame size in bytes when no sample rate probes valid (default: 1024).
    pub fallback_frame_size: usize,

    /// Bytes buffered between capture and transport (default: 64 KiB).
    pub pipe_capacity: usize,

    /// Return to searching instead of available when the peer is lost (default: true).
    pub auto_reconnect: bool,
}

impl StreamConfiguration {
    /// Configuration for `role` with every other field defaulted.
    pub fn for_role(role: Role) -> Self {
        Self {
            name: role.name().to_string(),
            role,
            ..Default::default()
        }
    }

    /// A fresh pairing identifier, as shown to the other peer.
    pub fn generate_service_id() -> String {
        format!("dreamstream{}", uuid::Uuid::new_v4())
    }

    pub fn from_json(json: &str) -> Result<Self, StreamError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| StreamError::ConfigurationFailed(format!("invalid json: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), StreamError> {
        if self.name.is_empty() {
            return Err(StreamError::ConfigurationFailed("name must not be empty".into()));
        }
        if self.service_id.is_empty() {
            return Err(StreamError::ConfigurationFailed(
                "service id must not be empty".into(),
            ));
        }
        if self.sample_rates.is_empty() {
            return Err(StreamError::ConfigurationFailed(
                "at least one sample rate is required".into(),
            ));
        }
        if self.sample_rates.windows(2).any(|w| w[0] >= w[1]) {
            return Err(StreamError::ConfigurationFailed(format!(
                "sample rates must be strictly ascending: {:?}",
                self.sample_rates
            )));
        }
        if self.fallback_frame_size == 0 {
            return Err(StreamError::ConfigurationFailed(
                "fallback frame size must be positive".into(),
            ));
        }
        if self.pipe_capacity < 2 {
            return Err(StreamError::ConfigurationFailed(format!(
                "pipe capacity too small: {}",
                self.pipe_capacity
            )));
        }
        Ok(())
    }
}

impl Default for StreamConfiguration {
    fn default() -> Self {
        Self {
            name: "dreamstream".into(),
            service_id: Self::generate_service_id(),
            role: Role::Receiver,
            record_threshold: 50,
            vibration: false,
            warn_level: 100,
            sample_rates: DEFAULT_SAMPLE_RATES.to_vec(),
            fallback_frame_size: FALLBACK_FRAME_SIZE,
            pipe_capacity: 64 * 1024,
            auto_reconnect: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        let config = StreamConfiguration::default();
        assert!(config.validate().is_ok());
        assert!(config.service_id.starts_with("dreamstream"));
        assert_eq!(config.record_threshold, 50);
    }

    #[test]
    fn generated_service_ids_are_unique() {
        assert_ne!(
            StreamConfiguration::generate_service_id(),
            StreamConfiguration::generate_service_id()
        );
    }

    #[test]
    fn rejects_unsorted_rates() {
        let config = StreamConfiguration {
            sample_rates: vec![16000, 8000],
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(StreamError::ConfigurationFailed(_))
        ));
    }

    #[test]
    fn rejects_empty_service_id() {
        let config = StreamConfiguration {
            service_id: String::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn json_fills_missing_fields() {
        let config = StreamConfiguration::from_json(
            r#"{ "role": "sender", "service_id": "svc1", "warn_level": 300 }"#,
        )
        .unwrap();

        assert_eq!(config.role, Role::Sender);
        assert_eq!(config.service_id, "svc1");
        assert_eq!(config.warn_level, 300);
        assert_eq!(config.record_threshold, 50);
        assert_eq!(config.sample_rates, DEFAULT_SAMPLE_RATES.to_vec());
    }

    #[test]
    fn json_rejects_garbage() {
        assert!(StreamConfiguration::from_json("not json").is_err());
    }

    #[test]
    fn for_role_names_after_role() {
        let config = StreamConfiguration::for_role(Role::Sender);
        assert_eq!(config.name, "sender");
        assert_eq!(config.role, Role::Sender);
    }
}
