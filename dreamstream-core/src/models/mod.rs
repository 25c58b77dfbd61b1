pub mod audio_models;
pub mod config;
pub mod control;
pub mod endpoint;
pub mod error;
pub mod payload;
pub mod state;
