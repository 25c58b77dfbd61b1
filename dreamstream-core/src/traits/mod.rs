pub mod audio_device;
pub mod connection_handler;
pub mod session_delegate;
pub mod transport;
