//! # dreamstream-core
//!
//! Platform-agnostic core of a two-device audio link.
//!
//! One peer (the sender) streams gated microphone audio to the other (the
//! receiver) over a point-to-point peer connection. Small control messages
//! travel the other way to adjust the capture threshold and to let the
//! listening side record a voice message. Platform backends implement the
//! `Transport`, `CaptureDevice` and `PlaybackDevice` traits and plug into
//! `StreamSession`.
//!
//! ## Architecture
//!
//! ```text
//! dreamstream-core (this crate)
//! ├── traits/       ← Transport, CaptureDevice, PlaybackDevice, ConnectionHandler, SessionDelegate
//! ├── models/       ← StreamError, ConnectionState, StreamConfiguration, Endpoint, Payload, ControlMessage
//! ├── processing/   ← ByteRing, pipe, AudioFrame, RMS level
//! ├── audio/        ← AudioCapture, AudioPlayback
//! ├── connection/   ← EndpointRegistry, ConnectionManager, TransportEvent
//! └── session/      ← RoleController, StreamSession (actor)
//! ```

pub mod audio;
pub mod connection;
pub mod models;
pub mod processing;
pub mod session;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use audio::capture::{AudioCapture, DEFAULT_THRESHOLD};
pub use audio::playback::AudioPlayback;
pub use connection::events::{TransportCallbacks, TransportEvent};
pub use connection::manager::ConnectionManager;
pub use connection::registry::EndpointRegistry;
pub use models::audio_models::{CaptureDiagnostics, LevelCallback, PlaybackDiagnostics, WarnLevelAlert};
pub use models::config::StreamConfiguration;
pub use models::control::ControlMessage;
pub use models::endpoint::Endpoint;
pub use models::error::StreamError;
pub use models::payload::{Payload, PayloadTransferUpdate, TransferStatus};
pub use models::state::{ConnectionState, Role};
pub use processing::frame::AudioFrame;
pub use processing::pipe::{pipe, PipeCloser, PipeReader, PipeWriter};
pub use processing::ring_buffer::ByteRing;
pub use session::actor::{SessionSnapshot, StreamSession};
pub use session::role::RoleController;
pub use traits::audio_device::{CaptureDevice, CaptureStream, PlaybackDevice, PlaybackStream};
pub use traits::connection_handler::ConnectionHandler;
pub use traits::session_delegate::SessionDelegate;
pub use traits::transport::{Strategy, Transport};
