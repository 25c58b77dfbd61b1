//! # dreamstream-loopback
//!
//! In-process backend for dreamstream-core.
//!
//! Provides:
//! - `RadioMedium` / `LoopbackTransport`: a shared in-memory medium standing
//!   in for the platform peer discovery service
//! - `ScriptedCaptureDevice`, `ToneCaptureDevice`: simulated microphones
//! - `RecordingPlaybackDevice`: a speaker that keeps what it plays
//!
//! ## Usage
//! ```ignore
//! use std::sync::Arc;
//! use dreamstream_core::{Role, StreamConfiguration, StreamSession};
//! use dreamstream_loopback::{RadioMedium, RecordingPlaybackDevice, ToneCaptureDevice};
//!
//! let medium = RadioMedium::new();
//! let config = StreamConfiguration::for_role(Role::Sender);
//! let session = StreamSession::spawn(
//!     config,
//!     Box::new(medium.transport()),
//!     Arc::new(ToneCaptureDevice::new(440.0, 4000)),
//!     Arc::new(RecordingPlaybackDevice::new(640)),
//!     delegate,
//! )?;
//! session.start_search()?;
//! ```

pub mod devices;
pub mod medium;

#[cfg(test)]
mod end_to_end;

pub use devices::{DeviceCounters, RecordingPlaybackDevice, ScriptedCaptureDevice, ToneCaptureDevice};
pub use medium::{LoopbackTransport, RadioMedium};
