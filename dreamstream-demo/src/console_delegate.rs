use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use dreamstream_core::models::audio_models::{CaptureDiagnostics, PlaybackDiagnostics};
use dreamstream_core::{ConnectionState, Role, SessionDelegate, StreamError};

/// SessionDelegate that prints each event as one JSON line on stdout.
pub struct ConsoleDelegate {
    peer: String,
    states: Mutex<Vec<ConnectionState>>,
    alerts: AtomicU64,
}

impl ConsoleDelegate {
    pub fn new(peer: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            peer: peer.into(),
            states: Mutex::new(Vec::new()),
            alerts: AtomicU64::new(0),
        })
    }

    pub fn states(&self) -> Vec<ConnectionState> {
        self.states.lock().clone()
    }

    pub fn alerts(&self) -> u64 {
        self.alerts.load(Ordering::SeqCst)
    }

    fn emit<T: Serialize>(&self, event: &str, payload: T) {
        let line = EventLine {
            peer: &self.peer,
            event,
            payload,
        };
        match serde_json::to_string(&line) {
            Ok(json) => println!("{}", json),
            Err(e) => log::warn!("Failed to encode {} event: {}", event, e),
        }
    }
}

// -- Event payloads --

#[derive(Serialize)]
struct EventLine<'a, T> {
    peer: &'a str,
    event: &'a str,
    payload: T,
}

#[derive(Serialize)]
struct StateChangedPayload {
    role: Role,
    state: ConnectionState,
}

#[derive(Serialize)]
struct WarnLevelPayload {
    volume: f64,
}

#[derive(Serialize)]
struct MessagePayload {
    message: String,
}

impl SessionDelegate for ConsoleDelegate {
    fn on_state_changed(&self, role: Role, state: ConnectionState) {
        self.states.lock().push(state);
        self.emit("state-changed", StateChangedPayload { role, state });
    }

    fn on_warn_level_exceeded(&self, volume: f64) {
        // Every 25th alert.
        if self.alerts.fetch_add(1, Ordering::SeqCst) % 25 == 0 {
            self.emit("warn-level", WarnLevelPayload { volume });
        }
    }

    fn on_error(&self, error: &StreamError) {
        self.emit(
            "error",
            MessagePayload {
                message: error.to_string(),
            },
        );
    }

    fn on_notice(&self, message: &str) {
        self.emit(
            "notice",
            MessagePayload {
                message: message.to_string(),
            },
        );
    }
}

/// Serializable capture counters.
#[derive(Clone, Serialize)]
pub struct CaptureInfo {
    pub sample_rate: u32,
    pub frame_size: usize,
    pub frames_read: u64,
    pub frames_sent: u64,
    pub frames_gated: u64,
    pub bytes_written: u64,
    pub alerts_fired: u64,
}

impl From<CaptureDiagnostics> for CaptureInfo {
    fn from(d: CaptureDiagnostics) -> Self {
        Self {
            sample_rate: d.sample_rate,
            frame_size: d.frame_size,
            frames_read: d.frames_read,
            frames_sent: d.frames_sent,
            frames_gated: d.frames_gated,
            bytes_written: d.bytes_written,
            alerts_fired: d.alerts_fired,
        }
    }
}

/// Serializable playback counters.
#[derive(Clone, Serialize)]
pub struct PlaybackInfo {
    pub sample_rate: u32,
    pub frame_size: usize,
    pub frames_played: u64,
    pub bytes_played: u64,
    pub alerts_fired: u64,
}

impl From<PlaybackDiagnostics> for PlaybackInfo {
    fn from(d: PlaybackDiagnostics) -> Self {
        Self {
            sample_rate: d.sample_rate,
            frame_size: d.frame_size,
            frames_played: d.frames_played,
            bytes_played: d.bytes_played,
            alerts_fired: d.alerts_fired,
        }
    }
}
