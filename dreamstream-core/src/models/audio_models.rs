use std::fmt;
use std::sync::Arc;

/// Callback invoked with the RMS volume of a frame that reached the warn level.
pub type LevelCallback = Arc<dyn Fn(f64) + Send + Sync + 'static>;

/// Haptic/visual alert fired when a frame's RMS volume reaches `warn_level`.
#[derive(Clone)]
pub struct WarnLevelAlert {
    pub warn_level: u32,
    pub callback: LevelCallback,
}

impl WarnLevelAlert {
    pub fn new(warn_level: u32, callback: LevelCallback) -> Self {
        Self {
            warn_level,
            callback,
        }
    }

    /// Fire the callback if `volume` reaches the warn level. Returns whether it fired.
    pub fn check(&self, volume: f64) -> bool {
        if volume >= self.warn_level as f64 {
            (self.callback)(volume);
            true
        } else {
            false
        }
    }
}

impl fmt::Debug for WarnLevelAlert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WarnLevelAlert")
            .field("warn_level", &self.warn_level)
            .finish_non_exhaustive()
    }
}

/// Counters for one capture session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptureDiagnostics {
    pub sample_rate: u32,
    pub frame_size: usize,
    pub frames_read: u64,
    pub frames_sent: u64,
    pub frames_gated: u64,
    pub frames_rejected: u64,
    pub bytes_written: u64,
    pub alerts_fired: u64,
    pub last_volume: f64,
}

/// Counters for one playback session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackDiagnostics {
    pub sample_rate: u32,
    pub frame_size: usize,
    pub frames_played: u64,
    pub bytes_played: u64,
    pub alerts_fired: u64,
    pub last_volume: f64,
}
