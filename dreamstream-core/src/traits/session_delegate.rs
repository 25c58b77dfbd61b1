use crate::models::error::StreamError;
use crate::models::state::{ConnectionState, Role};

/// Event delegate for the host (UI surface or headless service).
///
/// All methods are called from the session or pipeline threads, not the UI
/// thread. Implementations should marshal to the UI thread if needed.
pub trait SessionDelegate: Send + Sync {
    /// Called after the local state actually changed (never on a no-op).
    fn on_state_changed(&self, role: Role, state: ConnectionState);

    /// Called for each frame whose RMS volume reaches the warn level while
    /// alerts are enabled. Hosts vibrate or flash here.
    fn on_warn_level_exceeded(&self, volume: f64);

    /// Called when an error is dropped locally (malformed control message,
    /// transport failure).
    fn on_error(&self, error: &StreamError);

    /// Toast-style notice for the user.
    fn on_notice(&self, _message: &str) {}
}
