//! Single-consumer session actor.
//!
//! Transport callbacks and local intents arrive on two channels. One thread
//! owns the lifecycle manager, the endpoint registry and the role logic, and
//! handles one message at a time, so none of them need locking.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender};

use crate::connection::events::{TransportCallbacks, TransportEvent};
use crate::connection::manager::ConnectionManager;
use crate::models::audio_models::{CaptureDiagnostics, PlaybackDiagnostics};
use crate::models::config::StreamConfiguration;
use crate::models::error::StreamError;
use crate::models::state::{ConnectionState, Role};
use crate::session::role::RoleController;
use crate::traits::audio_device::{CaptureDevice, PlaybackDevice};
use crate::traits::session_delegate::SessionDelegate;
use crate::traits::transport::{Strategy, Transport};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Local intents delivered to the session thread.
#[derive(Debug)]
pub enum SessionCommand {
    StartSearch,
    Toggle,
    SetState(ConnectionState),
    SetRemoteThreshold(u32),
    RecordVoiceMessage(bool),
    /// Sent from a playback thread when its session ends.
    PlaybackFinished(u64),
    Snapshot(Sender<SessionSnapshot>),
    Shutdown,
}

/// Point-in-time view of a session, taken on the session thread.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub role: Role,
    pub state: ConnectionState,
    pub discovered: Vec<String>,
    pub pending: Vec<String>,
    pub established: Vec<String>,
    pub is_advertising: bool,
    pub is_discovering: bool,
    pub is_connecting: bool,
    pub is_recording: bool,
    pub is_playing: bool,
    pub is_recording_voice_msg: bool,
    pub capture_threshold: u32,
    pub capture: Option<CaptureDiagnostics>,
    pub playback: Option<PlaybackDiagnostics>,
}

/// Handle to a running peer session.
///
/// Every method only enqueues a command; the work happens on the session
/// thread. Once the session has shut down, methods return
/// [`StreamError::SessionClosed`].
pub struct StreamSession {
    role: Role,
    commands: Sender<SessionCommand>,
    handle: Option<thread::JoinHandle<()>>,
}

impl StreamSession {
    pub fn spawn(
        config: StreamConfiguration,
        transport: Box<dyn Transport>,
        capture_device: Arc<dyn CaptureDevice>,
        playback_device: Arc<dyn PlaybackDevice>,
        delegate: Arc<dyn SessionDelegate>,
    ) -> Result<Self, StreamError> {
        config.validate()?;

        let role = config.role;
        let (event_tx, event_rx) = unbounded();
        let (command_tx, command_rx) = unbounded();

        let manager = ConnectionManager::new(
            config.name.clone(),
            config.service_id.clone(),
            Strategy::PointToPoint,
            transport,
            TransportCallbacks::new(event_tx),
        );
        let controller = RoleController::new(
            config,
            capture_device,
            playback_device,
            delegate,
            command_tx.clone(),
        );
        let actor = SessionActor {
            manager,
            role: controller,
            events: event_rx,
            commands: command_rx,
        };

        let handle = thread::Builder::new()
            .name(format!("session-{}", role))
            .spawn(move || actor.run())
            .map_err(|e| StreamError::TransportFailure(format!("failed to spawn session thread: {}", e)))?;

        log::info!("Session for {} started", role);
        Ok(Self {
            role,
            commands: command_tx,
            handle: Some(handle),
        })
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn start_search(&self) -> Result<(), StreamError> {
        self.send(SessionCommand::StartSearch)
    }

    pub fn toggle(&self) -> Result<(), StreamError> {
        self.send(SessionCommand::Toggle)
    }

    pub fn set_state(&self, state: ConnectionState) -> Result<(), StreamError> {
        self.send(SessionCommand::SetState(state))
    }

    /// Send `threshold;<n>` to the peer.
    pub fn set_remote_threshold(&self, threshold: u32) -> Result<(), StreamError> {
        self.send(SessionCommand::SetRemoteThreshold(threshold))
    }

    pub fn record_voice_message(&self, recording: bool) -> Result<(), StreamError> {
        self.send(SessionCommand::RecordVoiceMessage(recording))
    }

    pub fn snapshot(&self) -> Result<SessionSnapshot, StreamError> {
        let (tx, rx) = bounded(1);
        self.send(SessionCommand::Snapshot(tx))?;
        rx.recv().map_err(|_| StreamError::SessionClosed)
    }

    /// Poll snapshots until `predicate` holds or `timeout` elapses.
    /// Returns `None` on timeout.
    pub fn wait_until(
        &self,
        timeout: Duration,
        predicate: impl Fn(&SessionSnapshot) -> bool,
    ) -> Result<Option<SessionSnapshot>, StreamError> {
        let deadline = Instant::now() + timeout;
        loop {
            let snapshot = self.snapshot()?;
            if predicate(&snapshot) {
                return Ok(Some(snapshot));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Tear down into `Unknown` and join the session thread. Idempotent.
    pub fn shutdown(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        if self.commands.send(SessionCommand::Shutdown).is_err() {
            log::debug!("Session for {} already stopped", self.role);
        }
        if handle.join().is_err() {
            log::error!("Session thread for {} panicked", self.role);
        }
    }

    fn send(&self, command: SessionCommand) -> Result<(), StreamError> {
        if self.handle.is_none() {
            return Err(StreamError::SessionClosed);
        }
        self.commands
            .send(command)
            .map_err(|_| StreamError::SessionClosed)
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct SessionActor {
    manager: ConnectionManager,
    role: RoleController,
    events: Receiver<TransportEvent>,
    commands: Receiver<SessionCommand>,
}

impl SessionActor {
    fn run(mut self) {
        loop {
            select! {
                recv(self.events) -> event => match event {
                    Ok(event) => self.manager.handle_event(event, &mut self.role),
                    Err(_) => {
                        log::debug!("Transport event channel closed");
                        break;
                    }
                },
                recv(self.commands) -> command => match command {
                    Ok(SessionCommand::Shutdown) | Err(_) => break,
                    Ok(command) => self.handle_command(command),
                },
            }
        }

        self.role.shutdown(&mut self.manager);
        log::info!("Session for {} stopped", self.role.role());
    }

    fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::StartSearch => self.role.start_search(&mut self.manager),
            SessionCommand::Toggle => self.role.toggle(&mut self.manager),
            SessionCommand::SetState(state) => self.role.set_state(&mut self.manager, state),
            SessionCommand::SetRemoteThreshold(threshold) => {
                self.role.set_remote_threshold(&mut self.manager, threshold)
            }
            SessionCommand::RecordVoiceMessage(recording) => {
                self.role.record_voice_message(&mut self.manager, recording)
            }
            SessionCommand::PlaybackFinished(generation) => self.role.playback_finished(generation),
            SessionCommand::Snapshot(reply) => {
                if reply.send(self.snapshot()).is_err() {
                    log::debug!("Snapshot requester went away");
                }
            }
            SessionCommand::Shutdown => self.role.shutdown(&mut self.manager),
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        let registry = self.manager.registry();
        let sorted = |ids: Vec<&String>| {
            let mut ids: Vec<String> = ids.into_iter().cloned().collect();
            ids.sort();
            ids
        };
        SessionSnapshot {
            role: self.role.role(),
            state: self.role.state(),
            discovered: sorted(registry.discovered().keys().collect()),
            pending: sorted(registry.pending().keys().collect()),
            established: registry.established_ids(),
            is_advertising: self.manager.is_advertising(),
            is_discovering: self.manager.is_discovering(),
            is_connecting: self.manager.is_connecting(),
            is_recording: self.role.is_recording(),
            is_playing: self.role.is_playing(),
            is_recording_voice_msg: self.role.is_recording_voice_msg(),
            capture_threshold: self.role.capture_threshold(),
            capture: self.role.capture_diagnostics(),
            playback: self.role.playback_diagnostics(),
        }
    }
}
