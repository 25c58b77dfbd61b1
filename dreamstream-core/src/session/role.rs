//! Sender/receiver role logic layered over the lifecycle manager.
//!
//! The controller owns the local [`ConnectionState`] and at most one capture
//! and one playback pipeline. It reacts to lifecycle events raised by the
//! [`ConnectionManager`] and to control messages from the peer.

use std::sync::Arc;

use crossbeam_channel::Sender;

use crate::audio::capture::AudioCapture;
use crate::audio::playback::AudioPlayback;
use crate::connection::manager::ConnectionManager;
use crate::models::audio_models::{CaptureDiagnostics, PlaybackDiagnostics, WarnLevelAlert};
use crate::models::config::StreamConfiguration;
use crate::models::control::ControlMessage;
use crate::models::endpoint::Endpoint;
use crate::models::error::StreamError;
use crate::models::payload::Payload;
use crate::models::state::{ConnectionState, Role};
use crate::processing::pipe::{pipe, PipeReader};
use crate::session::actor::SessionCommand;
use crate::traits::audio_device::{CaptureDevice, PlaybackDevice};
use crate::traits::connection_handler::ConnectionHandler;
use crate::traits::session_delegate::SessionDelegate;

pub struct RoleController {
    config: StreamConfiguration,
    state: ConnectionState,
    capture_device: Arc<dyn CaptureDevice>,
    playback_device: Arc<dyn PlaybackDevice>,
    delegate: Arc<dyn SessionDelegate>,
    commands: Sender<SessionCommand>,

    recorder: Option<AudioCapture>,
    player: Option<AudioPlayback>,
    player_generation: u64,
    capture_threshold: u32,
    is_recording_voice_msg: bool,

    last_capture: Option<CaptureDiagnostics>,
    last_playback: Option<PlaybackDiagnostics>,
}

impl RoleController {
    pub fn new(
        config: StreamConfiguration,
        capture_device: Arc<dyn CaptureDevice>,
        playback_device: Arc<dyn PlaybackDevice>,
        delegate: Arc<dyn SessionDelegate>,
        commands: Sender<SessionCommand>,
    ) -> Self {
        Self {
            capture_threshold: config.record_threshold,
            config,
            state: ConnectionState::Unknown,
            capture_device,
            playback_device,
            delegate,
            commands,
            recorder: None,
            player: None,
            player_generation: 0,
            is_recording_voice_msg: false,
            last_capture: None,
            last_playback: None,
        }
    }

    pub fn role(&self) -> Role {
        self.config.role
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.as_ref().is_some_and(|r| r.is_recording())
    }

    pub fn is_playing(&self) -> bool {
        self.player.as_ref().is_some_and(|p| p.is_playing())
    }

    pub fn is_recording_voice_msg(&self) -> bool {
        self.is_recording_voice_msg
    }

    /// Threshold applied to the live recorder and to the next one started.
    pub fn capture_threshold(&self) -> u32 {
        self.capture_threshold
    }

    /// Counters of the current capture session, or of the last one stopped.
    pub fn capture_diagnostics(&self) -> Option<CaptureDiagnostics> {
        self.recorder
            .as_ref()
            .map(|r| r.diagnostics())
            .or_else(|| self.last_capture.clone())
    }

    pub fn playback_diagnostics(&self) -> Option<PlaybackDiagnostics> {
        self.player
            .as_ref()
            .map(|p| p.diagnostics())
            .or_else(|| self.last_playback.clone())
    }

    // --- State machine ---

    /// Move to `state`. Setting the current state again is a logged no-op.
    pub fn set_state(&mut self, manager: &mut ConnectionManager, state: ConnectionState) {
        if self.state == state {
            log::debug!("State of {} set to {} but it was already in this state", self.role(), state);
            return;
        }

        log::info!("State of {} set to {}", self.role(), state);
        self.state = state;
        self.on_state_changed(manager);
        self.delegate.on_state_changed(self.role(), state);
    }

    fn on_state_changed(&mut self, manager: &mut ConnectionManager) {
        match self.state {
            ConnectionState::Available => {
                self.stop_audio();
                manager.disconnect_from_all_endpoints();
                manager.stop_discovering();
                manager.stop_advertising();
            }
            ConnectionState::Searching => {
                self.stop_audio();
                manager.disconnect_from_all_endpoints();
                self.restart_search(manager);
            }
            ConnectionState::Connected => {
                manager.stop_discovering();
                manager.stop_advertising();
                if self.role() == Role::Sender {
                    self.start_recording(manager);
                }
            }
            ConnectionState::Unknown => {
                self.stop_audio();
                manager.disconnect_from_all_endpoints();
                manager.stop_all_endpoints();
            }
        }
    }

    /// Re-arm this role's half of the point-to-point search: the sender
    /// restarts advertising, the receiver restarts discovery.
    fn restart_search(&mut self, manager: &mut ConnectionManager) {
        match self.role() {
            Role::Sender => {
                manager.stop_advertising();
                manager.start_advertising();
            }
            Role::Receiver => {
                manager.stop_discovering();
                manager.start_discovering();
            }
        }
    }

    fn on_peer_lost(&mut self, manager: &mut ConnectionManager) {
        match self.state {
            ConnectionState::Searching => {
                log::debug!("Peer lost while searching, restarting search");
                self.restart_search(manager);
            }
            ConnectionState::Connected if !manager.is_connected() => {
                let target = if self.config.auto_reconnect {
                    ConnectionState::Searching
                } else {
                    ConnectionState::Available
                };
                self.delegate.on_notice("Connection lost");
                self.set_state(manager, target);
            }
            state => log::debug!("Peer lost in state {}, nothing to do", state),
        }
    }

    // --- Local intents ---

    pub fn start_search(&mut self, manager: &mut ConnectionManager) {
        self.set_state(manager, ConnectionState::Searching);
    }

    /// Connect/disconnect button: searching or connected goes idle, anything
    /// else starts searching.
    pub fn toggle(&mut self, manager: &mut ConnectionManager) {
        let next = match self.state {
            ConnectionState::Searching | ConnectionState::Connected => ConnectionState::Available,
            ConnectionState::Available | ConnectionState::Unknown => ConnectionState::Searching,
        };
        self.set_state(manager, next);
    }

    /// Ask the peer's recorder to use a new threshold.
    pub fn set_remote_threshold(&mut self, manager: &mut ConnectionManager, threshold: u32) {
        manager.send(Payload::from_bytes(ControlMessage::Threshold(threshold).encode()));
    }

    /// Start (`true`) or finish (`false`) a voice message from the
    /// listening side. The peer mirrors the flip when it receives
    /// `voice;<flag>`.
    pub fn record_voice_message(&mut self, manager: &mut ConnectionManager, recording: bool) {
        self.is_recording_voice_msg = recording;
        if recording && self.is_playing() {
            self.stop_playing();
            self.start_recording(manager);
        } else {
            self.stop_recording();
        }
        manager.send(Payload::from_bytes(ControlMessage::Voice(recording).encode()));
    }

    /// Full teardown into `Unknown`, also when already there.
    pub fn shutdown(&mut self, manager: &mut ConnectionManager) {
        if self.state == ConnectionState::Unknown {
            self.stop_audio();
            manager.stop_all_endpoints();
        } else {
            self.set_state(manager, ConnectionState::Unknown);
        }
    }

    /// Drop the player whose thread just finished, unless a newer one
    /// replaced it meanwhile.
    pub fn playback_finished(&mut self, generation: u64) {
        if generation != self.player_generation {
            log::debug!("Ignoring finish of stale player {}", generation);
            return;
        }
        if self.player.is_some() {
            log::debug!("Player {} finished", generation);
            self.stop_playing();
        }
    }

    // --- Audio ---

    fn start_recording(&mut self, manager: &mut ConnectionManager) {
        if self.is_recording() {
            log::debug!("{} is already recording", self.role());
            return;
        }
        self.stop_recording();

        let (writer, reader) = pipe(self.config.pipe_capacity);
        manager.send(Payload::from_stream(reader));

        let mut recorder = AudioCapture::new(Arc::clone(&self.capture_device), writer)
            .with_threshold(self.capture_threshold)
            .with_frame_probe(&self.config.sample_rates, self.config.fallback_frame_size);
        if let Some(alert) = self.alert() {
            recorder = recorder.with_alert(alert);
        }

        match recorder.start() {
            Ok(()) => {
                log::info!("{} started recording", self.role());
                self.recorder = Some(recorder);
            }
            Err(e) => {
                log::error!("Failed to start recording: {}", e);
                self.delegate.on_error(&e);
            }
        }
    }

    fn stop_recording(&mut self) {
        if let Some(mut recorder) = self.recorder.take() {
            log::info!("{} stopped recording", self.role());
            recorder.stop();
            self.last_capture = Some(recorder.diagnostics());
        }
    }

    fn start_playing(&mut self, stream: PipeReader) {
        self.stop_playing();

        self.player_generation += 1;
        let generation = self.player_generation;
        let commands = self.commands.clone();
        let on_finish = move || {
            if commands.send(SessionCommand::PlaybackFinished(generation)).is_err() {
                log::debug!("Session gone before player {} finished", generation);
            }
        };

        let mut player = AudioPlayback::new(Arc::clone(&self.playback_device), stream, on_finish)
            .with_frame_probe(&self.config.sample_rates, self.config.fallback_frame_size);
        if let Some(alert) = self.alert() {
            player = player.with_alert(alert);
        }

        match player.start() {
            Ok(()) => {
                log::info!("{} started playing", self.role());
                self.player = Some(player);
            }
            Err(e) => {
                log::error!("Failed to start playback: {}", e);
                self.delegate.on_error(&e);
            }
        }
    }

    fn stop_playing(&mut self) {
        if let Some(mut player) = self.player.take() {
            log::info!("{} stopped playing", self.role());
            player.stop();
            self.last_playback = Some(player.diagnostics());
        }
    }

    fn stop_audio(&mut self) {
        self.stop_recording();
        self.stop_playing();
    }

    fn alert(&self) -> Option<WarnLevelAlert> {
        if !self.config.vibration {
            return None;
        }
        let delegate = Arc::clone(&self.delegate);
        Some(WarnLevelAlert::new(
            self.config.warn_level,
            Arc::new(move |volume| delegate.on_warn_level_exceeded(volume)),
        ))
    }

    fn handle_control(&mut self, manager: &mut ConnectionManager, data: &[u8]) {
        let message = match ControlMessage::parse(data) {
            Ok(message) => message,
            Err(e) => {
                log::warn!("Dropping control message: {}", e);
                self.delegate.on_error(&e);
                return;
            }
        };

        log::debug!("{} received {}", self.role(), message);
        match message {
            ControlMessage::Voice(true) => {
                self.is_recording_voice_msg = true;
                self.stop_recording();
            }
            ControlMessage::Voice(false) => {
                self.is_recording_voice_msg = false;
                self.stop_playing();
                self.start_recording(manager);
            }
            ControlMessage::Threshold(threshold) => {
                self.capture_threshold = threshold;
                match self.recorder.as_ref() {
                    Some(recorder) if recorder.is_recording() => recorder.set_threshold(threshold),
                    _ => log::debug!("No active recorder, threshold {} kept for next session", threshold),
                }
            }
        }
    }

    fn report(&self, error: StreamError) {
        log::warn!("{}", error);
        self.delegate.on_error(&error);
    }
}

impl ConnectionHandler for RoleController {
    fn on_receive(&mut self, manager: &mut ConnectionManager, endpoint: Option<&Endpoint>, payload: Payload) {
        if endpoint.is_none() {
            log::debug!("Payload {} from an endpoint that is not established", payload.id());
        }
        match payload {
            Payload::Stream { reader, .. } => self.start_playing(reader),
            Payload::Bytes { data, .. } => self.handle_control(manager, &data),
        }
    }

    fn on_connection_initiated(&mut self, manager: &mut ConnectionManager, endpoint: &Endpoint) {
        manager.accept_connection(endpoint);
    }

    fn on_endpoint_discovered(&mut self, manager: &mut ConnectionManager, endpoint: &Endpoint) {
        manager.stop_discovering();
        manager.connect_to_endpoint(endpoint);
    }

    fn on_endpoint_connected(&mut self, manager: &mut ConnectionManager, endpoint: &Endpoint) {
        self.delegate.on_notice(&format!("Connected to {}", endpoint.name()));
        self.set_state(manager, ConnectionState::Connected);
    }

    fn on_endpoint_disconnected(&mut self, manager: &mut ConnectionManager, endpoint: &Endpoint) {
        log::info!("{} disconnected from {}", self.role(), endpoint);
        self.on_peer_lost(manager);
    }

    fn on_connection_failed(&mut self, manager: &mut ConnectionManager, endpoint: Option<&Endpoint>) {
        let id = endpoint.map(|e| e.id().to_string()).unwrap_or_default();
        self.report(StreamError::TransportFailure(format!("connection to {} failed", id)));
        self.on_peer_lost(manager);
    }

    fn on_advertising_failed(&mut self, _manager: &mut ConnectionManager) {
        self.report(StreamError::TransportFailure("advertising failed".into()));
    }

    fn on_discovery_failed(&mut self, _manager: &mut ConnectionManager) {
        self.report(StreamError::TransportFailure("discovery failed".into()));
    }
}

impl Drop for RoleController {
    fn drop(&mut self) {
        self.stop_audio();
    }
}
