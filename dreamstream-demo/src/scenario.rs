use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde::Serialize;

use dreamstream_core::{ConnectionState, Role, SessionSnapshot, StreamConfiguration, StreamError, StreamSession};
use dreamstream_loopback::{RadioMedium, RecordingPlaybackDevice, ToneCaptureDevice};

use crate::console_delegate::{CaptureInfo, ConsoleDelegate, PlaybackInfo};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const STREAM_TIME: Duration = Duration::from_millis(800);
const SPEAKER_FRAME_SIZE: usize = 640;

/// Summary printed when the demo finishes.
#[derive(Serialize)]
pub struct DemoReport {
    pub service_id: String,
    pub sender: PeerReport,
    pub receiver: PeerReport,
}

#[derive(Serialize)]
pub struct PeerReport {
    pub role: Role,
    pub states: Vec<ConnectionState>,
    pub alerts: u64,
    pub capture: Option<CaptureInfo>,
    pub playback: Option<PlaybackInfo>,
    pub bytes_heard: usize,
}

/// Load the shared configuration from a JSON file, or use defaults.
pub fn load_config(path: Option<&Path>) -> Result<StreamConfiguration, StreamError> {
    let Some(path) = path else {
        return Ok(StreamConfiguration::default());
    };
    let json = fs::read_to_string(path).map_err(|e| {
        StreamError::ConfigurationFailed(format!("cannot read {}: {}", path.display(), e))
    })?;
    StreamConfiguration::from_json(&json)
}

fn peer_config(base: &StreamConfiguration, role: Role) -> StreamConfiguration {
    StreamConfiguration {
        name: role.name().to_string(),
        role,
        ..base.clone()
    }
}

struct Peer {
    session: StreamSession,
    delegate: Arc<ConsoleDelegate>,
    speaker: Arc<RecordingPlaybackDevice>,
}

impl Peer {
    fn spawn(
        medium: &RadioMedium,
        base: &StreamConfiguration,
        role: Role,
        tone_hz: f64,
    ) -> Result<Self, StreamError> {
        let delegate = ConsoleDelegate::new(role.name());
        let speaker = Arc::new(RecordingPlaybackDevice::new(SPEAKER_FRAME_SIZE));
        let microphone = Arc::new(ToneCaptureDevice::new(tone_hz, 6000).with_pattern(10, 10));
        let session = StreamSession::spawn(
            peer_config(base, role),
            Box::new(medium.transport()),
            microphone,
            speaker.clone(),
            delegate.clone(),
        )?;
        Ok(Self {
            session,
            delegate,
            speaker,
        })
    }

    fn wait(&self, what: &str, predicate: impl Fn(&SessionSnapshot) -> bool) -> Result<SessionSnapshot, StreamError> {
        self.session
            .wait_until(CONNECT_TIMEOUT, predicate)?
            .ok_or_else(|| StreamError::TransportFailure(format!("{} timed out: {}", self.session.role(), what)))
    }

    fn report(mut self, snapshot: SessionSnapshot) -> PeerReport {
        self.session.shutdown();
        PeerReport {
            role: snapshot.role,
            states: self.delegate.states(),
            alerts: self.delegate.alerts(),
            capture: snapshot.capture.map(CaptureInfo::from),
            playback: snapshot.playback.map(PlaybackInfo::from),
            bytes_heard: self.speaker.played_len(),
        }
    }
}

/// Pair a sender and a receiver, stream for a while, adjust the threshold,
/// record a voice message, then shut both down.
pub fn run(base: StreamConfiguration) -> Result<DemoReport, StreamError> {
    base.validate()?;
    let medium = RadioMedium::new();

    let sender = Peer::spawn(&medium, &base, Role::Sender, 440.0)?;
    let receiver = Peer::spawn(&medium, &base, Role::Receiver, 660.0)?;

    sender.session.start_search()?;
    receiver.session.start_search()?;
    sender.wait("connect", |s| s.state == ConnectionState::Connected && s.is_recording)?;
    receiver.wait("connect", |s| s.state == ConnectionState::Connected && s.is_playing)?;
    log::info!("Peers connected over {}", base.service_id);
    thread::sleep(STREAM_TIME);

    let threshold = base.record_threshold + 25;
    receiver.session.set_remote_threshold(threshold)?;
    sender.wait("threshold", |s| s.capture_threshold == threshold)?;
    thread::sleep(STREAM_TIME);

    receiver.session.record_voice_message(true)?;
    sender.wait("voice message", |s| s.is_playing && !s.is_recording)?;
    thread::sleep(STREAM_TIME);
    receiver.session.record_voice_message(false)?;
    let sender_snapshot = sender.wait("resume", |s| s.is_recording)?;
    let receiver_snapshot = receiver.wait("resume", |s| s.is_playing)?;
    thread::sleep(STREAM_TIME);

    let sender_snapshot = sender.session.snapshot().unwrap_or(sender_snapshot);
    let receiver_snapshot = receiver.session.snapshot().unwrap_or(receiver_snapshot);

    Ok(DemoReport {
        service_id: base.service_id,
        sender: sender.report(sender_snapshot),
        receiver: receiver.report(receiver_snapshot),
    })
}
