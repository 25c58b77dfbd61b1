//! Two full sessions talking over one medium.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use dreamstream_core::models::config::StreamConfiguration;
use dreamstream_core::models::error::StreamError;
use dreamstream_core::models::state::{ConnectionState, Role};
use dreamstream_core::processing::level::encode_samples;
use dreamstream_core::session::actor::{SessionSnapshot, StreamSession};
use dreamstream_core::traits::session_delegate::SessionDelegate;

use crate::devices::{RecordingPlaybackDevice, ScriptedCaptureDevice, ToneCaptureDevice};
use crate::medium::RadioMedium;

const TIMEOUT: Duration = Duration::from_secs(5);
const FRAME_SIZE: usize = 64;

#[derive(Default)]
struct Observer {
    states: Mutex<Vec<ConnectionState>>,
    errors: Mutex<Vec<StreamError>>,
    alerts: AtomicUsize,
}

impl SessionDelegate for Observer {
    fn on_state_changed(&self, _: Role, state: ConnectionState) {
        self.states.lock().push(state);
    }

    fn on_warn_level_exceeded(&self, _: f64) {
        self.alerts.fetch_add(1, Ordering::SeqCst);
    }

    fn on_error(&self, error: &StreamError) {
        self.errors.lock().push(error.clone());
    }
}

fn frame(value: i16) -> Vec<u8> {
    encode_samples(&[value; FRAME_SIZE / 2])
}

struct Rig {
    medium: RadioMedium,
    sender: StreamSession,
    receiver: StreamSession,
    sender_id: String,
    receiver_id: String,
    sender_mic: Arc<ScriptedCaptureDevice>,
    sender_speaker: Arc<RecordingPlaybackDevice>,
    receiver_mic: Arc<ToneCaptureDevice>,
    receiver_speaker: Arc<RecordingPlaybackDevice>,
    receiver_observer: Arc<Observer>,
}

impl Rig {
    fn new(script: Vec<Vec<u8>>) -> Self {
        let medium = RadioMedium::new();

        let sender_mic = Arc::new(ScriptedCaptureDevice::new(FRAME_SIZE, script));
        let sender_speaker = Arc::new(RecordingPlaybackDevice::new(FRAME_SIZE));
        let receiver_mic = Arc::new(ToneCaptureDevice::new(440.0, 8000).with_pattern(1, 0));
        let receiver_speaker = Arc::new(RecordingPlaybackDevice::new(FRAME_SIZE));
        let receiver_observer = Arc::new(Observer::default());

        let sender_transport = medium.transport();
        let sender_id = sender_transport.id().to_string();
        let mut config = StreamConfiguration::for_role(Role::Sender);
        config.service_id = "svc1".into();
        let sender = StreamSession::spawn(
            config,
            Box::new(sender_transport),
            sender_mic.clone(),
            sender_speaker.clone(),
            Arc::new(Observer::default()),
        )
        .unwrap();

        let receiver_transport = medium.transport();
        let receiver_id = receiver_transport.id().to_string();
        let mut config = StreamConfiguration::for_role(Role::Receiver);
        config.service_id = "svc1".into();
        let receiver = StreamSession::spawn(
            config,
            Box::new(receiver_transport),
            receiver_mic.clone(),
            receiver_speaker.clone(),
            receiver_observer.clone(),
        )
        .unwrap();

        Self {
            medium,
            sender,
            receiver,
            sender_id,
            receiver_id,
            sender_mic,
            sender_speaker,
            receiver_mic,
            receiver_speaker,
            receiver_observer,
        }
    }

    /// Both peers search, connect, and the receiver starts playing.
    fn connected(script: Vec<Vec<u8>>) -> Self {
        let rig = Self::new(script);
        rig.sender.start_search().unwrap();
        rig.receiver.start_search().unwrap();
        wait(&rig.sender, |s| s.state == ConnectionState::Connected && s.is_recording);
        wait(&rig.receiver, |s| s.state == ConnectionState::Connected && s.is_playing);
        wait_for(|| rig.sender_mic.counters().opens() == 1);
        rig
    }
}

fn wait(session: &StreamSession, predicate: impl Fn(&SessionSnapshot) -> bool) -> SessionSnapshot {
    session
        .wait_until(TIMEOUT, predicate)
        .unwrap()
        .expect("session did not reach the expected state")
}

fn wait_for(condition: impl Fn() -> bool) {
    let deadline = Instant::now() + TIMEOUT;
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached");
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn streams_loud_frames_byte_for_byte() {
    let script = vec![
        frame(1000),
        frame(10),
        frame(2000),
        frame(0),
        frame(-500),
        frame(50),
        frame(49),
    ];
    let expected: Vec<u8> = [frame(1000), frame(2000), frame(-500), frame(50)].concat();

    let rig = Rig::connected(script);

    let receiver = rig.receiver.snapshot().unwrap();
    assert_eq!(receiver.discovered, vec![rig.sender_id.clone()]);
    assert_eq!(receiver.established, vec![rig.sender_id.clone()]);
    assert!(receiver.pending.is_empty());
    let sender = rig.sender.snapshot().unwrap();
    assert_eq!(sender.established, vec![rig.receiver_id.clone()]);
    assert!(!sender.is_advertising);

    wait_for(|| rig.sender_mic.remaining() == 0 && rig.receiver_speaker.played_len() >= expected.len());
    thread::sleep(Duration::from_millis(50));
    assert_eq!(rig.receiver_speaker.played(), expected);

    let capture = rig.sender.snapshot().unwrap().capture.unwrap();
    assert_eq!(capture.frames_sent, 4);
    assert_eq!(capture.frame_size, FRAME_SIZE);
    assert_eq!(capture.sample_rate, 8000);
}

#[test]
fn remote_threshold_updates_live_capture() {
    let rig = Rig::connected(Vec::new());

    rig.receiver.set_remote_threshold(75).unwrap();
    let sender = wait(&rig.sender, |s| s.capture_threshold == 75);

    assert!(sender.is_recording);
    assert_eq!(rig.sender_mic.counters().opens(), 1);
    assert_eq!(rig.sender_mic.counters().releases(), 0);
}

#[test]
fn spurious_disconnect_is_ignored() {
    let rig = Rig::connected(Vec::new());
    let states_before = rig.receiver_observer.states.lock().clone();

    rig.medium.spurious_disconnect(&rig.receiver_id, "ghost");
    thread::sleep(Duration::from_millis(100));

    let receiver = rig.receiver.snapshot().unwrap();
    assert_eq!(receiver.state, ConnectionState::Connected);
    assert_eq!(receiver.established, vec![rig.sender_id.clone()]);
    assert!(receiver.is_playing);
    assert_eq!(*rig.receiver_observer.states.lock(), states_before);
}

#[test]
fn voice_message_flips_directions() {
    let rig = Rig::connected(Vec::new());

    rig.receiver.record_voice_message(true).unwrap();
    wait(&rig.receiver, |s| s.is_recording && !s.is_playing && s.is_recording_voice_msg);
    wait(&rig.sender, |s| s.is_playing && !s.is_recording && s.is_recording_voice_msg);
    wait_for(|| rig.sender_speaker.played_len() > 0);

    rig.receiver.record_voice_message(false).unwrap();
    wait(&rig.receiver, |s| !s.is_recording && s.is_playing);
    wait(&rig.sender, |s| s.is_recording && !s.is_playing);
    wait_for(|| rig.sender_mic.counters().opens() == 2);

    assert_eq!(rig.receiver_mic.counters().opens(), 1);
    assert_eq!(rig.receiver_mic.counters().releases(), 1);
}

#[test]
fn reconnects_after_link_loss() {
    let rig = Rig::connected(Vec::new());

    rig.medium.break_link(&rig.sender_id, &rig.receiver_id);
    wait_for(|| rig.sender_mic.counters().opens() == 2);
    wait(&rig.sender, |s| s.state == ConnectionState::Connected && s.is_recording);
    wait(&rig.receiver, |s| s.state == ConnectionState::Connected && s.is_playing);

    assert_eq!(rig.sender_mic.counters().active(), 1);
    let states = rig.receiver_observer.states.lock().clone();
    assert_eq!(
        states,
        vec![
            ConnectionState::Searching,
            ConnectionState::Connected,
            ConnectionState::Searching,
            ConnectionState::Connected,
        ]
    );
}

#[test]
fn shutdown_tears_down_both_sides() {
    let mut rig = Rig::connected(Vec::new());

    rig.sender.shutdown();
    let receiver = wait(&rig.receiver, |s| s.state == ConnectionState::Searching);

    assert!(receiver.established.is_empty());
    assert!(!receiver.is_playing);
    assert_eq!(rig.sender_mic.counters().active(), 0);
    assert_eq!(rig.sender.snapshot(), Err(StreamError::SessionClosed));
    assert!(rig.receiver_observer.errors.lock().is_empty());

    rig.receiver.shutdown();
    assert_eq!(rig.medium.station_count(), 0);
    assert_eq!(rig.receiver_speaker.counters().active(), 0);
}
