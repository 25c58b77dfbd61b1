//! Speaker playback pipeline.
//!
//! A fire-once session: reads frames from an inbound stream and writes them
//! straight to the playback device until the stream ends or `stop()` is
//! called.

use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;

use crate::models::audio_models::{PlaybackDiagnostics, WarnLevelAlert};
use crate::models::config::{DEFAULT_SAMPLE_RATES, FALLBACK_FRAME_SIZE};
use crate::models::error::StreamError;
use crate::processing::frame::AudioFrame;
use crate::processing::level;
use crate::processing::pipe::{PipeCloser, PipeReader};
use crate::traits::audio_device::PlaybackDevice;

/// Hook run on the playback thread once the session has ended.
pub type FinishCallback = Box<dyn FnOnce() + Send + 'static>;

pub struct AudioPlayback {
    device: Arc<dyn PlaybackDevice>,
    input: Option<PipeReader>,
    input_closer: PipeCloser,
    on_finish: Option<FinishCallback>,
    alert: Option<WarnLevelAlert>,
    sample_rates: Vec<u32>,
    fallback_frame_size: usize,
    diagnostics: Arc<Mutex<PlaybackDiagnostics>>,

    alive: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl AudioPlayback {
    pub fn new(
        device: Arc<dyn PlaybackDevice>,
        input: PipeReader,
        on_finish: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            device,
            input_closer: input.closer(),
            input: Some(input),
            on_finish: Some(Box::new(on_finish)),
            alert: None,
            sample_rates: DEFAULT_SAMPLE_RATES.to_vec(),
            fallback_frame_size: FALLBACK_FRAME_SIZE,
            diagnostics: Arc::new(Mutex::new(PlaybackDiagnostics::default())),
            alive: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    pub fn with_alert(mut self, alert: WarnLevelAlert) -> Self {
        self.alert = Some(alert);
        self
    }

    pub fn with_frame_probe(mut self, sample_rates: &[u32], fallback_frame_size: usize) -> Self {
        self.sample_rates = sample_rates.to_vec();
        self.fallback_frame_size = fallback_frame_size;
        self
    }

    pub fn is_playing(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    pub fn diagnostics(&self) -> PlaybackDiagnostics {
        self.diagnostics.lock().clone()
    }

    /// Spawn the playback thread. A no-op if already playing.
    pub fn start(&mut self) -> Result<(), StreamError> {
        if self.is_playing() {
            log::debug!("AudioPlayback already running");
            return Ok(());
        }
        let input = self
            .input
            .take()
            .ok_or_else(|| StreamError::AudioIo("playback stream already consumed".into()))?;

        self.alive.store(true, Ordering::SeqCst);
        let playback_loop = PlaybackLoop {
            device: Arc::clone(&self.device),
            input,
            on_finish: self.on_finish.take(),
            alert: self.alert.clone(),
            sample_rates: self.sample_rates.clone(),
            fallback_frame_size: self.fallback_frame_size,
            diagnostics: Arc::clone(&self.diagnostics),
            alive: Arc::clone(&self.alive),
        };

        let handle = thread::Builder::new()
            .name("audio-playback".into())
            .spawn(move || playback_loop.run())
            .map_err(|e| {
                self.alive.store(false, Ordering::SeqCst);
                StreamError::AudioIo(format!("failed to spawn playback thread: {}", e))
            })?;

        self.handle = Some(handle);
        Ok(())
    }

    /// Close the input stream, unblocking a pending read, and join the
    /// thread. Idempotent.
    pub fn stop(&mut self) {
        self.alive.store(false, Ordering::SeqCst);
        self.input_closer.close();
        self.input = None;
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Playback thread panicked");
            }
        }
    }
}

impl Drop for AudioPlayback {
    fn drop(&mut self) {
        self.stop();
    }
}

struct PlaybackLoop {
    device: Arc<dyn PlaybackDevice>,
    input: PipeReader,
    on_finish: Option<FinishCallback>,
    alert: Option<WarnLevelAlert>,
    sample_rates: Vec<u32>,
    fallback_frame_size: usize,
    diagnostics: Arc<Mutex<PlaybackDiagnostics>>,
    alive: Arc<AtomicBool>,
}

impl PlaybackLoop {
    fn run(mut self) {
        self.device.elevate_thread_priority();

        match self.play() {
            Ok(()) => log::debug!("Playback stream ended"),
            Err(e) => log::error!("Exception with playing stream: {}", e),
        }

        self.alive.store(false, Ordering::SeqCst);
        self.input.close();
        if let Some(on_finish) = self.on_finish.take() {
            on_finish();
        }
    }

    fn play(&mut self) -> Result<(), StreamError> {
        let device = Arc::clone(&self.device);
        let mut frame = AudioFrame::probe(&self.sample_rates, self.fallback_frame_size, |rate| {
            device.probe_buffer_size(rate)
        });
        {
            let mut d = self.diagnostics.lock();
            d.sample_rate = frame.sample_rate();
            d.frame_size = frame.len();
        }

        // Released when dropped, on every exit path.
        let mut output = device.open(frame.sample_rate(), frame.len())?;

        loop {
            let len = self.input.read(frame.as_mut_slice())?;
            if len == 0 || !self.alive.load(Ordering::SeqCst) {
                break;
            }

            let data = &frame.as_slice()[..len];
            output.write(data)?;

            let volume = level::rms_volume(data);
            let alerted = self.alert.as_ref().is_some_and(|a| a.check(volume));

            let mut d = self.diagnostics.lock();
            d.frames_played += 1;
            d.bytes_played += len as u64;
            d.last_volume = volume;
            if alerted {
                d.alerts_fired += 1;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::pipe::pipe;
    use crate::traits::audio_device::PlaybackStream;
    use std::io::Write;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingSpeaker {
        played: Mutex<Vec<u8>>,
        opens: AtomicUsize,
        releases: AtomicUsize,
    }

    struct SpeakerStream {
        speaker: Arc<RecordingSpeaker>,
    }

    impl PlaybackDevice for Arc<RecordingSpeaker> {
        fn probe_buffer_size(&self, _: u32) -> Option<usize> {
            Some(16)
        }

        fn open(&self, _: u32, _: usize) -> Result<Box<dyn PlaybackStream>, StreamError> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(SpeakerStream {
                speaker: Arc::clone(self),
            }))
        }
    }

    impl PlaybackStream for SpeakerStream {
        fn write(&mut self, data: &[u8]) -> Result<(), StreamError> {
            self.speaker.played.lock().extend_from_slice(data);
            Ok(())
        }
    }

    impl Drop for SpeakerStream {
        fn drop(&mut self) {
            self.speaker.releases.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct BrokenSpeaker;

    impl PlaybackDevice for BrokenSpeaker {
        fn probe_buffer_size(&self, _: u32) -> Option<usize> {
            None
        }

        fn open(&self, _: u32, _: usize) -> Result<Box<dyn PlaybackStream>, StreamError> {
            Err(StreamError::AudioIo("no output device".into()))
        }
    }

    fn counter() -> (Arc<AtomicUsize>, impl FnOnce() + Send + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        (count, move || {
            c.fetch_add(1, Ordering::SeqCst);
        })
    }

    fn wait_until(cond: impl Fn() -> bool) {
        for _ in 0..500 {
            if cond() {
                return;
            }
            thread::sleep(Duration::from_millis(2));
        }
        panic!("condition not reached");
    }

    #[test]
    fn plays_until_end_of_stream() {
        let speaker = Arc::new(RecordingSpeaker::default());
        let (mut writer, reader) = pipe(256);
        let (finished, on_finish) = counter();

        let mut playback = AudioPlayback::new(Arc::new(Arc::clone(&speaker)), reader, on_finish);
        playback.start().unwrap();

        let data: Vec<u8> = (0..100u8).collect();
        writer.write_all(&data).unwrap();
        drop(writer);

        wait_until(|| finished.load(Ordering::SeqCst) == 1);
        assert!(!playback.is_playing());
        assert_eq!(*speaker.played.lock(), data);
        assert_eq!(speaker.releases.load(Ordering::SeqCst), 1);
        assert_eq!(playback.diagnostics().bytes_played, 100);

        playback.stop();
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stop_unblocks_pending_read() {
        let speaker = Arc::new(RecordingSpeaker::default());
        let (writer, reader) = pipe(256);
        let (finished, on_finish) = counter();

        let mut playback = AudioPlayback::new(Arc::new(Arc::clone(&speaker)), reader, on_finish);
        playback.start().unwrap();
        wait_until(|| speaker.opens.load(Ordering::SeqCst) == 1);

        playback.stop();
        assert!(!playback.is_playing());
        assert_eq!(finished.load(Ordering::SeqCst), 1);
        assert_eq!(speaker.releases.load(Ordering::SeqCst), 1);
        assert!(writer.is_closed());

        playback.stop();
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn open_failure_still_finishes() {
        let (_writer, reader) = pipe(16);
        let (finished, on_finish) = counter();

        let mut playback = AudioPlayback::new(Arc::new(BrokenSpeaker), reader, on_finish);
        playback.start().unwrap();
        wait_until(|| finished.load(Ordering::SeqCst) == 1);
        assert!(!playback.is_playing());
    }

    #[test]
    fn finish_runs_off_caller_thread() {
        let speaker = Arc::new(RecordingSpeaker::default());
        let (writer, reader) = pipe(16);
        let caller = thread::current().id();
        let (tx, rx) = crossbeam_channel::bounded(1);

        let mut playback = AudioPlayback::new(Arc::new(speaker), reader, move || {
            let _ = tx.send(thread::current().id());
        });
        playback.start().unwrap();
        drop(writer);

        let finished_on = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_ne!(finished_on, caller);
        playback.stop();
    }
}
