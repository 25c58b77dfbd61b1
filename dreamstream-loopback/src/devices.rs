//! Simulated microphones and speakers.
//!
//! All devices count how many streams they opened and how many were
//! released, so tests can check that a pipeline reused its stream or let go
//! of it.

use std::collections::VecDeque;
use std::f64::consts::PI;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use dreamstream_core::models::error::StreamError;
use dreamstream_core::processing::level::encode_samples;
use dreamstream_core::traits::audio_device::{CaptureDevice, CaptureStream, PlaybackDevice, PlaybackStream};

/// Default pacing between simulated capture reads.
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(5);

/// Open/release counters shared by a device and its streams.
#[derive(Debug, Default)]
pub struct DeviceCounters {
    opens: AtomicUsize,
    releases: AtomicUsize,
}

impl DeviceCounters {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    /// Streams opened and not yet released.
    pub fn active(&self) -> usize {
        self.opens().saturating_sub(self.releases())
    }

    fn opened(&self) {
        self.opens.fetch_add(1, Ordering::SeqCst);
    }

    fn released(&self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

// --- Scripted microphone ---

/// Replays queued frames, then produces silence.
///
/// Every supported sample rate reports `frame_size` as its buffer size.
/// The queue is shared across opens, so a second session continues where
/// the first one stopped.
pub struct ScriptedCaptureDevice {
    frame_size: usize,
    interval: Duration,
    frames: Arc<Mutex<VecDeque<Vec<u8>>>>,
    counters: Arc<DeviceCounters>,
}

impl ScriptedCaptureDevice {
    pub fn new(frame_size: usize, frames: Vec<Vec<u8>>) -> Self {
        Self {
            frame_size,
            interval: DEFAULT_FRAME_INTERVAL,
            frames: Arc::new(Mutex::new(frames.into())),
            counters: Arc::new(DeviceCounters::default()),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn counters(&self) -> Arc<DeviceCounters> {
        Arc::clone(&self.counters)
    }

    /// Frames not yet read.
    pub fn remaining(&self) -> usize {
        self.frames.lock().len()
    }
}

impl CaptureDevice for ScriptedCaptureDevice {
    fn probe_buffer_size(&self, _sample_rate: u32) -> Option<usize> {
        Some(self.frame_size)
    }

    fn open(&self, sample_rate: u32, buffer_size: usize) -> Result<Box<dyn CaptureStream>, StreamError> {
        log::debug!("Scripted microphone opened at {} Hz, {} bytes", sample_rate, buffer_size);
        self.counters.opened();
        Ok(Box::new(ScriptedStream {
            interval: self.interval,
            frames: Arc::clone(&self.frames),
            counters: Arc::clone(&self.counters),
        }))
    }
}

struct ScriptedStream {
    interval: Duration,
    frames: Arc<Mutex<VecDeque<Vec<u8>>>>,
    counters: Arc<DeviceCounters>,
}

impl CaptureStream for ScriptedStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<isize, StreamError> {
        thread::sleep(self.interval);
        match self.frames.lock().pop_front() {
            Some(frame) => {
                let len = frame.len().min(buf.len());
                buf[..len].copy_from_slice(&frame[..len]);
                Ok(len as isize)
            }
            None => {
                buf.fill(0);
                Ok(buf.len() as isize)
            }
        }
    }
}

impl Drop for ScriptedStream {
    fn drop(&mut self) {
        self.counters.released();
    }
}

// --- Tone microphone ---

/// Sine bursts separated by silence, like a child crying on and off.
pub struct ToneCaptureDevice {
    frequency: f64,
    amplitude: i16,
    burst_frames: usize,
    pause_frames: usize,
    interval: Duration,
    counters: Arc<DeviceCounters>,
}

impl ToneCaptureDevice {
    pub fn new(frequency: f64, amplitude: i16) -> Self {
        Self {
            frequency,
            amplitude,
            burst_frames: 20,
            pause_frames: 20,
            interval: DEFAULT_FRAME_INTERVAL,
            counters: Arc::new(DeviceCounters::default()),
        }
    }

    /// Frames of tone followed by frames of silence, repeating.
    pub fn with_pattern(mut self, burst_frames: usize, pause_frames: usize) -> Self {
        self.burst_frames = burst_frames;
        self.pause_frames = pause_frames;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn counters(&self) -> Arc<DeviceCounters> {
        Arc::clone(&self.counters)
    }
}

impl CaptureDevice for ToneCaptureDevice {
    fn probe_buffer_size(&self, sample_rate: u32) -> Option<usize> {
        // 20 ms of mono 16-bit PCM.
        Some((sample_rate as usize / 50) * 2)
    }

    fn open(&self, sample_rate: u32, _buffer_size: usize) -> Result<Box<dyn CaptureStream>, StreamError> {
        self.counters.opened();
        Ok(Box::new(ToneStream {
            sample_rate: f64::from(sample_rate),
            frequency: self.frequency,
            amplitude: f64::from(self.amplitude),
            burst_frames: self.burst_frames,
            cycle: self.burst_frames + self.pause_frames,
            interval: self.interval,
            frame_index: 0,
            sample_index: 0,
            counters: Arc::clone(&self.counters),
        }))
    }
}

struct ToneStream {
    sample_rate: f64,
    frequency: f64,
    amplitude: f64,
    burst_frames: usize,
    cycle: usize,
    interval: Duration,
    frame_index: usize,
    sample_index: u64,
    counters: Arc<DeviceCounters>,
}

impl CaptureStream for ToneStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<isize, StreamError> {
        thread::sleep(self.interval);

        let in_burst = self.cycle == 0 || self.frame_index % self.cycle < self.burst_frames;
        self.frame_index += 1;

        let count = buf.len() / 2;
        let samples: Vec<i16> = (0..count)
            .map(|_| {
                let t = self.sample_index as f64 / self.sample_rate;
                self.sample_index += 1;
                if in_burst {
                    (self.amplitude * (2.0 * PI * self.frequency * t).sin()) as i16
                } else {
                    0
                }
            })
            .collect();

        let bytes = encode_samples(&samples);
        buf[..bytes.len()].copy_from_slice(&bytes);
        Ok(bytes.len() as isize)
    }
}

impl Drop for ToneStream {
    fn drop(&mut self) {
        self.counters.released();
    }
}

// --- Recording speaker ---

/// Speaker that keeps every byte written to it.
pub struct RecordingPlaybackDevice {
    frame_size: usize,
    played: Arc<Mutex<Vec<u8>>>,
    counters: Arc<DeviceCounters>,
}

impl RecordingPlaybackDevice {
    pub fn new(frame_size: usize) -> Self {
        Self {
            frame_size,
            played: Arc::new(Mutex::new(Vec::new())),
            counters: Arc::new(DeviceCounters::default()),
        }
    }

    pub fn counters(&self) -> Arc<DeviceCounters> {
        Arc::clone(&self.counters)
    }

    /// Everything played so far, across all sessions.
    pub fn played(&self) -> Vec<u8> {
        self.played.lock().clone()
    }

    pub fn played_len(&self) -> usize {
        self.played.lock().len()
    }
}

impl PlaybackDevice for RecordingPlaybackDevice {
    fn probe_buffer_size(&self, _sample_rate: u32) -> Option<usize> {
        Some(self.frame_size)
    }

    fn open(&self, sample_rate: u32, buffer_size: usize) -> Result<Box<dyn PlaybackStream>, StreamError> {
        log::debug!("Recording speaker opened at {} Hz, {} bytes", sample_rate, buffer_size);
        self.counters.opened();
        Ok(Box::new(RecordingStream {
            played: Arc::clone(&self.played),
            counters: Arc::clone(&self.counters),
        }))
    }
}

struct RecordingStream {
    played: Arc<Mutex<Vec<u8>>>,
    counters: Arc<DeviceCounters>,
}

impl PlaybackStream for RecordingStream {
    fn write(&mut self, data: &[u8]) -> Result<(), StreamError> {
        self.played.lock().extend_from_slice(data);
        Ok(())
    }
}

impl Drop for RecordingStream {
    fn drop(&mut self) {
        self.counters.released();
    }
}
