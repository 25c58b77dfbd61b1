//! Microphone capture pipeline.
//!
//! Reads fixed-size PCM frames on a dedicated thread, gates them on RMS
//! volume and forwards accepted frames into the outbound pipe:
//!
//! ```text
//! [CaptureDevice] → [AudioFrame] → rms ≥ threshold? → [PipeWriter] → transport
//!                                        └─ no: dropped
//! ```

use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;

use crate::models::audio_models::{CaptureDiagnostics, WarnLevelAlert};
use crate::models::config::{DEFAULT_SAMPLE_RATES, FALLBACK_FRAME_SIZE};
use crate::models::error::StreamError;
use crate::processing::frame::AudioFrame;
use crate::processing::level;
use crate::processing::pipe::{PipeCloser, PipeWriter};
use crate::traits::audio_device::CaptureDevice;

/// Default RMS gate, in sample units.
pub const DEFAULT_THRESHOLD: u32 = 50;

/// One capture session bound to an outbound pipe.
///
/// `stop()` joins the capture thread; once it returns no further bytes are
/// written and the pipe's write side is closed.
pub struct AudioCapture {
    device: Arc<dyn CaptureDevice>,
    sink: Option<PipeWriter>,
    sink_closer: PipeCloser,
    threshold: Arc<AtomicU32>,
    alert: Option<WarnLevelAlert>,
    sample_rates: Vec<u32>,
    fallback_frame_size: usize,
    diagnostics: Arc<Mutex<CaptureDiagnostics>>,

    // Capture thread control
    alive: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl AudioCapture {
    pub fn new(device: Arc<dyn CaptureDevice>, sink: PipeWriter) -> Self {
        Self {
            device,
            sink_closer: sink.closer(),
            sink: Some(sink),
            threshold: Arc::new(AtomicU32::new(DEFAULT_THRESHOLD)),
            alert: None,
            sample_rates: DEFAULT_SAMPLE_RATES.to_vec(),
            fallback_frame_size: FALLBACK_FRAME_SIZE,
            diagnostics: Arc::new(Mutex::new(CaptureDiagnostics::default())),
            alive: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    pub fn with_threshold(self, threshold: u32) -> Self {
        self.threshold.store(threshold, Ordering::SeqCst);
        self
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

    pub fn threshold(&self) -> u32 {
        self.threshold.load(Ordering::SeqCst)
    }

    /// Update the live gate. Takes effect from the next frame; the session
    /// keeps running.
    pub fn set_threshold(&self, threshold: u32) {
        log::debug!("Capture threshold set to {}", threshold);
        self.threshold.store(threshold, Ordering::SeqCst);
    }

    pub fn is_recording(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    pub fn diagnostics(&self) -> CaptureDiagnostics {
        self.diagnostics.lock().clone()
    }

    /// Spawn the capture thread. A no-op if already running.
    pub fn start(&mut self) -> Result<(), StreamError> {
        if self.is_recording() {
            log::debug!("AudioCapture already running");
            return Ok(());
        }
        let sink = self
            .sink
            .take()
            .ok_or_else(|| StreamError::AudioIo("capture sink already closed".into()))?;

        self.alive.store(true, Ordering::SeqCst);
        let capture_loop = CaptureLoop {
            device: Arc::clone(&self.device),
            sink,
            threshold: Arc::clone(&self.threshold),
            alive: Arc::clone(&self.alive),
            alert: self.alert.clone(),
            sample_rates: self.sample_rates.clone(),
            fallback_frame_size: self.fallback_frame_size,
            diagnostics: Arc::clone(&self.diagnostics),
        };

        let handle = thread::Builder::new()
            .name("audio-capture".into())
            .spawn(move || capture_loop.run())
            .map_err(|e| {
                self.alive.store(false, Ordering::SeqCst);
                StreamError::AudioIo(format!("failed to spawn capture thread: {}", e))
            })?;

        self.handle = Some(handle);
        Ok(())
    }

    /// Stop capturing and wait for the thread to exit. Idempotent.
    pub fn stop(&mut self) {
        self.alive.store(false, Ordering::SeqCst);
        self.sink_closer.close();
        self.sink = None;
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Capture thread panicked");
            }
        }
    }
}

impl Drop for AudioCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

/// State moved onto the capture thread.
struct CaptureLoop {
    device: Arc<dyn CaptureDevice>,
    sink: PipeWriter,
    threshold: Arc<AtomicU32>,
    alive: Arc<AtomicBool>,
    alert: Option<WarnLevelAlert>,
    sample_rates: Vec<u32>,
    fallback_frame_size: usize,
    diagnostics: Arc<Mutex<CaptureDiagnostics>>,
}

impl CaptureLoop {
    fn run(mut self) {
        self.device.elevate_thread_priority();

        match self.capture() {
            Ok(()) => log::debug!("Capture loop stopped"),
            Err(e) if !self.alive.load(Ordering::SeqCst) => {
                log::debug!("Capture loop stopped: {}", e)
            }
            Err(e) => log::error!("Capture session failed: {}", e),
        }

        self.sink.close();
        self.alive.store(false, Ordering::SeqCst);
    }

    fn capture(&mut self) -> Result<(), StreamError> {
        let device = Arc::clone(&self.device);
        let mut frame = AudioFrame::probe(&self.sample_rates, self.fallback_frame_size, |rate| {
            device.probe_buffer_size(rate)
        });
        {
            let mut d = self.diagnostics.lock();
            d.sample_rate = frame.sample_rate();
            d.frame_size = frame.len();
        }

        // Dropped on every exit path below, releasing the source.
        let mut source = device.open(frame.sample_rate(), frame.len())?;

        while self.alive.load(Ordering::SeqCst) {
            let len = source.read(frame.as_mut_slice())?;
            if len < 0 || len as usize > frame.len() {
                log::warn!("Unexpected capture length returned: {}", len);
                self.diagnostics.lock().frames_rejected += 1;
                continue;
            }

            let data = &frame.as_slice()[..len as usize];
            if data.is_empty() {
                continue;
            }

            let volume = level::rms_volume(data);
            let alerted = self.alert.as_ref().is_some_and(|a| a.check(volume));
            let accepted = volume >= self.threshold.load(Ordering::SeqCst) as f64;

            if accepted {
                self.sink.write_all(data)?;
                self.sink.flush()?;
            }

            let mut d = self.diagnostics.lock();
            d.frames_read += 1;
            d.last_volume = volume;
            if alerted {
                d.alerts_fired += 1;
            }
            if accepted {
                d.frames_sent += 1;
                d.bytes_written += data.len() as u64;
            } else {
                d.frames_gated += 1;
            }
        }

        Ok(())
    }
}
