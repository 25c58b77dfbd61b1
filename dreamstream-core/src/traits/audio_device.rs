use crate::models::error::StreamError;

/// Microphone-like audio source.
///
/// Implemented by platform backends (and the loopback simulator). The
/// capture pipeline probes buffer sizes, opens one stream per session, and
/// drops the stream on every exit path to release it.
pub trait CaptureDevice: Send + Sync {
    /// Minimum buffer size in bytes for mono 16-bit PCM at `sample_rate`,
    /// or `None` if the rate is unsupported.
    fn probe_buffer_size(&self, sample_rate: u32) -> Option<usize>;

    /// Open the source. The returned stream is released when dropped.
    fn open(
        &self,
        sample_rate: u32,
        buffer_size: usize,
    ) -> Result<Box<dyn CaptureStream>, StreamError>;

    /// Raise the calling thread to audio priority. Called once at the start
    /// of each pipeline thread.
    fn elevate_thread_priority(&self) {}
}

/// An open capture source.
pub trait CaptureStream: Send {
    /// Read one frame into `buf`, blocking until data is available.
    ///
    /// Returns the byte count as the platform reports it. Values outside
    /// `0..=buf.len()` (negative status codes included) are transient and
    /// the caller skips the frame.
    fn read(&mut self, buf: &mut [u8]) -> Result<isize, StreamError>;
}

/// Speaker-like audio sink.
pub trait PlaybackDevice: Send + Sync {
    /// Minimum buffer size in bytes for mono 16-bit PCM at `sample_rate`,
    /// or `None` if the rate is unsupported.
    fn probe_buffer_size(&self, sample_rate: u32) -> Option<usize>;

    /// Open the sink. The returned stream is released when dropped.
    fn open(
        &self,
        sample_rate: u32,
        buffer_size: usize,
    ) -> Result<Box<dyn PlaybackStream>, StreamError>;

    /// Raise the calling thread to audio priority.
    fn elevate_thread_priority(&self) {}
}

/// An open playback sink.
pub trait PlaybackStream: Send {
    fn write(&mut self, data: &[u8]) -> Result<(), StreamError>;
}
