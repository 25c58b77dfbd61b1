//! Bounded in-memory byte pipe.
//!
//! Half-duplex handoff between a producer thread (audio capture) and a
//! consumer (the transport streaming the payload out, or audio playback).
//! Reads and writes block; closing either side wakes the other:
//!
//! ```text
//! [PipeWriter] ──write──▶ [ByteRing] ──read──▶ [PipeReader]
//!       close ─▶ reader drains, then EOF
//!                         reader close ─▶ EOF now, writes fail
//! ```

use std::io::{self, Read, Write};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use super::ring_buffer::ByteRing;

struct PipeState {
    ring: ByteRing,
    write_closed: bool,
    read_closed: bool,
}

struct Shared {
    state: Mutex<PipeState>,
    readable: Condvar,
    writable: Condvar,
}

impl Shared {
    fn close(&self, side: PipeSide) {
        let mut state = self.state.lock();
        match side {
            PipeSide::Read => state.read_closed = true,
            PipeSide::Write => state.write_closed = true,
        }
        drop(state);
        self.readable.notify_all();
        self.writable.notify_all();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PipeSide {
    Read,
    Write,
}

/// Create a pipe buffering at most `capacity` bytes.
pub fn pipe(capacity: usize) -> (PipeWriter, PipeReader) {
    let shared = Arc::new(Shared {
        state: Mutex::new(PipeState {
            ring: ByteRing::new(capacity),
            write_closed: false,
            read_closed: false,
        }),
        readable: Condvar::new(),
        writable: Condvar::new(),
    });
    (
        PipeWriter {
            shared: Arc::clone(&shared),
        },
        PipeReader { shared },
    )
}

/// Detached close handle for one side of a pipe.
///
/// Lets an owner close a side whose reader/writer has moved into another
/// thread, unblocking any pending call there.
#[derive(Clone)]
pub struct PipeCloser {
    shared: Arc<Shared>,
    side: PipeSide,
}

impl PipeCloser {
    pub fn close(&self) {
        self.shared.close(self.side);
    }
}

/// Write side of a pipe. Dropping it closes the side.
pub struct PipeWriter {
    shared: Arc<Shared>,
}

impl PipeWriter {
    pub fn close(&self) {
        self.shared.close(PipeSide::Write);
    }

    pub fn closer(&self) -> PipeCloser {
        PipeCloser {
            shared: Arc::clone(&self.shared),
            side: PipeSide::Write,
        }
    }

    /// True once either side is closed; further writes fail.
    pub fn is_closed(&self) -> bool {
        let state = self.shared.state.lock();
        state.write_closed || state.read_closed
    }
}

impl Write for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let mut state = self.shared.state.lock();
        loop {
            if state.write_closed {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipe write side closed"));
            }
            if state.read_closed {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipe read side closed"));
            }
            let written = state.ring.write(buf);
            if written > 0 {
                drop(state);
                self.shared.readable.notify_all();
                return Ok(written);
            }
            self.shared.writable.wait(&mut state);
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        let state = self.shared.state.lock();
        if state.write_closed || state.read_closed {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"));
        }
        Ok(())
    }
}

impl Drop for PipeWriter {
    fn drop(&mut self) {
        self.shared.close(PipeSide::Write);
    }
}

/// Read side of a pipe. Dropping it closes the side.
pub struct PipeReader {
    shared: Arc<Shared>,
}

impl PipeReader {
    pub fn close(&self) {
        self.shared.close(PipeSide::Read);
    }

    pub fn closer(&self) -> PipeCloser {
        PipeCloser {
            shared: Arc::clone(&self.shared),
            side: PipeSide::Read,
        }
    }

    /// True once the write side has been closed (the stream will end after draining).
    pub fn is_writer_closed(&self) -> bool {
        self.shared.state.lock().write_closed
    }

    /// Bytes buffered and not yet read.
    pub fn buffered(&self) -> usize {
        self.shared.state.lock().ring.len()
    }
}

impl Read for PipeReader {
    /// Blocks until data arrives. Returns `Ok(0)` at end of stream: the read
    /// side was closed, or the write side was closed and the buffer drained.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let mut state = self.shared.state.lock();
        loop {
            if state.read_closed {
                return Ok(0);
            }
            let read = state.ring.read(buf);
            if read > 0 {
                drop(state);
                self.shared.writable.notify_all();
                return Ok(read);
            }
            if state.write_closed {
                return Ok(0);
            }
            self.shared.readable.wait(&mut state);
        }
    }
}

impl Drop for PipeReader {
    fn drop(&mut self) {
        self.shared.close(PipeSide::Read);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn write_then_read() {
        let (mut writer, mut reader) = pipe(16);
        writer.write_all(&[1, 2, 3, 4]).unwrap();

        let mut out = [0u8; 8];
        let n = reader.read(&mut out).unwrap();
        assert_eq!(&out[..n], &[1, 2, 3, 4]);
    }

    #[test]
    fn closed_writer_drains_then_ends() {
        let (mut writer, mut reader) = pipe(16);
        writer.write_all(&[7, 8]).unwrap();
        writer.close();

        assert!(reader.is_writer_closed());
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, vec![7, 8]);
    }

    #[test]
    fn dropping_writer_ends_stream() {
        let (writer, mut reader) = pipe(16);
        drop(writer);
        let mut out = [0u8; 4];
        assert_eq!(reader.read(&mut out).unwrap(), 0);
    }

    #[test]
    fn closed_reader_fails_writes() {
        let (mut writer, reader) = pipe(16);
        reader.close();

        let err = writer.write(&[1]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        assert!(writer.is_closed());
    }

    #[test]
    fn writes_after_own_close_fail() {
        let (mut writer, _reader) = pipe(16);
        writer.close();
        assert!(writer.write(&[1]).is_err());
        assert!(writer.flush().is_err());
    }

    #[test]
    fn blocked_read_wakes_on_write() {
        let (mut writer, mut reader) = pipe(16);

        let handle = thread::spawn(move || {
            let mut out = [0u8; 4];
            let n = reader.read(&mut out).unwrap();
            out[..n].to_vec()
        });

        thread::sleep(Duration::from_millis(20));
        writer.write_all(&[9, 9]).unwrap();

        assert_eq!(handle.join().unwrap(), vec![9, 9]);
    }

    #[test]
    fn closer_unblocks_pending_read() {
        let (_writer, mut reader) = pipe(16);
        let closer = reader.closer();

        let handle = thread::spawn(move || {
            let mut out = [0u8; 4];
            reader.read(&mut out).unwrap()
        });

        thread::sleep(Duration::from_millis(20));
        closer.close();

        assert_eq!(handle.join().unwrap(), 0);
    }

    #[test]
    fn full_pipe_blocks_writer_until_read() {
        let (mut writer, mut reader) = pipe(4);

        let handle = thread::spawn(move || {
            writer.write_all(&[1, 2, 3, 4, 5, 6]).unwrap();
        });

        let mut out = Vec::new();
        let mut chunk = [0u8; 2];
        while out.len() < 6 {
            let n = reader.read(&mut chunk).unwrap();
            out.extend_from_slice(&chunk[..n]);
        }
        handle.join().unwrap();
        assert_eq!(out, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn writer_closer_unblocks_full_write() {
        let (mut writer, _reader) = pipe(2);
        let closer = writer.closer();

        let handle = thread::spawn(move || writer.write_all(&[1, 2, 3, 4]));

        thread::sleep(Duration::from_millis(20));
        closer.close();

        assert!(handle.join().unwrap().is_err());
    }
}
