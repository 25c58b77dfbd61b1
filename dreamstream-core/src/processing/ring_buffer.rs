/// Fixed-capacity circular byte buffer.
///
/// Backs the in-memory pipe. Wrap in `parking_lot::Mutex` for cross-thread
/// access.
///
/// Overflow behavior: writes are partial, never overwriting unread bytes.
/// The caller decides whether to block or retry with the remainder.
#[derive(Debug)]
pub struct ByteRing {
    buffer: Vec<u8>,
    write_index: usize,
    read_index: usize,
    available: usize,
}

impl ByteRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: vec![0; capacity.max(1)],
            write_index: 0,
            read_index: 0,
            available: 0,
        }
    }

    /// Copy as many bytes of `data` as fit. Returns the count written.
    pub fn write(&mut self, data: &[u8]) -> usize {
        let to_write = data.len().min(self.free());
        if to_write == 0 {
            return 0;
        }

        // At most two contiguous runs: tail of the buffer, then the head.
        let first = to_write.min(self.capacity() - self.write_index);
        self.buffer[self.write_index..self.write_index + first].copy_from_slice(&data[..first]);
        let second = to_write - first;
        if second > 0 {
            self.buffer[..second].copy_from_slice(&data[first..to_write]);
        }

        self.write_index = (self.write_index + to_write) % self.capacity();
        self.available += to_write;
        to_write
    }

    /// Move up to `out.len()` bytes into `out`. Returns the count read.
    pub fn read(&mut self, out: &mut [u8]) -> usize {
        let to_read = out.len().min(self.available);
        if to_read == 0 {
            return 0;
        }

        let first = to_read.min(self.capacity() - self.read_index);
        out[..first].copy_from_slice(&self.buffer[self.read_index..self.read_index + first]);
        let second = to_read - first;
        if second > 0 {
            out[first..to_read].copy_from_slice(&self.buffer[..second]);
        }

        self.read_index = (self.read_index + to_read) % self.capacity();
        self.available -= to_read;
        to_read
    }

    /// Number of bytes currently available for reading.
    pub fn len(&self) -> usize {
        self.available
    }

    pub fn is_empty(&self) -> bool {
        self.available == 0
    }

    /// Bytes that can be written before the ring is full.
    pub fn free(&self) -> usize {
        self.capacity() - self.available
    }

    pub fn is_full(&self) -> bool {
        self.free() == 0
    }

    /// Reset the ring to empty state.
    pub fn reset(&mut self) {
        self.write_index = 0;
        self.read_index = 0;
        self.available = 0;
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_come_back_in_order() {
        let mut ring = ByteRing::new(10);
        assert_eq!(ring.write(&[1, 2, 3]), 3);
        assert_eq!(ring.len(), 3);

        let mut out = [0u8; 3];
        assert_eq!(ring.read(&mut out), 3);
        assert_eq!(out, [1, 2, 3]);
        assert!(ring.is_empty());
    }

    #[test]
    fn short_read_leaves_remainder() {
        let mut ring = ByteRing::new(10);
        ring.write(&[1, 2, 3, 4, 5]);

        let mut first = [0u8; 3];
        ring.read(&mut first);
        assert_eq!(first, [1, 2, 3]);
        assert_eq!(ring.len(), 2);

        let mut rest = [0u8; 10]; // more than available
        assert_eq!(ring.read(&mut rest), 2);
        assert_eq!(&rest[..2], &[4, 5]);
    }

    #[test]
    fn full_ring_accepts_partial_write() {
        let mut ring = ByteRing::new(4);
        assert_eq!(ring.write(&[1, 2, 3]), 3);
        assert_eq!(ring.write(&[4, 5, 6]), 1); // only one slot left
        assert!(ring.is_full());

        let mut out = [0u8; 4];
        ring.read(&mut out);
        assert_eq!(out, [1, 2, 3, 4]);
    }

    #[test]
    fn writes_wrap_past_the_end() {
        let mut ring = ByteRing::new(4);
        ring.write(&[1, 2, 3]);
        let mut skip = [0u8; 2];
        ring.read(&mut skip); // read_index = 2

        assert_eq!(ring.write(&[4, 5, 6]), 3); // wraps around

        let mut out = [0u8; 4];
        assert_eq!(ring.read(&mut out), 4);
        assert_eq!(out, [3, 4, 5, 6]);
    }

    #[test]
    fn reset_clears_ring() {
        let mut ring = ByteRing::new(10);
        ring.write(&[1, 2, 3]);
        ring.reset();

        assert!(ring.is_empty());
        assert_eq!(ring.free(), 10);
    }

    #[test]
    fn empty_ring_reads_nothing() {
        let mut ring = ByteRing::new(10);
        let mut out = [0u8; 5];
        assert_eq!(ring.read(&mut out), 0);
        assert_eq!(ring.write(&[]), 0);
        assert!(ring.is_empty());
    }
}
