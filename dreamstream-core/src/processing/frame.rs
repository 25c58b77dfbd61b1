/// Fixed-size PCM frame buffer shared by capture and playback.
///
/// Shape is chosen once per session by probing candidate sample rates in
/// order and taking the first one for which the device reports a usable
/// minimum buffer size. If none validates, the frame falls back to
/// `fallback_size` bytes at the last candidate rate.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    data: Vec<u8>,
    sample_rate: u32,
}

impl AudioFrame {
    pub fn probe(
        sample_rates: &[u32],
        fallback_size: usize,
        probe_buffer_size: impl Fn(u32) -> Option<usize>,
    ) -> Self {
        let mut chosen_rate = 0;
        for &rate in sample_rates {
            chosen_rate = rate;
            if let Some(size) = probe_buffer_size(rate).filter(|&s| s > 0) {
                log::debug!("Probed frame: {} bytes at {} Hz", size, rate);
                return Self::with_shape(size, rate);
            }
        }

        log::warn!(
            "No candidate sample rate validated, falling back to {} bytes at {} Hz",
            fallback_size,
            chosen_rate
        );
        Self::with_shape(fallback_size, chosen_rate)
    }

    pub fn with_shape(size: usize, sample_rate: u32) -> Self {
        Self {
            data: vec![0; size],
            sample_rate,
        }
    }

    /// Frame size in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }
}
