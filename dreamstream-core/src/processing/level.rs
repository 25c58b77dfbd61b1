//! Amplitude measurement over 16-bit little-endian mono PCM.

/// Iterate the signed 16-bit samples of a PCM byte slice.
///
/// A trailing odd byte is ignored.
pub fn samples(pcm: &[u8]) -> impl Iterator<Item = i16> + '_ {
    pcm.chunks_exact(2).map(|b| i16::from_le_bytes([b[0], b[1]]))
}

/// Root-mean-square volume of a frame, in sample units (0 to 32768).
///
/// `sqrt(mean(sample^2))`; an empty frame has volume 0.
pub fn rms_volume(pcm: &[u8]) -> f64 {
    let mut count = 0usize;
    let mut sum = 0.0f64;
    for sample in samples(pcm) {
        let s = sample as f64;
        sum += s * s;
        count += 1;
    }
    if count == 0 {
        return 0.0;
    }
    (sum / count as f64).sqrt()
}

/// Encode samples as 16-bit little-endian PCM.
pub fn encode_samples(samples: &[i16]) -> Vec<u8> {
    let mut data = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        data.extend_from_slice(&sample.to_le_bytes());
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn silence_is_zero() {
        assert_eq!(rms_volume(&encode_samples(&[0, 0, 0, 0])), 0.0);
    }

    #[test]
    fn empty_frame_is_zero() {
        assert_eq!(rms_volume(&[]), 0.0);
    }

    #[test]
    fn constant_magnitude() {
        let pcm = encode_samples(&[100, -100, 100, -100]);
        assert_relative_eq!(rms_volume(&pcm), 100.0);
    }

    #[test]
    fn mixed_samples() {
        // sqrt((3^2 + 4^2) / 2) = sqrt(12.5)
        let pcm = encode_samples(&[3, -4]);
        assert_relative_eq!(rms_volume(&pcm), 12.5f64.sqrt());
    }

    #[test]
    fn full_scale_negative() {
        let pcm = encode_samples(&[i16::MIN, i16::MIN]);
        assert_relative_eq!(rms_volume(&pcm), 32768.0);
    }

    #[test]
    fn trailing_odd_byte_ignored() {
        let mut pcm = encode_samples(&[50, 50]);
        pcm.push(0xFF);
        assert_relative_eq!(rms_volume(&pcm), 50.0);
        assert_eq!(samples(&pcm).count(), 2);
    }
}
