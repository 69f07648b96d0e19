//! Channel mixing and sample-rate conversion for decoded source audio
//! Uses linear interpolation, with state carried between blocks

/// Mix interleaved audio to mono by averaging left and right
///
/// # Arguments
/// * `samples` - Interleaved samples [L, R, (others...), L, R, ...]
/// * `channels` - Number of interleaved channels
///
/// # Returns
/// Mono samples. Channels beyond the first two are ignored; mono input is copied.
pub fn downmix(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }

    samples
        .chunks_exact(channels)
        .map(|frame| 0.5 * frame[0] + 0.5 * frame[1])
        .collect()
}

/// Streaming linear-interpolation resampler
///
/// Output positions are tracked on the absolute input timeline and the last
/// input sample of each block is kept, so interpolation across a block edge
/// uses the same neighbours it would in a single pass.
#[derive(Debug, Clone)]
pub struct Resampler {
    from_rate: u32,
    to_rate: u32,
    /// Input samples per output sample
    step: f64,
    /// Absolute input position of the next output sample
    position: f64,
    /// Input samples consumed by earlier blocks
    consumed: u64,
    last: Option<f32>,
}

impl Resampler {
    /// A zero rate on either side has no meaningful ratio; such a resampler
    /// passes blocks through unchanged.
    pub fn new(from_rate: u32, to_rate: u32) -> Self {
        let to_rate = if from_rate == 0 || to_rate == 0 { from_rate } else { to_rate };
        Self {
            from_rate,
            to_rate,
            step: if to_rate == 0 { 1.0 } else { from_rate as f64 / to_rate as f64 },
            position: 0.0,
            consumed: 0,
            last: None,
        }
    }

    pub fn is_passthrough(&self) -> bool {
        self.from_rate == self.to_rate
    }

    /// Resample the next block of the stream
    pub fn process(&mut self, block: &[f32]) -> Vec<f32> {
        if self.is_passthrough() || block.is_empty() {
            return block.to_vec();
        }

        // window[0] sits at absolute input index `base`
        let mut window = Vec::with_capacity(block.len() + 1);
        let base = match self.last {
            Some(last) => {
                window.push(last);
                self.consumed as f64 - 1.0
            }
            None => self.consumed as f64,
        };
        window.extend_from_slice(block);

        let end = base + (window.len() - 1) as f64;
        let mut out = Vec::with_capacity((block.len() as f64 / self.step).ceil() as usize + 1);

        while self.position <= end {
            let offset = self.position - base;
            let idx = offset.floor() as usize;
            let fraction = (offset - idx as f64) as f32;

            // Only a position landing exactly on the last sample has no right neighbour
            let sample = if idx + 1 < window.len() {
                window[idx] * (1.0 - fraction) + window[idx + 1] * fraction
            } else {
                window[idx]
            };
            out.push(sample);
            self.position += self.step;
        }

        self.consumed += block.len() as u64;
        self.last = block.last().copied();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resample_audio(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
        Resampler::new(from_rate, to_rate).process(samples)
    }

    #[test]
    fn test_zero_rate_passes_through() {
        let block = [0.25, -0.5, 0.75, 0.0];
        let mut from_zero = Resampler::new(0, 8000);
        assert!(from_zero.is_passthrough());
        assert_eq!(from_zero.process(&block), block.to_vec());

        let mut to_zero = Resampler::new(8000, 0);
        assert!(to_zero.is_passthrough());
        assert_eq!(to_zero.process(&block), block.to_vec());
    }

    #[test]
    fn test_stereo_to_mono() {
        let stereo = vec![0.2, 0.8, 0.4, 0.6]; // [L, R, L, R]
        let mono = downmix(&stereo, 2);
        assert_eq!(mono.len(), 2);
        assert!((mono[0] - 0.5).abs() < 0.001); // (0.2 + 0.8) / 2 = 0.5
        assert!((mono[1] - 0.5).abs() < 0.001); // (0.4 + 0.6) / 2 = 0.5
    }

    #[test]
    fn test_extra_channels_ignored() {
        let quad = vec![0.1, 0.3, 9.0, 9.0, -0.2, -0.4, 9.0, 9.0];
        let mono = downmix(&quad, 4);
        assert_eq!(mono.len(), 2);
        assert!((mono[0] - 0.2).abs() < 0.001);
        assert!((mono[1] - (-0.3)).abs() < 0.001);
    }

    #[test]
    fn test_resample_same_rate() {
        let samples = vec![0.1, 0.2, 0.3, 0.4];
        let resampled = resample_audio(&samples, 8000, 8000);
        assert_eq!(resampled, samples);
    }

    #[test]
    fn test_resample_downsample() {
        let samples: Vec<f32> = (0..48).map(|i| i as f32 / 48.0).collect();
        let resampled = resample_audio(&samples, 48000, 8000); // 6x downsample
        assert_eq!(resampled.len(), 8);
        for (i, value) in resampled.iter().enumerate() {
            assert!((value - (i * 6) as f32 / 48.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_resample_upsample_interpolates() {
        let samples = vec![0.0, 1.0, 0.0];
        let resampled = resample_audio(&samples, 8000, 16000);
        assert_eq!(resampled, vec![0.0, 0.5, 1.0, 0.5, 0.0]);
    }

    #[test]
    fn test_block_split_matches_single_pass() {
        let signal: Vec<f32> = (0..1000).map(|i| (i as f32 * 0.05).sin()).collect();
        let whole = resample_audio(&signal, 11025, 8000);

        let mut resampler = Resampler::new(11025, 8000);
        let mut pieces = Vec::new();
        for block in signal.chunks(97) {
            pieces.extend(resampler.process(block));
        }

        assert_eq!(pieces.len(), whole.len());
        for (a, b) in pieces.iter().zip(whole.iter()) {
            assert!((a - b).abs() < 1e-5, "{} vs {}", a, b);
        }
    }

    #[test]
    fn test_resample_preserves_value_range() {
        let samples = vec![0.1, 0.5, -0.3, 0.8, -0.2];
        let resampled = resample_audio(&samples, 16000, 22050);

        for sample in resampled {
            assert!(sample >= -0.3 && sample <= 0.8, "Sample out of range: {}", sample);
        }
    }
}
