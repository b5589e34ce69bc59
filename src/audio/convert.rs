//! Sample-format conversion for the capture pipeline.
//!
//! Every consumer downstream of [`crate::audio::AudioSource`] expects
//! **16 kHz mono `f32`** audio.  Capture devices rarely deliver that
//! natively, so the capture thread funnels each cpal buffer through
//! [`mono_16k`] before slicing it into frames.
//!
//! The resampler is plain linear interpolation — cheap enough to run inside
//! the capture callback and more than adequate for VAD scoring and keyword
//! transcription.

/// Target sample rate for all downstream audio consumers, in Hz.
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

// ---------------------------------------------------------------------------
// mono_16k
// ---------------------------------------------------------------------------

/// Convert an interleaved device buffer to 16 kHz mono.
///
/// Channels are averaged down to one, then the signal is linearly
/// resampled from `source_rate` to [`TARGET_SAMPLE_RATE`].  A buffer that is
/// already mono 16 kHz is copied through unchanged.
///
/// # Example
///
/// ```rust
/// use voice_emote::audio::mono_16k;
///
/// // 10 ms of stereo 48 kHz → 160 mono samples at 16 kHz
/// let stereo = vec![0.5_f32; 960];
/// let out = mono_16k(&stereo, 48_000, 2);
/// assert_eq!(out.len(), 160);
/// ```
pub fn mono_16k(samples: &[f32], source_rate: u32, channels: u16) -> Vec<f32> {
    let mono = downmix(samples, channels);
    if source_rate == TARGET_SAMPLE_RATE {
        return mono;
    }
    linear_resample(&mono, source_rate, TARGET_SAMPLE_RATE)
}

/// Average interleaved channels down to mono.
///
/// Output length is `samples.len() / channels`; zero channels yields an
/// empty vector.
fn downmix(samples: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.to_vec(),
        n => {
            let n = n as usize;
            samples
                .chunks_exact(n)
                .map(|frame| frame.iter().sum::<f32>() / n as f32)
                .collect()
        }
    }
}

/// Linear-interpolation resampler.
fn linear_resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if samples.is_empty() || from_rate == to_rate {
        return samples.to_vec();
    }

    let ratio = to_rate as f64 / from_rate as f64;
    let out_len = (samples.len() as f64 * ratio).ceil() as usize;
    let mut out = Vec::with_capacity(out_len);

    for i in 0..out_len {
        let src = i as f64 / ratio;
        let idx = src as usize;
        let frac = (src - idx as f64) as f32;

        let sample = if idx + 1 < samples.len() {
            samples[idx] * (1.0 - frac) + samples[idx + 1] * frac
        } else if idx < samples.len() {
            samples[idx]
        } else {
            0.0
        };
        out.push(sample);
    }

    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mono_16k_passthrough() {
        let input: Vec<f32> = (0..160).map(|i| i as f32 / 160.0).collect();
        let out = mono_16k(&input, 16_000, 1);
        assert_eq!(out, input);
    }

    #[test]
    fn downmixes_stereo_pairs() {
        let stereo = vec![1.0_f32, -1.0, 0.5, 0.5];
        let out = mono_16k(&stereo, 16_000, 2);
        assert_eq!(out.len(), 2);
        assert!((out[0]).abs() < 1e-6);
        assert!((out[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn zero_channels_is_empty() {
        assert!(mono_16k(&[0.1, 0.2], 16_000, 0).is_empty());
    }

    #[test]
    fn downsamples_48k_by_three() {
        // 480 samples @ 48 kHz = 10 ms → 160 samples @ 16 kHz
        let input = vec![0.5_f32; 480];
        let out = mono_16k(&input, 48_000, 1);
        assert_eq!(out.len(), 160);
    }

    #[test]
    fn downsample_preserves_dc_level() {
        let input = vec![0.25_f32; 441];
        let out = mono_16k(&input, 44_100, 1);
        for &s in &out {
            assert!((s - 0.25).abs() < 1e-5, "amplitude drift: {s}");
        }
    }

    #[test]
    fn upsamples_8k_to_double_length() {
        let input = vec![0.0_f32; 80]; // 10 ms @ 8 kHz
        let out = mono_16k(&input, 8_000, 1);
        assert_eq!(out.len(), 160);
    }

    #[test]
    fn empty_input_stays_empty() {
        assert!(mono_16k(&[], 48_000, 2).is_empty());
    }
}
