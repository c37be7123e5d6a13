//! Signal-level measurements shared by the device probe, the silence guard
//! and debug logging.

/// Root-mean-square level of a PCM clip.
///
/// Returns `0.0` for an empty slice.
///
/// # Example
///
/// ```rust
/// use interview_copilot::audio::rms;
///
/// assert_eq!(rms(&[]), 0.0);
/// let level = rms(&[0.5_f32, -0.5, 0.5, -0.5]);
/// assert!((level - 0.5).abs() < 1e-6);
/// ```
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

/// Peak absolute amplitude of a PCM clip. `0.0` for an empty slice.
pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().map(|s| s.abs()).fold(0.0_f32, f32::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rms_of_empty_is_zero() {
        assert_eq!(rms(&[]), 0.0);
    }

    #[test]
    fn rms_of_silence_is_zero() {
        assert_eq!(rms(&[0.0_f32; 1024]), 0.0);
    }

    #[test]
    fn rms_of_square_wave() {
        // |x| = 0.5 everywhere → RMS = 0.5
        let wave: Vec<f32> = (0..1000)
            .map(|i| if i % 2 == 0 { 0.5 } else { -0.5 })
            .collect();
        assert!((rms(&wave) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn peak_finds_largest_magnitude() {
        assert!((peak(&[0.1_f32, -0.8, 0.3]) - 0.8).abs() < 1e-6);
        assert_eq!(peak(&[]), 0.0);
    }
}
