//! HRTF data provider contract for `Binaural` output, plus a synthetic
//! implementation for tests and demos (Rec. ITU-R BS.2127-0 sec. 9, binaural
//! rendering; adapted from `rf-spatial`'s `binaural::hrtf::HrtfDatabase`
//! synthetic-HRIR model).
//!
//! The real HRTF dataset is an external collaborator supplied by the host
//! application (a measured or modelled HRIR set); this crate only defines
//! the trait it consumes and a synthetic stand-in good enough to exercise
//! the binaural path end to end.

use std::collections::HashMap;

/// A left/right head-related impulse response pair for one direction, in the
/// time domain at the provider's native sample rate.
#[derive(Debug, Clone)]
pub struct HrirPair {
    pub left: Vec<f64>,
    pub right: Vec<f64>,
}

impl HrirPair {
    pub fn len(&self) -> usize {
        self.left.len().max(self.right.len())
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty() && self.right.is_empty()
    }

    /// Builds a pair from integer PCM taps (the common on-disk representation
    /// for measured HRIR sets, e.g. 16-bit MIT/SOFA data), converting via
    /// [`dasp_sample`]'s `Sample` trait rather than a hand-rolled `/ 32768.0`.
    pub fn from_i16(left: &[i16], right: &[i16]) -> Self {
        use dasp_sample::Sample;
        Self {
            left: left.iter().map(|&s| s.to_sample::<f64>()).collect(),
            right: right.iter().map(|&s| s.to_sample::<f64>()).collect(),
        }
    }
}

/// Supplies head-related impulse responses for arbitrary directions. Must be
/// `Send + Sync` since a configured [`crate::renderer::Renderer`] may be
/// moved across threads between blocks even though a single render call is
/// not itself parallelised.
pub trait HrtfProvider: Send + Sync {
    /// Sample rate the returned impulse responses are defined at; the
    /// renderer rejects a provider whose rate disagrees with the configured
    /// one (`RenderError::InvalidSampleRate`).
    fn sample_rate(&self) -> u32;

    /// Nearest or interpolated HRIR pair for `azimuth_rad`/`elevation_rad`
    /// (radians, ADM convention: anti-clockwise from front / positive up).
    fn get(&self, azimuth_rad: f64, elevation_rad: f64) -> HrirPair;
}

/// Synthetic HRTF provider: a simple ITD/ILD/head-shadow model, not a
/// substitute for a measured dataset but sufficient to drive and test the
/// binaural rendering path without external data.
pub struct SyntheticHrtfProvider {
    sample_rate: u32,
    filter_length: usize,
    cache: std::sync::Mutex<HashMap<(i32, i32), HrirPair>>,
}

impl SyntheticHrtfProvider {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate, filter_length: 128, cache: std::sync::Mutex::new(HashMap::new()) }
    }

    fn synthesize(&self, azimuth_rad: f64, elevation_rad: f64) -> HrirPair {
        let length = self.filter_length;
        let mut left = vec![0.0; length];
        let mut right = vec![0.0; length];

        let az_rad = azimuth_rad;
        let el_rad = elevation_rad;

        const HEAD_RADIUS: f64 = 0.0875;
        const SPEED_OF_SOUND: f64 = 343.0;
        let itd_seconds = (HEAD_RADIUS / SPEED_OF_SOUND) * (az_rad.sin() + az_rad);
        let itd_samples = (itd_seconds * self.sample_rate as f64).abs();

        let pan = az_rad.sin();
        let left_gain = ((1.0 - pan) * 0.5 * std::f64::consts::PI).cos();
        let right_gain = ((1.0 + pan) * 0.5 * std::f64::consts::PI).cos();
        let shadow_amount = pan.abs() * 0.5;

        for i in 0..length {
            let t = i as f64;
            let left_delay = if pan > 0.0 { itd_samples } else { 0.0 };
            let right_delay = if pan < 0.0 { itd_samples } else { 0.0 };
            let left_dist = (t - left_delay).abs();
            let right_dist = (t - right_delay).abs();
            let sigma = 5.0;
            left[i] = left_gain * (-left_dist * left_dist / (2.0 * sigma * sigma)).exp();
            right[i] = right_gain * (-right_dist * right_dist / (2.0 * sigma * sigma)).exp();

            if i > 10 && i < 30 {
                let pinna_gain = 0.2 * (1.0 - el_rad.abs() / std::f64::consts::FRAC_PI_2);
                left[i] += pinna_gain * left_gain * 0.1;
                right[i] += pinna_gain * right_gain * 0.1;
            }
        }

        let lpf_coeff = 0.3 * (1.0 - shadow_amount);
        if pan > 0.0 {
            let mut state = 0.0;
            for s in &mut left {
                state = state * (1.0 - lpf_coeff) + *s * lpf_coeff;
                *s = state;
            }
        } else if pan < 0.0 {
            let mut state = 0.0;
            for s in &mut right {
                state = state * (1.0 - lpf_coeff) + *s * lpf_coeff;
                *s = state;
            }
        }

        HrirPair { left, right }
    }
}

impl HrtfProvider for SyntheticHrtfProvider {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn get(&self, azimuth_rad: f64, elevation_rad: f64) -> HrirPair {
        const BINS_PER_RADIAN: f64 = 120.0;
        let az_idx = (azimuth_rad * BINS_PER_RADIAN).round() as i32;
        let el_idx = (elevation_rad * BINS_PER_RADIAN).round() as i32;
        let mut cache = self.cache.lock().expect("hrtf cache poisoned");
        cache.entry((az_idx, el_idx)).or_insert_with(|| self.synthesize(azimuth_rad, elevation_rad)).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_hrir_is_non_empty() {
        let provider = SyntheticHrtfProvider::new(48_000);
        let hrir = provider.get(0.0, 0.0);
        assert!(!hrir.is_empty());
        assert_eq!(hrir.left.len(), hrir.right.len());
    }

    #[test]
    fn from_i16_normalises_full_scale_to_unity() {
        let hrir = HrirPair::from_i16(&[i16::MAX, 0, i16::MIN], &[0, 0, 0]);
        assert!((hrir.left[0] - 1.0).abs() < 1e-3);
        assert!((hrir.left[2] + 1.0).abs() < 1e-3);
    }

    #[test]
    fn synthetic_hrtf_is_left_right_symmetric() {
        let provider = SyntheticHrtfProvider::new(48_000);
        let left_src = provider.get(-std::f64::consts::FRAC_PI_2, 0.0);
        let right_src = provider.get(std::f64::consts::FRAC_PI_2, 0.0);
        let diff: f64 = left_src.left.iter().zip(right_src.right.iter()).map(|(a, b)| (a - b).abs()).sum();
        assert!(diff < 1.0);
    }
}
