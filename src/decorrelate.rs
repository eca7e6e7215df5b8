//! Block-based diffuse-field decorrelation: a fixed, per-channel 512-tap
//! random-phase FIR applied via FFT overlap-add, with a 255-sample
//! compensation delay on the direct path so direct and diffuse signals stay
//! time-aligned (Rec. ITU-R BS.2127-0 sec. 7.5, `source/Decorrelate.cpp`).

use std::collections::VecDeque;
use std::sync::Arc;

use realfft::num_complex::Complex;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};

use crate::mt19937::Mt19937;

const N_TAPS: usize = 512;
const COMPENSATION_DELAY: usize = 255;

/// `out[i] = time[i]*scale + overlap[i]` (zero past `overlap.len()`), the
/// per-sample tail of overlap-add reconstruction. 4-lane SIMD under the
/// `simd` feature; plain scalar fallback otherwise — both branches produce
/// bit-identical results since the SIMD path is a straight lane-wise
/// multiply-add with no reordering of the summation.
#[cfg(feature = "simd")]
fn scale_and_add_overlap(time: &[f64], scale: f64, overlap: &[f64], out: &mut [f64]) {
    use wide::f64x4;

    let n = out.len();
    let lanes = n / 4 * 4;
    let scale_v = f64x4::splat(scale);
    for i in (0..lanes).step_by(4) {
        let t = f64x4::new([time[i], time[i + 1], time[i + 2], time[i + 3]]);
        let ov = if i + 4 <= overlap.len() {
            f64x4::new([overlap[i], overlap[i + 1], overlap[i + 2], overlap[i + 3]])
        } else {
            f64x4::new(std::array::from_fn(|j| overlap.get(i + j).copied().unwrap_or(0.0)))
        };
        let r = (t * scale_v + ov).to_array();
        out[i..i + 4].copy_from_slice(&r);
    }
    for i in lanes..n {
        out[i] = time[i] * scale + overlap.get(i).copied().unwrap_or(0.0);
    }
}

#[cfg(not(feature = "simd"))]
fn scale_and_add_overlap(time: &[f64], scale: f64, overlap: &[f64], out: &mut [f64]) {
    for (i, o) in out.iter_mut().enumerate() {
        *o = time[i] * scale + overlap.get(i).copied().unwrap_or(0.0);
    }
}

fn next_pow2(n: usize) -> usize {
    let mut p = 1usize;
    while p < n {
        p <<= 1;
    }
    p
}

/// Builds one channel's 512-tap decorrelation filter, seeded by that
/// channel's lexicographic sort index among all channel names in the
/// layout (`CalculateDecorrelationFilter`).
fn calculate_decorrelation_filter(seed_index: u32, r2c: &dyn RealToComplex<f64>, c2r: &dyn ComplexToReal<f64>) -> Vec<f64> {
    let mut rng = Mt19937::new(seed_index);
    let half_len = N_TAPS / 2 + 1;
    let mut spectrum = vec![Complex::new(0.0, 0.0); half_len];
    spectrum[0] = Complex::new(1.0, 0.0);
    spectrum[N_TAPS / 2] = Complex::new(1.0, 0.0);
    for bin in spectrum.iter_mut().take(N_TAPS / 2).skip(1) {
        let r = rng.next_f64();
        let theta = 2.0 * std::f64::consts::PI * r;
        *bin = Complex::new(theta.cos(), theta.sin());
    }

    let mut time = c2r.make_output_vec();
    let mut spectrum_owned = spectrum;
    c2r.process(&mut spectrum_owned, &mut time).expect("inverse FFT of decorrelation spectrum");
    let scale = 1.0 / N_TAPS as f64;
    let _ = r2c; // r2c kept for API symmetry with the forward transforms used elsewhere
    time.iter().map(|v| v * scale).collect()
}

struct ChannelState {
    filter_freq: Vec<Complex<f64>>,
    overlap: Vec<f64>,
    delay_line: VecDeque<f64>,
}

/// Per-block diffuse decorrelation filter bank plus the compensation delay
/// applied to the direct path.
pub struct Decorrelator {
    block_size: usize,
    fft_size: usize,
    overlap_len: usize,
    r2c: Arc<dyn RealToComplex<f64>>,
    c2r: Arc<dyn ComplexToReal<f64>>,
    channels: Vec<ChannelState>,
}

impl Decorrelator {
    pub fn new(block_size: usize, channel_names: &[String]) -> Self {
        let overlap_len = N_TAPS.min(block_size).saturating_sub(1);
        let fft_size = next_pow2(block_size + N_TAPS + overlap_len);

        let mut planner = RealFftPlanner::<f64>::new();
        let r2c = planner.plan_fft_forward(fft_size);
        let c2r = planner.plan_fft_inverse(fft_size);

        let filter_planner_len = N_TAPS;
        let mut filter_planner = RealFftPlanner::<f64>::new();
        let filter_r2c = filter_planner.plan_fft_forward(filter_planner_len);
        let filter_c2r = filter_planner.plan_fft_inverse(filter_planner_len);

        let mut sorted_names: Vec<&String> = channel_names.iter().collect();
        sorted_names.sort();

        let channels = channel_names
            .iter()
            .map(|name| {
                let seed_index = sorted_names.iter().position(|n| *n == name).unwrap_or(0) as u32;
                let filter_time = calculate_decorrelation_filter(seed_index, filter_r2c.as_ref(), filter_c2r.as_ref());

                let mut padded = r2c.make_input_vec();
                padded[..filter_time.len()].copy_from_slice(&filter_time);
                let mut freq = r2c.make_output_vec();
                r2c.process(&mut padded, &mut freq).expect("forward FFT of decorrelation filter");

                ChannelState {
                    filter_freq: freq,
                    overlap: vec![0.0; overlap_len],
                    delay_line: VecDeque::from(vec![0.0; COMPENSATION_DELAY]),
                }
            })
            .collect();

        Self { block_size, fft_size, overlap_len, r2c, c2r, channels }
    }

    /// Clears all per-channel overlap and delay-line state, keeping the
    /// fixed filters and compensation delay length.
    pub fn reset(&mut self) {
        for ch in &mut self.channels {
            ch.overlap.iter_mut().for_each(|v| *v = 0.0);
            ch.delay_line.iter_mut().for_each(|v| *v = 0.0);
        }
    }

    /// Runs the compensation delay on the direct-path signal, returning the
    /// delayed block.
    pub fn delay_direct(&mut self, channel: usize, input: &[f64]) -> Vec<f64> {
        let state = &mut self.channels[channel];
        let mut out = Vec::with_capacity(input.len());
        for &x in input {
            state.delay_line.push_back(x);
            out.push(state.delay_line.pop_front().unwrap());
        }
        out
    }

    /// Decorrelates one channel's diffuse-path block via FFT overlap-add.
    pub fn process_diffuse(&mut self, channel: usize, input: &[f64]) -> Vec<f64> {
        assert_eq!(input.len(), self.block_size);
        let state = &mut self.channels[channel];

        let mut padded = self.r2c.make_input_vec();
        padded[..input.len()].copy_from_slice(input);
        let mut freq = self.r2c.make_output_vec();
        self.r2c.process(&mut padded, &mut freq).expect("forward FFT of diffuse block");

        for (f, h) in freq.iter_mut().zip(state.filter_freq.iter()) {
            *f *= h;
        }

        let mut time = self.c2r.make_output_vec();
        self.c2r.process(&mut freq, &mut time).expect("inverse FFT of diffuse block");
        let scale = 1.0 / self.fft_size as f64;

        let mut out = vec![0.0; self.block_size];
        scale_and_add_overlap(&time[..self.block_size], scale, &state.overlap, &mut out);
        let mut next_overlap = vec![0.0; self.overlap_len];
        for i in 0..self.overlap_len {
            let idx = self.block_size + i;
            if idx < time.len() {
                next_overlap[i] = time[idx] * scale;
            }
        }
        state.overlap = next_overlap;
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_and_add_overlap_matches_scalar_reference() {
        let time: Vec<f64> = (0..9).map(|i| i as f64).collect();
        let overlap = vec![0.5, 1.5, 2.5];
        let mut out = vec![0.0; 9];
        scale_and_add_overlap(&time, 2.0, &overlap, &mut out);
        for i in 0..9 {
            let expected = time[i] * 2.0 + overlap.get(i).copied().unwrap_or(0.0);
            assert!((out[i] - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn diffuse_block_preserves_length() {
        let names = vec!["M+030".to_string(), "M-030".to_string()];
        let mut decorr = Decorrelator::new(256, &names);
        let input = vec![0.0f64; 256];
        let out = decorr.process_diffuse(0, &input);
        assert_eq!(out.len(), 256);
    }

    #[test]
    fn compensation_delay_outputs_zero_until_filled() {
        let names = vec!["M+030".to_string()];
        let mut decorr = Decorrelator::new(64, &names);
        let input = vec![1.0f64; 64];
        let out = decorr.delay_direct(0, &input);
        assert_eq!(out[0], 0.0);
    }
}
