//! AllRAD: decodes a full Ambisonic bed to a loudspeaker layout by sampling
//! the continuous decoding integral over a dense spherical grid (standing
//! in for the true spherical t-design — see DESIGN.md) and reusing the
//! crate's own [`PointSourcePannerGainCalc`] as the per-direction
//! loudspeaker-gain sampling step, rather than a bespoke VBAP
//! implementation (Rec. ITU-R BS.2127-0 sec. 9, `AllRAD`).

use ndarray::Array2;

use crate::ambisonic::sh::{self, HoaOrder};
use crate::ambisonic::shelf::{Biquad, BiquadCoeffs};
use crate::layout::Layout;
use crate::panner::PointSourcePannerGainCalc;

const N_GRID: usize = 5200;
const LFE_CUTOFF_HZ: f64 = 200.0;

fn fibonacci_grid(n: usize) -> Vec<[f64; 3]> {
    let golden_ratio = (1.0 + 5.0_f64.sqrt()) / 2.0;
    (0..n)
        .map(|i| {
            let theta = 2.0 * std::f64::consts::PI * (i as f64) / golden_ratio;
            let phi = (1.0 - 2.0 * (i as f64 + 0.5) / n as f64).acos();
            [phi.sin() * theta.cos(), phi.sin() * theta.sin(), phi.cos()]
        })
        .collect()
}

/// Ambisonic-to-loudspeaker decoder: `decode_matrix` (speakers x channels)
/// built once at construction; `lfe_lowpass` carries the W-channel's
/// low-frequency content to the LFE channel, if the layout has one.
pub struct AllRadDecoder {
    num_speakers: usize,
    decode_matrix: Array2<f64>,
    lfe_index: Option<usize>,
    lfe_lowpass: Option<Biquad>,
}

impl AllRadDecoder {
    pub fn new(order: HoaOrder, layout: &Layout, sample_rate: f64) -> Self {
        let panner = PointSourcePannerGainCalc::new(layout);
        let num_speakers = panner.num_channels();
        let num_channels = order.channel_count();

        let grid = fibonacci_grid(N_GRID);
        let mut matrix = Array2::<f64>::zeros((num_speakers, num_channels));
        for &dir in &grid {
            let speaker_gains = panner.calculate_gains(dir);
            let sh_coeffs = sh::encode_direction(order, dir[0], dir[1], dir[2]);
            for s in 0..num_speakers {
                if speaker_gains[s] == 0.0 {
                    continue;
                }
                for c in 0..num_channels {
                    matrix[[s, c]] += speaker_gains[s] * sh_coeffs[c];
                }
            }
        }
        matrix /= N_GRID as f64;

        let frob = matrix.iter().map(|v| v * v).sum::<f64>().sqrt();
        if frob > 1e-12 {
            let scale = (num_speakers as f64).sqrt() / frob;
            matrix.mapv_inplace(|v| v * scale);
        }

        let lfe_index = panner.output_layout.channels.iter().position(|c| c.is_lfe);
        let lfe_lowpass = lfe_index.map(|_| Biquad::new(BiquadCoeffs::lowpass(LFE_CUTOFF_HZ, sample_rate, std::f64::consts::FRAC_1_SQRT_2)));

        Self { num_speakers, decode_matrix: matrix, lfe_index, lfe_lowpass }
    }

    pub fn num_speakers(&self) -> usize {
        self.num_speakers
    }

    /// Decodes an Ambisonic bed (one `Vec<f64>` per ACN channel) into one
    /// buffer per loudspeaker, routing a -6 dB low-passed copy of the
    /// W-channel to the LFE channel if present.
    pub fn decode(&mut self, hoa_bed: &[Vec<f64>]) -> Vec<Vec<f64>> {
        use rayon::prelude::*;

        let n_samples = hoa_bed.first().map_or(0, |c| c.len());
        let mut out = vec![vec![0.0; n_samples]; self.num_speakers];

        out.par_iter_mut().enumerate().for_each(|(s, row)| {
            for (c, channel) in hoa_bed.iter().enumerate() {
                let coeff = self.decode_matrix[[s, c]];
                if coeff == 0.0 {
                    continue;
                }
                for t in 0..n_samples {
                    row[t] += coeff * channel[t];
                }
            }
        });

        if let (Some(idx), Some(lp)) = (self.lfe_index, self.lfe_lowpass.as_mut()) {
            if let Some(w) = hoa_bed.first() {
                for t in 0..n_samples {
                    out[idx][t] += 0.5 * lp.process(w[t]);
                }
            }
        }
        out
    }

    pub fn flush_denormals(&mut self) {
        if let Some(lp) = self.lfe_lowpass.as_mut() {
            lp.flush_denormals();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables;

    #[test]
    fn decode_matrix_has_expected_shape() {
        let layout = tables::matching_layout("0+5+0").unwrap();
        let order = HoaOrder::new(1).unwrap();
        let decoder = AllRadDecoder::new(order, &layout, 48_000.0);
        assert_eq!(decoder.num_speakers(), layout.channels.len());
    }

    #[test]
    fn decoding_silence_produces_silence() {
        let layout = tables::matching_layout("0+5+0").unwrap();
        let order = HoaOrder::new(1).unwrap();
        let mut decoder = AllRadDecoder::new(order, &layout, 48_000.0);
        let bed = vec![vec![0.0; 16]; order.channel_count()];
        let out = decoder.decode(&bed);
        for ch in out {
            assert!(ch.iter().all(|&x| x == 0.0));
        }
    }
}
