//! Binaural decode of an Ambisonic bed: decodes to a small virtual
//! loudspeaker array (reusing [`crate::ambisonic::decode::AllRadDecoder`]'s
//! own decode-matrix construction against a synthetic [`Layout`]) and
//! convolves each virtual speaker's signal with that direction's HRTF,
//! overlap-added via the same `realfft` pattern as
//! [`crate::decorrelate::Decorrelator`] (Rec. ITU-R BS.2127-0 sec. 9,
//! binaural rendering; virtual-speaker decode grounded in `rf-spatial`'s
//! `binaural::renderer::render_ambisonic`).

use std::sync::Arc;

use realfft::num_complex::Complex;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};

use crate::ambisonic::decode::AllRadDecoder;
use crate::ambisonic::sh::{self, HoaOrder};
use crate::coordinates::{CartesianPosition, PolarPosition};
use crate::hrtf::HrtfProvider;
use crate::layout::{Channel, Layout};

const GOLDEN_RATIO: f64 = 1.618_033_988_749_895;

/// Eight cube-vertex directions, used as the virtual loudspeaker array for
/// `order == 0` (W-only) and `order == 1` content.
fn cube_vertices() -> Vec<[f64; 3]> {
    let s = 1.0 / 3.0_f64.sqrt();
    let mut out = Vec::with_capacity(8);
    for &x in &[-s, s] {
        for &y in &[-s, s] {
            for &z in &[-s, s] {
                out.push([x, y, z]);
            }
        }
    }
    out
}

/// Twenty dodecahedron-vertex directions, used as the virtual loudspeaker
/// array for 2nd- and 3rd-order content (enough speakers to cover the
/// 16-channel 3rd-order basis).
fn dodecahedron_vertices() -> Vec<[f64; 3]> {
    let phi = GOLDEN_RATIO;
    let inv_phi = 1.0 / phi;
    let mut raw = Vec::with_capacity(20);
    for &x in &[-1.0, 1.0] {
        for &y in &[-1.0, 1.0] {
            for &z in &[-1.0, 1.0] {
                raw.push([x, y, z]);
            }
        }
    }
    for &y in &[-inv_phi, inv_phi] {
        for &z in &[-phi, phi] {
            raw.push([0.0, y, z]);
        }
    }
    for &x in &[-inv_phi, inv_phi] {
        for &y in &[-phi, phi] {
            raw.push([x, y, 0.0]);
        }
    }
    for &x in &[-phi, phi] {
        for &z in &[-inv_phi, inv_phi] {
            raw.push([x, 0.0, z]);
        }
    }
    raw.into_iter()
        .map(|[x, y, z]| {
            let n = (x * x + y * y + z * z).sqrt();
            [x / n, y / n, z / n]
        })
        .collect()
}

fn virtual_layout(order: HoaOrder) -> Layout {
    let vertices = if order.value() <= 1 { cube_vertices() } else { dodecahedron_vertices() };
    let channels = vertices
        .iter()
        .enumerate()
        .map(|(i, &[x, y, z])| {
            let polar = CartesianPosition::new(x, y, z).to_polar();
            Channel::new(&format!("VSPK{i}"), polar, false)
        })
        .collect();
    Layout { name: "virtual_binaural".to_string(), channels, has_lfe: false, is_hoa: false, hoa_order: 0, reproduction_screen: None }
}

fn next_pow2(n: usize) -> usize {
    let mut p = 1usize;
    while p < n {
        p <<= 1;
    }
    p
}

struct SpeakerFilter {
    position: PolarPosition,
    left_freq: Vec<Complex<f64>>,
    right_freq: Vec<Complex<f64>>,
}

/// Decodes an Ambisonic bed to two ears by convolving a small virtual
/// loudspeaker array's decoded signals with per-direction HRTFs.
///
/// `low_cpu`, when set, mirrors the antisymmetric ACN channels (left/right
/// odd ones: ACN 1, 4, 5, 9, 10, 11) before decoding a second time, and
/// convolves *that* mirrored bed with the same left-ear filters to stand in
/// for the right ear — halving the HRTF data the provider must supply (only
/// left-ear impulse responses are ever read) at the cost of an exact
/// virtual-speaker-array mirror symmetry assumption (see DESIGN.md).
pub struct BinauralDecoder {
    order: HoaOrder,
    decoder: AllRadDecoder,
    filters: Vec<SpeakerFilter>,
    low_cpu: bool,
    block_size: usize,
    fft_size: usize,
    overlap_len: usize,
    r2c: Arc<dyn RealToComplex<f64>>,
    c2r: Arc<dyn ComplexToReal<f64>>,
    overlap_left: Vec<f64>,
    overlap_right: Vec<f64>,
}

impl BinauralDecoder {
    pub fn new(order: HoaOrder, provider: &dyn HrtfProvider, sample_rate: f64, block_size: usize, low_cpu: bool) -> Self {
        let layout = virtual_layout(order);
        let decoder = AllRadDecoder::new(order, &layout, sample_rate);

        let hrirs: Vec<_> = layout
            .channels
            .iter()
            .map(|c| {
                let p = c.polar_position_nominal;
                (p, provider.get(p.azimuth.to_radians(), p.elevation.to_radians()))
            })
            .collect();

        let max_len = hrirs.iter().map(|(_, h)| h.len()).max().unwrap_or(1).max(1);
        let fft_size = next_pow2(block_size + max_len - 1);
        let overlap_len = fft_size - block_size;

        let mut planner = RealFftPlanner::<f64>::new();
        let r2c = planner.plan_fft_forward(fft_size);
        let c2r = planner.plan_fft_inverse(fft_size);

        let filters = hrirs
            .into_iter()
            .map(|(position, hrir)| {
                let mut left_pad = r2c.make_input_vec();
                left_pad[..hrir.left.len()].copy_from_slice(&hrir.left);
                let mut left_freq = r2c.make_output_vec();
                r2c.process(&mut left_pad, &mut left_freq).expect("forward FFT of HRIR (left)");

                let mut right_pad = r2c.make_input_vec();
                right_pad[..hrir.right.len()].copy_from_slice(&hrir.right);
                let mut right_freq = r2c.make_output_vec();
                r2c.process(&mut right_pad, &mut right_freq).expect("forward FFT of HRIR (right)");

                tracing::trace!(azimuth = position.azimuth, elevation = position.elevation, "built virtual-speaker HRTF filter");
                SpeakerFilter { position, left_freq, right_freq }
            })
            .collect();

        Self {
            order,
            decoder,
            filters,
            low_cpu,
            block_size,
            fft_size,
            overlap_len,
            r2c,
            c2r,
            overlap_left: vec![0.0; overlap_len],
            overlap_right: vec![0.0; overlap_len],
        }
    }

    pub fn num_speakers(&self) -> usize {
        self.decoder.num_speakers()
    }

    fn accumulate_ear(&self, speaker_signals: &[Vec<f64>], use_left_filter: bool) -> Vec<Complex<f64>> {
        let half_len = self.fft_size / 2 + 1;
        let mut acc = vec![Complex::new(0.0, 0.0); half_len];
        for (s, signal) in speaker_signals.iter().enumerate() {
            let mut padded = self.r2c.make_input_vec();
            padded[..signal.len()].copy_from_slice(signal);
            let mut freq = self.r2c.make_output_vec();
            self.r2c.process(&mut padded, &mut freq).expect("forward FFT of decoded speaker block");

            let filt = if use_left_filter { &self.filters[s].left_freq } else { &self.filters[s].right_freq };
            for (a, (f, h)) in acc.iter_mut().zip(freq.iter().zip(filt.iter())) {
                *a += f * h;
            }
        }
        acc
    }

    fn inverse_overlap_add(&mut self, mut acc: Vec<Complex<f64>>, overlap: &mut Vec<f64>) -> Vec<f64> {
        let mut time = self.c2r.make_output_vec();
        self.c2r.process(&mut acc, &mut time).expect("inverse FFT of binaural block");
        let scale = 1.0 / self.fft_size as f64;

        let mut out = vec![0.0; self.block_size];
        for i in 0..self.block_size {
            out[i] = time[i] * scale + if i < overlap.len() { overlap[i] } else { 0.0 };
        }
        let mut next_overlap = vec![0.0; self.overlap_len];
        for i in 0..self.overlap_len {
            let idx = self.block_size + i;
            if idx < time.len() {
                next_overlap[i] = time[idx] * scale;
            }
        }
        *overlap = next_overlap;
        out
    }

    /// Decodes `hoa_bed` (one `Vec<f64>` per ACN channel, `block_size`
    /// samples) to `(left, right)`.
    pub fn decode(&mut self, hoa_bed: &[Vec<f64>]) -> (Vec<f64>, Vec<f64>) {
        assert_eq!(hoa_bed.len(), self.order.channel_count());

        let direct_signals = self.decoder.decode(hoa_bed);
        let left_acc = self.accumulate_ear(&direct_signals, true);
        let mut overlap_left = std::mem::take(&mut self.overlap_left);
        let left = self.inverse_overlap_add(left_acc, &mut overlap_left);
        self.overlap_left = overlap_left;

        if self.low_cpu {
            let mirrored_bed: Vec<Vec<f64>> = hoa_bed
                .iter()
                .enumerate()
                .map(|(acn, ch)| if sh::is_antisymmetric_acn(acn) { ch.iter().map(|v| -v).collect() } else { ch.clone() })
                .collect();
            let mirrored_signals = self.decoder.decode(&mirrored_bed);
            let right_acc = self.accumulate_ear(&mirrored_signals, true);
            let mut overlap_right = std::mem::take(&mut self.overlap_right);
            let right = self.inverse_overlap_add(right_acc, &mut overlap_right);
            self.overlap_right = overlap_right;
            (left, right)
        } else {
            let right_acc = self.accumulate_ear(&direct_signals, false);
            let mut overlap_right = std::mem::take(&mut self.overlap_right);
            let right = self.inverse_overlap_add(right_acc, &mut overlap_right);
            self.overlap_right = overlap_right;
            (left, right)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hrtf::SyntheticHrtfProvider;

    #[test]
    fn silence_in_silence_out_full_path() {
        let order = HoaOrder::new(1).unwrap();
        let provider = SyntheticHrtfProvider::new(48_000);
        let mut decoder = BinauralDecoder::new(order, &provider, 48_000.0, 64, false);
        let bed = vec![vec![0.0; 64]; order.channel_count()];
        let (l, r) = decoder.decode(&bed);
        assert!(l.iter().all(|&x| x == 0.0));
        assert!(r.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn low_cpu_path_produces_output_for_impulse() {
        let order = HoaOrder::new(1).unwrap();
        let provider = SyntheticHrtfProvider::new(48_000);
        let mut decoder = BinauralDecoder::new(order, &provider, 48_000.0, 64, true);
        let mut bed = vec![vec![0.0; 64]; order.channel_count()];
        bed[0][0] = 1.0;
        let (l, r) = decoder.decode(&bed);
        assert!(l.iter().any(|&x| x != 0.0));
        assert!(r.iter().any(|&x| x != 0.0));
    }

    #[test]
    fn order_zero_uses_cube_array() {
        let order = HoaOrder::new(0).unwrap();
        let provider = SyntheticHrtfProvider::new(48_000);
        let decoder = BinauralDecoder::new(order, &provider, 48_000.0, 64, false);
        assert_eq!(decoder.num_speakers(), 8);
    }

    #[test]
    fn order_three_uses_dodecahedral_array() {
        let order = HoaOrder::new(3).unwrap();
        let provider = SyntheticHrtfProvider::new(48_000);
        let decoder = BinauralDecoder::new(order, &provider, 48_000.0, 64, false);
        assert_eq!(decoder.num_speakers(), 20);
    }
}
