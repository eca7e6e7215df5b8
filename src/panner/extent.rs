//! Polar-extent ("spread") panning: a Fibonacci-lattice grid of virtual
//! point sources, weighted by a stadium-shaped window, used to render
//! objects with non-zero width/height/depth (Rec. ITU-R BS.2127-0 sec. 7.3.7).

use std::f64::consts::PI;

use crate::coordinates::{self, CartesianPosition};
use crate::layout::Layout;
use crate::panner::point_source::PointSourcePannerGainCalc;

const DEG2RAD: f64 = PI / 180.0;
const RAD2DEG: f64 = 180.0 / PI;
const N_VIRTUAL_SOURCES: usize = 1500;
const FADE_OUT_DEG: f64 = 10.0;

/// Weights and sums a pre-computed grid of point-source panning vectors
/// over a "stadium" (rectangle with semicircular caps) window.
pub struct SpreadPanner {
    panner: PointSourcePannerGainCalc,
    grid_positions: Vec<[f64; 3]>,
    grid_gains: Vec<Vec<f64>>,
}

impl SpreadPanner {
    pub fn new(layout: &Layout) -> Self {
        let golden_ratio = (1.0 + 5.0_f64.sqrt()) / 2.0;
        let mut grid_positions = Vec::with_capacity(N_VIRTUAL_SOURCES);
        for i in 0..N_VIRTUAL_SOURCES {
            let theta = 2.0 * PI * (i as f64) / golden_ratio;
            let phi = (1.0 - 2.0 * (i as f64 + 0.5) / N_VIRTUAL_SOURCES as f64).acos();
            grid_positions.push([phi.sin() * theta.cos(), phi.sin() * theta.sin(), phi.cos()]);
        }
        let panner = PointSourcePannerGainCalc::new(layout);
        let grid_gains = grid_positions.iter().map(|&p| panner.calculate_gains(p)).collect();
        Self { panner, grid_positions, grid_gains }
    }

    pub fn num_channels(&self) -> usize {
        self.panner.num_channels()
    }

    fn calculate_weights(&self, position: [f64; 3], width: f64, height: f64) -> Vec<f64> {
        let polar = CartesianPosition::new(position[0], position[1], position[2]).to_polar();
        let mut w = width;
        let mut h = height;
        let mut rot = coordinates::local_coordinate_system(polar.azimuth, polar.elevation);
        if h > w {
            std::mem::swap(&mut w, &mut h);
            rot.swap(0, 2);
        }
        if w > 180.0 {
            w = 180.0 + (w - 180.0) / 180.0 * (180.0 + h);
        }
        let circular_cap_azimuth = (w / 2.0 - h / 2.0).max(0.0);

        self.grid_positions
            .iter()
            .map(|&gp| {
                let local = coordinates::mat3_vec3(&rot, gp);
                let local_az = RAD2DEG * (-local[0]).atan2(local[1]);
                let local_el = RAD2DEG * local[2].clamp(-1.0, 1.0).asin();

                let dist = if local_az.abs() <= circular_cap_azimuth {
                    (local_el.abs() - h / 2.0).max(0.0)
                } else {
                    let cap_az = DEG2RAD * circular_cap_azimuth * coordinates::sgn(local_az) as f64;
                    let cap_dir = [-cap_az.sin(), cap_az.cos(), 0.0];
                    let dot = (local[0] * cap_dir[0] + local[1] * cap_dir[1] + local[2] * cap_dir[2]).clamp(-1.0, 1.0);
                    (RAD2DEG * dot.acos() - h / 2.0).max(0.0)
                };

                1.0 - dist.clamp(0.0, FADE_OUT_DEG) / FADE_OUT_DEG
            })
            .collect()
    }

    pub fn calculate_gains(&self, position: [f64; 3], width: f64, height: f64) -> Vec<f64> {
        let weights = self.calculate_weights(position, width, height);
        let mut sum = vec![0.0; self.num_channels()];
        for (w, gains) in weights.iter().zip(self.grid_gains.iter()) {
            if *w > 1e-4 {
                for (s, g) in sum.iter_mut().zip(gains.iter()) {
                    *s += w * g;
                }
            }
        }
        let norm = coordinates::norm(&sum);
        if norm > 1e-3 {
            for v in &mut sum {
                *v /= norm;
            }
        } else {
            sum.iter_mut().for_each(|v| *v = 0.0);
        }
        sum
    }
}

/// `m_minExtent` used by the final point-source/spread blend.
const MIN_EXTENT_DEG: f64 = 5.0;

/// Scales a nominal (distance-1) extent to the angle actually subtended at
/// `distance` (Rec. ITU-R BS.2127-0 sec. 7.3.7.1).
fn modify_extent(distance: f64, extent: f64) -> f64 {
    const MIN_SIZE: f64 = 0.2;
    let size = MIN_SIZE + (1.0 - MIN_SIZE) * extent / 360.0;
    let e1 = 4.0 * RAD2DEG * size.atan2(1.0);
    let ed = 4.0 * RAD2DEG * size.atan2(distance);
    if ed < e1 {
        ed
    } else {
        e1
    }
}

/// Combines the point-source panner with [`SpreadPanner`] to render an
/// object's full polar extent, including depth-splitting.
pub struct PolarExtentHandler {
    point: PointSourcePannerGainCalc,
    spread: SpreadPanner,
}

impl PolarExtentHandler {
    pub fn new(layout: &Layout) -> Self {
        Self { point: PointSourcePannerGainCalc::new(layout), spread: SpreadPanner::new(layout) }
    }

    fn gains_at(&self, position: CartesianPosition, distance: f64, width: f64, height: f64) -> Vec<f64> {
        let point_gains = self.point.calculate_gains(position.as_array());
        let mw = modify_extent(distance, width);
        let mh = modify_extent(distance, height);
        let spread_gains = self.spread.calculate_gains(position.as_array(), mw, mh);

        let p = (width.max(height) / MIN_EXTENT_DEG).clamp(0.0, 1.0);
        point_gains
            .iter()
            .zip(spread_gains.iter())
            .map(|(gp, gs)| ((1.0 - p) * gp * gp + p * gs * gs).sqrt())
            .collect()
    }

    pub fn handle(&self, position: crate::coordinates::PolarPosition, width: f64, height: f64, depth: f64) -> Vec<f64> {
        let cart = position.to_cartesian();
        if depth.abs() < 1e-9 {
            return self.gains_at(cart, position.distance, width, height);
        }

        let d1 = (position.distance + depth / 2.0).max(0.0);
        let d2 = (position.distance - depth / 2.0).max(0.0);
        let g1 = self.gains_at(cart, d1, width, height);
        let g2 = self.gains_at(cart, d2, width, height);
        g1.iter().zip(g2.iter()).map(|(a, b)| (0.5 * (a * a + b * b)).sqrt()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinates::PolarPosition;
    use crate::tables;

    #[test]
    fn zero_extent_matches_point_source_shape() {
        let layout = tables::matching_layout("0+5+0").unwrap();
        let handler = PolarExtentHandler::new(&layout);
        let gains = handler.handle(PolarPosition::new(0.0, 0.0, 1.0), 0.0, 0.0, 0.0);
        let centre_idx = layout.matching_channel_index("M+000").unwrap();
        assert!(gains[centre_idx] > 0.0);
    }

    #[test]
    fn wide_extent_spreads_energy_across_more_channels() {
        let layout = tables::matching_layout("0+5+0").unwrap();
        let handler = PolarExtentHandler::new(&layout);
        let narrow = handler.handle(PolarPosition::new(0.0, 0.0, 1.0), 5.0, 5.0, 0.0);
        let wide = handler.handle(PolarPosition::new(0.0, 0.0, 1.0), 180.0, 90.0, 0.0);
        let active = |g: &[f64]| g.iter().filter(|&&x| x.abs() > 1e-3).count();
        assert!(active(&wide) >= active(&narrow));
    }

    #[test]
    fn depth_split_is_symmetric_rms_combination() {
        let layout = tables::matching_layout("0+5+0").unwrap();
        let handler = PolarExtentHandler::new(&layout);
        let g = handler.handle(PolarPosition::new(0.0, 0.0, 1.0), 10.0, 10.0, 0.5);
        assert_eq!(g.len(), layout.channels.len());
    }
}
