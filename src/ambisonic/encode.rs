//! Ambisonic encoding: maps a source direction (and, for extent, a
//! width/height/depth) to a vector of SN3D/ACN coefficients, with a
//! position-change cache so a stationary source does not re-derive its
//! coefficients every block (Rec. ITU-R BS.2127-0 sec. 9, `HOA` rendering;
//! adapted from `rf-spatial`'s `hoa/encoder.rs` position-caching pattern).

use crate::ambisonic::sh::{self, HoaOrder};
use crate::coordinates::{self, CartesianPosition, PolarPosition};

const POSITION_EPSILON: f64 = 1e-6;

/// Encodes a single moving point source into per-ACN-channel coefficients.
pub struct AmbisonicEncoder {
    order: HoaOrder,
    distance_attenuation: bool,
    reference_distance: f64,
    last_position: Option<[f64; 3]>,
    last_distance: f64,
    cached: Vec<f64>,
}

impl AmbisonicEncoder {
    pub fn new(order: HoaOrder, distance_attenuation: bool, reference_distance: f64) -> Self {
        Self {
            order,
            distance_attenuation,
            reference_distance,
            last_position: None,
            last_distance: f64::NAN,
            cached: vec![0.0; order.channel_count()],
        }
    }

    pub fn channel_count(&self) -> usize {
        self.order.channel_count()
    }

    fn attenuation(&self, distance: f64) -> f64 {
        if !self.distance_attenuation {
            return 1.0;
        }
        (self.reference_distance / distance.max(1e-6)).min(1.0)
    }

    fn needs_recompute(&self, dir: [f64; 3], distance: f64) -> bool {
        match self.last_position {
            None => true,
            Some(last) => {
                (last[0] - dir[0]).abs() > POSITION_EPSILON
                    || (last[1] - dir[1]).abs() > POSITION_EPSILON
                    || (last[2] - dir[2]).abs() > POSITION_EPSILON
                    || (self.last_distance - distance).abs() > POSITION_EPSILON
            }
        }
    }

    /// Coefficients for `position` (a full ADM Cartesian position, not
    /// necessarily unit norm), recomputed only when the direction or
    /// distance has moved since the previous call.
    pub fn encode(&mut self, position: CartesianPosition) -> &[f64] {
        let distance = position.norm();
        let dir = if distance > 1e-9 { position.unit().as_array() } else { [0.0, 1.0, 0.0] };

        if self.needs_recompute(dir, distance) {
            let base = sh::encode_direction(self.order, dir[0], dir[1], dir[2]);
            let atten = self.attenuation(distance);
            for (c, b) in self.cached.iter_mut().zip(base.iter()) {
                *c = b * atten;
            }
            self.last_position = Some(dir);
            self.last_distance = distance;
        }
        &self.cached
    }
}

/// `m_minExtent` used by the point/spread blend, matching
/// [`crate::panner::extent`]'s constant of the same role.
const MIN_EXTENT_DEG: f64 = 5.0;
const N_VIRTUAL_SOURCES: usize = 1500;
const FADE_OUT_DEG: f64 = 10.0;

fn modify_extent(distance: f64, extent: f64) -> f64 {
    const MIN_SIZE: f64 = 0.2;
    let size = MIN_SIZE + (1.0 - MIN_SIZE) * extent / 360.0;
    let e1 = 4.0 * (180.0 / std::f64::consts::PI) * size.atan2(1.0);
    let ed = 4.0 * (180.0 / std::f64::consts::PI) * size.atan2(distance);
    if ed < e1 {
        ed
    } else {
        e1
    }
}

/// The Ambisonic analogue of [`crate::panner::extent::PolarExtentHandler`]:
/// blends a point-source encode with a stadium-weighted sum of SH
/// coefficients over the same Fibonacci-lattice grid, combining diverged or
/// depth-split virtual sources by plain (linear) sum rather than power sum,
/// since Ambisonic coefficients are signed and linearly combinable
/// (Rec. ITU-R BS.2127-0 sec. 9, per SPEC_FULL.md §4.4 item 6).
pub struct AmbisonicExtentHandler {
    order: HoaOrder,
    grid_positions: Vec<[f64; 3]>,
    grid_coeffs: Vec<Vec<f64>>,
}

impl AmbisonicExtentHandler {
    pub fn new(order: HoaOrder) -> Self {
        let golden_ratio = (1.0 + 5.0_f64.sqrt()) / 2.0;
        let mut grid_positions = Vec::with_capacity(N_VIRTUAL_SOURCES);
        for i in 0..N_VIRTUAL_SOURCES {
            let theta = 2.0 * std::f64::consts::PI * (i as f64) / golden_ratio;
            let phi = (1.0 - 2.0 * (i as f64 + 0.5) / N_VIRTUAL_SOURCES as f64).acos();
            grid_positions.push([phi.sin() * theta.cos(), phi.sin() * theta.sin(), phi.cos()]);
        }
        let grid_coeffs = grid_positions.iter().map(|&p| sh::encode_direction(order, p[0], p[1], p[2])).collect();
        Self { order, grid_positions, grid_coeffs }
    }

    pub fn channel_count(&self) -> usize {
        self.order.channel_count()
    }

    fn weights(&self, position: [f64; 3], width: f64, height: f64) -> Vec<f64> {
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
                let local_az = 180.0 / std::f64::consts::PI * (-local[0]).atan2(local[1]);
                let local_el = 180.0 / std::f64::consts::PI * local[2].clamp(-1.0, 1.0).asin();

                let dist = if local_az.abs() <= circular_cap_azimuth {
                    (local_el.abs() - h / 2.0).max(0.0)
                } else {
                    let cap_az = (std::f64::consts::PI / 180.0) * circular_cap_azimuth * coordinates::sgn(local_az) as f64;
                    let cap_dir = [-cap_az.sin(), cap_az.cos(), 0.0];
                    let dot = (local[0] * cap_dir[0] + local[1] * cap_dir[1] + local[2] * cap_dir[2]).clamp(-1.0, 1.0);
                    (180.0 / std::f64::consts::PI * dot.acos() - h / 2.0).max(0.0)
                };

                1.0 - dist.clamp(0.0, FADE_OUT_DEG) / FADE_OUT_DEG
            })
            .collect()
    }

    fn spread_coeffs(&self, position: [f64; 3], width: f64, height: f64) -> Vec<f64> {
        let weights = self.weights(position, width, height);
        let mut sum = vec![0.0; self.channel_count()];
        for (w, coeffs) in weights.iter().zip(self.grid_coeffs.iter()) {
            if *w > 1e-4 {
                for (s, c) in sum.iter_mut().zip(coeffs.iter()) {
                    *s += w * c;
                }
            }
        }
        sum
    }

    fn coeffs_at(&self, position: CartesianPosition, distance: f64, width: f64, height: f64) -> Vec<f64> {
        let dir = position.unit().as_array();
        let point = sh::encode_direction(self.order, dir[0], dir[1], dir[2]);
        let mw = modify_extent(distance, width);
        let mh = modify_extent(distance, height);
        let spread = self.spread_coeffs(position.as_array(), mw, mh);

        let p = (width.max(height) / MIN_EXTENT_DEG).clamp(0.0, 1.0);
        point.iter().zip(spread.iter()).map(|(gp, gs)| (1.0 - p) * gp + p * gs).collect()
    }

    /// Per-ACN-channel coefficients for an object's full polar extent,
    /// depth-split and linearly recombined.
    pub fn handle(&self, position: PolarPosition, width: f64, height: f64, depth: f64) -> Vec<f64> {
        let cart = position.to_cartesian();
        if depth.abs() < 1e-9 {
            return self.coeffs_at(cart, position.distance, width, height);
        }
        let d1 = (position.distance + depth / 2.0).max(0.0);
        let d2 = (position.distance - depth / 2.0).max(0.0);
        let g1 = self.coeffs_at(cart, d1, width, height);
        let g2 = self.coeffs_at(cart, d2, width, height);
        g1.iter().zip(g2.iter()).map(|(a, b)| 0.5 * (a + b)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stationary_source_reuses_cached_coefficients() {
        let mut enc = AmbisonicEncoder::new(HoaOrder::new(1).unwrap(), false, 1.0);
        let pos = CartesianPosition::new(0.0, 1.0, 0.0);
        let first = enc.encode(pos).to_vec();
        let second = enc.encode(pos).to_vec();
        assert_eq!(first, second);
    }

    #[test]
    fn distance_attenuation_reduces_far_sources() {
        let mut enc = AmbisonicEncoder::new(HoaOrder::new(0).unwrap(), true, 1.0);
        let near = enc.encode(CartesianPosition::new(0.0, 1.0, 0.0))[0];
        let far = enc.encode(CartesianPosition::new(0.0, 5.0, 0.0))[0];
        assert!(far < near);
    }

    #[test]
    fn zero_extent_matches_point_encode() {
        let order = HoaOrder::new(1).unwrap();
        let handler = AmbisonicExtentHandler::new(order);
        let position = PolarPosition::new(0.0, 0.0, 1.0);
        let point = sh::encode_direction(order, 0.0, 1.0, 0.0);
        let extent = handler.handle(position, 0.0, 0.0, 0.0);
        for (p, e) in point.iter().zip(extent.iter()) {
            assert!((p - e).abs() < 1e-9);
        }
    }
}
