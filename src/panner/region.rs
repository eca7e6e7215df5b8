//! Region handlers: the panning primitives assembled over a loudspeaker
//! layout's convex-hull triangulation by [`super::point_source`].
//!
//! `Triplet` is a direct, faithful port of the reference renderer's
//! `Triplet::CalculateGains` (source/RegionHandlers.cpp). `QuadRegion` and
//! `VirtualNgon` were not retrievable in source form (only their member
//! declarations were present in `include/RegionHandlers.h`); both are
//! implemented here from the declared members (vertex order, downmix
//! coefficient, per-facet triplet fan) using a diagonal/fan decomposition
//! into `Triplet`s, which is geometrically equivalent for a convex facet
//! and keeps the same non-negative-gains acceptance test and unit-norm
//! normalisation as the reference `Triplet` (see DESIGN.md).

const DEFAULT_TOL: f64 = 1e-6;

/// Three loudspeakers whose unit-vector positions are linearly independent:
/// gains are the unique linear combination reproducing the source direction,
/// accepted only if every component is non-negative (within tolerance) and
/// then re-normalised to unit 2-norm.
#[derive(Debug, Clone)]
pub struct Triplet {
    pub channel_inds: [usize; 3],
    inverse: [[f64; 3]; 3],
    tol: f64,
}

impl Triplet {
    pub fn new(channel_inds: [usize; 3], positions: [[f64; 3]; 3]) -> Self {
        let matrix = positions;
        Self { channel_inds, inverse: crate::coordinates::inverse_matrix3(&matrix), tol: DEFAULT_TOL }
    }

    /// Returns per-triplet-member gains, or `None` if the position is
    /// outside this triplet's region (any raw gain below `-tol`).
    pub fn calculate_gains(&self, position: [f64; 3]) -> Option<[f64; 3]> {
        let raw = crate::coordinates::mat3_vec3(&self.inverse, position);
        if raw.iter().any(|&g| g < -self.tol) {
            return None;
        }
        let norm = (raw[0] * raw[0] + raw[1] * raw[1] + raw[2] * raw[2]).sqrt();
        if norm < self.tol {
            return None;
        }
        Some([raw[0] / norm, raw[1] / norm, raw[2] / norm])
    }
}

/// A quadrilateral facet, handled as two `Triplet`s sharing the `0-2`
/// diagonal (vertices are wound consistently around the facet by the
/// caller, matching `getNgonVertexOrder`).
#[derive(Debug, Clone)]
pub struct QuadRegion {
    pub channel_inds: [usize; 4],
    lower: Triplet,
    upper: Triplet,
}

impl QuadRegion {
    pub fn new(channel_inds: [usize; 4], positions: [[f64; 3]; 4]) -> Self {
        let lower = Triplet::new([channel_inds[0], channel_inds[1], channel_inds[2]], [positions[0], positions[1], positions[2]]);
        let upper = Triplet::new([channel_inds[0], channel_inds[2], channel_inds[3]], [positions[0], positions[2], positions[3]]);
        Self { channel_inds, lower, upper }
    }

    pub fn calculate_gains(&self, position: [f64; 3]) -> Option<[f64; 4]> {
        if let Some(g) = self.lower.calculate_gains(position) {
            return Some([g[0], g[1], g[2], 0.0]);
        }
        if let Some(g) = self.upper.calculate_gains(position) {
            return Some([g[0], 0.0, g[1], g[2]]);
        }
        None
    }
}

/// A virtual N-gon: a ring of `n` real loudspeakers plus one virtual apex
/// (e.g. the synthesised `TOP`/`BOTTOM` speaker), fanned out into `n`
/// triplets. Gain attributed to the virtual apex is downmixed equally
/// (`1/n`) across the ring channels that the apex was synthesised from.
#[derive(Debug, Clone)]
pub struct VirtualNgon {
    pub channel_inds: Vec<usize>,
    pub downmix_channels: Vec<usize>,
    downmix_coefficient: f64,
    triplets: Vec<Triplet>,
}

impl VirtualNgon {
    pub fn new(channel_inds: Vec<usize>, positions: Vec<[f64; 3]>, virtual_position: [f64; 3], downmix_channels: Vec<usize>) -> Self {
        let n = channel_inds.len();
        let mut triplets = Vec::with_capacity(n);
        for i in 0..n {
            let j = (i + 1) % n;
            triplets.push(Triplet::new([channel_inds[i], channel_inds[j], usize::MAX], [positions[i], positions[j], virtual_position]));
        }
        let downmix_coefficient = 1.0 / downmix_channels.len() as f64;
        Self { channel_inds, downmix_channels, downmix_coefficient, triplets }
    }

    /// Returns `(real_channel, gain)` pairs, already downmixed: the
    /// virtual apex's share has been distributed across `downmix_channels`.
    pub fn calculate_gains(&self, position: [f64; 3]) -> Option<Vec<(usize, f64)>> {
        for t in &self.triplets {
            if let Some(g) = t.calculate_gains(position) {
                let mut out = vec![(t.channel_inds[0], g[0]), (t.channel_inds[1], g[1])];
                for &ch in &self.downmix_channels {
                    out.push((ch, g[2] * self.downmix_coefficient));
                }
                return Some(out);
            }
        }
        None
    }
}
