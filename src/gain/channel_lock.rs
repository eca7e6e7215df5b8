//! Channel-lock: snap a rendered position onto the nearest real loudspeaker
//! within a configured distance (Rec. ITU-R BS.2127-0 sec. 7.3.6).

use crate::coordinates::CartesianPosition;
use crate::layout::Layout;

/// `max_distance < 0` disables channel-lock entirely. Ties within `1e-10`
/// of the minimum distance are broken by ascending
/// `(|azimuth|, azimuth, |elevation|, elevation)`, favouring the
/// least-off-centre, then left-most, then least-elevated candidate.
pub fn handle(position: CartesianPosition, layout: &Layout, max_distance: f64) -> CartesianPosition {
    if max_distance < 0.0 {
        return position;
    }

    let candidates: Vec<(usize, CartesianPosition)> = layout
        .channels
        .iter()
        .enumerate()
        .filter(|(_, c)| !c.is_lfe)
        .map(|(i, c)| (i, c.polar_position_nominal.to_cartesian().unit()))
        .collect();
    if candidates.is_empty() {
        return position;
    }

    let unit = position.unit();
    let dist = |p: CartesianPosition| {
        let d = [unit.x - p.x, unit.y - p.y, unit.z - p.z];
        (d[0] * d[0] + d[1] * d[1] + d[2] * d[2]).sqrt()
    };

    let min_dist = candidates.iter().map(|(_, p)| dist(*p)).fold(f64::MAX, f64::min);
    if min_dist > max_distance {
        return position;
    }

    let mut tied: Vec<usize> = candidates
        .iter()
        .filter(|(_, p)| (dist(*p) - min_dist).abs() < 1e-10)
        .map(|(i, _)| *i)
        .collect();

    tied.sort_by(|&a, &b| {
        let pa = layout.channels[a].polar_position_nominal;
        let pb = layout.channels[b].polar_position_nominal;
        let ka = (pa.azimuth.abs(), pa.azimuth, pa.elevation.abs(), pa.elevation);
        let kb = (pb.azimuth.abs(), pb.azimuth, pb.elevation.abs(), pb.elevation);
        ka.partial_cmp(&kb).unwrap()
    });

    layout.channels[tied[0]].polar_position_nominal.to_cartesian()
}
