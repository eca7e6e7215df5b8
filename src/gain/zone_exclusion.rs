//! Zone exclusion: routes gain away from channels that fall inside an
//! excluded polar region, downmixing onto the nearest non-excluded channel
//! of the next most appropriate layer (Rec. ITU-R BS.2127-0 sec. 7.3.9).

use crate::coordinates::inside_angle_range;
use crate::layout::Layout;
use crate::metadata::ZoneExclusionPolar;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Layer {
    Bottom,
    Mid,
    Upper,
    Top,
}

fn layer_of(elevation: f64) -> Layer {
    if elevation >= 70.0 {
        Layer::Top
    } else if elevation >= 15.0 {
        Layer::Upper
    } else if elevation <= -15.0 {
        Layer::Bottom
    } else {
        Layer::Mid
    }
}

/// Search order over layers, indexed by the excluded channel's own layer,
/// adapted from the reference renderer's `GetLayerPriority` table.
fn layer_search_order(layer: Layer) -> [Layer; 4] {
    use Layer::*;
    match layer {
        Bottom => [Bottom, Mid, Upper, Top],
        Mid => [Top, Bottom, Mid, Upper],
        Upper => [Top, Upper, Bottom, Mid],
        Top => [Top, Upper, Mid, Bottom],
    }
}

pub struct ZoneExclusionHandler {
    layout: Layout,
    /// Per-channel fallback downmix targets, used only when that channel
    /// is excluded at render time. Empty means "silence if excluded".
    downmix_targets: Vec<Vec<usize>>,
}

impl ZoneExclusionHandler {
    pub fn new(layout: &Layout) -> Self {
        let real: Vec<usize> = layout.channels.iter().enumerate().filter(|(_, c)| !c.is_lfe).map(|(i, _)| i).collect();

        let downmix_targets = layout
            .channels
            .iter()
            .enumerate()
            .map(|(i, c)| {
                if c.is_lfe {
                    return Vec::new();
                }
                let pos_i = c.polar_position_nominal.to_cartesian();
                let own_layer = layer_of(c.polar_position_nominal.elevation);

                for layer in layer_search_order(own_layer) {
                    let mut candidates: Vec<(usize, f64, f64)> = real
                        .iter()
                        .copied()
                        .filter(|&j| j != i && layer_of(layout.channels[j].polar_position_nominal.elevation) == layer)
                        .map(|j| {
                            let pos_j = layout.channels[j].polar_position_nominal.to_cartesian();
                            let d = [pos_i.x - pos_j.x, pos_i.y - pos_j.y, pos_i.z - pos_j.z];
                            let dist = (d[0] * d[0] + d[1] * d[1] + d[2] * d[2]).sqrt();
                            (j, dist, (pos_i.y - pos_j.y).abs())
                        })
                        .collect();
                    if candidates.is_empty() {
                        continue;
                    }
                    let min_dist = candidates.iter().map(|&(_, d, _)| d).fold(f64::MAX, f64::min);
                    candidates.retain(|&(_, d, _)| (d - min_dist).abs() < 1e-9);
                    let min_dy = candidates.iter().map(|&(_, _, dy)| dy).fold(f64::MAX, f64::min);
                    candidates.retain(|&(_, _, dy)| (dy - min_dy).abs() < 1e-9);
                    return candidates.into_iter().map(|(j, _, _)| j).collect();
                }
                Vec::new()
            })
            .collect();

        Self { layout: layout.clone(), downmix_targets }
    }

    fn excluded_flags(&self, zones: &[ZoneExclusionPolar]) -> Vec<bool> {
        self.layout
            .channels
            .iter()
            .map(|c| {
                let p = c.polar_position_nominal;
                zones.iter().any(|z| {
                    p.elevation >= z.min_elevation
                        && p.elevation <= z.max_elevation
                        && inside_angle_range(p.azimuth, z.min_azimuth, z.max_azimuth, 1e-10)
                })
            })
            .collect()
    }

    /// Applies zone exclusion to a per-channel gain vector via a power-sum
    /// downmix matrix.
    pub fn handle(&self, gains: &[f64], zones: &[ZoneExclusionPolar]) -> Vec<f64> {
        if zones.is_empty() {
            return gains.to_vec();
        }
        let excluded = self.excluded_flags(zones);
        if excluded.iter().all(|&e| !e) || excluded.iter().all(|&e| e) {
            return gains.to_vec();
        }

        let n = gains.len();
        let mut matrix = vec![vec![0.0; n]; n];
        for i in 0..n {
            if !excluded[i] {
                matrix[i][i] = 1.0;
                continue;
            }
            let targets = &self.downmix_targets[i];
            if targets.is_empty() {
                continue;
            }
            let share = 1.0 / targets.len() as f64;
            for &t in targets {
                matrix[t][i] += share;
            }
        }

        (0..n)
            .map(|j| (0..n).map(|i| matrix[j][i] * gains[i] * gains[i]).sum::<f64>().sqrt())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables;

    #[test]
    fn no_zones_is_identity() {
        let layout = tables::matching_layout("2+5+0").unwrap();
        let handler = ZoneExclusionHandler::new(&layout);
        let gains = vec![0.1; layout.channels.len()];
        let out = handler.handle(&gains, &[]);
        assert_eq!(out, gains);
    }

    #[test]
    fn fully_excluding_all_channels_is_identity() {
        let layout = tables::matching_layout("2+5+0").unwrap();
        let handler = ZoneExclusionHandler::new(&layout);
        let gains = vec![0.1; layout.channels.len()];
        let zones = vec![ZoneExclusionPolar { min_elevation: -90.0, max_elevation: 90.0, min_azimuth: -180.0, max_azimuth: 180.0 }];
        let out = handler.handle(&gains, &zones);
        assert_eq!(out, gains);
    }

    #[test]
    fn excluding_front_routes_energy_elsewhere() {
        let layout = tables::matching_layout("2+5+0").unwrap();
        let handler = ZoneExclusionHandler::new(&layout);
        let centre = layout.matching_channel_index("M+000").unwrap();
        let mut gains = vec![0.0; layout.channels.len()];
        gains[centre] = 1.0;
        let zones = vec![ZoneExclusionPolar { min_elevation: -10.0, max_elevation: 10.0, min_azimuth: -5.0, max_azimuth: 5.0 }];
        let out = handler.handle(&gains, &zones);
        assert_eq!(out[centre], 0.0);
        let total: f64 = out.iter().map(|g| g * g).sum();
        assert!(total > 0.0);
    }
}
