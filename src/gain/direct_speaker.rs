//! `DirectSpeaker`-type gain calculator: routes a named nominal speaker
//! channel straight to the matching output channel, falling back to the
//! mapping-rule table or, failing that, the point-source panner
//! (Rec. ITU-R BS.2127-0 sec. 7.3.10, adapted from BBC libear's
//! `direct_speakers` rule matching).

use crate::layout::{nominal_speaker_label, Layout};
use crate::metadata::{DirectSpeakerMetadata, PolarBounds};
use crate::panner::PointSourcePannerGainCalc;
use crate::tables::{self, MAPPING_RULES};

/// True when `position` (resolved against the channel's screen-edge-lock, if
/// any) falls within `bounds` on every axis, inclusive at both ends (see
/// DESIGN.md for the `insideAngleRange` boundary-convention decision).
fn within_bounds(position: crate::coordinates::PolarPosition, bounds: &PolarBounds) -> bool {
    crate::coordinates::inside_angle_range(position.azimuth, bounds.min_azimuth, bounds.max_azimuth, 0.0)
        && position.elevation >= bounds.min_elevation
        && position.elevation <= bounds.max_elevation
        && position.distance >= bounds.min_distance
        && position.distance <= bounds.max_distance
}

pub struct DirectSpeakerGainCalculator {
    layout: Layout,
    fallback_panner: PointSourcePannerGainCalc,
}

impl DirectSpeakerGainCalculator {
    pub fn new(layout: &Layout) -> Self {
        Self { layout: layout.clone(), fallback_panner: PointSourcePannerGainCalc::new(layout) }
    }

    pub fn calculate_gains(&self, metadata: &DirectSpeakerMetadata) -> Vec<f64> {
        let mut gains = vec![0.0; self.layout.channels.len()];
        let label = nominal_speaker_label(&metadata.speaker_label);

        if metadata.is_lfe {
            if let Some(idx) = self.layout.channels.iter().position(|c| c.is_lfe) {
                gains[idx] = metadata.gain;
            }
            return gains;
        }

        if let Some(idx) = self.layout.matching_channel_index(&label) {
            gains[idx] = metadata.gain;
            return gains;
        }

        let input_layout = metadata.audio_pack_format_id.as_deref().and_then(tables::itu_pack_layout);
        if let Some(rule) = MAPPING_RULES.iter().find(|r| {
            r.speaker_label == label
                && r.output_layouts.contains(&self.layout.name.as_str())
                && (r.input_layouts.is_empty() || input_layout.is_some_and(|l| r.input_layouts.contains(&l)))
        }) {
            for &(target, gain) in rule.gains {
                if let Some(idx) = self.layout.matching_channel_index(target) {
                    gains[idx] += metadata.gain * gain;
                }
            }
            return gains;
        }

        if let Some(bounds) = &metadata.bounds {
            let mut candidates: Vec<usize> = self
                .layout
                .channels
                .iter()
                .enumerate()
                .filter(|(_, c)| !c.is_lfe && within_bounds(c.polar_position_nominal, bounds))
                .map(|(i, _)| i)
                .collect();

            if !candidates.is_empty() {
                if candidates.len() > 1 {
                    if let Some(nominal) = metadata.nominal_position {
                        let target = nominal.to_cartesian().unit();
                        let dist = |p: crate::coordinates::CartesianPosition| {
                            let d = [target.x - p.x, target.y - p.y, target.z - p.z];
                            (d[0] * d[0] + d[1] * d[1] + d[2] * d[2]).sqrt()
                        };
                        candidates.sort_by(|&a, &b| {
                            let da = dist(self.layout.channels[a].polar_position_nominal.to_cartesian().unit());
                            let db = dist(self.layout.channels[b].polar_position_nominal.to_cartesian().unit());
                            da.partial_cmp(&db).unwrap()
                        });
                    } else {
                        candidates.sort_by(|&a, &b| {
                            let pa = self.layout.channels[a].polar_position_nominal;
                            let pb = self.layout.channels[b].polar_position_nominal;
                            let ka = (pa.azimuth.abs(), pa.azimuth, pa.elevation.abs(), pa.elevation);
                            let kb = (pb.azimuth.abs(), pb.azimuth, pb.elevation.abs(), pb.elevation);
                            ka.partial_cmp(&kb).unwrap()
                        });
                    }
                }
                gains[candidates[0]] = metadata.gain;
                return gains;
            }
        }

        if let Some(position) = tables::bs2094_position(&label) {
            let panned = self.fallback_panner.calculate_gains(position.to_cartesian().as_array());
            for (g, p) in gains.iter_mut().zip(panned.iter()) {
                *g = metadata.gain * p;
            }
        }
        gains
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_channel_name_match_is_passthrough() {
        let layout = tables::matching_layout("0+5+0").unwrap();
        let calc = DirectSpeakerGainCalculator::new(&layout);
        let metadata = DirectSpeakerMetadata {
            track_index: 0,
            speaker_label: "M+030".to_string(),
            audio_pack_format_id: None,
            gain: 1.0,
            is_lfe: false,
            nominal_position: None,
            bounds: None,
            screen_edge_lock: Default::default(),
        };
        let gains = calc.calculate_gains(&metadata);
        let idx = layout.matching_channel_index("M+030").unwrap();
        assert_eq!(gains[idx], 1.0);
    }

    #[test]
    fn lfe_flag_routes_straight_to_lfe_channel() {
        let layout = tables::matching_layout("0+5+0").unwrap();
        let calc = DirectSpeakerGainCalculator::new(&layout);
        let metadata = DirectSpeakerMetadata {
            track_index: 0,
            speaker_label: "LFE".to_string(),
            audio_pack_format_id: None,
            gain: 0.8,
            is_lfe: true,
            nominal_position: None,
            bounds: None,
            screen_edge_lock: Default::default(),
        };
        let gains = calc.calculate_gains(&metadata);
        let lfe_idx = layout.matching_channel_index("LFE1").unwrap();
        assert_eq!(gains[lfe_idx], 0.8);
    }

    #[test]
    fn u180_folds_down_via_mapping_rule_into_2plus5plus0() {
        let layout = tables::matching_layout("2+5+0").unwrap();
        let calc = DirectSpeakerGainCalculator::new(&layout);
        let metadata = DirectSpeakerMetadata {
            track_index: 0,
            speaker_label: "U+180".to_string(),
            audio_pack_format_id: Some("AP_00010004".to_string()),
            gain: 1.0,
            is_lfe: false,
            nominal_position: None,
            bounds: None,
            screen_edge_lock: Default::default(),
        };
        let gains = calc.calculate_gains(&metadata);
        let u_l = layout.matching_channel_index("U+030").unwrap();
        let u_r = layout.matching_channel_index("U-030").unwrap();
        assert!((gains[u_l] - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-9);
        assert!((gains[u_r] - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-9);
    }

    #[test]
    fn empty_label_falls_back_to_bounds_search() {
        use crate::coordinates::PolarPosition;
        use crate::metadata::PolarBounds;

        let layout = tables::matching_layout("0+5+0").unwrap();
        let calc = DirectSpeakerGainCalculator::new(&layout);
        let metadata = DirectSpeakerMetadata {
            track_index: 0,
            speaker_label: String::new(),
            audio_pack_format_id: None,
            gain: 1.0,
            is_lfe: false,
            nominal_position: Some(PolarPosition::new(28.0, 5.0, 1.0)),
            bounds: Some(PolarBounds {
                min_azimuth: 25.0,
                max_azimuth: 35.0,
                min_elevation: -10.0,
                max_elevation: 10.0,
                min_distance: 0.9,
                max_distance: 1.1,
            }),
            screen_edge_lock: Default::default(),
        };
        let gains = calc.calculate_gains(&metadata);
        let idx = layout.matching_channel_index("M+030").unwrap();
        assert_eq!(gains[idx], 1.0);
        assert_eq!(gains.iter().filter(|&&g| g != 0.0).count(), 1);
    }
}
