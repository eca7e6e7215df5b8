//! Immutable reference data: BS.2094 nominal speaker positions, the fixed
//! set of supported loudspeaker layouts and their convex-hull
//! triangulations, the ITU audioPackFormat table, and the DirectSpeaker
//! mapping rules (adapted from the BBC libear mapping-rule table).
//!
//! All tables here are read-only static data, computed once per process,
//! matching the reference renderer's file-scope tables (SPEC_FULL.md §9).

use std::sync::LazyLock;

use crate::coordinates::PolarPosition;
use crate::layout::{Channel, Layout};

/// Rec. ITU-R BS.2094-1 Table 1: nominal directions of named audio channels.
pub static BS2094_POSITIONS: LazyLock<Vec<(&'static str, PolarPosition)>> = LazyLock::new(|| {
    vec![
        ("M+030", PolarPosition::new(30.0, 0.0, 1.0)),
        ("M-030", PolarPosition::new(-30.0, 0.0, 1.0)),
        ("M+000", PolarPosition::new(0.0, 0.0, 1.0)),
        ("LFE", PolarPosition::new(0.0, -30.0, 1.0)),
        ("M+110", PolarPosition::new(110.0, 0.0, 1.0)),
        ("M-110", PolarPosition::new(-110.0, 0.0, 1.0)),
        ("M+022", PolarPosition::new(22.5, 0.0, 1.0)),
        ("M-022", PolarPosition::new(-22.5, 0.0, 1.0)),
        ("M+180", PolarPosition::new(180.0, 0.0, 1.0)),
        ("M+090", PolarPosition::new(90.0, 0.0, 1.0)),
        ("M-090", PolarPosition::new(-90.0, 0.0, 1.0)),
        ("T+000", PolarPosition::new(0.0, 90.0, 1.0)),
        ("U+030", PolarPosition::new(30.0, 30.0, 1.0)),
        ("U+000", PolarPosition::new(0.0, 30.0, 1.0)),
        ("U-030", PolarPosition::new(-30.0, 30.0, 1.0)),
        ("U+110", PolarPosition::new(110.0, 30.0, 1.0)),
        ("U+180", PolarPosition::new(180.0, 30.0, 1.0)),
        ("U-110", PolarPosition::new(-110.0, 30.0, 1.0)),
        ("U+090", PolarPosition::new(90.0, 30.0, 1.0)),
        ("U-090", PolarPosition::new(-90.0, 30.0, 1.0)),
        ("B+000", PolarPosition::new(0.0, -30.0, 1.0)),
        ("B+045", PolarPosition::new(45.0, -30.0, 1.0)),
        ("B-045", PolarPosition::new(-45.0, -30.0, 1.0)),
        ("B+060", PolarPosition::new(60.0, -30.0, 1.0)),
        ("B-060", PolarPosition::new(-60.0, -30.0, 1.0)),
        ("M+135", PolarPosition::new(135.0, 0.0, 1.0)),
        ("M-135", PolarPosition::new(-135.0, 0.0, 1.0)),
        ("U+135", PolarPosition::new(135.0, 30.0, 1.0)),
        ("U-135", PolarPosition::new(-135.0, 30.0, 1.0)),
        ("LFE1", PolarPosition::new(45.0, -30.0, 1.0)),
        ("LFE2", PolarPosition::new(-45.0, -30.0, 1.0)),
        ("U+045", PolarPosition::new(45.0, 0.0, 1.0)),
        ("U-045", PolarPosition::new(-45.0, 0.0, 1.0)),
        ("M+SC", PolarPosition::new(25.0, 0.0, 1.0)),
        ("M-SC", PolarPosition::new(-25.0, 0.0, 1.0)),
        ("M+045", PolarPosition::new(45.0, 0.0, 1.0)),
        ("M-045", PolarPosition::new(-45.0, 0.0, 1.0)),
        ("UH+180", PolarPosition::new(180.0, 45.0, 1.0)),
    ]
});

pub fn bs2094_position(label: &str) -> Option<PolarPosition> {
    BS2094_POSITIONS.iter().find(|(n, _)| *n == label).map(|(_, p)| *p)
}

fn channel(name: &str, is_lfe: bool) -> Channel {
    let pos = bs2094_position(name).expect("channel name must be a known BS.2094 label");
    Channel::new(name, pos, is_lfe)
}

/// The fixed set of loudspeaker layouts supported by the point-source
/// panner, plus the pure-Ambisonic "layouts" used to mark HOA track order.
pub static SPEAKER_LAYOUTS: LazyLock<Vec<Layout>> = LazyLock::new(|| {
    let bed = |name: &str, chans: Vec<Channel>, has_lfe: bool| Layout {
        name: name.to_string(),
        channels: chans,
        has_lfe,
        is_hoa: false,
        hoa_order: 0,
        reproduction_screen: None,
    };

    vec![
        bed("0+2+0", vec![channel("M+030", false), channel("M-030", false)], false),
        bed(
            "0+4+0",
            vec![
                channel("M+045", false),
                channel("M-045", false),
                channel("M+135", false),
                channel("M-135", false),
            ],
            false,
        ),
        bed(
            "0+5+0",
            vec![
                channel("M+030", false),
                channel("M-030", false),
                channel("M+000", false),
                channel("LFE1", true),
                channel("M+110", false),
                channel("M-110", false),
            ],
            true,
        ),
        bed(
            "2+5+0",
            vec![
                channel("M+030", false),
                channel("M-030", false),
                channel("M+000", false),
                channel("LFE1", true),
                channel("M+110", false),
                channel("M-110", false),
                channel("U+030", false),
                channel("U-030", false),
            ],
            true,
        ),
        bed(
            "0+7+0",
            vec![
                channel("M+030", false),
                channel("M-030", false),
                channel("M+000", false),
                channel("LFE1", true),
                channel("M+090", false),
                channel("M-090", false),
                channel("M+135", false),
                channel("M-135", false),
            ],
            true,
        ),
    ]
});

pub fn matching_layout(name: &str) -> Option<Layout> {
    SPEAKER_LAYOUTS.iter().find(|l| l.name == name).cloned()
}

/// Maps an `AP_XXXXXXXX` audioPackFormatID to its ITU layout name.
pub static ITU_PACKS: LazyLock<Vec<(&'static str, &'static str)>> = LazyLock::new(|| {
    vec![
        ("AP_00010001", "0+2+0"),
        ("AP_00010002", "0+5+0"),
        ("AP_00010003", "2+5+0"),
        ("AP_00010004", "9+10+3"),
        ("AP_00010005", "0+7+0"),
    ]
});

pub fn itu_pack_layout(pack_id: &str) -> Option<&'static str> {
    ITU_PACKS.iter().find(|(id, _)| *id == pack_id).map(|(_, name)| *name)
}

/// A DirectSpeaker remapping rule, adapted from the BBC libear mapping-rule
/// table embedded in the reference renderer (source/libear/src/direct_speakers/mapping_rules.hpp).
#[derive(Debug, Clone)]
pub struct MappingRule {
    pub speaker_label: &'static str,
    pub gains: &'static [(&'static str, f64)],
    pub input_layouts: &'static [&'static str],
    pub output_layouts: &'static [&'static str],
}

/// A representative subset of the mapping-rule table: downmixing of
/// speaker positions absent from a given output layout onto the nearest
/// pair present in it. `U+180` (rear-top centre of a 9+10+3-class input)
/// folds onto the upper side-pair when rendering to `2+5+0`.
pub static MAPPING_RULES: &[MappingRule] = &[
    MappingRule {
        speaker_label: "U+180",
        gains: &[("U+030", std::f64::consts::FRAC_1_SQRT_2), ("U-030", std::f64::consts::FRAC_1_SQRT_2)],
        input_layouts: &["9+10+3"],
        output_layouts: &["2+5+0"],
    },
    MappingRule {
        speaker_label: "M+SC",
        gains: &[("M+030", 1.0)],
        input_layouts: &[],
        output_layouts: &["0+2+0", "0+5+0", "2+5+0", "0+7+0"],
    },
    MappingRule {
        speaker_label: "M-SC",
        gains: &[("M-030", 1.0)],
        input_layouts: &[],
        output_layouts: &["0+2+0", "0+5+0", "2+5+0", "0+7+0"],
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layouts_have_known_channel_names() {
        let layout = matching_layout("0+5+0").unwrap();
        assert_eq!(layout.channels.len(), 6);
        assert!(layout.channel_names().contains(&"M+030".to_string()));
    }

    #[test]
    fn itu_pack_lookup() {
        assert_eq!(itu_pack_layout("AP_00010004"), Some("9+10+3"));
        assert_eq!(itu_pack_layout("AP_unknown"), None);
    }

    #[test]
    fn u180_rule_targets_upper_side_pair() {
        let rule = MAPPING_RULES.iter().find(|r| r.speaker_label == "U+180").unwrap();
        assert_eq!(rule.gains.len(), 2);
    }
}
