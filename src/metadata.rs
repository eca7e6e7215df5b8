//! Per-block input metadata for each ADM content type: `Object`,
//! `DirectSpeaker`, `HOA`, and `Binaural`.

use crate::coordinates::{CartesianPosition, PolarPosition};
use crate::layout::Screen;

/// Horizontal/vertical screen-edge-lock flags (Rec. ITU-R BS.2127-0 sec. 7.3.3.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HorizontalEdge {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerticalEdge {
    Top,
    Bottom,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScreenEdgeLock {
    pub horizontal: Option<HorizontalEdge>,
    pub vertical: Option<VerticalEdge>,
}

/// Channel-lock metadata: snap the rendered position to the nearest real
/// loudspeaker within `max_distance`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelLock {
    pub max_distance: f64,
}

/// Object divergence: split a source into three virtual positions spread
/// about the nominal azimuth.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectDivergence {
    pub value: f64,
    pub azimuth_range: f64,
}

/// A polar exclusion zone: objects within these (inclusive) azimuth and
/// elevation bounds are excluded from direct rendering to channels inside it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoneExclusionPolar {
    pub min_elevation: f64,
    pub max_elevation: f64,
    pub min_azimuth: f64,
    pub max_azimuth: f64,
}

/// Position of an `Object`, either polar or Cartesian. Extent is carried
/// alongside using the matching representation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ObjectPosition {
    Polar(PolarPosition),
    Cartesian(CartesianPosition),
}

/// Signals a discontinuous position jump: when `flag` is set, the gain
/// interpolator fades over `interpolation_length` samples instead of the
/// full block (Rec. ITU-R BS.2127-0 sec. 7.4, `jumpPosition`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JumpPosition {
    pub flag: bool,
    pub interpolation_length: usize,
}

impl Default for JumpPosition {
    fn default() -> Self {
        Self { flag: false, interpolation_length: 0 }
    }
}

/// Per-block metadata for an `Object` type channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectMetadata {
    /// Index into the configured `streamInfo` this block belongs to.
    pub track_index: usize,
    pub position: ObjectPosition,
    pub gain: f64,
    /// Polar extent in degrees: width, height, depth. Zero for a point source.
    pub width: f64,
    pub height: f64,
    pub depth: f64,
    pub diffuse: f64,
    pub channel_lock: Option<ChannelLock>,
    pub divergence: Option<ObjectDivergence>,
    pub zone_exclusion: Vec<ZoneExclusionPolar>,
    pub screen_ref: bool,
    pub screen_edge_lock: ScreenEdgeLock,
    /// Screen the position is authored against when `screen_ref` is set;
    /// `None` falls back to the canonical default screen.
    pub reference_screen: Option<Screen>,
    pub cartesian: bool,
    pub jump_position: JumpPosition,
    /// Number of samples in this block; used as the default interpolation
    /// window when `jump_position.flag` is unset.
    pub block_length: usize,
}

impl Default for ObjectMetadata {
    fn default() -> Self {
        Self {
            track_index: 0,
            position: ObjectPosition::Polar(PolarPosition::new(0.0, 0.0, 1.0)),
            gain: 1.0,
            width: 0.0,
            height: 0.0,
            depth: 0.0,
            diffuse: 0.0,
            channel_lock: None,
            divergence: None,
            zone_exclusion: Vec::new(),
            screen_ref: false,
            screen_edge_lock: ScreenEdgeLock::default(),
            reference_screen: None,
            cartesian: false,
            jump_position: JumpPosition::default(),
            block_length: 0,
        }
    }
}

/// Authoring tolerance bounds around a `DirectSpeaker`'s nominal position,
/// used by the bounds-based fallback search (Rec. ITU-R BS.2127-0 sec. 7.3.10
/// step 4) when neither an exact nominal-label match nor a mapping rule
/// applies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolarBounds {
    pub min_azimuth: f64,
    pub max_azimuth: f64,
    pub min_elevation: f64,
    pub max_elevation: f64,
    pub min_distance: f64,
    pub max_distance: f64,
}

/// Per-block metadata for a `DirectSpeaker` type channel: a nominal speaker
/// label plus an `audioPackFormat` ID used to pick the applicable mapping
/// rule and LFE routing, and the authoring position/bounds used by the
/// bounds-based fallback search when the label doesn't resolve directly.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectSpeakerMetadata {
    pub track_index: usize,
    pub speaker_label: String,
    pub audio_pack_format_id: Option<String>,
    pub gain: f64,
    pub is_lfe: bool,
    pub nominal_position: Option<PolarPosition>,
    pub bounds: Option<PolarBounds>,
    pub screen_edge_lock: ScreenEdgeLock,
}

/// HOA normalisation scheme carried by a track's metadata. Only `Sn3d` is
/// supported; any other value triggers a `WarnSkippedTrack` at the renderer
/// façade rather than silently mis-scaling the decoded field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoaNormalization {
    Sn3d,
    Other,
}

/// Per-block metadata for an `HOA` type track: ACN channel index and the
/// track's declared normalisation scheme.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HoaMetadata {
    pub track_index: usize,
    pub acn_index: u16,
    pub gain: f64,
    pub normalization: HoaNormalization,
}

/// Per-block metadata for a `Binaural` type track: passthrough gain only,
/// no panning is applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinauralMetadata {
    pub track_index: usize,
    pub gain: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_metadata_default_is_point_source_at_front() {
        let m = ObjectMetadata::default();
        assert_eq!(m.width, 0.0);
        assert_eq!(m.gain, 1.0);
        match m.position {
            ObjectPosition::Polar(p) => assert_eq!(p.azimuth, 0.0),
            _ => panic!("expected polar default"),
        }
    }
}
