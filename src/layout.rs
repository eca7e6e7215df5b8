//! Loudspeaker channel/layout data types.

use crate::coordinates::PolarPosition;

/// A single loudspeaker (or virtual/Ambisonic) channel within a [`Layout`].
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub name: String,
    /// Real loudspeaker position as deployed.
    pub polar_position: PolarPosition,
    /// Nominal position from Rec. ITU-R BS.2051-2, authoritative for
    /// zone-exclusion and hull geometry.
    pub polar_position_nominal: PolarPosition,
    pub is_lfe: bool,
}

impl Channel {
    pub fn new(name: &str, position: PolarPosition, is_lfe: bool) -> Self {
        Self {
            name: name.to_string(),
            polar_position: position,
            polar_position_nominal: position,
            is_lfe,
        }
    }
}

/// Reproduction screen, polar or Cartesian parameterisation.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Screen {
    pub is_cartesian: bool,
    pub aspect_ratio: f64,
    pub centre_polar: PolarPosition,
    pub width_azimuth: f64,
    pub centre_cartesian: crate::coordinates::CartesianPosition,
    pub width_x: f64,
}

impl Default for Screen {
    fn default() -> Self {
        Self {
            is_cartesian: false,
            aspect_ratio: 1.78,
            centre_polar: PolarPosition::new(0.0, 0.0, 1.0),
            width_azimuth: 58.0,
            centre_cartesian: crate::coordinates::CartesianPosition::new(0.0, 1.0, 0.0),
            width_x: 1.0,
        }
    }
}

/// Screen edges expressed as polar bounds, used by screen-scale and
/// screen-edge-lock (Rec. ITU-R BS.2127-0 sec. 7.3.3.1).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolarEdges {
    pub left_azimuth: f64,
    pub right_azimuth: f64,
    pub bottom_elevation: f64,
    pub top_elevation: f64,
}

impl PolarEdges {
    pub fn from_screen(screen: &Screen) -> Self {
        use crate::coordinates::{local_coordinate_system, CartesianPosition};

        let (centre, v_x, v_z) = if screen.is_cartesian {
            let width = screen.width_x / 2.0;
            let height = width / screen.aspect_ratio;
            (
                screen.centre_cartesian,
                CartesianPosition::new(width, 0.0, 0.0),
                CartesianPosition::new(0.0, 0.0, height),
            )
        } else {
            let az = screen.centre_polar.azimuth;
            let el = screen.centre_polar.elevation;
            let d = screen.centre_polar.distance;
            let centre = screen.centre_polar.to_cartesian();
            let width = d * (std::f64::consts::PI / 180.0 * screen.width_azimuth / 2.0).tan();
            let height = width / screen.aspect_ratio;
            let l = local_coordinate_system(az, el);
            (
                centre,
                CartesianPosition::new(l[0][0] * width, l[0][1] * width, l[0][2] * width),
                CartesianPosition::new(l[2][0] * height, l[2][1] * height, l[2][2] * height),
            )
        };

        let sub = |a: CartesianPosition, b: CartesianPosition| {
            CartesianPosition::new(a.x - b.x, a.y - b.y, a.z - b.z)
        };
        let add = |a: CartesianPosition, b: CartesianPosition| {
            CartesianPosition::new(a.x + b.x, a.y + b.y, a.z + b.z)
        };

        Self {
            left_azimuth: sub(centre, v_x).to_polar().azimuth,
            right_azimuth: add(centre, v_x).to_polar().azimuth,
            bottom_elevation: sub(centre, v_z).to_polar().elevation,
            top_elevation: add(centre, v_z).to_polar().elevation,
        }
    }
}

/// A fixed loudspeaker layout (or an HOA "layout" marker).
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    pub name: String,
    pub channels: Vec<Channel>,
    pub has_lfe: bool,
    pub is_hoa: bool,
    pub hoa_order: u8,
    pub reproduction_screen: Option<Screen>,
}

impl Layout {
    pub fn channel_names(&self) -> Vec<String> {
        self.channels.iter().map(|c| c.name.clone()).collect()
    }

    pub fn matching_channel_index(&self, name: &str) -> Option<usize> {
        self.channels.iter().position(|c| c.name == name)
    }

    /// Remove LFE channels, matching `getLayoutWithoutLFE`.
    pub fn without_lfe(&self) -> Layout {
        let mut out = self.clone();
        out.channels.retain(|c| !c.is_lfe);
        out.has_lfe = false;
        out
    }
}

/// Normalise a speaker label: strip an optional
/// `urn:itu:bs:2051:N:speaker:` prefix, and rename the legacy LFE aliases
/// per Rec. ITU-R BS.2127-0 sec. 8.3.
pub fn nominal_speaker_label(label: &str) -> String {
    let tokens: Vec<&str> = label.split(':').collect();
    let stripped = if tokens.len() == 7
        && tokens[0] == "urn"
        && tokens[1] == "itu"
        && tokens[2] == "bs"
        && tokens[3] == "2051"
        && tokens[4].parse::<i32>().is_ok()
        && tokens[5] == "speaker"
    {
        tokens[6]
    } else {
        label
    };

    match stripped {
        "LFE" | "LFEL" => "LFE1".to_string(),
        "LFER" => "LFE2".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_urn_prefix() {
        assert_eq!(nominal_speaker_label("urn:itu:bs:2051:0:speaker:M+030"), "M+030");
    }

    #[test]
    fn renames_lfe_aliases() {
        assert_eq!(nominal_speaker_label("LFE"), "LFE1");
        assert_eq!(nominal_speaker_label("LFEL"), "LFE1");
        assert_eq!(nominal_speaker_label("LFER"), "LFE2");
    }

    #[test]
    fn without_lfe_drops_lfe_channels() {
        let layout = Layout {
            name: "test".into(),
            channels: vec![
                Channel::new("M+000", PolarPosition::new(0.0, 0.0, 1.0), false),
                Channel::new("LFE1", PolarPosition::new(45.0, -30.0, 1.0), true),
            ],
            has_lfe: true,
            is_hoa: false,
            hoa_order: 0,
            reproduction_screen: None,
        };
        let stripped = layout.without_lfe();
        assert_eq!(stripped.channels.len(), 1);
        assert!(!stripped.has_lfe);
    }
}
