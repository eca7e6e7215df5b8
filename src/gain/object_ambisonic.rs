//! `Object`-type gain calculator for binaural output: screen-scale ->
//! screen-edge-lock -> divergence -> polar-extent Ambisonic encode ->
//! overall gain -> direct/diffuse split, producing SN3D/ACN coefficient
//! vectors instead of loudspeaker gains (Rec. ITU-R BS.2127-0 sec. 7.3 /
//! sec. 9). Channel-lock and zone-exclusion are loudspeaker-bed concepts
//! with no analogue against a continuous Ambisonic sound field and are
//! skipped here; see DESIGN.md.

use crate::ambisonic::{AmbisonicExtentHandler, HoaOrder};
use crate::gain::{divergence, screen};
use crate::layout::Screen;
use crate::metadata::{ObjectMetadata, ObjectPosition};

pub struct AmbisonicObjectGainCalculator {
    extent: AmbisonicExtentHandler,
    reproduction_screen: Option<Screen>,
}

/// Direct and diffuse per-ACN-channel coefficient vectors for one block.
pub struct ObjectAmbisonicGains {
    pub direct: Vec<f64>,
    pub diffuse: Vec<f64>,
}

impl AmbisonicObjectGainCalculator {
    pub fn new(order: HoaOrder, reproduction_screen: Option<Screen>) -> Self {
        Self { extent: AmbisonicExtentHandler::new(order), reproduction_screen }
    }

    pub fn calculate_gains(&self, metadata: &ObjectMetadata) -> ObjectAmbisonicGains {
        let mut polar = match metadata.position {
            ObjectPosition::Polar(p) => p,
            ObjectPosition::Cartesian(c) => {
                log::warn!("object using Cartesian position; converting via the classical spherical mapping");
                c.to_polar()
            }
        };

        polar = screen::handle(polar, metadata.screen_ref, metadata.reference_screen.as_ref(), self.reproduction_screen.as_ref());
        polar = screen::handle_edge_lock(polar, metadata.screen_edge_lock, self.reproduction_screen.as_ref());

        let diverged = divergence::diverged_positions_and_gains(polar, metadata.divergence);

        let mut coeffs = vec![0.0; self.extent.channel_count()];
        for (pos, weight) in diverged {
            let c = self.extent.handle(pos, metadata.width, metadata.height, metadata.depth);
            for (acc, v) in coeffs.iter_mut().zip(c.iter()) {
                *acc += weight * v;
            }
        }
        for c in &mut coeffs {
            *c *= metadata.gain;
        }

        let direct_coefficient = (1.0 - metadata.diffuse).max(0.0).sqrt();
        let diffuse_coefficient = metadata.diffuse.max(0.0).sqrt();
        let direct = coeffs.iter().map(|c| c * direct_coefficient).collect();
        let diffuse = coeffs.iter().map(|c| c * diffuse_coefficient).collect();
        ObjectAmbisonicGains { direct, diffuse }
    }
}
