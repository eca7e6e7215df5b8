//! Full `Object`-type gain calculator: screen-scale -> screen-edge-lock ->
//! channel-lock -> divergence -> polar-extent panning -> zone-exclusion ->
//! overall gain -> direct/diffuse split (Rec. ITU-R BS.2127-0 sec. 7.3).

use crate::gain::{channel_lock, divergence, screen, zone_exclusion::ZoneExclusionHandler};
use crate::layout::Layout;
use crate::metadata::{ObjectMetadata, ObjectPosition};
use crate::panner::PolarExtentHandler;

pub struct ObjectGainCalculator {
    layout: Layout,
    extent: PolarExtentHandler,
    zone_exclusion: ZoneExclusionHandler,
}

/// Direct and diffuse gain vectors for one block, one channel per
/// `layout` speaker.
pub struct ObjectGains {
    pub direct: Vec<f64>,
    pub diffuse: Vec<f64>,
}

impl ObjectGainCalculator {
    pub fn new(layout: &Layout) -> Self {
        Self {
            layout: layout.clone(),
            extent: PolarExtentHandler::new(layout),
            zone_exclusion: ZoneExclusionHandler::new(layout),
        }
    }

    pub fn calculate_gains(&self, metadata: &ObjectMetadata) -> ObjectGains {
        let mut polar = match metadata.position {
            ObjectPosition::Polar(p) => p,
            ObjectPosition::Cartesian(c) => {
                log::warn!("object using Cartesian position; converting via the classical spherical mapping");
                c.to_polar()
            }
        };

        polar = screen::handle(polar, metadata.screen_ref, metadata.reference_screen.as_ref(), self.layout.reproduction_screen.as_ref());
        polar = screen::handle_edge_lock(polar, metadata.screen_edge_lock, self.layout.reproduction_screen.as_ref());

        if let Some(lock) = metadata.channel_lock {
            let cart = channel_lock::handle(polar.to_cartesian(), &self.layout, lock.max_distance);
            polar = cart.to_polar();
        }

        let diverged = divergence::diverged_positions_and_gains(polar, metadata.divergence);

        let mut gains = vec![0.0; self.layout.channels.len()];
        for (pos, weight) in diverged {
            let g = self.extent.handle(pos, metadata.width, metadata.height, metadata.depth);
            for (acc, v) in gains.iter_mut().zip(g.iter()) {
                *acc += weight * v * v;
            }
        }
        for g in &mut gains {
            *g = g.sqrt();
        }

        gains = self.zone_exclusion.handle(&gains, &metadata.zone_exclusion);
        for g in &mut gains {
            *g *= metadata.gain;
        }

        let direct_coefficient = (1.0 - metadata.diffuse).max(0.0).sqrt();
        let diffuse_coefficient = metadata.diffuse.max(0.0).sqrt();
        let direct = gains.iter().map(|g| g * direct_coefficient).collect();
        let diffuse = gains.iter().map(|g| g * diffuse_coefficient).collect();
        ObjectGains { direct, diffuse }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables;

    #[test]
    fn point_source_is_fully_direct_by_default() {
        let layout = tables::matching_layout("0+5+0").unwrap();
        let calc = ObjectGainCalculator::new(&layout);
        let metadata = ObjectMetadata::default();
        let gains = calc.calculate_gains(&metadata);
        assert!(gains.direct.iter().any(|&g| g > 0.0));
        assert!(gains.diffuse.iter().all(|&g| g == 0.0));
    }

    #[test]
    fn fully_diffuse_object_has_no_direct_energy() {
        let layout = tables::matching_layout("0+5+0").unwrap();
        let calc = ObjectGainCalculator::new(&layout);
        let metadata = ObjectMetadata { diffuse: 1.0, ..ObjectMetadata::default() };
        let gains = calc.calculate_gains(&metadata);
        assert!(gains.direct.iter().all(|&g| g.abs() < 1e-12));
        assert!(gains.diffuse.iter().any(|&g| g > 0.0));
    }
}
