//! Object divergence: splits one source into three virtual sources spread
//! about the nominal azimuth (Rec. ITU-R BS.2127-0 sec. 7.3.4).

use crate::coordinates::PolarPosition;
use crate::metadata::ObjectDivergence;

/// Returns `(position, weight)` for each virtual source. With no
/// divergence, a single entry at the original position and weight 1.
pub fn diverged_positions_and_gains(position: PolarPosition, divergence: Option<ObjectDivergence>) -> Vec<(PolarPosition, f64)> {
    let Some(div) = divergence else {
        return vec![(position, 1.0)];
    };
    if div.value <= 0.0 {
        return vec![(position, 1.0)];
    }

    let x = div.value;
    let range = div.azimuth_range * x;
    let centre_gain = (1.0 - x) / (1.0 + x);
    let side_gain = x / (1.0 + x);

    vec![
        (position, centre_gain),
        (PolarPosition::new(position.azimuth + range, position.elevation, position.distance), side_gain),
        (PolarPosition::new(position.azimuth - range, position.elevation, position.distance), side_gain),
    ]
}
