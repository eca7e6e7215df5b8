//! Screen-scale and screen-edge-lock: remaps a polar position relative to
//! the reproduction screen's edges (Rec. ITU-R BS.2127-0 sec. 7.3.3).

use crate::coordinates::{interp, PolarPosition};
use crate::layout::{PolarEdges, Screen};
use crate::metadata::{HorizontalEdge, ScreenEdgeLock, VerticalEdge};

/// Scales a position's azimuth/elevation from the object's reference
/// screen's edges onto the reproduction screen's actual edges. No-op
/// unless the object is `screenRef` and a reproduction screen is
/// configured. `reference_screen` defaults to the canonical screen
/// (`Screen::default()`) when the object does not carry its own.
pub fn handle(
    position: PolarPosition,
    screen_ref: bool,
    reference_screen: Option<&Screen>,
    reproduction_screen: Option<&Screen>,
) -> PolarPosition {
    let Some(repro) = reproduction_screen else {
        return position;
    };
    if !screen_ref {
        return position;
    }
    let repro_edges = PolarEdges::from_screen(repro);
    let default_ref = Screen::default();
    let ref_edges = PolarEdges::from_screen(reference_screen.unwrap_or(&default_ref));
    scale_az_el(position, &ref_edges, &repro_edges)
}

fn scale_az_el(position: PolarPosition, from: &PolarEdges, to: &PolarEdges) -> PolarPosition {
    let az = interp(position.azimuth, &[-180.0, from.right_azimuth, from.left_azimuth, 180.0], &[-180.0, to.right_azimuth, to.left_azimuth, 180.0]);
    let el = interp(position.elevation, &[-90.0, from.bottom_elevation, from.top_elevation, 90.0], &[-90.0, to.bottom_elevation, to.top_elevation, 90.0]);
    PolarPosition::new(az, el, position.distance)
}

/// Snaps azimuth/elevation to the left/right or top/bottom screen edge
/// when the corresponding lock flag is set. No-op if both flags are unset.
pub fn handle_edge_lock(position: PolarPosition, lock: ScreenEdgeLock, reproduction_screen: Option<&Screen>) -> PolarPosition {
    if lock.horizontal.is_none() && lock.vertical.is_none() {
        return position;
    }
    let Some(screen) = reproduction_screen else {
        return position;
    };
    let edges = PolarEdges::from_screen(screen);

    let az = match lock.horizontal {
        Some(HorizontalEdge::Left) => edges.left_azimuth,
        Some(HorizontalEdge::Right) => edges.right_azimuth,
        None => position.azimuth,
    };
    let el = match lock.vertical {
        Some(VerticalEdge::Top) => edges.top_elevation,
        Some(VerticalEdge::Bottom) => edges.bottom_elevation,
        None => position.elevation,
    };
    PolarPosition::new(az, el, position.distance)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_reproduction_screen_is_identity() {
        let pos = PolarPosition::new(10.0, 5.0, 1.0);
        assert_eq!(handle(pos, true, None, None), pos);
    }

    #[test]
    fn not_screen_ref_is_identity() {
        let pos = PolarPosition::new(10.0, 5.0, 1.0);
        let screen = Screen::default();
        assert_eq!(handle(pos, false, None, Some(&screen)), pos);
    }

    #[test]
    fn matching_reference_and_reproduction_screens_is_identity() {
        let pos = PolarPosition::new(10.0, 5.0, 1.0);
        let screen = Screen::default();
        let scaled = handle(pos, true, Some(&screen), Some(&screen));
        assert!((scaled.azimuth - pos.azimuth).abs() < 1e-9);
        assert!((scaled.elevation - pos.elevation).abs() < 1e-9);
    }

    #[test]
    fn narrower_reproduction_screen_compresses_azimuth_toward_centre() {
        let pos = PolarPosition::new(10.0, 0.0, 1.0);
        let reference = Screen::default();
        let reproduction = Screen { width_azimuth: reference.width_azimuth / 2.0, ..Screen::default() };
        let scaled = handle(pos, true, Some(&reference), Some(&reproduction));
        assert!(scaled.azimuth.abs() < pos.azimuth.abs());
    }

    #[test]
    fn edge_lock_snaps_to_left_edge() {
        let pos = PolarPosition::new(10.0, 5.0, 1.0);
        let screen = Screen::default();
        let lock = ScreenEdgeLock { horizontal: Some(HorizontalEdge::Left), vertical: None };
        let locked = handle_edge_lock(pos, lock, Some(&screen));
        let edges = PolarEdges::from_screen(&screen);
        assert!((locked.azimuth - edges.left_azimuth).abs() < 1e-9);
        assert_eq!(locked.elevation, pos.elevation);
    }
}
