//! Polar/Cartesian position types and the two distinct conversions used by
//! the renderer: the classical spherical mapping used internally by the
//! panner and extent machinery, and the piecewise-non-linear ADM metadata
//! conversion used only to translate authoring positions between the two
//! ADM metadata conventions (Rec. ITU-R BS.2127-0 sec. 10).

use std::f64::consts::PI;

const DEG2RAD: f64 = PI / 180.0;
const RAD2DEG: f64 = 180.0 / PI;

/// ADM polar position: azimuth° anti-clockwise from front, elevation°
/// positive upwards, distance >= 0.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PolarPosition {
    pub azimuth: f64,
    pub elevation: f64,
    pub distance: f64,
}

impl PolarPosition {
    pub const fn new(azimuth: f64, elevation: f64, distance: f64) -> Self {
        Self { azimuth, elevation, distance }
    }

    /// Classical spherical -> Cartesian mapping (Rec. ITU-R BS.2127-0 pg 33).
    /// +x = right, +y = front, +z = up.
    pub fn to_cartesian(self) -> CartesianPosition {
        let az = DEG2RAD * self.azimuth;
        let el = DEG2RAD * self.elevation;
        let d = self.distance;
        CartesianPosition {
            x: (-az).sin() * el.cos() * d,
            y: (-az).cos() * el.cos() * d,
            z: el.sin() * d,
        }
    }
}

/// ADM Cartesian position (+x right, +y front, +z up) — distinct from the
/// Ambisonic axis convention.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CartesianPosition {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl CartesianPosition {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn norm(self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn unit(self) -> Self {
        let n = self.norm();
        Self { x: self.x / n, y: self.y / n, z: self.z / n }
    }

    pub fn as_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    /// Classical Cartesian -> spherical mapping (Rec. ITU-R BS.2127-0 pg 33).
    pub fn to_polar(self) -> PolarPosition {
        let (x, y, z) = (self.x, self.y, self.z);
        PolarPosition {
            azimuth: -RAD2DEG * x.atan2(y),
            elevation: RAD2DEG * z.atan2((x * x + y * y).sqrt()),
            distance: (x * x + y * y + z * z).sqrt(),
        }
    }
}

pub fn norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

pub fn sub(a: &[f64], b: &[f64]) -> Vec<f64> {
    a.iter().zip(b).map(|(x, y)| x - y).collect()
}

/// Sign with a 1e-5 dead zone, matching the reference tolerance.
pub fn sgn(x: f64) -> i32 {
    const TOL: f64 = 1e-5;
    if x > TOL {
        1
    } else if x < -TOL {
        -1
    } else {
        0
    }
}

pub fn convert_to_range_360(input: f64) -> f64 {
    let mut out = input;
    while out < -1e-10 {
        out += 360.0;
    }
    while out >= 360.0 + 1e-10 {
        out -= 360.0;
    }
    out
}

pub fn convert_to_range_m180_180(input: f64) -> f64 {
    let mut out = input;
    while out < -180.0 || out > 180.0 {
        if out < -180.0 {
            out += 360.0;
        } else if out > 180.0 {
            out -= 360.0;
        }
    }
    out
}

/// Find an angle equivalent to `y` that is `>= x` (Rec. ITU-R BS.2127-0 sec. 6.7).
pub fn relative_angle(x: f64, y: f64) -> f64 {
    let mut y = y;
    while y - 360.0 >= x {
        y -= 360.0;
    }
    while y < x {
        y += 360.0;
    }
    y
}

/// True if `x` lies inside `[startAngle, endAngle]` going anti-clockwise,
/// wrapping through ±180° when `startAngle > endAngle`. Inclusive at both
/// ends (Open Question in SPEC_FULL.md §9, resolved inclusive).
pub fn inside_angle_range(x: f64, start_angle: f64, end_angle: f64, tol: f64) -> bool {
    let x = convert_to_range_m180_180(x);
    let start_angle = convert_to_range_m180_180(start_angle);
    let end_angle = convert_to_range_m180_180(end_angle);
    if start_angle <= end_angle {
        x >= start_angle - tol && x <= end_angle + tol
    } else {
        x >= start_angle - tol || x <= end_angle + tol
    }
}

/// Yaw-pitch-roll rotation matrix, row-major, degrees in.
pub fn rotation_matrix(yaw_deg: f64, pitch_deg: f64, roll_deg: f64) -> [[f64; 3]; 3] {
    let yaw = yaw_deg * DEG2RAD;
    let pitch = pitch_deg * DEG2RAD;
    let roll = roll_deg * DEG2RAD;
    let (sy, cy) = yaw.sin_cos();
    let (sp, cp) = pitch.sin_cos();
    let (sr, cr) = roll.sin_cos();
    [
        [cr * cp * cy - sr * sy, -cr * cp * sy - sr * cy, cr * sp],
        [sr * cp * cy + cr * sy, -sr * cp * sy + cr * cy, sr * sp],
        [-sp * cy, sp * sy, cp],
    ]
}

pub fn mat3_vec3(m: &[[f64; 3]; 3], v: [f64; 3]) -> [f64; 3] {
    [
        m[0][0] * v[0] + m[0][1] * v[1] + m[0][2] * v[2],
        m[1][0] * v[0] + m[1][1] * v[1] + m[1][2] * v[2],
        m[2][0] * v[0] + m[2][1] * v[1] + m[2][2] * v[2],
    ]
}

/// Rotation matrix whose rows are the unit front/left/up axes of the local
/// coordinate system centred on (az, el) (Rec. ITU-R BS.2127-0 sec. 6.8).
pub fn local_coordinate_system(az_deg: f64, el_deg: f64) -> [[f64; 3]; 3] {
    let row = |az: f64, el: f64| -> [f64; 3] {
        let c = PolarPosition::new(az, el, 1.0).to_cartesian();
        [c.x, c.y, c.z]
    };
    [row(az_deg - 90.0, 0.0), row(az_deg, el_deg), row(az_deg, el_deg + 90.0)]
}

/// Inverse of a 3x3 matrix given as rows. Singular (non-invertible) inputs
/// return the zero matrix, matching the reference renderer's rejection of
/// degenerate (collinear) triplets via the all-zero gain vector.
pub fn inverse_matrix3(mat: &[[f64; 3]; 3]) -> [[f64; 3]; 3] {
    let m = nalgebra::Matrix3::new(
        mat[0][0], mat[0][1], mat[0][2],
        mat[1][0], mat[1][1], mat[1][2],
        mat[2][0], mat[2][1], mat[2][2],
    );
    let inv = m.try_inverse().unwrap_or_else(nalgebra::Matrix3::zeros);
    [
        [inv[(0, 0)], inv[(0, 1)], inv[(0, 2)]],
        [inv[(1, 0)], inv[(1, 1)], inv[(1, 2)]],
        [inv[(2, 0)], inv[(2, 1)], inv[(2, 2)]],
    ]
}

/// Piecewise-linear interpolation; `from_vals` ascending. Values outside the
/// range are returned unchanged.
pub fn interp(val: f64, from_vals: &[f64], to_vals: &[f64]) -> f64 {
    for w in 0..from_vals.len().saturating_sub(1) {
        if val >= from_vals[w] && val < from_vals[w + 1] {
            let range_from = from_vals[w + 1] - from_vals[w];
            let range_to = to_vals[w + 1] - to_vals[w];
            return (val - from_vals[w]) / range_from * range_to + to_vals[w];
        }
    }
    val
}

// ---------------------------------------------------------------------
// ADM metadata conversion (Rec. ITU-R BS.2127-0 sec. 10) — piecewise
// non-linear, sector-based. Distinct from the classical mapping above and
// used only to translate authoring positions between ADM's polar and
// Cartesian metadata parameterisations.
// ---------------------------------------------------------------------

fn map_az_to_linear(az_l: f64, az_r: f64, az: f64) -> f64 {
    let az_mid = 0.5 * (az_l + az_r);
    let az_range = az_r - az_mid;
    let az_rel = az - az_mid;
    let g_r = 0.5 * (1.0 + (DEG2RAD * az_rel).tan() / (DEG2RAD * az_range).tan());
    2.0 / PI * g_r.atan2(1.0 - g_r)
}

fn map_linear_to_az(az_l: f64, az_r: f64, x: f64) -> f64 {
    let az_mid = 0.5 * (az_l + az_r);
    let az_range = az_r - az_mid;
    let g_dash_l = (x * PI / 2.0).cos();
    let g_dash_r = (x * PI / 2.0).sin();
    let g_r = g_dash_r / (g_dash_l + g_dash_r);
    let az_rel = RAD2DEG * (2.0 * (g_r - 0.5) * (DEG2RAD * az_range).tan()).atan();
    az_mid + az_rel
}

/// `([az_l, az_r], [x_l, y_l], [x_r, y_r])` for the sector containing `az`.
type Sector = ([f64; 2], [f64; 2], [f64; 2]);

fn find_sector(az: f64) -> Sector {
    const TOL: f64 = 1e-10;
    if inside_angle_range(az, 0.0, 30.0, TOL) {
        ([30.0, 0.0], [-1.0, 1.0], [0.0, 1.0])
    } else if inside_angle_range(az, -30.0, 0.0, TOL) {
        ([0.0, -30.0], [0.0, 1.0], [1.0, 1.0])
    } else if inside_angle_range(az, -110.0, -30.0, TOL) {
        ([-30.0, -110.0], [1.0, 1.0], [1.0, -1.0])
    } else if inside_angle_range(az, 110.0, -110.0, TOL) {
        ([-110.0, 110.0], [1.0, -1.0], [-1.0, -1.0])
    } else {
        ([110.0, 30.0], [-1.0, -1.0], [-1.0, 1.0])
    }
}

fn find_cart_sector(az: f64) -> Sector {
    const TOL: f64 = 1e-10;
    if inside_angle_range(az, 0.0, 45.0, TOL) {
        ([30.0, 0.0], [-1.0, 1.0], [0.0, 1.0])
    } else if inside_angle_range(az, -45.0, 0.0, TOL) {
        ([0.0, -30.0], [0.0, 1.0], [1.0, 1.0])
    } else if inside_angle_range(az, -135.0, -45.0, TOL) {
        ([-30.0, -110.0], [1.0, 1.0], [1.0, -1.0])
    } else if inside_angle_range(az, 135.0, -135.0, TOL) {
        ([-110.0, 110.0], [1.0, -1.0], [-1.0, -1.0])
    } else {
        ([110.0, 30.0], [-1.0, -1.0], [-1.0, 1.0])
    }
}

/// Convert an ADM-authored polar position to its ADM Cartesian equivalent.
/// Not the classical spherical mapping — see module docs.
pub fn adm_polar_to_cartesian(polar: PolarPosition) -> CartesianPosition {
    let (az, el, d) = (polar.azimuth, polar.elevation, polar.distance);
    const EL_TOP: f64 = 30.0;
    const EL_DASH_TOP: f64 = 45.0;

    let (z, r_xy) = if el.abs() > EL_TOP {
        let el_dash = EL_DASH_TOP + (90.0 - EL_DASH_TOP) * (el.abs() - EL_TOP) / (90.0 - EL_TOP);
        (d * sgn(el) as f64, d * (DEG2RAD * (90.0 - el_dash)).tan())
    } else {
        let el_dash = EL_DASH_TOP * el / EL_TOP;
        (d * (DEG2RAD * el_dash).tan(), d)
    };

    let (ar, [xl, yl], [xr, yr]) = find_sector(az);
    let az_l = ar[0];
    let az_r = ar[1];
    let az_dash = relative_angle(az_r, az);
    let az_dash_l = relative_angle(az_r, az_l);
    let p = map_az_to_linear(az_dash_l, az_r, az_dash);
    let x = r_xy * (xl + p * (xr - xl));
    let y = r_xy * (yl + p * (yr - yl));
    CartesianPosition::new(x, y, z)
}

/// Convert an ADM Cartesian position to its ADM polar equivalent.
pub fn adm_cartesian_to_polar(cart: CartesianPosition) -> PolarPosition {
    let (x, y, z) = (cart.x, cart.y, cart.z);
    const EL_TOP: f64 = 30.0;
    const EL_DASH_TOP: f64 = 45.0;
    const TOL: f64 = 1e-10;

    if x.abs() < TOL && y.abs() < TOL {
        return if z.abs() < TOL {
            PolarPosition::new(0.0, 0.0, 0.0)
        } else {
            PolarPosition::new(0.0, 90.0 * sgn(z) as f64, z.abs())
        };
    }

    let az_dash = -RAD2DEG * x.atan2(y);
    let (ar, [xl, yl], [xr, yr]) = find_cart_sector(az_dash);
    let az_l = ar[0];
    let az_r = ar[1];
    let det = xl * yr - yl * xr;
    let inv = [[yr / det, -yl / det], [-xr / det, xl / det]];
    let g = [x * inv[0][0] + y * inv[1][0], x * inv[0][1] + y * inv[1][1]];
    let r_xy = g[0] + g[1];
    let az_dash_l = relative_angle(az_r, az_l);
    let az_rel = map_linear_to_az(az_dash_l, az_r, g[1] / r_xy);
    let az = relative_angle(-180.0, az_rel);
    let el_dash = RAD2DEG * (z / r_xy).atan();

    let (el, d) = if el_dash.abs() > EL_DASH_TOP {
        (
            (EL_TOP + (90.0 - EL_TOP) * (el_dash.abs() - EL_DASH_TOP) / (90.0 - EL_DASH_TOP)) * sgn(el_dash) as f64,
            z.abs(),
        )
    } else {
        (el_dash * EL_TOP / EL_DASH_TOP, r_xy)
    };

    PolarPosition::new(az, el, d)
}

/// Convert polar extent (w, h, d) to the Cartesian extent semi-axes.
pub fn whd_to_xyz(w: f64, h: f64, d: f64) -> (f64, f64, f64) {
    let s_xw = if w < 180.0 { (DEG2RAD * w * 0.5).sin() } else { 1.0 };
    let s_yw = 0.5 * (1.0 - (DEG2RAD * w * 0.5).cos());
    let s_zh = if h < 180.0 { (DEG2RAD * h * 0.5).sin() } else { 1.0 };
    let s_yh = 0.5 * (1.0 - (DEG2RAD * h * 0.5).cos());
    let s_yd = d;
    (s_xw, s_yw.max(s_yh).max(s_yd), s_zh)
}

/// Convert Cartesian extent semi-axes back to polar extent (w, h, d).
pub fn xyz_to_whd(s_x: f64, s_y: f64, s_z: f64) -> (f64, f64, f64) {
    let w_sx = 2.0 * RAD2DEG * s_x.asin();
    let w_sy = 2.0 * RAD2DEG * (1.0 - 2.0 * s_y).acos();
    let w = w_sx + s_x * (w_sy - w_sx).max(0.0);

    let h_sz = 2.0 * RAD2DEG * s_z.asin();
    let h_sy = 2.0 * RAD2DEG * (1.0 - 2.0 * s_y).acos();
    let h = h_sz + s_z * (h_sy - h_sz).max(0.0);

    let (_, s_eq_y, _) = whd_to_xyz(w, h, 0.0);
    let d = (s_y - s_eq_y).max(0.0);
    (w, h, d)
}

/// Convert a Cartesian source position and extent to polar position and
/// polar extent (Rec. ITU-R BS.2127-0 sec. 10.2.2).
pub fn extent_cartesian_to_polar(
    pos: CartesianPosition,
    s_x: f64,
    s_y: f64,
    s_z: f64,
) -> (PolarPosition, f64, f64, f64) {
    let polar = adm_cartesian_to_polar(pos);
    let basis = local_coordinate_system(polar.azimuth, polar.elevation);
    let diag = [s_x, s_y, s_z];
    let mut m = [[0.0; 3]; 3];
    for i in 0..3 {
        for j in 0..3 {
            m[i][j] = diag[i] * basis[i][j];
        }
    }
    let col_norm = |j: usize| (m[0][j] * m[0][j] + m[1][j] * m[1][j] + m[2][j] * m[2][j]).sqrt();
    let (w, h, d) = xyz_to_whd(col_norm(0), col_norm(1), col_norm(2));
    (polar, w, h, d)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn classical_round_trip() {
        let p = PolarPosition::new(37.0, -12.0, 2.5);
        let back = p.to_cartesian().to_polar();
        assert_relative_eq!(p.azimuth, back.azimuth, epsilon = 1e-9);
        assert_relative_eq!(p.elevation, back.elevation, epsilon = 1e-9);
        assert_relative_eq!(p.distance, back.distance, epsilon = 1e-9);
    }

    #[test]
    fn adm_polar_cartesian_round_trip() {
        for &(az, el) in &[(10.0, 5.0), (-80.0, 20.0), (170.0, -15.0), (-170.0, 60.0)] {
            let p = PolarPosition::new(az, el, 1.0);
            let back = adm_cartesian_to_polar(adm_polar_to_cartesian(p));
            assert_relative_eq!(p.azimuth, back.azimuth, epsilon = 1e-6);
            assert_relative_eq!(p.elevation, back.elevation, epsilon = 1e-6);
        }
    }

    #[test]
    fn inside_angle_range_wraps() {
        assert!(inside_angle_range(170.0, 110.0, -110.0, 0.0));
        assert!(inside_angle_range(-170.0, 110.0, -110.0, 0.0));
        assert!(!inside_angle_range(0.0, 110.0, -110.0, 0.0));
    }

    #[test]
    fn sgn_has_tolerance() {
        assert_eq!(sgn(0.0), 0);
        assert_eq!(sgn(1e-6), 0);
        assert_eq!(sgn(1.0), 1);
        assert_eq!(sgn(-1.0), -1);
    }
}
