//! Coordinate transforms for axes under antipodal symmetry.
//!
//! Orientations are stored as (azimuth, colatitude) pairs in radians. This
//! module converts them to cartesian unit vectors, to the reduced two-angle
//! Bunge-Euler relabeling used by the neighbor stencil, and back. Every
//! function is pure and elementwise; NaN inputs give NaN outputs.

use std::f64::consts::{FRAC_PI_2, PI, TAU};

use nalgebra::Vector3;
use ndarray::{Array2, Array3, ArrayView2, Zip};

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use quickcheck::quickcheck;
    use rstest::rstest;

    fn angle_from(raw: u16, span: f64) -> f64 {
        raw as f64 / u16::MAX as f64 * span
    }

    #[rstest]
    #[case(0.0, 0.0, [0.0, 0.0, 1.0])]
    #[case(0.0, FRAC_PI_2, [1.0, 0.0, 0.0])]
    #[case(FRAC_PI_2, FRAC_PI_2, [0.0, 1.0, 0.0])]
    #[case(PI, FRAC_PI_2, [-1.0, 0.0, 0.0])]
    #[case(3.0 * FRAC_PI_2, FRAC_PI_2, [0.0, -1.0, 0.0])]
    fn cartesian_of_known_directions(
        #[case] azimuth: f64,
        #[case] colatitude: f64,
        #[case] expected: [f64; 3],
    ) {
        let v = to_cartesian(azimuth, colatitude);
        assert_abs_diff_eq!(v, Vector3::from(expected), epsilon = 1e-12);
    }

    #[test]
    fn missing_cells_propagate() {
        let v = to_cartesian(f64::NAN, 0.3);
        assert!(v.iter().all(|c| c.is_nan()));
        let (phi1, phi) = to_bunge_euler(0.2, f64::NAN);
        assert_abs_diff_eq!(phi1, 0.2 + FRAC_PI_2, epsilon = 1e-12);
        assert!(phi.is_nan());
    }

    #[test]
    fn polar_of_axes() {
        let (rho, theta) = cartesian_to_polar(0.0, 2.0);
        assert_abs_diff_eq!(rho, 2.0);
        assert_abs_diff_eq!(theta, FRAC_PI_2);
    }

    #[test]
    fn lower_hemisphere_folds_to_antipode() {
        let (az, col) = upper_hemisphere(0.5, PI - 0.3);
        assert_abs_diff_eq!(az, 0.5 + PI, epsilon = 1e-12);
        assert_abs_diff_eq!(col, 0.3, epsilon = 1e-12);
        let (az, col) = upper_hemisphere(4.0, -0.2);
        assert_abs_diff_eq!(az, 4.0 + PI - TAU, epsilon = 1e-12);
        assert_abs_diff_eq!(col, 0.2, epsilon = 1e-12);
    }

    #[test]
    fn equator_pairs_share_a_representative() {
        let (az, col) = upper_hemisphere(0.3, FRAC_PI_2);
        let (flipped_az, flipped_col) = upper_hemisphere(0.3 + PI, PI - FRAC_PI_2);
        assert_eq!(col, FRAC_PI_2);
        assert_eq!(flipped_col, FRAC_PI_2);
        assert_abs_diff_eq!(az, 0.3, epsilon = 1e-12);
        assert_abs_diff_eq!(flipped_az, 0.3, epsilon = 1e-12);
        let (az, _) = upper_hemisphere(5.0, FRAC_PI_2);
        assert_abs_diff_eq!(az, 5.0 - PI, epsilon = 1e-12);
    }

    #[test]
    fn grid_transform_layout() {
        let azimuth = array![[0.0, FRAC_PI_2], [PI, f64::NAN]];
        let colatitude = array![[0.0, FRAC_PI_2], [FRAC_PI_2, 0.1]];
        let xyz = cartesian_grid(azimuth.view(), colatitude.view());
        assert_eq!(xyz.shape(), &[2, 2, 3]);
        assert_abs_diff_eq!(xyz[[0, 0, 2]], 1.0);
        assert_abs_diff_eq!(xyz[[0, 1, 1]], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(xyz[[1, 0, 0]], -1.0, epsilon = 1e-12);
        assert!(xyz[[1, 1, 0]].is_nan());
        assert_abs_diff_eq!(xyz[[1, 1, 2]], 0.1f64.cos());

        let bunge = bunge_grid(azimuth.view(), colatitude.view());
        assert_eq!(bunge.shape(), &[2, 2, 2]);
        assert_abs_diff_eq!(bunge[[1, 0, 0]], 3.0 * FRAC_PI_2, epsilon = 1e-12);
    }

    quickcheck! {
        fn cartesian_has_unit_norm(a: u16, c: u16) -> bool {
            let v = to_cartesian(angle_from(a, TAU), angle_from(c, FRAC_PI_2));
            (v.norm() - 1.0).abs() < 1e-9
        }

        fn bunge_roundtrip_recovers_azimuth(a: u16, c: u16) -> bool {
            let azimuth = angle_from(a, TAU) % TAU;
            let colatitude = angle_from(c, FRAC_PI_2);
            let (phi1, phi) = to_bunge_euler(azimuth, colatitude);
            let (back, col) = from_bunge_euler(phi1, phi);
            let diff = (back - azimuth).abs();
            (diff < 1e-9 || (TAU - diff) < 1e-9) && col == colatitude
        }

        fn cartesian_roundtrip_on_upper_hemisphere(a: u16, c: u16) -> bool {
            let azimuth = angle_from(a, TAU);
            let colatitude = angle_from(c, FRAC_PI_2);
            let v = to_cartesian(azimuth, colatitude);
            let (az, col) = from_cartesian(&v);
            let w = to_cartesian(az, col);
            (v - w).norm() < 1e-9 || (v + w).norm() < 1e-9
        }
    }
}

/// Cartesian unit vector of an (azimuth, colatitude) pair.
pub fn to_cartesian(azimuth: f64, colatitude: f64) -> Vector3<f64> {
    let sin_col = colatitude.sin();
    Vector3::new(
        azimuth.cos() * sin_col,
        azimuth.sin() * sin_col,
        colatitude.cos(),
    )
}

/// Reduced Bunge-Euler pair `(phi1, Phi)`: a frame relabeling, not a full
/// three-angle decomposition.
pub fn to_bunge_euler(azimuth: f64, colatitude: f64) -> (f64, f64) {
    ((azimuth + FRAC_PI_2).rem_euclid(TAU), colatitude)
}

/// Inverse of [`to_bunge_euler`].
pub fn from_bunge_euler(phi1: f64, phi: f64) -> (f64, f64) {
    ((phi1 - FRAC_PI_2).rem_euclid(TAU), phi)
}

pub fn cartesian_to_polar(x: f64, y: f64) -> (f64, f64) {
    ((x * x + y * y).sqrt(), y.atan2(x))
}

/// Angular pair of a unit vector, returned as its upper-hemisphere representative.
pub fn from_cartesian(v: &Vector3<f64>) -> (f64, f64) {
    let colatitude = v.z.clamp(-1.0, 1.0).acos();
    let azimuth = v.y.atan2(v.x).rem_euclid(TAU);
    upper_hemisphere(azimuth, colatitude)
}

/// Representative of `(azimuth, colatitude)` with colatitude in `[0, π/2]`.
///
/// A direction and its negation map to the same pair. On the equator the
/// azimuth is taken modulo π, since both `azimuth` and `azimuth + π` lie there.
pub fn upper_hemisphere(azimuth: f64, colatitude: f64) -> (f64, f64) {
    let (mut azimuth, mut colatitude) = (azimuth, colatitude);
    if colatitude < 0.0 {
        azimuth += PI;
        colatitude = -colatitude;
    }
    colatitude = colatitude.rem_euclid(TAU);
    if colatitude > PI {
        azimuth += PI;
        colatitude = TAU - colatitude;
    }
    if colatitude > FRAC_PI_2 {
        azimuth += PI;
        colatitude = PI - colatitude;
    }
    if colatitude == FRAC_PI_2 {
        return (azimuth.rem_euclid(PI), colatitude);
    }
    (azimuth.rem_euclid(TAU), colatitude)
}

/// Cartesian field of shape `(rows, cols, 3)`.
pub fn cartesian_grid(azimuth: ArrayView2<f64>, colatitude: ArrayView2<f64>) -> Array3<f64> {
    let x = Zip::from(&azimuth)
        .and(&colatitude)
        .map_collect(|&a, &c| a.cos() * c.sin());
    let y = Zip::from(&azimuth)
        .and(&colatitude)
        .map_collect(|&a, &c| a.sin() * c.sin());
    let z = colatitude.mapv(f64::cos);
    stack_channels(&[x, y, z])
}

/// Bunge-Euler field of shape `(rows, cols, 2)`.
pub fn bunge_grid(azimuth: ArrayView2<f64>, colatitude: ArrayView2<f64>) -> Array3<f64> {
    let phi1 = azimuth.mapv(|a| (a + FRAC_PI_2).rem_euclid(TAU));
    stack_channels(&[phi1, colatitude.to_owned()])
}

pub(crate) fn stack_channels(channels: &[Array2<f64>]) -> Array3<f64> {
    let (rows, cols) = channels[0].dim();
    Array3::from_shape_fn((rows, cols, channels.len()), |(i, j, k)| channels[k][[i, j]])
}
