use ndarray::Array3;
use rand::Rng;
use rand_distr::{Distribution, UnitSphere};

use crate::{grid::Grid, transform::from_cartesian};

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};
    use std::f64::consts::{FRAC_PI_2, TAU};

    #[test]
    fn random_field_is_on_the_upper_hemisphere() {
        let mut rng = StdRng::seed_from_u64(9);
        let field = random_uniform(8, 5, &mut rng);
        assert_eq!(field.shape(), (8, 5, 2));
        assert!(field.channel(0).iter().all(|a| (0.0..TAU).contains(a)));
        assert!(field.channel(1).iter().all(|c| (0.0..=FRAC_PI_2).contains(c)));
    }

    #[test]
    fn seeded_fields_repeat() {
        let a = random_uniform(3, 3, &mut StdRng::seed_from_u64(1));
        let b = random_uniform(3, 3, &mut StdRng::seed_from_u64(1));
        assert_eq!(a, b);
    }
}

/// Orientation field of `rows × cols` axes drawn uniformly from the sphere,
/// stored as upper-hemisphere (azimuth, colatitude) pairs.
pub fn random_uniform<R: Rng + ?Sized>(rows: usize, cols: usize, rng: &mut R) -> Grid<f64> {
    let mut data = Array3::<f64>::zeros((rows, cols, 2));
    for i in 0..rows {
        for j in 0..cols {
            let [x, y, z]: [f64; 3] = UnitSphere.sample(rng);
            let (azimuth, colatitude) = from_cartesian(&nalgebra::Vector3::new(x, y, z));
            data[[i, j, 0]] = azimuth;
            data[[i, j, 1]] = colatitude;
        }
    }
    Grid::from_array(data)
}
