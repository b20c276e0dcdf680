//! Second-order orientation tensor of an axis distribution.
//!
//! The tensor is the mean outer product `<u ⊗ u>` over the doubled sample set
//! `{u} ∪ {-u}`, so the statistic honours the `u ≡ -u` identification. Its
//! eigenvectors give the principal axes of the distribution and its
//! eigenvalues the share of orientation mass along each of them.
//!
//! Accumulation runs in compensated `f64` arithmetic and the result is
//! narrowed to `f32`, the working precision of the tensor.

use nalgebra::{Matrix3, SymmetricEigen, Vector3};
use ndarray::{Array1, ArrayView3, Axis};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::to_cartesian;
    use approx::assert_abs_diff_eq;
    use ndarray::Array3;
    use rand::{rngs::StdRng, SeedableRng};
    use rand_distr::{Distribution, UnitSphere};

    fn field_from(vectors: &[[f64; 3]]) -> Array3<f64> {
        Array3::from_shape_fn((1, vectors.len(), 3), |(_, j, k)| vectors[j][k])
    }

    #[test]
    fn doubled_set_is_symmetric() {
        let xyz = field_from(&[[1.0, 0.0, 0.0], [f64::NAN, f64::NAN, f64::NAN]]);
        let doubled = DoubledSampleSet::from_cartesian(xyz.view());
        assert_eq!(doubled.len(), 4);
        assert_eq!(doubled.x[0], 1.0);
        assert_eq!(doubled.x[2], -1.0);
        assert!(doubled.x[3].is_nan());
    }

    #[test]
    fn straight_up_field() {
        let v = to_cartesian(0.0, 0.0);
        let xyz = field_from(&[[v.x, v.y, v.z]; 16]);
        let ot = OrientationTensor::compute(xyz.view());
        assert_eq!(ot.samples, 32);
        assert_abs_diff_eq!(ot.eigenvalues, Vector3::new(1.0, 0.0, 0.0), epsilon = 1e-6);
        assert_abs_diff_eq!(ot.eigenvectors.column(0)[2].abs(), 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(ot.tensor.trace(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn isotropic_sample_has_equal_eigenvalues() {
        let mut rng = StdRng::seed_from_u64(7);
        let vectors: Vec<[f64; 3]> = (0..20000).map(|_| UnitSphere.sample(&mut rng)).collect();
        let ot = OrientationTensor::compute(field_from(&vectors).view());
        for value in ot.eigenvalues.iter() {
            assert_abs_diff_eq!(*value, 1.0 / 3.0, epsilon = 0.02);
        }
        assert_abs_diff_eq!(ot.eigenvalues.sum(), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn eigenpairs_are_sorted_and_matched() {
        let xyz = field_from(&[
            [1.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
        ]);
        let ot = OrientationTensor::compute(xyz.view());
        assert!(ot.eigenvalues[0] >= ot.eigenvalues[1]);
        assert!(ot.eigenvalues[1] >= ot.eigenvalues[2]);
        assert_abs_diff_eq!(ot.eigenvalues[0], 0.75, epsilon = 1e-6);
        assert_abs_diff_eq!(ot.eigenvalues[1], 0.25, epsilon = 1e-6);
        assert_abs_diff_eq!(ot.eigenvectors.column(0)[0].abs(), 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(ot.eigenvectors.column(1)[1].abs(), 1.0, epsilon = 1e-6);
        for i in 0..3 {
            let v = ot.eigenvectors.column(i).into_owned();
            assert_abs_diff_eq!(ot.tensor * v, v * ot.eigenvalues[i], epsilon = 1e-5);
        }
    }

    #[test]
    fn all_missing_is_degenerate() {
        let xyz = field_from(&[[f64::NAN; 3]; 4]);
        let ot = OrientationTensor::compute(xyz.view());
        assert_eq!(ot.samples, 0);
        assert!(ot.is_degenerate());
        assert!(ot.eigenvalues.iter().all(|v| v.is_nan()));
        assert!(ot.eigenvectors.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn compensated_mean_skips_nan() {
        let values = [1e16, 1.0, -1e16, f64::NAN, 1.0];
        let (mean, count) = compensated_nanmean(values.iter().copied());
        assert_eq!(count, 4);
        assert_abs_diff_eq!(mean, 0.5);
    }
}

/// Flattened cartesian samples concatenated with their negation.
#[derive(Debug, Clone, PartialEq)]
pub struct DoubledSampleSet {
    pub x: Array1<f64>,
    pub y: Array1<f64>,
    pub z: Array1<f64>,
}

impl DoubledSampleSet {
    /// Builds the set from a `(rows, cols, 3)` cartesian field. Missing cells
    /// are kept as NaN.
    pub fn from_cartesian(xyz: ArrayView3<f64>) -> Self {
        let doubled = |k: usize| {
            let flat: Vec<f64> = xyz.index_axis(Axis(2), k).iter().copied().collect();
            flat.iter()
                .copied()
                .chain(flat.iter().map(|v| -v))
                .collect::<Array1<f64>>()
        };
        Self {
            x: doubled(0),
            y: doubled(1),
            z: doubled(2),
        }
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Copy without the samples that have a missing component.
    pub fn without_missing(&self) -> Self {
        let keep: Vec<usize> = (0..self.len())
            .filter(|&i| !(self.x[i].is_nan() || self.y[i].is_nan() || self.z[i].is_nan()))
            .collect();
        self.select(&keep)
    }

    /// Copy holding the samples at `indices`, in that order.
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            x: self.x.select(Axis(0), indices),
            y: self.y.select(Axis(0), indices),
            z: self.z.select(Axis(0), indices),
        }
    }

    pub fn vector(&self, i: usize) -> Vector3<f64> {
        Vector3::new(self.x[i], self.y[i], self.z[i])
    }
}

/// Mean of the non-NaN values with Neumaier-compensated summation.
/// Returns the mean and the number of values that contributed.
pub(crate) fn compensated_nanmean(values: impl Iterator<Item = f64>) -> (f64, usize) {
    let mut sum = 0.0f64;
    let mut compensation = 0.0f64;
    let mut count = 0usize;
    for v in values.filter(|v| !v.is_nan()) {
        let t = sum + v;
        if sum.abs() >= v.abs() {
            compensation += (sum - t) + v;
        } else {
            compensation += (v - t) + sum;
        }
        sum = t;
        count += 1;
    }
    if count == 0 {
        return (f64::NAN, 0);
    }
    ((sum + compensation) / count as f64, count)
}

/// Orientation tensor with its eigen-decomposition.
///
/// `eigenvalues[i]` belongs to the eigenvector in column `i` of
/// `eigenvectors`; eigenvalues are in non-increasing order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrientationTensor {
    pub tensor: Matrix3<f32>,
    pub eigenvalues: Vector3<f32>,
    pub eigenvectors: Matrix3<f32>,
    /// Number of doubled samples without missing components.
    pub samples: usize,
}

impl OrientationTensor {
    /// Computes the tensor of a `(rows, cols, 3)` cartesian field.
    pub fn compute(xyz: ArrayView3<f64>) -> Self {
        let doubled = DoubledSampleSet::from_cartesian(xyz);
        let moment = |a: &Array1<f64>, b: &Array1<f64>| {
            compensated_nanmean(a.iter().zip(b.iter()).map(|(p, q)| p * q))
        };

        let (a11, samples) = moment(&doubled.x, &doubled.x);
        let (a22, _) = moment(&doubled.y, &doubled.y);
        let (a33, _) = moment(&doubled.z, &doubled.z);
        let (a12, _) = moment(&doubled.x, &doubled.y);
        let (a13, _) = moment(&doubled.x, &doubled.z);
        let (a23, _) = moment(&doubled.y, &doubled.z);

        #[rustfmt::skip]
        let tensor = Matrix3::new(
            a11, a12, a13,
            a12, a22, a23,
            a13, a23, a33,
        )
        .map(|v| v as f32);

        if samples == 0 {
            warn!("orientation tensor requested for a field without valid cells");
            return Self::degenerate();
        }

        let Some(eigen) =
            SymmetricEigen::try_new(tensor, f32::EPSILON, config::EIGEN_MAX_ITERATIONS)
        else {
            warn!("orientation tensor eigen-decomposition did not converge");
            return Self::degenerate();
        };

        let mut order = [0usize, 1, 2];
        order.sort_by(|&i, &j| eigen.eigenvalues[j].total_cmp(&eigen.eigenvalues[i]));
        let eigenvalues = Vector3::from_fn(|i, _| eigen.eigenvalues[order[i]]);
        let columns: Vec<Vector3<f32>> = order
            .iter()
            .map(|&i| eigen.eigenvectors.column(i).into_owned())
            .collect();
        let eigenvectors = Matrix3::from_columns(&columns);

        debug!(samples, ?eigenvalues, "orientation tensor");

        Self {
            tensor,
            eigenvalues,
            eigenvectors,
            samples,
        }
    }

    fn degenerate() -> Self {
        Self {
            tensor: Matrix3::repeat(f32::NAN),
            eigenvalues: Vector3::repeat(f32::NAN),
            eigenvectors: Matrix3::repeat(f32::NAN),
            samples: 0,
        }
    }

    /// True when no valid sample contributed.
    pub fn is_degenerate(&self) -> bool {
        self.samples == 0
    }
}
