//! Pole-figure preparation from a spherical kernel density estimate.
//!
//! The pole figure of an axis field is the density of its doubled sample set
//! evaluated on one hemisphere and projected onto the plane. Preparation is a
//! pipeline of pure stages:
//!
//! 1. [`sample_directions`]: doubled cartesian samples, optionally subsampled
//! 2. [`estimator_coordinates`]: `(phi, theta)` pairs for the estimator
//! 3. [`DensityEstimator::fit`] / [`DensityEstimator::score_samples`]
//! 4. [`EvaluationMesh::new`]: a fixed hemisphere-folded evaluation mesh
//! 5. [`Projection::project`]: plotting coordinates of the mesh
//! 6. [`layout`]: densities, reference circles and eigenvector markers
//!
//! [`pole_figure`] chains the stages. Drawing the result is left to the caller.

use std::f64::consts::{FRAC_PI_2, PI, TAU};

use nalgebra::Vector3;
use ndarray::ArrayView3;
use rand::{seq::index, Rng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    error::{Result, UvecsError},
    settings::PoleFigureSettings,
    tensor::{DoubledSampleSet, OrientationTensor},
};

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::Array3;
    use rand::{rngs::StdRng, SeedableRng};
    use rstest::rstest;

    fn vertical_field(rows: usize, cols: usize) -> Array3<f64> {
        Array3::from_shape_fn((rows, cols, 3), |(_, _, k)| if k == 2 { 1.0 } else { 0.0 })
    }

    #[test]
    fn sampling_doubles_and_drops_missing() {
        let mut xyz = vertical_field(2, 3);
        xyz[[0, 0, 0]] = f64::NAN;
        let mut rng = StdRng::seed_from_u64(0);
        let all = sample_directions(xyz.view(), 0, &mut rng);
        assert_eq!(all.len(), 10);
        let capped = sample_directions(xyz.view(), 4, &mut rng);
        assert_eq!(capped.len(), 4);
        let generous = sample_directions(xyz.view(), 1000, &mut rng);
        assert_eq!(generous.len(), 10);
    }

    #[test]
    fn estimator_convention_is_shifted() {
        let sample = DoubledSampleSet::from_cartesian(vertical_field(1, 1).view());
        let coords = estimator_coordinates(&sample);
        assert_abs_diff_eq!(coords[0].0, -FRAC_PI_2);
        assert_abs_diff_eq!(coords[0].1, -PI);
        assert_abs_diff_eq!(coords[1].0, FRAC_PI_2, epsilon = 1e-12);
    }

    #[test]
    fn haversine_distance_between_poles() {
        assert_abs_diff_eq!(haversine((-FRAC_PI_2, 0.0), (FRAC_PI_2, 1.0)), PI, epsilon = 1e-12);
        assert_abs_diff_eq!(haversine((0.0, 0.0), (0.0, FRAC_PI_2)), FRAC_PI_2, epsilon = 1e-12);
    }

    #[test]
    fn kde_peaks_at_the_sample() {
        let mut kde = HaversineKde::new(0.2).unwrap();
        kde.fit(&[(0.0, 0.0)]).unwrap();
        let scores = kde.score_samples(&[(0.0, 0.0), (0.5, 0.0)]).unwrap();
        let expected = -(TAU * 0.04f64).ln();
        assert_abs_diff_eq!(scores[0], expected, epsilon = 1e-12);
        assert_abs_diff_eq!(scores[1], expected - 0.5 * (0.5f64 / 0.2).powi(2), epsilon = 1e-9);
    }

    #[test]
    fn unfitted_kde_scores_nan() {
        let kde = HaversineKde::new(0.2).unwrap();
        let scores = kde.score_samples(&[(0.0, 0.0)]).unwrap();
        assert!(scores[0].is_nan());
        assert!(matches!(
            HaversineKde::new(0.0),
            Err(UvecsError::InvalidBandwidth(_))
        ));
    }

    #[test]
    fn mesh_lies_on_upper_hemisphere() {
        let mesh = EvaluationMesh::new(500, 40);
        assert_eq!(mesh.len(), 540);
        for (v, (&phi, &theta)) in mesh.points.iter().zip(mesh.phi.iter().zip(&mesh.theta)) {
            assert!(v.z >= 0.0);
            assert_abs_diff_eq!(v.norm(), 1.0, epsilon = 1e-9);
            assert!((0.0..=FRAC_PI_2 + 1e-12).contains(&phi));
            assert_abs_diff_eq!(theta, v.y.atan2(v.x));
        }
    }

    #[rstest]
    #[case(Projection::Stereographic, 1.0)]
    #[case(Projection::EqualArea, 2f64.sqrt())]
    fn equator_maps_to_outer_radius(#[case] projection: Projection, #[case] radius: f64) {
        let (x, y) = projection.project(&Vector3::new(0.0, 1.0, 0.0));
        assert_abs_diff_eq!(x, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(y, radius, epsilon = 1e-12);
        assert_abs_diff_eq!(projection.outer_radius(), radius);
        assert_abs_diff_eq!(projection.reference_radius(90.0), radius, epsilon = 1e-12);
        assert_eq!(projection.project(&Vector3::z()), (0.0, 0.0));
    }

    #[test]
    fn markers_flip_to_upper_hemisphere() {
        let xyz = vertical_field(3, 3);
        let tensor = OrientationTensor::compute(xyz.view());
        let markers = eigen_markers(&tensor, Projection::EqualArea);
        assert_eq!(markers.len(), 3);
        assert_abs_diff_eq!(markers[0].eigenvalue, 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(markers[0].x, 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(markers[0].y, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn vertical_field_peaks_in_the_centre() {
        let xyz = vertical_field(4, 4);
        let settings = PoleFigureSettings {
            mesh_points: 400,
            circle_points: 50,
            ..PoleFigureSettings::default()
        };
        let mut kde = HaversineKde::new(settings.bandwidth).unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        let figure = pole_figure(xyz.view(), &mut kde, &settings, &mut rng).unwrap();
        assert_eq!(figure.x.len(), 450);
        assert_eq!(figure.reference_circles.len(), 2);
        let peak = figure
            .density
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        let r = (figure.x[peak].powi(2) + figure.y[peak].powi(2)).sqrt();
        assert!(r < 0.2, "peak radius {}", r);
    }

    #[test]
    fn empty_field_gives_missing_densities() {
        let xyz = Array3::from_elem((3, 3, 3), f64::NAN);
        let settings = PoleFigureSettings {
            mesh_points: 50,
            circle_points: 10,
            ..PoleFigureSettings::default()
        };
        let mut kde = HaversineKde::new(0.3).unwrap();
        let mut rng = StdRng::seed_from_u64(2);
        let figure = pole_figure(xyz.view(), &mut kde, &settings, &mut rng).unwrap();
        assert!(figure.density.iter().all(|d| d.is_nan()));
        assert!(figure.markers.iter().all(|m| m.eigenvalue.is_nan()));
    }
}

/// Doubled, missing-free samples of a `(rows, cols, 3)` cartesian field,
/// subsampled without replacement to at most `max_samples` points.
/// `max_samples == 0` keeps every sample.
pub fn sample_directions<R: Rng + ?Sized>(
    xyz: ArrayView3<f64>,
    max_samples: usize,
    rng: &mut R,
) -> DoubledSampleSet {
    let valid = DoubledSampleSet::from_cartesian(xyz).without_missing();
    if max_samples == 0 || max_samples >= valid.len() {
        return valid;
    }
    let picked = index::sample(rng, valid.len(), max_samples).into_vec();
    valid.select(&picked)
}

/// `(phi, theta)` pairs in the estimator's convention:
/// `phi = arccos(z) − π/2`, `theta = atan2(y, x) − π`.
pub fn estimator_coordinates(sample: &DoubledSampleSet) -> Vec<(f64, f64)> {
    (0..sample.len())
        .map(|i| {
            let v = sample.vector(i);
            (v.z.clamp(-1.0, 1.0).acos() - FRAC_PI_2, v.y.atan2(v.x) - PI)
        })
        .collect()
}

/// Density estimate over `(phi, theta)` points on the sphere.
pub trait DensityEstimator {
    fn fit(&mut self, points: &[(f64, f64)]) -> Result<()>;

    /// Log-density at every query point.
    fn score_samples(&self, points: &[(f64, f64)]) -> Result<Vec<f64>>;
}

/// Great-circle distance between two `(latitude, longitude)` pairs.
pub fn haversine(a: (f64, f64), b: (f64, f64)) -> f64 {
    let dlat = (b.0 - a.0) / 2.0;
    let dlon = (b.1 - a.1) / 2.0;
    let h = dlat.sin().powi(2) + a.0.cos() * b.0.cos() * dlon.sin().powi(2);
    2.0 * h.sqrt().clamp(0.0, 1.0).asin()
}

/// Gaussian kernel density estimate under the haversine metric.
///
/// Scores are normalised as a two-dimensional gaussian of width `bandwidth`,
/// so they compare between fits but are not a density on the sphere.
#[derive(Debug, Clone, PartialEq)]
pub struct HaversineKde {
    bandwidth: f64,
    points: Vec<(f64, f64)>,
}

impl HaversineKde {
    pub fn new(bandwidth: f64) -> Result<Self> {
        if !(bandwidth.is_finite() && bandwidth > 0.0) {
            return Err(UvecsError::InvalidBandwidth(bandwidth));
        }
        Ok(Self {
            bandwidth,
            points: Vec::new(),
        })
    }

    pub fn bandwidth(&self) -> f64 {
        self.bandwidth
    }
}

impl DensityEstimator for HaversineKde {
    fn fit(&mut self, points: &[(f64, f64)]) -> Result<()> {
        self.points = points.to_vec();
        debug!(points = points.len(), bandwidth = self.bandwidth, "fitted kde");
        Ok(())
    }

    fn score_samples(&self, points: &[(f64, f64)]) -> Result<Vec<f64>> {
        if self.points.is_empty() {
            warn!("kde scored without fitted points");
            return Ok(vec![f64::NAN; points.len()]);
        }
        let h = self.bandwidth;
        let norm = (self.points.len() as f64).ln() + (TAU * h * h).ln();
        Ok(points
            .par_iter()
            .map(|&q| {
                let exponents: Vec<f64> = self
                    .points
                    .iter()
                    .map(|&p| -0.5 * (haversine(q, p) / h).powi(2))
                    .collect();
                log_sum_exp(&exponents) - norm
            })
            .collect())
    }
}

fn log_sum_exp(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return max;
    }
    max + values.iter().map(|v| (v - max).exp()).sum::<f64>().ln()
}

/// Fixed evaluation directions folded onto the upper hemisphere.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationMesh {
    pub points: Vec<Vector3<f64>>,
    /// Colatitude of every point.
    pub phi: Vec<f64>,
    /// Azimuth of every point, in `(−π, π]`.
    pub theta: Vec<f64>,
}

impl EvaluationMesh {
    /// Fibonacci lattice of `mesh_points` directions over the sphere plus
    /// `circle_points` directions on the equator, with every point below the
    /// equator replaced by its antipode.
    pub fn new(mesh_points: usize, circle_points: usize) -> Self {
        let golden = PI * (3.0 - 5f64.sqrt());
        let lattice = (0..mesh_points).map(|k| {
            let z = 1.0 - (2 * k + 1) as f64 / mesh_points as f64;
            let r = (1.0 - z * z).sqrt();
            let t = golden * k as f64;
            Vector3::new(r * t.cos(), r * t.sin(), z)
        });
        let circle = (0..circle_points).map(|k| {
            let omega = if circle_points > 1 {
                TAU * k as f64 / (circle_points - 1) as f64
            } else {
                0.0
            };
            Vector3::new(omega.cos(), omega.sin(), 0.0)
        });
        let points: Vec<Vector3<f64>> = lattice
            .chain(circle)
            .map(|v| if v.z < 0.0 { -v } else { v })
            .collect();

        let phi = points.iter().map(|v| v.z.clamp(-1.0, 1.0).acos()).collect();
        let theta = points.iter().map(|v| v.y.atan2(v.x)).collect();
        Self { points, phi, theta }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Mesh points in the estimator's convention.
    pub fn estimator_coordinates(&self) -> Vec<(f64, f64)> {
        self.phi
            .iter()
            .zip(&self.theta)
            .map(|(&phi, &theta)| (phi - FRAC_PI_2, theta - PI))
            .collect()
    }
}

/// Hemisphere-to-plane projection of a pole figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Projection {
    /// `(x, y) / (1 + z)`
    Stereographic,
    /// `2 sin(phi/2) · (cos theta, sin theta)`
    #[default]
    EqualArea,
}

impl Projection {
    /// Plotting coordinates of an upper-hemisphere unit vector.
    pub fn project(&self, v: &Vector3<f64>) -> (f64, f64) {
        match self {
            Projection::Stereographic => {
                let scale = 1.0 / (1.0 + v.z);
                (scale * v.x, scale * v.y)
            }
            Projection::EqualArea => {
                let phi = v.z.clamp(-1.0, 1.0).acos();
                let theta = v.y.atan2(v.x);
                let r = 2.0 * (phi / 2.0).sin();
                (r * theta.cos(), r * theta.sin())
            }
        }
    }

    /// Radius of the projected equator.
    pub fn outer_radius(&self) -> f64 {
        match self {
            Projection::Stereographic => 1.0,
            Projection::EqualArea => 2f64.sqrt(),
        }
    }

    /// Radius of the projected circle of colatitude `degrees`.
    pub fn reference_radius(&self, degrees: f64) -> f64 {
        match self {
            Projection::Stereographic => {
                let complement = (90.0 - degrees).to_radians();
                complement.cos() / (1.0 + complement.sin())
            }
            Projection::EqualArea => 2.0 * (degrees.to_radians() / 2.0).sin(),
        }
    }
}

/// Projected principal axis of the orientation tensor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EigenMarker {
    pub x: f64,
    pub y: f64,
    pub eigenvalue: f64,
}

/// Laid-out pole figure, ready for a plotting sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoleFigure {
    pub projection: Projection,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    /// Density (not log-density) at `(x[i], y[i])`.
    pub density: Vec<f64>,
    pub outer_radius: f64,
    /// `(colatitude in degrees, projected radius)` of each reference circle.
    pub reference_circles: Vec<(f64, f64)>,
    pub markers: Vec<EigenMarker>,
}

/// Eigenvectors flipped onto the upper hemisphere and projected.
pub fn eigen_markers(tensor: &OrientationTensor, projection: Projection) -> Vec<EigenMarker> {
    (0..3)
        .map(|i| {
            let column = tensor.eigenvectors.column(i);
            let mut v = Vector3::new(column[0] as f64, column[1] as f64, column[2] as f64);
            if v.z < 0.0 {
                v = -v;
            }
            let (x, y) = projection.project(&v);
            EigenMarker {
                x,
                y,
                eigenvalue: tensor.eigenvalues[i] as f64,
            }
        })
        .collect()
}

/// Assembles the pole figure from scored mesh points.
pub fn layout(
    mesh: &EvaluationMesh,
    log_density: &[f64],
    projection: Projection,
    angles: &[f64],
    tensor: Option<&OrientationTensor>,
) -> PoleFigure {
    let (x, y): (Vec<f64>, Vec<f64>) = mesh.points.iter().map(|v| projection.project(v)).unzip();
    PoleFigure {
        projection,
        x,
        y,
        density: log_density.iter().map(|w| w.exp()).collect(),
        outer_radius: projection.outer_radius(),
        reference_circles: angles
            .iter()
            .map(|&a| (a, projection.reference_radius(a)))
            .collect(),
        markers: tensor
            .map(|t| eigen_markers(t, projection))
            .unwrap_or_default(),
    }
}

/// Runs the full pipeline on a `(rows, cols, 3)` cartesian field.
pub fn pole_figure<E, R>(
    xyz: ArrayView3<f64>,
    estimator: &mut E,
    settings: &PoleFigureSettings,
    rng: &mut R,
) -> Result<PoleFigure>
where
    E: DensityEstimator + ?Sized,
    R: Rng + ?Sized,
{
    let sample = sample_directions(xyz, settings.max_samples, rng);
    if sample.is_empty() {
        warn!("pole figure requested for a field without valid cells");
    }
    estimator.fit(&estimator_coordinates(&sample))?;

    let mesh = EvaluationMesh::new(settings.mesh_points, settings.circle_points);
    let log_density = estimator.score_samples(&mesh.estimator_coordinates())?;

    let tensor = settings
        .plot_tensor
        .then(|| OrientationTensor::compute(xyz));
    debug!(
        samples = sample.len(),
        mesh = mesh.len(),
        projection = ?settings.projection,
        "pole figure"
    );
    Ok(layout(
        &mesh,
        &log_density,
        settings.projection,
        &settings.angles,
        tensor.as_ref(),
    ))
}
