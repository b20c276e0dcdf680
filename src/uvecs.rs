//! Accessor over an orientation field.
//!
//! [`Uvecs`] borrows a `(rows, cols, 2)` grid of (azimuth, colatitude) pairs
//! and exposes every analysis as a method. Each method returns a freshly
//! allocated grid or layer carrying the field's spatial axes.

use nalgebra::Vector3;
use rand::Rng;
use tracing::debug;

use crate::{
    colorwheel::{self, ColorwheelProvider},
    config,
    density::{self, DensityEstimator, PoleFigure},
    error::{Result, UvecsError},
    grid::{Grid, Layer, SelectMethod},
    misorientation::{self, AngleUnit, MisorientationProfile},
    settings::PoleFigureSettings,
    tensor::OrientationTensor,
    transform,
};


/// Capability of producing a `(rows, cols, 3)` cartesian field.
///
/// A bare `Grid<f64>` is taken to hold cartesian components already; wrap an
/// angular grid in [`Uvecs`] to have it converted.
pub trait Cartesian {
    fn xyz(&self) -> Grid<f64>;
}

/// Read-only view of an orientation field.
#[derive(Debug, Clone, Copy)]
pub struct Uvecs<'a> {
    grid: &'a Grid<f64>,
}

impl<'a> Uvecs<'a> {
    /// Wraps `grid`, which must have exactly two channels.
    pub fn new(grid: &'a Grid<f64>) -> Result<Self> {
        let (_, _, channels) = grid.shape();
        if channels != 2 {
            return Err(UvecsError::ChannelCount {
                expected: 2,
                found: channels,
            });
        }
        Ok(Self { grid })
    }

    pub fn grid(&self) -> &'a Grid<f64> {
        self.grid
    }

    pub fn azi_col(&self) -> Grid<f64> {
        self.grid.clone()
    }

    /// Cartesian components `(x, y, z)` of every cell.
    pub fn xyz(&self) -> Grid<f64> {
        let data = transform::cartesian_grid(self.grid.channel(0), self.grid.channel(1));
        self.grid.derive(data, config::CARTESIAN_CHANNEL)
    }

    /// Bunge Euler pair `(phi1, Phi)` of every cell.
    pub fn bunge_euler(&self) -> Grid<f64> {
        let data = transform::bunge_grid(self.grid.channel(0), self.grid.channel(1));
        self.grid.derive(data, config::BUNGE_CHANNEL)
    }

    /// RGB image of the field through a colorwheel lookup table.
    pub fn calc_colormap<P: ColorwheelProvider + ?Sized>(
        &self,
        provider: &P,
        resolution: usize,
        semi: bool,
    ) -> Result<Grid<u8>> {
        let img = colorwheel::colormap(
            provider,
            self.grid.channel(0),
            self.grid.channel(1),
            resolution,
            semi,
        )?;
        Ok(self.grid.derive(img, config::IMAGE_CHANNEL))
    }

    pub fn orientation_tensor(&self) -> OrientationTensor {
        OrientationTensor::compute(self.xyz().data().view())
    }

    /// Misorientation along the path `(xs[i], ys[i])`.
    pub fn misorientation_profile(
        &self,
        xs: &[f64],
        ys: &[f64],
        method: SelectMethod,
        unit: AngleUnit,
    ) -> Result<MisorientationProfile> {
        let angles = self.grid.select_points(xs, ys, method)?;
        let vectors = ndarray::Array2::from_shape_fn((angles.nrows(), 3), |(p, k)| {
            transform::to_cartesian(angles[[p, 0]], angles[[p, 1]])[k]
        });
        misorientation::profile(vectors.view(), xs, ys, unit)
    }

    /// Misorientation with the four axis-aligned neighbors of every cell.
    pub fn mis_angle(&self) -> Result<Grid<f64>> {
        let bunge = self.bunge_euler();
        let field = misorientation::neighbor_misorientation(bunge.data().view())?;
        Ok(self.grid.derive(field, config::MISORIENTATION_CHANNEL))
    }

    /// Neighbor misorientation of a spatially shuffled copy of the field.
    pub fn mis_angle_random<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Vec<f64>> {
        let bunge = self.bunge_euler();
        misorientation::random_neighbor_misorientation(bunge.data().view(), rng)
    }

    pub fn pole_figure<E, R>(
        &self,
        estimator: &mut E,
        settings: &PoleFigureSettings,
        rng: &mut R,
    ) -> Result<PoleFigure>
    where
        E: DensityEstimator + ?Sized,
        R: Rng + ?Sized,
    {
        density::pole_figure(self.xyz().data().view(), estimator, settings, rng)
    }

    /// Schmid factor of every cell for a load along `axis`.
    pub fn calc_schmid(&self, axis: &Vector3<f64>) -> Layer<f64> {
        let xyz = self.xyz();
        self.grid
            .layer(misorientation::schmid_factors(xyz.data().view(), axis))
    }

    /// Folded angle between this field and `other`, cell by cell.
    pub fn inner_angle<C: Cartesian + ?Sized>(&self, other: &C) -> Result<Layer<f64>> {
        let mine = self.xyz();
        let theirs = other.xyz();
        let (_, _, channels) = theirs.shape();
        if channels != 3 {
            return Err(UvecsError::ChannelCount {
                expected: 3,
                found: channels,
            });
        }
        let angles = misorientation::inner_angles(mine.data().view(), theirs.data().view())?;
        debug!(shape = ?angles.dim(), "inner angle");
        Ok(self.grid.layer(angles))
    }
}

impl Cartesian for Uvecs<'_> {
    fn xyz(&self) -> Grid<f64> {
        Uvecs::xyz(self)
    }
}

impl Cartesian for Grid<f64> {
    fn xyz(&self) -> Grid<f64> {
        self.clone()
    }
}
