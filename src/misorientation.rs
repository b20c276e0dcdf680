//! Misorientation between axes under antipodal symmetry.
//!
//! Two axes `u` and `v` are separated by the angle between their lines, so
//! every angle is folded into `[0, π/2]` with `angle > π/2 → π − angle`. This
//! module applies that rule to pairs of vectors, to the four axis-aligned
//! neighbors of every grid cell, to a randomized null distribution, to
//! profiles sampled along a path, and to two whole fields at once.

use std::f64::consts::{FRAC_PI_2, PI};

use itertools::Itertools;
use nalgebra::Vector3;
use ndarray::{s, Array1, Array2, Array3, ArrayView2, ArrayView3, Axis, Zip};
use rand::{seq::SliceRandom, Rng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::{
    config,
    error::{Result, UvecsError},
};


/// Folds an angle in `[0, π]` onto `[0, π/2]`.
pub fn fold(angle: f64) -> f64 {
    if angle > FRAC_PI_2 {
        PI - angle
    } else {
        angle
    }
}

/// Rounds half to even at `decimals` places.
pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round_ties_even() / scale
}

/// Misorientation between two axes, in `[0, π/2]` radians.
pub fn folded_angle(u: &Vector3<f64>, v: &Vector3<f64>) -> f64 {
    let cos = round_to(u.dot(v), config::PAIR_ROUND_DECIMALS).clamp(-1.0, 1.0);
    fold(cos.acos())
}

/// Axis-aligned neighbor offsets, in the channel order of the neighbor field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Neighbor {
    NextRow,
    NextColumn,
    PreviousColumn,
    PreviousRow,
}

impl Neighbor {
    pub const ALL: [Neighbor; 4] = [
        Neighbor::NextRow,
        Neighbor::NextColumn,
        Neighbor::PreviousColumn,
        Neighbor::PreviousRow,
    ];

    fn offset(&self) -> (isize, isize) {
        match self {
            Neighbor::NextRow => (1, 0),
            Neighbor::NextColumn => (0, 1),
            Neighbor::PreviousColumn => (0, -1),
            Neighbor::PreviousRow => (-1, 0),
        }
    }
}

/// Value of each cell's neighbor, repeating the edge cell past the border.
fn shift(field: ArrayView2<f64>, neighbor: Neighbor) -> Array2<f64> {
    let (rows, cols) = field.dim();
    let (di, dj) = neighbor.offset();
    let clamp = |k: usize, d: isize, len: usize| (k as isize + d).clamp(0, len as isize - 1) as usize;
    Array2::from_shape_fn((rows, cols), |(i, j)| {
        field[[clamp(i, di, rows), clamp(j, dj, cols)]]
    })
}

/// Angle between every cell and one neighbor, from the Bunge pair fields.
fn neighbor_layer(phi1: ArrayView2<f64>, phi: ArrayView2<f64>, neighbor: Neighbor) -> Array2<f64> {
    let nphi1 = shift(phi1, neighbor);
    let nphi = shift(phi, neighbor);
    let mut layer = Zip::from(&phi1)
        .and(&phi)
        .and(&nphi1)
        .and(&nphi)
        .map_collect(|&p1, &p, &q1, &q| {
            let cos = p1.sin() * q1.sin() * p.sin() * q.sin()
                + p1.cos() * q1.cos() * p.sin() * q.sin()
                + p.cos() * q.cos();
            fold(round_to(cos, config::STENCIL_ROUND_DECIMALS).acos())
        });

    layer.row_mut(0).fill(f64::NAN);
    layer.slice_mut(s![-1, ..]).fill(f64::NAN);
    layer.column_mut(0).fill(f64::NAN);
    layer.slice_mut(s![.., -1]).fill(f64::NAN);
    layer
}

/// Four-neighbor misorientation of a `(rows, cols, 2)` Bunge field.
///
/// Returns a `(rows, cols, 4)` array in [`Neighbor::ALL`] order. Border rows
/// and columns are NaN.
pub fn neighbor_misorientation(bunge: ArrayView3<f64>) -> Result<Array3<f64>> {
    let (rows, cols, _) = bunge.dim();
    if rows < 3 || cols < 3 {
        return Err(UvecsError::GridTooSmall { rows, cols });
    }
    let phi1 = bunge.index_axis(Axis(2), 0);
    let phi = bunge.index_axis(Axis(2), 1);

    let layers: Vec<Array2<f64>> = Neighbor::ALL
        .par_iter()
        .map(|&neighbor| neighbor_layer(phi1, phi, neighbor))
        .collect();

    let mut out = Array3::from_elem((rows, cols, 4), f64::NAN);
    for (k, layer) in layers.iter().enumerate() {
        out.index_axis_mut(Axis(2), k).assign(layer);
    }
    debug!(rows, cols, "neighbor misorientation");
    Ok(out)
}

/// Null distribution of neighbor misorientation.
///
/// The rows of both Bunge angle fields are shuffled independently, the valid
/// values are packed into the largest square that fits, and the neighbor
/// stencil runs on that square. Only the finite angles are returned.
pub fn random_neighbor_misorientation<R: Rng + ?Sized>(
    bunge: ArrayView3<f64>,
    rng: &mut R,
) -> Result<Vec<f64>> {
    let shuffled_valid = |channel: usize, rng: &mut R| {
        let field = bunge.index_axis(Axis(2), channel);
        let mut order: Vec<usize> = (0..field.nrows()).collect();
        order.shuffle(rng);
        field
            .select(Axis(0), &order)
            .iter()
            .copied()
            .filter(|v| !v.is_nan())
            .collect::<Vec<f64>>()
    };
    let phi1 = shuffled_valid(0, &mut *rng);
    let phi = shuffled_valid(1, &mut *rng);

    let side = (phi1.len().min(phi.len()) as f64).sqrt().floor() as usize;
    trace!(valid = phi1.len(), side, "packing shuffled cells");
    let square = |values: &[f64]| Array2::from_shape_vec((side, side), values[..side * side].to_vec());
    let packed = crate::transform::stack_channels(&[square(&phi1)?, square(&phi)?]);

    let field = neighbor_misorientation(packed.view())?;
    Ok(field.iter().copied().filter(|v| !v.is_nan()).collect())
}

/// Angles expressed in degrees or radians.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AngleUnit {
    #[default]
    Degrees,
    Radians,
}

impl AngleUnit {
    /// Factor converting radians to this unit.
    pub fn scale(&self) -> f64 {
        match self {
            AngleUnit::Degrees => 180.0 / PI,
            AngleUnit::Radians => 1.0,
        }
    }
}

/// Misorientation sampled along a path.
#[derive(Debug, Clone, PartialEq)]
pub struct MisorientationProfile {
    /// Euclidean distance of every point from the first one.
    pub distance: Array1<f64>,
    /// Misorientation of every point with the first point.
    pub angle_to_first: Array1<f64>,
    /// Misorientation of every point with the previous point; NaN for the first.
    pub angle_to_previous: Array1<f64>,
    pub unit: AngleUnit,
}

/// Profile of `(points, 3)` cartesian vectors sampled at `(xs[i], ys[i])`.
pub fn profile(
    vectors: ArrayView2<f64>,
    xs: &[f64],
    ys: &[f64],
    unit: AngleUnit,
) -> Result<MisorientationProfile> {
    let n = vectors.nrows();
    if xs.is_empty() || xs.len() != ys.len() || xs.len() != n {
        return Err(UvecsError::CoordinateLists {
            xs: xs.len(),
            ys: ys.len(),
        });
    }
    let points: Vec<Vector3<f64>> = vectors
        .outer_iter()
        .map(|row| Vector3::new(row[0], row[1], row[2]))
        .collect();
    let scale = unit.scale();

    let angle_to_first: Array1<f64> = points
        .iter()
        .map(|v| folded_angle(v, &points[0]) * scale)
        .collect();
    let angle_to_previous: Array1<f64> = std::iter::once(f64::NAN)
        .chain(
            points
                .iter()
                .tuple_windows()
                .map(|(prev, v)| folded_angle(v, prev) * scale),
        )
        .collect();
    let distance: Array1<f64> = xs
        .iter()
        .zip(ys)
        .map(|(x, y)| ((x - xs[0]).powi(2) + (y - ys[0]).powi(2)).sqrt())
        .collect();

    Ok(MisorientationProfile {
        distance,
        angle_to_first,
        angle_to_previous,
        unit,
    })
}

fn check_same_shape(a: ArrayView3<f64>, b: ArrayView3<f64>) -> Result<()> {
    if a.shape() != b.shape() {
        return Err(UvecsError::ShapeMismatch {
            left: a.shape().to_vec(),
            right: b.shape().to_vec(),
        });
    }
    Ok(())
}

/// Folded angle between corresponding cells of two cartesian fields.
pub fn inner_angles(a: ArrayView3<f64>, b: ArrayView3<f64>) -> Result<Array2<f64>> {
    check_same_shape(a, b)?;
    let (rows, cols, _) = a.dim();
    Ok(Array2::from_shape_fn((rows, cols), |(i, j)| {
        let dot = (0..3).map(|k| a[[i, j, k]] * b[[i, j, k]]).sum::<f64>();
        fold(dot.clamp(-1.0, 1.0).acos())
    }))
}

/// Schmid factor `|cos a · sin a|` of every cell, `a` being the angle to `axis`.
pub fn schmid_factors(xyz: ArrayView3<f64>, axis: &Vector3<f64>) -> Array2<f64> {
    let (rows, cols, _) = xyz.dim();
    Array2::from_shape_fn((rows, cols), |(i, j)| {
        let dot = (0..3).map(|k| xyz[[i, j, k]] * axis[k]).sum::<f64>();
        let angle = dot.clamp(-1.0, 1.0).acos();
        (angle.cos() * angle.sin()).abs()
    })
}
