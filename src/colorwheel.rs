//! Colorwheel lookup tables and colormap rendering of orientation fields.
//!
//! A colorwheel maps a position in a square lookup table to a colour: hue
//! from the angle around the centre, value (brightness) from the distance to
//! it. Orientation cells are mapped into the table by projecting their
//! upper-hemisphere representative onto the unit disc.
//!
//! The colormap rendering provides:
//! - A [`ColorwheelProvider`] seam for custom lookup tables
//! - [`HsvColorwheel`], the default full or half wheel
//! - Pixel indexing that sends invalid cells to a white pixel

use std::f64::consts::PI;

use ndarray::{Array2, Array3, ArrayView2, Zip};
use ndarray_stats::QuantileExt;
use tracing::debug;

use crate::{
    config,
    error::{Result, UvecsError},
    transform::{cartesian_to_polar, upper_hemisphere},
};


/// Source of a square RGB colorwheel lookup table.
pub trait ColorwheelProvider {
    /// Returns a `(resolution, resolution, 3)` table with values in `[0, 255]`.
    ///
    /// `semi` folds the hue angle into `[0, π)`; `circle_mask` blacks out the
    /// pixels outside the inscribed circle.
    fn lookup(&self, resolution: usize, semi: bool, circle_mask: bool) -> Result<Array3<u8>>;
}

/// HSV colorwheel: hue from the polar angle, value from the radius, full saturation.
#[derive(Debug, Clone, Copy, Default)]
pub struct HsvColorwheel;

impl ColorwheelProvider for HsvColorwheel {
    fn lookup(&self, resolution: usize, semi: bool, circle_mask: bool) -> Result<Array3<u8>> {
        if resolution == 0 {
            return Err(UvecsError::InvalidResolution);
        }
        let n = resolution;
        let axis = |k: usize| {
            if n == 1 {
                -PI / 2.0
            } else {
                -PI / 2.0 + PI * k as f64 / (n - 1) as f64
            }
        };

        // rows follow y, columns follow x
        let polar = Array2::from_shape_fn((n, n), |(i, j)| cartesian_to_polar(axis(j), axis(i)));
        let rho = polar.mapv(|(r, _)| r);
        let phi = polar.mapv(|(_, p)| if semi { p.rem_euclid(PI) } else { p });

        let (phi_min, phi_max) = (*phi.min_skipnan(), *phi.max_skipnan());
        let rho_max = *rho.max_skipnan();
        let span = phi_max - phi_min;

        let mut lut = Array3::<u8>::zeros((n, n, 3));
        for ((i, j), &r) in rho.indexed_iter() {
            let h = if span > 0.0 { (phi[[i, j]] - phi_min) / span } else { 0.0 };
            let v = if rho_max > 0.0 { r / rho_max } else { 0.0 };
            let masked = circle_mask && {
                let di = i as f64 - n as f64 / 2.0;
                let dj = j as f64 - n as f64 / 2.0;
                (di * di + dj * dj).sqrt() > n as f64 / 2.0
            };
            if !masked {
                let rgb = hsv_to_rgb(h, 1.0, v);
                for k in 0..3 {
                    lut[[i, j, k]] = rgb[k];
                }
            }
        }
        debug!(resolution, semi, circle_mask, "built hsv colorwheel");
        Ok(lut)
    }
}

/// HSV (each in `[0, 1]`) to 8-bit RGB, with the sector arithmetic of the
/// usual six-sextant conversion.
pub fn hsv_to_rgb(h: f64, s: f64, v: f64) -> [u8; 3] {
    let (r, g, b) = if s == 0.0 {
        (v, v, v)
    } else {
        let scaled = h * 6.0;
        let sector = scaled.floor();
        let f = scaled - sector;
        let p = v * (1.0 - s);
        let q = v * (1.0 - s * f);
        let t = v * (1.0 - s * (1.0 - f));
        match (sector as i64).rem_euclid(6) {
            0 => (v, t, p),
            1 => (q, v, p),
            2 => (p, v, t),
            3 => (p, q, v),
            4 => (t, p, v),
            _ => (v, p, q),
        }
    };
    let to_byte = |c: f64| (c * 255.0).round().clamp(0.0, 255.0) as u8;
    [to_byte(r), to_byte(g), to_byte(b)]
}

/// Lookup-table pixel of one cell, or `None` when it falls outside the table.
pub fn pixel_index(azimuth: f64, colatitude: f64, resolution: usize) -> Option<(usize, usize)> {
    let (azimuth, colatitude) = upper_hemisphere(azimuth, colatitude);
    let centre = (resolution as f64 - 1.0) / 2.0;
    let radius = centre * colatitude.sin();
    let xx = (radius * -azimuth.sin() + centre).round();
    let yy = (radius * azimuth.cos() + centre).round();
    let inside = |c: f64| c.is_finite() && c >= 0.0 && c < resolution as f64;
    (inside(xx) && inside(yy)).then(|| (xx as usize, yy as usize))
}

/// Pixel index of every cell of an angular field.
pub fn colormap_indices(
    azimuth: ArrayView2<f64>,
    colatitude: ArrayView2<f64>,
    resolution: usize,
) -> Array2<Option<(usize, usize)>> {
    Zip::from(&azimuth)
        .and(&colatitude)
        .map_collect(|&a, &c| pixel_index(a, c, resolution))
}

/// Colour of every cell of an angular field, `(rows, cols, 3)`.
///
/// Pixels are indexed against the side of the table `provider` returns,
/// which must be square with three channels.
///
/// Out-of-table cells are first clamped to pixel `(0, 0)` so the lookup stays
/// in bounds, then overwritten with [`config::INVALID_PIXEL`].
pub fn colormap<P: ColorwheelProvider + ?Sized>(
    provider: &P,
    azimuth: ArrayView2<f64>,
    colatitude: ArrayView2<f64>,
    resolution: usize,
    semi: bool,
) -> Result<Array3<u8>> {
    let lut = provider.lookup(resolution, semi, false)?;
    let (n, m, channels) = lut.dim();
    if n != m || channels != 3 {
        return Err(UvecsError::ShapeMismatch {
            left: vec![n, m, channels],
            right: vec![n, n, 3],
        });
    }
    if n == 0 {
        return Err(UvecsError::InvalidResolution);
    }
    let indices = colormap_indices(azimuth, colatitude, n);
    let (rows, cols) = indices.dim();

    let clamped = indices.mapv(|index| index.unwrap_or((0, 0)));
    let mut img = Array3::from_shape_fn((rows, cols, 3), |(i, j, k)| {
        let (xx, yy) = clamped[[i, j]];
        lut[[xx, yy, k]]
    });

    let mut invalid = 0usize;
    for ((i, j), index) in indices.indexed_iter() {
        if index.is_none() {
            invalid += 1;
            for (k, &c) in config::INVALID_PIXEL.iter().enumerate() {
                img[[i, j, k]] = c;
            }
        }
    }
    debug!(rows, cols, invalid, resolution = n, "rendered colormap");
    Ok(img)
}
