//! Labeled grid storage for orientation fields and their derived outputs.
//!
//! A [`Grid`] is a `(rows, cols, channels)` array with named axes and
//! coordinate vectors for the two spatial axes (`y` along rows, `x` along
//! columns). Derived fields reuse the input's spatial axis names and
//! coordinates and carry a new trailing channel label. [`Layer`] is the
//! single-channel sibling used for per-cell scalar outputs.

use ndarray::{Array1, Array2, Array3, ArrayView2, Axis};
use serde::Deserialize;

use crate::error::{Result, UvecsError};


/// Coordinate matching policy for label-based selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectMethod {
    /// The coordinate must equal a grid coordinate.
    Exact,
    /// The closest grid coordinate is used.
    #[default]
    Nearest,
}

impl SelectMethod {
    /// Index of `value` along `coords` under this policy.
    pub fn locate(&self, axis: &str, coords: &Array1<f64>, value: f64) -> Result<usize> {
        let found = match self {
            SelectMethod::Exact => coords.iter().position(|&c| c == value),
            SelectMethod::Nearest => coords
                .iter()
                .enumerate()
                .filter(|(_, c)| !c.is_nan())
                .min_by(|(_, a), (_, b)| (*a - value).abs().total_cmp(&(*b - value).abs()))
                .map(|(i, _)| i),
        };
        found.ok_or_else(|| UvecsError::CoordinateNotFound {
            axis: axis.to_string(),
            value,
        })
    }
}

/// Labeled `(rows, cols, channels)` array.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid<A> {
    data: Array3<A>,
    dims: [String; 3],
    y: Array1<f64>,
    x: Array1<f64>,
}

impl<A> Grid<A> {
    /// Creates a grid, checking the coordinate vectors against the data shape.
    pub fn new(data: Array3<A>, dims: [String; 3], y: Array1<f64>, x: Array1<f64>) -> Result<Self> {
        let (rows, cols, _) = data.dim();
        if y.len() != rows {
            return Err(UvecsError::CoordinateLength {
                axis: dims[0].clone(),
                expected: rows,
                found: y.len(),
            });
        }
        if x.len() != cols {
            return Err(UvecsError::CoordinateLength {
                axis: dims[1].clone(),
                expected: cols,
                found: x.len(),
            });
        }
        Ok(Self { data, dims, y, x })
    }

    /// Creates a grid with axes `y`, `x`, `uvec` and integer cell coordinates.
    pub fn from_array(data: Array3<A>) -> Self {
        let (rows, cols, _) = data.dim();
        Self {
            data,
            dims: ["y".into(), "x".into(), crate::config::ANGLE_CHANNEL.into()],
            y: Array1::from_iter((0..rows).map(|i| i as f64)),
            x: Array1::from_iter((0..cols).map(|j| j as f64)),
        }
    }

    pub fn data(&self) -> &Array3<A> {
        &self.data
    }

    pub fn into_data(self) -> Array3<A> {
        self.data
    }

    pub fn dims(&self) -> &[String; 3] {
        &self.dims
    }

    pub fn y(&self) -> &Array1<f64> {
        &self.y
    }

    pub fn x(&self) -> &Array1<f64> {
        &self.x
    }

    /// `(rows, cols, channels)`
    pub fn shape(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    pub fn channel(&self, index: usize) -> ArrayView2<A> {
        self.data.index_axis(Axis(2), index)
    }

    /// Wraps `data` with this grid's spatial axes and a new channel label.
    pub fn derive<B>(&self, data: Array3<B>, channel: &str) -> Grid<B> {
        Grid {
            data,
            dims: [self.dims[0].clone(), self.dims[1].clone(), channel.into()],
            y: self.y.clone(),
            x: self.x.clone(),
        }
    }

    /// Wraps a per-cell scalar field with this grid's spatial axes.
    pub fn layer<B>(&self, data: Array2<B>) -> Layer<B> {
        Layer {
            data,
            dims: [self.dims[0].clone(), self.dims[1].clone()],
            y: self.y.clone(),
            x: self.x.clone(),
        }
    }
}

impl<A: Clone> Grid<A> {
    /// Pointwise selection: row `i` of the output holds the channels of the
    /// cell at `(xs[i], ys[i])`.
    pub fn select_points(&self, xs: &[f64], ys: &[f64], method: SelectMethod) -> Result<Array2<A>> {
        if xs.len() != ys.len() {
            return Err(UvecsError::CoordinateLists {
                xs: xs.len(),
                ys: ys.len(),
            });
        }
        let cells = xs
            .iter()
            .zip(ys)
            .map(|(&x, &y)| {
                let col = method.locate(&self.dims[1], &self.x, x)?;
                let row = method.locate(&self.dims[0], &self.y, y)?;
                Ok((row, col))
            })
            .collect::<Result<Vec<_>>>()?;

        let channels = self.data.len_of(Axis(2));
        Ok(Array2::from_shape_fn((cells.len(), channels), |(p, k)| {
            let (row, col) = cells[p];
            self.data[[row, col, k]].clone()
        }))
    }
}

/// Labeled `(rows, cols)` array.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer<A> {
    data: Array2<A>,
    dims: [String; 2],
    y: Array1<f64>,
    x: Array1<f64>,
}

impl<A> Layer<A> {
    pub fn data(&self) -> &Array2<A> {
        &self.data
    }

    pub fn into_data(self) -> Array2<A> {
        self.data
    }

    pub fn dims(&self) -> &[String; 2] {
        &self.dims
    }

    pub fn y(&self) -> &Array1<f64> {
        &self.y
    }

    pub fn x(&self) -> &Array1<f64> {
        &self.x
    }
}
