//! Analysis of gridded unit-vector (axis) fields with antipodal symmetry.
//!
//! Every cell of an orientation field holds an axis given by its azimuth and
//! colatitude, where `u` and `-u` describe the same orientation. The crate
//! provides:
//! - Coordinate transforms between angular, cartesian and Bunge Euler forms
//! - Colorwheel colormaps of a field
//! - The second-order orientation tensor and its principal axes
//! - Neighbor misorientation, misorientation profiles, inner angles and
//!   Schmid factors
//! - Kernel density preparation of pole figures
//!
//! [`Uvecs`] wraps a field and exposes each analysis as a method.

pub mod colorwheel;
pub mod config;
pub mod density;
pub mod error;
pub mod grid;
pub mod misorientation;
pub mod orientation;
pub mod settings;
pub mod tensor;
pub mod transform;
pub mod uvecs;

pub use error::{Result, UvecsError};
pub use grid::{Grid, Layer, SelectMethod};
pub use uvecs::{Cartesian, Uvecs};
