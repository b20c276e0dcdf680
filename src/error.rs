use thiserror::Error;

/// Result type produced by the unit-vector analysis routines.
pub type Result<T> = std::result::Result<T, UvecsError>;

/// Precondition violations raised by the analysis core.
///
/// Degenerate inputs (for example a field where every cell is missing) are not
/// errors: they produce NaN outputs instead.
#[derive(Debug, Error)]
pub enum UvecsError {
    #[error("orientation field must have {expected} channels, got {found}")]
    ChannelCount { expected: usize, found: usize },
    #[error("coordinate axis '{axis}' has length {found}, grid axis has length {expected}")]
    CoordinateLength {
        axis: String,
        expected: usize,
        found: usize,
    },
    #[error("fields have different shapes: {left:?} and {right:?}")]
    ShapeMismatch { left: Vec<usize>, right: Vec<usize> },
    #[error("neighbor stencil needs at least 3x3 cells, got {rows}x{cols}")]
    GridTooSmall { rows: usize, cols: usize },
    #[error("coordinate lists must be non-empty and of equal length, got {xs} and {ys}")]
    CoordinateLists { xs: usize, ys: usize },
    #[error("no cell with {axis} = {value} on axis '{axis}'")]
    CoordinateNotFound { axis: String, value: f64 },
    #[error("colorwheel resolution must be at least 1")]
    InvalidResolution,
    #[error("kernel bandwidth must be positive and finite, got {0}")]
    InvalidBandwidth(f64),
    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),
}
