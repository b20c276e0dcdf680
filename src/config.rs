/// Decimal places kept in the dot product before `arccos` for pairwise angles.
pub const PAIR_ROUND_DECIMALS: i32 = 10;
/// Decimal places kept in the spherical law of cosines for the neighbor stencil.
pub const STENCIL_ROUND_DECIMALS: i32 = 5;
/// Default side length of the colorwheel lookup table.
pub const DEFAULT_LUT_RESOLUTION: usize = 512;
/// Colour written to cells whose colorwheel index falls outside the table.
pub const INVALID_PIXEL: [u8; 3] = [255, 255, 255];
/// Default kernel bandwidth (radians) for the spherical density estimate.
pub const DEFAULT_BANDWIDTH: f64 = 0.2;
/// Default cap on the number of doubled samples handed to the density estimator.
pub const DEFAULT_MAX_SAMPLES: usize = 10000;
/// Default number of lattice points covering the sphere for density evaluation.
pub const DEFAULT_MESH_POINTS: usize = 5000;
/// Default number of equator points added to the evaluation mesh.
pub const DEFAULT_CIRCLE_POINTS: usize = 10000;
/// Default colatitudes (degrees) of the pole-figure reference circles.
pub const DEFAULT_REFERENCE_ANGLES: [f64; 2] = [30.0, 60.0];
/// Iteration cap for the symmetric eigen-decomposition of the orientation tensor.
pub const EIGEN_MAX_ITERATIONS: usize = 1000;
/// Channel label of the angular input field.
pub const ANGLE_CHANNEL: &str = "uvec";
/// Channel label of a cartesian field.
pub const CARTESIAN_CHANNEL: &str = "vc";
/// Channel label of a Bunge-Euler field.
pub const BUNGE_CHANNEL: &str = "vbe";
/// Channel label of a colormap image.
pub const IMAGE_CHANNEL: &str = "img";
/// Channel label of a neighbor misorientation field.
pub const MISORIENTATION_CHANNEL: &str = "misAngle";
