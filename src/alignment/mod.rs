//! Mapping a mask's pixel box onto a 3D placement under the fixed camera.

pub mod aligner;
pub mod camera;
pub mod model_bounds;

pub use aligner::{compute_transform, AlignmentInput, MaskFootprint, SpatialAligner, SpatialTransform};
pub use camera::{ProjectionPlane, VirtualCamera, PROJECTION_RAY_LENGTH};
pub use model_bounds::ModelBounds;
