//! Pixel-space work on a single mask: its bounding box, the alpha-carved
//! texture sent for reconstruction, and the overlay silhouette.

pub mod bounds;
pub mod carve;
pub mod overlay;

pub use bounds::compute_bounds;
pub use carve::carve_alpha;
pub use overlay::{overlay_mesh, OverlayMesh};
