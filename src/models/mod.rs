pub mod raster;
pub mod mask;
pub mod session;

pub use raster::{BaseImage, ImagePoint, ImageSize};
pub use mask::{Mask, MaskBounds, MaskPayload};
pub use session::{MaskSummary, ModelSummary, PipelineStatus, SessionSnapshot};
