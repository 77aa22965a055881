pub mod selector;
pub mod suppression;

pub use selector::MaskSelector;
pub use suppression::{compute_iou, filter_masks, non_max_suppression};
