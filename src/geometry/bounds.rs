use crate::error::EmptyMaskError;
use crate::models::{Mask, MaskBounds};

/// Tightest inclusive box around the mask's set cells.
pub fn compute_bounds(mask: &Mask) -> Result<MaskBounds, EmptyMaskError> {
    let mut bounds: Option<MaskBounds> = None;

    for (x, y) in mask.set_cells() {
        bounds = Some(match bounds {
            None => MaskBounds {
                min_x: x,
                max_x: x,
                min_y: y,
                max_y: y,
            },
            Some(b) => MaskBounds {
                min_x: b.min_x.min(x),
                max_x: b.max_x.max(x),
                min_y: b.min_y.min(y),
                max_y: b.max_y.max(y),
            },
        });
    }

    bounds.ok_or(EmptyMaskError)
}
