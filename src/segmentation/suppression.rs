use std::borrow::Borrow;

use crate::config::SegmentationParams;
use crate::models::Mask;

/// Intersection over union of two equally sized masks. Zero when both are empty.
pub fn compute_iou(a: &Mask, b: &Mask) -> f32 {
    let mut intersection = 0u64;
    let mut union = 0u64;
    for (&lhs, &rhs) in a.binary_cells().iter().zip(b.binary_cells()) {
        let (lhs, rhs) = (lhs == 1, rhs == 1);
        if lhs && rhs {
            intersection += 1;
        }
        if lhs || rhs {
            union += 1;
        }
    }

    if union == 0 {
        0.0
    } else {
        intersection as f32 / union as f32
    }
}

/// Greedy non-maximum suppression over mask overlap.
///
/// Masks are visited best score first. A mask below `min_area_ratio` of the
/// image is dropped without suppressing anything; a kept mask removes every
/// remaining mask overlapping it by more than `iou_threshold`. Returns the kept
/// indices, best score first.
pub fn non_max_suppression<M: Borrow<Mask>>(
    masks: &[M],
    iou_threshold: f32,
    min_area_ratio: f32,
) -> Vec<usize> {
    let mut order: Vec<usize> = (0..masks.len()).collect();
    // Stable, so equal scores keep response order.
    order.sort_by(|&a, &b| {
        masks[b]
            .borrow()
            .score()
            .partial_cmp(&masks[a].borrow().score())
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep = Vec::new();
    while let Some((&current, rest)) = order.split_first() {
        let mask = masks[current].borrow();
        let total = mask.size().pixel_count().max(1) as f32;
        let covered = mask.set_cells().count() as f32;

        if covered / total < min_area_ratio {
            order = rest.to_vec();
            continue;
        }

        keep.push(current);
        order = rest
            .iter()
            .copied()
            .filter(|&other| compute_iou(mask, masks[other].borrow()) <= iou_threshold)
            .collect();
    }

    keep
}

/// Client-side mirror of the service's filter stage: score floor, area floor,
/// overlap suppression, then the mask-count cap.
pub fn filter_masks(masks: Vec<Mask>, params: &SegmentationParams) -> Vec<Mask> {
    let scored: Vec<Mask> = masks
        .into_iter()
        .filter(|mask| mask.score() >= params.min_score)
        .collect();

    let kept = non_max_suppression(&scored, params.iou_threshold, params.min_area_ratio);
    let limit = params.max_masks as usize;

    let mut slots: Vec<Option<Mask>> = scored.into_iter().map(Some).collect();
    kept.into_iter()
        .take(limit)
        .filter_map(|idx| slots[idx].take())
        .collect()
}
