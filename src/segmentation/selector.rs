use std::borrow::Borrow;

use crate::models::{ImagePoint, Mask};

/// Picks which mask of a segmentation response drives reconstruction.
///
/// Indices refer to the order the service returned the masks in.
pub struct MaskSelector;

impl MaskSelector {
    /// Highest score wins; the earliest mask wins a tie. `None` only for an
    /// empty slice, which callers are expected to rule out.
    pub fn select<M: Borrow<Mask>>(masks: &[M]) -> Option<usize> {
        let mut best: Option<(usize, f32)> = None;

        for (idx, mask) in masks.iter().enumerate() {
            let score = mask.borrow().score();
            let better = match best {
                None => true,
                Some((_, best_score)) => {
                    score > best_score || (best_score.is_nan() && !score.is_nan())
                }
            };
            if better {
                best = Some((idx, score));
            }
        }

        best.map(|(idx, _)| idx)
    }

    /// User override by index.
    pub fn select_explicit<M: Borrow<Mask>>(masks: &[M], index: usize) -> Option<usize> {
        (index < masks.len()).then_some(index)
    }

    /// User override by clicking: the best-scoring mask covering `point`.
    pub fn select_at<M: Borrow<Mask>>(masks: &[M], point: ImagePoint) -> Option<usize> {
        if point.x < 0.0 || point.y < 0.0 {
            return None;
        }
        let (x, y) = (point.x as u32, point.y as u32);

        let mut best: Option<(usize, f32)> = None;
        for (idx, mask) in masks.iter().enumerate() {
            let mask = mask.borrow();
            if !mask.is_set(x, y) {
                continue;
            }
            if best.map_or(true, |(_, score)| mask.score() > score) {
                best = Some((idx, mask.score()));
            }
        }
        best.map(|(idx, _)| idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ImageSize;

    fn mask(score: f32, cells: Vec<u8>) -> Mask {
        Mask::from_binary(ImageSize::new(2, 2), cells, score).unwrap()
    }

    #[test]
    fn test_selects_highest_score() {
        let masks = vec![
            mask(0.2, vec![1, 0, 0, 0]),
            mask(0.95, vec![0, 1, 0, 0]),
            mask(0.7, vec![0, 0, 1, 0]),
        ];
        let idx = MaskSelector::select(&masks).unwrap();
        assert_eq!(idx, 1);
        assert_eq!(masks[idx].score(), 0.95);
    }

    #[test]
    fn test_tie_goes_to_first_occurrence() {
        let masks = vec![
            mask(0.5, vec![1, 0, 0, 0]),
            mask(0.8, vec![0, 1, 0, 0]),
            mask(0.8, vec![0, 0, 1, 0]),
        ];
        assert_eq!(MaskSelector::select(&masks), Some(1));
    }

    #[test]
    fn test_empty_set_has_no_selection() {
        let masks: Vec<Mask> = Vec::new();
        assert_eq!(MaskSelector::select(&masks), None);
    }

    #[test]
    fn test_nan_score_never_wins() {
        let masks = vec![mask(f32::NAN, vec![1, 0, 0, 0]), mask(0.1, vec![0, 1, 0, 0])];
        assert_eq!(MaskSelector::select(&masks), Some(1));
    }

    #[test]
    fn test_explicit_selection_bounds_checked() {
        let masks = vec![mask(0.5, vec![1, 0, 0, 0])];
        assert_eq!(MaskSelector::select_explicit(&masks, 0), Some(0));
        assert_eq!(MaskSelector::select_explicit(&masks, 3), None);
    }

    #[test]
    fn test_select_at_prefers_covering_mask() {
        let masks = vec![
            mask(0.9, vec![1, 0, 0, 0]),
            mask(0.4, vec![0, 0, 0, 1]),
            mask(0.6, vec![0, 0, 0, 1]),
        ];
        assert_eq!(MaskSelector::select_at(&masks, ImagePoint::new(1.2, 1.7)), Some(2));
        assert_eq!(MaskSelector::select_at(&masks, ImagePoint::new(1.0, 0.0)), None);
    }
}
