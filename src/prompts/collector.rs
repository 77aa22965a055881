use rand::Rng;

use crate::models::{ImagePoint, ImageSize};

/// Label the segmentation service reads as "foreground".
pub const FOREGROUND_LABEL: u8 = 1;

/// Ordered click points for the current base image.
#[derive(Debug, Clone, Default)]
pub struct PointPromptCollector {
    points: Vec<ImagePoint>,
}

impl PointPromptCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Points outside the image are kept; the segmentation service rejects them.
    pub fn add_point(&mut self, point: ImagePoint) {
        self.points.push(point);
    }

    pub fn reset(&mut self) {
        self.points.clear();
    }

    /// Appends `count` uniformly distributed in-image points. Returns how
    /// many were added, which is zero for an empty image.
    pub fn seed_random<R: Rng + ?Sized>(&mut self, size: ImageSize, count: usize, rng: &mut R) -> usize {
        if size.width == 0 || size.height == 0 {
            return 0;
        }
        for _ in 0..count {
            let x = rng.gen_range(0..size.width) as f32;
            let y = rng.gen_range(0..size.height) as f32;
            self.points.push(ImagePoint::new(x, y));
        }
        count
    }

    pub fn points(&self) -> &[ImagePoint] {
        &self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// `(point_coords, point_labels)` in the shape the segmentation service expects.
    pub fn to_prompt(&self) -> (Vec<[f32; 2]>, Vec<u8>) {
        let coords = self.points.iter().map(|p| [p.x, p.y]).collect();
        let labels = vec![FOREGROUND_LABEL; self.points.len()];
        (coords, labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_points_keep_click_order() {
        let mut collector = PointPromptCollector::new();
        collector.add_point(ImagePoint::new(5.0, 6.0));
        collector.add_point(ImagePoint::new(1.0, 2.0));

        let (coords, labels) = collector.to_prompt();
        assert_eq!(coords, vec![[5.0, 6.0], [1.0, 2.0]]);
        assert_eq!(labels, vec![1, 1]);
    }

    #[test]
    fn test_out_of_range_points_are_accepted() {
        let mut collector = PointPromptCollector::new();
        collector.add_point(ImagePoint::new(-10.0, 4000.0));
        assert_eq!(collector.points().len(), 1);
    }

    #[test]
    fn test_reset_clears_points() {
        let mut collector = PointPromptCollector::new();
        collector.add_point(ImagePoint::new(0.0, 0.0));
        collector.add_point(ImagePoint::new(1.0, 1.0));
        collector.reset();
        assert!(collector.is_empty());
        assert_eq!(collector.to_prompt(), (Vec::new(), Vec::new()));
    }

    #[test]
    fn test_seeded_points_lie_within_image() {
        let size = ImageSize::new(64, 32);
        let mut rng = StdRng::seed_from_u64(7);
        let mut collector = PointPromptCollector::new();
        assert_eq!(collector.seed_random(size, 10, &mut rng), 10);
        assert_eq!(collector.seed_random(ImageSize::new(0, 5), 3, &mut rng), 0);

        assert_eq!(collector.points().len(), 10);
        assert!(collector.points().iter().all(|p| p.lies_within(size)));
    }
}
