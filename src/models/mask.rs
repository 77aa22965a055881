use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};

use super::ImageSize;

/// Mask as it arrives from the segmentation service: nested row-major grids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaskPayload {
    #[serde(default)]
    pub float_mask: Vec<Vec<f32>>,
    pub binary_mask: Vec<Vec<u8>>,
    pub score: f32,
    pub area: u64,
}

/// One segmentation candidate, stored as flat row-major grids.
///
/// Immutable once built. The score is whatever the service reported; nothing
/// in this crate recomputes it.
#[derive(Clone, PartialEq, Deserialize)]
#[serde(try_from = "MaskPayload")]
pub struct Mask {
    size: ImageSize,
    float_mask: Vec<f32>,
    binary_mask: Vec<u8>,
    score: f32,
    area: u64,
}

impl Mask {
    pub fn new(
        size: ImageSize,
        float_mask: Vec<f32>,
        binary_mask: Vec<u8>,
        score: f32,
        area: u64,
    ) -> PipelineResult<Self> {
        if binary_mask.len() != size.pixel_count() {
            return Err(PipelineError::decode(
                "mask",
                format!(
                    "binary grid has {} cells, expected {}",
                    binary_mask.len(),
                    size.pixel_count()
                ),
            ));
        }
        if !float_mask.is_empty() && float_mask.len() != binary_mask.len() {
            return Err(PipelineError::decode(
                "mask",
                "float grid does not match binary grid",
            ));
        }
        if let Some(bad) = binary_mask.iter().find(|&&cell| cell > 1) {
            return Err(PipelineError::decode(
                "mask",
                format!("binary grid contains {bad}"),
            ));
        }

        Ok(Self {
            size,
            float_mask,
            binary_mask,
            score,
            area,
        })
    }

    /// Builds a mask from a 0/1 grid alone, deriving the float grid and area.
    pub fn from_binary(size: ImageSize, binary_mask: Vec<u8>, score: f32) -> PipelineResult<Self> {
        let float_mask = binary_mask.iter().map(|&cell| f32::from(cell)).collect();
        let area = binary_mask.iter().filter(|&&cell| cell == 1).count() as u64;
        Self::new(size, float_mask, binary_mask, score, area)
    }

    pub fn size(&self) -> ImageSize {
        self.size
    }

    pub fn score(&self) -> f32 {
        self.score
    }

    pub fn area(&self) -> u64 {
        self.area
    }

    pub fn is_set(&self, x: u32, y: u32) -> bool {
        if x >= self.size.width || y >= self.size.height {
            return false;
        }
        self.binary_mask[self.index(x, y)] == 1
    }

    pub fn probability(&self, x: u32, y: u32) -> Option<f32> {
        if x >= self.size.width || y >= self.size.height {
            return None;
        }
        self.float_mask.get(self.index(x, y)).copied()
    }

    pub fn binary_cells(&self) -> &[u8] {
        &self.binary_mask
    }

    /// Iterates `(x, y)` of every set cell in row-major order.
    pub fn set_cells(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        let width = self.size.width.max(1) as usize;
        self.binary_mask
            .iter()
            .enumerate()
            .filter(|(_, &cell)| cell == 1)
            .map(move |(idx, _)| ((idx % width) as u32, (idx / width) as u32))
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.size.width as usize + x as usize
    }
}

impl TryFrom<MaskPayload> for Mask {
    type Error = PipelineError;

    fn try_from(payload: MaskPayload) -> PipelineResult<Self> {
        let height = payload.binary_mask.len();
        let width = payload.binary_mask.first().map(Vec::len).unwrap_or(0);

        if payload.binary_mask.iter().any(|row| row.len() != width) {
            return Err(PipelineError::decode("mask", "binary grid rows are ragged"));
        }
        if !payload.float_mask.is_empty()
            && (payload.float_mask.len() != height
                || payload.float_mask.iter().any(|row| row.len() != width))
        {
            return Err(PipelineError::decode(
                "mask",
                "float grid shape differs from binary grid",
            ));
        }

        let size = ImageSize::new(width as u32, height as u32);
        Mask::new(
            size,
            payload.float_mask.into_iter().flatten().collect(),
            payload.binary_mask.into_iter().flatten().collect(),
            payload.score,
            payload.area,
        )
    }
}

impl fmt::Debug for Mask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mask")
            .field("size", &self.size)
            .field("score", &self.score)
            .field("area", &self.area)
            .finish()
    }
}

/// Tightest pixel box around a mask's set cells. Both ends are inclusive.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MaskBounds {
    pub min_x: u32,
    pub max_x: u32,
    pub min_y: u32,
    pub max_y: u32,
}

impl MaskBounds {
    pub fn width(&self) -> u32 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> u32 {
        self.max_y - self.min_y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_parses_service_json() {
        let json = r#"{
            "float_mask": [[0.0, 1.0], [0.0, 0.0]],
            "binary_mask": [[0, 1], [0, 0]],
            "score": 0.87,
            "area": 1
        }"#;
        let mask: Mask = serde_json::from_str(json).unwrap();
        assert_eq!(mask.size(), ImageSize::new(2, 2));
        assert!(mask.is_set(1, 0));
        assert!(!mask.is_set(0, 1));
        assert_eq!(mask.probability(1, 0), Some(1.0));
        assert_eq!(mask.area(), 1);
        assert!((mask.score() - 0.87).abs() < f32::EPSILON);
    }

    #[test]
    fn test_payload_rejects_ragged_rows() {
        let json = r#"{"binary_mask": [[0, 1], [0]], "score": 0.5, "area": 1}"#;
        assert!(serde_json::from_str::<Mask>(json).is_err());
    }

    #[test]
    fn test_rejects_non_binary_cells() {
        let err = Mask::from_binary(ImageSize::new(2, 1), vec![0, 2], 0.5).unwrap_err();
        assert!(matches!(err, PipelineError::Decode { .. }));
    }

    #[test]
    fn test_set_cells_row_major() {
        let mask = Mask::from_binary(ImageSize::new(3, 2), vec![0, 1, 0, 1, 0, 1], 0.5).unwrap();
        let cells: Vec<_> = mask.set_cells().collect();
        assert_eq!(cells, vec![(1, 0), (0, 1), (2, 1)]);
        assert_eq!(mask.area(), 3);
    }
}
