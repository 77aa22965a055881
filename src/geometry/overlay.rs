use serde::Serialize;

use crate::models::{ImageSize, Mask};

/// Flat triangle mesh in normalised image space ([-1, 1] on both axes, +Y up).
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OverlayMesh {
    pub positions: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
}

impl OverlayMesh {
    pub fn quad_count(&self) -> usize {
        self.positions.len() / 4
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// One quad (two triangles) per set mask cell, sized to the cell.
pub fn overlay_mesh(mask: &Mask, size: ImageSize) -> OverlayMesh {
    let width = size.width.max(1) as f32;
    let height = size.height.max(1) as f32;
    let cells = mask.area() as usize;

    let mut mesh = OverlayMesh {
        positions: Vec::with_capacity(cells * 4),
        indices: Vec::with_capacity(cells * 6),
    };

    for (x, y) in mask.set_cells() {
        let x1 = x as f32 / width * 2.0 - 1.0;
        let x2 = (x + 1) as f32 / width * 2.0 - 1.0;
        let y1 = -(y as f32 / height) * 2.0 + 1.0;
        let y2 = -((y + 1) as f32 / height) * 2.0 + 1.0;

        let base = mesh.positions.len() as u32;
        mesh.positions.extend_from_slice(&[
            [x1, y1, 0.0],
            [x2, y1, 0.0],
            [x2, y2, 0.0],
            [x1, y2, 0.0],
        ]);
        mesh.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    mesh
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_quad_per_set_cell() {
        let size = ImageSize::new(2, 2);
        let mask = Mask::from_binary(size, vec![1, 0, 0, 1], 0.5).unwrap();
        let mesh = overlay_mesh(&mask, size);

        assert_eq!(mesh.quad_count(), 2);
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3, 4, 5, 6, 4, 6, 7]);
    }

    #[test]
    fn test_top_left_cell_maps_to_upper_left_quadrant() {
        let size = ImageSize::new(2, 2);
        let mask = Mask::from_binary(size, vec![1, 0, 0, 0], 0.5).unwrap();
        let mesh = overlay_mesh(&mask, size);

        assert_eq!(
            mesh.positions,
            vec![
                [-1.0, 1.0, 0.0],
                [0.0, 1.0, 0.0],
                [0.0, 0.0, 0.0],
                [-1.0, 0.0, 0.0]
            ]
        );
    }

    #[test]
    fn test_empty_mask_yields_empty_mesh() {
        let size = ImageSize::new(3, 3);
        let mask = Mask::from_binary(size, vec![0; 9], 0.5).unwrap();
        assert!(overlay_mesh(&mask, size).is_empty());
    }
}
