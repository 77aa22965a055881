use glam::Vec3;
use serde::Serialize;

use crate::error::{PipelineError, PipelineResult};
use crate::models::{ImageSize, MaskBounds};

use super::ModelBounds;

/// Depth of the projection-plane origin, behind the image plane.
pub const PROJECTION_DEPTH: f32 = -1.0;
/// Extent of the projection plane along its own Y before the debug ray length
/// is applied.
pub const PROJECTION_LENGTH: f32 = 1.0;

/// Everything the placement depends on. Equal inputs give bit-identical output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignmentInput {
    pub mask_bounds: MaskBounds,
    pub image_size: ImageSize,
    pub model_bounds: ModelBounds,
    pub flip_x: bool,
    pub vertical_adjustment: f32,
    pub rotation: Vec3,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SpatialTransform {
    pub scale: Vec3,
    pub model_position: Vec3,
    pub rotation: Vec3,
    pub projection_origin: Vec3,
    pub projection_direction: Vec3,
    pub projection_scale: Vec3,
}

/// Mask footprint in normalised device units, before any model is involved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaskFootprint {
    pub width: f32,
    pub height: f32,
    pub center_x: f32,
    pub center_y: f32,
}

impl MaskFootprint {
    /// Image Y runs down from the top-left corner; scene Y runs up.
    pub fn new(bounds: &MaskBounds, size: ImageSize) -> Self {
        let w = size.width as f32;
        let h = size.height as f32;

        Self {
            width: (bounds.max_x - bounds.min_x) as f32 / w * 2.0,
            height: (bounds.max_y - bounds.min_y) as f32 / h * 2.0,
            center_x: ((bounds.min_x + bounds.max_x) as f32 / 2.0 / w) * 2.0 - 1.0,
            center_y: -(((bounds.min_y + bounds.max_y) as f32 / 2.0 / h) * 2.0 - 1.0),
        }
    }
}

/// Places a model so its footprint matches the mask's under the fixed camera.
///
/// The scale is uniform and governed by the tighter axis, so the looser axis
/// of the mask may be left partly uncovered.
pub fn compute_transform(input: &AlignmentInput) -> PipelineResult<SpatialTransform> {
    if input.image_size.width == 0 || input.image_size.height == 0 {
        return Err(PipelineError::decode("image", "zero-sized image"));
    }

    let footprint = MaskFootprint::new(&input.mask_bounds, input.image_size);
    let model_size = input.model_bounds.size();
    let model_center = input.model_bounds.center();

    let scale = (footprint.width / model_size.x).min(footprint.height / model_size.y);
    if !scale.is_finite() {
        return Err(PipelineError::decode(
            "model",
            format!("cannot fit model of size {model_size}"),
        ));
    }

    let model_position = Vec3::new(
        footprint.center_x - model_center.x * scale,
        footprint.center_y - model_center.y * scale,
        0.0,
    );

    let projection_origin = Vec3::new(
        model_position.x,
        footprint.center_y - model_center.y * scale + input.vertical_adjustment,
        PROJECTION_DEPTH,
    );

    // Flipping mirrors the geometry about its pivot; the position is untouched.
    let scale_x = if input.flip_x { -scale } else { scale };

    Ok(SpatialTransform {
        scale: Vec3::new(scale_x, scale, scale),
        model_position,
        rotation: input.rotation,
        projection_origin,
        projection_direction: Vec3::Z,
        projection_scale: Vec3::new(footprint.width, PROJECTION_LENGTH, footprint.height),
    })
}

/// Memoising front for [`compute_transform`]; only the last result is kept.
#[derive(Debug, Default)]
pub struct SpatialAligner {
    cached: Option<(AlignmentInput, SpatialTransform)>,
}

impl SpatialAligner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn align(&mut self, input: AlignmentInput) -> PipelineResult<SpatialTransform> {
        if let Some((cached_input, transform)) = &self.cached {
            if *cached_input == input {
                return Ok(*transform);
            }
        }

        let transform = compute_transform(&input)?;
        self.cached = Some((input, transform));
        Ok(transform)
    }

    pub fn invalidate(&mut self) {
        self.cached = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_model() -> ModelBounds {
        ModelBounds::new(Vec3::splat(-0.5), Vec3::splat(0.5))
    }

    fn scenario() -> AlignmentInput {
        AlignmentInput {
            mask_bounds: MaskBounds {
                min_x: 100,
                max_x: 300,
                min_y: 100,
                max_y: 300,
            },
            image_size: ImageSize::new(1024, 1024),
            model_bounds: unit_model(),
            flip_x: false,
            vertical_adjustment: 0.0,
            rotation: Vec3::ZERO,
        }
    }

    #[test]
    fn test_reference_scenario() {
        let input = scenario();
        let footprint = MaskFootprint::new(&input.mask_bounds, input.image_size);
        assert_eq!(footprint.width, 0.390625);
        assert_eq!(footprint.height, 0.390625);
        assert_eq!(footprint.center_x, -0.609375);
        assert_eq!(footprint.center_y, 0.609375);

        let transform = compute_transform(&input).unwrap();
        assert_eq!(transform.scale, Vec3::splat(0.390625));
        assert_eq!(transform.model_position, Vec3::new(-0.609375, 0.609375, 0.0));
        assert_eq!(transform.projection_direction, Vec3::Z);
        assert_eq!(transform.projection_scale, Vec3::new(0.390625, 1.0, 0.390625));
        assert_eq!(transform.projection_origin, Vec3::new(-0.609375, 0.609375, -1.0));
    }

    #[test]
    fn test_tighter_axis_governs_scale() {
        let mut input = scenario();
        // Twice as wide as tall.
        input.model_bounds = ModelBounds::new(Vec3::new(-1.0, -0.5, -0.5), Vec3::new(1.0, 0.5, 0.5));
        let transform = compute_transform(&input).unwrap();
        assert_eq!(transform.scale.y, 0.390625 / 2.0);
    }

    #[test]
    fn test_off_center_model_is_recentred() {
        let mut input = scenario();
        input.model_bounds = ModelBounds::new(Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 1.0, 1.0));
        let transform = compute_transform(&input).unwrap();
        let s = 0.390625;
        assert_eq!(transform.model_position.x, -0.609375 - 0.5 * s);
        assert_eq!(transform.model_position.y, 0.609375 - 0.5 * s);
    }

    #[test]
    fn test_flip_negates_only_x_scale() {
        let plain = compute_transform(&scenario()).unwrap();
        let mut flipped_input = scenario();
        flipped_input.flip_x = true;
        let flipped = compute_transform(&flipped_input).unwrap();

        assert_eq!(flipped.scale.x, -plain.scale.x);
        assert_eq!(flipped.scale.y, plain.scale.y);
        assert_eq!(flipped.scale.z, plain.scale.z);
        assert_eq!(flipped.model_position, plain.model_position);
    }

    #[test]
    fn test_vertical_adjustment_moves_projection_only() {
        let mut input = scenario();
        input.vertical_adjustment = 0.25;
        let adjusted = compute_transform(&input).unwrap();
        let plain = compute_transform(&scenario()).unwrap();

        assert_eq!(adjusted.model_position, plain.model_position);
        assert_eq!(adjusted.projection_origin.y, plain.projection_origin.y + 0.25);
        assert_eq!(adjusted.projection_origin.z, PROJECTION_DEPTH);
    }

    #[test]
    fn test_identical_inputs_are_bit_identical() {
        let mut input = scenario();
        input.mask_bounds = MaskBounds {
            min_x: 13,
            max_x: 977,
            min_y: 41,
            max_y: 402,
        };
        input.image_size = ImageSize::new(1000, 700);
        input.flip_x = true;
        input.vertical_adjustment = 0.13;

        let a = compute_transform(&input).unwrap();
        let b = compute_transform(&input).unwrap();
        let bits = |t: &SpatialTransform| {
            [t.scale, t.model_position, t.projection_origin, t.projection_scale]
                .iter()
                .flat_map(|v| v.to_array().map(f32::to_bits))
                .collect::<Vec<_>>()
        };
        assert_eq!(bits(&a), bits(&b));

        let mut aligner = SpatialAligner::new();
        let c = aligner.align(input).unwrap();
        let d = aligner.align(input).unwrap();
        assert_eq!(bits(&c), bits(&a));
        assert_eq!(bits(&d), bits(&a));
    }

    #[test]
    fn test_aligner_recomputes_when_flip_changes() {
        let mut aligner = SpatialAligner::new();
        let first = aligner.align(scenario()).unwrap();
        let mut flipped = scenario();
        flipped.flip_x = true;
        let second = aligner.align(flipped).unwrap();
        assert_eq!(second.scale.x, -first.scale.x);
    }

    #[test]
    fn test_zero_sized_image_rejected() {
        let mut input = scenario();
        input.image_size = ImageSize::new(0, 1024);
        assert!(compute_transform(&input).is_err());
    }
}
