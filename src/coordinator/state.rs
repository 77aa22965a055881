use std::sync::Arc;

use chrono::{DateTime, Utc};
use image::RgbaImage;
use uuid::Uuid;

use crate::alignment::ModelBounds;
use crate::geometry::compute_bounds;
use crate::models::{
    BaseImage, Mask, MaskBounds, MaskSummary, ModelSummary, PipelineStatus, SessionSnapshot,
};
use crate::prompts::PointPromptCollector;

/// One segmentation response, with each mask's summary worked out once on
/// arrival.
#[derive(Debug, Clone, Default)]
pub struct MaskSet {
    masks: Vec<Arc<Mask>>,
    summaries: Vec<MaskSummary>,
}

impl MaskSet {
    /// Scans every mask for its bounds. Run it off the runtime threads.
    pub fn new(masks: Vec<Mask>) -> Self {
        let summaries = masks
            .iter()
            .enumerate()
            .map(|(index, mask)| MaskSummary {
                index,
                score: mask.score(),
                area: mask.area(),
                bounds: compute_bounds(mask).ok(),
            })
            .collect();

        Self {
            masks: masks.into_iter().map(Arc::new).collect(),
            summaries,
        }
    }

    pub fn masks(&self) -> &[Arc<Mask>] {
        &self.masks
    }

    pub fn get(&self, index: usize) -> Option<&Arc<Mask>> {
        self.masks.get(index)
    }

    /// `None` for an empty mask or an index out of range.
    pub fn bounds(&self, index: usize) -> Option<MaskBounds> {
        self.summaries.get(index).and_then(|summary| summary.bounds)
    }

    pub fn summaries(&self) -> &[MaskSummary] {
        &self.summaries
    }

    pub fn len(&self) -> usize {
        self.masks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }
}

/// A model the reconstruction service returned, kept together with the mask
/// box and carved texture it was built from so it can be placed on its own.
#[derive(Debug, Clone)]
pub struct ReconstructedModel {
    pub payload: Arc<Vec<u8>>,
    pub bounds: ModelBounds,
    /// Epoch of the mask set the source mask belonged to.
    pub mask_epoch: u64,
    pub mask_index: usize,
    pub mask_bounds: MaskBounds,
    pub texture: Arc<RgbaImage>,
    pub received_at: DateTime<Utc>,
}

impl ReconstructedModel {
    pub fn summary(&self) -> ModelSummary {
        ModelSummary {
            payload_bytes: self.payload.len(),
            mask_bounds: self.mask_bounds,
            model_size: self.bounds.size().to_array(),
            received_at: self.received_at,
        }
    }
}

/// Everything one base image accumulates. Only the coordinator mutates it.
#[derive(Debug, Default)]
pub struct SessionState {
    pub session_id: Option<Uuid>,
    pub status: PipelineStatus,
    pub image: Option<BaseImage>,
    pub image_loaded_at: Option<DateTime<Utc>>,
    pub prompts: PointPromptCollector,
    pub masks: MaskSet,
    /// Epoch of the point list `masks` was segmented from.
    pub mask_epoch: u64,
    pub selected_mask: Option<usize>,
    /// Last good model. It may belong to a mask that is no longer selected.
    pub model: Option<ReconstructedModel>,
    /// Bumped whenever the point list or image changes. A segmentation
    /// response tagged with an older epoch is discarded.
    pub epoch: u64,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops everything from the previous image and starts a fresh session.
    pub fn begin(&mut self, image: BaseImage) -> Uuid {
        let session_id = Uuid::new_v4();
        self.session_id = Some(session_id);
        self.status = PipelineStatus::Idle;
        self.image = Some(image);
        self.image_loaded_at = Some(Utc::now());
        self.prompts.reset();
        self.masks = MaskSet::default();
        self.selected_mask = None;
        self.model = None;
        self.epoch = self.epoch.wrapping_add(1);
        self.mask_epoch = self.epoch;
        session_id
    }

    pub fn bump_epoch(&mut self) -> u64 {
        self.epoch = self.epoch.wrapping_add(1);
        self.epoch
    }

    /// Installs the masks segmented from the point list of `epoch`.
    pub fn replace_masks(&mut self, masks: MaskSet, epoch: u64) {
        self.masks = masks;
        self.mask_epoch = epoch;
        self.selected_mask = None;
    }

    /// The model to draw: only one built from the selected mask of the live
    /// mask set, and never while that set is about to be replaced.
    pub fn displayed_model(&self) -> Option<&ReconstructedModel> {
        let model = self.model.as_ref()?;
        let current = model.mask_epoch == self.mask_epoch
            && Some(model.mask_index) == self.selected_mask
            && !self.status.is_segmenting();
        current.then_some(model)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session_id,
            status: self.status,
            image_size: self.image.as_ref().map(BaseImage::size),
            image_loaded_at: self.image_loaded_at,
            points: self.prompts.points().to_vec(),
            masks: self.mask_summaries(),
            selected_mask: self.selected_mask,
            model: self.model.as_ref().map(ReconstructedModel::summary),
        }
    }

    pub fn mask_summaries(&self) -> Vec<MaskSummary> {
        self.masks.summaries().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ImagePoint, ImageSize};
    use crate::services::encode_png;

    fn image() -> BaseImage {
        let png = encode_png(&RgbaImage::new(4, 4)).unwrap();
        BaseImage::decode(png, None).unwrap()
    }

    #[test]
    fn test_begin_clears_previous_session() {
        let mut state = SessionState::new();
        let first = state.begin(image());
        state.prompts.add_point(ImagePoint::new(1.0, 1.0));
        let masks = MaskSet::new(vec![
            Mask::from_binary(ImageSize::new(4, 4), vec![1; 16], 0.9).unwrap(),
        ]);
        let epoch = state.epoch;
        state.replace_masks(masks, epoch);
        state.selected_mask = Some(0);
        state.status = PipelineStatus::MaskReady;

        let second = state.begin(image());
        assert_ne!(first, second);
        assert!(state.prompts.is_empty());
        assert!(state.masks.is_empty());
        assert_eq!(state.selected_mask, None);
        assert_eq!(state.status, PipelineStatus::Idle);
        assert!(state.epoch > epoch);
    }

    #[test]
    fn test_snapshot_summarises_masks() {
        let mut state = SessionState::new();
        state.begin(image());
        let size = ImageSize::new(4, 4);
        let mut cells = vec![0; 16];
        cells[5] = 1;
        let masks = MaskSet::new(vec![
            Mask::from_binary(size, cells, 0.8).unwrap(),
            Mask::from_binary(size, vec![0; 16], 0.3).unwrap(),
        ]);
        let epoch = state.epoch;
        state.replace_masks(masks, epoch);

        let snapshot = state.snapshot();
        assert_eq!(snapshot.image_size, Some(size));
        assert_eq!(snapshot.masks.len(), 2);
        assert_eq!(
            snapshot.masks[0].bounds,
            Some(MaskBounds {
                min_x: 1,
                max_x: 1,
                min_y: 1,
                max_y: 1
            })
        );
        assert_eq!(snapshot.masks[1].bounds, None);
        assert_eq!(state.masks.bounds(1), None);
        assert_eq!(state.masks.bounds(7), None);
    }

    fn model(mask_epoch: u64, mask_index: usize) -> ReconstructedModel {
        ReconstructedModel {
            payload: Arc::new(vec![0; 4]),
            bounds: ModelBounds::new(glam::Vec3::ZERO, glam::Vec3::ONE),
            mask_epoch,
            mask_index,
            mask_bounds: MaskBounds {
                min_x: 0,
                max_x: 1,
                min_y: 0,
                max_y: 1,
            },
            texture: Arc::new(RgbaImage::new(1, 1)),
            received_at: Utc::now(),
        }
    }

    #[test]
    fn test_model_is_displayed_only_for_the_live_selection() {
        let mut state = SessionState::new();
        state.begin(image());
        let size = ImageSize::new(4, 4);
        let masks = || {
            MaskSet::new(vec![
                Mask::from_binary(size, vec![1; 16], 0.9).unwrap(),
                Mask::from_binary(size, vec![1; 16], 0.4).unwrap(),
            ])
        };
        let epoch = state.bump_epoch();
        state.replace_masks(masks(), epoch);
        state.selected_mask = Some(0);
        state.status = PipelineStatus::ModelReady;
        state.model = Some(model(epoch, 0));
        assert!(state.displayed_model().is_some());

        state.selected_mask = Some(1);
        assert!(state.displayed_model().is_none());
        state.selected_mask = Some(0);

        state.status = PipelineStatus::AwaitingDebounce;
        assert!(state.displayed_model().is_none());
        state.status = PipelineStatus::Idle;
        assert!(state.displayed_model().is_some());

        let newer = state.bump_epoch();
        state.replace_masks(masks(), newer);
        state.selected_mask = Some(0);
        assert!(state.displayed_model().is_none());
        assert!(state.model.is_some());
    }
}
