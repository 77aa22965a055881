use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ImagePoint, ImageSize, MaskBounds};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum PipelineStatus {
    #[default]
    Idle,
    AwaitingDebounce,
    SegmentationInFlight,
    MaskReady,
    ReconstructionInFlight,
    ModelReady,
}

impl PipelineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStatus::Idle => "Idle",
            PipelineStatus::AwaitingDebounce => "AwaitingDebounce",
            PipelineStatus::SegmentationInFlight => "SegmentationInFlight",
            PipelineStatus::MaskReady => "MaskReady",
            PipelineStatus::ReconstructionInFlight => "ReconstructionInFlight",
            PipelineStatus::ModelReady => "ModelReady",
        }
    }

    /// True while a newer mask set is on its way.
    pub fn is_segmenting(&self) -> bool {
        matches!(
            self,
            PipelineStatus::AwaitingDebounce | PipelineStatus::SegmentationInFlight
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MaskSummary {
    pub index: usize,
    pub score: f32,
    pub area: u64,
    /// `None` when the mask has no set pixels.
    pub bounds: Option<MaskBounds>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModelSummary {
    pub payload_bytes: usize,
    pub mask_bounds: MaskBounds,
    pub model_size: [f32; 3],
    pub received_at: DateTime<Utc>,
}

/// Read-only view of the live session handed to hosts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: Option<Uuid>,
    pub status: PipelineStatus,
    pub image_size: Option<ImageSize>,
    pub image_loaded_at: Option<DateTime<Utc>>,
    pub points: Vec<ImagePoint>,
    pub masks: Vec<MaskSummary>,
    pub selected_mask: Option<usize>,
    pub model: Option<ModelSummary>,
}
