use serde::Serialize;
use uuid::Uuid;

use crate::models::{MaskSummary, ModelSummary, PipelineStatus};
use crate::scene::ComposedScene;

/// Capacity of the broadcast channel; slow subscribers lag past this.
pub const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Stage {
    ImageGeneration,
    ImageLoad,
    Segmentation,
    Reconstruction,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::ImageGeneration => "imageGeneration",
            Stage::ImageLoad => "imageLoad",
            Stage::Segmentation => "segmentation",
            Stage::Reconstruction => "reconstruction",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum PipelineEvent {
    StatusChanged {
        session_id: Option<Uuid>,
        status: PipelineStatus,
    },
    MasksUpdated {
        masks: Vec<MaskSummary>,
        selected: Option<usize>,
    },
    ModelReady {
        model: ModelSummary,
    },
    SceneUpdated {
        scene: ComposedScene,
    },
    StageFailed {
        stage: Stage,
        message: String,
    },
}

impl PipelineEvent {
    pub fn name(&self) -> &'static str {
        match self {
            PipelineEvent::StatusChanged { .. } => "status-changed",
            PipelineEvent::MasksUpdated { .. } => "masks-updated",
            PipelineEvent::ModelReady { .. } => "model-ready",
            PipelineEvent::SceneUpdated { .. } => "scene-updated",
            PipelineEvent::StageFailed { .. } => "stage-failed",
        }
    }
}
