use std::sync::Arc;

use image::RgbaImage;
use serde::Serialize;

use crate::alignment::{ProjectionPlane, SpatialTransform, VirtualCamera, PROJECTION_RAY_LENGTH};
use crate::config::DebugFlags;
use crate::geometry::OverlayMesh;

use super::resources::{ResourceHandle, SceneResources};

pub const BACKGROUND_OPACITY: f32 = 0.5;
pub const OVERLAY_COLOR: [f32; 3] = [1.0, 0.0, 0.0];
pub const OVERLAY_OPACITY: f32 = 0.3;
pub const AXES_SIZE: f32 = 5.0;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BackgroundPlane {
    pub texture: ResourceHandle,
    pub width: f32,
    pub height: f32,
    pub opacity: f32,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MaskOverlay {
    pub mesh: Arc<OverlayMesh>,
    pub color: [f32; 3],
    pub opacity: f32,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlacedModel {
    pub model: ResourceHandle,
    pub texture: ResourceHandle,
    pub transform: SpatialTransform,
    pub wireframe: bool,
}

/// Axes drawn in the model's local frame.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct AxesIndicator {
    pub size: f32,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DebugVisuals {
    pub axes: Option<AxesIndicator>,
    pub texture_preview: Option<ResourceHandle>,
    pub projection_plane: Option<ProjectionPlane>,
}

/// One frame's worth of renderable state for the host.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComposedScene {
    pub camera: VirtualCamera,
    pub background: Option<BackgroundPlane>,
    pub overlay: Option<MaskOverlay>,
    pub model: Option<PlacedModel>,
    pub debug: DebugVisuals,
}

#[derive(Debug, Clone, Copy)]
struct ModelSlot {
    model: ResourceHandle,
    texture: ResourceHandle,
}

/// Owns the renderer resources of the displayed image and model and builds
/// [`ComposedScene`]s from them.
///
/// Replacing the base image or the model releases the superseded handles
/// before new ones are uploaded, so resource use stays flat across sessions.
pub struct SceneComposer {
    resources: Box<dyn SceneResources>,
    camera: VirtualCamera,
    base_texture: Option<ResourceHandle>,
    overlay: Option<Arc<OverlayMesh>>,
    model: Option<ModelSlot>,
}

impl SceneComposer {
    pub fn new(resources: Box<dyn SceneResources>) -> Self {
        Self {
            resources,
            camera: VirtualCamera::default(),
            base_texture: None,
            overlay: None,
            model: None,
        }
    }

    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.camera = VirtualCamera::for_viewport(width, height);
    }

    /// Starts over for a new base image: everything from the previous image
    /// is released.
    pub fn set_base_image(&mut self, image: &RgbaImage) {
        self.clear();
        self.base_texture = Some(self.resources.upload_texture("base-image", image));
    }

    /// Takes a mesh already built by [`overlay_mesh`](crate::geometry::overlay_mesh).
    pub fn set_overlay(&mut self, mesh: Option<Arc<OverlayMesh>>) {
        self.overlay = mesh;
    }

    pub fn set_model(&mut self, payload: &[u8], texture: &RgbaImage) {
        self.clear_model();
        let texture = self.resources.upload_texture("model-texture", texture);
        let model = self.resources.upload_model("model", payload);
        self.model = Some(ModelSlot { model, texture });
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    pub fn clear_model(&mut self) {
        if let Some(slot) = self.model.take() {
            self.resources.release(slot.model);
            self.resources.release(slot.texture);
        }
    }

    pub fn clear(&mut self) {
        self.clear_model();
        self.overlay = None;
        if let Some(texture) = self.base_texture.take() {
            self.resources.release(texture);
        }
    }

    /// Debug flags only add visuals; they never change the background,
    /// overlay or model placement.
    pub fn compose(&self, transform: Option<&SpatialTransform>, debug: DebugFlags) -> ComposedScene {
        let background = self.base_texture.map(|texture| BackgroundPlane {
            texture,
            width: 2.0,
            height: 2.0,
            opacity: BACKGROUND_OPACITY,
        });

        let overlay = self.overlay.as_ref().map(|mesh| MaskOverlay {
            mesh: Arc::clone(mesh),
            color: OVERLAY_COLOR,
            opacity: OVERLAY_OPACITY,
        });

        let placed = match (self.model, transform) {
            (Some(slot), Some(transform)) => Some((slot, *transform)),
            _ => None,
        };

        let model = placed.map(|(slot, transform)| PlacedModel {
            model: slot.model,
            texture: slot.texture,
            transform,
            wireframe: debug.show_wireframe,
        });

        let debug_visuals = match placed {
            Some((slot, transform)) => DebugVisuals {
                axes: debug.show_axes.then_some(AxesIndicator { size: AXES_SIZE }),
                texture_preview: debug.show_texture_preview.then_some(slot.texture),
                projection_plane: debug
                    .show_projection_plane
                    .then(|| ProjectionPlane::from_transform(&transform, PROJECTION_RAY_LENGTH)),
            },
            None => DebugVisuals::default(),
        };

        ComposedScene {
            camera: self.camera,
            background,
            overlay,
            model,
            debug: debug_visuals,
        }
    }
}

impl Drop for SceneComposer {
    fn drop(&mut self) {
        self.clear();
    }
}
