use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use image::RgbaImage;
use serde::Serialize;
use uuid::Uuid;

/// Opaque id of a GPU-side texture or model owned by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ResourceHandle(Uuid);

impl ResourceHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ResourceHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Renderer-facing allocation seam. Every handle returned here is released
/// exactly once by the composer when the image or model it backs is replaced.
pub trait SceneResources: Send {
    fn upload_texture(&mut self, label: &str, image: &RgbaImage) -> ResourceHandle;
    fn upload_model(&mut self, label: &str, payload: &[u8]) -> ResourceHandle;
    fn release(&mut self, handle: ResourceHandle);
}

#[derive(Debug, Clone)]
pub enum SceneResource {
    Texture {
        label: String,
        image: Arc<RgbaImage>,
    },
    Model {
        label: String,
        payload: Arc<Vec<u8>>,
    },
}

impl SceneResource {
    pub fn label(&self) -> &str {
        match self {
            SceneResource::Texture { label, .. } | SceneResource::Model { label, .. } => label,
        }
    }
}

/// Keeps uploaded resources in memory so a host can pull them by handle.
/// Clones share the same table.
#[derive(Debug, Clone, Default)]
pub struct InMemoryResources {
    table: Arc<Mutex<HashMap<ResourceHandle, SceneResource>>>,
}

impl InMemoryResources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, handle: ResourceHandle) -> Option<SceneResource> {
        self.lock().get(&handle).cloned()
    }

    pub fn live_count(&self) -> usize {
        self.lock().len()
    }

    pub fn live_labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self
            .lock()
            .values()
            .map(|resource| resource.label().to_string())
            .collect();
        labels.sort();
        labels
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ResourceHandle, SceneResource>> {
        self.table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SceneResources for InMemoryResources {
    fn upload_texture(&mut self, label: &str, image: &RgbaImage) -> ResourceHandle {
        let handle = ResourceHandle::new();
        self.lock().insert(
            handle,
            SceneResource::Texture {
                label: label.to_string(),
                image: Arc::new(image.clone()),
            },
        );
        handle
    }

    fn upload_model(&mut self, label: &str, payload: &[u8]) -> ResourceHandle {
        let handle = ResourceHandle::new();
        self.lock().insert(
            handle,
            SceneResource::Model {
                label: label.to_string(),
                payload: Arc::new(payload.to_vec()),
            },
        );
        handle
    }

    fn release(&mut self, handle: ResourceHandle) {
        if self.lock().remove(&handle).is_none() {
            log::warn!("release of unknown scene resource {:?}", handle);
        }
    }
}
