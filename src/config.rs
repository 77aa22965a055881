use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Duration,
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServiceEndpoints {
    pub generation_url: String,
    pub segmentation_url: String,
    pub reconstruction_url: String,
    /// Applies to every outbound request. Reconstruction can take a while.
    pub request_timeout_secs: u64,
}

impl Default for ServiceEndpoints {
    fn default() -> Self {
        Self {
            generation_url: "http://localhost:8188/generate".into(),
            segmentation_url: "http://localhost:5000/segment".into(),
            reconstruction_url: "http://localhost:5000/generate-model".into(),
            request_timeout_secs: 300,
        }
    }
}

impl ServiceEndpoints {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Tunables forwarded with every segmentation request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SegmentationParams {
    /// Masks scoring below this are dropped by the service
    pub min_score: f32,

    /// Upper bound on masks returned
    pub max_masks: u32,

    /// Overlap above which the weaker of two masks is suppressed
    pub iou_threshold: f32,

    /// Masks covering less than this fraction of the image are dropped
    pub min_area_ratio: f32,

    /// Re-run area and overlap filtering on the client as well.
    pub filter_locally: bool,
}

impl Default for SegmentationParams {
    fn default() -> Self {
        Self {
            min_score: 0.9,
            max_masks: 20,
            iou_threshold: 0.5,
            min_area_ratio: 0.02,
            filter_locally: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlacementSettings {
    pub flip_x: bool,
    /// Vertical offset of the projection plane, in normalised scene units.
    pub vertical_adjustment: f32,
    /// Euler angles (radians) applied to the placed model.
    pub rotation: [f32; 3],
}

impl Default for PlacementSettings {
    fn default() -> Self {
        Self {
            flip_x: true,
            vertical_adjustment: 0.0,
            rotation: [0.0; 3],
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct DebugFlags {
    pub show_wireframe: bool,
    pub show_texture_preview: bool,
    pub show_axes: bool,
    pub show_projection_plane: bool,
}

impl DebugFlags {
    pub fn all() -> Self {
        Self {
            show_wireframe: true,
            show_texture_preview: true,
            show_axes: true,
            show_projection_plane: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineSettings {
    pub endpoints: ServiceEndpoints,
    pub debounce_ms: u64,
    pub segmentation: SegmentationParams,
    /// Random prompt points seeded after a new base image loads. Zero disables.
    pub auto_prompt_points: usize,
    pub placement: PlacementSettings,
    pub debug: DebugFlags,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        let debug_mode = std::env::var("LIFT3D_DEBUG")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Self {
            endpoints: ServiceEndpoints::default(),
            debounce_ms: 500,
            segmentation: SegmentationParams::default(),
            auto_prompt_points: 0,
            placement: PlacementSettings::default(),
            debug: if debug_mode {
                DebugFlags::all()
            } else {
                DebugFlags::default()
            },
        }
    }
}

impl PipelineSettings {
    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// JSON-file backed settings. A missing or unreadable file yields defaults.
pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<PipelineSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                log::warn!(
                    "Ignoring malformed settings at {}: {err}",
                    path.display()
                );
                PipelineSettings::default()
            })
        } else {
            PipelineSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn settings(&self) -> PipelineSettings {
        self.read().clone()
    }

    pub fn update(&self, apply: impl FnOnce(&mut PipelineSettings)) -> Result<PipelineSettings> {
        let mut guard = self.write();
        apply(&mut guard);
        self.persist(&guard)?;
        Ok(guard.clone())
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)?;
        let data: PipelineSettings = serde_json::from_str(&contents)?;
        *self.write() = data;
        Ok(())
    }

    fn persist(&self, data: &PipelineSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    fn read(&self) -> RwLockReadGuard<'_, PipelineSettings> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, PipelineSettings> {
        self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("lift3d-{}-{name}.json", uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_defaults_match_service_contract() {
        let params = SegmentationParams::default();
        assert_eq!(params.min_score, 0.9);
        assert_eq!(params.max_masks, 20);
        assert_eq!(params.iou_threshold, 0.5);
        assert_eq!(params.min_area_ratio, 0.02);

        let settings = PipelineSettings::default();
        assert_eq!(settings.debounce_window(), Duration::from_millis(500));
        assert!(settings.placement.flip_x);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let store = SettingsStore::new(temp_path("missing")).unwrap();
        assert_eq!(store.settings().debounce_ms, 500);
    }

    #[test]
    fn test_update_persists_and_reloads() {
        let path = temp_path("persist");
        let store = SettingsStore::new(path.clone()).unwrap();
        store
            .update(|settings| {
                settings.debounce_ms = 250;
                settings.placement.vertical_adjustment = 0.1;
            })
            .unwrap();

        let reopened = SettingsStore::new(path.clone()).unwrap();
        let settings = reopened.settings();
        assert_eq!(settings.debounce_ms, 250);
        assert_eq!(settings.placement.vertical_adjustment, 0.1);

        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let path = temp_path("partial");
        fs::write(&path, r#"{"debounce_ms": 120}"#).unwrap();
        let store = SettingsStore::new(path.clone()).unwrap();
        let settings = store.settings();
        assert_eq!(settings.debounce_ms, 120);
        assert_eq!(settings.segmentation.max_masks, 20);
        let _ = fs::remove_file(path);
    }
}
