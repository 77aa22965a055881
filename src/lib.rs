pub mod alignment;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod geometry;
pub mod models;
pub mod prompts;
pub mod scene;
pub mod segmentation;
pub mod services;
pub mod utils;

use std::path::Path;

use anyhow::{Context, Result};

pub use config::{PipelineSettings, SettingsStore};
pub use coordinator::{PipelineController, PipelineEvent, Stage};
pub use error::{PipelineError, PipelineResult};
pub use models::{ImagePoint, ImageSize, PipelineStatus, SessionSnapshot};
pub use scene::{ComposedScene, InMemoryResources};
pub use services::{HttpBackend, PipelineBackend};
pub use utils::init_logging;

/// A ready-to-use pipeline against the HTTP services, with its settings file.
pub struct AppState {
    pub controller: PipelineController<HttpBackend>,
    pub settings: SettingsStore,
    pub resources: InMemoryResources,
}

impl AppState {
    /// Persists a settings change and hands it to the running pipeline.
    pub async fn update_settings(
        &self,
        apply: impl FnOnce(&mut PipelineSettings),
    ) -> Result<ComposedScene> {
        let settings = self.settings.update(apply)?;
        Ok(self.controller.apply_settings(settings).await)
    }

    /// Re-reads the settings file after an external edit.
    pub async fn reload_settings(&self) -> Result<ComposedScene> {
        self.settings.reload()?;
        Ok(self.controller.apply_settings(self.settings.settings()).await)
    }
}

/// Initialises logging, loads `settings.json` from `data_dir` and builds the
/// pipeline on top of it.
pub fn setup(data_dir: &Path) -> Result<AppState> {
    init_logging();
    log::info!("lift3d starting up...");

    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("Failed to create {}", data_dir.display()))?;

    let settings = SettingsStore::new(data_dir.join("settings.json"))?;
    let initial = settings.settings();
    let backend = HttpBackend::new(&initial.endpoints)?;
    let resources = InMemoryResources::new();
    let controller = PipelineController::new(backend, Box::new(resources.clone()), initial);

    Ok(AppState {
        controller,
        settings,
        resources,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_setup_and_update_settings() {
        let dir = std::env::temp_dir().join(format!("lift3d-setup-{}", uuid::Uuid::new_v4()));
        let app = setup(&dir).unwrap();

        app.update_settings(|settings| settings.placement.flip_x = false)
            .await
            .unwrap();
        assert!(!app.controller.settings().await.placement.flip_x);
        assert!(dir.join("settings.json").exists());

        app.reload_settings().await.unwrap();
        assert!(!app.controller.settings().await.placement.flip_x);

        let _ = std::fs::remove_dir_all(dir);
    }
}
