pub mod composer;
pub mod resources;

pub use composer::{
    AxesIndicator, BackgroundPlane, ComposedScene, DebugVisuals, MaskOverlay, PlacedModel,
    SceneComposer,
};
pub use resources::{InMemoryResources, ResourceHandle, SceneResource, SceneResources};
