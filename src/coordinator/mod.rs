//! Sequencing of the interactive loop: debounced segmentation, a single
//! cancellable reconstruction, and the session state both of them feed.

pub mod controller;
pub mod debounce;
pub mod events;
pub mod state;


pub use controller::PipelineController;
pub use debounce::CoalescingTimer;
pub use events::{PipelineEvent, Stage};
pub use state::{MaskSet, ReconstructedModel, SessionState};
