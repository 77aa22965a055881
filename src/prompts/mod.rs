pub mod collector;

pub use collector::{PointPromptCollector, FOREGROUND_LABEL};
