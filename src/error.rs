use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::models::ImageSize;

/// External service a request was addressed to.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Service {
    ImageGeneration,
    Segmentation,
    Reconstruction,
}

impl Service {
    pub fn as_str(&self) -> &'static str {
        match self {
            Service::ImageGeneration => "image generation",
            Service::Segmentation => "segmentation",
            Service::Reconstruction => "reconstruction",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned by bounds computation when a mask has no set cells.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("mask has no set pixels")]
pub struct EmptyMaskError;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{service} request failed: {message}")]
    Network { service: Service, message: String },

    #[error("request was cancelled")]
    Cancelled,

    #[error("failed to decode {what}: {message}")]
    Decode { what: &'static str, message: String },

    #[error(transparent)]
    EmptyMask(#[from] EmptyMaskError),

    #[error("mask is {actual} but image is {expected}")]
    DimensionMismatch {
        expected: ImageSize,
        actual: ImageSize,
    },
}

impl PipelineError {
    pub fn network(service: Service, message: impl fmt::Display) -> Self {
        PipelineError::Network {
            service,
            message: message.to_string(),
        }
    }

    pub fn decode(what: &'static str, message: impl fmt::Display) -> Self {
        PipelineError::Decode {
            what,
            message: message.to_string(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, PipelineError::Cancelled)
    }
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_error_names_service() {
        let err = PipelineError::network(Service::Reconstruction, "HTTP 500");
        assert_eq!(err.to_string(), "reconstruction request failed: HTTP 500");
    }

    #[test]
    fn test_empty_mask_converts() {
        let err: PipelineError = EmptyMaskError.into();
        assert!(matches!(err, PipelineError::EmptyMask(_)));
        assert!(!err.is_cancelled());
        assert!(PipelineError::Cancelled.is_cancelled());
    }
}
