pub mod encoding;
pub mod generation;
pub mod reconstruction;
pub mod segmentation;

use std::future::Future;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use crate::config::ServiceEndpoints;
use crate::error::PipelineResult;
use crate::models::Mask;

pub use encoding::{encode_png, png_data_url, to_base64};
pub use generation::{final_image_url, GenerationClient};
pub use reconstruction::{
    interpret_reconstruction_response, ReconstructionClient, ReconstructionErrorBody,
    ReconstructionRequest,
};
pub use segmentation::{
    parse_segmentation_response, SegmentationClient, SegmentationRequest, SegmentationResponse,
};

/// The three external services the pipeline drives.
///
/// `reconstruct` must resolve to `PipelineError::Cancelled` once `token`
/// fires; the other calls are never cancelled, only superseded.
pub trait PipelineBackend: Send + Sync + 'static {
    fn generate_image(
        &self,
        prompt: String,
    ) -> impl Future<Output = PipelineResult<Vec<String>>> + Send;

    fn fetch_image(&self, url: String) -> impl Future<Output = PipelineResult<Vec<u8>>> + Send;

    fn segment(
        &self,
        request: SegmentationRequest,
    ) -> impl Future<Output = PipelineResult<Vec<Mask>>> + Send;

    fn reconstruct(
        &self,
        request: ReconstructionRequest,
        token: CancellationToken,
    ) -> impl Future<Output = PipelineResult<Vec<u8>>> + Send;
}

/// HTTP implementation sharing one connection pool across all services.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    generation: GenerationClient,
    segmentation: SegmentationClient,
    reconstruction: ReconstructionClient,
}

impl HttpBackend {
    pub fn new(endpoints: &ServiceEndpoints) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(endpoints.request_timeout())
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            generation: GenerationClient::new(http.clone(), &endpoints.generation_url),
            segmentation: SegmentationClient::new(http.clone(), &endpoints.segmentation_url),
            reconstruction: ReconstructionClient::new(http, &endpoints.reconstruction_url),
        })
    }
}

impl PipelineBackend for HttpBackend {
    async fn generate_image(&self, prompt: String) -> PipelineResult<Vec<String>> {
        self.generation.generate(&prompt).await
    }

    async fn fetch_image(&self, url: String) -> PipelineResult<Vec<u8>> {
        self.generation.fetch_image(&url).await
    }

    async fn segment(&self, request: SegmentationRequest) -> PipelineResult<Vec<Mask>> {
        self.segmentation.segment(&request).await
    }

    async fn reconstruct(
        &self,
        request: ReconstructionRequest,
        token: CancellationToken,
    ) -> PipelineResult<Vec<u8>> {
        self.reconstruction.reconstruct(&request, token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_builds_from_default_endpoints() {
        assert!(HttpBackend::new(&ServiceEndpoints::default()).is_ok());
    }
}
