use reqwest::{header::CONTENT_TYPE, StatusCode};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::{PipelineError, PipelineResult, Service};
use crate::{log_debug, log_info, log_warn};

use super::encoding::png_data_url;

const ENABLE_LOGS: bool = true;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReconstructionRequest {
    /// Carved image as a `data:image/png;base64,` URL.
    pub image: String,
}

impl ReconstructionRequest {
    pub fn from_png(png: &[u8]) -> Self {
        Self {
            image: png_data_url(png),
        }
    }
}

/// What the reconstruction service sends back instead of a model when it fails.
#[derive(Debug, Deserialize)]
pub struct ReconstructionErrorBody {
    pub error: String,
    #[serde(default)]
    pub details: Option<serde_json::Value>,
}

impl ReconstructionErrorBody {
    fn message(&self) -> String {
        match &self.details {
            None | Some(serde_json::Value::Null) => self.error.clone(),
            Some(serde_json::Value::String(details)) => format!("{}: {}", self.error, details),
            Some(details) => format!("{}: {}", self.error, details),
        }
    }
}

/// Classifies a finished reconstruction response. A JSON body is always an
/// error report, whatever the status code says.
pub fn interpret_reconstruction_response(
    status: StatusCode,
    content_type: Option<&str>,
    body: &[u8],
) -> PipelineResult<Vec<u8>> {
    if content_type.is_some_and(|value| value.contains("application/json")) {
        let report: ReconstructionErrorBody = serde_json::from_slice(body)
            .map_err(|err| PipelineError::decode("reconstruction error body", err))?;
        return Err(PipelineError::network(Service::Reconstruction, report.message()));
    }

    if !status.is_success() {
        return Err(PipelineError::network(
            Service::Reconstruction,
            format!("HTTP {status}"),
        ));
    }

    if body.is_empty() {
        return Err(PipelineError::decode("model", "empty payload"));
    }

    Ok(body.to_vec())
}

#[derive(Debug, Clone)]
pub struct ReconstructionClient {
    http: reqwest::Client,
    url: String,
}

impl ReconstructionClient {
    pub fn new(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }

    /// Returns the binary glTF payload. Resolves to `Cancelled` as soon as
    /// `token` fires, dropping the in-flight HTTP request.
    pub async fn reconstruct(
        &self,
        request: &ReconstructionRequest,
        token: CancellationToken,
    ) -> PipelineResult<Vec<u8>> {
        if token.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        tokio::select! {
            biased;
            _ = token.cancelled() => {
                log_debug!("reconstruction request cancelled");
                Err(PipelineError::Cancelled)
            }
            result = self.send(request) => result,
        }
    }

    async fn send(&self, request: &ReconstructionRequest) -> PipelineResult<Vec<u8>> {
        log_info!("requesting reconstruction from {}", self.url);

        let response = self
            .http
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|err| PipelineError::network(Service::Reconstruction, err))?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);

        let body = response
            .bytes()
            .await
            .map_err(|err| PipelineError::network(Service::Reconstruction, err))?;

        let result = interpret_reconstruction_response(status, content_type.as_deref(), &body);
        match &result {
            Ok(payload) => log_info!("reconstruction returned {} bytes", payload.len()),
            Err(err) => log_warn!("reconstruction rejected: {}", err),
        }
        result
    }
}
