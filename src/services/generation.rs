use serde::Serialize;

use crate::error::{PipelineError, PipelineResult, Service};
use crate::{log_debug, log_info};

const ENABLE_LOGS: bool = true;

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    prompt: &'a str,
}

/// Text-to-image service. Responds with the URLs of every image it produced,
/// in generation order.
#[derive(Debug, Clone)]
pub struct GenerationClient {
    http: reqwest::Client,
    url: String,
}

impl GenerationClient {
    pub fn new(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }

    pub async fn generate(&self, prompt: &str) -> PipelineResult<Vec<String>> {
        log_info!("requesting image for prompt {:?}", prompt);

        let response = self
            .http
            .post(&self.url)
            .json(&GenerateRequest { prompt })
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|err| PipelineError::network(Service::ImageGeneration, err))?;

        let body = response
            .bytes()
            .await
            .map_err(|err| PipelineError::network(Service::ImageGeneration, err))?;

        let urls: Vec<String> = serde_json::from_slice(&body)
            .map_err(|err| PipelineError::decode("generation response", err))?;
        log_debug!("generation returned {} urls", urls.len());
        Ok(urls)
    }

    pub async fn fetch_image(&self, url: &str) -> PipelineResult<Vec<u8>> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|err| PipelineError::network(Service::ImageGeneration, err))?;

        let body = response
            .bytes()
            .await
            .map_err(|err| PipelineError::network(Service::ImageGeneration, err))?;
        Ok(body.to_vec())
    }
}

/// The last URL is the finished image; earlier ones are intermediates.
pub fn final_image_url(mut urls: Vec<String>) -> PipelineResult<String> {
    urls.pop()
        .ok_or_else(|| PipelineError::decode("generation response", "no image urls"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_url_wins() {
        let urls = vec!["a.png".to_string(), "b.png".to_string(), "c.png".to_string()];
        assert_eq!(final_image_url(urls).unwrap(), "c.png");
    }

    #[test]
    fn test_empty_url_list_is_a_decode_error() {
        let err = final_image_url(Vec::new()).unwrap_err();
        assert!(matches!(err, PipelineError::Decode { .. }));
    }
}
