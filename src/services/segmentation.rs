use serde::{Deserialize, Serialize};

use crate::config::SegmentationParams;
use crate::error::{PipelineError, PipelineResult, Service};
use crate::models::Mask;
use crate::prompts::PointPromptCollector;
use crate::{log_debug, log_info};

use super::encoding::to_base64;

const ENABLE_LOGS: bool = true;

/// Body of a point-prompted segmentation call.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SegmentationRequest {
    /// Base image bytes as bare base64, no data-URL prefix.
    pub image: String,
    pub point_coords: Vec<[f32; 2]>,
    pub point_labels: Vec<u8>,
    pub min_score: f32,
    pub max_masks: u32,
    pub iou_threshold: f32,
    #[serde(rename = "minAreaRatio")]
    pub min_area_ratio: f32,
}

impl SegmentationRequest {
    /// `None` when there are no points; an empty prompt is never sent.
    pub fn new(
        image_bytes: &[u8],
        prompts: &PointPromptCollector,
        params: &SegmentationParams,
    ) -> Option<Self> {
        if prompts.is_empty() {
            return None;
        }
        let (point_coords, point_labels) = prompts.to_prompt();

        Some(Self {
            image: to_base64(image_bytes),
            point_coords,
            point_labels,
            min_score: params.min_score,
            max_masks: params.max_masks,
            iou_threshold: params.iou_threshold,
            min_area_ratio: params.min_area_ratio,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct SegmentationResponse {
    pub masks: Vec<Mask>,
}

pub fn parse_segmentation_response(body: &[u8]) -> PipelineResult<Vec<Mask>> {
    let response: SegmentationResponse = serde_json::from_slice(body)
        .map_err(|err| PipelineError::decode("segmentation response", err))?;
    Ok(response.masks)
}

#[derive(Debug, Clone)]
pub struct SegmentationClient {
    http: reqwest::Client,
    url: String,
}

impl SegmentationClient {
    pub fn new(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }

    pub async fn segment(&self, request: &SegmentationRequest) -> PipelineResult<Vec<Mask>> {
        log_info!(
            "segmenting with {} point(s) against {}",
            request.point_coords.len(),
            self.url
        );

        let response = self
            .http
            .post(&self.url)
            .json(request)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|err| PipelineError::network(Service::Segmentation, err))?;

        let body = response
            .bytes()
            .await
            .map_err(|err| PipelineError::network(Service::Segmentation, err))?;

        let masks = parse_segmentation_response(&body)?;
        log_debug!("segmentation returned {} mask(s)", masks.len());
        Ok(masks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ImagePoint;

    #[test]
    fn test_request_wire_shape() {
        let mut prompts = PointPromptCollector::new();
        prompts.add_point(ImagePoint::new(10.0, 20.0));
        prompts.add_point(ImagePoint::new(30.0, 40.0));

        let request =
            SegmentationRequest::new(&[1, 2, 3], &prompts, &SegmentationParams::default()).unwrap();
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["image"], "AQID");
        assert_eq!(json["point_coords"], serde_json::json!([[10.0, 20.0], [30.0, 40.0]]));
        assert_eq!(json["point_labels"], serde_json::json!([1, 1]));
        assert_eq!(json["max_masks"], 20);
        assert!(json.get("minAreaRatio").is_some());
        assert!(json.get("min_area_ratio").is_none());
    }

    #[test]
    fn test_no_points_no_request() {
        let prompts = PointPromptCollector::new();
        assert!(SegmentationRequest::new(&[1], &prompts, &SegmentationParams::default()).is_none());
    }

    #[test]
    fn test_response_parses_masks() {
        let body = br#"{"masks": [
            {"float_mask": [[0.9, 0.1]], "binary_mask": [[1, 0]], "score": 0.95, "area": 1},
            {"binary_mask": [[0, 1]], "score": 0.7, "area": 1}
        ]}"#;
        let masks = parse_segmentation_response(body).unwrap();
        assert_eq!(masks.len(), 2);
        assert_eq!(masks[0].score(), 0.95);
        assert!(masks[1].is_set(1, 0));
    }

    #[test]
    fn test_ragged_mask_is_a_decode_error() {
        let body = br#"{"masks": [{"binary_mask": [[1, 0], [1]], "score": 0.9, "area": 2}]}"#;
        let err = parse_segmentation_response(body).unwrap_err();
        assert!(matches!(err, PipelineError::Decode { .. }));
    }
}
