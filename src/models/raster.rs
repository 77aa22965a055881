use std::{fmt, sync::Arc};

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};

/// A clicked location in base-image pixel space.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ImagePoint {
    pub x: f32,
    pub y: f32,
}

impl ImagePoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn lies_within(&self, size: ImageSize) -> bool {
        self.x >= 0.0 && self.y >= 0.0 && self.x < size.width as f32 && self.y < size.height as f32
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// The generated image a session segments: encoded bytes for the wire and
/// decoded RGBA pixels for carving.
#[derive(Clone)]
pub struct BaseImage {
    bytes: Arc<Vec<u8>>,
    pixels: Arc<RgbaImage>,
    source_url: Option<String>,
}

impl BaseImage {
    pub fn decode(bytes: Vec<u8>, source_url: Option<String>) -> PipelineResult<Self> {
        let decoded = image::load_from_memory(&bytes)
            .map_err(|err| PipelineError::decode("base image", err))?;

        Ok(Self {
            bytes: Arc::new(bytes),
            pixels: Arc::new(decoded.to_rgba8()),
            source_url,
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn source_url(&self) -> Option<&str> {
        self.source_url.as_deref()
    }

    pub fn size(&self) -> ImageSize {
        ImageSize::new(self.pixels.width(), self.pixels.height())
    }
}

impl fmt::Debug for BaseImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaseImage")
            .field("size", &self.size())
            .field("encoded_bytes", &self.bytes.len())
            .field("source_url", &self.source_url)
            .finish()
    }
}
