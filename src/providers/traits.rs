use anyhow::{Context, Result};
use async_trait::async_trait;
use image::{DynamicImage, GenericImageView, ImageOutputFormat};
use serde::{Deserialize, Serialize};
use std::io::Cursor;

/// One scored label produced by an image-classification model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub score: f32,
}

impl LabelScore {
    pub fn new(label: impl Into<String>, score: f32) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

/// A decoded upload plus the encoded body sent to remote models. Built once
/// per request so every model call reuses the same bytes.
#[derive(Debug, Clone)]
pub struct ModelInput {
    pub image: DynamicImage,
    pub bytes: Vec<u8>,
    pub mime: &'static str,
}

impl ModelInput {
    pub fn new(image: DynamicImage, bytes: Vec<u8>, mime: &'static str) -> Self {
        Self { image, bytes, mime }
    }

    /// PNG-encodes the image. CPU bound; call it off the async runtime.
    pub fn encode_png(image: DynamicImage) -> Result<Self> {
        let mut buffer = Cursor::new(Vec::new());
        image
            .write_to(&mut buffer, ImageOutputFormat::Png)
            .context("Failed to encode image for inference")?;
        Ok(Self::new(image, buffer.into_inner(), "image/png"))
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

/// A pre-trained image classifier used as a black box. Implementations are
/// constructed once at startup and shared read-only across requests.
#[async_trait]
pub trait LabelModel: Send + Sync {
    /// Returns labels ordered by descending score.
    async fn classify(&self, input: &ModelInput) -> Result<Vec<LabelScore>>;

    fn model_name(&self) -> &str;
}
