use axum::http::StatusCode;
use image::{ColorType, DynamicImage, ImageFormat};
use log::{error, info, warn};
use std::sync::Arc;
use thiserror::Error;

use crate::database::HistoryStore;
use crate::food::analysis::classifier::{ClassificationError, FoodClassifier, RefinementStatus};
use crate::food::analysis::filter::{FilterVerdict, FoodFilter};
use crate::food::api::traits::{LookupStatus, NutritionSource};
use crate::food::models::{ScanRecord, ScanResponse};
use crate::providers::traits::ModelInput;

/// Request failures of the scan pipeline. Lookup and storage problems never
/// show up here; they are reported through [`ScanOutcome`] instead.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("File must be an image")]
    InvalidInputType,
    #[error("Invalid image file")]
    InvalidImage,
    #[error("{0}")]
    NotFoodImage(String),
    #[error("Classification models are not available")]
    ClassificationUnavailable,
    #[error("Error in food classification")]
    ClassificationFailure(#[source] ClassificationError),
}

impl ScanError {
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInputType | Self::InvalidImage | Self::NotFoodImage(_) => StatusCode::BAD_REQUEST,
            Self::ClassificationUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::ClassificationFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PersistStatus {
    Stored,
    /// No history store is configured.
    Disabled,
    Failed(String),
}

/// A successful scan plus how each non-fatal step went.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub record: ScanRecord,
    pub filter: FilterVerdict,
    pub refinement: RefinementStatus,
    pub nutrition: LookupStatus,
    pub persistence: PersistStatus,
}

impl ScanOutcome {
    pub fn response(&self) -> ScanResponse {
        ScanResponse::from(&self.record)
    }
}

/// The scan request pipeline. Every collaborator is injected so tests can
/// substitute fakes; all of them are shared read-only across requests.
#[derive(Clone, Default)]
pub struct ScanPipeline {
    filter: FoodFilter,
    classifier: Option<FoodClassifier>,
    nutrition: Option<Arc<dyn NutritionSource>>,
    history: Option<Arc<dyn HistoryStore>>,
}

impl ScanPipeline {
    pub fn new(
        filter: FoodFilter,
        classifier: Option<FoodClassifier>,
        nutrition: Option<Arc<dyn NutritionSource>>,
        history: Option<Arc<dyn HistoryStore>>,
    ) -> Self {
        Self {
            filter,
            classifier,
            nutrition,
            history,
        }
    }

    pub fn history(&self) -> Option<&Arc<dyn HistoryStore>> {
        self.history.as_ref()
    }

    pub async fn scan(&self, content_type: Option<&str>, bytes: Vec<u8>) -> Result<ScanOutcome, ScanError> {
        check_content_type(content_type)?;
        let image = decode_image(bytes).await?;

        info!("Validating if image contains food");
        let verdict = self.filter.check(&image).await;
        if let FilterVerdict::Rejected(reason) = verdict {
            warn!("Food validation failed: {}", reason);
            return Err(ScanError::NotFoodImage(reason));
        }

        let classifier = self.classifier.as_ref().ok_or_else(|| {
            error!("Scan requested but no classification model is loaded");
            ScanError::ClassificationUnavailable
        })?;

        let result = classifier.classify(&image).await.map_err(|e| {
            error!("Error in food classification: {}", e);
            ScanError::ClassificationFailure(e)
        })?;
        let (result, refinement) = classifier.refine(&image, result).await;

        let nutrition = match &self.nutrition {
            Some(source) => source.find(&result.label).await,
            None => LookupStatus::Unavailable,
        };
        let record = ScanRecord::new(result.label, nutrition.clone().into_nutrition(), result.confidence);

        let persistence = self.persist(&record).await;

        Ok(ScanOutcome {
            record,
            filter: verdict,
            refinement,
            nutrition,
            persistence,
        })
    }

    async fn persist(&self, record: &ScanRecord) -> PersistStatus {
        let store = match &self.history {
            Some(store) => store,
            None => return PersistStatus::Disabled,
        };

        match store.append(record).await {
            Ok(()) => {
                info!("Successfully stored scan record {}", record.id);
                PersistStatus::Stored
            }
            Err(e) => {
                error!("Error storing scan record: {}", e);
                PersistStatus::Failed(e.to_string())
            }
        }
    }
}

pub fn check_content_type(content_type: Option<&str>) -> Result<(), ScanError> {
    match content_type {
        Some(ct) if ct.trim().to_ascii_lowercase().starts_with("image/") => Ok(()),
        other => {
            warn!("Rejected upload with content type {:?}", other);
            Err(ScanError::InvalidInputType)
        }
    }
}

/// Decodes and prepares the model body off the async runtime. Pixels are
/// normalized to 8-bit RGB; PNG and JPEG uploads are forwarded to the models
/// as sent, anything else is re-encoded once as PNG.
pub async fn decode_image(bytes: Vec<u8>) -> Result<ModelInput, ScanError> {
    let decoded = tokio::task::spawn_blocking(move || prepare_input(bytes)).await;

    match decoded {
        Ok(Ok(input)) => {
            info!("Successfully opened image, size: {:?}", input.dimensions());
            Ok(input)
        }
        Ok(Err(e)) => {
            error!("Error opening image: {:#}", e);
            Err(ScanError::InvalidImage)
        }
        Err(e) => {
            error!("Image decoding task failed: {}", e);
            Err(ScanError::InvalidImage)
        }
    }
}

fn prepare_input(bytes: Vec<u8>) -> anyhow::Result<ModelInput> {
    let format = image::guess_format(&bytes)?;
    let image = image::load_from_memory_with_format(&bytes, format)?;
    let image = match image.color() {
        ColorType::Rgb8 => image,
        _ => DynamicImage::ImageRgb8(image.to_rgb8()),
    };

    match format {
        ImageFormat::Png => Ok(ModelInput::new(image, bytes, "image/png")),
        ImageFormat::Jpeg => Ok(ModelInput::new(image, bytes, "image/jpeg")),
        _ => ModelInput::encode_png(image),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageOutputFormat, LumaA, RgbImage};
    use std::io::Cursor;

    fn encode_png(image: DynamicImage) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        image.write_to(&mut buffer, ImageOutputFormat::Png).unwrap();
        buffer.into_inner()
    }

    #[test]
    fn test_content_type_must_be_image() {
        assert!(check_content_type(Some("image/jpeg")).is_ok());
        assert!(check_content_type(Some("IMAGE/PNG")).is_ok());
        assert!(matches!(check_content_type(Some("text/plain")), Err(ScanError::InvalidInputType)));
        assert!(matches!(check_content_type(None), Err(ScanError::InvalidInputType)));
    }

    #[tokio::test]
    async fn test_decode_normalizes_to_rgb() {
        let gray = image::ImageBuffer::from_pixel(64, 64, LumaA([120u8, 255u8]));
        let upload = encode_png(DynamicImage::ImageLumaA8(gray));
        let decoded = decode_image(upload.clone()).await.unwrap();
        assert_eq!(decoded.image.color(), ColorType::Rgb8);
        assert_eq!(decoded.dimensions(), (64, 64));
        assert_eq!(decoded.bytes, upload);
        assert_eq!(decoded.mime, "image/png");
    }

    #[tokio::test]
    async fn test_decode_forwards_jpeg_upload() {
        let mut buffer = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(RgbImage::new(80, 60))
            .write_to(&mut buffer, ImageOutputFormat::Jpeg(80))
            .unwrap();
        let upload = buffer.into_inner();

        let decoded = decode_image(upload.clone()).await.unwrap();

        assert_eq!(decoded.mime, "image/jpeg");
        assert_eq!(decoded.bytes, upload);
    }

    #[tokio::test]
    async fn test_decode_reencodes_other_formats_once_as_png() {
        let mut buffer = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(RgbImage::new(80, 60))
            .write_to(&mut buffer, ImageOutputFormat::Bmp)
            .unwrap();

        let decoded = decode_image(buffer.into_inner()).await.unwrap();

        assert_eq!(decoded.mime, "image/png");
        assert_eq!(image::guess_format(&decoded.bytes).unwrap(), ImageFormat::Png);
        assert_eq!(decoded.dimensions(), (80, 60));
    }

    #[tokio::test]
    async fn test_decode_rejects_garbage() {
        let result = decode_image(b"definitely not a png".to_vec()).await;
        assert!(matches!(result, Err(ScanError::InvalidImage)));
    }

    #[tokio::test]
    async fn test_missing_classifier_is_unavailable() {
        let pipeline = ScanPipeline::default();
        let png = encode_png(DynamicImage::ImageRgb8(RgbImage::new(120, 120)));
        let err = pipeline.scan(Some("image/png"), png).await.unwrap_err();
        assert!(matches!(err, ScanError::ClassificationUnavailable));
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(ScanError::InvalidInputType.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ScanError::NotFoodImage("nope".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ScanError::ClassificationFailure(ClassificationError::Empty("food".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
