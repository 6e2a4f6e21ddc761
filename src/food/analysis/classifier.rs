use log::{error, info};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::providers::traits::{LabelModel, ModelInput};

/// Below this primary confidence the category model is consulted.
pub const REFINE_THRESHOLD: f32 = 0.7;

#[derive(Error, Debug)]
pub enum ClassificationError {
    #[error("Model {model} failed: {source}")]
    Model {
        model: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("Model {0} returned no labels")]
    Empty(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub label: String,
    pub confidence: f32,
}

/// What happened to the optional second classification pass.
#[derive(Debug, Clone, PartialEq)]
pub enum RefinementStatus {
    /// Primary confidence was high enough.
    NotNeeded,
    /// No category model is configured.
    Unavailable,
    Refined { category: String },
    Failed(String),
}

#[derive(Clone)]
pub struct FoodClassifier {
    primary: Arc<dyn LabelModel>,
    category: Option<Arc<dyn LabelModel>>,
}

impl FoodClassifier {
    pub fn new(primary: Arc<dyn LabelModel>, category: Option<Arc<dyn LabelModel>>) -> Self {
        Self { primary, category }
    }

    /// Runs only the primary model.
    pub async fn classify(&self, image: &ModelInput) -> Result<ClassificationResult, ClassificationError> {
        let labels = self.primary.classify(image).await.map_err(|e| ClassificationError::Model {
            model: self.primary.model_name().to_string(),
            source: e,
        })?;

        let top = labels
            .into_iter()
            .next()
            .ok_or_else(|| ClassificationError::Empty(self.primary.model_name().to_string()))?;

        info!("Initial classification: {} (confidence: {:.3})", top.label, top.score);
        Ok(ClassificationResult {
            label: top.label,
            confidence: top.score.clamp(0.0, 1.0),
        })
    }

    /// Appends the category label to a low-confidence result. Never fails:
    /// a category model error leaves the primary label untouched.
    pub async fn refine(
        &self,
        image: &ModelInput,
        result: ClassificationResult,
    ) -> (ClassificationResult, RefinementStatus) {
        if result.confidence >= REFINE_THRESHOLD {
            return (result, RefinementStatus::NotNeeded);
        }

        let category_model = match &self.category {
            Some(model) => model,
            None => return (result, RefinementStatus::Unavailable),
        };

        info!("Low confidence, trying category classifier {}", category_model.model_name());
        match category_model.classify(image).await {
            Ok(labels) => match labels.into_iter().next() {
                Some(category) => {
                    let refined = ClassificationResult {
                        label: format!("{} ({})", result.label, category.label),
                        confidence: result.confidence,
                    };
                    info!("Refined classification: {}", refined.label);
                    (refined, RefinementStatus::Refined { category: category.label })
                }
                None => {
                    error!("Category classifier returned no labels");
                    (result, RefinementStatus::Failed("no labels".to_string()))
                }
            },
            Err(e) => {
                error!("Error in category classification: {}", e);
                (result, RefinementStatus::Failed(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::traits::LabelScore;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use image::{DynamicImage, RgbImage};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedModel {
        name: &'static str,
        labels: Option<Vec<LabelScore>>,
        calls: AtomicUsize,
    }

    impl ScriptedModel {
        fn answering(name: &'static str, label: &str, score: f32) -> Arc<Self> {
            Arc::new(Self {
                name,
                labels: Some(vec![LabelScore::new(label, score)]),
                calls: AtomicUsize::new(0),
            })
        }

        fn empty(name: &'static str) -> Arc<Self> {
            Arc::new(Self { name, labels: Some(Vec::new()), calls: AtomicUsize::new(0) })
        }

        fn broken(name: &'static str) -> Arc<Self> {
            Arc::new(Self { name, labels: None, calls: AtomicUsize::new(0) })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LabelModel for ScriptedModel {
        async fn classify(&self, _input: &ModelInput) -> Result<Vec<LabelScore>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.labels.clone().ok_or_else(|| anyhow!("{} is down", self.name))
        }

        fn model_name(&self) -> &str {
            self.name
        }
    }

    fn image() -> ModelInput {
        ModelInput::new(DynamicImage::ImageRgb8(RgbImage::new(128, 128)), Vec::new(), "image/png")
    }

    #[tokio::test]
    async fn test_classify_takes_top_label() {
        let classifier = FoodClassifier::new(ScriptedModel::answering("food", "ramen", 0.91), None);
        let result = classifier.classify(&image()).await.unwrap();
        assert_eq!(result, ClassificationResult { label: "ramen".to_string(), confidence: 0.91 });
    }

    #[tokio::test]
    async fn test_classify_empty_result_is_error() {
        let classifier = FoodClassifier::new(ScriptedModel::empty("food"), None);
        assert!(matches!(classifier.classify(&image()).await, Err(ClassificationError::Empty(_))));
    }

    #[tokio::test]
    async fn test_classify_model_failure_is_error() {
        let classifier = FoodClassifier::new(ScriptedModel::broken("food"), None);
        let err = classifier.classify(&image()).await.unwrap_err();
        assert!(matches!(err, ClassificationError::Model { .. }));
    }

    #[tokio::test]
    async fn test_confident_result_skips_category_model() {
        let category = ScriptedModel::answering("category", "Meat", 0.8);
        let classifier = FoodClassifier::new(ScriptedModel::answering("food", "steak", 0.7), Some(category.clone()));

        let result = classifier.classify(&image()).await.unwrap();
        let (refined, status) = classifier.refine(&image(), result).await;

        assert_eq!(refined.label, "steak");
        assert_eq!(status, RefinementStatus::NotNeeded);
        assert_eq!(category.calls(), 0);
    }

    #[tokio::test]
    async fn test_low_confidence_appends_category() {
        let category = ScriptedModel::answering("category", "L2", 0.8);
        let classifier = FoodClassifier::new(ScriptedModel::answering("food", "L1", 0.4), Some(category.clone()));

        let result = classifier.classify(&image()).await.unwrap();
        let (refined, status) = classifier.refine(&image(), result).await;

        assert_eq!(refined.label, "L1 (L2)");
        assert_eq!(refined.confidence, 0.4);
        assert_eq!(status, RefinementStatus::Refined { category: "L2".to_string() });
        assert_eq!(category.calls(), 1);
    }

    #[tokio::test]
    async fn test_category_failure_keeps_primary_label() {
        let classifier = FoodClassifier::new(
            ScriptedModel::answering("food", "tacos", 0.2),
            Some(ScriptedModel::broken("category")),
        );

        let result = classifier.classify(&image()).await.unwrap();
        let (refined, status) = classifier.refine(&image(), result).await;

        assert_eq!(refined.label, "tacos");
        assert!(matches!(status, RefinementStatus::Failed(_)));
    }

    #[tokio::test]
    async fn test_missing_category_model_is_unavailable() {
        let classifier = FoodClassifier::new(ScriptedModel::answering("food", "tacos", 0.2), None);
        let result = classifier.classify(&image()).await.unwrap();
        let (refined, status) = classifier.refine(&image(), result).await;
        assert_eq!(refined.label, "tacos");
        assert_eq!(status, RefinementStatus::Unavailable);
    }
}
