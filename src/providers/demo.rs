use anyhow::Result;
use async_trait::async_trait;
use crate::providers::traits::{LabelModel, LabelScore, ModelInput};

const DEMO_FOODS: &[(&str, f32)] = &[
    ("pizza", 0.85),
    ("burger", 0.78),
    ("salad", 0.72),
    ("pasta", 0.68),
    ("sandwich", 0.75),
];

/// Stand-in classifier for running the service without model credentials.
/// The label is picked from a digest of the pixels so the same upload always
/// gets the same answer.
#[derive(Debug, Clone, Default)]
pub struct DemoLabelModel;

impl DemoLabelModel {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl LabelModel for DemoLabelModel {
    async fn classify(&self, input: &ModelInput) -> Result<Vec<LabelScore>> {
        let image = &input.image;
        let digest = image
            .as_bytes()
            .iter()
            .fold(image.width() as u64 ^ ((image.height() as u64) << 32), |acc, b| {
                acc.wrapping_mul(31).wrapping_add(*b as u64)
            });
        let (label, score) = DEMO_FOODS[(digest % DEMO_FOODS.len() as u64) as usize];
        Ok(vec![LabelScore::new(label, score)])
    }

    fn model_name(&self) -> &str {
        "demo"
    }
}
