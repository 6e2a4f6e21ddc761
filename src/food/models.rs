use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::food::analysis::nutrition::NutritionData;

/// One persisted scan. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub food_item: String,
    pub nutrition_data: NutritionData,
    pub confidence: f32,
    pub image_url: Option<String>,
}

impl ScanRecord {
    pub fn new(food_item: String, nutrition_data: NutritionData, confidence: f32) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            food_item,
            nutrition_data,
            confidence,
            image_url: None,
        }
    }
}

/// Body of a successful `POST /api/scan`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResponse {
    pub food_item: String,
    pub confidence: f32,
    pub nutrition_data: NutritionData,
}

impl From<&ScanRecord> for ScanResponse {
    fn from(record: &ScanRecord) -> Self {
        Self {
            food_item: record.food_item.clone(),
            confidence: record.confidence,
            nutrition_data: record.nutrition_data.clone(),
        }
    }
}
