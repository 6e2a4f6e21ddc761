use async_trait::async_trait;

use crate::food::analysis::nutrition::NutritionData;

/// Outcome of a single nutrition lookup. Nothing here is fatal to a scan.
#[derive(Debug, Clone, PartialEq)]
pub enum LookupStatus {
    Found(NutritionData),
    NotFound,
    /// Transport, timeout or parse failure.
    Failed(String),
    /// No nutrition source is configured.
    Unavailable,
}

impl LookupStatus {
    /// Folds misses and failures into the zero-filled default record.
    pub fn into_nutrition(self) -> NutritionData {
        match self {
            LookupStatus::Found(data) => data,
            LookupStatus::NotFound | LookupStatus::Failed(_) => NutritionData::zeroed(),
            LookupStatus::Unavailable => NutritionData::unavailable(),
        }
    }
}

#[async_trait]
pub trait NutritionSource: Send + Sync {
    async fn find(&self, food_item: &str) -> LookupStatus;

    /// Never fails; misses resolve to the zero-filled default.
    async fn lookup(&self, food_item: &str) -> NutritionData {
        self.find(food_item).await.into_nutrition()
    }
}
