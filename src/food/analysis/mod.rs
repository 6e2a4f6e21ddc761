pub mod classifier;
pub mod filter;
pub mod nutrition;

pub use classifier::{ClassificationResult, FoodClassifier};
pub use filter::{FilterVerdict, FoodFilter};
pub use nutrition::{NutrientValue, NutritionData};
