use log::{info, warn};
use std::sync::Arc;

use crate::providers::traits::{LabelModel, ModelInput};

pub const MIN_DIMENSION: u32 = 50;
pub const MAX_DIMENSION: u32 = 5000;
pub const MAX_ASPECT_RATIO: f64 = 5.0;
pub const MIN_ASPECT_RATIO: f64 = 0.2;
pub const MIN_GATE_SCORE: f32 = 0.3;

pub const TOO_SMALL: &str = "Image too small. Please upload a higher resolution image.";
pub const TOO_LARGE: &str = "Image too large. Please upload a smaller image.";
pub const BAD_ORIENTATION: &str = "Please upload a properly oriented food image.";
pub const UNCLEAR_IMAGE: &str = "This is not a clear food image. Please upload a clearer photo of food.";
pub const NOT_FOOD: &str = "This doesn't appear to be a food image. Please upload a clear photo of food.";
pub const VERIFIED: &str = "Valid food image";
pub const UNVERIFIED: &str = "Food content not verified";

// Matched as whole words of the lowercased top label, plurals included.
const FOOD_KEYWORDS: &[&str] = &[
    "food", "dish", "meal", "pizza", "burger", "hamburger", "cheeseburger", "sandwich",
    "hotdog", "hot dog", "taco", "burrito", "salad", "soup", "pasta", "spaghetti", "noodle",
    "ramen", "rice", "sushi", "bread", "loaf", "bagel", "pretzel", "cake", "pie", "potpie",
    "cookie", "donut", "doughnut", "dough", "ice cream", "chocolate", "cheese", "egg", "eggnog",
    "omelet", "steak", "meat", "meatloaf", "beef", "pork", "chicken", "fish", "shrimp", "fries",
    "potato", "fruit", "apple", "banana", "orange", "strawberry", "lemon", "pineapple", "fig",
    "pomegranate", "vegetable", "broccoli", "cauliflower", "cabbage", "zucchini", "cucumber",
    "artichoke", "squash", "mushroom", "corn", "carrot", "pancake", "waffle", "curry",
    "dumpling", "guacamole", "trifle", "pudding", "carbonara", "consomme", "espresso", "coffee",
];

/// Outcome of the food-likelihood gate.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterVerdict {
    /// The gate model saw food.
    Accepted,
    /// Geometry passed but no gate model could confirm food content.
    Unverified,
    Rejected(String),
}

impl FilterVerdict {
    pub fn is_accepted(&self) -> bool {
        !matches!(self, FilterVerdict::Rejected(_))
    }

    pub fn reason(&self) -> &str {
        match self {
            FilterVerdict::Accepted => VERIFIED,
            FilterVerdict::Unverified => UNVERIFIED,
            FilterVerdict::Rejected(reason) => reason,
        }
    }
}

#[derive(Clone, Default)]
pub struct FoodFilter {
    gate: Option<Arc<dyn LabelModel>>,
}

impl FoodFilter {
    pub fn new(gate: Option<Arc<dyn LabelModel>>) -> Self {
        Self { gate }
    }

    /// Convenience form returning `(accepted, reason)`.
    pub async fn is_food(&self, image: &ModelInput) -> (bool, String) {
        let verdict = self.check(image).await;
        (verdict.is_accepted(), verdict.reason().to_string())
    }

    pub async fn check(&self, image: &ModelInput) -> FilterVerdict {
        let (width, height) = image.dimensions();
        if let Some(reason) = check_dimensions(width, height) {
            return FilterVerdict::Rejected(reason.to_string());
        }

        let gate = match &self.gate {
            Some(gate) => gate,
            None => return FilterVerdict::Unverified,
        };

        let labels = match gate.classify(image).await {
            Ok(labels) => labels,
            Err(e) => {
                warn!("Food gate model {} failed, treating image as unverified: {}", gate.model_name(), e);
                return FilterVerdict::Unverified;
            }
        };

        let top = match labels.first() {
            Some(top) => top,
            None => return FilterVerdict::Rejected(UNCLEAR_IMAGE.to_string()),
        };

        if top.score < MIN_GATE_SCORE {
            info!("Gate top label {} scored {:.2}, below threshold", top.label, top.score);
            return FilterVerdict::Rejected(UNCLEAR_IMAGE.to_string());
        }

        if !is_food_label(&top.label) {
            info!("Gate top label {} is not food related", top.label);
            return FilterVerdict::Rejected(NOT_FOOD.to_string());
        }

        FilterVerdict::Accepted
    }
}

/// Geometry rules, checked before any model call.
pub fn check_dimensions(width: u32, height: u32) -> Option<&'static str> {
    if width < MIN_DIMENSION || height < MIN_DIMENSION {
        return Some(TOO_SMALL);
    }
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Some(TOO_LARGE);
    }

    let aspect_ratio = width as f64 / height as f64;
    if aspect_ratio > MAX_ASPECT_RATIO || aspect_ratio < MIN_ASPECT_RATIO {
        return Some(BAD_ORIENTATION);
    }

    None
}

pub fn is_food_label(label: &str) -> bool {
    let label = label.to_lowercase();
    let words: Vec<&str> = label
        .split(|c: char| c.is_whitespace() || matches!(c, '_' | ',' | '-'))
        .filter(|word| !word.is_empty())
        .collect();

    FOOD_KEYWORDS.iter().any(|keyword| {
        let keyword: Vec<&str> = keyword.split(' ').collect();
        words
            .windows(keyword.len())
            .any(|window| window.iter().zip(&keyword).all(|(word, key)| word_matches(word, key)))
    })
}

fn word_matches(word: &str, keyword: &str) -> bool {
    if word == keyword {
        return true;
    }
    match word.strip_suffix('s') {
        Some(stem) => stem == keyword || stem.strip_suffix('e') == Some(keyword),
        None => false,
    }
}
