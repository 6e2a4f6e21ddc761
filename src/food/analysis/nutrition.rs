use serde::de::{self, Deserializer, Visitor};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

pub const SERVING_SIZE: &str = "100g";
const UNAVAILABLE: &str = "N/A";
const KJ_PER_KCAL: f64 = 4.184;

/// A per-100g nutrient amount, or the explicit "N/A" marker when no source
/// was consulted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NutrientValue {
    Amount(f64),
    Unavailable,
}

impl NutrientValue {
    pub fn amount(&self) -> Option<f64> {
        match self {
            NutrientValue::Amount(v) => Some(*v),
            NutrientValue::Unavailable => None,
        }
    }
}

impl Serialize for NutrientValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            NutrientValue::Amount(v) => serializer.serialize_f64(*v),
            NutrientValue::Unavailable => serializer.serialize_str(UNAVAILABLE),
        }
    }
}

impl<'de> Deserialize<'de> for NutrientValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct NutrientVisitor;

        impl<'de> Visitor<'de> for NutrientVisitor {
            type Value = NutrientValue;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "a non-negative number or \"{}\"", UNAVAILABLE)
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
                if v.is_finite() && v >= 0.0 {
                    Ok(NutrientValue::Amount(v))
                } else {
                    Err(E::custom(format!("invalid nutrient amount {}", v)))
                }
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(NutrientValue::Amount(v as f64))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                self.visit_f64(v as f64)
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                if v == UNAVAILABLE {
                    Ok(NutrientValue::Unavailable)
                } else {
                    Err(E::invalid_value(de::Unexpected::Str(v), &self))
                }
            }
        }

        deserializer.deserialize_any(NutrientVisitor)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutritionData {
    pub calories: NutrientValue,
    pub proteins: NutrientValue,
    pub fats: NutrientValue,
    pub carbs: NutrientValue,
    pub serving_size: String,
}

impl NutritionData {
    pub fn new(calories: f64, proteins: f64, fats: f64, carbs: f64) -> Self {
        Self {
            calories: NutrientValue::Amount(round_one(calories)),
            proteins: NutrientValue::Amount(round_one(proteins)),
            fats: NutrientValue::Amount(round_one(fats)),
            carbs: NutrientValue::Amount(round_one(carbs)),
            serving_size: SERVING_SIZE.to_string(),
        }
    }

    /// Zero-filled record returned when a lookup finds nothing.
    pub fn zeroed() -> Self {
        Self::new(0.0, 0.0, 0.0, 0.0)
    }

    /// Record used when no nutrition source is configured at all.
    pub fn unavailable() -> Self {
        Self {
            calories: NutrientValue::Unavailable,
            proteins: NutrientValue::Unavailable,
            fats: NutrientValue::Unavailable,
            carbs: NutrientValue::Unavailable,
            serving_size: SERVING_SIZE.to_string(),
        }
    }

    /// Reads an Open Food Facts `nutriments` object. Missing, negative or
    /// non-numeric fields count as zero; energy falls back from kcal to kJ.
    pub fn from_nutriments(nutriments: &Value) -> Self {
        let calories = numeric_field(nutriments, "energy-kcal_100g")
            .or_else(|| numeric_field(nutriments, "energy_100g").map(|kj| kj / KJ_PER_KCAL))
            .unwrap_or(0.0);

        Self::new(
            calories,
            numeric_field(nutriments, "proteins_100g").unwrap_or(0.0),
            numeric_field(nutriments, "fat_100g").unwrap_or(0.0),
            numeric_field(nutriments, "carbohydrates_100g").unwrap_or(0.0),
        )
    }
}

impl Default for NutritionData {
    fn default() -> Self {
        Self::zeroed()
    }
}

fn numeric_field(nutriments: &Value, key: &str) -> Option<f64> {
    let value = nutriments.get(key)?;
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;

    (number.is_finite() && number >= 0.0).then_some(number)
}

fn round_one(value: f64) -> f64 {
    let rounded = (value * 10.0).round() / 10.0;
    if rounded.is_finite() && rounded > 0.0 {
        rounded
    } else {
        0.0
    }
}
