use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_FOOD_MODEL: &str = "nateraw/food";
pub const DEFAULT_CATEGORY_MODEL: &str = "Kaludi/food-category-classification-v2.0";
pub const DEFAULT_HUGGINGFACE_URL: &str = "https://api-inference.huggingface.co";
pub const DEFAULT_OPENFOODFACTS_URL: &str = "https://world.openfoodfacts.org";
pub const DEFAULT_DB_PATH: &str = "data/mealscan.db";

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{name} has an invalid value: {value}")]
    InvalidValue { name: String, value: String },
}

/// Settings for the model clients.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub api_key: Option<String>,
    pub api_url: String,
    pub food_model: String,
    pub category_model: Option<String>,
    pub gate_model: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub models: ModelConfig,
    pub nutrition_api_url: String,
    pub nutrition_timeout: Duration,
    pub db_path: String,
    pub max_upload_bytes: usize,
    pub max_concurrent_scans: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from an arbitrary variable source. Empty values count
    /// as unset so a blank line in `.env` falls back to the default.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let models = ModelConfig {
            api_key: var("HUGGINGFACE_API_KEY"),
            api_url: var("HUGGINGFACE_API_URL").unwrap_or_else(|| DEFAULT_HUGGINGFACE_URL.to_string()),
            food_model: var("FOOD_MODEL").unwrap_or_else(|| DEFAULT_FOOD_MODEL.to_string()),
            // Explicitly set but blank disables the secondary model
            category_model: match lookup("FOOD_CATEGORY_MODEL") {
                Some(v) if v.trim().is_empty() => None,
                Some(v) => Some(v.trim().to_string()),
                None => Some(DEFAULT_CATEGORY_MODEL.to_string()),
            },
            gate_model: var("FOOD_GATE_MODEL"),
            timeout: Duration::from_secs(parse_or("MODEL_TIMEOUT_SECS", var("MODEL_TIMEOUT_SECS"), 30)?),
        };

        Ok(Self {
            models,
            nutrition_api_url: var("OPENFOODFACTS_API_URL")
                .unwrap_or_else(|| DEFAULT_OPENFOODFACTS_URL.to_string()),
            nutrition_timeout: Duration::from_secs(parse_or(
                "NUTRITION_TIMEOUT_SECS",
                var("NUTRITION_TIMEOUT_SECS"),
                10,
            )?),
            db_path: var("MEALSCAN_DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.to_string()),
            max_upload_bytes: parse_or("MAX_UPLOAD_BYTES", var("MAX_UPLOAD_BYTES"), 10 * 1024 * 1024)?,
            max_concurrent_scans: parse_or("MAX_CONCURRENT_SCANS", var("MAX_CONCURRENT_SCANS"), 16)?,
        })
    }
}

fn parse_or<T: FromStr>(name: &str, value: Option<String>, default: T) -> Result<T, ConfigError> {
    match value {
        Some(v) => v.parse().map_err(|_| ConfigError::InvalidValue {
            name: name.to_string(),
            value: v,
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.models.api_key, None);
        assert_eq!(config.models.food_model, DEFAULT_FOOD_MODEL);
        assert_eq!(config.models.category_model.as_deref(), Some(DEFAULT_CATEGORY_MODEL));
        assert_eq!(config.models.gate_model, None);
        assert_eq!(config.nutrition_timeout, Duration::from_secs(10));
        assert_eq!(config.nutrition_api_url, DEFAULT_OPENFOODFACTS_URL);
        assert_eq!(config.db_path, DEFAULT_DB_PATH);
        assert_eq!(config.max_upload_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn test_blank_category_model_disables_refinement() {
        let config = config_from(&[("FOOD_CATEGORY_MODEL", "  ")]).unwrap();
        assert_eq!(config.models.category_model, None);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("HUGGINGFACE_API_KEY", "hf_test"),
            ("FOOD_GATE_MODEL", "google/vit-base-patch16-224"),
            ("NUTRITION_TIMEOUT_SECS", "3"),
        ])
        .unwrap();
        assert_eq!(config.models.api_key.as_deref(), Some("hf_test"));
        assert_eq!(config.models.gate_model.as_deref(), Some("google/vit-base-patch16-224"));
        assert_eq!(config.nutrition_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_invalid_number_is_rejected() {
        let err = config_from(&[("MAX_UPLOAD_BYTES", "lots")]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                name: "MAX_UPLOAD_BYTES".to_string(),
                value: "lots".to_string()
            }
        );
    }
}
