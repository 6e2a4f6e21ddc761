use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, error, info, warn};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use crate::food::analysis::nutrition::NutritionData;
use crate::food::api::traits::{LookupStatus, NutritionSource};

#[derive(Debug, Clone)]
pub struct OpenFoodFactsClient {
    client: Client,
    base_url: String,
}

impl OpenFoodFactsClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build Open Food Facts HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn search_products(&self, food_item: &str) -> Result<Option<NutritionData>> {
        let url = format!("{}/cgi/search.pl", self.base_url);

        let response = self.client
            .get(&url)
            .query(&[
                ("search_terms", food_item),
                ("search_simple", "1"),
                ("action", "process"),
                ("json", "1"),
                ("page_size", "1"),
            ])
            .send()
            .await
            .context("Failed to send search request")?
            .error_for_status()
            .context("Search request was rejected")?;

        let data: Value = response
            .json()
            .await
            .context("Failed to parse search response")?;

        Ok(first_product_nutrition(&data))
    }

    async fn search(&self, food_item: &str) -> Result<Option<NutritionData>> {
        if let Some(data) = self.search_products(food_item).await? {
            return Ok(Some(data));
        }
        self.search_category(food_item).await
    }

    async fn search_category(&self, food_item: &str) -> Result<Option<NutritionData>> {
        let url = category_url(&self.base_url, food_item);
        debug!("Trying category lookup at {}", url);

        let response = self.client
            .get(&url)
            .send()
            .await
            .context("Failed to send category request")?;

        if !response.status().is_success() {
            return Ok(None);
        }

        let data: Value = response
            .json()
            .await
            .context("Failed to parse category response")?;

        Ok(first_product_nutrition(&data))
    }
}

#[async_trait]
impl NutritionSource for OpenFoodFactsClient {
    async fn find(&self, food_item: &str) -> LookupStatus {
        info!("Fetching nutritional data for {}", food_item);

        match self.search(food_item).await {
            Ok(Some(data)) => LookupStatus::Found(data),
            Ok(None) => {
                warn!("No nutritional data found for {}", food_item);
                LookupStatus::NotFound
            }
            Err(e) => {
                error!("Error fetching nutrition data for {}: {:#}", food_item, e);
                LookupStatus::Failed(e.to_string())
            }
        }
    }
}

/// Lowercased, hyphen-separated category slug.
pub fn category_slug(food_item: &str) -> String {
    food_item.to_lowercase().replace(' ', "-")
}

fn category_url(base_url: &str, food_item: &str) -> String {
    format!(
        "{}/category/{}/1.json",
        base_url,
        urlencoding::encode(&category_slug(food_item))
    )
}

/// Nutrition of the first product in a search or category response.
pub fn first_product_nutrition(data: &Value) -> Option<NutritionData> {
    let product = data.get("products")?.as_array()?.first()?;
    let empty = Value::Object(Default::default());
    let nutriments = product.get("nutriments").unwrap_or(&empty);
    Some(NutritionData::from_nutriments(nutriments))
}
