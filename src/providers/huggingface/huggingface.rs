use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use crate::providers::traits::{LabelModel, LabelScore, ModelInput};

/// Image classification through the Hugging Face inference API.
#[derive(Clone)]
pub struct HuggingFaceModel {
    api_key: String,
    api_url: String,
    model: String,
    client: Client,
}

impl HuggingFaceModel {
    pub fn new(api_key: String, api_url: &str, model: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build inference HTTP client")?;

        Ok(Self {
            api_key,
            api_url: api_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}", self.api_url, self.model)
    }
}

#[async_trait]
impl LabelModel for HuggingFaceModel {
    async fn classify(&self, input: &ModelInput) -> Result<Vec<LabelScore>> {
        let response = self.client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .header(reqwest::header::CONTENT_TYPE, input.mime)
            .body(input.bytes.clone())
            .send()
            .await
            .with_context(|| format!("Inference request to {} failed", self.model))?;

        let status = response.status();
        let response_json: Value = response
            .json()
            .await
            .with_context(|| format!("Invalid inference response from {}", self.model))?;

        if !status.is_success() {
            return Err(anyhow!("{} returned {}: {}", self.model, status, error_message(&response_json)));
        }

        parse_labels(&response_json)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

fn error_message(value: &Value) -> String {
    value
        .get("error")
        .and_then(|e| e.as_str())
        .map(|s| s.to_string())
        .unwrap_or_else(|| value.to_string())
}

/// Parses `[{"label": .., "score": ..}, ..]` and sorts it best first.
pub fn parse_labels(value: &Value) -> Result<Vec<LabelScore>> {
    if value.get("error").is_some() {
        return Err(anyhow!("Inference error: {}", error_message(value)));
    }

    let entries = value
        .as_array()
        .ok_or_else(|| anyhow!("Invalid response format"))?;

    let mut labels: Vec<LabelScore> = entries
        .iter()
        .filter_map(|entry| {
            let label = entry.get("label")?.as_str()?;
            let score = entry.get("score")?.as_f64()?;
            Some(LabelScore::new(label, score as f32))
        })
        .collect();

    labels.sort_by(|a, b| b.score.total_cmp(&a.score));
    Ok(labels)
}
