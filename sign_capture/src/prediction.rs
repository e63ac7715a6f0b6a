use crate::config::PredictionServiceConfig;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::instrument;

#[derive(Error, Debug)]
pub enum PredictionError {
    #[error("Prediction request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    #[error("Prediction response is not valid JSON: {0}")]
    InvalidResponse(#[from] serde_json::Error),
}

#[derive(Serialize, Debug)]
pub struct PredictionRequest {
    pub image: String,
}

/// Classifies one encoded snapshot and returns its label.
#[async_trait]
pub trait PredictionClient: Send + Sync + 'static {
    async fn predict(&self, image_data_url: String) -> Result<String, PredictionError>;
}

/// Label carried by a classifier payload, rendered the way a browser would
/// template it. Falsy values and a non-object body all read as an empty label.
pub fn label_from_payload(payload: &Value) -> String {
    match payload.get("prediction") {
        None | Some(Value::Null) | Some(Value::Bool(false)) => String::new(),
        Some(Value::Number(number)) if number.as_f64() == Some(0.0) => String::new(),
        Some(value) => display_text(value),
    }
}

fn display_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number_text(number),
        Value::String(text) => text.clone(),
        Value::Array(items) => items.iter().map(display_text).collect::<Vec<_>>().join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

// Integral floats print without a fractional part, so 1.0 reads as "1".
fn number_text(number: &serde_json::Number) -> String {
    match number.as_f64() {
        Some(value) if number.is_f64() && value.fract() == 0.0 && value.abs() < 1e21 => {
            format!("{:.0}", value)
        }
        _ => number.to_string(),
    }
}

pub struct HttpPredictionClient {
    client: reqwest::Client,
    url: String,
}

impl HttpPredictionClient {
    pub fn new(config: &PredictionServiceConfig) -> Result<Self, PredictionError> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl PredictionClient for HttpPredictionClient {
    #[instrument(skip_all)]
    async fn predict(&self, image_data_url: String) -> Result<String, PredictionError> {
        let response = self
            .client
            .post(&self.url)
            .json(&PredictionRequest {
                image: image_data_url,
            })
            .send()
            .await?;
        tracing::debug!("Prediction endpoint {} answered {}", self.url, response.status());

        // Error statuses still carry a JSON body worth reading.
        let status = response.status();
        let body = response.bytes().await?;
        let payload: Value = serde_json::from_slice(&body)?;
        if !status.is_success() {
            tracing::warn!("Prediction endpoint answered {}: {}", status, payload);
        }

        Ok(label_from_payload(&payload))
    }
}
