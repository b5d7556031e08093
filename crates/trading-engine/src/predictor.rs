use std::time::Duration;

use async_trait::async_trait;
use engine_core::{ClosePredictor, EngineError, EngineResult};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

/// HTTP client for the external next-close regression service. The engine
/// treats an unreachable service as a transient failure and trades
/// trend-only until it comes back.
pub struct RegressionPredictor {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct PredictionResponse {
    next_close: f64,
}

impl RegressionPredictor {
    pub fn new(base_url: String) -> EngineResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| EngineError::Transient(format!("predictor client build failed: {e}")))?;

        Ok(Self { client, base_url })
    }
}

#[async_trait]
impl ClosePredictor for RegressionPredictor {
    async fn predict_next_close(&self, symbol: &str, closes: &[f64]) -> EngineResult<f64> {
        if closes.is_empty() {
            return Err(EngineError::DataUnavailable(format!(
                "no close history to predict from for {symbol}"
            )));
        }

        let response = self
            .client
            .post(format!("{}/predict", self.base_url))
            .json(&json!({ "symbol": symbol, "closes": closes }))
            .send()
            .await
            .map_err(|e| EngineError::Transient(format!("predictor request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::Transient(format!(
                "predictor error ({status}): {body}"
            )));
        }

        let prediction = response
            .json::<PredictionResponse>()
            .await
            .map_err(|e| EngineError::Transient(format!("predictor response unreadable: {e}")))?;
        Ok(prediction.next_close)
    }
}
