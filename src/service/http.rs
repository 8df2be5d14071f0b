use crate::error::{AppError, Result};
use crate::model::ChatPair;
use crate::service::types::{
    AnalysisResult, CostInputs, PredictionService, ProfitAnalysis, YieldForecast,
};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000/api";

/// Client for the crop compute API (`/crop/*`).
pub struct HttpPredictionService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPredictionService {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let base_url = base_url.trim_end_matches('/').to_string();
        info!(
            "Prediction service client initialized (base: {}, timeout: {:?})",
            base_url, timeout
        );
        Ok(Self { client, base_url })
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/crop/{}", self.base_url, name)
    }

    async fn post(&self, name: &str, body: Value) -> Result<Value> {
        debug!("POST crop/{}", name);
        let resp = self
            .client
            .post(self.endpoint(name))
            .json(&body)
            .send()
            .await
            .map_err(describe_send_error)?;
        read_json(resp).await
    }

    async fn get(&self, name: &str) -> Result<Value> {
        debug!("GET crop/{}", name);
        let resp = self
            .client
            .get(self.endpoint(name))
            .send()
            .await
            .map_err(describe_send_error)?;
        read_json(resp).await
    }
}

fn describe_send_error(e: reqwest::Error) -> AppError {
    if e.is_timeout() {
        AppError::Network("request timed out".into())
    } else if e.is_connect() {
        AppError::Network(format!("could not connect: {}", e))
    } else {
        AppError::network(e)
    }
}

async fn read_json(resp: reqwest::Response) -> Result<Value> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(AppError::Network(format!(
            "HTTP {}: {}",
            status,
            error_detail(&body)
        )));
    }

    let body: Value = resp
        .json()
        .await
        .map_err(|e| AppError::Network(format!("unreadable response: {}", e)))?;
    reject_error_body(&body)?;
    Ok(body)
}

/// Best human-readable message from an error response body.
fn error_detail(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(v) => ["detail", "message", "error"]
            .iter()
            .find_map(|k| v.get(*k).and_then(Value::as_str).map(String::from))
            .unwrap_or_else(|| v.to_string()),
        Err(_) if body.trim().is_empty() => "empty response".into(),
        Err(_) => body.trim().to_string(),
    }
}

/// The backend reports some failures as `{"error": "..."}` with a 200 status.
fn reject_error_body(body: &Value) -> Result<()> {
    match body.get("error") {
        Some(Value::String(msg)) => Err(AppError::Network(msg.clone())),
        Some(Value::Null) | None => Ok(()),
        Some(other) => Err(AppError::Network(other.to_string())),
    }
}

pub(crate) fn decode_forecast(body: Value) -> Result<YieldForecast> {
    reject_error_body(&body)?;
    let data = match body {
        Value::Object(mut map) if map.contains_key("data") => map.remove("data").unwrap_or_default(),
        other => other,
    };
    serde_json::from_value(data)
        .map_err(|e| AppError::Network(format!("unexpected predict-yield response: {}", e)))
}

pub(crate) fn decode_analysis(body: Value) -> Result<AnalysisResult> {
    reject_error_body(&body)?;

    let cache = body.get("cache");
    let latest = cache.and_then(|c| c.get("latest")).cloned();

    let profit_analysis = match cache.and_then(|c| c.get("profit_analysis")) {
        Some(pa) => serde_json::from_value::<ProfitAnalysis>(pa.clone()),
        // Older responses only carry the flat fields.
        None => serde_json::from_value::<ProfitAnalysis>(json!({
            "crop": body.get("crop").cloned().unwrap_or_default(),
            "predicted_yield": body.get("prediction").cloned().unwrap_or_default(),
            "market_price": body.get("market_price").cloned().unwrap_or_default(),
            "profit_margin": body.get("profit_margin").cloned().unwrap_or_default(),
            "profit": body.get("profit").cloned().unwrap_or_else(|| json!({})),
        })),
    }
    .map_err(|e| AppError::Network(format!("unexpected profit response: {}", e)))?;

    Ok(AnalysisResult {
        profit_analysis,
        latest,
        raw: body,
    })
}

fn decode_crops(body: Value) -> Result<Vec<String>> {
    body.get("crops")
        .and_then(Value::as_array)
        .map(|crops| {
            crops
                .iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect()
        })
        .ok_or_else(|| AppError::Network("crop list missing from response".into()))
}

#[async_trait]
impl PredictionService for HttpPredictionService {
    async fn predict_yield(&self, county: &str, farm_size: f64) -> Result<YieldForecast> {
        let body = self
            .post(
                "predict-yield",
                json!({ "county": county, "farm_size": farm_size }),
            )
            .await?;
        decode_forecast(body)
    }

    async fn calculate_profit(&self, crop: &str, costs: &CostInputs) -> Result<AnalysisResult> {
        let body = self
            .post(
                "calculate-own-profit",
                json!({
                    "crop_name": crop,
                    "seed_cost_per_acre": costs.seed,
                    "fertilizer_cost_per_acre": costs.fertilizer,
                    "labor_cost_per_acre": costs.labor,
                }),
            )
            .await?;
        decode_analysis(body)
    }

    async fn calculate_default_profit(&self, crop: &str) -> Result<AnalysisResult> {
        let body = self
            .post("calculate-default-profit", json!({ "crop_name": crop }))
            .await?;
        decode_analysis(body)
    }

    async fn chat(&self, message: &str, history: &[ChatPair]) -> Result<Value> {
        let mut payload = json!({ "message": message });
        if !history.is_empty() {
            payload["history"] = json!(history);
        }
        self.post("ai-chat", payload).await
    }

    async fn fetch_insight(&self) -> Result<Value> {
        self.get("insight").await
    }

    async fn list_crops(&self) -> Result<Vec<String>> {
        decode_crops(self.get("list").await?)
    }
}
