use crate::error::{AppError, Result};
use crate::model::ChatPair;
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropForecast {
    pub prediction_in_acres: f64,
    #[serde(default)]
    pub market_price: Option<f64>,
}

/// Output of `predict-yield`; crops stay in the order the backend listed them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YieldForecast {
    pub county: String,
    pub farm_size: f64,
    #[serde(default)]
    pub predictions: IndexMap<String, CropForecast>,
    #[serde(default)]
    pub input_data: Option<Value>,
}

/// Per-acre cultivation costs entered by the farmer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostInputs {
    pub labor: f64,
    pub seed: f64,
    pub fertilizer: f64,
}

impl CostInputs {
    pub fn new(labor: f64, seed: f64, fertilizer: f64) -> Result<Self> {
        let inputs = Self {
            labor,
            seed,
            fertilizer,
        };
        inputs.validate()?;
        Ok(inputs)
    }

    /// Parses the three raw form fields. Blank or non-numeric text is rejected.
    pub fn parse(labor: &str, seed: &str, fertilizer: &str) -> Result<Self> {
        fn field(name: &str, raw: &str) -> Result<f64> {
            raw.trim().parse::<f64>().map_err(|_| {
                AppError::Validation(format!("{} cost must be a number, got {:?}", name, raw))
            })
        }
        Self::new(
            field("labor", labor)?,
            field("seed", seed)?,
            field("fertilizer", fertilizer)?,
        )
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("labor", self.labor),
            ("seed", self.seed),
            ("fertilizer", self.fertilizer),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(AppError::Validation(format!(
                    "{} cost cannot be negative",
                    name
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProfitTotals {
    #[serde(default)]
    pub total_revenue: f64,
    #[serde(default)]
    pub total_cost: f64,
    #[serde(default)]
    pub total_profit: f64,
    /// Cost breakdown and anything else the backend adds.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfitAnalysis {
    pub crop: String,
    #[serde(default)]
    pub predicted_yield: Option<f64>,
    #[serde(default)]
    pub market_price: Option<f64>,
    #[serde(default)]
    pub profit_margin: Option<f64>,
    #[serde(default)]
    pub profit: ProfitTotals,
}

/// Everything a profit calculation produced.
///
/// `latest` is the backend's cached yield run (county, farm size, environmental inputs) and
/// `raw` the untouched response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub profit_analysis: ProfitAnalysis,
    #[serde(default)]
    pub latest: Option<Value>,
    #[serde(default)]
    pub raw: Value,
}

impl AnalysisResult {
    pub fn from_profit(profit_analysis: ProfitAnalysis) -> Self {
        Self {
            profit_analysis,
            latest: None,
            raw: Value::Null,
        }
    }
}

#[async_trait]
pub trait PredictionService: Send + Sync {
    async fn predict_yield(&self, county: &str, farm_size: f64) -> Result<YieldForecast>;

    async fn calculate_profit(&self, crop: &str, costs: &CostInputs) -> Result<AnalysisResult>;

    async fn calculate_default_profit(&self, crop: &str) -> Result<AnalysisResult>;

    /// Returns the raw reply payload; its shape is not contractually stable.
    async fn chat(&self, message: &str, history: &[ChatPair]) -> Result<Value>;

    /// Returns the raw insight payload for the most recent analysis.
    async fn fetch_insight(&self) -> Result<Value>;

    async fn list_crops(&self) -> Result<Vec<String>>;
}
