mod http;
mod types;

use crate::config::Config;
use anyhow::Result;
pub use http::{DEFAULT_BASE_URL, HttpPredictionService};
use std::sync::Arc;
pub use types::{
    AnalysisResult, CostInputs, CropForecast, PredictionService, ProfitAnalysis, ProfitTotals,
    YieldForecast,
};

pub fn create_prediction_service(config: &Config) -> Result<Arc<dyn PredictionService>> {
    Ok(Arc::new(HttpPredictionService::new(
        &config.api_url,
        config.timeout,
    )?))
}
