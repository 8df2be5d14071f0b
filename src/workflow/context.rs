use crate::error::{AppError, Result};
use crate::report::InsightReport;
use crate::service::{AnalysisResult, CostInputs, CropForecast, YieldForecast};
use crate::workflow::stage::CostMode;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Value, json};

/// In-memory carrier of one workflow traversal. Never persisted as a unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionContext {
    county: String,
    farm_size: f64,
    recommendations: IndexMap<String, CropForecast>,
    input_data: Option<Value>,
    chosen_crop: Option<String>,
    cost_mode: Option<CostMode>,
    cost_inputs: Option<CostInputs>,
    analysis: Option<AnalysisResult>,
    farm_id: Option<String>,
    prediction_id: Option<String>,
    report: Option<InsightReport>,
}

impl SessionContext {
    pub(crate) fn new(county: &str, farm_size: f64) -> Self {
        Self {
            county: county.to_string(),
            farm_size,
            recommendations: IndexMap::new(),
            input_data: None,
            chosen_crop: None,
            cost_mode: None,
            cost_inputs: None,
            analysis: None,
            farm_id: None,
            prediction_id: None,
            report: None,
        }
    }

    pub fn county(&self) -> &str {
        &self.county
    }

    pub fn farm_size(&self) -> f64 {
        self.farm_size
    }

    pub fn recommendations(&self) -> &IndexMap<String, CropForecast> {
        &self.recommendations
    }

    pub fn chosen_crop(&self) -> Option<&str> {
        self.chosen_crop.as_deref()
    }

    pub fn chosen_forecast(&self) -> Option<&CropForecast> {
        self.recommendations.get(self.chosen_crop.as_deref()?)
    }

    pub fn cost_mode(&self) -> Option<CostMode> {
        self.cost_mode
    }

    pub fn cost_inputs(&self) -> Option<&CostInputs> {
        self.cost_inputs.as_ref()
    }

    pub fn analysis(&self) -> Option<&AnalysisResult> {
        self.analysis.as_ref()
    }

    pub fn farm_id(&self) -> Option<&str> {
        self.farm_id.as_deref()
    }

    pub fn prediction_id(&self) -> Option<&str> {
        self.prediction_id.as_deref()
    }

    pub fn report(&self) -> Option<&InsightReport> {
        self.report.as_ref()
    }

    pub(crate) fn apply_forecast(&mut self, forecast: YieldForecast) {
        self.recommendations = forecast.predictions;
        self.input_data = forecast.input_data;
    }

    pub(crate) fn set_farm_id(&mut self, farm_id: Option<String>) {
        self.farm_id = farm_id;
    }

    pub(crate) fn set_prediction_id(&mut self, id: String) {
        self.prediction_id = Some(id);
    }

    pub(crate) fn set_report(&mut self, report: InsightReport) {
        self.report = Some(report);
    }

    /// Resolves a recommendation key: exact match first, then ASCII case-insensitive.
    pub(crate) fn resolve_crop(&self, key: &str) -> Result<String> {
        if self.recommendations.is_empty() {
            return Err(AppError::NotFound(format!(
                "no crop recommendations for {}",
                self.county
            )));
        }
        let key = key.trim();
        if self.recommendations.contains_key(key) {
            return Ok(key.to_string());
        }
        self.recommendations
            .keys()
            .find(|k| k.eq_ignore_ascii_case(key))
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("crop {:?} is not among the recommendations", key)))
    }

    pub(crate) fn select_crop(&mut self, crop: String) {
        self.chosen_crop = Some(crop);
        self.cost_mode = None;
        self.cost_inputs = None;
        self.analysis = None;
    }

    pub(crate) fn choose_cost_mode(&mut self, mode: CostMode) {
        if self.cost_mode != Some(mode) {
            self.cost_inputs = None;
        }
        self.cost_mode = Some(mode);
        self.analysis = None;
    }

    pub(crate) fn set_cost_inputs(&mut self, inputs: CostInputs) {
        self.cost_inputs = Some(inputs);
    }

    pub(crate) fn set_analysis(&mut self, analysis: AnalysisResult) {
        self.analysis = Some(analysis);
    }

    /// Opaque summary stored with the prediction row.
    pub(crate) fn input_summary(&self) -> Value {
        json!({
            "county": self.county,
            "farm_size": self.farm_size,
            "cost_mode": self.cost_mode,
            "costs": self.cost_inputs,
            "forecast": self.chosen_forecast(),
            "environment": self.input_data,
        })
    }

    /// Context column of the stored insight report.
    pub(crate) fn report_context(&self) -> Value {
        json!({
            "county": self.county,
            "farm_size": self.farm_size,
            "crop": self.chosen_crop,
        })
    }
}
