use crate::auth::{AuthSession, AuthUser, require_user};
use crate::deadline::{self, DEFAULT_TIMEOUT};
use crate::error::{AppError, Result};
use crate::model::{NewFarm, NewPrediction};
use crate::report::{InsightReport, ReportPipeline};
use crate::service::{AnalysisResult, CostInputs, CropForecast, PredictionService};
use crate::store::RemoteStore;
use crate::workflow::context::SessionContext;
use crate::workflow::stage::{CostMode, Stage};
use indexmap::IndexMap;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkflowConfig {
    pub timeout: Duration,
    /// Deprecated: reference the user's newest farm when no farm id was carried.
    pub latest_farm_fallback: bool,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            latest_farm_fallback: false,
        }
    }
}

/// What `persist_and_report` produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportOutcome {
    pub report: InsightReport,
    /// Insight payload exactly as the backend returned it.
    pub payload: Value,
    pub farm_id: Option<String>,
    pub prediction_id: Option<String>,
    /// Persistence problems that did not stop the report.
    pub warnings: Vec<AppError>,
}

/// Farm row written for a location, reused while the same user resubmits the same location.
#[derive(Debug, Clone, PartialEq)]
struct RecordedFarm {
    user_id: String,
    county: String,
    farm_size: f64,
    id: String,
}

impl RecordedFarm {
    fn matches(&self, user: &AuthUser, county: &str, farm_size: f64) -> bool {
        self.user_id == user.id && self.county == county && self.farm_size == farm_size
    }
}

const CROP_STAGES: [Stage; 4] = [
    Stage::RecommendationsShown,
    Stage::CropSelected,
    Stage::CostModeChosen,
    Stage::AnalysisComputed,
];
const COST_MODE_STAGES: [Stage; 3] = [
    Stage::CropSelected,
    Stage::CostModeChosen,
    Stage::AnalysisComputed,
];
const COST_STAGES: [Stage; 2] = [Stage::CostModeChosen, Stage::AnalysisComputed];
const PERSIST_STAGES: [Stage; 2] = [Stage::AnalysisComputed, Stage::Persisted];

/// Drives one farmer through location, crop, costs, analysis and the insight report.
///
/// Every operation takes `&mut self` and commits context changes only after its awaited
/// calls resolve. A dropped `submit_location` leaves the stage at `LocationEntered`, from
/// which a new submit recovers.
pub struct WorkflowOrchestrator {
    service: Arc<dyn PredictionService>,
    store: Arc<dyn RemoteStore>,
    auth: Arc<dyn AuthSession>,
    pipeline: ReportPipeline,
    config: WorkflowConfig,
    stage: Stage,
    context: Option<SessionContext>,
    recorded_farm: Option<RecordedFarm>,
}

impl WorkflowOrchestrator {
    pub fn new(
        service: Arc<dyn PredictionService>,
        store: Arc<dyn RemoteStore>,
        auth: Arc<dyn AuthSession>,
        config: WorkflowConfig,
    ) -> Self {
        let pipeline = ReportPipeline::new(service.clone(), store.clone(), config.timeout);
        Self {
            service,
            store,
            auth,
            pipeline,
            config,
            stage: Stage::Start,
            context: None,
            recorded_farm: None,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn context(&self) -> Option<&SessionContext> {
        self.context.as_ref()
    }

    pub fn report(&self) -> Option<&InsightReport> {
        self.context.as_ref()?.report()
    }

    pub fn restart(&mut self) {
        info!("Workflow restarted from {}", self.stage);
        self.stage = Stage::Start;
        self.context = None;
        self.recorded_farm = None;
    }

    fn ensure(&self, action: &'static str, allowed: &[Stage]) -> Result<()> {
        if allowed.contains(&self.stage) {
            Ok(())
        } else {
            Err(AppError::OutOfOrder {
                action,
                stage: self.stage.to_string(),
            })
        }
    }

    fn context_mut(&mut self, action: &'static str) -> Result<&mut SessionContext> {
        let stage = self.stage;
        self.context.as_mut().ok_or(AppError::OutOfOrder {
            action,
            stage: stage.to_string(),
        })
    }

    fn advance(&mut self, to: Stage) {
        if self.stage != to {
            info!("Workflow stage {} -> {}", self.stage, to);
        }
        self.stage = to;
    }

    /// Entry point: forecasts yields for a location and records the farm.
    pub async fn submit_location(
        &mut self,
        county: &str,
        farm_size: f64,
    ) -> Result<&IndexMap<String, CropForecast>> {
        let county = county.trim();
        if county.is_empty() {
            return Err(AppError::Validation("county is required".into()));
        }
        if !farm_size.is_finite() || farm_size <= 0.0 {
            return Err(AppError::Validation(
                "farm size must be a positive number".into(),
            ));
        }

        let previous = self.stage;
        self.advance(Stage::LocationEntered);

        let forecast = deadline::compute(
            self.config.timeout,
            "predict-yield",
            self.service.predict_yield(county, farm_size),
        )
        .await;

        let farm_id = self.record_farm(county, farm_size).await;

        let forecast = match forecast {
            Ok(forecast) => forecast,
            Err(e) => {
                warn!("Yield prediction for {} failed: {}", county, e);
                self.stage = previous;
                return Err(e);
            }
        };

        info!(
            "Received {} crop recommendations for {} ({} acres)",
            forecast.predictions.len(),
            county,
            farm_size
        );
        let mut context = SessionContext::new(county, farm_size);
        context.apply_forecast(forecast);
        context.set_farm_id(farm_id);
        self.context = Some(context);
        self.advance(Stage::RecommendationsShown);

        Ok(self.context_mut("submit location")?.recommendations())
    }

    /// Best-effort farm row for a location; reuses the row of an identical earlier submit.
    async fn record_farm(&mut self, county: &str, farm_size: f64) -> Option<String> {
        let Some(user) = self.auth.current_user().await else {
            warn!("Not signed in; farm for {} not recorded", county);
            return None;
        };

        if let Some(recorded) = &self.recorded_farm {
            if recorded.matches(&user, county, farm_size) {
                debug!("Reusing farm {} for {}", recorded.id, county);
                return Some(recorded.id.clone());
            }
        }

        match self.insert_farm(&user, county, farm_size).await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!("Failed to record farm for {}: {}", county, e);
                None
            }
        }
    }

    async fn insert_farm(&mut self, user: &AuthUser, county: &str, farm_size: f64) -> Result<String> {
        let farm = deadline::persist(
            self.config.timeout,
            "farm insert",
            self.store.insert_farm(
                user,
                NewFarm {
                    county: county.to_string(),
                    farm_size,
                    user_id: user.id.clone(),
                },
            ),
        )
        .await?;

        info!("Recorded farm {} for {}", farm.id, county);
        self.recorded_farm = Some(RecordedFarm {
            user_id: user.id.clone(),
            county: county.to_string(),
            farm_size,
            id: farm.id.clone(),
        });
        Ok(farm.id)
    }

    pub fn select_crop(&mut self, crop_key: &str) -> Result<&CropForecast> {
        self.ensure("select a crop", &CROP_STAGES)?;
        let context = self.context_mut("select a crop")?;
        let crop = context.resolve_crop(crop_key)?;
        context.select_crop(crop);
        self.advance(Stage::CropSelected);

        let context = self.context_mut("select a crop")?;
        context
            .chosen_forecast()
            .ok_or_else(|| AppError::NotFound(format!("crop {:?} has no forecast", crop_key)))
    }

    pub fn choose_cost_mode(&mut self, mode: CostMode) -> Result<()> {
        self.ensure("choose a cost mode", &COST_MODE_STAGES)?;
        self.context_mut("choose a cost mode")?.choose_cost_mode(mode);
        info!("Cost mode: {}", mode);
        self.advance(Stage::CostModeChosen);
        Ok(())
    }

    /// Records custom costs. Invalid values are rejected without leaving the stage.
    pub fn enter_costs(&mut self, inputs: CostInputs) -> Result<()> {
        self.ensure("enter costs", &COST_STAGES)?;
        let context = self.context_mut("enter costs")?;
        if context.cost_mode() != Some(CostMode::Custom) {
            return Err(AppError::Validation(
                "costs can only be entered in custom mode".into(),
            ));
        }
        inputs.validate()?;
        context.choose_cost_mode(CostMode::Custom);
        context.set_cost_inputs(inputs);
        self.advance(Stage::CostModeChosen);
        Ok(())
    }

    /// Runs the profit calculation for the chosen crop and cost mode.
    ///
    /// In custom mode `costs` overrides previously entered inputs; in default mode it is
    /// ignored.
    pub async fn compute_analysis(&mut self, costs: Option<CostInputs>) -> Result<&AnalysisResult> {
        self.ensure("compute the analysis", &COST_STAGES)?;
        let context = self.context_mut("compute the analysis")?;
        let crop = context
            .chosen_crop()
            .map(str::to_string)
            .ok_or_else(|| AppError::Validation("choose a crop first".into()))?;
        let mode = context.cost_mode().unwrap_or(CostMode::Default);

        let custom = match mode {
            CostMode::Default => {
                if costs.is_some() {
                    debug!("Ignoring cost inputs in default mode");
                }
                None
            }
            CostMode::Custom => {
                let inputs = costs
                    .or_else(|| context.cost_inputs().copied())
                    .ok_or_else(|| {
                        AppError::Validation(
                            "enter labor, seed and fertilizer costs first".into(),
                        )
                    })?;
                inputs.validate()?;
                Some(inputs)
            }
        };

        let timeout = self.config.timeout;
        let analysis = match &custom {
            Some(inputs) => {
                deadline::compute(
                    timeout,
                    "calculate-own-profit",
                    self.service.calculate_profit(&crop, inputs),
                )
                .await
            }
            None => {
                deadline::compute(
                    timeout,
                    "calculate-default-profit",
                    self.service.calculate_default_profit(&crop),
                )
                .await
            }
        }
        .inspect_err(|e| warn!("Profit analysis for {} failed: {}", crop, e))?;

        if !analysis.profit_analysis.crop.eq_ignore_ascii_case(&crop) {
            warn!(
                "Analysis returned crop {:?} for chosen crop {:?}",
                analysis.profit_analysis.crop, crop
            );
        }
        info!(
            "Analysis for {}: profit {}",
            crop, analysis.profit_analysis.profit.total_profit
        );

        let context = self.context_mut("compute the analysis")?;
        if let Some(inputs) = custom {
            context.set_cost_inputs(inputs);
        }
        context.set_analysis(analysis);
        self.advance(Stage::AnalysisComputed);

        self.context_mut("compute the analysis")?
            .analysis()
            .ok_or_else(|| AppError::NotFound("analysis".into()))
    }

    /// Saves the prediction, fetches the insight report and saves it against the same farm.
    pub async fn persist_and_report(&mut self) -> Result<ReportOutcome> {
        self.ensure("save the prediction", &PERSIST_STAGES)?;
        let user = require_user(self.auth.as_ref(), "save predictions").await?;
        let mut warnings = Vec::new();

        let farm_id = self.resolve_farm(&user, &mut warnings).await;

        let context = self.context_mut("save the prediction")?;
        let mut prediction_id = context.prediction_id().map(str::to_string);
        let report_context = context.report_context();

        match (farm_id.as_deref(), prediction_id.clone()) {
            (None, _) => {
                let e = AppError::Persistence(
                    "no farm recorded for this workflow; prediction and report were not saved"
                        .into(),
                );
                warn!("{}", e);
                warnings.push(e);
            }
            (Some(_), Some(id)) => debug!("Prediction {} already saved", id),
            (Some(farm_id), None) => {
                let row = self.new_prediction(&user, farm_id)?;
                match deadline::persist(
                    self.config.timeout,
                    "prediction insert",
                    self.store.insert_prediction(&user, row),
                )
                .await
                {
                    Ok(prediction) => {
                        info!("Saved prediction {} for farm {}", prediction.id, farm_id);
                        self.context_mut("save the prediction")?
                            .set_prediction_id(prediction.id.clone());
                        prediction_id = Some(prediction.id);
                        self.advance(Stage::Persisted);
                    }
                    Err(e) => {
                        warn!("Failed to save prediction: {}", e);
                        warnings.push(e);
                    }
                }
            }
        }

        let fetched = self.pipeline.fetch_and_normalize().await?;

        if let Some(farm_id) = &farm_id {
            if let Err(e) = self
                .pipeline
                .persist(&user, farm_id, &fetched.payload, &report_context)
                .await
            {
                warn!("Failed to save insight report: {}", e);
                warnings.push(e);
            }
        }

        self.context_mut("save the prediction")?
            .set_report(fetched.report.clone());
        self.advance(Stage::ReportReady);

        Ok(ReportOutcome {
            report: fetched.report,
            payload: fetched.payload,
            farm_id,
            prediction_id,
            warnings,
        })
    }

    /// Carried farm id, then a fresh insert from the context, then (opt-in) the newest farm.
    async fn resolve_farm(&mut self, user: &AuthUser, warnings: &mut Vec<AppError>) -> Option<String> {
        let context = self.context.as_ref()?;
        if let Some(id) = context.farm_id() {
            let owner = self
                .recorded_farm
                .as_ref()
                .filter(|farm| farm.id == id)
                .map(|farm| farm.user_id.as_str());
            if owner.is_none_or(|owner| owner == user.id) {
                return Some(id.to_string());
            }
            warn!("Farm {} belongs to another user; recording a new one", id);
        }

        let county = context.county().to_string();
        let farm_size = context.farm_size();
        match self.insert_farm(user, &county, farm_size).await {
            Ok(id) => {
                if let Some(context) = self.context.as_mut() {
                    context.set_farm_id(Some(id.clone()));
                }
                return Some(id);
            }
            Err(e) => {
                warn!("Failed to record farm for {}: {}", county, e);
                warnings.push(e);
            }
        }

        if !self.config.latest_farm_fallback {
            return None;
        }
        match deadline::persist(
            self.config.timeout,
            "latest farm lookup",
            self.store.latest_farm(user),
        )
        .await
        {
            Ok(Some(farm)) => {
                warn!(
                    "Referencing newest farm {} for {}; latest_farm_fallback is deprecated",
                    farm.id, user.id
                );
                Some(farm.id)
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Latest farm lookup failed: {}", e);
                warnings.push(e);
                None
            }
        }
    }

    fn new_prediction(&self, user: &AuthUser, farm_id: &str) -> Result<NewPrediction> {
        let context = self.context.as_ref().ok_or(AppError::OutOfOrder {
            action: "save the prediction",
            stage: self.stage.to_string(),
        })?;
        let analysis = context
            .analysis()
            .ok_or_else(|| AppError::Validation("compute the analysis first".into()))?;
        let forecast = context.chosen_forecast();
        let profit = &analysis.profit_analysis;

        Ok(NewPrediction {
            farm_id: farm_id.to_string(),
            user_id: user.id.clone(),
            crop: context
                .chosen_crop()
                .unwrap_or(&profit.crop)
                .to_string(),
            predicted_yield: profit
                .predicted_yield
                .or_else(|| forecast.map(|f| f.prediction_in_acres)),
            input_summary: context.input_summary(),
            market_price: profit
                .market_price
                .or_else(|| forecast.and_then(|f| f.market_price)),
            profit_margin: profit.profit_margin,
        })
    }
}
