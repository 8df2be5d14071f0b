#![allow(dead_code)]

use async_trait::async_trait;
use indexmap::IndexMap;
use mkulima::auth::{AuthSession, AuthUser, SessionStore};
use mkulima::error::{AppError, Result};
use mkulima::model::{
    AiChatMessage, ChatPair, ChatRow, Farm, NewAiChat, NewFarm, NewPrediction, Prediction,
    UserProfile,
};
use mkulima::service::{
    AnalysisResult, CostInputs, CropForecast, PredictionService, ProfitAnalysis, ProfitTotals,
    YieldForecast,
};
use mkulima::store::RemoteStore;
use mkulima::workflow::{WorkflowConfig, WorkflowOrchestrator};
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

pub const USER: &str = "farmer-1";

pub fn signed_in() -> Arc<SessionStore> {
    SessionStore::new(Some(AuthUser::local(USER)))
}

pub fn signed_out() -> Arc<SessionStore> {
    SessionStore::new(None)
}

pub fn orchestrator(
    service: &Arc<FakeService>,
    store: &Arc<MemoryStore>,
    auth: Arc<dyn AuthSession>,
) -> WorkflowOrchestrator {
    WorkflowOrchestrator::new(
        service.clone(),
        store.clone(),
        auth,
        WorkflowConfig::default(),
    )
}

/// In-memory tables with per-table outage switches.
#[derive(Default)]
pub struct MemoryStore {
    pub farms: Mutex<Vec<Farm>>,
    pub predictions: Mutex<Vec<Prediction>>,
    pub ai_chats: Mutex<Vec<AiChatMessage>>,
    pub chats: Mutex<HashMap<String, Value>>,
    pub users: Mutex<Vec<UserProfile>>,
    next_id: AtomicU64,
    /// Fails farm inserts only; the newest-farm read keeps working.
    pub fail_farms: AtomicBool,
    pub fail_predictions: AtomicBool,
    pub fail_ai_chats: AtomicBool,
    pub fail_chats: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn outage(&self, on: bool) {
        for flag in [
            &self.fail_farms,
            &self.fail_predictions,
            &self.fail_ai_chats,
            &self.fail_chats,
        ] {
            flag.store(on, Ordering::SeqCst);
        }
    }

    pub fn farm_count(&self) -> usize {
        self.farms.lock().unwrap().len()
    }

    pub fn prediction_rows(&self) -> Vec<Prediction> {
        self.predictions.lock().unwrap().clone()
    }

    pub fn ai_chat_rows(&self) -> Vec<AiChatMessage> {
        self.ai_chats.lock().unwrap().clone()
    }

    pub fn seed_chats(&self, user: &str, chats: Value) {
        self.chats.lock().unwrap().insert(user.to_string(), chats);
    }

    pub fn stored_chats(&self, user: &str) -> Option<Value> {
        self.chats.lock().unwrap().get(user).cloned()
    }

    fn next(&self) -> (String, String) {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        (n.to_string(), format!("2025-10-01T08:00:{:02}.000000Z", n))
    }

    fn check(flag: &AtomicBool, table: &str) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            Err(AppError::Persistence(format!("{} unavailable", table)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn insert_farm(&self, _user: &AuthUser, farm: NewFarm) -> Result<Farm> {
        Self::check(&self.fail_farms, "farms")?;
        let (id, date) = self.next();
        let row = Farm {
            id,
            county: farm.county,
            farm_size: farm.farm_size,
            user_id: farm.user_id,
            date_generated: Some(date),
        };
        self.farms.lock().unwrap().push(row.clone());
        Ok(row)
    }

    async fn latest_farm(&self, user: &AuthUser) -> Result<Option<Farm>> {
        Ok(self
            .farms
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|f| f.user_id == user.id)
            .cloned())
    }

    async fn insert_prediction(
        &self,
        _user: &AuthUser,
        prediction: NewPrediction,
    ) -> Result<Prediction> {
        Self::check(&self.fail_predictions, "predictions")?;
        let (id, date) = self.next();
        let row = Prediction {
            id,
            farm_id: prediction.farm_id,
            user_id: prediction.user_id,
            crop: prediction.crop,
            predicted_yield: prediction.predicted_yield,
            input_summary: prediction.input_summary,
            market_price: prediction.market_price,
            profit_margin: prediction.profit_margin,
            date_generated: Some(date),
        };
        self.predictions.lock().unwrap().push(row.clone());
        Ok(row)
    }

    async fn list_predictions(&self, user: Option<&AuthUser>) -> Result<Vec<Prediction>> {
        Self::check(&self.fail_predictions, "predictions")?;
        Ok(self
            .predictions
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|p| user.is_none_or(|u| u.id == p.user_id))
            .cloned()
            .collect())
    }

    async fn count_predictions(&self, user: &AuthUser) -> Result<u64> {
        Self::check(&self.fail_predictions, "predictions")?;
        Ok(self
            .predictions
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.user_id == user.id)
            .count() as u64)
    }

    async fn insert_ai_chat(&self, _user: &AuthUser, message: NewAiChat) -> Result<AiChatMessage> {
        Self::check(&self.fail_ai_chats, "ai_chats")?;
        let (id, date) = self.next();
        let row = AiChatMessage {
            id,
            user_id: message.user_id,
            farm_id: message.farm_id,
            message: Some(message.message),
            context: Some(message.context),
            date_generated: Some(date),
        };
        self.ai_chats.lock().unwrap().push(row.clone());
        Ok(row)
    }

    async fn ai_chats_for_farm(
        &self,
        user: Option<&AuthUser>,
        farm_id: &str,
    ) -> Result<Vec<AiChatMessage>> {
        Self::check(&self.fail_ai_chats, "ai_chats")?;
        Ok(self
            .ai_chats
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|m| m.farm_id == farm_id && user.is_none_or(|u| u.id == m.user_id))
            .cloned()
            .collect())
    }

    async fn chat_row(&self, user: &AuthUser) -> Result<Option<ChatRow>> {
        Self::check(&self.fail_chats, "chatbot")?;
        Ok(self.stored_chats(&user.id).map(|chats| ChatRow {
            id: user.id.clone(),
            chats,
        }))
    }

    async fn insert_chat_row(&self, user: &AuthUser, chats: Value) -> Result<ChatRow> {
        Self::check(&self.fail_chats, "chatbot")?;
        let mut rows = self.chats.lock().unwrap();
        if rows.contains_key(&user.id) {
            return Err(AppError::Persistence(
                "duplicate key value violates unique constraint \"chatbot_pkey\"".into(),
            ));
        }
        rows.insert(user.id.clone(), chats.clone());
        Ok(ChatRow {
            id: user.id.clone(),
            chats,
        })
    }

    async fn update_chat_row(&self, user: &AuthUser, chats: Value) -> Result<ChatRow> {
        Self::check(&self.fail_chats, "chatbot")?;
        let mut rows = self.chats.lock().unwrap();
        let Some(slot) = rows.get_mut(&user.id) else {
            return Err(AppError::Persistence("no chat row to update".into()));
        };
        *slot = chats.clone();
        Ok(ChatRow {
            id: user.id.clone(),
            chats,
        })
    }

    async fn insert_user(&self, _user: &AuthUser, profile: UserProfile) -> Result<UserProfile> {
        self.users.lock().unwrap().push(profile.clone());
        Ok(profile)
    }
}

/// Compute API double. Makueni grows maize and beans; every other county gets no crops.
#[derive(Default)]
pub struct FakeService {
    pub predict_calls: AtomicUsize,
    pub profit_calls: AtomicUsize,
    pub insight_calls: AtomicUsize,
    pub chat_calls: AtomicUsize,
    pub fail_predict: AtomicBool,
    pub fail_profit: AtomicBool,
    pub fail_insight: AtomicBool,
    pub fail_chat: AtomicBool,
    pub delay: Mutex<Option<Duration>>,
    pub insight: Mutex<Option<Value>>,
    pub chat_histories: Mutex<Vec<Vec<ChatPair>>>,
}

impl FakeService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn calls(&self) -> usize {
        [
            &self.predict_calls,
            &self.profit_calls,
            &self.insight_calls,
            &self.chat_calls,
        ]
        .iter()
        .map(|c| c.load(Ordering::SeqCst))
        .sum()
    }

    async fn pause(&self) {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn outcome(flag: &AtomicBool) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            Err(AppError::Network("HTTP 503: backend unavailable".into()))
        } else {
            Ok(())
        }
    }

    fn analysis(crop: &str, total_cost: f64) -> AnalysisResult {
        let total_revenue = 6000.0;
        let total_profit = total_revenue - total_cost;
        AnalysisResult {
            profit_analysis: ProfitAnalysis {
                crop: crop.to_string(),
                predicted_yield: Some(1.2),
                market_price: Some(5000.0),
                profit_margin: Some(total_profit / total_revenue * 100.0),
                profit: ProfitTotals {
                    total_revenue,
                    total_cost,
                    total_profit,
                    extra: Map::new(),
                },
            },
            latest: Some(json!({"county": "Makueni", "farm_size": 2.0})),
            raw: Value::Null,
        }
    }
}

#[async_trait]
impl PredictionService for FakeService {
    async fn predict_yield(&self, county: &str, farm_size: f64) -> Result<YieldForecast> {
        self.predict_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        Self::outcome(&self.fail_predict)?;

        let mut predictions = IndexMap::new();
        if county == "Makueni" {
            predictions.insert(
                "maize".to_string(),
                CropForecast {
                    prediction_in_acres: 1.2,
                    market_price: Some(5000.0),
                },
            );
            predictions.insert(
                "beans".to_string(),
                CropForecast {
                    prediction_in_acres: 0.8,
                    market_price: Some(9000.0),
                },
            );
        }
        Ok(YieldForecast {
            county: county.to_string(),
            farm_size,
            predictions,
            input_data: Some(json!({"rainfall": 650.0})),
        })
    }

    async fn calculate_profit(&self, crop: &str, costs: &CostInputs) -> Result<AnalysisResult> {
        self.profit_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        Self::outcome(&self.fail_profit)?;
        Ok(Self::analysis(
            crop,
            costs.labor + costs.seed + costs.fertilizer,
        ))
    }

    async fn calculate_default_profit(&self, crop: &str) -> Result<AnalysisResult> {
        self.profit_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        Self::outcome(&self.fail_profit)?;
        Ok(Self::analysis(crop, 3500.0))
    }

    async fn chat(&self, message: &str, history: &[ChatPair]) -> Result<Value> {
        self.chat_calls.fetch_add(1, Ordering::SeqCst);
        self.chat_histories.lock().unwrap().push(history.to_vec());
        self.pause().await;
        Self::outcome(&self.fail_chat)?;
        Ok(json!({ "reply": format!("Re: {}", message) }))
    }

    async fn fetch_insight(&self) -> Result<Value> {
        self.insight_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        Self::outcome(&self.fail_insight)?;
        let custom = self.insight.lock().unwrap().clone();
        Ok(custom.unwrap_or_else(|| {
            json!({"Insights": {"Insights": {
                "insight": "Maize suits Makueni this season.",
                "recommendations": ["Plant at the onset of the short rains"],
                "warnings": ["Fall armyworm pressure is high"]
            }}})
        }))
    }

    async fn list_crops(&self) -> Result<Vec<String>> {
        Ok(vec!["beans".into(), "maize".into()])
    }
}
