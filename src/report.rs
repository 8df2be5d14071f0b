use crate::auth::AuthUser;
use crate::deadline;
use crate::error::Result;
use crate::model::{AiChatMessage, NewAiChat};
use crate::service::PredictionService;
use crate::store::RemoteStore;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const WRAPPER_KEYS: [&str; 2] = ["Insights", "insights"];
const REPORT_FIELDS: [&str; 7] = [
    "insight",
    "recommendations",
    "warnings",
    "market_trends",
    "best_practices",
    "roi_info",
    "notes",
];

/// Normalized AI insight report. Every section is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InsightReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insight: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub recommendations: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_trends: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub best_practices: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roi_info: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SectionBody {
    Text(String),
    List(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportSection {
    pub title: &'static str,
    pub body: SectionBody,
}

/// Where the report object sits inside an insight payload.
///
/// Classification order: two wrapper levels, one wrapper level, a bare report object, a
/// bare string, and finally the raw payload read as a report as-is.
#[derive(Debug, PartialEq)]
pub enum InsightShape<'a> {
    DoubleWrapped(&'a Map<String, Value>),
    Wrapped(&'a Map<String, Value>),
    Bare(&'a Map<String, Value>),
    Text(&'a str),
    Raw(&'a Value),
}

fn unwrap_once(value: &Value) -> Option<&Value> {
    WRAPPER_KEYS.iter().find_map(|k| value.get(*k))
}

impl<'a> InsightShape<'a> {
    pub fn classify(payload: &'a Value) -> Self {
        if let Some(outer) = unwrap_once(payload) {
            if let Some(inner) = unwrap_once(outer) {
                match inner {
                    Value::Object(map) => return Self::DoubleWrapped(map),
                    Value::String(text) => return Self::Text(text),
                    _ => {}
                }
            }
            match outer {
                Value::Object(map) => return Self::Wrapped(map),
                Value::String(text) => return Self::Text(text),
                _ => {}
            }
        }

        match payload {
            Value::Object(map) if REPORT_FIELDS.iter().any(|f| map.contains_key(*f)) => {
                Self::Bare(map)
            }
            Value::String(text) => Self::Text(text),
            other => Self::Raw(other),
        }
    }

    pub fn into_report(self) -> InsightReport {
        match self {
            Self::DoubleWrapped(map) | Self::Wrapped(map) | Self::Bare(map) => {
                InsightReport::from_fields(map)
            }
            Self::Text(text) => InsightReport {
                insight: non_blank(text),
                ..Default::default()
            },
            Self::Raw(Value::Object(map)) => InsightReport::from_fields(map),
            Self::Raw(_) => InsightReport::default(),
        }
    }
}

fn non_blank(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn text(map: &Map<String, Value>, key: &str) -> Option<String> {
    match map.get(key)? {
        Value::Null => None,
        Value::String(s) => non_blank(s),
        other => Some(other.to_string()),
    }
}

fn list(map: &Map<String, Value>, key: &str) -> Vec<String> {
    match map.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::Null => None,
                Value::String(s) => non_blank(s),
                other => Some(other.to_string()),
            })
            .collect(),
        Some(Value::String(s)) => non_blank(s).into_iter().collect(),
        _ => Vec::new(),
    }
}

impl InsightReport {
    fn from_fields(map: &Map<String, Value>) -> Self {
        Self {
            insight: text(map, "insight"),
            recommendations: list(map, "recommendations"),
            warnings: list(map, "warnings"),
            market_trends: text(map, "market_trends"),
            best_practices: list(map, "best_practices"),
            roi_info: text(map, "roi_info"),
            notes: text(map, "notes"),
        }
    }

    pub fn normalize(payload: &Value) -> Self {
        let shape = InsightShape::classify(payload);
        debug!("Insight payload shape: {:?}", shape);
        shape.into_report()
    }

    /// Decodes a stored `ai_chats.message`: JSON when it parses, plain insight text otherwise.
    pub fn from_stored(message: &str) -> Self {
        match serde_json::from_str::<Value>(message) {
            Ok(payload) => Self::normalize(&payload),
            Err(_) => Self {
                insight: non_blank(message),
                ..Default::default()
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sections().is_empty()
    }

    /// Present sections in display order.
    pub fn sections(&self) -> Vec<ReportSection> {
        let text = |title: &'static str, value: &Option<String>| {
            value.as_ref().map(|v| ReportSection {
                title,
                body: SectionBody::Text(v.clone()),
            })
        };
        let list = |title: &'static str, items: &Vec<String>| {
            (!items.is_empty()).then(|| ReportSection {
                title,
                body: SectionBody::List(items.clone()),
            })
        };

        [
            text("Key Insight", &self.insight),
            list("Recommendations", &self.recommendations),
            list("Important Cautions", &self.warnings),
            text("Market Trends", &self.market_trends),
            list("Best Practices", &self.best_practices),
            text("ROI Information", &self.roi_info),
            text("Additional Notes", &self.notes),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

/// An insight as fetched: the raw payload (what gets stored) and its normalized form.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedInsight {
    pub payload: Value,
    pub report: InsightReport,
}

pub struct ReportPipeline {
    service: Arc<dyn PredictionService>,
    store: Arc<dyn RemoteStore>,
    timeout: Duration,
}

impl ReportPipeline {
    pub fn new(
        service: Arc<dyn PredictionService>,
        store: Arc<dyn RemoteStore>,
        timeout: Duration,
    ) -> Self {
        Self {
            service,
            store,
            timeout,
        }
    }

    pub async fn fetch_and_normalize(&self) -> Result<FetchedInsight> {
        let payload =
            deadline::compute(self.timeout, "insight", self.service.fetch_insight()).await?;
        let report = InsightReport::normalize(&payload);
        info!(
            "Insight report received ({} sections)",
            report.sections().len()
        );
        Ok(FetchedInsight { payload, report })
    }

    /// Writes the `ai_chats` row for a generated report.
    pub async fn persist(
        &self,
        user: &AuthUser,
        farm_id: &str,
        payload: &Value,
        context: &Value,
    ) -> Result<AiChatMessage> {
        let message = NewAiChat {
            user_id: user.id.clone(),
            farm_id: farm_id.to_string(),
            message: payload.to_string(),
            context: context.to_string(),
        };
        deadline::persist(
            self.timeout,
            "insight report insert",
            self.store.insert_ai_chat(user, message),
        )
        .await
    }
}
