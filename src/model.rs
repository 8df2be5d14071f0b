//! Rows of the remote relational store.
//!
//! Every row id is carried as a `String`. PostgREST may hand back `int8` or `uuid` keys, so
//! ids decode from either a JSON number or a JSON string.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub const FARMS: &str = "farms";
pub const PREDICTIONS: &str = "predictions";
pub const AI_CHATS: &str = "ai_chats";
pub const CHATBOT: &str = "chatbot";
pub const USERS: &str = "users";

pub(crate) fn de_id<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    match Value::deserialize(d)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {}",
            other
        ))),
    }
}

fn de_opt_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Farm {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    pub county: String,
    pub farm_size: f64,
    #[serde(deserialize_with = "de_id")]
    pub user_id: String,
    #[serde(default)]
    pub date_generated: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewFarm {
    pub county: String,
    pub farm_size: f64,
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(deserialize_with = "de_id")]
    pub farm_id: String,
    #[serde(deserialize_with = "de_id")]
    pub user_id: String,
    pub crop: String,
    #[serde(default)]
    pub predicted_yield: Option<f64>,
    #[serde(default)]
    pub input_summary: Value,
    #[serde(default)]
    pub market_price: Option<f64>,
    #[serde(default)]
    pub profit_margin: Option<f64>,
    #[serde(default)]
    pub date_generated: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewPrediction {
    pub farm_id: String,
    pub user_id: String,
    pub crop: String,
    pub predicted_yield: Option<f64>,
    pub input_summary: Value,
    pub market_price: Option<f64>,
    pub profit_margin: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiChatMessage {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(deserialize_with = "de_id")]
    pub user_id: String,
    #[serde(deserialize_with = "de_id")]
    pub farm_id: String,
    /// Opaque insight payload, usually JSON text.
    #[serde(default, deserialize_with = "de_opt_text")]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub context: Option<String>,
    #[serde(default)]
    pub date_generated: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewAiChat {
    pub user_id: String,
    pub farm_id: String,
    pub message: String,
    pub context: String,
}

/// One row per user; `chats` is the append-only array of request/response pairs.
///
/// `chats` is kept as raw JSON so entries written in older shapes survive a rewrite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRow {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(default)]
    pub chats: Value,
}

/// One request/response exchange, the canonical shape of a chat log element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatPair {
    pub request: String,
    pub response: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    pub name: String,
    pub email: String,
}
