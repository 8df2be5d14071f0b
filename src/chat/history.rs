//! Decoding of the persisted chat log and of assistant replies.
//!
//! The `chats` column has been written by several client versions. Accepted shapes, in the
//! order they are tried:
//!
//! 1. a JSON array of pair objects;
//! 2. a string holding a JSON-encoded array (older clients stringified before writing);
//! 3. `null` or a missing row, read as an empty log.
//!
//! Inside the array a pair may be an object or a string holding an encoded object. Field
//! names are matched against [`REQUEST_FIELDS`] / [`RESPONSE_FIELDS`] in order.

use crate::error::{AppError, Result};
use crate::model::ChatPair;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

pub const REQUEST_FIELDS: [&str; 5] = [
    "request",
    "Request",
    "RequestText",
    "requestText",
    "request_text",
];
pub const RESPONSE_FIELDS: [&str; 5] = [
    "response",
    "Response",
    "ResponseText",
    "responseText",
    "response_text",
];

pub const NO_REPLY: &str = "No response";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptEntry {
    /// Stable for the lifetime of one rendered transcript.
    pub key: String,
    pub role: Role,
    pub content: String,
}

/// Hands out transcript keys: a random per-load seed plus a counter.
#[derive(Debug, Clone)]
pub struct KeyGen {
    seed: u32,
    next: u64,
}

impl KeyGen {
    pub fn random() -> Self {
        Self {
            seed: uuid::Uuid::new_v4().as_u128() as u32,
            next: 0,
        }
    }

    pub fn entry(&mut self, role: Role, content: impl Into<String>) -> TranscriptEntry {
        let prefix = match role {
            Role::User => 'u',
            Role::Assistant => 'a',
        };
        let key = format!("{}-{:08x}-{}", prefix, self.seed, self.next);
        self.next += 1;
        TranscriptEntry {
            key,
            role,
            content: content.into(),
        }
    }
}

/// The raw elements of a stored log, in stored order.
pub fn log_entries(chats: &Value) -> Vec<Value> {
    match chats {
        Value::Null => Vec::new(),
        Value::Array(items) => items.clone(),
        Value::String(text) if text.trim().is_empty() => Vec::new(),
        Value::String(text) => match serde_json::from_str::<Value>(text) {
            Ok(Value::Array(items)) => items,
            Ok(other) => {
                warn!("Chat log string does not hold an array: {}", other);
                Vec::new()
            }
            Err(e) => {
                warn!("Unreadable chat log string: {}", e);
                Vec::new()
            }
        },
        other => {
            warn!("Unexpected chat log shape: {}", other);
            Vec::new()
        }
    }
}

fn text_field(obj: &Map<String, Value>, names: &[&str]) -> String {
    names
        .iter()
        .find_map(|name| match obj.get(*name) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        })
        .unwrap_or_default()
}

/// One stored element as a pair, or `None` when it is not readable.
pub fn decode_pair(entry: &Value) -> Option<ChatPair> {
    match entry {
        Value::Object(obj) => Some(ChatPair {
            request: text_field(obj, &REQUEST_FIELDS),
            response: text_field(obj, &RESPONSE_FIELDS),
        }),
        Value::String(text) => match serde_json::from_str::<Value>(text) {
            Ok(inner @ Value::Object(_)) => decode_pair(&inner),
            _ => None,
        },
        _ => None,
    }
}

pub fn pairs(chats: &Value) -> Vec<ChatPair> {
    log_entries(chats)
        .iter()
        .filter_map(|entry| {
            let pair = decode_pair(entry);
            if pair.is_none() {
                warn!("Skipping unreadable chat log entry: {}", entry);
            }
            pair
        })
        .collect()
}

/// User-then-assistant entries for each pair; empty halves are not rendered.
pub fn flatten(pairs: &[ChatPair], keys: &mut KeyGen) -> Vec<TranscriptEntry> {
    let mut out = Vec::with_capacity(pairs.len() * 2);
    for pair in pairs {
        if !pair.request.is_empty() {
            out.push(keys.entry(Role::User, pair.request.as_str()));
        }
        if !pair.response.is_empty() {
            out.push(keys.entry(Role::Assistant, pair.response.as_str()));
        }
    }
    out
}

/// The stored log with `pair` appended. Existing elements are written back untouched.
///
/// A log that is not an array, an encoded array or empty is refused rather than replaced.
pub fn appended(chats: &Value, pair: &ChatPair) -> Result<Value> {
    let mut items = match chats {
        Value::Null => Vec::new(),
        Value::Array(items) => items.clone(),
        Value::String(text) if text.trim().is_empty() => Vec::new(),
        Value::String(text) => match serde_json::from_str::<Value>(text) {
            Ok(Value::Array(items)) => items,
            _ => {
                return Err(AppError::Persistence(
                    "stored chat log is not a readable list; not overwriting it".into(),
                ));
            }
        },
        _ => {
            return Err(AppError::Persistence(
                "stored chat log is not a list; not overwriting it".into(),
            ));
        }
    };
    items.push(serde_json::json!(pair));
    Ok(Value::Array(items))
}

/// Display text of an assistant payload: `reply`, then `message`, then a bare string,
/// then the whole payload serialized.
pub fn extract_reply(payload: &Value) -> String {
    let field = |name: &str| match payload.get(name) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        _ => None,
    };

    let text = field("reply")
        .or_else(|| field("message"))
        .or_else(|| payload.as_str().map(String::from))
        .unwrap_or_else(|| match payload {
            Value::Null => String::new(),
            other => other.to_string(),
        });

    if text.trim().is_empty() {
        NO_REPLY.to_string()
    } else {
        text
    }
}
