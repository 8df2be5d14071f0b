use crate::auth::{AuthSession, AuthUser, require_user};
use crate::chat::history::{self, KeyGen, Role, TranscriptEntry};
use crate::deadline;
use crate::error::{AppError, Result};
use crate::model::{ChatPair, ChatRow};
use crate::service::PredictionService;
use crate::store::RemoteStore;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

pub const FAILED_REPLY: &str = "⚠️ Failed to reach the assistant. Please try again.";

/// Result of a successful send.
#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub reply: String,
    /// Set when the exchange was shown but could not be saved to the chat log.
    pub persist_error: Option<AppError>,
}

struct ChatState {
    transcript: Vec<TranscriptEntry>,
    /// Last row read or written; supplies the history sent with each request.
    row: Option<ChatRow>,
    keys: KeyGen,
}

/// Advisory chat backed by the per-user append-only log in the `chatbot` table.
///
/// Sends on one session are single-flight: a second `send` waits for the first to finish
/// its read-modify-write of the log, so neither append is lost. Two sessions for the same
/// user are not coordinated.
pub struct ChatSession {
    store: Arc<dyn RemoteStore>,
    service: Arc<dyn PredictionService>,
    auth: Arc<dyn AuthSession>,
    timeout: Duration,
    state: RwLock<ChatState>,
    send_lock: Mutex<()>,
    alive: Arc<AtomicBool>,
}

impl ChatSession {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        service: Arc<dyn PredictionService>,
        auth: Arc<dyn AuthSession>,
        timeout: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            service,
            auth,
            timeout,
            state: RwLock::new(ChatState {
                transcript: Vec::new(),
                row: None,
                keys: KeyGen::random(),
            }),
            send_lock: Mutex::new(()),
            alive: Arc::new(AtomicBool::new(true)),
        })
    }

    pub async fn transcript(&self) -> Vec<TranscriptEntry> {
        self.state.read().await.transcript.clone()
    }

    pub fn is_open(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Stops transcript updates; replies still in flight are persisted but not shown.
    pub fn close(&self) {
        self.alive.store(false, Ordering::SeqCst);
        debug!("Chat session closed");
    }

    /// Replaces the transcript with the persisted log. Waits for a send in flight.
    pub async fn load(&self) -> Result<Vec<TranscriptEntry>> {
        let _flight = self.send_lock.lock().await;
        let alive = self.alive.clone();

        let Some(user) = self.auth.current_user().await else {
            if alive.load(Ordering::SeqCst) {
                let mut state = self.state.write().await;
                state.transcript.clear();
                state.row = None;
            }
            return Ok(Vec::new());
        };

        let row = deadline::persist(self.timeout, "chat history", self.store.chat_row(&user))
            .await?;

        let pairs = row
            .as_ref()
            .map(|r| history::pairs(&r.chats))
            .unwrap_or_default();
        let mut keys = KeyGen::random();
        let transcript = history::flatten(&pairs, &mut keys);
        info!(
            "Loaded {} chat exchanges for {}",
            pairs.len(),
            user.id
        );

        if alive.load(Ordering::SeqCst) {
            let mut state = self.state.write().await;
            state.transcript = transcript.clone();
            state.row = row;
            state.keys = keys;
        }
        Ok(transcript)
    }

    pub async fn send(&self, text: &str) -> Result<SentMessage> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::Validation("message is empty".into()));
        }
        let user = require_user(self.auth.as_ref(), "chat").await?;

        let _flight = self.send_lock.lock().await;
        let alive = self.alive.clone();

        // Shown before the assistant answers; never retracted.
        let history = {
            let mut state = self.state.write().await;
            if alive.load(Ordering::SeqCst) {
                let entry = state.keys.entry(Role::User, text);
                state.transcript.push(entry);
            }
            state
                .row
                .as_ref()
                .map(|r| history::pairs(&r.chats))
                .unwrap_or_default()
        };

        let payload = match deadline::compute(
            self.timeout,
            "ai-chat",
            self.service.chat(text, &history),
        )
        .await
        {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Chat request failed: {}", e);
                self.push_if_alive(&alive, Role::Assistant, FAILED_REPLY)
                    .await;
                return Err(e);
            }
        };
        let reply = history::extract_reply(&payload);

        let pair = ChatPair {
            request: text.to_string(),
            response: reply.clone(),
        };
        let persist_error = match self.append_to_log(&user, &pair).await {
            Ok(row) => {
                if alive.load(Ordering::SeqCst) {
                    self.state.write().await.row = Some(row);
                }
                None
            }
            Err(e) => {
                warn!("Failed to save chat exchange: {}", e);
                Some(e)
            }
        };

        self.push_if_alive(&alive, Role::Assistant, &reply).await;
        Ok(SentMessage {
            reply,
            persist_error,
        })
    }

    async fn push_if_alive(&self, alive: &AtomicBool, role: Role, content: &str) {
        if !alive.load(Ordering::SeqCst) {
            debug!("Dropping late chat update for closed session");
            return;
        }
        let mut state = self.state.write().await;
        let entry = state.keys.entry(role, content);
        state.transcript.push(entry);
    }

    /// Read-modify-write of the whole log: fresh read, append, overwrite.
    async fn append_to_log(&self, user: &AuthUser, pair: &ChatPair) -> Result<ChatRow> {
        let existing =
            deadline::persist(self.timeout, "chat history", self.store.chat_row(user)).await?;

        match existing {
            Some(row) => {
                let chats = history::appended(&row.chats, pair)?;
                deadline::persist(
                    self.timeout,
                    "chat log update",
                    self.store.update_chat_row(user, chats),
                )
                .await
            }
            None => {
                deadline::persist(
                    self.timeout,
                    "chat log insert",
                    self.store.insert_chat_row(user, json!([pair])),
                )
                .await
            }
        }
    }
}
