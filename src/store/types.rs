use crate::auth::AuthUser;
use crate::error::Result;
use crate::model::{
    AiChatMessage, ChatRow, Farm, NewAiChat, NewFarm, NewPrediction, Prediction, UserProfile,
};
use async_trait::async_trait;
use serde_json::Value;

/// Row-level access to the relational store. Every call is scoped to the given user.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn insert_farm(&self, user: &AuthUser, farm: NewFarm) -> Result<Farm>;

    /// Newest farm row of the user. Only for the opt-in legacy fallback; callers carry ids.
    async fn latest_farm(&self, user: &AuthUser) -> Result<Option<Farm>>;

    async fn insert_prediction(&self, user: &AuthUser, prediction: NewPrediction)
    -> Result<Prediction>;

    /// Newest first. Without a user the store's own visibility rules apply.
    async fn list_predictions(&self, user: Option<&AuthUser>) -> Result<Vec<Prediction>>;

    async fn count_predictions(&self, user: &AuthUser) -> Result<u64>;

    async fn insert_ai_chat(&self, user: &AuthUser, message: NewAiChat) -> Result<AiChatMessage>;

    /// Newest first.
    async fn ai_chats_for_farm(
        &self,
        user: Option<&AuthUser>,
        farm_id: &str,
    ) -> Result<Vec<AiChatMessage>>;

    async fn chat_row(&self, user: &AuthUser) -> Result<Option<ChatRow>>;

    async fn insert_chat_row(&self, user: &AuthUser, chats: Value) -> Result<ChatRow>;

    /// Overwrites the whole `chats` column.
    async fn update_chat_row(&self, user: &AuthUser, chats: Value) -> Result<ChatRow>;

    async fn insert_user(&self, user: &AuthUser, profile: UserProfile) -> Result<UserProfile>;
}
