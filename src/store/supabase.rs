use crate::auth::AuthUser;
use crate::error::{AppError, Result};
use crate::model::{
    AI_CHATS, AiChatMessage, CHATBOT, ChatRow, FARMS, Farm, NewAiChat, NewFarm, NewPrediction,
    PREDICTIONS, Prediction, USERS, UserProfile,
};
use crate::store::types::RemoteStore;
use async_trait::async_trait;
use reqwest::header::{CONTENT_RANGE, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, info};

/// PostgREST-backed store (`{url}/rest/v1/{table}`).
pub struct SupabaseStore {
    client: reqwest::Client,
    url: String,
    anon_key: String,
}

impl SupabaseStore {
    pub fn new(client: reqwest::Client, url: &str, anon_key: &str) -> Self {
        let url = url.trim_end_matches('/').to_string();
        info!("Supabase store initialized ({})", url);
        Self {
            client,
            url,
            anon_key: anon_key.to_string(),
        }
    }

    fn table(&self, name: &str) -> String {
        format!("{}/rest/v1/{}", self.url, name)
    }

    fn request(
        &self,
        method: reqwest::Method,
        table: &str,
        user: Option<&AuthUser>,
    ) -> reqwest::RequestBuilder {
        let token = user
            .and_then(|u| u.access_token.as_deref())
            .unwrap_or(&self.anon_key);
        self.client
            .request(method, self.table(table))
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
    }

    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        user: Option<&AuthUser>,
        query: &[(&str, String)],
    ) -> Result<Vec<T>> {
        debug!("select {} {:?}", table, query);
        let resp = self
            .request(reqwest::Method::GET, table, user)
            .query(&[("select", "*")])
            .query(query)
            .send()
            .await
            .map_err(AppError::persistence)?;
        read_rows(resp).await
    }

    async fn insert_one<B: Serialize, T: DeserializeOwned>(
        &self,
        table: &str,
        user: &AuthUser,
        body: &B,
    ) -> Result<T> {
        debug!("insert into {}", table);
        let resp = self
            .request(reqwest::Method::POST, table, Some(user))
            .header("Prefer", "return=representation")
            .json(&[body])
            .send()
            .await
            .map_err(AppError::persistence)?;
        first_row(table, read_rows(resp).await?)
    }
}

async fn read_rows<T: DeserializeOwned>(resp: reqwest::Response) -> Result<Vec<T>> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(AppError::Persistence(format!("HTTP {}: {}", status, body.trim())));
    }
    resp.json()
        .await
        .map_err(|e| AppError::Persistence(format!("unreadable rows: {}", e)))
}

fn first_row<T>(table: &str, rows: Vec<T>) -> Result<T> {
    rows.into_iter()
        .next()
        .ok_or_else(|| AppError::Persistence(format!("{} write returned no row", table)))
}

fn eq(value: &str) -> String {
    format!("eq.{}", value)
}

/// Total from a `Content-Range` header such as `0-24/3573` or `*/0`.
fn parse_content_range(header: Option<&HeaderValue>) -> Option<u64> {
    header?
        .to_str()
        .ok()?
        .rsplit_once('/')
        .and_then(|(_, total)| total.trim().parse().ok())
}

#[async_trait]
impl RemoteStore for SupabaseStore {
    async fn insert_farm(&self, user: &AuthUser, farm: NewFarm) -> Result<Farm> {
        self.insert_one(FARMS, user, &farm).await
    }

    async fn latest_farm(&self, user: &AuthUser) -> Result<Option<Farm>> {
        let rows: Vec<Farm> = self
            .select(
                FARMS,
                Some(user),
                &[
                    ("user_id", eq(&user.id)),
                    ("order", "date_generated.desc".into()),
                    ("limit", "1".into()),
                ],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_prediction(
        &self,
        user: &AuthUser,
        prediction: NewPrediction,
    ) -> Result<Prediction> {
        self.insert_one(PREDICTIONS, user, &prediction).await
    }

    async fn list_predictions(&self, user: Option<&AuthUser>) -> Result<Vec<Prediction>> {
        let mut query = vec![("order", "date_generated.desc".to_string())];
        if let Some(u) = user {
            query.push(("user_id", eq(&u.id)));
        }
        self.select(PREDICTIONS, user, &query).await
    }

    async fn count_predictions(&self, user: &AuthUser) -> Result<u64> {
        let resp = self
            .request(reqwest::Method::HEAD, PREDICTIONS, Some(user))
            .header("Prefer", "count=exact")
            .query(&[("select", "*".to_string()), ("user_id", eq(&user.id))])
            .send()
            .await
            .map_err(AppError::persistence)?;

        if !resp.status().is_success() {
            return Err(AppError::Persistence(format!(
                "count failed: HTTP {}",
                resp.status()
            )));
        }
        parse_content_range(resp.headers().get(CONTENT_RANGE))
            .ok_or_else(|| AppError::Persistence("count missing from Content-Range".into()))
    }

    async fn insert_ai_chat(&self, user: &AuthUser, message: NewAiChat) -> Result<AiChatMessage> {
        self.insert_one(AI_CHATS, user, &message).await
    }

    async fn ai_chats_for_farm(
        &self,
        user: Option<&AuthUser>,
        farm_id: &str,
    ) -> Result<Vec<AiChatMessage>> {
        self.select(
            AI_CHATS,
            user,
            &[
                ("farm_id", eq(farm_id)),
                ("order", "date_generated.desc".into()),
            ],
        )
        .await
    }

    async fn chat_row(&self, user: &AuthUser) -> Result<Option<ChatRow>> {
        let rows: Vec<ChatRow> = self
            .select(CHATBOT, Some(user), &[("id", eq(&user.id))])
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_chat_row(&self, user: &AuthUser, chats: Value) -> Result<ChatRow> {
        self.insert_one(CHATBOT, user, &json!({ "id": user.id, "chats": chats }))
            .await
    }

    async fn update_chat_row(&self, user: &AuthUser, chats: Value) -> Result<ChatRow> {
        let resp = self
            .request(reqwest::Method::PATCH, CHATBOT, Some(user))
            .header("Prefer", "return=representation")
            .query(&[("id", eq(&user.id))])
            .json(&json!({ "chats": chats }))
            .send()
            .await
            .map_err(AppError::persistence)?;
        first_row(CHATBOT, read_rows(resp).await?)
    }

    async fn insert_user(&self, user: &AuthUser, profile: UserProfile) -> Result<UserProfile> {
        self.insert_one(USERS, user, &profile).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_range_total() {
        let v = HeaderValue::from_static("0-24/3573");
        assert_eq!(parse_content_range(Some(&v)), Some(3573));
        let v = HeaderValue::from_static("*/0");
        assert_eq!(parse_content_range(Some(&v)), Some(0));
        let v = HeaderValue::from_static("0-24/*");
        assert_eq!(parse_content_range(Some(&v)), None);
        assert_eq!(parse_content_range(None), None);
    }

    #[test]
    fn first_row_of_empty_write_is_a_persistence_error() {
        let rows: Vec<Farm> = Vec::new();
        assert!(matches!(
            first_row(FARMS, rows),
            Err(AppError::Persistence(msg)) if msg.contains("farms")
        ));
    }
}
