use crate::error::{AppError, Result};
use crate::model::UserProfile;
use crate::store::RemoteStore;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: String,
    pub email: Option<String>,
    /// Bearer token for row-level-security scoped requests.
    pub access_token: Option<String>,
}

impl AuthUser {
    pub fn local(id: &str) -> Self {
        Self {
            id: id.to_string(),
            email: None,
            access_token: None,
        }
    }
}

#[async_trait]
pub trait AuthSession: Send + Sync {
    async fn current_user(&self) -> Option<AuthUser>;
}

/// Resolves the signed-in user or fails with `AppError::Auth`.
pub async fn require_user(auth: &dyn AuthSession, action: &str) -> Result<AuthUser> {
    auth.current_user()
        .await
        .ok_or_else(|| AppError::Auth(format!("please sign in to {}", action)))
}

/// In-process holder of the current user.
#[derive(Default)]
pub struct SessionStore {
    user: RwLock<Option<AuthUser>>,
}

impl SessionStore {
    pub fn new(user: Option<AuthUser>) -> Arc<Self> {
        Arc::new(Self {
            user: RwLock::new(user),
        })
    }

    pub async fn sign_in(&self, user: AuthUser) {
        info!("Signed in as {}", user.id);
        *self.user.write().await = Some(user);
    }

    pub async fn sign_out(&self) {
        if let Some(user) = self.user.write().await.take() {
            info!("Signed out {}", user.id);
        }
    }
}

#[async_trait]
impl AuthSession for SessionStore {
    async fn current_user(&self) -> Option<AuthUser> {
        self.user.read().await.clone()
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    user: AuthUserBody,
}

#[derive(Deserialize)]
struct AuthUserBody {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Deserialize)]
struct SignUpResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    user: Option<AuthUserBody>,
    // Some projects return the user object at the top level when email confirmation is on.
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

/// Password auth against the Supabase GoTrue endpoints.
pub struct SupabaseAuth {
    client: reqwest::Client,
    url: String,
    anon_key: String,
}

impl SupabaseAuth {
    pub fn new(client: reqwest::Client, url: &str, anon_key: &str) -> Self {
        Self {
            client,
            url: url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
        }
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser> {
        let resp = self
            .client
            .post(format!("{}/auth/v1/token", self.url))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.anon_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| AppError::Auth(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(AppError::Auth(format!("sign-in rejected: {} {}", status, body)));
        }

        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| AppError::Auth(format!("unreadable sign-in response: {}", e)))?;

        Ok(AuthUser {
            id: token.user.id,
            email: token.user.email,
            access_token: Some(token.access_token),
        })
    }

    /// Creates the account, then writes the `users` profile row best-effort.
    pub async fn sign_up(
        &self,
        store: &dyn RemoteStore,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthUser> {
        let resp = self
            .client
            .post(format!("{}/auth/v1/signup", self.url))
            .header("apikey", &self.anon_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| AppError::Auth(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(AppError::Auth(format!("sign-up rejected: {} {}", status, body)));
        }

        let body: SignUpResponse = resp
            .json()
            .await
            .map_err(|e| AppError::Auth(format!("unreadable sign-up response: {}", e)))?;

        let (id, returned_email) = match (body.user, body.id) {
            (Some(user), _) => (user.id, user.email),
            (None, Some(id)) => (id, body.email),
            (None, None) => return Err(AppError::Auth("sign-up returned no user".into())),
        };

        let user = AuthUser {
            id,
            email: returned_email.or_else(|| Some(email.to_string())),
            access_token: body.access_token,
        };

        let profile = UserProfile {
            id: user.id.clone(),
            name: name.to_string(),
            email: email.to_string(),
        };
        if let Err(e) = store.insert_user(&user, profile).await {
            warn!("Failed to save profile to users table: {}", e);
        }

        Ok(user)
    }
}
