//! Password authentication against the hosted auth endpoint

use async_trait::async_trait;
use chrono::{Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use surveyor_core::{AuthBackend, BackendError};
use surveyor_types::Session;
use tracing::{info, instrument};

use crate::config::{RemoteConfig, RemoteConfigError};
use crate::error::{check, transport};

#[derive(Debug, Clone)]
pub struct AuthClient {
    http: Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

/// Token grant. Sign-up answers with either this or a bare user when the
/// address still needs confirming.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    user: Option<AuthUser>,
}

impl TokenResponse {
    fn into_session(self) -> Option<Session> {
        let access_token = self.access_token.filter(|t| !t.is_empty())?;
        let user = self.user?;
        let expires_at = self
            .expires_at
            .and_then(|ts| chrono::DateTime::from_timestamp(ts, 0))
            .or_else(|| self.expires_in.map(|secs| Utc::now() + Duration::seconds(secs)));
        Some(Session {
            user_id: user.id,
            email: user.email,
            access_token,
            refresh_token: self.refresh_token,
            expires_at,
        })
    }
}

impl AuthClient {
    pub fn new(config: &RemoteConfig) -> Result<Self, RemoteConfigError> {
        let (url, key) = config.store()?;
        Ok(Self::with_client(config.http_client()?, url, key))
    }

    pub fn with_client(http: Client, store_url: &str, api_key: impl Into<String>) -> Self {
        Self {
            http,
            base_url: format!("{}/auth/v1", store_url.trim_end_matches('/')),
            api_key: api_key.into(),
        }
    }

    async fn post_credentials(
        &self,
        path: &str,
        email: &str,
        password: &str,
    ) -> Result<TokenResponse, BackendError> {
        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .header("apikey", &self.api_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(transport)?;
        check(response).await?.json().await.map_err(transport)
    }
}

#[async_trait]
impl AuthBackend for AuthClient {
    #[instrument(skip(self, password))]
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, BackendError> {
        let session = self
            .post_credentials("/token?grant_type=password", email, password)
            .await?
            .into_session()
            .ok_or_else(|| BackendError::Decode("token response without a session".to_string()))?;
        info!(user_id = %session.user_id, "Token issued");
        Ok(session)
    }

    #[instrument(skip(self, password))]
    async fn sign_up(&self, email: &str, password: &str) -> Result<Option<Session>, BackendError> {
        let grant = self.post_credentials("/signup", email, password).await?;
        Ok(grant.into_session())
    }

    #[instrument(skip_all, fields(user_id = %session.user_id))]
    async fn sign_out(&self, session: &Session) -> Result<(), BackendError> {
        let response = self
            .http
            .post(format!("{}/logout", self.base_url))
            .header("apikey", &self.api_key)
            .bearer_auth(&session.access_token)
            .send()
            .await
            .map_err(transport)?;
        check(response).await?;
        Ok(())
    }
}
