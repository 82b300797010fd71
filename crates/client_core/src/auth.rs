//! Cloud auth: trait seam over the sync service's account endpoints plus
//! the client-held session. All token handling is opaque; the service's
//! token is replayed verbatim as a bearer header.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;

use shared::{
    domain::UserId,
    protocol::{
        AuthUserPayload, PasswordResetRequest, SessionResponse, SignInRequest, SignUpRequest,
        UpdateProfileRequest,
    },
};

use crate::http::expect_success;

/// Returned by every operation that requires a session when none exists.
#[derive(Debug, Error)]
#[error("not signed in")]
pub struct NotSignedIn;

#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn sign_in(&self, request: SignInRequest) -> Result<SessionResponse>;
    async fn sign_up(&self, request: SignUpRequest) -> Result<SessionResponse>;
    async fn update_profile(
        &self,
        token: &str,
        request: UpdateProfileRequest,
    ) -> Result<AuthUserPayload>;
    async fn send_password_reset(&self, request: PasswordResetRequest) -> Result<()>;
    async fn sign_out(&self, token: &str) -> Result<()>;
    async fn delete_account(&self, token: &str) -> Result<()>;
}

pub struct HttpAuthApi {
    http: Client,
    base_url: String,
}

impl HttpAuthApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl AuthApi for HttpAuthApi {
    async fn sign_in(&self, request: SignInRequest) -> Result<SessionResponse> {
        let response = self
            .http
            .post(format!("{}/auth/sign_in", self.base_url))
            .json(&request)
            .send()
            .await?;
        Ok(expect_success(response).await?.json().await?)
    }

    async fn sign_up(&self, request: SignUpRequest) -> Result<SessionResponse> {
        let response = self
            .http
            .post(format!("{}/auth/sign_up", self.base_url))
            .json(&request)
            .send()
            .await?;
        Ok(expect_success(response).await?.json().await?)
    }

    async fn update_profile(
        &self,
        token: &str,
        request: UpdateProfileRequest,
    ) -> Result<AuthUserPayload> {
        let response = self
            .http
            .post(format!("{}/auth/profile", self.base_url))
            .bearer_auth(token)
            .json(&request)
            .send()
            .await?;
        Ok(expect_success(response).await?.json().await?)
    }

    async fn send_password_reset(&self, request: PasswordResetRequest) -> Result<()> {
        let response = self
            .http
            .post(format!("{}/auth/password_reset", self.base_url))
            .json(&request)
            .send()
            .await?;
        expect_success(response).await?;
        Ok(())
    }

    async fn sign_out(&self, token: &str) -> Result<()> {
        let response = self
            .http
            .post(format!("{}/auth/sign_out", self.base_url))
            .bearer_auth(token)
            .send()
            .await?;
        expect_success(response).await?;
        Ok(())
    }

    async fn delete_account(&self, token: &str) -> Result<()> {
        let response = self
            .http
            .delete(format!("{}/auth/account", self.base_url))
            .bearer_auth(token)
            .send()
            .await?;
        expect_success(response).await?;
        Ok(())
    }
}

/// Null object installed when no sync service is configured; the reader can
/// still browse sources offline.
pub struct MissingAuthApi;

macro_rules! auth_unavailable {
    () => {
        Err(anyhow::anyhow!(
            "auth service unavailable; no sync service configured"
        ))
    };
}

#[async_trait]
impl AuthApi for MissingAuthApi {
    async fn sign_in(&self, _request: SignInRequest) -> Result<SessionResponse> {
        auth_unavailable!()
    }

    async fn sign_up(&self, _request: SignUpRequest) -> Result<SessionResponse> {
        auth_unavailable!()
    }

    async fn update_profile(
        &self,
        _token: &str,
        _request: UpdateProfileRequest,
    ) -> Result<AuthUserPayload> {
        auth_unavailable!()
    }

    async fn send_password_reset(&self, _request: PasswordResetRequest) -> Result<()> {
        auth_unavailable!()
    }

    async fn sign_out(&self, _token: &str) -> Result<()> {
        auth_unavailable!()
    }

    async fn delete_account(&self, _token: &str) -> Result<()> {
        auth_unavailable!()
    }
}

struct Session {
    user: AuthUserPayload,
    id_token: String,
}

/// Owns the current session. Single writer per operation; reads are cheap
/// snapshots. Operations that need a session fail fast with [`NotSignedIn`].
pub struct AuthRepository {
    api: Arc<dyn AuthApi>,
    session: RwLock<Option<Session>>,
}

impl AuthRepository {
    pub fn new(api: Arc<dyn AuthApi>) -> Arc<Self> {
        Arc::new(Self {
            api,
            session: RwLock::new(None),
        })
    }

    pub async fn current_user(&self) -> Option<AuthUserPayload> {
        self.session.read().await.as_ref().map(|s| s.user.clone())
    }

    pub async fn is_signed_in(&self) -> bool {
        self.session.read().await.is_some()
    }

    pub async fn user_id(&self) -> Result<UserId> {
        let guard = self.session.read().await;
        let session = guard.as_ref().ok_or(NotSignedIn)?;
        Ok(session.user.user_id.clone())
    }

    async fn token(&self) -> Result<String> {
        let guard = self.session.read().await;
        let session = guard.as_ref().ok_or(NotSignedIn)?;
        Ok(session.id_token.clone())
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUserPayload> {
        let response = self
            .api
            .sign_in(SignInRequest {
                email: email.to_string(),
                password: password.to_string(),
            })
            .await?;
        let user = response.user.clone();
        info!(user_id = %user.user_id, "auth: signed in");
        *self.session.write().await = Some(Session {
            user: response.user,
            id_token: response.id_token,
        });
        Ok(user)
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<AuthUserPayload> {
        let response = self
            .api
            .sign_up(SignUpRequest {
                email: email.to_string(),
                password: password.to_string(),
                display_name: display_name.map(str::to_string),
            })
            .await?;
        let user = response.user.clone();
        info!(user_id = %user.user_id, "auth: account created");
        *self.session.write().await = Some(Session {
            user: response.user,
            id_token: response.id_token,
        });
        Ok(user)
    }

    pub async fn update_profile(
        &self,
        display_name: Option<&str>,
        photo_url: Option<&str>,
    ) -> Result<AuthUserPayload> {
        let token = self.token().await?;
        let updated = self
            .api
            .update_profile(
                &token,
                UpdateProfileRequest {
                    display_name: display_name.map(str::to_string),
                    photo_url: photo_url.map(str::to_string),
                },
            )
            .await?;
        if let Some(session) = self.session.write().await.as_mut() {
            session.user = updated.clone();
        }
        Ok(updated)
    }

    pub async fn send_password_reset(&self, email: &str) -> Result<()> {
        self.api
            .send_password_reset(PasswordResetRequest {
                email: email.to_string(),
            })
            .await
    }

    pub async fn sign_out(&self) -> Result<()> {
        let token = self.token().await?;
        self.api.sign_out(&token).await?;
        *self.session.write().await = None;
        info!("auth: signed out");
        Ok(())
    }

    pub async fn delete_account(&self) -> Result<()> {
        let token = self.token().await?;
        self.api.delete_account(&token).await?;
        *self.session.write().await = None;
        info!("auth: account deleted");
        Ok(())
    }
}
