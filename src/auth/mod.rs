//! Authentication providers
//!
//! A provider turns configured credentials into a [`Session`] holding the
//! bearer token for the REST backend. Without a remote auth backend the
//! local provider hands out a fixed development identity.

use crate::config::Config;
use chrono::{DateTime, Duration, Utc};
use reqwest::header;
use serde::Deserialize;
use std::future::Future;
use std::time::Duration as StdDuration;

/// Signed-in identity
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Live session: who is signed in and the token sent as
/// `Authorization: Bearer <token>`
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub user: User,
    pub access_token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Not signed in")]
    SignedOut,

    #[error("Sign-in rejected: {0}")]
    Rejected(String),

    #[error("Auth request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

// =============================================================================
// Authentication Trait
// =============================================================================

/// Authentication backend
pub trait AuthProvider: Send + Sync {
    fn sign_in(&self) -> impl Future<Output = Result<Session, AuthError>> + Send;
    fn sign_out(&self, session: &Session) -> impl Future<Output = Result<(), AuthError>> + Send;
}

// =============================================================================
// Local provider
// =============================================================================

pub const DEV_USER_ID: &str = "dev-user";
pub const DEV_USER_EMAIL: &str = "dev@callhook.com";
pub const DEV_TOKEN: &str = "dev-token";

/// Development provider used when no auth backend is configured
#[derive(Debug, Clone, Default)]
pub struct LocalAuthProvider;

impl AuthProvider for LocalAuthProvider {
    async fn sign_in(&self) -> Result<Session, AuthError> {
        tracing::info!("No auth backend configured, signing in as {}", DEV_USER_EMAIL);
        Ok(Session {
            user: User {
                id: DEV_USER_ID.to_string(),
                email: Some(DEV_USER_EMAIL.to_string()),
            },
            access_token: DEV_TOKEN.to_string(),
            expires_at: None,
        })
    }

    async fn sign_out(&self, _session: &Session) -> Result<(), AuthError> {
        Ok(())
    }
}

// =============================================================================
// Remote provider
// =============================================================================

#[derive(Debug, Clone)]
pub enum Credentials {
    Password { email: String, password: String },
    /// Pre-issued access token, checked against the auth backend
    Token(String),
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    user: User,
}

/// Supabase GoTrue provider
#[derive(Debug, Clone)]
pub struct RemoteAuthProvider {
    http: reqwest::Client,
    auth_url: String,
    api_key: String,
    credentials: Credentials,
}

impl RemoteAuthProvider {
    pub fn new(
        supabase_url: &str,
        api_key: &str,
        credentials: Credentials,
        timeout: StdDuration,
    ) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            auth_url: format!("{}/auth/v1", supabase_url.trim_end_matches('/')),
            api_key: api_key.to_string(),
            credentials,
        })
    }

    fn rejected(status: reqwest::StatusCode) -> AuthError {
        AuthError::Rejected(format!(
            "{} {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("")
        ))
    }

    async fn password_grant(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let response = self
            .http
            .post(format!("{}/token", self.auth_url))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.api_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::rejected(response.status()));
        }

        let token: TokenResponse = response.json().await?;
        Ok(Session {
            user: token.user,
            access_token: token.access_token,
            expires_at: token.expires_in.map(|secs| Utc::now() + Duration::seconds(secs)),
        })
    }

    async fn verify_token(&self, token: &str) -> Result<Session, AuthError> {
        let response = self
            .http
            .get(format!("{}/user", self.auth_url))
            .header("apikey", &self.api_key)
            .bearer_auth(token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::rejected(response.status()));
        }

        Ok(Session {
            user: response.json().await?,
            access_token: token.to_string(),
            expires_at: None,
        })
    }
}

impl AuthProvider for RemoteAuthProvider {
    async fn sign_in(&self) -> Result<Session, AuthError> {
        let session = match self.credentials {
            Credentials::Password {
                ref email,
                ref password,
            } => self.password_grant(email, password).await?,
            Credentials::Token(ref token) => self.verify_token(token).await?,
        };
        tracing::info!(
            "Signed in as {}",
            session.user.email.as_deref().unwrap_or(&session.user.id)
        );
        Ok(session)
    }

    async fn sign_out(&self, session: &Session) -> Result<(), AuthError> {
        let response = self
            .http
            .post(format!("{}/logout", self.auth_url))
            .header("apikey", &self.api_key)
            .header(header::AUTHORIZATION, format!("Bearer {}", session.access_token))
            .send()
            .await?;

        if !response.status().is_success() {
            tracing::warn!("Remote sign-out returned {}", response.status());
            return Err(Self::rejected(response.status()));
        }
        Ok(())
    }
}

// =============================================================================
// Provider selection
// =============================================================================

/// Provider chosen from configuration
#[derive(Debug, Clone)]
pub enum Authenticator {
    Local(LocalAuthProvider),
    Remote(RemoteAuthProvider),
}

impl Authenticator {
    /// Remote when a Supabase project is configured, local otherwise. A
    /// pre-issued token takes precedence over email/password.
    pub fn from_config(config: &Config) -> Result<Self, AuthError> {
        let (Some(url), Some(key)) = (&config.supabase_url, &config.supabase_anon_key) else {
            return Ok(Self::Local(LocalAuthProvider));
        };

        let credentials = match (&config.token, &config.email, &config.password) {
            (Some(token), _, _) => Credentials::Token(token.clone()),
            (None, Some(email), Some(password)) => Credentials::Password {
                email: email.clone(),
                password: password.clone(),
            },
            _ => {
                return Err(AuthError::Rejected(
                    "set DASHBOARD_TOKEN or DASHBOARD_EMAIL and DASHBOARD_PASSWORD".to_string(),
                ))
            }
        };

        Ok(Self::Remote(RemoteAuthProvider::new(
            url,
            key,
            credentials,
            config.request_timeout,
        )?))
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }
}

impl AuthProvider for Authenticator {
    async fn sign_in(&self) -> Result<Session, AuthError> {
        match self {
            Self::Local(provider) => provider.sign_in().await,
            Self::Remote(provider) => provider.sign_in().await,
        }
    }

    async fn sign_out(&self, session: &Session) -> Result<(), AuthError> {
        match self {
            Self::Local(provider) => provider.sign_out(session).await,
            Self::Remote(provider) => provider.sign_out(session).await,
        }
    }
}
