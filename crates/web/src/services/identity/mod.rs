//! Identity provider client.
//!
//! Sign-in is delegated to a hosted identity service speaking the `GoTrue`
//! HTTP API (Supabase Auth and compatible servers). The flow uses OAuth with
//! PKCE:
//!
//! 1. Generate a verifier with [`pkce::generate_verifier`] and keep it in the session
//! 2. Redirect to [`IdentityClient::authorization_url`]
//! 3. The provider redirects back to `/auth/callback?code=...`
//! 4. Exchange the code with [`IdentityClient::exchange_code`]
//! 5. On sign-out, revoke with [`IdentityClient::sign_out`]

mod error;
pub mod pkce;

pub use error::IdentityError;

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;

use smart_bookmarks_core::{Email, OwnerId};

use crate::config::IdentityConfig;
use crate::models::{CurrentUser, ProviderToken};

/// Header carrying the provider's public API key.
const API_KEY_HEADER: &str = "apikey";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    user: Option<ProviderUser>,
}

#[derive(Debug, Deserialize)]
struct ProviderUser {
    id: OwnerId,
    #[serde(default)]
    email: Option<String>,
}

/// Result of a successful code exchange.
#[derive(Debug, Clone)]
pub struct ProviderSession {
    /// The signed-in user.
    pub user: CurrentUser,
    /// Token used to revoke the session at sign-out.
    pub token: ProviderToken,
}

/// Client for the identity provider.
#[derive(Clone)]
pub struct IdentityClient {
    inner: Arc<IdentityClientInner>,
}

struct IdentityClientInner {
    client: reqwest::Client,
    url: String,
    api_key: SecretString,
    provider: String,
}

impl IdentityClient {
    /// Create a new identity client.
    #[must_use]
    pub fn new(config: &IdentityConfig) -> Self {
        Self {
            inner: Arc::new(IdentityClientInner {
                client: reqwest::Client::new(),
                url: config.url.clone(),
                api_key: config.api_key.clone(),
                provider: config.provider.clone(),
            }),
        }
    }

    /// OAuth provider configured at the identity service.
    #[must_use]
    pub fn provider(&self) -> &str {
        &self.inner.provider
    }

    /// Build the URL that starts sign-in at the provider.
    ///
    /// `redirect_to` is where the provider sends the browser back to; it
    /// must be allow-listed at the identity service.
    #[must_use]
    pub fn authorization_url(&self, redirect_to: &str, code_challenge: &str) -> String {
        format!(
            "{}/authorize?\
            provider={}&\
            redirect_to={}&\
            code_challenge={}&\
            code_challenge_method=s256",
            self.inner.url,
            urlencoding::encode(&self.inner.provider),
            urlencoding::encode(redirect_to),
            urlencoding::encode(code_challenge)
        )
    }

    /// Exchange an authorization code for a provider session.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::Rejected` if the provider refuses the code,
    /// or `IdentityError::MissingUser` if the session carries no user.
    #[tracing::instrument(skip_all)]
    pub async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<ProviderSession, IdentityError> {
        let url = format!("{}/token?grant_type=pkce", self.inner.url);

        let response = self
            .inner
            .client
            .post(&url)
            .header(API_KEY_HEADER, self.inner.api_key.expose_secret())
            .json(&json!({
                "auth_code": code,
                "code_verifier": code_verifier,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(IdentityError::Rejected { status, body });
        }

        let token: TokenResponse = response.json().await?;
        let user = token.user.ok_or(IdentityError::MissingUser)?;

        Ok(ProviderSession {
            user: CurrentUser {
                id: user.id,
                email: user.email.as_deref().and_then(|e| Email::parse(e).ok()),
            },
            token: ProviderToken {
                access_token: token.access_token,
                refresh_token: token.refresh_token,
                expires_in: token.expires_in,
                obtained_at: chrono::Utc::now().timestamp(),
            },
        })
    }

    /// Revoke a provider session.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the provider rejects it.
    #[tracing::instrument(skip_all)]
    pub async fn sign_out(&self, access_token: &str) -> Result<(), IdentityError> {
        let url = format!("{}/logout", self.inner.url);

        let response = self
            .inner
            .client
            .post(&url)
            .header(API_KEY_HEADER, self.inner.api_key.expose_secret())
            .bearer_auth(access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(IdentityError::Rejected { status, body });
        }

        Ok(())
    }
}
