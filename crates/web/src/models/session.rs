//! Session-related types.
//!
//! Types stored in the session for authentication state.

use serde::{Deserialize, Serialize};

use smart_bookmarks_core::{Email, OwnerId};

/// Session-stored user identity.
///
/// The id is the provider's user id and is the owner of every bookmark the
/// user creates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    /// Provider user id.
    pub id: OwnerId,
    /// Email reported by the provider, if any.
    pub email: Option<Email>,
}

/// Provider access token kept for sign-out.
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderToken {
    /// Bearer token issued by the provider.
    pub access_token: String,
    /// Refresh token, if issued.
    pub refresh_token: Option<String>,
    /// Lifetime in seconds, if reported.
    pub expires_in: Option<i64>,
    /// Unix timestamp of the exchange.
    pub obtained_at: i64,
}

impl ProviderToken {
    /// Whether the token has outlived its reported lifetime.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        let now = chrono::Utc::now().timestamp();
        self.expires_in
            .is_some_and(|ttl| now >= self.obtained_at.saturating_add(ttl))
    }
}

impl std::fmt::Debug for ProviderToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderToken")
            .field("access_token", &"[REDACTED]")
            .field("expires_in", &self.expires_in)
            .field("obtained_at", &self.obtained_at)
            .finish_non_exhaustive()
    }
}

/// Session keys for authentication data.
pub mod keys {
    /// Key for storing the current signed-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for the provider token.
    pub const PROVIDER_TOKEN: &str = "provider_token";

    /// Key for the OAuth state (CSRF protection).
    pub const OAUTH_STATE: &str = "oauth_state";

    /// Key for the PKCE code verifier.
    pub const PKCE_VERIFIER: &str = "pkce_verifier";
}
