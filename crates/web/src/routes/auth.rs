//! Sign-in and sign-out route handlers.
//!
//! Sign-in is an OAuth code flow with PKCE against the identity provider:
//! - `GET /login`: sign-in page
//! - `GET /auth/login`: store verifier and state, redirect to the provider
//! - `GET /auth/callback`: exchange the code, store the user, go to `/`
//! - `POST /auth/signout`: revoke at the provider, destroy the session

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;

use crate::error::{clear_sentry_user, set_sentry_user};
use crate::middleware::{
    OptionalAuth, clear_current_user, current_provider_token, set_current_user,
};
use crate::models::session_keys;
use crate::services::identity::pkce;
use crate::state::AppState;

/// Redirect target for any failed sign-in attempt.
const AUTH_ERROR_REDIRECT: &str = "/login?error=auth_error";

/// Length of the CSRF state parameter.
const STATE_LENGTH: usize = 32;

/// Query parameters for the sign-in page.
#[derive(Debug, Default, Deserialize)]
pub struct LoginQuery {
    pub error: Option<String>,
}

/// Query parameters from the provider callback.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackQuery {
    /// Authorization code to exchange.
    pub code: Option<String>,
    /// State parameter for CSRF protection.
    pub state: Option<String>,
    /// Error code if the provider refused.
    pub error: Option<String>,
    /// Error description.
    pub error_description: Option<String>,
}

/// Sign-in page template.
#[derive(Template, WebTemplate)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub error: Option<&'static str>,
    pub provider: String,
}

fn login_error_message(marker: &str) -> &'static str {
    match marker {
        "auth_error" => "Sign-in failed. Please try again.",
        "session" => "Your session could not be saved. Please try again.",
        _ => "Something went wrong. Please try again.",
    }
}

/// Display the sign-in page, or go straight to the list when signed in.
///
/// # Route
///
/// `GET /login`
pub async fn login_page(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    Query(query): Query<LoginQuery>,
) -> Response {
    if user.is_some() {
        return Redirect::to("/").into_response();
    }

    LoginTemplate {
        error: query.error.as_deref().map(login_error_message),
        provider: state.identity().provider().to_string(),
    }
    .into_response()
}

/// Start the sign-in flow.
///
/// # Route
///
/// `GET /auth/login`
pub async fn start(State(state): State<AppState>, session: Session) -> Response {
    let verifier = pkce::generate_verifier();
    let oauth_state = pkce::random_string(STATE_LENGTH);

    if let Err(e) = session.insert(session_keys::PKCE_VERIFIER, &verifier).await {
        tracing::error!(error = %e, "Failed to store PKCE verifier in session");
        return Redirect::to("/login?error=session").into_response();
    }
    if let Err(e) = session.insert(session_keys::OAUTH_STATE, &oauth_state).await {
        tracing::error!(error = %e, "Failed to store OAuth state in session");
        return Redirect::to("/login?error=session").into_response();
    }

    let redirect_to = format!(
        "{}?state={}",
        state.config().callback_url(),
        urlencoding::encode(&oauth_state)
    );
    let auth_url = state
        .identity()
        .authorization_url(&redirect_to, &pkce::challenge(&verifier));

    Redirect::to(&auth_url).into_response()
}

/// Handle the provider callback.
///
/// # Route
///
/// `GET /auth/callback`
pub async fn callback(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<CallbackQuery>,
) -> Response {
    if let Some(error) = query.error {
        let description = query.error_description.unwrap_or_default();
        tracing::warn!(%error, %description, "Identity provider refused sign-in");
        return Redirect::to("/login").into_response();
    }

    let Some(code) = query.code else {
        tracing::debug!("Callback without a code");
        return Redirect::to("/login").into_response();
    };

    // One-time values: take them out whatever happens next
    let stored_state: Option<String> = session
        .remove(session_keys::OAUTH_STATE)
        .await
        .ok()
        .flatten();
    let verifier: Option<String> = session
        .remove(session_keys::PKCE_VERIFIER)
        .await
        .ok()
        .flatten();

    if query.state.is_none() || stored_state != query.state {
        tracing::warn!("OAuth state mismatch");
        return Redirect::to(AUTH_ERROR_REDIRECT).into_response();
    }
    let Some(verifier) = verifier else {
        tracing::warn!("PKCE verifier missing from session");
        return Redirect::to(AUTH_ERROR_REDIRECT).into_response();
    };

    let provider_session = match state.identity().exchange_code(&code, &verifier).await {
        Ok(provider_session) => provider_session,
        Err(e) => {
            tracing::error!(error = %e, "Failed to exchange authorization code");
            return Redirect::to(AUTH_ERROR_REDIRECT).into_response();
        }
    };

    let user = provider_session.user;
    if let Err(e) = set_current_user(&session, &user, &provider_session.token).await {
        tracing::error!(error = %e, "Failed to store user in session");
        return Redirect::to(AUTH_ERROR_REDIRECT).into_response();
    }

    set_sentry_user(&user.id, user.email.as_ref().map(|e| e.as_str()));
    tracing::info!(owner = %user.id, "User signed in");

    Redirect::to("/").into_response()
}

/// Sign out.
///
/// Provider revocation is best effort; the local session is destroyed
/// regardless.
///
/// # Route
///
/// `POST /auth/signout`
pub async fn signout(State(state): State<AppState>, session: Session) -> Response {
    if let Some(token) = current_provider_token(&session).await
        && !token.is_expired()
        && let Err(e) = state.identity().sign_out(&token.access_token).await
    {
        tracing::warn!(error = %e, "Provider sign-out failed");
    }

    if let Err(e) = clear_current_user(&session).await {
        tracing::error!(error = %e, "Failed to destroy session");
    }
    clear_sentry_user();

    Redirect::to("/login").into_response()
}
