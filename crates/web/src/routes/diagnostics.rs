//! Live-update diagnostics for the signed-in user.
//!
//! Shows whether the change feed is attached, how many subscriptions are
//! open (a growing count with no open tabs is a leak), and the owner's most
//! recent events.

use askama::Template;
use askama_web::WebTemplate;
use axum::{Json, extract::State};
use serde::Serialize;

use smart_bookmarks_core::{FeedMessage, OwnerId, SubscriptionStatus};

use crate::middleware::RequireAuth;
use crate::state::AppState;

/// Diagnostic snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct RealtimeDiagnostics {
    pub owner_id: OwnerId,
    pub status: SubscriptionStatus,
    pub open_subscriptions: usize,
    pub recent_events: Vec<FeedMessage>,
}

impl RealtimeDiagnostics {
    fn collect(state: &AppState, owner: OwnerId) -> Self {
        let feed = state.feed();
        Self {
            owner_id: owner,
            status: feed.status(),
            open_subscriptions: feed.open_subscriptions(),
            recent_events: feed.recent_for(owner),
        }
    }
}

/// One recent event as shown on the page.
pub struct EventRow {
    pub sequence: u64,
    pub kind: &'static str,
    pub bookmark_id: String,
    pub title: String,
}

/// Diagnostic page template.
#[derive(Template, WebTemplate)]
#[template(path = "test_realtime.html")]
pub struct TestRealtimeTemplate {
    pub owner_id: String,
    pub status: &'static str,
    pub open_subscriptions: usize,
    pub events: Vec<EventRow>,
}

/// # Route
///
/// `GET /test-realtime`
pub async fn page(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> TestRealtimeTemplate {
    let snapshot = RealtimeDiagnostics::collect(&state, user.id);

    TestRealtimeTemplate {
        owner_id: snapshot.owner_id.to_string(),
        status: snapshot.status.as_str(),
        open_subscriptions: snapshot.open_subscriptions,
        events: snapshot
            .recent_events
            .iter()
            .map(|m| EventRow {
                sequence: m.sequence,
                kind: m.change.kind.as_str(),
                bookmark_id: m.change.id().to_string(),
                title: m.change.record.title.clone(),
            })
            .collect(),
    }
}

/// # Route
///
/// `GET /api/diagnostics/realtime`
pub async fn realtime(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Json<RealtimeDiagnostics> {
    Json(RealtimeDiagnostics::collect(&state, user.id))
}
