use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::events::{EventKind, SecurityEvent, Severity};
use crate::middleware::client_ip::client_identity;
use crate::middleware::MaybeRemoteAddr;
use crate::ratelimit::key_for;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub password: String,
}

/// POST /admin/login - validates the operator password and issues a token.
/// The only admin route outside the protection layer; it carries its own
/// strict rate limit inside the auth service.
pub async fn login(
    State(state): State<AppState>,
    MaybeRemoteAddr(remote): MaybeRemoteAddr,
    headers: HeaderMap,
    Json(body): Json<LoginRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let client = client_identity(&headers, remote.map(|a| a.ip()));
    let issued = state.admin.login(&body.password, &client).await?;
    Ok(Json(json!({
        "token": issued.token,
        "expires_at": issued.expires_at.to_rfc3339(),
    })))
}

/// POST /admin/logout - tokens are stateless, so there is nothing to revoke
/// server-side; the client discards its token. Recorded for the audit trail.
pub async fn logout(
    State(state): State<AppState>,
    MaybeRemoteAddr(remote): MaybeRemoteAddr,
    headers: HeaderMap,
) -> impl IntoResponse {
    let client = client_identity(&headers, remote.map(|a| a.ip()));
    state
        .events
        .log(SecurityEvent::new(EventKind::AdminAction, Severity::Info, &client, "/admin/logout", "POST"))
        .await;
    StatusCode::NO_CONTENT
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub limit: Option<usize>,
}

/// GET /admin/events - recent security events, newest first.
pub async fn recent_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> AppResult<Json<serde_json::Value>> {
    let limit = query.limit.unwrap_or(50).min(500);
    let events = state.events.recent(limit).await;
    Ok(Json(json!({ "count": events.len(), "events": events })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResetAction {
    Contact,
    Ip,
    All,
}

#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    pub action: ResetAction,
    /// Restricts `contact`/`ip` resets to one client identity.
    pub ip: Option<String>,
}

/// POST /admin/rate-limit/reset - administrative recovery for rate-limit
/// buckets: one class, one specific client, or everything.
pub async fn reset_rate_limit(
    State(state): State<AppState>,
    MaybeRemoteAddr(remote): MaybeRemoteAddr,
    headers: HeaderMap,
    Json(body): Json<ResetRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let cleared = match (&body.action, body.ip.as_deref()) {
        (ResetAction::Contact, Some(ip)) => {
            state.limiter.reset(&key_for("contact", ip)).await;
            format!("contact:{}", ip)
        }
        (ResetAction::Contact, None) => {
            state.limiter.reset_class("contact").await;
            "contact".to_string()
        }
        (ResetAction::Ip, Some(ip)) => {
            state.limiter.reset(&key_for("ip", ip)).await;
            format!("ip:{}", ip)
        }
        (ResetAction::Ip, None) => {
            state.limiter.reset_class("ip").await;
            "ip".to_string()
        }
        (ResetAction::All, Some(_)) => {
            return Err(AppError::BadRequest("action \"all\" does not take an ip".to_string()));
        }
        (ResetAction::All, None) => {
            state.limiter.reset_all().await;
            "all".to_string()
        }
    };

    let client = client_identity(&headers, remote.map(|a| a.ip()));
    state
        .events
        .log(
            SecurityEvent::new(EventKind::AdminAction, Severity::Info, &client, "/admin/rate-limit/reset", "POST")
                .with_details(json!({ "cleared": cleared })),
        )
        .await;

    Ok(Json(json!({ "cleared": cleared })))
}
