use axum::{
    extract::State,
    http::HeaderMap,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::middleware::client_ip::client_identity;
use crate::middleware::MaybeRemoteAddr;
use crate::ratelimit::key_for;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ContactSubmission {
    pub name: String,
    pub email: String,
    pub message: String,
}

/// POST /api/contact - the signed public form endpoint.
///
/// The signature gate has already validated the raw body by the time this
/// runs. A contact-class rate limit applies on top of the generic per-IP one.
/// The actual submission handling (CRM forwarding etc.) lives outside the
/// gateway; this acknowledges receipt.
pub async fn submit_contact(
    State(state): State<AppState>,
    MaybeRemoteAddr(remote): MaybeRemoteAddr,
    headers: HeaderMap,
    Json(submission): Json<ContactSubmission>,
) -> AppResult<Json<serde_json::Value>> {
    let client = client_identity(&headers, remote.map(|a| a.ip()));

    let decision = state
        .limiter
        .check(&key_for("contact", &client), state.config.rate_limit.contact_policy())
        .await;
    if !decision.allowed {
        return Err(AppError::RateLimited { retry_after_seconds: decision.retry_after_seconds() });
    }

    if submission.email.trim().is_empty() || !submission.email.contains('@') {
        return Err(AppError::BadRequest("a valid email address is required".to_string()));
    }
    if submission.message.trim().is_empty() {
        return Err(AppError::BadRequest("message must not be empty".to_string()));
    }

    tracing::info!(client = %client, name = %submission.name, "Contact submission accepted");
    Ok(Json(json!({ "status": "accepted" })))
}
