use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::config::Environment;
use crate::state::AppState;

// Health check endpoint - lightweight, no dependencies
pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Readiness and configuration diagnostics.
///
/// A missing admin credential (or a missing HMAC secret in production) makes
/// the admin/form surface fail closed but leaves the public surface
/// serviceable, so this reports `degraded` with a problem list instead of
/// going unready and pulling the pod out of rotation.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let mut problems: Vec<&str> = Vec::new();

    if !state.admin.credential_configured() {
        problems.push("no admin credential configured; all admin logins fail closed");
    }
    let production = state.config.security.environment == Environment::Production;
    if production && state.config.security.hmac_secret.is_none() {
        problems.push("no HMAC secret configured; signed form routes fail closed");
    }

    let body = serde_json::json!({
        "status": if problems.is_empty() { "ready" } else { "degraded" },
        "admin_auth": if state.admin.credential_configured() { "configured" } else { "unconfigured" },
        "hmac_secret": if state.config.security.hmac_secret.is_some() { "configured" } else { "unconfigured" },
        "rate_limit_buckets": state.limiter.bucket_count().await,
        "problems": problems,
    });
    (StatusCode::OK, Json(body))
}

// Version/Build info endpoint (JSON)
pub async fn version() -> impl IntoResponse {
    let body = serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "package": {
            "description": env!("CARGO_PKG_DESCRIPTION"),
            "authors": env!("CARGO_PKG_AUTHORS"),
            "license": env!("CARGO_PKG_LICENSE"),
        },
        "build": {
            "profile": if cfg!(debug_assertions) { "debug" } else { "release" },
            "os": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
        }
    });
    (StatusCode::OK, Json(body))
}
