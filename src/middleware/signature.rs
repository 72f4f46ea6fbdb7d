//! Request-integrity gate for public form submissions.
//!
//! POSTs to a configured allow-list of routes must carry an `X-Signature`
//! header: the hex-encoded HMAC-SHA256 of the raw, unparsed body under the
//! shared secret. Everything else bypasses the gate. With no secret
//! configured the gate fails open in development and closed in production;
//! this asymmetry is a deliberate operational default.

use axum::{
    body::Body,
    extract::{connect_info::ConnectInfo, Request, State},
    http::Method,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;

use super::client_ip::client_identity;
use crate::error::AppError;
use crate::events::{EventKind, SecurityEvent, Severity};
use crate::state::AppState;

const SIGNATURE_HEADER: &str = "x-signature";

// Form bodies are small; anything beyond this is not a legitimate submission.
const MAX_SIGNED_BODY_BYTES: usize = 256 * 1024;

pub async fn signature_middleware(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let path = req.uri().path().to_string();
    if req.method() != Method::POST
        || !state.config.security.signed_routes.iter().any(|r| r == &path)
    {
        return next.run(req).await;
    }

    let remote_ip = req.extensions().get::<ConnectInfo<SocketAddr>>().map(|info| info.0.ip());
    let client = client_identity(req.headers(), remote_ip);

    let secret = match state.config.security.hmac_secret.as_deref() {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => {
            if state.config.security.environment.is_development() {
                tracing::warn!(route = %path, "No HMAC secret configured; signature gate failing open (development)");
                return next.run(req).await;
            }
            state
                .events
                .log(
                    SecurityEvent::new(EventKind::SignatureInvalid, Severity::Critical, &client, &path, "POST")
                        .with_details(serde_json::json!({ "reason": "secret_unconfigured" })),
                )
                .await;
            return AppError::SignatureInvalid.into_response();
        }
    };

    let provided = req
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string());

    // The signature covers the raw body, so it must be buffered before any
    // downstream extractor parses it.
    let (parts, body) = req.into_parts();
    let bytes = match axum::body::to_bytes(body, MAX_SIGNED_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(_) => return AppError::BadRequest("request body unreadable or too large".to_string()).into_response(),
    };

    let valid = provided
        .map(|sig| state.crypto.hmac_verify(&bytes, &sig, &secret))
        .unwrap_or(false);

    if !valid {
        state
            .events
            .log(SecurityEvent::new(EventKind::SignatureInvalid, Severity::Warning, &client, &path, "POST"))
            .await;
        return AppError::SignatureInvalid.into_response();
    }

    let req = Request::from_parts(parts, Body::from(bytes));
    next.run(req).await
}
