use axum::{
    extract::{Request, State},
    http::{header::RETRY_AFTER, HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::client_ip::client_identity;
use crate::error::AppError;
use crate::events::{EventKind, SecurityEvent, Severity};
use crate::ratelimit::{key_for, RateLimitDecision};
use crate::state::AppState;

use axum::extract::connect_info::ConnectInfo;
use std::net::SocketAddr;

/// Writes the X-RateLimit-* triple onto a response.
pub fn apply_rate_limit_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    let pairs = [
        ("x-ratelimit-limit", decision.limit.to_string()),
        ("x-ratelimit-remaining", decision.remaining.to_string()),
        ("x-ratelimit-reset", decision.reset_after.as_secs().to_string()),
    ];
    for (name, value) in pairs {
        if let Ok(v) = HeaderValue::from_str(&value) {
            headers.insert(HeaderName::from_static(name), v);
        }
    }
}

/// Generic per-IP gateway limit, applied to every inbound request. Denials
/// short-circuit with a 429, a retry hint and a security event; admitted
/// requests carry their remaining quota in the response headers.
pub async fn rate_limit_middleware(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let remote_ip = req.extensions().get::<ConnectInfo<SocketAddr>>().map(|info| info.0.ip());
    let client = client_identity(req.headers(), remote_ip);

    let policy = state.config.rate_limit.per_ip_policy();
    let decision = state.limiter.check(&key_for("ip", &client), policy).await;

    if !decision.allowed {
        let retry_after_seconds = decision.retry_after_seconds();
        state
            .events
            .log(
                SecurityEvent::new(
                    EventKind::RateLimited,
                    Severity::Warning,
                    &client,
                    req.uri().path(),
                    req.method().as_str(),
                )
                .with_details(serde_json::json!({
                    "limit": decision.limit,
                    "retry_after_seconds": retry_after_seconds,
                })),
            )
            .await;

        let mut res = AppError::RateLimited { retry_after_seconds }.into_response();
        apply_rate_limit_headers(res.headers_mut(), &decision);
        if let Ok(v) = HeaderValue::from_str(&retry_after_seconds.to_string()) {
            res.headers_mut().insert(RETRY_AFTER, v);
        }
        return res;
    }

    let mut res = next.run(req).await;
    apply_rate_limit_headers(res.headers_mut(), &decision);
    res
}
