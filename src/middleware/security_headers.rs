//! Security headers middleware for HTTP responses.
//!
//! Generates the per-request CSP nonce, builds the policy for the configured
//! environment and attaches it together with the standard hardening headers.
//! Runs outermost in the middleware stack so rate-limit and auth denials
//! carry the same headers as successful responses.

use axum::{
    extract::{Request, State},
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};

use crate::csp::{CspDirectiveSet, CspNonce};
use crate::state::AppState;

/// Adds CSP and hardening headers to every response.
///
/// - `Content-Security-Policy` (report-only variant in development)
/// - `X-Frame-Options: DENY` - clickjacking defense
/// - `X-Content-Type-Options: nosniff`
/// - `Referrer-Policy: strict-origin-when-cross-origin`
/// - `Permissions-Policy` - disables sensitive browser APIs
/// - `Strict-Transport-Security` - production only
///
/// The fresh nonce is stored as a request extension so downstream handlers
/// can embed it in inline content.
pub async fn security_headers_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let nonce = state.crypto.nonce();
    req.extensions_mut().insert(CspNonce(nonce.clone()));

    let mut res = next.run(req).await;
    let headers = res.headers_mut();

    let sec = &state.config.security;
    let is_development = sec.environment.is_development();

    let policy = CspDirectiveSet::build(&nonce, is_development, &sec.analytics_origins);
    let csp_value = policy.serialize(sec.csp_report_uri.as_deref());
    let csp_header = if is_development {
        HeaderName::from_static("content-security-policy-report-only")
    } else {
        HeaderName::from_static("content-security-policy")
    };
    if let Ok(value) = HeaderValue::from_str(&csp_value) {
        headers.insert(csp_header, value);
    }

    headers.insert(HeaderName::from_static("x-frame-options"), HeaderValue::from_static("DENY"));
    headers.insert(HeaderName::from_static("x-content-type-options"), HeaderValue::from_static("nosniff"));
    headers.insert(
        HeaderName::from_static("referrer-policy"),
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    headers.insert(
        HeaderName::from_static("permissions-policy"),
        HeaderValue::from_static("geolocation=(), microphone=(), camera=()"),
    );

    if !is_development {
        headers.insert(
            HeaderName::from_static("strict-transport-security"),
            HeaderValue::from_static("max-age=31536000; includeSubDomains"),
        );
    }

    res
}
