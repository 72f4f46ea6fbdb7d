use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};

use crate::events::{EventKind, SecurityEvent, Severity};
use crate::middleware::client_ip::client_identity;
use crate::middleware::MaybeRemoteAddr;
use crate::state::AppState;

// Browsers retry aggressively on non-2xx report responses; cap what we even
// look at and always acknowledge.
const MAX_REPORT_BYTES: usize = 16 * 1024;

/// POST /api/csp-report - browser-submitted CSP violation reports.
///
/// Always responds 204 regardless of whether the body parsed, so a malformed
/// or truncated report never triggers a browser retry storm. Parsed reports
/// are forwarded to the security event log.
pub async fn csp_report(
    State(state): State<AppState>,
    MaybeRemoteAddr(remote): MaybeRemoteAddr,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let client = client_identity(&headers, remote.map(|a| a.ip()));

    let details = if body.len() <= MAX_REPORT_BYTES {
        serde_json::from_slice::<serde_json::Value>(&body).ok()
    } else {
        None
    };

    let mut event = SecurityEvent::new(EventKind::CspViolation, Severity::Info, &client, "/api/csp-report", "POST");
    if let Some(details) = details {
        event = event.with_details(details);
    }
    state.events.log(event).await;

    StatusCode::NO_CONTENT
}
