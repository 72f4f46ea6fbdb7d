//! Request gateway assembly.
//!
//! Builds the full router with the security pipeline layered around it.
//! Layers apply bottom-up, so the stack runs outermost-first as: security
//! headers (every response carries CSP, including denials) -> correlation id
//! -> trace -> generic per-IP rate limit -> signature gate -> routes. Admin
//! routes sit behind their own protection layer on top of all that.

use axum::{
    extract::DefaultBodyLimit,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::admin;
use crate::middleware;
use crate::routes;
use crate::state::AppState;

// Form submissions and admin payloads are tiny; oversized bodies are abuse.
const MAX_BODY_BYTES: usize = 64 * 1024;

pub fn router(state: AppState) -> Router {
    let admin_api = Router::new()
        .route("/admin/events", get(admin::handlers::recent_events))
        .route("/admin/rate-limit/reset", post(admin::handlers::reset_rate_limit))
        .route("/admin/logout", post(admin::handlers::logout))
        .route_layer(from_fn_with_state(state.clone(), admin::auth::protect_middleware));

    Router::new()
        .route("/healthz", get(routes::health::healthz))
        .route("/readyz", get(routes::health::readyz))
        .route("/version", get(routes::health::version))
        .route("/api/contact", post(routes::contact::submit_contact))
        .route("/api/csp-report", post(routes::csp_report::csp_report))
        .route("/admin/login", post(admin::handlers::login))
        .merge(admin_api)
        .with_state(state.clone())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(from_fn_with_state(state.clone(), middleware::signature::signature_middleware))
        .layer(from_fn_with_state(state.clone(), middleware::rate_limit::rate_limit_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(from_fn(middleware::correlation::correlation_middleware))
        .layer(from_fn_with_state(state, middleware::security_headers::security_headers_middleware))
}
