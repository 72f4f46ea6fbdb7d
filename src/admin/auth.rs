//! Administrative authentication.
//!
//! One operator, one shared credential, no server-side session store. Login
//! is rate-limited under the strict login policy before the credential is
//! even looked at. A successful login issues an opaque token embedding the
//! verified password assertion (encode-then-compare); verification decodes
//! and re-runs the same comparison against the *current* configuration, so
//! rotating the credential immediately invalidates every outstanding token
//! without a revocation list. Expiry is client-tracked: the login response
//! carries the deadline and the client discards the token at that point.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{connect_info::ConnectInfo, Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::config::AppConfig;
use crate::crypto::{AdminCredential, CryptoProvider};
use crate::error::{AppError, AppResult};
use crate::events::{EventKind, SecurityEvent, SecurityEventLog, Severity};
use crate::middleware::client_ip::client_identity;
use crate::middleware::rate_limit::apply_rate_limit_headers;
use crate::ratelimit::{key_for, RateLimiter, RateLimitPolicy};
use crate::state::AppState;

const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// A freshly issued bearer credential and its client-managed expiry.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

pub struct AdminAuthService {
    credential: AdminCredential,
    crypto: Arc<dyn CryptoProvider>,
    limiter: RateLimiter,
    events: SecurityEventLog,
    login_policy: RateLimitPolicy,
    api_policy: RateLimitPolicy,
    token_ttl: Duration,
}

impl AdminAuthService {
    pub fn new(
        config: &AppConfig,
        crypto: Arc<dyn CryptoProvider>,
        limiter: RateLimiter,
        events: SecurityEventLog,
    ) -> Self {
        let credential = AdminCredential::from_security_config(&config.security);
        if !credential.is_configured() {
            // Fail closed: every login will be refused until a credential is
            // configured. Surfaced via /readyz, never via login responses.
            tracing::warn!("No admin credential configured (admin_password / admin_password_hash); all logins will fail");
        }
        Self {
            credential,
            crypto,
            limiter,
            events,
            login_policy: config.rate_limit.login_policy(),
            api_policy: config.rate_limit.admin_api_policy(),
            token_ttl: Duration::hours(config.security.token_ttl_hours as i64),
        }
    }

    /// Whether a credential mode is active. Diagnostic only.
    pub fn credential_configured(&self) -> bool {
        self.credential.is_configured()
    }

    /// The quota applied to authenticated admin-API traffic.
    pub fn api_policy(&self) -> RateLimitPolicy {
        self.api_policy
    }

    /// Validates a submitted password and issues a token. The strict login
    /// rate limit runs first; a denial never touches the credential. Failures
    /// are logged and collapsed into one generic error.
    pub async fn login(&self, password: &str, client: &str) -> AppResult<IssuedToken> {
        let decision = self.limiter.check(&key_for("login", client), self.login_policy).await;
        if !decision.allowed {
            let retry_after_seconds = decision.retry_after_seconds();
            self.events
                .log(SecurityEvent::new(EventKind::RateLimited, Severity::Warning, client, "/admin/login", "POST"))
                .await;
            return Err(AppError::RateLimited { retry_after_seconds });
        }

        let matches = match self.crypto.verify_password(password, &self.credential).await {
            Ok(m) => m,
            Err(e) => {
                // Infrastructure failure in the provider counts as a failed
                // comparison; never authenticate on an indeterminate check.
                tracing::error!("Password verification errored: {}", e);
                false
            }
        };

        if !matches {
            self.events
                .log(SecurityEvent::new(EventKind::AuthFailure, Severity::Warning, client, "/admin/login", "POST"))
                .await;
            return Err(AppError::AuthFailure);
        }

        Ok(IssuedToken {
            token: URL_SAFE_NO_PAD.encode(password.as_bytes()),
            expires_at: Utc::now() + self.token_ttl,
        })
    }

    /// Re-derives the token's embedded assertion and re-runs the credential
    /// comparison. Malformed tokens and stale assertions both collapse into
    /// the same generic failure.
    pub async fn verify(&self, token: &str) -> AppResult<()> {
        let bytes = URL_SAFE_NO_PAD.decode(token).map_err(|_| AppError::AuthFailure)?;
        let password = String::from_utf8(bytes).map_err(|_| AppError::AuthFailure)?;

        let matches = self.crypto.verify_password(&password, &self.credential).await.unwrap_or(false);
        if matches {
            Ok(())
        } else {
            Err(AppError::AuthFailure)
        }
    }
}

/// Pulls the admin token from `Authorization: Bearer` or `X-Admin-Token`.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth) = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        if let Some(token) = auth.strip_prefix("Bearer ") {
            return Some(token.trim().to_string());
        }
    }
    headers
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
}

/// Wraps admin routes: admin-API rate limit first, then token verification,
/// then the handler. Any failure short-circuits with a generic error and a
/// security event.
pub async fn protect_middleware(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let remote_ip = req.extensions().get::<ConnectInfo<SocketAddr>>().map(|info| info.0.ip());
    let client = client_identity(req.headers(), remote_ip);
    let route = req.uri().path().to_string();
    let method = req.method().to_string();

    let decision = state
        .limiter
        .check(&key_for("admin", &client), state.admin.api_policy())
        .await;
    if !decision.allowed {
        state
            .events
            .log(SecurityEvent::new(EventKind::RateLimited, Severity::Warning, &client, &route, &method))
            .await;
        let mut res = AppError::RateLimited { retry_after_seconds: decision.retry_after_seconds() }.into_response();
        apply_rate_limit_headers(res.headers_mut(), &decision);
        return res;
    }

    let token = match bearer_token(req.headers()) {
        Some(t) => t,
        None => {
            state
                .events
                .log(SecurityEvent::new(EventKind::AuthFailure, Severity::Warning, &client, &route, &method))
                .await;
            return AppError::AuthFailure.into_response();
        }
    };

    if let Err(err) = state.admin.verify(&token).await {
        state
            .events
            .log(SecurityEvent::new(EventKind::AuthFailure, Severity::Warning, &client, &route, &method))
            .await;
        return err.into_response();
    }

    next.run(req).await
}
