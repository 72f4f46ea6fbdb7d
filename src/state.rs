use std::sync::Arc;

use crate::admin::auth::AdminAuthService;
use crate::config::AppConfig;
use crate::crypto::{self, CryptoProvider};
use crate::events::SecurityEventLog;
use crate::ratelimit::RateLimiter;

/// Recent events kept for the admin inspection endpoint.
const EVENT_LOG_CAPACITY: usize = 512;

/// The shared application state.
///
/// Holds the gateway's shared services: the bucket store every in-flight
/// request mutates, the crypto provider, the admin auth service and the
/// security event log. Cloneable for Axum's request extraction; config is
/// read-only after startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    /// Shared fixed-window bucket store. All route classes (ip, login,
    /// admin, contact) live in this one limiter under prefixed keys.
    pub limiter: RateLimiter,
    pub crypto: Arc<dyn CryptoProvider>,
    pub admin: Arc<AdminAuthService>,
    pub events: SecurityEventLog,
}

impl AppState {
    /// Builds the state from configuration. Fails only when the crypto
    /// provider selection is inconsistent (delegated without a verify URL).
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        let crypto = crypto::provider_from_config(&config.crypto)?;
        let limiter = RateLimiter::new();
        let events = SecurityEventLog::new(EVENT_LOG_CAPACITY);
        let admin = Arc::new(AdminAuthService::new(
            &config,
            crypto.clone(),
            limiter.clone(),
            events.clone(),
        ));

        Ok(Self { config: Arc::new(config), limiter, crypto, admin, events })
    }
}
