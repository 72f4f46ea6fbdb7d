use std::time::Duration;

use serde::Deserialize;

use crate::ratelimit::RateLimitPolicy;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Deployment environment. Controls CSP strictness, HSTS emission and the
/// fail-open/fail-closed behavior of the signature gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn is_development(self) -> bool {
        matches!(self, Environment::Development)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    pub environment: Environment,
    /// Shared secret for signing public form submissions. Unset: the gate
    /// fails open in development and closed in production.
    pub hmac_secret: Option<String>,
    /// Plaintext fallback credential for initial bootstrap.
    pub admin_password: Option<String>,
    /// Argon2 PHC string. Takes precedence over `admin_password` when both are set.
    pub admin_password_hash: Option<String>,
    /// CSP violation reports are sent here when configured.
    pub csp_report_uri: Option<String>,
    /// Script origins admitted outside development (analytics etc.).
    pub analytics_origins: Vec<String>,
    /// POST routes whose body must carry a valid `X-Signature`.
    pub signed_routes: Vec<String>,
    pub token_ttl_hours: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub per_ip_max: u32,
    pub per_ip_window_secs: u64,
    pub login_max: u32,
    pub login_window_secs: u64,
    pub admin_api_max: u32,
    pub admin_api_window_secs: u64,
    pub contact_max: u32,
    pub contact_window_secs: u64,
    pub sweep_interval_secs: u64,
}

impl RateLimitConfig {
    pub fn per_ip_policy(&self) -> RateLimitPolicy {
        RateLimitPolicy::new(self.per_ip_max, self.per_ip_window_secs)
    }

    pub fn login_policy(&self) -> RateLimitPolicy {
        RateLimitPolicy::new(self.login_max, self.login_window_secs)
    }

    pub fn admin_api_policy(&self) -> RateLimitPolicy {
        RateLimitPolicy::new(self.admin_api_max, self.admin_api_window_secs)
    }

    pub fn contact_policy(&self) -> RateLimitPolicy {
        RateLimitPolicy::new(self.contact_max, self.contact_window_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CryptoProviderKind {
    /// Full-featured local provider (argon2, HMAC, nonces).
    Native,
    /// Reduced provider for runtimes without the adaptive hash primitive;
    /// delegates password verification to `verify_url`.
    Delegated,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CryptoConfig {
    pub provider: CryptoProviderKind,
    pub verify_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub security: SecurityConfig,
    pub rate_limit: RateLimitConfig,
    pub crypto: CryptoConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        // Fallback: parse the embedded default TOML
        let defaults: &str = include_str!("../config/default.toml");
        match ::config::Config::builder()
            .add_source(::config::File::from_str(defaults, ::config::FileFormat::Toml))
            .build()
        {
            Ok(cfg) => match cfg.try_deserialize() {
                Ok(app_cfg) => app_cfg,
                Err(e) => {
                    eprintln!("FATAL: Failed to deserialize default config: {}", e);
                    panic!("Failed to deserialize default config: {}", e);
                }
            },
            Err(e) => {
                eprintln!("FATAL: Failed to parse default config: {}", e);
                panic!("Failed to parse default config: {}", e);
            }
        }
    }
}

pub fn load() -> anyhow::Result<AppConfig> {
    // Load .env first (optional)
    let _ = dotenvy::dotenv();

    let defaults: &str = include_str!("../config/default.toml");
    let mut builder = ::config::Config::builder()
        .add_source(::config::File::from_str(defaults, ::config::FileFormat::Toml))
        // Optional local file: torwald.toml (in CWD)
        .add_source(::config::File::with_name("torwald").required(false));

    if let Ok(custom_path) = std::env::var("TORWALD_CONFIG") {
        builder = builder.add_source(::config::File::with_name(&custom_path).required(false));
    }
    // Environment variables last to have highest precedence
    builder = builder.add_source(::config::Environment::with_prefix("TORWALD").separator("__"));

    let cfg = builder.build()?;
    let app_cfg: AppConfig = cfg.try_deserialize()?;
    validate(&app_cfg)?;
    Ok(app_cfg)
}

fn validate(cfg: &AppConfig) -> anyhow::Result<()> {
    // Server
    if cfg.server.port == 0 {
        return Err(anyhow::anyhow!("invalid server.port: {}", cfg.server.port));
    }
    #[cfg(unix)]
    if cfg.server.port < 1024 {
        tracing::warn!("Using privileged port {} - may require elevated permissions", cfg.server.port);
    }

    // Rate limit windows and ceilings must be non-degenerate
    let rl = &cfg.rate_limit;
    for (name, max, win) in [
        ("per_ip", rl.per_ip_max, rl.per_ip_window_secs),
        ("login", rl.login_max, rl.login_window_secs),
        ("admin_api", rl.admin_api_max, rl.admin_api_window_secs),
        ("contact", rl.contact_max, rl.contact_window_secs),
    ] {
        if max == 0 {
            return Err(anyhow::anyhow!("rate_limit.{}_max must be > 0", name));
        }
        if win == 0 {
            return Err(anyhow::anyhow!("rate_limit.{}_window_secs must be > 0", name));
        }
    }
    if rl.sweep_interval_secs == 0 {
        return Err(anyhow::anyhow!("rate_limit.sweep_interval_secs must be > 0"));
    }

    // Security
    if cfg.security.token_ttl_hours == 0 {
        return Err(anyhow::anyhow!("security.token_ttl_hours must be > 0"));
    }
    if cfg.security.hmac_secret.as_deref().map(|s| s.trim().is_empty()).unwrap_or(false) {
        return Err(anyhow::anyhow!("security.hmac_secret must not be blank when set"));
    }

    // Crypto
    if cfg.crypto.provider == CryptoProviderKind::Delegated && cfg.crypto.verify_url.is_none() {
        return Err(anyhow::anyhow!("crypto.verify_url is required when crypto.provider = \"delegated\""));
    }

    Ok(())
}
