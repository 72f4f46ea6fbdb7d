//! Cryptographic primitives behind one swappable interface.
//!
//! The rest of the gateway only ever sees [`CryptoProvider`]: nonce
//! generation, HMAC signing/verification and adaptive password verification.
//! [`NativeCrypto`] implements everything locally. [`DelegatedCrypto`] exists
//! for execution contexts without the adaptive hash primitive and forwards
//! password verification to the full-featured deployment's verify endpoint;
//! nonces and HMAC stay local in both.

use async_trait::async_trait;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::config::{CryptoConfig, CryptoProviderKind, SecurityConfig};
use crate::error::{AppError, AppResult};

type HmacSha256 = Hmac<Sha256>;

const NONCE_BYTES: usize = 16;

/// The configured admin credential. Exactly one mode is active; resolved once
/// at startup. `Unconfigured` fails every comparison (fail closed).
#[derive(Debug, Clone)]
pub enum AdminCredential {
    /// Argon2 PHC string, verified with the adaptive (slow, salted) scheme.
    Hashed(String),
    /// Bootstrap fallback, compared in constant time.
    Plaintext(String),
    Unconfigured,
}

impl AdminCredential {
    /// Resolves the credential mode from configuration. A configured hash wins
    /// over the plaintext fallback.
    pub fn from_security_config(cfg: &SecurityConfig) -> Self {
        if let Some(hash) = cfg.admin_password_hash.as_deref().filter(|h| !h.trim().is_empty()) {
            return AdminCredential::Hashed(hash.to_string());
        }
        if let Some(pw) = cfg.admin_password.as_deref().filter(|p| !p.is_empty()) {
            return AdminCredential::Plaintext(pw.to_string());
        }
        AdminCredential::Unconfigured
    }

    pub fn is_configured(&self) -> bool {
        !matches!(self, AdminCredential::Unconfigured)
    }
}

/// Constant-time byte comparison; length mismatch compares unequal without
/// short-circuiting.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

#[async_trait]
pub trait CryptoProvider: Send + Sync {
    /// A fresh unpredictable token for CSP use, base64 URL-safe, one per request.
    fn nonce(&self) -> String;

    /// HMAC-SHA256 over the raw body, hex-encoded.
    fn hmac_sign_hex(&self, body: &[u8], secret: &str) -> String;

    /// Verifies a hex-encoded signature in constant time.
    fn hmac_verify(&self, body: &[u8], signature_hex: &str, secret: &str) -> bool {
        let expected = self.hmac_sign_hex(body, secret);
        constant_time_eq(expected.as_bytes(), signature_hex.as_bytes())
    }

    /// Compares a submitted password against the configured credential.
    /// `Ok(false)` is a normal mismatch; `Err` is an infrastructure failure
    /// which callers must treat as a failed comparison.
    async fn verify_password(&self, password: &str, credential: &AdminCredential) -> AppResult<bool>;
}

fn generate_nonce() -> String {
    let mut bytes = [0u8; NONCE_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn hmac_sign_hex(body: &[u8], secret: &str) -> String {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

fn verify_argon2_blocking(password: &str, phc: &str) -> bool {
    match PasswordHash::new(phc) {
        Ok(parsed) => Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok(),
        Err(e) => {
            tracing::warn!("Configured password hash is not a valid PHC string: {}", e);
            false
        }
    }
}

/// Produces an argon2 PHC string for `password`. Used by operators to move
/// off the plaintext fallback, and by tests.
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("password hashing failed: {}", e)))
}

/// Full-featured local provider.
#[derive(Clone, Default)]
pub struct NativeCrypto;

#[async_trait]
impl CryptoProvider for NativeCrypto {
    fn nonce(&self) -> String {
        generate_nonce()
    }

    fn hmac_sign_hex(&self, body: &[u8], secret: &str) -> String {
        hmac_sign_hex(body, secret)
    }

    async fn verify_password(&self, password: &str, credential: &AdminCredential) -> AppResult<bool> {
        match credential {
            AdminCredential::Hashed(phc) => {
                // argon2 is deliberately slow; keep it off the async workers.
                let password = password.to_string();
                let phc = phc.clone();
                tokio::task::spawn_blocking(move || verify_argon2_blocking(&password, &phc))
                    .await
                    .map_err(|e| AppError::Internal(anyhow::anyhow!("hash verification task failed: {}", e)))
            }
            AdminCredential::Plaintext(expected) => {
                Ok(constant_time_eq(expected.as_bytes(), password.as_bytes()))
            }
            AdminCredential::Unconfigured => Ok(false),
        }
    }
}

#[derive(Serialize)]
struct DelegatedVerifyRequest<'a> {
    password: &'a str,
    hash: &'a str,
}

#[derive(Deserialize)]
struct DelegatedVerifyResponse {
    valid: bool,
}

/// Reduced-capability provider: adaptive hash comparison is delegated to the
/// full-featured deployment's verify endpoint. Everything else runs locally.
#[derive(Clone)]
pub struct DelegatedCrypto {
    http: reqwest::Client,
    verify_url: String,
}

impl DelegatedCrypto {
    pub fn new(verify_url: String) -> Self {
        Self { http: reqwest::Client::new(), verify_url }
    }
}

#[async_trait]
impl CryptoProvider for DelegatedCrypto {
    fn nonce(&self) -> String {
        generate_nonce()
    }

    fn hmac_sign_hex(&self, body: &[u8], secret: &str) -> String {
        hmac_sign_hex(body, secret)
    }

    async fn verify_password(&self, password: &str, credential: &AdminCredential) -> AppResult<bool> {
        match credential {
            AdminCredential::Hashed(phc) => {
                let response = self
                    .http
                    .post(&self.verify_url)
                    .json(&DelegatedVerifyRequest { password, hash: phc })
                    .send()
                    .await
                    .map_err(|e| AppError::Internal(anyhow::anyhow!("delegated verify request failed: {}", e)))?;
                let body: DelegatedVerifyResponse = response
                    .error_for_status()
                    .map_err(|e| AppError::Internal(anyhow::anyhow!("delegated verify rejected: {}", e)))?
                    .json()
                    .await
                    .map_err(|e| AppError::Internal(anyhow::anyhow!("delegated verify response unreadable: {}", e)))?;
                Ok(body.valid)
            }
            AdminCredential::Plaintext(expected) => {
                Ok(constant_time_eq(expected.as_bytes(), password.as_bytes()))
            }
            AdminCredential::Unconfigured => Ok(false),
        }
    }
}

/// Selects the provider implementation from configuration. Call sites only
/// ever see `Arc<dyn CryptoProvider>`.
pub fn provider_from_config(cfg: &CryptoConfig) -> anyhow::Result<std::sync::Arc<dyn CryptoProvider>> {
    match cfg.provider {
        CryptoProviderKind::Native => Ok(std::sync::Arc::new(NativeCrypto)),
        CryptoProviderKind::Delegated => {
            let url = cfg
                .verify_url
                .clone()
                .ok_or_else(|| anyhow::anyhow!("crypto.verify_url is required for the delegated provider"))?;
            Ok(std::sync::Arc::new(DelegatedCrypto::new(url)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hmac_signature_verifies_and_rejects_tampering() {
        let crypto = NativeCrypto;
        let secret = "s3cr3t";
        let body = br#"{"a":1}"#;

        let sig = crypto.hmac_sign_hex(body, secret);
        assert!(crypto.hmac_verify(body, &sig, secret));
        assert!(!crypto.hmac_verify(br#"{"a":2}"#, &sig, secret));
        assert!(!crypto.hmac_verify(body, &sig, "other-secret"));
    }

    #[test]
    fn hmac_rejects_malformed_signatures() {
        let crypto = NativeCrypto;
        assert!(!crypto.hmac_verify(b"body", "", "s3cr3t"));
        assert!(!crypto.hmac_verify(b"body", "not-hex", "s3cr3t"));
    }

    #[test]
    fn nonces_are_fresh_and_urlsafe() {
        let crypto = NativeCrypto;
        let a = crypto.nonce();
        let b = crypto.nonce();
        assert_ne!(a, b);
        assert!(URL_SAFE_NO_PAD.decode(&a).is_ok());
        assert_eq!(URL_SAFE_NO_PAD.decode(&a).unwrap().len(), NONCE_BYTES);
    }

    #[tokio::test]
    async fn plaintext_credential_compares_exactly() {
        let crypto = NativeCrypto;
        let cred = AdminCredential::Plaintext("admin123".to_string());
        assert!(crypto.verify_password("admin123", &cred).await.unwrap());
        assert!(!crypto.verify_password("admin12", &cred).await.unwrap());
        assert!(!crypto.verify_password("admin1234", &cred).await.unwrap());
    }

    #[tokio::test]
    async fn hashed_credential_roundtrip() {
        let crypto = NativeCrypto;
        let phc = hash_password("hunter2").unwrap();
        let cred = AdminCredential::Hashed(phc);
        assert!(crypto.verify_password("hunter2", &cred).await.unwrap());
        assert!(!crypto.verify_password("hunter3", &cred).await.unwrap());
    }

    #[tokio::test]
    async fn malformed_hash_never_matches() {
        let crypto = NativeCrypto;
        let cred = AdminCredential::Hashed("definitely-not-a-phc-string".to_string());
        assert!(!crypto.verify_password("anything", &cred).await.unwrap());
    }

    #[tokio::test]
    async fn unconfigured_credential_fails_closed() {
        let crypto = NativeCrypto;
        assert!(!crypto.verify_password("", &AdminCredential::Unconfigured).await.unwrap());
        assert!(!crypto.verify_password("admin", &AdminCredential::Unconfigured).await.unwrap());
    }
}
