//! Middleware components for the request gateway.
//!
//! The gateway pipeline is assembled from these layers, outermost first:
//! security headers (so even denials carry CSP), correlation id, generic
//! per-IP rate limiting, and the HMAC signature gate for protected form
//! routes. Admin routes add their own protection layer (see `crate::admin`).

pub mod client_ip;
pub mod correlation;
pub mod rate_limit;
pub mod security_headers;
pub mod signature;

pub use client_ip::MaybeRemoteAddr;
