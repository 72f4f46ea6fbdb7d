//! # Torwald Gateway Library
//!
//! Torwald is a request-time security gateway that sits in front of every
//! HTTP request to a web application: it throttles abusive traffic, issues
//! per-request Content-Security-Policy nonces, authenticates form submissions
//! via HMAC and guards an administrative surface behind a shared credential.
//!
//! ## Architecture
//!
//! The application is built using:
//! - **Axum**: HTTP server, routing and the middleware pipeline
//! - **Tokio**: Async runtime
//! - **Tracing**: Structured logging with daily file rotation
//! - **hmac/sha2/argon2/subtle**: Request signing and credential verification
//!
//! ## Core Components
//!
//! - [`config`]: Layered application configuration
//! - [`error`]: Centralized error handling and HTTP error responses
//! - [`ratelimit`]: Fixed-window rate limiting over class:client keys
//! - [`csp`]: Per-request Content-Security-Policy construction
//! - [`crypto`]: Swappable cryptographic provider (native or delegated)
//! - [`events`]: Security event recording
//! - [`middleware`]: The gateway pipeline (headers, correlation, limits, signatures)
//! - [`admin`]: Admin authentication service and operator endpoints
//! - [`routes`]: Public endpoints (health, contact form, CSP reports)
//! - [`gateway`]: Router assembly
//! - [`state`]: Shared application state

pub mod admin;
pub mod config;
pub mod crypto;
pub mod csp;
pub mod error;
pub mod events;
pub mod gateway;
pub mod middleware;
pub mod ratelimit;
pub mod routes;
pub mod state;

#[cfg(test)]
mod tests;
