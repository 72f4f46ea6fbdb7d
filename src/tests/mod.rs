//! Integration tests for the gateway.
//!
//! These drive the fully assembled router (all middleware layers) through
//! `tower::ServiceExt::oneshot`, the same way a client would hit the server.
//!
//! - **gateway_tests**: headers, rate limiting, signature gate, CSP reports
//! - **admin_api_tests**: login, protection layer, rate-limit reset flows
//! - **config_tests**: configuration defaults and credential resolution

pub mod admin_api_tests;
