//! Public HTTP endpoints in front of the gateway's downstream business logic.

pub mod contact;
pub mod csp_report;
pub mod health;
