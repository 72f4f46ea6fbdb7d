//! Security event recording.
//!
//! A pure observability sink: denial and failure paths report here, but the
//! log never influences control flow and never fails the calling request.
//! Events land in a bounded in-memory ring (oldest dropped first) and are
//! echoed through `tracing`, which in development already writes to stdout.

use std::{collections::VecDeque, sync::Arc};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    RateLimited,
    SignatureInvalid,
    AuthFailure,
    CspViolation,
    AdminAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// One security-relevant occurrence. Append-only; consumers never mutate.
#[derive(Debug, Clone, Serialize)]
pub struct SecurityEvent {
    pub kind: EventKind,
    pub severity: Severity,
    pub client: String,
    pub route: String,
    pub method: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl SecurityEvent {
    pub fn new(kind: EventKind, severity: Severity, client: &str, route: &str, method: &str) -> Self {
        Self {
            kind,
            severity,
            client: client.to_string(),
            route: route.to_string(),
            method: method.to_string(),
            timestamp: Utc::now(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Bounded in-memory event store shared across the gateway.
#[derive(Clone)]
pub struct SecurityEventLog {
    events: Arc<RwLock<VecDeque<SecurityEvent>>>,
    capacity: usize,
}

impl SecurityEventLog {
    pub fn new(capacity: usize) -> Self {
        Self { events: Arc::new(RwLock::new(VecDeque::with_capacity(capacity))), capacity: capacity.max(1) }
    }

    /// Records one event. Best-effort by design; this method cannot fail and
    /// must stay off every correctness path.
    pub async fn log(&self, event: SecurityEvent) {
        match event.severity {
            Severity::Info => tracing::info!(
                kind = ?event.kind, client = %event.client, route = %event.route, method = %event.method,
                "security event"
            ),
            Severity::Warning | Severity::Critical => tracing::warn!(
                kind = ?event.kind, client = %event.client, route = %event.route, method = %event.method,
                "security event"
            ),
        }

        let mut events = self.events.write().await;
        if events.len() >= self.capacity {
            events.pop_front();
        }
        events.push_back(event);
    }

    /// Snapshot of the most recent events, newest first.
    pub async fn recent(&self, limit: usize) -> Vec<SecurityEvent> {
        let events = self.events.read().await;
        events.iter().rev().take(limit).cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.events.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(client: &str) -> SecurityEvent {
        SecurityEvent::new(EventKind::RateLimited, Severity::Warning, client, "/api/contact", "POST")
    }

    #[tokio::test]
    async fn recent_returns_newest_first() {
        let log = SecurityEventLog::new(10);
        log.log(event("1.1.1.1")).await;
        log.log(event("2.2.2.2")).await;

        let recent = log.recent(10).await;
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].client, "2.2.2.2");
        assert_eq!(recent[1].client, "1.1.1.1");
    }

    #[tokio::test]
    async fn capacity_drops_oldest() {
        let log = SecurityEventLog::new(3);
        for i in 0..5 {
            log.log(event(&format!("10.0.0.{}", i))).await;
        }

        assert_eq!(log.len().await, 3);
        let recent = log.recent(10).await;
        assert_eq!(recent[0].client, "10.0.0.4");
        assert_eq!(recent[2].client, "10.0.0.2");
    }

    #[tokio::test]
    async fn details_survive_the_ring() {
        let log = SecurityEventLog::new(2);
        log.log(event("1.1.1.1").with_details(serde_json::json!({ "limit": 5 }))).await;

        let recent = log.recent(1).await;
        assert_eq!(recent[0].details.as_ref().unwrap()["limit"], 5);
    }
}
