//! Per-request Content-Security-Policy construction.
//!
//! The directive template is fixed policy data parameterized by the current
//! nonce and the deployment environment. Development admits loopback and
//! websocket origins for live reloading; production instead pins the
//! analytics allow-list and enables `upgrade-insecure-requests`.

/// The per-request CSP nonce, stored as a request extension so downstream
/// handlers can embed it in inline scripts/styles. One per request, never
/// reused.
#[derive(Debug, Clone)]
pub struct CspNonce(pub String);

/// An ordered set of CSP directives plus the valueless
/// `upgrade-insecure-requests` toggle.
#[derive(Debug, Clone)]
pub struct CspDirectiveSet {
    directives: Vec<(&'static str, Vec<String>)>,
    upgrade_insecure: bool,
}

impl CspDirectiveSet {
    /// Builds the directive set for one request. Pure function of the nonce,
    /// the environment flag and the static template.
    pub fn build(nonce: &str, is_development: bool, analytics_origins: &[String]) -> Self {
        let nonce_source = format!("'nonce-{}'", nonce);

        let mut script_src = vec!["'self'".to_string(), nonce_source.clone()];
        let mut connect_src = vec!["'self'".to_string()];
        if is_development {
            // Live-reload tooling serves from loopback and talks over websockets.
            script_src.push("http://localhost:*".to_string());
            script_src.push("http://127.0.0.1:*".to_string());
            connect_src.push("ws://localhost:*".to_string());
            connect_src.push("ws://127.0.0.1:*".to_string());
            connect_src.push("http://localhost:*".to_string());
        } else {
            for origin in analytics_origins {
                script_src.push(origin.clone());
                connect_src.push(origin.clone());
            }
        }

        let directives = vec![
            ("default-src", vec!["'self'".to_string()]),
            ("script-src", script_src),
            ("style-src", vec!["'self'".to_string(), nonce_source]),
            ("img-src", vec!["'self'".to_string(), "data:".to_string(), "https:".to_string()]),
            ("font-src", vec!["'self'".to_string(), "data:".to_string()]),
            ("connect-src", connect_src),
            ("object-src", vec!["'none'".to_string()]),
            ("base-uri", vec!["'self'".to_string()]),
            ("form-action", vec!["'self'".to_string()]),
            ("frame-ancestors", vec!["'none'".to_string()]),
        ];

        Self { directives, upgrade_insecure: !is_development }
    }

    /// Serializes to a header value, appending `report-uri` when a violation
    /// endpoint is configured.
    pub fn serialize(&self, report_uri: Option<&str>) -> String {
        let mut parts: Vec<String> = self
            .directives
            .iter()
            .map(|(name, sources)| format!("{} {}", name, sources.join(" ")))
            .collect();
        if self.upgrade_insecure {
            parts.push("upgrade-insecure-requests".to_string());
        }
        if let Some(uri) = report_uri {
            parts.push(format!("report-uri {}", uri));
        }
        parts.join("; ")
    }

    #[cfg(test)]
    fn sources(&self, name: &str) -> Option<&[String]> {
        self.directives.iter().find(|(n, _)| *n == name).map(|(_, s)| s.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NONCE: &str = "dGVzdC1ub25jZQ";

    #[test]
    fn development_admits_loopback_and_websockets() {
        let set = CspDirectiveSet::build(NONCE, true, &[]);

        let script = set.sources("script-src").unwrap();
        assert!(script.iter().any(|s| s == &format!("'nonce-{}'", NONCE)));
        assert!(script.iter().any(|s| s.starts_with("http://localhost")));

        let connect = set.sources("connect-src").unwrap();
        assert!(connect.iter().any(|s| s.starts_with("ws://")));

        let header = set.serialize(None);
        assert!(!header.contains("upgrade-insecure-requests"));
    }

    #[test]
    fn production_pins_analytics_and_upgrades() {
        let origins = vec!["https://plausible.io".to_string()];
        let set = CspDirectiveSet::build(NONCE, false, &origins);

        let script = set.sources("script-src").unwrap();
        assert!(script.iter().any(|s| s == "https://plausible.io"));
        assert!(!script.iter().any(|s| s.contains("localhost")));

        let header = set.serialize(None);
        assert!(header.contains("upgrade-insecure-requests"));
        assert!(!header.contains("ws://"));
        assert!(header.contains("frame-ancestors 'none'"));
        assert!(header.contains("object-src 'none'"));
    }

    #[test]
    fn serialization_joins_with_semicolons_and_appends_report_uri() {
        let set = CspDirectiveSet::build(NONCE, false, &[]);
        let header = set.serialize(Some("/api/csp-report"));

        assert!(header.starts_with("default-src 'self'; script-src"));
        assert!(header.ends_with("report-uri /api/csp-report"));
    }
}
