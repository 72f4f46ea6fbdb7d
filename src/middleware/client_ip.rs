use axum::{
    extract::{connect_info::ConnectInfo, FromRequestParts},
    http::{request::Parts, HeaderMap},
};
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

const UNKNOWN_CLIENT: &str = "unknown";

/// Resolves the client identity used for rate-limit keys and security events.
///
/// The first `X-Forwarded-For` entry wins, then `X-Real-IP`, then the peer
/// address. Entries that do not parse as IP addresses are ignored so a spoofed
/// header cannot smuggle arbitrary strings into bucket keys.
pub fn client_identity(headers: &HeaderMap, fallback: Option<IpAddr>) -> String {
    if let Some(h) = headers.get("x-forwarded-for").and_then(|hv| hv.to_str().ok()) {
        if let Some(first) = h.split(',').next() {
            if let Ok(ip) = first.trim().parse::<IpAddr>() {
                return ip.to_string();
            }
        }
    }
    if let Some(h) = headers.get("x-real-ip").and_then(|hv| hv.to_str().ok()) {
        if let Ok(ip) = h.trim().parse::<IpAddr>() {
            return ip.to_string();
        }
    }
    if let Some(ip) = fallback {
        return ip.to_string();
    }
    UNKNOWN_CLIENT.to_string()
}

/// Optional extractor for the remote socket address. Unlike `ConnectInfo`,
/// this never rejects when the connection info extension is absent (e.g. in
/// tests driving the router directly).
#[derive(Clone, Copy, Debug, Default)]
pub struct MaybeRemoteAddr(pub Option<SocketAddr>);

impl MaybeRemoteAddr {
    pub fn ip(self) -> Option<IpAddr> {
        self.0.map(|addr| addr.ip())
    }
}

impl<S> FromRequestParts<S> for MaybeRemoteAddr
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeRemoteAddr(parts.extensions.get::<ConnectInfo<SocketAddr>>().map(|info| info.0)))
    }
}
