use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Per-request correlation identifier, stored as a request extension and
/// echoed back to the caller.
#[derive(Debug, Clone, Copy)]
pub struct CorrelationId(pub Uuid);

/// Assigns every request a correlation id. An inbound `X-Request-Id` that
/// parses as a UUID is honored so upstream proxies can stitch traces together;
/// anything else is replaced.
pub async fn correlation_middleware(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v).ok())
        .unwrap_or_else(Uuid::new_v4);

    req.extensions_mut().insert(CorrelationId(id));

    let mut res = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&id.to_string()) {
        res.headers_mut().insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }
    res
}
