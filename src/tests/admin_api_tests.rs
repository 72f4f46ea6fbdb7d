use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt; // for .collect()
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::config::AppConfig;
use crate::gateway;
use crate::state::AppState;

fn admin_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.rate_limit.per_ip_max = 1000;
    config.security.admin_password = Some("admin123".to_string());
    config
}

fn test_app(config: AppConfig) -> Router {
    let state = AppState::new(config).expect("state construction");
    gateway::router(state)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn login_request(password: &str, client: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/admin/login")
        .header("content-type", "application/json")
        .header("x-forwarded-for", client.to_string())
        .body(Body::from(json!({ "password": password }).to_string()))
        .unwrap()
}

async fn login(app: &Router, password: &str, client: &str) -> axum::response::Response {
    app.clone().oneshot(login_request(password, client)).await.unwrap()
}

#[tokio::test]
async fn login_issues_token_and_protect_admits_it() {
    let app = test_app(admin_config());

    let response = login(&app, "admin123", "203.0.113.20").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let token = body["token"].as_str().unwrap().to_string();
    assert!(body["expires_at"].as_str().is_some());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/admin/events")
                .header("authorization", format!("Bearer {}", token))
                .header("x-forwarded-for", "203.0.113.20")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["count"].as_u64().is_some());
}

#[tokio::test]
async fn custom_admin_token_header_is_accepted() {
    let app = test_app(admin_config());

    let response = login(&app, "admin123", "203.0.113.21").await;
    let token = body_json(response).await["token"].as_str().unwrap().to_string();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/admin/events")
                .header("x-admin-token", token)
                .header("x-forwarded-for", "203.0.113.21")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn wrong_password_fails_with_generic_message() {
    let app = test_app(admin_config());

    let response = login(&app, "wrong", "203.0.113.22").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "AUTH_FAILED");
    assert_eq!(body["error"]["message"], "Authentication failed");
}

#[tokio::test]
async fn unconfigured_credential_fails_indistinguishably() {
    let mut config = admin_config();
    config.security.admin_password = None;
    let app = test_app(config);

    let response = login(&app, "admin123", "203.0.113.23").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    // Same code and message as a wrong password; configuration state never leaks
    assert_eq!(body["error"]["code"], "AUTH_FAILED");
    assert_eq!(body["error"]["message"], "Authentication failed");
}

#[tokio::test]
async fn protected_routes_reject_missing_and_malformed_tokens() {
    let app = test_app(admin_config());

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/admin/events")
                .header("x-forwarded-for", "203.0.113.24")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/admin/events")
                .header("authorization", "Bearer !!!garbage!!!")
                .header("x-forwarded-for", "203.0.113.24")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_brute_force_is_rate_limited() {
    let mut config = admin_config();
    config.rate_limit.login_max = 2;
    let app = test_app(config);

    assert_eq!(login(&app, "wrong", "203.0.113.25").await.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(login(&app, "wrong", "203.0.113.25").await.status(), StatusCode::UNAUTHORIZED);

    // Third attempt is denied before credentials are consulted
    let response = login(&app, "admin123", "203.0.113.25").await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body_json(response).await["error"]["code"], "RATE_LIMITED");

    // Another client can still log in
    assert_eq!(login(&app, "admin123", "203.0.113.26").await.status(), StatusCode::OK);
}

#[tokio::test]
async fn rate_limit_reset_unblocks_a_throttled_client() {
    let mut config = admin_config();
    config.rate_limit.per_ip_max = 2;
    let app = test_app(config);

    let blocked_client = "198.51.100.40";
    let healthz = |client: &str| {
        Request::builder()
            .uri("/healthz")
            .header("x-forwarded-for", client.to_string())
            .body(Body::empty())
            .unwrap()
    };

    // Exhaust the generic quota for one client
    for _ in 0..2 {
        assert_eq!(app.clone().oneshot(healthz(blocked_client)).await.unwrap().status(), StatusCode::OK);
    }
    assert_eq!(
        app.clone().oneshot(healthz(blocked_client)).await.unwrap().status(),
        StatusCode::TOO_MANY_REQUESTS
    );

    // Operator (different identity) logs in and clears that bucket
    let response = login(&app, "admin123", "203.0.113.27").await;
    let token = body_json(response).await["token"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/admin/rate-limit/reset")
                .header("authorization", format!("Bearer {}", token))
                .header("content-type", "application/json")
                .header("x-forwarded-for", "203.0.113.27")
                .body(Body::from(json!({ "action": "ip", "ip": blocked_client }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["cleared"], format!("ip:{}", blocked_client));

    // Blocked client is admitted again
    assert_eq!(app.oneshot(healthz(blocked_client)).await.unwrap().status(), StatusCode::OK);
}

#[tokio::test]
async fn reset_all_and_invalid_combinations() {
    let app = test_app(admin_config());

    let response = login(&app, "admin123", "203.0.113.28").await;
    let token = body_json(response).await["token"].as_str().unwrap().to_string();

    let reset = |body: Value, token: &str| {
        Request::builder()
            .method("POST")
            .uri("/admin/rate-limit/reset")
            .header("authorization", format!("Bearer {}", token))
            .header("content-type", "application/json")
            .header("x-forwarded-for", "203.0.113.28")
            .body(Body::from(body.to_string()))
            .unwrap()
    };

    let response = app.clone().oneshot(reset(json!({ "action": "all" }), &token)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["cleared"], "all");

    let response = app.clone().oneshot(reset(json!({ "action": "contact" }), &token)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["cleared"], "contact");

    // "all" with an ip is a caller mistake
    let response = app
        .oneshot(reset(json!({ "action": "all", "ip": "1.2.3.4" }), &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn failed_logins_appear_in_the_event_log() {
    let app = test_app(admin_config());

    let _ = login(&app, "wrong", "203.0.113.29").await;

    let response = login(&app, "admin123", "203.0.113.29").await;
    let token = body_json(response).await["token"].as_str().unwrap().to_string();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/admin/events?limit=10")
                .header("authorization", format!("Bearer {}", token))
                .header("x-forwarded-for", "203.0.113.29")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let events = body["events"].as_array().unwrap();
    assert!(events.iter().any(|e| e["kind"] == "auth_failure" && e["client"] == "203.0.113.29"));
}

#[tokio::test]
async fn logout_acknowledges_without_state() {
    let app = test_app(admin_config());

    let response = login(&app, "admin123", "203.0.113.30").await;
    let token = body_json(response).await["token"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/admin/logout")
                .header("authorization", format!("Bearer {}", token))
                .header("x-forwarded-for", "203.0.113.30")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // Stateless tokens: the credential still verifies until rotation/expiry
    let response = app
        .oneshot(
            Request::builder()
                .uri("/admin/events")
                .header("authorization", format!("Bearer {}", token))
                .header("x-forwarded-for", "203.0.113.30")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
