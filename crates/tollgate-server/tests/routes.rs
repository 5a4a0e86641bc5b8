//! Route behaviour once the gate has let a request through.

mod common;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use common::{error_code, TestApp};
use serde_json::json;
use tower::ServiceExt;

#[tokio::test]
async fn test_health_is_public() {
    let app = TestApp::new();
    let (status, body) = app.get("/internal/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_unknown_route_returns_json_404() {
    let app = TestApp::new();
    let (status, body) = app.get("/v1/nothing-here", Some(app.admin)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(error_code(&body), "not_found");
    assert_eq!(body["error"]["message"], "Route /v1/nothing-here not found");
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let app = TestApp::new();
    let limit = common::bind_config().body_limit_bytes;
    let payload = "x".repeat(limit + 1);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/v1/users")
        .header(header::AUTHORIZATION, format!("Bearer {}", app.token_for(app.admin)))
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CONTENT_LENGTH, payload.len())
        .body(Body::from(payload))
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_request_id_is_propagated() {
    let app = TestApp::new();
    let request = Request::builder()
        .uri("/internal/health")
        .header("x-request-id", "req-123")
        .body(Body::empty())
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.headers()["x-request-id"], "req-123");
}

#[tokio::test]
async fn test_roles_lists_registry() {
    let app = TestApp::new();
    let (status, body) = app.get("/v1/roles", Some(app.alice)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"], json!([]));
    assert_eq!(body["data"]["admin"].as_array().map(Vec::len), Some(4));
}

#[tokio::test]
async fn test_admin_creates_user_and_duplicates_conflict() {
    let app = TestApp::new();
    let new_user = json!({ "name": "Carol", "email": "carol@example.com" });

    let (status, body) = app
        .send(Method::POST, "/v1/users", Some(app.admin), Some(new_user.clone()))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["role"], "user");

    let (status, body) = app
        .send(Method::POST, "/v1/users", Some(app.admin), Some(new_user))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "conflict");
}

#[tokio::test]
async fn test_invalid_body_reports_fields() {
    let app = TestApp::new();
    let (status, body) = app
        .send(
            Method::POST,
            "/v1/users",
            Some(app.admin),
            Some(json!({ "name": "", "email": "nope" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "validation_error");
    assert!(body["error"]["fields"]["email"].is_array());
    assert!(body["error"]["fields"]["name"].is_array());
}

#[tokio::test]
async fn test_empty_update_is_rejected() {
    let app = TestApp::new();
    let (status, body) = app
        .send(
            Method::PATCH,
            &format!("/v1/users/{}", app.alice),
            Some(app.alice),
            Some(json!({})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "bad_request");
}

#[tokio::test]
async fn test_owner_manages_profile() {
    let app = TestApp::new();
    let uri = format!("/v1/users/{}/profile", app.alice);

    let (status, body) = app
        .send(
            Method::PUT,
            &uri,
            Some(app.alice),
            Some(json!({ "bio": "Mathematician", "avatar_url": "https://example.com/a.png" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["bio"], "Mathematician");

    let (status, body) = app.get(&uri, Some(app.alice)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["avatar_url"], "https://example.com/a.png");

    let (status, _) = app.get(&uri, Some(app.bob)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_payments_for_owner_and_admin() {
    let app = TestApp::new();
    let uri = format!("/v1/users/{}/payments", app.bob);

    let (status, body) = app
        .send(
            Method::POST,
            &uri,
            Some(app.bob),
            Some(json!({ "amount_cents": 1500, "currency": "usd" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["currency"], "USD");

    let (status, body) = app.get(&uri, Some(app.admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total_cents"], 1500);
    assert_eq!(body["data"]["payments"].as_array().map(Vec::len), Some(1));

    let (status, _) = app.get(&uri, Some(app.alice)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_payment_total_does_not_overflow() {
    let app = TestApp::new();
    let uri = format!("/v1/users/{}/payments", app.alice);

    for _ in 0..2 {
        let (status, _) = app
            .send(
                Method::POST,
                &uri,
                Some(app.alice),
                Some(json!({ "amount_cents": i64::MAX, "currency": "usd" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = app.get(&uri, Some(app.alice)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total_cents"], 2 * (i64::MAX as u64));
}

#[tokio::test]
async fn test_delete_then_lookup_is_not_found() {
    let app = TestApp::new();
    let uri = format!("/v1/users/{}", app.bob);

    let (status, body) = app.send(Method::DELETE, &uri, Some(app.admin), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_null());

    let (status, body) = app.get(&uri, Some(app.admin)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), "resource_not_found");
    assert_eq!(body["error"]["details"]["resource"], "user");

    let (status, _) = app
        .get(&format!("/v1/users/{}/payments", app.bob), Some(app.admin))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_deleted_user_token_no_longer_verifies() {
    let app = TestApp::new();
    let uri = format!("/v1/users/{}", app.bob);

    let (status, _) = app.send(Method::DELETE, &uri, Some(app.bob), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.get("/v1/auth/me", Some(app.bob)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
