//! IP rate limiting on the login route.

mod common;

use axum::http::StatusCode;
use common::{login_payload, TestApp};

#[tokio::test]
async fn login_attempts_are_limited_per_ip() {
    let app = TestApp::spawn_with_login_limit(3);

    let payload = login_payload("pmo", None, "a@x.com", "wrong");
    for _ in 0..3 {
        let (status, _) = app.post("/identity/login", payload.clone()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    let (status, _) = app.post("/identity/login", payload).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn limits_are_keyed_by_client_ip() {
    let app = TestApp::spawn_with_login_limit(1);

    let payload = login_payload("pmo", None, "a@x.com", "wrong");

    // Uses the default helper IP.
    let (status, _) = app.post("/identity/login", payload.clone()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.post("/identity/login", payload.clone()).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    // A different forwarded IP gets its own budget.
    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/identity/login")
        .header(axum::http::header::CONTENT_TYPE, "application/json")
        .header("x-forwarded-for", "10.9.8.7")
        .body(axum::body::Body::from(payload.to_string()))
        .unwrap();
    let response = tower::util::ServiceExt::oneshot(app.router(), request)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
