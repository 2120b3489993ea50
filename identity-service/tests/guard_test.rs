//! Bearer authentication over the protected routes.

mod common;

use axum::http::StatusCode;
use common::{join_payload, TestApp};
use identity_service::models::PrincipalStatus;
use identity_service::store::CredentialStore;

#[tokio::test]
async fn me_returns_the_authenticated_principal() {
    let app = TestApp::spawn();

    let (_, body) = app
        .post(
            "/identity/join",
            join_payload("pmo", None, "a@x.com", "p1"),
        )
        .await;
    let access = body["token"]["access"].as_str().unwrap().to_string();

    let (status, me) = app.get("/identity/me", Some(&access)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["principal_id"], body["principal"]["principal_id"]);
    assert_eq!(me["role_type"], "pmo");
    assert!(me.get("password_hash").is_none());
}

#[tokio::test]
async fn missing_and_malformed_bearer_tokens_are_unauthorized() {
    let app = TestApp::spawn();

    let (status, body) = app.get("/identity/me", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        body["error"],
        "Missing or invalid Authorization header"
    );

    let (status, _) = app.get("/identity/me", Some("not-a-jwt")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn valid_token_stops_working_once_the_account_is_disabled() {
    let app = TestApp::spawn();

    let (_, body) = app
        .post(
            "/identity/join",
            join_payload("pmo", None, "a@x.com", "p1"),
        )
        .await;
    let access = body["token"]["access"].as_str().unwrap().to_string();
    let principal_id = body["principal"]["principal_id"]
        .as_str()
        .unwrap()
        .parse()
        .unwrap();

    let (status, _) = app.get("/identity/me", Some(&access)).await;
    assert_eq!(status, StatusCode::OK);

    app.store
        .set_status(principal_id, PrincipalStatus::Disabled)
        .await
        .unwrap();

    let (status, _) = app.get("/identity/me", Some(&access)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn health_endpoint_is_public() {
    let app = TestApp::spawn();

    let (status, body) = app.get("/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}
