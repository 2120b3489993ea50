//! Test helper module for identity-service integration tests.
//!
//! Builds the full router over the in-memory store so tests exercise
//! the real handler/middleware stack without a database.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::Duration;
use serde_json::Value;
use std::sync::Arc;
use tower::util::ServiceExt;

use identity_service::{
    build_router,
    config::{
        DatabaseConfig, Environment, IdentityConfig, RateLimitConfig, SecurityConfig,
        SwaggerConfig, TokenConfig,
    },
    middleware::AuthorizationGuard,
    services::{IdentityService, SessionLedger, TokenCodec},
    store::MemoryStore,
    AppState,
};
use service_core::middleware::rate_limit::create_ip_rate_limiter;

pub const TEST_SIGNING_SECRET: &str = "integration-test-signing-secret";

pub struct TestApp {
    pub state: AppState,
    pub store: MemoryStore,
}

impl TestApp {
    pub fn spawn() -> Self {
        Self::spawn_with_config(test_config())
    }

    /// Spawn with a tight login limiter for rate-limit tests.
    pub fn spawn_with_login_limit(attempts: u32) -> Self {
        let mut config = test_config();
        config.rate_limit.login_attempts = attempts;
        Self::spawn_with_config(config)
    }

    fn spawn_with_config(config: IdentityConfig) -> Self {
        let store = MemoryStore::new();
        let shared = Arc::new(store.clone());

        let codec = TokenCodec::new(TEST_SIGNING_SECRET);
        let ledger = SessionLedger::new(
            shared.clone(),
            codec.clone(),
            Duration::minutes(config.token.access_expiry_minutes),
            Duration::days(config.token.refresh_expiry_days),
        );
        let identity = IdentityService::new(shared.clone(), ledger);
        let guard = AuthorizationGuard::new(codec, shared);

        let state = AppState {
            config: config.clone(),
            identity,
            guard,
            pool: None,
            login_rate_limiter: create_ip_rate_limiter(
                config.rate_limit.login_attempts,
                config.rate_limit.login_window_seconds,
            ),
            join_rate_limiter: create_ip_rate_limiter(
                config.rate_limit.join_attempts,
                config.rate_limit.join_window_seconds,
            ),
            ip_rate_limiter: create_ip_rate_limiter(
                config.rate_limit.global_ip_limit,
                config.rate_limit.global_ip_window_seconds,
            ),
        };

        TestApp {
            state: state.clone(),
            store,
        }
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    pub async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-forwarded-for", "127.0.0.1")
            .body(Body::from(body.to_string()))
            .unwrap();

        send(self.router(), request).await
    }

    pub async fn get(&self, path: &str, bearer: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method("GET")
            .uri(path)
            .header("x-forwarded-for", "127.0.0.1");
        if let Some(token) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = builder.body(Body::empty()).unwrap();

        send(self.router(), request).await
    }
}

async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn test_config() -> IdentityConfig {
    IdentityConfig {
        common: service_core::config::Config {
            port: 0,
            bind_address: "127.0.0.1".to_string(),
        },
        // Prod + swagger off keeps the Swagger UI out of the test router.
        environment: Environment::Prod,
        service_name: "identity-service-test".to_string(),
        log_level: "warn".to_string(),
        database: DatabaseConfig {
            url: "postgres://unused".to_string(),
            max_connections: 1,
        },
        token: TokenConfig {
            signing_secret: TEST_SIGNING_SECRET.to_string(),
            access_expiry_minutes: 60,
            refresh_expiry_days: 7,
        },
        security: SecurityConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
        },
        swagger: SwaggerConfig { enabled: false },
        rate_limit: RateLimitConfig {
            login_attempts: 10_000,
            login_window_seconds: 60,
            join_attempts: 10_000,
            join_window_seconds: 60,
            global_ip_limit: 100_000,
            global_ip_window_seconds: 60,
        },
    }
}

/// Standard local-credential join payload.
pub fn join_payload(role: &str, tenant: Option<&str>, email: &str, secret: &str) -> Value {
    serde_json::json!({
        "role_type": role,
        "tenant_scope": tenant,
        "credential": { "kind": "local", "email": email, "secret": secret },
        "display_name": "Test Principal"
    })
}

pub fn login_payload(role: &str, tenant: Option<&str>, email: &str, secret: &str) -> Value {
    serde_json::json!({
        "role_type": role,
        "tenant_scope": tenant,
        "credential": { "kind": "local", "email": email, "secret": secret }
    })
}
