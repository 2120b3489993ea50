pub mod config;
pub mod db;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod store;
pub mod utils;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    rate_limit::ip_rate_limit_middleware, security_headers::security_headers_middleware,
    tracing::request_id_middleware,
};
use sqlx::PgPool;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{openapi::security::SecurityScheme, Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::config::IdentityConfig;
use crate::middleware::AuthorizationGuard;
use crate::services::IdentityService;

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        handlers::identity::join,
        handlers::identity::login,
        handlers::identity::refresh,
        handlers::identity::logout,
        handlers::identity::me,
    ),
    components(
        schemas(
            dtos::ErrorResponse,
            dtos::identity::CredentialDto,
            dtos::identity::JoinRequest,
            dtos::identity::LoginRequest,
            dtos::identity::RefreshRequest,
            dtos::identity::LogoutRequest,
            dtos::identity::AuthResponse,
            dtos::identity::MessageResponse,
            models::PrincipalResponse,
            models::PrincipalStatus,
            models::RoleType,
            models::Provider,
            models::SessionTokenPair,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Identity", description = "Principal lifecycle and session management"),
        (name = "Observability", description = "Service health")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    utoipa::openapi::security::HttpBuilder::new()
                        .scheme(utoipa::openapi::security::HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: IdentityConfig,
    pub identity: IdentityService,
    pub guard: AuthorizationGuard,
    /// Absent when the service runs over the in-memory store.
    pub pool: Option<PgPool>,
    pub login_rate_limiter: service_core::middleware::rate_limit::IpRateLimiter,
    pub join_rate_limiter: service_core::middleware::rate_limit::IpRateLimiter,
    pub ip_rate_limiter: service_core::middleware::rate_limit::IpRateLimiter,
}

pub fn build_router(state: AppState) -> Router {
    // Login and join get their own, tighter limiters.
    let login_limiter = state.login_rate_limiter.clone();
    let login_route = Router::new()
        .route("/identity/login", post(handlers::identity::login))
        .layer(from_fn_with_state(login_limiter, ip_rate_limit_middleware));

    let join_limiter = state.join_rate_limiter.clone();
    let join_route = Router::new()
        .route("/identity/join", post(handlers::identity::join))
        .layer(from_fn_with_state(join_limiter, ip_rate_limit_middleware));

    let ip_limiter = state.ip_rate_limiter.clone();

    let mut app = Router::new().route("/health", get(health_check));

    let swagger_enabled =
        state.config.environment == config::Environment::Dev || state.config.swagger.enabled;
    if swagger_enabled {
        app = app.merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()));
    }

    app.merge(login_route)
        .merge(join_route)
        .route("/identity/refresh", post(handlers::identity::refresh))
        .route("/identity/logout", post(handlers::identity::logout))
        .merge(
            Router::new()
                .route("/identity/me", get(handlers::identity::me))
                .layer(from_fn_with_state(
                    state.clone(),
                    middleware::auth_middleware,
                )),
        )
        .with_state(state.clone())
        .layer(from_fn_with_state(ip_limiter, ip_rate_limit_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(
                    state
                        .config
                        .security
                        .allowed_origins
                        .iter()
                        .filter_map(|o| o.parse::<axum::http::HeaderValue>().ok())
                        .collect::<Vec<axum::http::HeaderValue>>(),
                )
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::OPTIONS,
                ])
                .allow_headers([
                    axum::http::header::AUTHORIZATION,
                    axum::http::header::CONTENT_TYPE,
                ]),
        )
}

/// Service health check
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
        (status = 503, description = "Service is unhealthy")
    ),
    tag = "Observability"
)]
pub async fn health_check(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Result<axum::Json<serde_json::Value>, AppError> {
    if let Some(pool) = &state.pool {
        db::health_check(pool).await.map_err(|e| {
            tracing::error!(error = %e, "Database health check failed");
            AppError::DatabaseError(anyhow::anyhow!("Database unavailable"))
        })?;
    }

    Ok(axum::Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
    })))
}
