//! HTTP handlers for the identity lifecycle: join, login, refresh,
//! logout, and the authenticated self view.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use service_core::error::AppError;

use crate::dtos::identity::{
    AuthResponse, JoinRequest, LoginRequest, LogoutRequest, MessageResponse, RefreshRequest,
};
use crate::middleware::CurrentPrincipal;
use crate::utils::ValidatedJson;
use crate::AppState;

/// Register a new principal and open its first session
#[utoipa::path(
    post,
    path = "/identity/join",
    request_body = JoinRequest,
    responses(
        (status = 201, description = "Principal created", body = AuthResponse),
        (status = 400, description = "Role capability violation", body = ErrorResponse),
        (status = 409, description = "Identity already taken", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Identity"
)]
pub async fn join(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<JoinRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (principal, token) = state
        .identity
        .join(
            req.role_type,
            req.tenant_scope,
            req.credential.into_spec(),
            req.display_name,
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            principal: principal.sanitized(),
            token,
        }),
    ))
}

/// Authenticate an existing principal and open a new session
#[utoipa::path(
    post,
    path = "/identity/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 403, description = "Account disabled", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Identity"
)]
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let secret = req.credential.secret();
    let (principal, token) = state
        .identity
        .login(
            req.role_type,
            req.tenant_scope,
            req.credential.provider(),
            req.credential.provider_key(),
            secret,
        )
        .await?;

    Ok((
        StatusCode::OK,
        Json(AuthResponse {
            principal: principal.sanitized(),
            token,
        }),
    ))
}

/// Exchange a refresh token for a fresh token pair
#[utoipa::path(
    post,
    path = "/identity/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Token pair rotated", body = SessionTokenPair),
        (status = 401, description = "Refresh failed", body = ErrorResponse),
        (status = 403, description = "Account disabled", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Identity"
)]
pub async fn refresh(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RefreshRequest>,
) -> Result<impl IntoResponse, AppError> {
    let token = state.identity.refresh(&req.refresh_token).await?;
    Ok((StatusCode::OK, Json(token)))
}

/// Revoke the session a refresh token belongs to
#[utoipa::path(
    post,
    path = "/identity/logout",
    request_body = LogoutRequest,
    responses(
        (status = 200, description = "Session revoked", body = MessageResponse),
        (status = 401, description = "Refresh failed", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Identity"
)]
pub async fn logout(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<LogoutRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.identity.logout(&req.refresh_token).await?;
    Ok((
        StatusCode::OK,
        Json(MessageResponse {
            message: "Logged out".to_string(),
        }),
    ))
}

/// Return the authenticated principal
#[utoipa::path(
    get,
    path = "/identity/me",
    responses(
        (status = 200, description = "Authenticated principal", body = PrincipalResponse),
        (status = 401, description = "Unauthenticated", body = ErrorResponse)
    ),
    tag = "Identity",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn me(CurrentPrincipal(principal): CurrentPrincipal) -> impl IntoResponse {
    Json(principal.sanitized())
}
