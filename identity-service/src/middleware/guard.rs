//! Authorization guard - resolves the calling principal and enforces
//! role/tenant/ownership scoping before a protected operation runs.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use uuid::Uuid;

use service_core::error::AppError;

use crate::models::{Principal, RoleType};
use crate::services::{IdentityError, TokenCodec};
use crate::store::CredentialStore;
use crate::AppState;

/// The scope a resource is restricted to.
#[derive(Debug, Clone, Copy)]
pub enum ResourceScope {
    Tenant(Uuid),
    Owner(Uuid),
}

#[derive(Clone)]
pub struct AuthorizationGuard {
    codec: TokenCodec,
    credentials: Arc<dyn CredentialStore>,
}

impl AuthorizationGuard {
    pub fn new(codec: TokenCodec, credentials: Arc<dyn CredentialStore>) -> Self {
        Self { codec, credentials }
    }

    /// Verify a bearer token and resolve its principal.
    ///
    /// The store re-load is mandatory: an access token stays
    /// cryptographically valid after account disablement, so existence
    /// and active status must be confirmed on every request.
    pub async fn authenticate(&self, bearer_token: &str) -> Result<Principal, IdentityError> {
        let claims = self.codec.verify_access(bearer_token).map_err(|e| {
            tracing::debug!(reason = %e, "Bearer token rejected");
            IdentityError::Unauthenticated
        })?;

        let principal = self
            .credentials
            .find_principal(claims.sub)
            .await?
            .ok_or(IdentityError::Unauthenticated)?;

        if !principal.is_active() {
            return Err(IdentityError::Unauthenticated);
        }

        // A token minted under one role/tenant must not authenticate a
        // principal whose stored identity has since drifted.
        if principal.role_type != claims.role || principal.tenant_scope != claims.tenant {
            tracing::warn!(
                principal_id = %principal.principal_id,
                "Token claims do not match the stored principal"
            );
            return Err(IdentityError::Unauthenticated);
        }

        Ok(principal)
    }

    /// Role check: authenticated but wrong role is a distinct,
    /// non-opaque failure.
    pub fn authorize_role(
        &self,
        principal: &Principal,
        allowed: &[RoleType],
    ) -> Result<(), IdentityError> {
        if allowed.contains(&principal.role_type) {
            Ok(())
        } else {
            Err(IdentityError::Forbidden)
        }
    }

    /// Tenant/owner scope check. A mismatch yields the same error
    /// class as a missing resource, so cross-tenant existence cannot
    /// be probed. Elevated roles pass by explicit allow-list only.
    pub fn authorize_scope(
        &self,
        principal: &Principal,
        scope: ResourceScope,
    ) -> Result<(), IdentityError> {
        if principal.role_type.capabilities().scope_exempt {
            return Ok(());
        }

        let in_scope = match scope {
            ResourceScope::Tenant(tenant) => principal.tenant_scope == Some(tenant),
            ResourceScope::Owner(owner_id) => principal.principal_id == owner_id,
        };

        if in_scope {
            Ok(())
        } else {
            Err(IdentityError::NotFound)
        }
    }
}

/// Middleware that requires a valid bearer token and stores the
/// resolved principal in request extensions.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| {
            AppError::Unauthorized(anyhow::anyhow!("Missing or invalid Authorization header"))
        })?;

    let principal = state.guard.authenticate(token).await.map_err(AppError::from)?;

    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}

/// Extractor for the authenticated principal in handlers.
pub struct CurrentPrincipal(pub Principal);

#[axum::async_trait]
impl<S> FromRequestParts<S> for CurrentPrincipal
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let principal = parts.extensions.get::<Principal>().cloned().ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!(
                "Principal missing from request extensions"
            ))
        })?;

        Ok(CurrentPrincipal(principal))
    }
}
