use service_core::error::AppError;
use thiserror::Error;

use crate::models::{Provider, RoleType};
use crate::store::StoreError;

/// Service-level error taxonomy. Everything that crosses the API
/// boundary is one of these; store and codec failures never pass
/// through verbatim.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("missing credential: local join requires a secret")]
    MissingCredential,

    #[error("identity already exists")]
    DuplicateIdentity,

    /// Unified "not found" / "wrong password" so callers cannot
    /// enumerate accounts.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("account is disabled")]
    AccountDisabled,

    /// Unified unknown/revoked/expired refresh token. The specific
    /// reason is logged server-side, never returned.
    #[error("refresh failed")]
    RefreshFailed,

    #[error("unauthenticated")]
    Unauthenticated,

    #[error("forbidden")]
    Forbidden,

    #[error("not found")]
    NotFound,

    #[error("provider {provider} is not allowed for role {role}", provider = .0.as_str(), role = .1.as_str())]
    UnsupportedProvider(Provider, RoleType),

    #[error("role {role} requires a tenant scope", role = .0.as_str())]
    TenantScopeRequired(RoleType),

    #[error("role {role} is global and cannot carry a tenant scope", role = .0.as_str())]
    TenantScopeForbidden(RoleType),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<IdentityError> for AppError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::MissingCredential => {
                AppError::BadRequest(anyhow::anyhow!("A password is required"))
            }
            IdentityError::DuplicateIdentity => {
                AppError::Conflict(anyhow::anyhow!("Identity already exists"))
            }
            IdentityError::InvalidCredentials => {
                AppError::AuthError(anyhow::anyhow!("Invalid credentials"))
            }
            IdentityError::AccountDisabled => {
                AppError::Forbidden(anyhow::anyhow!("Account is disabled"))
            }
            IdentityError::RefreshFailed => {
                AppError::AuthError(anyhow::anyhow!("Refresh failed"))
            }
            IdentityError::Unauthenticated => {
                AppError::AuthError(anyhow::anyhow!("Authentication required"))
            }
            IdentityError::Forbidden => {
                AppError::Forbidden(anyhow::anyhow!("Insufficient role"))
            }
            IdentityError::NotFound => AppError::NotFound(anyhow::anyhow!("Not found")),
            IdentityError::UnsupportedProvider(provider, role) => AppError::BadRequest(
                anyhow::anyhow!("Provider {} is not allowed for role {}", provider.as_str(), role.as_str()),
            ),
            IdentityError::TenantScopeRequired(role) => AppError::BadRequest(anyhow::anyhow!(
                "Role {} requires a tenant scope",
                role.as_str()
            )),
            IdentityError::TenantScopeForbidden(role) => AppError::BadRequest(anyhow::anyhow!(
                "Role {} cannot carry a tenant scope",
                role.as_str()
            )),
            IdentityError::Store(StoreError::DuplicateIdentity) => {
                AppError::Conflict(anyhow::anyhow!("Identity already exists"))
            }
            IdentityError::Store(StoreError::Backend(e)) => AppError::DatabaseError(e),
            IdentityError::Internal(e) => AppError::InternalError(e),
        }
    }
}
