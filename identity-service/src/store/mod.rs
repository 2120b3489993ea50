//! Storage abstractions for principals, credentials, and sessions.
//!
//! Uniqueness and rotation races are decided inside the store (unique
//! index, compare-and-set), never by an application-level
//! read-check-then-write.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Credential, Principal, PrincipalStatus, Provider, RoleType, Session};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The identity key (tenant_scope, role_type, provider, provider_key)
    /// already exists among non-deleted records.
    #[error("duplicate identity")]
    DuplicateIdentity,

    #[error("store backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.is_unique_violation() {
                return StoreError::DuplicateIdentity;
            }
        }
        StoreError::Backend(anyhow::Error::new(err))
    }
}

/// Everything needed to create a principal and its credential in one
/// atomic write.
#[derive(Debug, Clone)]
pub struct NewIdentity {
    pub role_type: RoleType,
    pub tenant_scope: Option<Uuid>,
    pub provider: Provider,
    pub provider_key: String,
    pub password_hash: Option<String>,
    pub display_name: Option<String>,
}

/// Durable, uniqueness-enforcing storage for principal + credential.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Atomically create a principal with its credential. Fails with
    /// `DuplicateIdentity` when the identity key already exists among
    /// non-deleted records; soft-deleted rows do not reserve the key.
    async fn create(&self, identity: NewIdentity) -> Result<Principal, StoreError>;

    /// Look an identity up by its key. Excludes soft-deleted principals.
    async fn find_by_provider_key(
        &self,
        role_type: RoleType,
        tenant_scope: Option<Uuid>,
        provider: Provider,
        provider_key: &str,
    ) -> Result<Option<(Principal, Credential)>, StoreError>;

    /// Load a principal by id. Excludes soft-deleted principals.
    async fn find_principal(&self, principal_id: Uuid) -> Result<Option<Principal>, StoreError>;

    /// Administrative lookup that includes soft-deleted principals.
    async fn find_principal_any(
        &self,
        principal_id: Uuid,
    ) -> Result<Option<Principal>, StoreError>;

    /// Best-effort side effect of successful login.
    async fn touch_last_authenticated(
        &self,
        principal_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Administrative status change (disable, soft-delete, reactivate).
    async fn set_status(
        &self,
        principal_id: Uuid,
        status: PrincipalStatus,
    ) -> Result<(), StoreError>;

    /// Physically remove a principal and its credential. Used as the
    /// compensating delete when join fails after identity creation.
    async fn purge_principal(&self, principal_id: Uuid) -> Result<(), StoreError>;
}

/// Who won the compare-and-set on a rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotateOutcome {
    Won,
    Lost,
}

/// Storage for refresh-token rotation chains.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert(&self, session: Session) -> Result<(), StoreError>;

    async fn find_by_token_hash(&self, hash: &str) -> Result<Option<Session>, StoreError>;

    /// Atomically revoke `consumed` (iff not already revoked) and
    /// insert its successor. Exactly one of any set of concurrent
    /// callers observes `Won`.
    async fn rotate(
        &self,
        consumed: Uuid,
        now: DateTime<Utc>,
        successor: Session,
    ) -> Result<RotateOutcome, StoreError>;

    /// Idempotent: sets `revoked_at` if unset, no-ops otherwise.
    async fn revoke(&self, session_id: Uuid, now: DateTime<Utc>) -> Result<(), StoreError>;

    /// Revoke every live session of a principal (administrative sweep).
    async fn revoke_all_for_principal(
        &self,
        principal_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}
