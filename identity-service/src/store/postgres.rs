//! PostgreSQL adapter for both store traits.
//!
//! The identity uniqueness race is decided by a partial unique index
//! (`uq_principals_identity`); rotation by a compare-and-set UPDATE on
//! `revoked_at IS NULL`. See `migrations/0001_identity.sql`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::{Credential, Principal, PrincipalStatus, Provider, RoleType, Session};

use super::{
    CredentialStore, NewIdentity, RotateOutcome, SessionStore, StoreError,
};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Principal + credential live in one row: the relationship is 1:1 and
/// a single insert keeps identity creation atomic under the unique index.
#[derive(Debug, FromRow)]
struct PrincipalRow {
    principal_id: Uuid,
    role_type: String,
    tenant_scope: Option<Uuid>,
    display_name: Option<String>,
    principal_status: String,
    provider: String,
    provider_key: String,
    password_hash: Option<String>,
    last_authenticated_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl PrincipalRow {
    fn into_principal(self) -> Result<Principal, StoreError> {
        let role_type = RoleType::parse(&self.role_type)
            .ok_or_else(|| anyhow::anyhow!("unknown role_type code: {}", self.role_type))?;
        let status = PrincipalStatus::parse(&self.principal_status).ok_or_else(|| {
            anyhow::anyhow!("unknown principal_status code: {}", self.principal_status)
        })?;

        Ok(Principal {
            principal_id: self.principal_id,
            role_type,
            tenant_scope: self.tenant_scope,
            display_name: self.display_name,
            status,
            created_at: self.created_at,
        })
    }

    fn into_pair(self) -> Result<(Principal, Credential), StoreError> {
        let provider = Provider::parse(&self.provider)
            .ok_or_else(|| anyhow::anyhow!("unknown provider code: {}", self.provider))?;
        let credential = Credential {
            principal_id: self.principal_id,
            provider,
            provider_key: self.provider_key.clone(),
            password_hash: self.password_hash.clone(),
            last_authenticated_at: self.last_authenticated_at,
        };
        Ok((self.into_principal()?, credential))
    }
}

#[derive(Debug, FromRow)]
struct SessionRow {
    session_id: Uuid,
    principal_id: Uuid,
    role_type: String,
    refresh_token_hash: String,
    issued_at: DateTime<Utc>,
    access_expires_at: DateTime<Utc>,
    refresh_expires_at: DateTime<Utc>,
    rotated_from: Option<Uuid>,
    revoked_at: Option<DateTime<Utc>>,
}

impl SessionRow {
    fn into_session(self) -> Result<Session, StoreError> {
        let role_type = RoleType::parse(&self.role_type)
            .ok_or_else(|| anyhow::anyhow!("unknown role_type code: {}", self.role_type))?;

        Ok(Session {
            session_id: self.session_id,
            principal_id: self.principal_id,
            role_type,
            refresh_token_hash: self.refresh_token_hash,
            issued_at: self.issued_at,
            access_expires_at: self.access_expires_at,
            refresh_expires_at: self.refresh_expires_at,
            rotated_from: self.rotated_from,
            revoked_at: self.revoked_at,
        })
    }
}

const PRINCIPAL_COLUMNS: &str = "principal_id, role_type, tenant_scope, display_name, \
     principal_status, provider, provider_key, password_hash, last_authenticated_at, created_at";

#[async_trait]
impl CredentialStore for PgStore {
    async fn create(&self, identity: NewIdentity) -> Result<Principal, StoreError> {
        let principal = Principal::new(
            identity.role_type,
            identity.tenant_scope,
            identity.display_name,
        );

        sqlx::query(
            "INSERT INTO principals \
             (principal_id, role_type, tenant_scope, display_name, principal_status, \
              provider, provider_key, password_hash, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(principal.principal_id)
        .bind(principal.role_type.as_str())
        .bind(principal.tenant_scope)
        .bind(&principal.display_name)
        .bind(principal.status.as_str())
        .bind(identity.provider.as_str())
        .bind(&identity.provider_key)
        .bind(&identity.password_hash)
        .bind(principal.created_at)
        .execute(&self.pool)
        .await?;

        Ok(principal)
    }

    async fn find_by_provider_key(
        &self,
        role_type: RoleType,
        tenant_scope: Option<Uuid>,
        provider: Provider,
        provider_key: &str,
    ) -> Result<Option<(Principal, Credential)>, StoreError> {
        let row: Option<PrincipalRow> = sqlx::query_as(&format!(
            "SELECT {PRINCIPAL_COLUMNS} FROM principals \
             WHERE role_type = $1 \
               AND tenant_scope IS NOT DISTINCT FROM $2 \
               AND provider = $3 \
               AND provider_key = $4 \
               AND principal_status <> 'deleted'",
        ))
        .bind(role_type.as_str())
        .bind(tenant_scope)
        .bind(provider.as_str())
        .bind(provider_key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(PrincipalRow::into_pair).transpose()
    }

    async fn find_principal(&self, principal_id: Uuid) -> Result<Option<Principal>, StoreError> {
        let row: Option<PrincipalRow> = sqlx::query_as(&format!(
            "SELECT {PRINCIPAL_COLUMNS} FROM principals \
             WHERE principal_id = $1 AND principal_status <> 'deleted'",
        ))
        .bind(principal_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(PrincipalRow::into_principal).transpose()
    }

    async fn find_principal_any(
        &self,
        principal_id: Uuid,
    ) -> Result<Option<Principal>, StoreError> {
        let row: Option<PrincipalRow> = sqlx::query_as(&format!(
            "SELECT {PRINCIPAL_COLUMNS} FROM principals WHERE principal_id = $1",
        ))
        .bind(principal_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(PrincipalRow::into_principal).transpose()
    }

    async fn touch_last_authenticated(
        &self,
        principal_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE principals SET last_authenticated_at = $2 WHERE principal_id = $1")
            .bind(principal_id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_status(
        &self,
        principal_id: Uuid,
        status: PrincipalStatus,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE principals SET principal_status = $2 WHERE principal_id = $1")
            .bind(principal_id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn purge_principal(&self, principal_id: Uuid) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM principals WHERE principal_id = $1")
            .bind(principal_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

const SESSION_COLUMNS: &str = "session_id, principal_id, role_type, refresh_token_hash, \
     issued_at, access_expires_at, refresh_expires_at, rotated_from, revoked_at";

async fn insert_session<'e, E>(executor: E, session: &Session) -> Result<(), StoreError>
where
    E: sqlx::Executor<'e, Database = sqlx::Postgres>,
{
    sqlx::query(
        "INSERT INTO sessions \
         (session_id, principal_id, role_type, refresh_token_hash, issued_at, \
          access_expires_at, refresh_expires_at, rotated_from, revoked_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(session.session_id)
    .bind(session.principal_id)
    .bind(session.role_type.as_str())
    .bind(&session.refresh_token_hash)
    .bind(session.issued_at)
    .bind(session.access_expires_at)
    .bind(session.refresh_expires_at)
    .bind(session.rotated_from)
    .bind(session.revoked_at)
    .execute(executor)
    .await?;
    Ok(())
}

#[async_trait]
impl SessionStore for PgStore {
    async fn insert(&self, session: Session) -> Result<(), StoreError> {
        insert_session(&self.pool, &session).await
    }

    async fn find_by_token_hash(&self, hash: &str) -> Result<Option<Session>, StoreError> {
        let row: Option<SessionRow> = sqlx::query_as(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE refresh_token_hash = $1",
        ))
        .bind(hash)
        .fetch_optional(&self.pool)
        .await?;

        row.map(SessionRow::into_session).transpose()
    }

    async fn rotate(
        &self,
        consumed: Uuid,
        now: DateTime<Utc>,
        successor: Session,
    ) -> Result<RotateOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE sessions SET revoked_at = $2 \
             WHERE session_id = $1 AND revoked_at IS NULL",
        )
        .bind(consumed)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(RotateOutcome::Lost);
        }

        insert_session(&mut *tx, &successor).await?;
        tx.commit().await?;
        Ok(RotateOutcome::Won)
    }

    async fn revoke(&self, session_id: Uuid, now: DateTime<Utc>) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE sessions SET revoked_at = $2 \
             WHERE session_id = $1 AND revoked_at IS NULL",
        )
        .bind(session_id)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn revoke_all_for_principal(
        &self,
        principal_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE sessions SET revoked_at = $2 \
             WHERE principal_id = $1 AND revoked_at IS NULL",
        )
        .bind(principal_id)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
