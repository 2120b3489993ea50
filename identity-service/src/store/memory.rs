//! In-memory reference adapter for both store traits.
//!
//! Uniqueness and rotation use an atomic check-and-mutate under one
//! lock, giving the same linearizable guarantees the Postgres adapter
//! gets from its unique index and compare-and-set update.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::models::{Credential, Principal, PrincipalStatus, Provider, RoleType, Session};

use super::{
    CredentialStore, NewIdentity, RotateOutcome, SessionStore, StoreError,
};

type IdentityKey = (RoleType, Option<Uuid>, Provider, String);

#[derive(Default)]
struct Inner {
    principals: HashMap<Uuid, Principal>,
    credentials: HashMap<Uuid, Credential>,
    /// Identity key -> principal id, non-deleted records only.
    identity_index: HashMap<IdentityKey, Uuid>,
    sessions: HashMap<Uuid, Session>,
    /// Refresh token hash -> session id.
    hash_index: HashMap<String, Uuid>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // Lock poisoning only happens if a holder panicked; the data
        // is plain maps, safe to keep serving.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn create(&self, identity: NewIdentity) -> Result<Principal, StoreError> {
        let mut inner = self.lock();

        let key = (
            identity.role_type,
            identity.tenant_scope,
            identity.provider,
            identity.provider_key.clone(),
        );
        if inner.identity_index.contains_key(&key) {
            return Err(StoreError::DuplicateIdentity);
        }

        let principal = Principal::new(
            identity.role_type,
            identity.tenant_scope,
            identity.display_name,
        );
        let credential = Credential {
            principal_id: principal.principal_id,
            provider: identity.provider,
            provider_key: identity.provider_key,
            password_hash: identity.password_hash,
            last_authenticated_at: None,
        };

        inner.identity_index.insert(key, principal.principal_id);
        inner
            .credentials
            .insert(principal.principal_id, credential);
        inner
            .principals
            .insert(principal.principal_id, principal.clone());

        Ok(principal)
    }

    async fn find_by_provider_key(
        &self,
        role_type: RoleType,
        tenant_scope: Option<Uuid>,
        provider: Provider,
        provider_key: &str,
    ) -> Result<Option<(Principal, Credential)>, StoreError> {
        let inner = self.lock();
        let key = (role_type, tenant_scope, provider, provider_key.to_string());

        let found = inner.identity_index.get(&key).and_then(|id| {
            let principal = inner.principals.get(id)?.clone();
            let credential = inner.credentials.get(id)?.clone();
            Some((principal, credential))
        });

        Ok(found)
    }

    async fn find_principal(&self, principal_id: Uuid) -> Result<Option<Principal>, StoreError> {
        let inner = self.lock();
        Ok(inner
            .principals
            .get(&principal_id)
            .filter(|p| p.status != PrincipalStatus::Deleted)
            .cloned())
    }

    async fn find_principal_any(
        &self,
        principal_id: Uuid,
    ) -> Result<Option<Principal>, StoreError> {
        let inner = self.lock();
        Ok(inner.principals.get(&principal_id).cloned())
    }

    async fn touch_last_authenticated(
        &self,
        principal_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if let Some(credential) = inner.credentials.get_mut(&principal_id) {
            credential.last_authenticated_at = Some(at);
        }
        Ok(())
    }

    async fn set_status(
        &self,
        principal_id: Uuid,
        status: PrincipalStatus,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();

        let Some(principal) = inner.principals.get_mut(&principal_id) else {
            return Ok(());
        };
        principal.status = status;
        if status != PrincipalStatus::Deleted {
            return Ok(());
        }
        let role_type = principal.role_type;
        let tenant_scope = principal.tenant_scope;

        // Soft-deleted rows leave the uniqueness scope: the key may be reused.
        let key_parts = inner
            .credentials
            .get(&principal_id)
            .map(|c| (c.provider, c.provider_key.clone()));
        if let Some((provider, provider_key)) = key_parts {
            inner
                .identity_index
                .remove(&(role_type, tenant_scope, provider, provider_key));
        }
        Ok(())
    }

    async fn purge_principal(&self, principal_id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.lock();

        if let (Some(principal), Some(credential)) = (
            inner.principals.remove(&principal_id),
            inner.credentials.remove(&principal_id),
        ) {
            let key = (
                principal.role_type,
                principal.tenant_scope,
                credential.provider,
                credential.provider_key,
            );
            inner.identity_index.remove(&key);
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn insert(&self, session: Session) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner
            .hash_index
            .insert(session.refresh_token_hash.clone(), session.session_id);
        inner.sessions.insert(session.session_id, session);
        Ok(())
    }

    async fn find_by_token_hash(&self, hash: &str) -> Result<Option<Session>, StoreError> {
        let inner = self.lock();
        Ok(inner
            .hash_index
            .get(hash)
            .and_then(|id| inner.sessions.get(id))
            .cloned())
    }

    async fn rotate(
        &self,
        consumed: Uuid,
        now: DateTime<Utc>,
        successor: Session,
    ) -> Result<RotateOutcome, StoreError> {
        let mut inner = self.lock();

        match inner.sessions.get_mut(&consumed) {
            Some(session) if session.revoked_at.is_none() => {
                session.revoked_at = Some(now);
            }
            // Already revoked, or gone: a concurrent redeem won.
            _ => return Ok(RotateOutcome::Lost),
        }

        inner
            .hash_index
            .insert(successor.refresh_token_hash.clone(), successor.session_id);
        inner.sessions.insert(successor.session_id, successor);
        Ok(RotateOutcome::Won)
    }

    async fn revoke(&self, session_id: Uuid, now: DateTime<Utc>) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if let Some(session) = inner.sessions.get_mut(&session_id) {
            if session.revoked_at.is_none() {
                session.revoked_at = Some(now);
            }
        }
        Ok(())
    }

    async fn revoke_all_for_principal(
        &self,
        principal_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        for session in inner.sessions.values_mut() {
            if session.principal_id == principal_id && session.revoked_at.is_none() {
                session.revoked_at = Some(now);
            }
        }
        Ok(())
    }
}
