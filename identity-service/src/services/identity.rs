//! Identity service - orchestrates join, login, refresh, and logout.

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{
    CredentialSpec, Principal, PrincipalStatus, Provider, RoleType, SessionTokenPair,
};
use crate::store::{CredentialStore, NewIdentity, StoreError};
use crate::utils::{hash_password, verify_password, Password, PasswordHashString};

use super::error::IdentityError;
use super::ledger::{LedgerError, SessionLedger};

#[derive(Clone)]
pub struct IdentityService {
    credentials: Arc<dyn CredentialStore>,
    ledger: SessionLedger,
}

impl IdentityService {
    pub fn new(credentials: Arc<dyn CredentialStore>, ledger: SessionLedger) -> Self {
        Self {
            credentials,
            ledger,
        }
    }

    pub fn ledger(&self) -> &SessionLedger {
        &self.ledger
    }

    fn check_capabilities(
        role_type: RoleType,
        tenant_scope: Option<Uuid>,
        provider: Provider,
    ) -> Result<(), IdentityError> {
        let caps = role_type.capabilities();

        if caps.requires_tenant_scope && tenant_scope.is_none() {
            return Err(IdentityError::TenantScopeRequired(role_type));
        }
        if !caps.allows_tenant_scope && tenant_scope.is_some() {
            return Err(IdentityError::TenantScopeForbidden(role_type));
        }
        if !role_type.allows_provider(provider) {
            return Err(IdentityError::UnsupportedProvider(provider, role_type));
        }
        Ok(())
    }

    /// Register a new principal and open its first session.
    ///
    /// Identity creation and session creation are one business
    /// transaction: if the session cannot be opened, the just-created
    /// principal is purged so no partial identity survives.
    pub async fn join(
        &self,
        role_type: RoleType,
        tenant_scope: Option<Uuid>,
        credential: CredentialSpec,
        display_name: Option<String>,
    ) -> Result<(Principal, SessionTokenPair), IdentityError> {
        Self::check_capabilities(role_type, tenant_scope, credential.provider())?;

        let password_hash = match &credential {
            CredentialSpec::Local { secret, .. } => {
                if secret.is_empty() {
                    return Err(IdentityError::MissingCredential);
                }
                Some(hash_password(secret)?.into_string())
            }
            CredentialSpec::External { .. } => None,
        };

        let principal = self
            .credentials
            .create(NewIdentity {
                role_type,
                tenant_scope,
                provider: credential.provider(),
                provider_key: credential.provider_key().to_string(),
                password_hash,
                display_name,
            })
            .await
            .map_err(|e| match e {
                StoreError::DuplicateIdentity => IdentityError::DuplicateIdentity,
                other => IdentityError::Store(other),
            })?;

        let pair = match self.ledger.open(&principal).await {
            Ok(pair) => pair,
            Err(e) => {
                // Compensating delete: the credential store and session
                // store may be physically separate, so this cannot be a
                // single cross-store transaction.
                if let Err(purge_err) = self
                    .credentials
                    .purge_principal(principal.principal_id)
                    .await
                {
                    tracing::error!(
                        principal_id = %principal.principal_id,
                        error = %purge_err,
                        "Failed to purge principal after session open failure"
                    );
                }
                return Err(map_ledger_error(e));
            }
        };

        tracing::info!(
            principal_id = %principal.principal_id,
            role = %role_type.as_str(),
            "Principal joined"
        );

        Ok((principal, pair))
    }

    /// Authenticate an existing principal and open a new session.
    pub async fn login(
        &self,
        role_type: RoleType,
        tenant_scope: Option<Uuid>,
        provider: Provider,
        provider_key: &str,
        secret: Option<Password>,
    ) -> Result<(Principal, SessionTokenPair), IdentityError> {
        let found = self
            .credentials
            .find_by_provider_key(role_type, tenant_scope, provider, provider_key)
            .await?;

        // Unknown key and wrong password are deliberately the same
        // failure: callers must not be able to enumerate accounts.
        let (principal, credential) = found.ok_or(IdentityError::InvalidCredentials)?;

        if provider == Provider::Local {
            let secret = secret.ok_or(IdentityError::InvalidCredentials)?;
            let stored_hash = credential
                .password_hash
                .clone()
                .ok_or(IdentityError::InvalidCredentials)?;
            verify_password(&secret, &PasswordHashString::new(stored_hash))
                .map_err(|_| IdentityError::InvalidCredentials)?;
        }

        // The caller has proven knowledge of the credential, so the
        // disabled state is safe to disclose.
        match principal.status {
            PrincipalStatus::Active => {}
            PrincipalStatus::Disabled => return Err(IdentityError::AccountDisabled),
            PrincipalStatus::Deleted => return Err(IdentityError::InvalidCredentials),
        }

        let pair = self
            .ledger
            .open(&principal)
            .await
            .map_err(map_ledger_error)?;

        let credentials = self.credentials.clone();
        let principal_id = principal.principal_id;
        tokio::spawn(async move {
            if let Err(e) = credentials
                .touch_last_authenticated(principal_id, Utc::now())
                .await
            {
                tracing::warn!(principal_id = %principal_id, error = %e, "Failed to update last_authenticated_at");
            }
        });

        tracing::info!(principal_id = %principal.principal_id, "Principal logged in");

        Ok((principal, pair))
    }

    /// Redeem a refresh token for a new pair.
    ///
    /// The current principal is re-resolved before rotation so that an
    /// account disabled after the token was issued cannot refresh, and
    /// the token is not consumed on that path.
    pub async fn refresh(&self, refresh_token: &str) -> Result<SessionTokenPair, IdentityError> {
        let session = self
            .ledger
            .inspect(refresh_token)
            .await
            .map_err(map_ledger_error)?;

        let principal = match self.credentials.find_principal(session.principal_id).await? {
            Some(p) => p,
            None => {
                tracing::warn!(
                    session_id = %session.session_id,
                    principal_id = %session.principal_id,
                    "Refresh denied: principal missing or deleted"
                );
                return Err(IdentityError::RefreshFailed);
            }
        };

        if principal.status == PrincipalStatus::Disabled {
            return Err(IdentityError::AccountDisabled);
        }

        self.ledger
            .redeem(&principal, refresh_token)
            .await
            .map_err(map_ledger_error)
    }

    /// Revoke the session a refresh token names. Idempotent on an
    /// already-revoked token.
    pub async fn logout(&self, refresh_token: &str) -> Result<(), IdentityError> {
        self.ledger
            .revoke_by_token(refresh_token)
            .await
            .map_err(map_ledger_error)
    }

    /// Administrative lockout: disable the account and sweep its sessions.
    pub async fn disable(&self, principal_id: Uuid) -> Result<(), IdentityError> {
        self.credentials
            .set_status(principal_id, PrincipalStatus::Disabled)
            .await?;
        self.ledger
            .revoke_all(principal_id)
            .await
            .map_err(map_ledger_error)?;
        tracing::info!(principal_id = %principal_id, "Principal disabled");
        Ok(())
    }
}

/// Collapse ledger failures to the boundary taxonomy. The specific
/// token failure reason is logged for audit and never surfaced, to
/// avoid oracle attacks on token validity.
fn map_ledger_error(err: LedgerError) -> IdentityError {
    match err {
        LedgerError::TokenUnknown | LedgerError::TokenRevoked | LedgerError::TokenExpired => {
            tracing::warn!(reason = %err, "Refresh token rejected");
            IdentityError::RefreshFailed
        }
        LedgerError::Store(e) => IdentityError::Store(e),
        LedgerError::Internal(e) => IdentityError::Internal(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::token::TokenCodec;
    use crate::store::MemoryStore;
    use chrono::Duration;

    fn service() -> (IdentityService, MemoryStore) {
        let store = MemoryStore::new();
        let ledger = SessionLedger::new(
            Arc::new(store.clone()),
            TokenCodec::new("identity-test-secret"),
            Duration::hours(1),
            Duration::days(7),
        );
        (
            IdentityService::new(Arc::new(store.clone()), ledger),
            store,
        )
    }

    fn local(email: &str, secret: &str) -> CredentialSpec {
        CredentialSpec::Local {
            email: email.to_string(),
            secret: Password::new(secret.to_string()),
        }
    }

    #[tokio::test]
    async fn join_then_login_round_trip() {
        let (service, _) = service();

        let (principal, pair) = service
            .join(RoleType::Pmo, None, local("a@x.com", "p1"), None)
            .await
            .unwrap();
        assert!(principal.is_active());
        assert!(!pair.access.is_empty());

        let (logged_in, _) = service
            .login(
                RoleType::Pmo,
                None,
                Provider::Local,
                "a@x.com",
                Some(Password::new("p1".to_string())),
            )
            .await
            .unwrap();
        assert_eq!(logged_in.principal_id, principal.principal_id);
    }

    #[tokio::test]
    async fn join_requires_a_secret_for_local_credentials() {
        let (service, _) = service();

        let err = service
            .join(RoleType::Pmo, None, local("a@x.com", ""), None)
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::MissingCredential));
    }

    #[tokio::test]
    async fn join_enforces_role_capabilities() {
        let (service, _) = service();
        let tenant = Uuid::new_v4();

        // Patient requires a tenant scope.
        let err = service
            .join(RoleType::Patient, None, local("p@x.com", "pw"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::TenantScopeRequired(_)));

        // System administrators are global.
        let err = service
            .join(
                RoleType::SystemAdmin,
                Some(tenant),
                local("root@x.com", "pw"),
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::TenantScopeForbidden(_)));

        // Patients cannot use an external provider.
        let err = service
            .join(
                RoleType::Patient,
                Some(tenant),
                CredentialSpec::External {
                    provider: Provider::Google,
                    subject: "sub-1".to_string(),
                },
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::UnsupportedProvider(..)));
    }

    #[tokio::test]
    async fn duplicate_join_is_rejected() {
        let (service, _) = service();

        service
            .join(RoleType::Pmo, None, local("a@x.com", "p1"), None)
            .await
            .unwrap();
        let err = service
            .join(RoleType::Pmo, None, local("a@x.com", "p2"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::DuplicateIdentity));
    }

    #[tokio::test]
    async fn concurrent_joins_yield_exactly_one_success() {
        let (service, _) = service();

        let attempts = 8;
        let results = futures::future::join_all((0..attempts).map(|i| {
            let service = service.clone();
            async move {
                service
                    .join(
                        RoleType::Pmo,
                        None,
                        local("race@x.com", &format!("pw-{i}")),
                        None,
                    )
                    .await
            }
        }))
        .await;

        let successes = results.iter().filter(|r| r.is_ok()).count();
        let duplicates = results
            .iter()
            .filter(|r| matches!(r, Err(IdentityError::DuplicateIdentity)))
            .count();

        assert_eq!(successes, 1);
        assert_eq!(duplicates, attempts - 1);
    }

    #[tokio::test]
    async fn login_failures_are_indistinguishable() {
        let (service, _) = service();

        service
            .join(RoleType::Pmo, None, local("a@x.com", "p1"), None)
            .await
            .unwrap();

        // Wrong password.
        let wrong_password = service
            .login(
                RoleType::Pmo,
                None,
                Provider::Local,
                "a@x.com",
                Some(Password::new("nope".to_string())),
            )
            .await
            .unwrap_err();

        // Unknown email.
        let unknown_email = service
            .login(
                RoleType::Pmo,
                None,
                Provider::Local,
                "b@x.com",
                Some(Password::new("p1".to_string())),
            )
            .await
            .unwrap_err();

        // Right email, wrong role.
        let wrong_role = service
            .login(
                RoleType::Tpm,
                None,
                Provider::Local,
                "a@x.com",
                Some(Password::new("p1".to_string())),
            )
            .await
            .unwrap_err();

        for err in [wrong_password, unknown_email, wrong_role] {
            assert!(matches!(err, IdentityError::InvalidCredentials));
        }
    }

    #[tokio::test]
    async fn disabled_account_cannot_login_or_refresh() {
        let (service, store) = service();

        let (principal, pair) = service
            .join(RoleType::Pmo, None, local("a@x.com", "p1"), None)
            .await
            .unwrap();

        store
            .set_status(principal.principal_id, PrincipalStatus::Disabled)
            .await
            .unwrap();

        let login_err = service
            .login(
                RoleType::Pmo,
                None,
                Provider::Local,
                "a@x.com",
                Some(Password::new("p1".to_string())),
            )
            .await
            .unwrap_err();
        assert!(matches!(login_err, IdentityError::AccountDisabled));

        let refresh_err = service.refresh(&pair.refresh).await.unwrap_err();
        assert!(matches!(refresh_err, IdentityError::AccountDisabled));
    }

    #[tokio::test]
    async fn refresh_rejects_deleted_principals_opaquely() {
        let (service, store) = service();

        let (principal, pair) = service
            .join(RoleType::Pmo, None, local("a@x.com", "p1"), None)
            .await
            .unwrap();

        store
            .set_status(principal.principal_id, PrincipalStatus::Deleted)
            .await
            .unwrap();

        let err = service.refresh(&pair.refresh).await.unwrap_err();
        assert!(matches!(err, IdentityError::RefreshFailed));
    }

    #[tokio::test]
    async fn concurrent_refreshes_yield_exactly_one_success() {
        let (service, _) = service();

        let (_, pair) = service
            .join(RoleType::Pmo, None, local("a@x.com", "p1"), None)
            .await
            .unwrap();

        let (a, b) = tokio::join!(service.refresh(&pair.refresh), service.refresh(&pair.refresh));

        let successes = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
        assert_eq!(successes, 1);

        let loser = if a.is_err() { a } else { b };
        assert!(matches!(loser.unwrap_err(), IdentityError::RefreshFailed));
    }

    #[tokio::test]
    async fn external_credential_joins_without_a_password() {
        let (service, _) = service();
        let tenant = Uuid::new_v4();

        let (principal, _) = service
            .join(
                RoleType::Developer,
                Some(tenant),
                CredentialSpec::External {
                    provider: Provider::Google,
                    subject: "google-sub-42".to_string(),
                },
                Some("Dev".to_string()),
            )
            .await
            .unwrap();

        let (logged_in, _) = service
            .login(
                RoleType::Developer,
                Some(tenant),
                Provider::Google,
                "google-sub-42",
                None,
            )
            .await
            .unwrap();
        assert_eq!(logged_in.principal_id, principal.principal_id);
    }

    #[tokio::test]
    async fn disable_sweeps_every_live_session() {
        let (service, _) = service();

        let (principal, first) = service
            .join(RoleType::Pmo, None, local("a@x.com", "p1"), None)
            .await
            .unwrap();
        let (_, second) = service
            .login(
                RoleType::Pmo,
                None,
                Provider::Local,
                "a@x.com",
                Some(Password::new("p1".to_string())),
            )
            .await
            .unwrap();

        service.disable(principal.principal_id).await.unwrap();

        for pair in [first, second] {
            let err = service.refresh(&pair.refresh).await.unwrap_err();
            assert!(
                matches!(
                    err,
                    IdentityError::RefreshFailed | IdentityError::AccountDisabled
                ),
                "disabled principal must not refresh"
            );
        }
    }
}
