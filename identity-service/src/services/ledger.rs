//! Session ledger - manages refresh-token rotation chains.

use chrono::{Duration, Utc};
use rand::Rng;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Principal, Session, SessionTokenPair};
use crate::store::{RotateOutcome, SessionStore, StoreError};

use super::token::TokenCodec;

/// Ledger-internal failure reasons. The identity service collapses all
/// three token failures into a single generic category before they
/// reach a caller; the distinction exists for the audit log only.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("refresh token unknown")]
    TokenUnknown,
    #[error("refresh token revoked")]
    TokenRevoked,
    #[error("refresh token expired")]
    TokenExpired,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Clone)]
pub struct SessionLedger {
    sessions: Arc<dyn SessionStore>,
    codec: TokenCodec,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl SessionLedger {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        codec: TokenCodec,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            sessions,
            codec,
            access_ttl,
            refresh_ttl,
        }
    }

    fn generate_refresh_token() -> String {
        let mut rng = rand::thread_rng();
        let token_bytes: [u8; 32] = rng.gen();
        hex::encode(token_bytes)
    }

    /// Open a new rotation-chain root for a principal.
    pub async fn open(&self, principal: &Principal) -> Result<SessionTokenPair, LedgerError> {
        let refresh = Self::generate_refresh_token();
        let mut session = Session::open(
            principal.principal_id,
            principal.role_type,
            &refresh,
            self.access_ttl,
            self.refresh_ttl,
        );

        let (access, expired_at) = self.codec.issue_access(principal, self.access_ttl)?;
        session.access_expires_at = expired_at;
        let refreshable_until = session.refresh_expires_at;

        self.sessions.insert(session).await?;

        Ok(SessionTokenPair {
            access,
            refresh,
            expired_at,
            refreshable_until,
        })
    }

    /// Look a refresh token up and check liveness without consuming it.
    pub async fn inspect(&self, refresh_token: &str) -> Result<Session, LedgerError> {
        let hash = Session::hash_token(refresh_token);
        let session = self
            .sessions
            .find_by_token_hash(&hash)
            .await?
            .ok_or(LedgerError::TokenUnknown)?;

        if session.is_revoked() {
            return Err(LedgerError::TokenRevoked);
        }
        if session.is_expired() {
            return Err(LedgerError::TokenExpired);
        }
        Ok(session)
    }

    /// Consume a refresh token: atomically revoke its session and
    /// insert the successor. Under concurrent redemption of the same
    /// token, the compare-and-set loser observes `TokenRevoked`.
    pub async fn redeem(
        &self,
        principal: &Principal,
        refresh_token: &str,
    ) -> Result<SessionTokenPair, LedgerError> {
        let consumed = self.inspect(refresh_token).await?;
        if consumed.principal_id != principal.principal_id {
            return Err(LedgerError::Internal(anyhow::anyhow!(
                "session principal does not match the resolved principal"
            )));
        }

        let refresh = Self::generate_refresh_token();
        let mut successor =
            Session::rotated(&consumed, &refresh, self.access_ttl, self.refresh_ttl);

        let (access, expired_at) = self.codec.issue_access(principal, self.access_ttl)?;
        successor.access_expires_at = expired_at;
        let refreshable_until = successor.refresh_expires_at;

        match self
            .sessions
            .rotate(consumed.session_id, Utc::now(), successor)
            .await?
        {
            RotateOutcome::Won => Ok(SessionTokenPair {
                access,
                refresh,
                expired_at,
                refreshable_until,
            }),
            RotateOutcome::Lost => Err(LedgerError::TokenRevoked),
        }
    }

    /// Idempotent revocation by session id.
    pub async fn revoke(&self, session_id: Uuid) -> Result<(), LedgerError> {
        self.sessions.revoke(session_id, Utc::now()).await?;
        Ok(())
    }

    /// Revoke the session a refresh token names (logout). Idempotent
    /// on an already-revoked token; unknown tokens fail.
    pub async fn revoke_by_token(&self, refresh_token: &str) -> Result<(), LedgerError> {
        let hash = Session::hash_token(refresh_token);
        let session = self
            .sessions
            .find_by_token_hash(&hash)
            .await?
            .ok_or(LedgerError::TokenUnknown)?;

        self.sessions.revoke(session.session_id, Utc::now()).await?;
        Ok(())
    }

    /// Administrative sweep: kill every live session of a principal.
    pub async fn revoke_all(&self, principal_id: Uuid) -> Result<(), LedgerError> {
        self.sessions
            .revoke_all_for_principal(principal_id, Utc::now())
            .await?;
        Ok(())
    }
}
