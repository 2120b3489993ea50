//! Session model - one node of a refresh-token rotation chain.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use utoipa::ToSchema;
use uuid::Uuid;

use super::role::RoleType;

/// Refresh session entity. Only a one-way hash of the refresh token is
/// ever stored; disclosure of the session table grants no replay
/// ability.
#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: Uuid,
    pub principal_id: Uuid,
    pub role_type: RoleType,
    pub refresh_token_hash: String,
    pub issued_at: DateTime<Utc>,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
    /// The session this one replaced, if it was minted by a redeem.
    pub rotated_from: Option<Uuid>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Create a rotation-chain root.
    pub fn open(
        principal_id: Uuid,
        role_type: RoleType,
        refresh_token: &str,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        let now = Utc::now();
        Self {
            session_id: Uuid::new_v4(),
            principal_id,
            role_type,
            refresh_token_hash: Self::hash_token(refresh_token),
            issued_at: now,
            access_expires_at: now + access_ttl,
            refresh_expires_at: now + refresh_ttl,
            rotated_from: None,
            revoked_at: None,
        }
    }

    /// Create the successor of a consumed session. Expiries are
    /// computed from now, never by extending the old expiry additively.
    pub fn rotated(
        predecessor: &Session,
        refresh_token: &str,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        let mut session = Self::open(
            predecessor.principal_id,
            predecessor.role_type,
            refresh_token,
            access_ttl,
            refresh_ttl,
        );
        session.rotated_from = Some(predecessor.session_id);
        session
    }

    /// Hash a refresh token with SHA-256.
    pub fn hash_token(token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.refresh_expires_at
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    pub fn is_live(&self) -> bool {
        !self.is_revoked() && !self.is_expired()
    }
}

/// Token pair returned to the client. `expired_at` governs the access
/// token; `refreshable_until` is the outer bound of the current chain
/// node. Timestamps serialize as ISO-8601.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SessionTokenPair {
    pub access: String,
    pub refresh: String,
    pub expired_at: DateTime<Utc>,
    pub refreshable_until: DateTime<Utc>,
}
