//! Token codec - stateless signing and verification of access tokens.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Principal, RoleType};

/// Clock-skew tolerance. Expiry is otherwise strict.
const LEEWAY_SECONDS: u64 = 5;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("token invalid")]
    Invalid,
}

/// Access token claims. Role and tenant sit inside the signed claim
/// set, so a token cannot be replayed under a different role/tenant
/// interpretation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Principal id.
    pub sub: Uuid,
    pub role: RoleType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant: Option<Uuid>,
    /// Issued at (Unix timestamp).
    pub iat: i64,
    /// Expiration time (Unix timestamp).
    pub exp: i64,
    /// Token id.
    pub jti: String,
}

#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl TokenCodec {
    pub fn new(signing_secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(signing_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(signing_secret.as_bytes()),
        }
    }

    /// Issue a signed access token for a principal.
    pub fn issue_access(
        &self,
        principal: &Principal,
        ttl: Duration,
    ) -> Result<(String, DateTime<Utc>), anyhow::Error> {
        let now = Utc::now();
        let expires_at = now + ttl;

        let claims = AccessClaims {
            sub: principal.principal_id,
            role: principal.role_type,
            tenant: principal.tenant_scope,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        let header = Header::new(Algorithm::HS256);
        let token = encode(&header, &claims, &self.encoding_key)
            .map_err(|e| anyhow::anyhow!("Failed to encode access token: {}", e))?;

        Ok((token, expires_at))
    }

    /// Verify signature and expiry, returning the claims.
    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = LEEWAY_SECONDS;

        let token_data =
            decode::<AccessClaims>(token, &self.decoding_key, &validation).map_err(|e| {
                match e.kind() {
                    ErrorKind::ExpiredSignature => TokenError::Expired,
                    _ => TokenError::Invalid,
                }
            })?;

        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Principal;

    fn codec() -> TokenCodec {
        TokenCodec::new("test-signing-secret-0123456789abcdef")
    }

    #[test]
    fn issue_and_verify_round_trip() {
        let tenant = Uuid::new_v4();
        let principal = Principal::new(RoleType::Developer, Some(tenant), None);

        let (token, expires_at) = codec()
            .issue_access(&principal, Duration::hours(1))
            .unwrap();
        assert!(expires_at > Utc::now());

        let claims = codec().verify_access(&token).unwrap();
        assert_eq!(claims.sub, principal.principal_id);
        assert_eq!(claims.role, RoleType::Developer);
        assert_eq!(claims.tenant, Some(tenant));
        assert_eq!(claims.exp, expires_at.timestamp());
    }

    #[test]
    fn expired_token_is_rejected_as_expired() {
        let principal = Principal::new(RoleType::Pmo, None, None);

        // Already past expiry plus the leeway window.
        let (token, _) = codec()
            .issue_access(&principal, Duration::seconds(-(LEEWAY_SECONDS as i64) - 60))
            .unwrap();

        match codec().verify_access(&token) {
            Err(TokenError::Expired) => {}
            other => panic!("expected Expired, got {:?}", other.map(|c| c.sub)),
        }
    }

    #[test]
    fn tampered_token_is_rejected_as_invalid() {
        let principal = Principal::new(RoleType::Pmo, None, None);
        let (token, _) = codec()
            .issue_access(&principal, Duration::hours(1))
            .unwrap();

        let mut tampered = token.into_bytes();
        let last = tampered.len() - 1;
        tampered[last] = if tampered[last] == b'A' { b'B' } else { b'A' };
        let tampered = String::from_utf8(tampered).unwrap();

        assert!(matches!(
            codec().verify_access(&tampered),
            Err(TokenError::Invalid)
        ));
    }

    #[test]
    fn token_from_another_key_is_rejected() {
        let principal = Principal::new(RoleType::SystemAdmin, None, None);
        let (token, _) = TokenCodec::new("some-other-secret")
            .issue_access(&principal, Duration::hours(1))
            .unwrap();

        assert!(matches!(
            codec().verify_access(&token),
            Err(TokenError::Invalid)
        ));
    }
}
