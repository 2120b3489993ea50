//! Principal model - an authenticated identity of a given role type,
//! and the credential material bound to it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::role::{Provider, RoleType};
use crate::utils::password::Password;

/// Principal state codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PrincipalStatus {
    Active,
    Disabled,
    Deleted,
}

impl PrincipalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrincipalStatus::Active => "active",
            PrincipalStatus::Disabled => "disabled",
            PrincipalStatus::Deleted => "deleted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(PrincipalStatus::Active),
            "disabled" => Some(PrincipalStatus::Disabled),
            "deleted" => Some(PrincipalStatus::Deleted),
            _ => None,
        }
    }
}

/// Principal entity. `principal_id` is globally unique across all role
/// types and is never reused or reinterpreted as another role.
#[derive(Debug, Clone)]
pub struct Principal {
    pub principal_id: Uuid,
    pub role_type: RoleType,
    pub tenant_scope: Option<Uuid>,
    pub display_name: Option<String>,
    pub status: PrincipalStatus,
    pub created_at: DateTime<Utc>,
}

impl Principal {
    pub fn new(role_type: RoleType, tenant_scope: Option<Uuid>, display_name: Option<String>) -> Self {
        Self {
            principal_id: Uuid::new_v4(),
            role_type,
            tenant_scope,
            display_name,
            status: PrincipalStatus::Active,
            created_at: Utc::now(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == PrincipalStatus::Active
    }

    /// Convert to sanitized response (no credential material).
    pub fn sanitized(&self) -> PrincipalResponse {
        PrincipalResponse {
            principal_id: self.principal_id,
            role_type: self.role_type,
            tenant_scope: self.tenant_scope,
            display_name: self.display_name.clone(),
            status: self.status,
            created_at: self.created_at,
        }
    }
}

/// Credential entity, owned 1:1 by the principal it authenticates.
#[derive(Debug, Clone)]
pub struct Credential {
    pub principal_id: Uuid,
    pub provider: Provider,
    pub provider_key: String,
    pub password_hash: Option<String>,
    pub last_authenticated_at: Option<DateTime<Utc>>,
}

/// What a caller presents to prove an identity. Modeled as a tagged
/// variant rather than optional fields validated ad hoc: a local
/// credential always has a secret, an external one never does.
#[derive(Debug, Clone)]
pub enum CredentialSpec {
    Local { email: String, secret: Password },
    External { provider: Provider, subject: String },
}

impl CredentialSpec {
    pub fn provider(&self) -> Provider {
        match self {
            CredentialSpec::Local { .. } => Provider::Local,
            CredentialSpec::External { provider, .. } => *provider,
        }
    }

    pub fn provider_key(&self) -> &str {
        match self {
            CredentialSpec::Local { email, .. } => email,
            CredentialSpec::External { subject, .. } => subject,
        }
    }
}

/// Principal response for the API (no credential material).
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PrincipalResponse {
    pub principal_id: Uuid,
    pub role_type: RoleType,
    pub tenant_scope: Option<Uuid>,
    pub display_name: Option<String>,
    pub status: PrincipalStatus,
    pub created_at: DateTime<Utc>,
}
