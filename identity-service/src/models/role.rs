//! Role model - the closed set of role types and their capabilities.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Credential provider codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Local,
    Google,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Local => "local",
            Provider::Google => "google",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "local" => Some(Provider::Local),
            "google" => Some(Provider::Google),
            _ => None,
        }
    }
}

/// Role type codes. Unknown roles fail at deserialization, so nothing
/// downstream ever sees a free-form role string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum RoleType {
    #[serde(rename = "tpm")]
    Tpm,
    #[serde(rename = "pmo")]
    Pmo,
    #[serde(rename = "developer")]
    Developer,
    #[serde(rename = "systemAdmin")]
    SystemAdmin,
    #[serde(rename = "patient")]
    Patient,
    #[serde(rename = "nurse")]
    Nurse,
}

/// What a role type is allowed to do at join time and at scope checks.
#[derive(Debug, Clone, Copy)]
pub struct RoleCapabilities {
    /// Whether a tenant scope must be present at join/login.
    pub requires_tenant_scope: bool,
    /// Whether a tenant scope is permitted at all. Global roles such
    /// as the system administrator must never carry one.
    pub allows_tenant_scope: bool,
    /// Providers this role may authenticate with.
    pub allowed_providers: &'static [Provider],
    /// Elevated roles bypass tenant/owner scope checks. This is an
    /// explicit allow-list, never inferred from a missing tenant scope.
    pub scope_exempt: bool,
}

const LOCAL_ONLY: &[Provider] = &[Provider::Local];
const LOCAL_AND_GOOGLE: &[Provider] = &[Provider::Local, Provider::Google];

impl RoleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleType::Tpm => "tpm",
            RoleType::Pmo => "pmo",
            RoleType::Developer => "developer",
            RoleType::SystemAdmin => "systemAdmin",
            RoleType::Patient => "patient",
            RoleType::Nurse => "nurse",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "tpm" => Some(RoleType::Tpm),
            "pmo" => Some(RoleType::Pmo),
            "developer" => Some(RoleType::Developer),
            "systemAdmin" => Some(RoleType::SystemAdmin),
            "patient" => Some(RoleType::Patient),
            "nurse" => Some(RoleType::Nurse),
            _ => None,
        }
    }

    pub fn capabilities(&self) -> RoleCapabilities {
        match self {
            RoleType::Tpm | RoleType::Pmo => RoleCapabilities {
                requires_tenant_scope: false,
                allows_tenant_scope: true,
                allowed_providers: LOCAL_AND_GOOGLE,
                scope_exempt: false,
            },
            RoleType::Developer => RoleCapabilities {
                requires_tenant_scope: true,
                allows_tenant_scope: true,
                allowed_providers: LOCAL_AND_GOOGLE,
                scope_exempt: false,
            },
            RoleType::SystemAdmin => RoleCapabilities {
                requires_tenant_scope: false,
                allows_tenant_scope: false,
                allowed_providers: LOCAL_ONLY,
                scope_exempt: true,
            },
            RoleType::Patient | RoleType::Nurse => RoleCapabilities {
                requires_tenant_scope: true,
                allows_tenant_scope: true,
                allowed_providers: LOCAL_ONLY,
                scope_exempt: false,
            },
        }
    }

    pub fn allows_provider(&self, provider: Provider) -> bool {
        self.capabilities().allowed_providers.contains(&provider)
    }
}
