use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::models::{
    CredentialSpec, PrincipalResponse, Provider, RoleType, SessionTokenPair,
};
use crate::utils::password::Password;

/// Credential presented on join/login. The tag makes the two shapes
/// explicit: a local credential carries a secret, an external one
/// carries the provider's subject identifier instead.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CredentialDto {
    Local {
        #[schema(example = "user@example.com")]
        email: String,
        #[schema(example = "password123")]
        secret: String,
    },
    External {
        provider: Provider,
        #[schema(example = "google-oauth2|103847261")]
        subject: String,
    },
}

impl CredentialDto {
    pub fn into_spec(self) -> CredentialSpec {
        match self {
            CredentialDto::Local { email, secret } => CredentialSpec::Local {
                email,
                secret: Password::new(secret),
            },
            CredentialDto::External { provider, subject } => {
                CredentialSpec::External { provider, subject }
            }
        }
    }

    pub fn provider(&self) -> Provider {
        match self {
            CredentialDto::Local { .. } => Provider::Local,
            CredentialDto::External { provider, .. } => *provider,
        }
    }

    pub fn provider_key(&self) -> &str {
        match self {
            CredentialDto::Local { email, .. } => email,
            CredentialDto::External { subject, .. } => subject,
        }
    }

    pub fn secret(&self) -> Option<Password> {
        match self {
            CredentialDto::Local { secret, .. } => Some(Password::new(secret.clone())),
            CredentialDto::External { .. } => None,
        }
    }
}

fn validate_credential(credential: &CredentialDto) -> Result<(), ValidationError> {
    match credential {
        CredentialDto::Local { email, secret } => {
            if !email.contains('@') || email.len() < 3 {
                return Err(ValidationError::new("invalid_email"));
            }
            if secret.is_empty() {
                return Err(ValidationError::new("secret_required"));
            }
        }
        CredentialDto::External { subject, .. } => {
            if subject.is_empty() {
                return Err(ValidationError::new("subject_required"));
            }
        }
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct JoinRequest {
    pub role_type: RoleType,

    #[schema(example = "550e8400-e29b-41d4-a716-446655440000")]
    pub tenant_scope: Option<Uuid>,

    #[validate(custom(function = validate_credential))]
    pub credential: CredentialDto,

    #[validate(length(max = 120, message = "Display name too long"))]
    #[schema(example = "Ada Lovelace")]
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    pub role_type: RoleType,

    #[schema(example = "550e8400-e29b-41d4-a716-446655440000")]
    pub tenant_scope: Option<Uuid>,

    #[validate(custom(function = validate_credential))]
    pub credential: CredentialDto,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RefreshRequest {
    #[validate(length(min = 1, message = "Refresh token is required"))]
    #[schema(example = "9f2c6a…64-hex-chars…")]
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LogoutRequest {
    #[validate(length(min = 1, message = "Refresh token is required"))]
    #[schema(example = "9f2c6a…64-hex-chars…")]
    pub refresh_token: String,
}

/// Authentication response: the sanitized principal plus its session
/// token pair.
#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub principal: PrincipalResponse,
    pub token: SessionTokenPair,
}

/// Message response for simple operations.
#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    #[schema(example = "Logged out")]
    pub message: String,
}
