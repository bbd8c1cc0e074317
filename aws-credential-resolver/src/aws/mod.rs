//! AWS SDK integration: the STS credential backend and its retry decorator.

/// retrying decorator
pub mod retry;

/// STS-backed implementation
pub mod sts;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::credentials::CredentialSet;
use crate::errors::BackendError;

/// Result of a backend call
pub type BackendResult<T> = Result<T, BackendError>;

/// Parameters of an STS AssumeRole call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssumeRoleRequest {
    /// Credentials that sign the call
    pub credentials: CredentialSet,
    /// Role to assume
    pub role_arn: String,
    /// Session name
    pub session_name: String,
    /// External ID
    pub external_id: Option<String>,
    /// Session duration
    pub duration_seconds: Option<i32>,
    /// Inline session policy
    pub policy: Option<String>,
    /// Managed session policy ARNs
    pub policy_arns: Vec<String>,
    /// Session tags
    pub tags: BTreeMap<String, String>,
    /// Transitive tag keys
    pub transitive_tag_keys: Vec<String>,
}

/// Parameters of an STS AssumeRoleWithWebIdentity call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebIdentityRequest {
    /// Role to assume
    pub role_arn: String,
    /// Session name
    pub session_name: String,
    /// OIDC token read from the token file
    pub web_identity_token: String,
    /// Session duration
    pub duration_seconds: Option<i32>,
}

/// Temporary credentials issued by STS
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedCredentials {
    /// Access key ID
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Session token
    pub session_token: String,
    /// Expiry
    pub expiration: Option<DateTime<Utc>>,
}

/// The STS operations the engine depends on.
///
/// Implementations classify failures through [`BackendError::code`]; they do
/// not retry. Retrying is added by [`retry::RetryingBackend`].
#[async_trait]
pub trait CredentialBackend: Send + Sync {
    /// STS AssumeRole
    async fn assume_role(&self, request: &AssumeRoleRequest) -> BackendResult<IssuedCredentials>;

    /// STS AssumeRoleWithWebIdentity
    async fn assume_role_with_web_identity(
        &self,
        request: &WebIdentityRequest,
    ) -> BackendResult<IssuedCredentials>;

    /// STS GetCallerIdentity, returning the caller ARN
    async fn get_caller_identity(&self, credentials: &CredentialSet) -> BackendResult<String>;
}
