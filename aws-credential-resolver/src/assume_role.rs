//! Role assumption on top of already resolved credentials.

use log::{debug, info};
use std::collections::BTreeMap;

use crate::aws::{AssumeRoleRequest, CredentialBackend, IssuedCredentials, WebIdentityRequest};
use crate::config::AssumeRoleConfig;
use crate::credentials::{CredentialSet, ProviderName};
use crate::errors::{codes, CredentialError, Result};

/// Shortest session STS accepts
pub const MIN_DURATION_SECONDS: i32 = 900;

/// Longest session STS accepts
pub const MAX_DURATION_SECONDS: i32 = 43_200;

/// One role hop
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssumeRoleParams {
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

impl From<&AssumeRoleConfig> for AssumeRoleParams {
    fn from(config: &AssumeRoleConfig) -> Self {
        Self {
            role_arn: config.role_arn.clone(),
            session_name: config.session_name.clone(),
            external_id: config.external_id.clone(),
            duration_seconds: config.duration_seconds,
            policy: config.policy.clone(),
            policy_arns: config.policy_arns.clone(),
            tags: config.tags.clone(),
            transitive_tag_keys: config.transitive_tag_keys.clone(),
        }
    }
}

fn validate(role_arn: &str, session_name: &str, duration_seconds: Option<i32>) -> Result<()> {
    if role_arn.is_empty() {
        return Err(CredentialError::configuration(
            codes::ROLE_ARN_REQUIRED,
            "role assumption requires a role ARN",
        ));
    }
    if session_name.is_empty() {
        return Err(CredentialError::configuration(
            codes::SESSION_NAME_REQUIRED,
            format!("role assumption of '{role_arn}' requires a session name"),
        ));
    }
    if let Some(duration) = duration_seconds {
        if !(MIN_DURATION_SECONDS..=MAX_DURATION_SECONDS).contains(&duration) {
            return Err(CredentialError::configuration(
                codes::INVALID_DURATION,
                format!(
                    "duration {duration}s for '{role_arn}' is outside {MIN_DURATION_SECONDS}..={MAX_DURATION_SECONDS}"
                ),
            ));
        }
    }
    Ok(())
}

fn into_credentials(issued: IssuedCredentials, provider: ProviderName) -> CredentialSet {
    CredentialSet::new(
        issued.access_key_id,
        issued.secret_access_key,
        Some(issued.session_token),
        provider,
    )
    .with_expiration(issued.expiration)
}

/// Exchanges base credentials (or a web identity token) for role credentials
pub struct AssumeRoleEngine<'a> {
    backend: &'a dyn CredentialBackend,
}

impl<'a> AssumeRoleEngine<'a> {
    /// Engine calling `backend`
    #[must_use]
    pub fn new(backend: &'a dyn CredentialBackend) -> Self {
        Self { backend }
    }

    /// Assume `params.role_arn` signed by `base`
    pub async fn assume(&self, base: &CredentialSet, params: &AssumeRoleParams) -> Result<CredentialSet> {
        validate(&params.role_arn, &params.session_name, params.duration_seconds)?;
        debug!(
            "Assuming role {} with {} credentials",
            params.role_arn, base.provider_name
        );

        let request = AssumeRoleRequest {
            credentials: base.clone(),
            role_arn: params.role_arn.clone(),
            session_name: params.session_name.clone(),
            external_id: params.external_id.clone(),
            duration_seconds: params.duration_seconds,
            policy: params.policy.clone(),
            policy_arns: params.policy_arns.clone(),
            tags: params.tags.clone(),
            transitive_tag_keys: params.transitive_tag_keys.clone(),
        };
        let issued = self
            .backend
            .assume_role(&request)
            .await
            .map_err(|e| CredentialError::cannot_assume_role(&params.role_arn, &e))?;

        info!("Assumed role {}", params.role_arn);
        Ok(into_credentials(issued, ProviderName::AssumeRole))
    }

    /// Assume `role_arn` with an OIDC token; no base credentials are needed
    pub async fn assume_with_web_identity(
        &self,
        role_arn: &str,
        session_name: &str,
        web_identity_token: String,
        duration_seconds: Option<i32>,
    ) -> Result<CredentialSet> {
        validate(role_arn, session_name, duration_seconds)?;
        debug!("Assuming role {role_arn} with web identity");

        let request = WebIdentityRequest {
            role_arn: role_arn.to_string(),
            session_name: session_name.to_string(),
            web_identity_token,
            duration_seconds,
        };
        let issued = self
            .backend
            .assume_role_with_web_identity(&request)
            .await
            .map_err(|e| CredentialError::cannot_assume_role(role_arn, &e))?;

        info!("Assumed role {role_arn} with web identity");
        Ok(into_credentials(issued, ProviderName::WebIdentity))
    }
}
