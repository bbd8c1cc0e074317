//! Caller identity validation and account lookup.

use log::{debug, info};

use crate::aws::CredentialBackend;
use crate::config::Config;
use crate::credentials::{Arn, CredentialSet, ResolvedIdentity};
use crate::errors::{codes, CredentialError, Result};

/// Partition that owns `region`; `aws` when unknown or unset
#[must_use]
pub fn partition_for_region(region: Option<&str>) -> &'static str {
    const PREFIXES: &[(&str, &str)] = &[
        ("us-isob-", "aws-iso-b"),
        ("us-isof-", "aws-iso-f"),
        ("eu-isoe-", "aws-iso-e"),
        ("us-iso-", "aws-iso"),
        ("us-gov-", "aws-us-gov"),
        ("cn-", "aws-cn"),
    ];
    let Some(region) = region else {
        return "aws";
    };
    PREFIXES
        .iter()
        .find(|(prefix, _)| region.starts_with(prefix))
        .map_or("aws", |&(_, partition)| partition)
}

/// Calls GetCallerIdentity and turns the caller ARN into a [`ResolvedIdentity`]
pub struct IdentityValidator<'a> {
    backend: &'a dyn CredentialBackend,
}

impl<'a> IdentityValidator<'a> {
    /// Validator calling `backend`
    #[must_use]
    pub fn new(backend: &'a dyn CredentialBackend) -> Self {
        Self { backend }
    }

    /// Prove `credentials` work; the account and partition come from the caller ARN
    pub async fn validate(&self, credentials: &CredentialSet) -> Result<ResolvedIdentity> {
        debug!("Validating {} credentials", credentials.provider_name);
        let caller_arn = self
            .backend
            .get_caller_identity(credentials)
            .await
            .map_err(|e| CredentialError::identity_validation(&e))?;

        let arn = Arn::parse(&caller_arn).ok_or_else(|| CredentialError::IdentityValidation {
            code: codes::INVALID_CALLER_ARN.to_string(),
            message: format!("GetCallerIdentity returned an unparsable ARN '{caller_arn}'"),
        })?;
        info!("Credentials belong to account {}", arn.account_id);
        Ok(ResolvedIdentity {
            account_id: arn.account_id,
            partition: arn.partition,
            arn: Some(caller_arn),
        })
    }

    /// Identity honoring the skip flags:
    ///
    /// * validation on: call, account from the ARN unless the account lookup is skipped
    /// * validation skipped, account wanted: still call, failures are reported
    /// * both skipped: no call, empty account, partition from `region`
    pub async fn resolve_identity(
        &self,
        credentials: &CredentialSet,
        config: &Config,
        region: Option<&str>,
    ) -> Result<ResolvedIdentity> {
        if config.skip_credentials_validation && config.skip_requesting_account_id {
            return Ok(ResolvedIdentity {
                account_id: String::new(),
                partition: partition_for_region(region).to_string(),
                arn: None,
            });
        }

        let mut identity = self.validate(credentials).await?;
        if config.skip_requesting_account_id {
            identity.account_id.clear();
        }
        Ok(identity)
    }
}
