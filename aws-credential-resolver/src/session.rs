//! Session assembly: the public entry point tying resolution, validation and
//! SDK configuration together.
//!
//! One call runs strictly in sequence: snapshot the environment, resolve the
//! region, resolve credentials, then validate and look up the account.

use aws_config::retry::RetryConfig;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_credential_types::provider::SharedCredentialsProvider;
use log::debug;
use std::sync::Arc;

use crate::aws::retry::{AsyncSleep, RetryingBackend, TokioSleep};
use crate::aws::sts::{StsBackend, StsBackendConfig};
use crate::aws::CredentialBackend;
use crate::config::{Config, RetryPolicy, DEFAULT_STS_REGION};
use crate::credentials::{CredentialSet, ResolvedIdentity};
use crate::env::Env;
use crate::errors::Result;
use crate::identity::IdentityValidator;
use crate::providers::ProviderContext;
use crate::resolver::{resolve_region, PrecedenceResolver};

/// Resolved credentials plus what a client needs to use them
#[derive(Debug, Clone)]
pub struct Session {
    /// Final credentials, after any role assumption
    pub credentials: CredentialSet,
    /// Resolved region
    pub region: Option<String>,
    /// Account and partition, when requested or validated
    pub identity: Option<ResolvedIdentity>,
    /// STS endpoint override in effect
    pub sts_endpoint: Option<String>,
    /// Retry policy in effect
    pub retry: RetryPolicy,
}

impl Session {
    /// Shared SDK configuration for building service clients
    #[must_use]
    pub fn sdk_config(&self) -> SdkConfig {
        SdkConfig::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(self.region.clone().map(Region::new))
            .credentials_provider(SharedCredentialsProvider::new(
                self.credentials.to_sdk_credentials(),
            ))
            .retry_config(RetryConfig::standard().with_max_attempts(self.retry.max_attempts.max(1)))
            .build()
    }

    /// Account ID, empty when unknown or skipped
    #[must_use]
    pub fn account_id(&self) -> &str {
        self.identity
            .as_ref()
            .map_or("", |identity| identity.account_id.as_str())
    }
}

/// Builds a [`Session`] from a [`Config`]
pub struct SessionAssembler<'a> {
    config: &'a Config,
    env: Option<Env>,
    backend: Option<Arc<dyn CredentialBackend>>,
    sleep: Arc<dyn AsyncSleep>,
}

impl<'a> SessionAssembler<'a> {
    /// Assembler reading the process environment and calling AWS STS
    #[must_use]
    pub fn new(config: &'a Config) -> Self {
        Self {
            config,
            env: None,
            backend: None,
            sleep: Arc::new(TokioSleep),
        }
    }

    /// Use this environment snapshot instead of the process environment
    #[must_use]
    pub fn with_env(mut self, env: Env) -> Self {
        self.env = Some(env);
        self
    }

    /// Use this backend instead of AWS STS. It is still wrapped with retries.
    #[must_use]
    pub fn with_backend(mut self, backend: Arc<dyn CredentialBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Sleep used between retries
    #[must_use]
    pub fn with_sleep(mut self, sleep: Arc<dyn AsyncSleep>) -> Self {
        self.sleep = sleep;
        self
    }

    fn backend(&self, region: Option<&str>) -> RetryingBackend {
        let inner = self.backend.clone().unwrap_or_else(|| {
            Arc::new(StsBackend::new(StsBackendConfig {
                region: region.unwrap_or(DEFAULT_STS_REGION).to_string(),
                endpoint: self.config.sts_endpoint.clone(),
                call_timeout: self.config.retry.call_timeout,
            }))
        });
        RetryingBackend::new(inner, self.config.retry, self.sleep.clone())
    }

    /// Resolve credentials, then validate them unless validation is skipped.
    ///
    /// `identity` is set only when validation ran.
    pub async fn assemble(&self) -> Result<Session> {
        self.run(false).await
    }

    /// Like [`Self::assemble`], but `identity` is always set, honoring the
    /// account lookup skip flags
    pub async fn assemble_with_identity(&self) -> Result<Session> {
        self.run(true).await
    }

    async fn run(&self, with_identity: bool) -> Result<Session> {
        let env = self.env.clone().unwrap_or_else(Env::from_process);
        let region = resolve_region(self.config, &env);
        debug!("Resolved region: {}", region.as_deref().unwrap_or("<none>"));

        let backend = self.backend(region.as_deref());
        let ctx = ProviderContext::new(self.config, &env, &backend);
        let credentials = PrecedenceResolver::new(&ctx).resolve().await?;

        let validator = IdentityValidator::new(&backend);
        let identity = if with_identity {
            Some(
                validator
                    .resolve_identity(&credentials, self.config, region.as_deref())
                    .await?,
            )
        } else if self.config.skip_credentials_validation {
            None
        } else {
            let mut identity = validator.validate(&credentials).await?;
            if self.config.skip_requesting_account_id {
                identity.account_id.clear();
            }
            Some(identity)
        };

        Ok(Session {
            credentials,
            region,
            identity,
            sts_endpoint: self.config.sts_endpoint.clone(),
            retry: self.config.retry,
        })
    }
}

/// Resolve (and unless skipped, validate) credentials using the process environment
pub async fn resolve(config: &Config) -> Result<CredentialSet> {
    SessionAssembler::new(config)
        .assemble()
        .await
        .map(|session| session.credentials)
}

/// Resolve credentials together with the account and partition
pub async fn resolve_with_identity(config: &Config) -> Result<(CredentialSet, ResolvedIdentity)> {
    let session = SessionAssembler::new(config).assemble_with_identity().await?;
    let identity = session.identity.unwrap_or_default();
    Ok((session.credentials, identity))
}
