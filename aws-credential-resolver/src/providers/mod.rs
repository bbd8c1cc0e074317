//! Source providers: the leaf lookups of the precedence chain.
//!
//! Every provider answers with `Ok(Some(_))` (available), `Ok(None)` (not
//! available, the resolver moves on) or `Err(_)` (a real failure that stops
//! resolution).

pub(crate) mod container_metadata;
pub(crate) mod environment;
pub(crate) mod instance_metadata;
mod metadata;
pub(crate) mod static_keys;
pub(crate) mod web_identity;

use std::fmt;

use crate::aws::CredentialBackend;
use crate::config::Config;
use crate::credentials::CredentialSet;
use crate::env::{self, Env};
use crate::errors::Result;
use crate::profile::{ProfileResolver, SharedFiles};

pub(crate) use metadata::MetadataClient;

/// Profile used when neither the config nor `AWS_PROFILE` names one
pub const DEFAULT_PROFILE: &str = "default";

/// Config profile, then `AWS_PROFILE`, then `default`; the flag is false only for the fallback
pub(crate) fn active_profile<'a>(config: &'a Config, env: &'a Env) -> (&'a str, bool) {
    if let Some(profile) = config.profile.as_deref().filter(|p| !p.is_empty()) {
        return (profile, true);
    }
    if let Some(profile) = env.get(env::AWS_PROFILE) {
        return (profile, true);
    }
    (DEFAULT_PROFILE, false)
}

/// Everything a provider may read during one resolution
pub struct ProviderContext<'a> {
    pub(crate) config: &'a Config,
    pub(crate) env: &'a Env,
    pub(crate) files: SharedFiles,
    pub(crate) backend: &'a dyn CredentialBackend,
    pub(crate) metadata: MetadataClient,
}

impl<'a> ProviderContext<'a> {
    /// Context over a config, an environment snapshot and a backend
    #[must_use]
    pub fn new(config: &'a Config, env: &'a Env, backend: &'a dyn CredentialBackend) -> Self {
        Self {
            config,
            env,
            files: SharedFiles::locate(config, env),
            backend,
            metadata: MetadataClient::new(&config.metadata),
        }
    }

    /// Active profile name and whether the caller asked for it explicitly
    #[must_use]
    pub fn profile_name(&self) -> (&str, bool) {
        active_profile(self.config, self.env)
    }

    /// EC2 metadata is skipped by config or by `AWS_EC2_METADATA_DISABLED`
    pub(crate) fn ec2_metadata_disabled(&self) -> bool {
        self.config.skip_metadata_api_check || self.env.flag(env::AWS_EC2_METADATA_DISABLED)
    }
}

/// The closed set of credential sources, in precedence order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceProvider {
    /// Keys in [`Config`]
    Static,
    /// Environment variables
    Environment,
    /// Shared credentials / config files, including profile role chains
    SharedProfile,
    /// Web identity token federation
    WebIdentity,
    /// EC2 instance metadata
    Ec2InstanceMetadata,
    /// ECS container credentials endpoint
    EcsContainer,
}

/// Strict resolution order; the first available source wins
pub const PRECEDENCE: [SourceProvider; 6] = [
    SourceProvider::Static,
    SourceProvider::Environment,
    SourceProvider::SharedProfile,
    SourceProvider::WebIdentity,
    SourceProvider::Ec2InstanceMetadata,
    SourceProvider::EcsContainer,
];

impl SourceProvider {
    /// Whether the provider must not be attempted at all
    #[must_use]
    pub fn is_disabled(self, ctx: &ProviderContext<'_>) -> bool {
        matches!(self, Self::Ec2InstanceMetadata) && ctx.ec2_metadata_disabled()
    }

    /// Attempt resolution
    pub async fn attempt(self, ctx: &ProviderContext<'_>) -> Result<Option<CredentialSet>> {
        match self {
            Self::Static => Ok(static_keys::resolve(ctx.config)),
            Self::Environment => environment::resolve(ctx.env),
            Self::SharedProfile => ProfileResolver::new(ctx).resolve().await,
            Self::WebIdentity => web_identity::resolve(ctx).await,
            Self::Ec2InstanceMetadata => Ok(instance_metadata::resolve(ctx).await),
            Self::EcsContainer => Ok(container_metadata::resolve(ctx).await),
        }
    }
}

impl fmt::Display for SourceProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Static => "static config",
            Self::Environment => "environment variables",
            Self::SharedProfile => "shared profile",
            Self::WebIdentity => "web identity",
            Self::Ec2InstanceMetadata => "EC2 instance metadata",
            Self::EcsContainer => "ECS container metadata",
        };
        f.write_str(name)
    }
}
