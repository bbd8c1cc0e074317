//! Precedence-ordered credential resolution.

use log::{debug, info, warn};

use crate::assume_role::{AssumeRoleEngine, AssumeRoleParams};
use crate::config::Config;
use crate::credentials::CredentialSet;
use crate::env::{self, Env};
use crate::errors::{CredentialError, Result};
use crate::profile::SharedFiles;
use crate::providers::{active_profile, ProviderContext, PRECEDENCE};

/// Walks [`PRECEDENCE`] and applies the top-level role assumption
pub struct PrecedenceResolver<'c, 'a> {
    ctx: &'c ProviderContext<'a>,
}

impl<'c, 'a> PrecedenceResolver<'c, 'a> {
    /// Resolver over `ctx`
    #[must_use]
    pub const fn new(ctx: &'c ProviderContext<'a>) -> Self {
        Self { ctx }
    }

    /// Base credentials from the first available source
    pub async fn resolve_base(&self) -> Result<CredentialSet> {
        let mut consulted = Vec::new();
        for provider in PRECEDENCE {
            if provider.is_disabled(self.ctx) {
                debug!("Skipping {provider}: disabled");
                continue;
            }
            consulted.push(provider.to_string());
            match provider.attempt(self.ctx).await? {
                Some(credentials) => {
                    info!(
                        "Resolved credentials from {provider} ({})",
                        credentials.provider_name
                    );
                    return Ok(credentials);
                }
                None => debug!("No credentials from {provider}"),
            }
        }
        Err(CredentialError::no_valid_sources(format!(
            "consulted {}",
            consulted.join(", ")
        )))
    }

    /// Base credentials, wrapped in the configured role when there is one
    pub async fn resolve(&self) -> Result<CredentialSet> {
        let base = self.resolve_base().await?;
        match self.ctx.config.assume_role.as_ref() {
            Some(assume_role) => {
                AssumeRoleEngine::new(self.ctx.backend)
                    .assume(&base, &AssumeRoleParams::from(assume_role))
                    .await
            }
            None => Ok(base),
        }
    }
}

/// Region: config, `AWS_REGION`, `AWS_DEFAULT_REGION`, then the active profile
#[must_use]
pub fn resolve_region(config: &Config, env: &Env) -> Option<String> {
    if let Some(region) = config.region.as_deref().filter(|r| !r.is_empty()) {
        return Some(region.to_string());
    }
    if let Some(region) = env.first_of(&[env::AWS_REGION, env::AWS_DEFAULT_REGION]) {
        return Some(region.to_string());
    }
    let (profile, _) = active_profile(config, env);
    match SharedFiles::locate(config, env)
        .load()
        .and_then(|files| files.region(profile))
    {
        Ok(region) => region,
        Err(e) => {
            warn!("Ignoring shared config while looking up the region: {e}");
            None
        }
    }
}
