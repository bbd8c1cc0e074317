//! Profile chain resolution.
//!
//! A profile is first flattened into a [`ProfileChain`]: one base provider
//! followed by zero or more role hops, outermost last. The chain is then
//! executed against the backend. Building is synchronous and bounded, so
//! cycles and over-long chains are rejected before any network call.

use log::{debug, info};
use std::collections::HashSet;
use std::path::PathBuf;

use super::files::{CredentialSource, ProfileFiles, ProfileSection};
use crate::assume_role::{AssumeRoleEngine, AssumeRoleParams};
use crate::credentials::{CredentialSet, ProviderName};
use crate::errors::{codes, CredentialError, Result};
use crate::providers::{
    container_metadata, environment, instance_metadata, web_identity, ProviderContext,
};

/// Longest `source_profile` chain that is followed
pub const MAX_CHAIN_DEPTH: usize = 10;

/// Where the first credentials of a chain come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum BaseProvider {
    /// Keys found in the credentials or config file
    AccessKey(CredentialSet),
    /// A `credential_source` provider
    CredentialSource {
        profile: String,
        source: CredentialSource,
    },
    /// `role_arn` plus `web_identity_token_file`
    WebIdentityToken {
        role_arn: String,
        session_name: Option<String>,
        token_file: PathBuf,
        duration_seconds: Option<i32>,
    },
}

/// A role hop contributed by one profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RoleHop {
    profile: String,
    role_arn: String,
    session_name: Option<String>,
    external_id: Option<String>,
    duration_seconds: Option<i32>,
}

/// Flattened profile: base provider, then roles from innermost to outermost
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ProfileChain {
    base: BaseProvider,
    roles: Vec<RoleHop>,
}

fn role_hop(section: &ProfileSection, role_arn: &str) -> RoleHop {
    RoleHop {
        profile: section.name.clone(),
        role_arn: role_arn.to_string(),
        session_name: section.role_session_name.clone(),
        external_id: section.external_id.clone(),
        duration_seconds: section.duration_seconds,
    }
}

fn build_chain(
    files: &ProfileFiles,
    name: &str,
    visited: &mut HashSet<String>,
) -> Result<Option<ProfileChain>> {
    if visited.contains(name) {
        return Err(CredentialError::configuration(
            codes::SOURCE_PROFILE_LOOP,
            format!("source_profile chain revisits profile '{name}'"),
        ));
    }
    if visited.len() >= MAX_CHAIN_DEPTH {
        return Err(CredentialError::configuration(
            codes::SOURCE_PROFILE_DEPTH,
            format!("source_profile chain through '{name}' is longer than {MAX_CHAIN_DEPTH} profiles"),
        ));
    }
    visited.insert(name.to_string());

    let credentials_section = files.credentials_profile(name)?;
    let config_section = files.config_profile(name)?;
    if credentials_section.is_none() && config_section.is_none() {
        return Ok(None);
    }

    if let Some(section) = config_section.as_ref() {
        if section.source_profile.is_some() && section.credential_source.is_some() {
            return Err(CredentialError::configuration(
                codes::CONFLICTING_ROLE_SOURCES,
                format!("profile '{name}' sets both source_profile and credential_source"),
            ));
        }
        let chains = section.source_profile.is_some() || section.credential_source.is_some();
        if chains && section.has_keys() {
            return Err(CredentialError::configuration(
                codes::CONFLICTING_PROFILE_CREDENTIALS,
                format!(
                    "profile '{name}' sets static keys together with source_profile or credential_source"
                ),
            ));
        }

        if let Some(source_profile) = section.source_profile.as_deref() {
            let role_arn = require_role_arn(section)?;
            // A profile may name itself to use its own keys from the credentials file
            let mut chain = if source_profile == name {
                credentials_keys(credentials_section.as_ref())
                    .map(|creds| ProfileChain {
                        base: BaseProvider::AccessKey(creds),
                        roles: Vec::new(),
                    })
            } else {
                build_chain(files, source_profile, visited)?
            }
            .ok_or_else(|| missing_source(name, source_profile, files))?;
            chain.roles.push(role_hop(section, role_arn));
            return Ok(Some(chain));
        }

        if let Some(source) = section.credential_source {
            let role_arn = require_role_arn(section)?;
            return Ok(Some(ProfileChain {
                base: BaseProvider::CredentialSource {
                    profile: name.to_string(),
                    source,
                },
                roles: vec![role_hop(section, role_arn)],
            }));
        }

        if let (Some(role_arn), Some(token_file)) = (
            section.role_arn.as_deref(),
            section.web_identity_token_file.as_ref(),
        ) {
            return Ok(Some(ProfileChain {
                base: BaseProvider::WebIdentityToken {
                    role_arn: role_arn.to_string(),
                    session_name: section.role_session_name.clone(),
                    token_file: token_file.clone(),
                    duration_seconds: section.duration_seconds,
                },
                roles: Vec::new(),
            }));
        }

        if section.role_arn.is_some() && !section.has_keys() && credentials_section.is_none() {
            return Err(CredentialError::configuration(
                codes::ROLE_REQUIRES_SOURCE,
                format!(
                    "profile '{name}' sets role_arn without source_profile, credential_source or web_identity_token_file"
                ),
            ));
        }
    }

    let keys = credentials_keys(credentials_section.as_ref()).or_else(|| {
        config_section
            .as_ref()
            .and_then(|section| section.credentials(ProviderName::SharedConfigFile))
    });
    Ok(keys.map(|creds| ProfileChain {
        base: BaseProvider::AccessKey(creds),
        roles: Vec::new(),
    }))
}

fn credentials_keys(section: Option<&ProfileSection>) -> Option<CredentialSet> {
    section.and_then(|section| section.credentials(ProviderName::SharedCredentialsFile))
}

fn require_role_arn(section: &ProfileSection) -> Result<&str> {
    section.role_arn.as_deref().ok_or_else(|| {
        CredentialError::configuration(
            codes::CREDENTIAL_REQUIRES_ARN,
            format!(
                "profile '{}' uses source_profile or credential_source but has no role_arn",
                section.name
            ),
        )
    })
}

fn missing_source(name: &str, source_profile: &str, files: &ProfileFiles) -> CredentialError {
    let exists = matches!(files.credentials_profile(source_profile), Ok(Some(_)))
        || matches!(files.config_profile(source_profile), Ok(Some(_)));
    if exists {
        CredentialError::configuration(
            codes::SOURCE_PROFILE_NO_CREDENTIALS,
            format!("source_profile '{source_profile}' of profile '{name}' has no credentials"),
        )
    } else {
        CredentialError::configuration(
            codes::PROFILE_NOT_FOUND,
            format!("source_profile '{source_profile}' of profile '{name}' does not exist"),
        )
    }
}

/// Resolves the active profile to credentials, following role chains
pub struct ProfileResolver<'c, 'a> {
    ctx: &'c ProviderContext<'a>,
}

impl<'c, 'a> ProfileResolver<'c, 'a> {
    /// Resolver reading through `ctx`
    #[must_use]
    pub const fn new(ctx: &'c ProviderContext<'a>) -> Self {
        Self { ctx }
    }

    /// Resolve the active profile.
    ///
    /// `Ok(None)` when the implicit default profile does not exist or carries
    /// no credentials. An explicitly named profile that exists in neither
    /// file is an error.
    pub async fn resolve(&self) -> Result<Option<CredentialSet>> {
        let (name, explicit) = self.ctx.profile_name();
        self.resolve_profile(name, explicit).await
    }

    /// Resolve a named profile
    pub async fn resolve_profile(&self, name: &str, explicit: bool) -> Result<Option<CredentialSet>> {
        let files = self.ctx.files.load()?;
        let mut visited = HashSet::new();
        let Some(chain) = build_chain(&files, name, &mut visited)? else {
            let exists = files.credentials_profile(name)?.is_some() || files.config_profile(name)?.is_some();
            if explicit && !exists {
                return Err(CredentialError::configuration(
                    codes::PROFILE_NOT_FOUND,
                    format!("profile '{name}' does not exist in the shared credentials or config file"),
                ));
            }
            debug!("Profile '{name}' provides no credentials");
            return Ok(None);
        };
        debug!(
            "Profile '{name}' resolves through {} role hop(s)",
            chain.roles.len()
        );
        self.execute(chain).await.map(Some)
    }

    async fn execute(&self, chain: ProfileChain) -> Result<CredentialSet> {
        let engine = AssumeRoleEngine::new(self.ctx.backend);
        let mut credentials = match chain.base {
            BaseProvider::AccessKey(creds) => creds,
            BaseProvider::CredentialSource { profile, source } => {
                self.credential_source(&profile, source).await?
            }
            BaseProvider::WebIdentityToken {
                role_arn,
                session_name,
                token_file,
                duration_seconds,
            } => {
                let token = web_identity::read_token(&token_file).await?;
                engine
                    .assume_with_web_identity(
                        &role_arn,
                        session_name.as_deref().unwrap_or_default(),
                        token,
                        duration_seconds,
                    )
                    .await?
            }
        };

        for hop in chain.roles {
            let params = AssumeRoleParams {
                role_arn: hop.role_arn,
                session_name: hop.session_name.unwrap_or_default(),
                external_id: hop.external_id,
                duration_seconds: hop.duration_seconds,
                ..AssumeRoleParams::default()
            };
            debug!("Profile '{}' assumes {}", hop.profile, params.role_arn);
            credentials = engine.assume(&credentials, &params).await?;
        }
        info!("Resolved credentials from profile chain via {}", credentials.provider_name);
        Ok(credentials)
    }

    async fn credential_source(&self, profile: &str, source: CredentialSource) -> Result<CredentialSet> {
        let resolved = match source {
            CredentialSource::Environment => environment::resolve(self.ctx.env)?,
            CredentialSource::Ec2InstanceMetadata => instance_metadata::resolve(self.ctx).await,
            CredentialSource::EcsContainer => container_metadata::resolve(self.ctx).await,
        };
        resolved.ok_or_else(|| {
            CredentialError::configuration(
                codes::CREDENTIAL_SOURCE_UNAVAILABLE,
                format!("credential_source {source:?} of profile '{profile}' produced no credentials"),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::env::{self, Env};
    use crate::testing::FakeBackend;
    use std::fs;
    use tempfile::TempDir;

    const CREDENTIALS: &str = "\
[default]
aws_access_key_id = DefaultSharedCredentialsAccessKey
aws_secret_access_key = DefaultSharedCredentialsSecretKey

[SharedCredentialsProfile]
aws_access_key_id = ProfileSharedCredentialsAccessKey
aws_secret_access_key = ProfileSharedCredentialsSecretKey
";

    struct Fixture {
        _dir: TempDir,
        config: Config,
    }

    fn fixture(credentials: &str, config_file: &str) -> Fixture {
        let dir = TempDir::new().expect("temp dir");
        let credentials_path = dir.path().join("credentials");
        let config_path = dir.path().join("config");
        fs::write(&credentials_path, credentials).expect("write credentials");
        fs::write(&config_path, config_file).expect("write config");
        let config = Config::default()
            .with_credentials_file(credentials_path)
            .with_config_file(config_path)
            .skip_metadata_api_check(true);
        Fixture { _dir: dir, config }
    }

    async fn resolve_named(fixture: &Fixture, env: &Env, backend: &FakeBackend, name: &str) -> Result<Option<CredentialSet>> {
        let config = fixture.config.clone().with_profile(name);
        let ctx = ProviderContext::new(&config, env, backend);
        ProfileResolver::new(&ctx).resolve().await
    }

    #[tokio::test]
    async fn test_default_profile_keys() {
        let fixture = fixture(CREDENTIALS, "");
        let env = Env::default();
        let backend = FakeBackend::new();
        let ctx = ProviderContext::new(&fixture.config, &env, &backend);

        let creds = ProfileResolver::new(&ctx).resolve().await.expect("ok").expect("available");
        assert_eq!(creds.access_key_id, "DefaultSharedCredentialsAccessKey");
        assert_eq!(creds.provider_name, ProviderName::SharedCredentialsFile);
    }

    #[tokio::test]
    async fn test_missing_implicit_default_is_unavailable() {
        let fixture = fixture("", "");
        let env = Env::default();
        let backend = FakeBackend::new();
        let ctx = ProviderContext::new(&fixture.config, &env, &backend);

        assert!(ProfileResolver::new(&ctx).resolve().await.expect("ok").is_none());
    }

    #[tokio::test]
    async fn test_missing_explicit_profile_is_error() {
        let fixture = fixture(CREDENTIALS, "");
        let env = Env::default();
        let backend = FakeBackend::new();

        let error = resolve_named(&fixture, &env, &backend, "NoSuchProfile")
            .await
            .expect_err("missing profile");
        assert_eq!(error.code(), Some(codes::PROFILE_NOT_FOUND));
    }

    #[tokio::test]
    async fn test_source_profile_chain() {
        let fixture = fixture(
            CREDENTIALS,
            "\
[profile SourceSharedCredentials]
role_arn = arn:aws:iam::555555555555:role/SourceSharedCredentials
role_session_name = SourceSharedCredentialsSessionName
source_profile = SharedCredentialsProfile
external_id = ExternalId
",
        );
        let env = Env::default();
        let backend = FakeBackend::new();

        let creds = resolve_named(&fixture, &env, &backend, "SourceSharedCredentials")
            .await
            .expect("ok")
            .expect("available");
        assert_eq!(creds.provider_name, ProviderName::AssumeRole);

        let requests = backend.assume_role_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0].credentials.access_key_id,
            "ProfileSharedCredentialsAccessKey"
        );
        assert_eq!(requests[0].session_name, "SourceSharedCredentialsSessionName");
        assert_eq!(requests[0].external_id.as_deref(), Some("ExternalId"));
    }

    #[tokio::test]
    async fn test_two_hop_chain_uses_inner_role_credentials() {
        let fixture = fixture(
            CREDENTIALS,
            "\
[profile inner]
role_arn = arn:aws:iam::555555555555:role/inner
role_session_name = inner-session
source_profile = SharedCredentialsProfile

[profile outer]
role_arn = arn:aws:iam::666666666666:role/outer
role_session_name = outer-session
source_profile = inner
",
        );
        let env = Env::default();
        let backend = FakeBackend::new();

        let creds = resolve_named(&fixture, &env, &backend, "outer")
            .await
            .expect("ok")
            .expect("available");
        assert_eq!(creds.access_key_id, "ASIA-outer");

        let requests = backend.assume_role_requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].role_arn, "arn:aws:iam::555555555555:role/inner");
        assert_eq!(requests[1].credentials.access_key_id, "ASIA-inner");
    }

    #[tokio::test]
    async fn test_source_profile_without_role_arn() {
        let fixture = fixture(
            CREDENTIALS,
            "[profile SourceSharedCredentials]\nsource_profile = SharedCredentialsProfile\n",
        );
        let env = Env::default();
        let backend = FakeBackend::new();

        let error = resolve_named(&fixture, &env, &backend, "SourceSharedCredentials")
            .await
            .expect_err("role_arn required");
        assert_eq!(error.code(), Some("CredentialRequiresARNError"));
        assert_eq!(backend.assume_role_calls(), 0);
    }

    #[tokio::test]
    async fn test_cycle_is_detected_before_any_call() {
        let fixture = fixture(
            "",
            "\
[profile a]
role_arn = arn:aws:iam::555555555555:role/a
role_session_name = a
source_profile = b

[profile b]
role_arn = arn:aws:iam::555555555555:role/b
role_session_name = b
source_profile = a
",
        );
        let env = Env::default();
        let backend = FakeBackend::new();

        let error = resolve_named(&fixture, &env, &backend, "a").await.expect_err("cycle");
        assert_eq!(error.code(), Some(codes::SOURCE_PROFILE_LOOP));
        assert_eq!(backend.assume_role_calls(), 0);
    }

    #[tokio::test]
    async fn test_chain_depth_is_bounded() {
        let mut config_file = String::new();
        for i in 0..=MAX_CHAIN_DEPTH {
            config_file.push_str(&format!(
                "[profile p{i}]\nrole_arn = arn:aws:iam::555555555555:role/p{i}\nrole_session_name = s\nsource_profile = p{}\n\n",
                i + 1
            ));
        }
        let fixture = fixture("", &config_file);
        let env = Env::default();
        let backend = FakeBackend::new();

        let error = resolve_named(&fixture, &env, &backend, "p0").await.expect_err("too deep");
        assert_eq!(error.code(), Some(codes::SOURCE_PROFILE_DEPTH));
    }

    #[tokio::test]
    async fn test_keys_with_source_profile_conflict() {
        let fixture = fixture(
            CREDENTIALS,
            "\
[profile conflicted]
aws_access_key_id = AKID
aws_secret_access_key = SECRET
role_arn = arn:aws:iam::555555555555:role/c
source_profile = default
",
        );
        let env = Env::default();
        let backend = FakeBackend::new();

        let error = resolve_named(&fixture, &env, &backend, "conflicted")
            .await
            .expect_err("conflict");
        assert_eq!(error.code(), Some(codes::CONFLICTING_PROFILE_CREDENTIALS));
    }

    #[tokio::test]
    async fn test_source_profile_with_credential_source_conflict() {
        let fixture = fixture(
            CREDENTIALS,
            "\
[profile both]
role_arn = arn:aws:iam::555555555555:role/both
role_session_name = both
source_profile = SharedCredentialsProfile
credential_source = Environment
",
        );
        let env = Env::default();
        let backend = FakeBackend::new();

        let error = resolve_named(&fixture, &env, &backend, "both")
            .await
            .expect_err("two sources");
        assert!(error.is_configuration());
        assert_eq!(error.code(), Some(codes::CONFLICTING_ROLE_SOURCES));
        assert_eq!(backend.assume_role_calls(), 0);
    }

    #[tokio::test]
    async fn test_credential_source_environment() {
        let fixture = fixture(
            "",
            "\
[profile ci]
role_arn = arn:aws:iam::555555555555:role/ci
role_session_name = ci
credential_source = Environment
",
        );
        let env = Env::from_slice(&[
            (env::AWS_ACCESS_KEY_ID, "EnvAccessKey"),
            (env::AWS_SECRET_ACCESS_KEY, "EnvSecretKey"),
        ]);
        let backend = FakeBackend::new();

        let creds = resolve_named(&fixture, &env, &backend, "ci").await.expect("ok").expect("available");
        assert_eq!(creds.access_key_id, "ASIA-ci");
        assert_eq!(backend.assume_role_requests()[0].credentials.access_key_id, "EnvAccessKey");
    }

    #[tokio::test]
    async fn test_credential_source_unavailable() {
        let fixture = fixture(
            "",
            "\
[profile instance]
role_arn = arn:aws:iam::555555555555:role/instance
role_session_name = instance
credential_source = Ec2InstanceMetadata
",
        );
        let env = Env::default();
        let backend = FakeBackend::new();

        let error = resolve_named(&fixture, &env, &backend, "instance")
            .await
            .expect_err("metadata disabled");
        assert_eq!(error.code(), Some(codes::CREDENTIAL_SOURCE_UNAVAILABLE));
    }

    #[tokio::test]
    async fn test_web_identity_profile() {
        let dir = TempDir::new().expect("temp dir");
        let token_path = dir.path().join("token");
        fs::write(&token_path, "profile-oidc").expect("write token");
        let fixture = fixture(
            "",
            &format!(
                "[profile federated]\nrole_arn = arn:aws:iam::555555555555:role/federated\n\
                 role_session_name = federated\nweb_identity_token_file = {}\n",
                token_path.display()
            ),
        );
        let env = Env::default();
        let backend = FakeBackend::new();

        let creds = resolve_named(&fixture, &env, &backend, "federated")
            .await
            .expect("ok")
            .expect("available");
        assert_eq!(creds.provider_name, ProviderName::WebIdentity);
        assert_eq!(backend.web_identity_requests()[0].web_identity_token, "profile-oidc");
    }

    #[tokio::test]
    async fn test_config_file_keys_are_used_after_credentials_file() {
        let fixture = fixture(
            "",
            "[profile keys]\naws_access_key_id = ConfigAccessKey\naws_secret_access_key = ConfigSecretKey\n",
        );
        let env = Env::default();
        let backend = FakeBackend::new();

        let creds = resolve_named(&fixture, &env, &backend, "keys").await.expect("ok").expect("available");
        assert_eq!(creds.access_key_id, "ConfigAccessKey");
        assert_eq!(creds.provider_name, ProviderName::SharedConfigFile);
    }
}
