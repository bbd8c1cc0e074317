//! Shared credentials and config file reader.

use ini::{Ini, Properties};
use log::debug;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::config::Config;
use crate::credentials::{CredentialSet, ProviderName};
use crate::env::{self, Env};
use crate::errors::{codes, CredentialError, Result};
use crate::providers::DEFAULT_PROFILE;

/// Provider named by a profile's `credential_source`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// `Ec2InstanceMetadata`
    Ec2InstanceMetadata,
    /// `EcsContainer`
    EcsContainer,
    /// `Environment`
    Environment,
}

impl FromStr for CredentialSource {
    type Err = CredentialError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "Ec2InstanceMetadata" => Ok(Self::Ec2InstanceMetadata),
            "EcsContainer" => Ok(Self::EcsContainer),
            "Environment" => Ok(Self::Environment),
            other => Err(CredentialError::configuration(
                codes::INVALID_CREDENTIAL_SOURCE,
                format!(
                    "credential_source '{other}' is not one of Ec2InstanceMetadata, EcsContainer, Environment"
                ),
            )),
        }
    }
}

/// Parsed profile section. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileSection {
    /// Profile name without the `profile ` prefix
    pub name: String,
    /// `aws_access_key_id`
    pub access_key_id: Option<String>,
    /// `aws_secret_access_key`
    pub secret_access_key: Option<String>,
    /// `aws_session_token`
    pub session_token: Option<String>,
    /// `role_arn`
    pub role_arn: Option<String>,
    /// `source_profile`
    pub source_profile: Option<String>,
    /// `credential_source`
    pub credential_source: Option<CredentialSource>,
    /// `role_session_name`
    pub role_session_name: Option<String>,
    /// `external_id`
    pub external_id: Option<String>,
    /// `duration_seconds`
    pub duration_seconds: Option<i32>,
    /// `web_identity_token_file`
    pub web_identity_token_file: Option<PathBuf>,
    /// `region`
    pub region: Option<String>,
}

fn value(properties: &Properties, key: &str) -> Option<String> {
    properties
        .get(key)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}

impl ProfileSection {
    fn parse(name: &str, properties: &Properties) -> Result<Self> {
        let credential_source = value(properties, "credential_source")
            .map(|source| source.parse::<CredentialSource>())
            .transpose()?;
        let duration_seconds = value(properties, "duration_seconds")
            .map(|raw| {
                raw.parse::<i32>().map_err(|e| {
                    CredentialError::configuration_with_source(
                        codes::INVALID_DURATION,
                        format!("profile '{name}' has a non-numeric duration_seconds '{raw}'"),
                        e,
                    )
                })
            })
            .transpose()?;

        Ok(Self {
            name: name.to_string(),
            access_key_id: value(properties, "aws_access_key_id"),
            secret_access_key: value(properties, "aws_secret_access_key"),
            session_token: value(properties, "aws_session_token"),
            role_arn: value(properties, "role_arn"),
            source_profile: value(properties, "source_profile"),
            credential_source,
            role_session_name: value(properties, "role_session_name"),
            external_id: value(properties, "external_id"),
            duration_seconds,
            web_identity_token_file: value(properties, "web_identity_token_file").map(PathBuf::from),
            region: value(properties, "region"),
        })
    }

    /// True when either key field is present
    #[must_use]
    pub const fn has_keys(&self) -> bool {
        self.access_key_id.is_some() || self.secret_access_key.is_some()
    }

    /// Credentials from the key fields; both keys are required
    #[must_use]
    pub fn credentials(&self, provider: ProviderName) -> Option<CredentialSet> {
        let access_key = self.access_key_id.as_deref()?;
        let secret_key = self.secret_access_key.as_deref()?;
        Some(CredentialSet::new(
            access_key,
            secret_key,
            self.session_token.clone(),
            provider,
        ))
    }
}

/// Locations of the two shared files
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SharedFiles {
    /// Shared credentials file
    pub credentials_path: Option<PathBuf>,
    /// Shared config file
    pub config_path: Option<PathBuf>,
}

impl SharedFiles {
    /// Paths from the config, then the environment, then `~/.aws`
    #[must_use]
    pub fn locate(config: &Config, env: &Env) -> Self {
        let aws_dir = env.home_dir().map(|home| home.join(".aws"));
        let pick = |explicit: &Option<PathBuf>, var: &str, file: &str| {
            explicit
                .clone()
                .or_else(|| env.get(var).map(PathBuf::from))
                .or_else(|| aws_dir.as_ref().map(|dir| dir.join(file)))
        };
        Self {
            credentials_path: pick(
                &config.credentials_file,
                env::AWS_SHARED_CREDENTIALS_FILE,
                "credentials",
            ),
            config_path: pick(&config.config_file, env::AWS_CONFIG_FILE, "config"),
        }
    }

    /// Read both files. A missing file is empty; an unparsable one is an error.
    pub fn load(&self) -> Result<ProfileFiles> {
        Ok(ProfileFiles {
            credentials: self.credentials_path.as_deref().map(load_ini).transpose()?.flatten(),
            config: self.config_path.as_deref().map(load_ini).transpose()?.flatten(),
        })
    }

    /// Look up one profile in the shared credentials file
    pub fn read_credentials_profile(&self, profile: &str) -> Result<Option<ProfileSection>> {
        let Some(path) = self.credentials_path.as_deref() else {
            return Ok(None);
        };
        ProfileFiles {
            credentials: load_ini(path)?,
            config: None,
        }
        .credentials_profile(profile)
    }

    /// Look up one profile in the shared config file
    pub fn read_config_profile(&self, profile: &str) -> Result<Option<ProfileSection>> {
        let Some(path) = self.config_path.as_deref() else {
            return Ok(None);
        };
        ProfileFiles {
            credentials: None,
            config: load_ini(path)?,
        }
        .config_profile(profile)
    }
}

fn load_ini(path: &Path) -> Result<Option<Ini>> {
    match Ini::load_from_file(path) {
        Ok(ini) => Ok(Some(ini)),
        Err(ini::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("Shared file {} does not exist", path.display());
            Ok(None)
        }
        Err(ini::Error::Io(e)) => Err(CredentialError::file_system("read", path, e)),
        Err(ini::Error::Parse(e)) => Err(CredentialError::configuration_with_source(
            codes::SHARED_FILE_PARSE,
            format!("unable to parse shared file '{}'", path.display()),
            e,
        )),
    }
}

/// Contents of both shared files, read once per resolution
#[derive(Debug, Default)]
pub struct ProfileFiles {
    credentials: Option<Ini>,
    config: Option<Ini>,
}

impl ProfileFiles {
    /// `[name]` from the credentials file
    pub fn credentials_profile(&self, name: &str) -> Result<Option<ProfileSection>> {
        self.credentials
            .as_ref()
            .and_then(|ini| ini.section(Some(name)))
            .map(|properties| ProfileSection::parse(name, properties))
            .transpose()
    }

    /// `[profile name]` from the config file; `[default]` is also accepted for the default profile
    pub fn config_profile(&self, name: &str) -> Result<Option<ProfileSection>> {
        let Some(ini) = self.config.as_ref() else {
            return Ok(None);
        };
        let prefixed = format!("profile {name}");
        ini.section(Some(prefixed.as_str()))
            .or_else(|| {
                if name == DEFAULT_PROFILE {
                    ini.section(Some(name))
                } else {
                    None
                }
            })
            .map(|properties| ProfileSection::parse(name, properties))
            .transpose()
    }

    /// Region configured for a profile in the config file
    pub fn region(&self, name: &str) -> Result<Option<String>> {
        Ok(self.config_profile(name)?.and_then(|section| section.region))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, contents).expect("write shared file");
        path
    }

    #[test]
    fn test_locate_precedence() {
        let env = Env::from_slice(&[
            ("HOME", "/home/alice"),
            (env::AWS_CONFIG_FILE, "/etc/aws/config"),
        ]);
        let config = Config::default().with_credentials_file("/tmp/creds");

        let files = SharedFiles::locate(&config, &env);
        assert_eq!(files.credentials_path, Some(PathBuf::from("/tmp/creds")));
        assert_eq!(files.config_path, Some(PathBuf::from("/etc/aws/config")));

        let files = SharedFiles::locate(&Config::default(), &Env::from_slice(&[("HOME", "/home/alice")]));
        assert_eq!(
            files.credentials_path,
            Some(PathBuf::from("/home/alice/.aws/credentials"))
        );
    }

    #[test]
    fn test_config_profile_sections() {
        let dir = TempDir::new().expect("temp dir");
        let config_path = write(
            &dir,
            "config",
            "[default]\nregion = us-west-2\n\n\
             [profile dev]\nrole_arn = arn:aws:iam::555555555555:role/dev\nsource_profile = default\n\
             credential_source = Environment\nduration_seconds = 3600\nrole_session_name = dev-session\n",
        );
        let files = SharedFiles {
            credentials_path: None,
            config_path: Some(config_path),
        };

        let default = files.read_config_profile("default").expect("parse").expect("default");
        assert_eq!(default.region.as_deref(), Some("us-west-2"));

        let dev = files.read_config_profile("dev").expect("parse").expect("dev");
        assert_eq!(dev.source_profile.as_deref(), Some("default"));
        assert_eq!(dev.credential_source, Some(CredentialSource::Environment));
        assert_eq!(dev.duration_seconds, Some(3600));
        assert_eq!(dev.role_session_name.as_deref(), Some("dev-session"));

        assert!(files.read_config_profile("missing").expect("parse").is_none());
    }

    #[test]
    fn test_bare_config_section_only_counts_for_default() {
        let dir = TempDir::new().expect("temp dir");
        let config_path = write(
            &dir,
            "config",
            "[default]\nregion = eu-west-1\n\n[dev]\nregion = us-east-2\n",
        );
        let files = SharedFiles {
            credentials_path: None,
            config_path: Some(config_path),
        };

        let default = files.read_config_profile("default").expect("parse").expect("default");
        assert_eq!(default.region.as_deref(), Some("eu-west-1"));
        assert!(files.read_config_profile("dev").expect("parse").is_none());
    }

    #[test]
    fn test_credentials_profile_keys() {
        let dir = TempDir::new().expect("temp dir");
        let path = write(
            &dir,
            "credentials",
            "[default]\naws_access_key_id = DefaultSharedCredentialsAccessKey\n\
             aws_secret_access_key = DefaultSharedCredentialsSecretKey\n\n\
             [half]\naws_access_key_id = OnlyAccessKey\n",
        );
        let files = SharedFiles {
            credentials_path: Some(path),
            config_path: None,
        };

        let default = files.read_credentials_profile("default").expect("parse").expect("default");
        let creds = default
            .credentials(ProviderName::SharedCredentialsFile)
            .expect("both keys");
        assert_eq!(creds.access_key_id, "DefaultSharedCredentialsAccessKey");

        let half = files.read_credentials_profile("half").expect("parse").expect("half");
        assert!(half.has_keys());
        assert!(half.credentials(ProviderName::SharedCredentialsFile).is_none());
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().expect("temp dir");
        let files = SharedFiles {
            credentials_path: Some(dir.path().join("nope")),
            config_path: Some(dir.path().join("nope-either")),
        };
        let loaded = files.load().expect("missing files are fine");
        assert!(loaded.credentials_profile("default").expect("ok").is_none());
        assert!(loaded.config_profile("default").expect("ok").is_none());
    }

    #[test]
    fn test_invalid_credential_source() {
        let dir = TempDir::new().expect("temp dir");
        let path = write(&dir, "config", "[profile bad]\ncredential_source = Laptop\n");
        let files = SharedFiles {
            credentials_path: None,
            config_path: Some(path),
        };
        let error = files.read_config_profile("bad").expect_err("invalid source");
        assert_eq!(error.code(), Some(codes::INVALID_CREDENTIAL_SOURCE));
    }
}
