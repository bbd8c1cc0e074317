//! Caller-supplied configuration.
//!
//! A [`Config`] is built once and only borrowed during resolution. It can be
//! assembled with the `with_*` helpers or deserialized from JSON.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Default instance metadata endpoint
pub const DEFAULT_EC2_METADATA_ENDPOINT: &str = "http://169.254.169.254";

/// Default container credentials host for relative URIs
pub const DEFAULT_ECS_CREDENTIALS_ENDPOINT: &str = "http://169.254.170.2";

/// Region used for STS when none could be resolved
pub const DEFAULT_STS_REGION: &str = "us-east-1";

/// Top-level role assumption applied after base credentials are resolved
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssumeRoleConfig {
    /// Role to assume
    pub role_arn: String,
    /// Session name reported by STS
    pub session_name: String,
    /// External ID required by the role's trust policy
    pub external_id: Option<String>,
    /// Session lifetime; STS default when unset
    pub duration_seconds: Option<i32>,
    /// Inline session policy document
    pub policy: Option<String>,
    /// Managed session policy ARNs
    pub policy_arns: Vec<String>,
    /// Session tags
    pub tags: BTreeMap<String, String>,
    /// Tag keys that persist through role chaining
    pub transitive_tag_keys: Vec<String>,
}

impl AssumeRoleConfig {
    /// New assume-role block with the two required fields
    pub fn new(role_arn: impl Into<String>, session_name: impl Into<String>) -> Self {
        Self {
            role_arn: role_arn.into(),
            session_name: session_name.into(),
            ..Self::default()
        }
    }
}

/// Explicit web identity federation settings; environment is used when unset
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebIdentityConfig {
    /// Role to assume with the token
    pub role_arn: Option<String>,
    /// Session name
    pub session_name: Option<String>,
    /// File holding the OIDC token
    pub token_file: Option<PathBuf>,
}

/// Retry policy for STS calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the first retry; doubled on each further retry
    #[serde(with = "duration_millis")]
    pub base_delay: Duration,
    /// Upper bound for a single backoff delay
    #[serde(with = "duration_millis")]
    pub max_delay: Duration,
    /// Deadline for a single STS call
    #[serde(with = "duration_millis")]
    pub call_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(20),
            call_timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `retry` (1-based)
    #[must_use]
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Endpoints and deadlines for the local metadata services
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataOptions {
    /// Per-request deadline
    #[serde(with = "duration_millis")]
    pub timeout: Duration,
    /// Attempts per request before reporting "not available"
    pub attempts: u32,
    /// Instance metadata base URL; `AWS_EC2_METADATA_SERVICE_ENDPOINT` or the default when unset
    pub ec2_endpoint: Option<String>,
    /// Container credentials host for relative URIs
    pub ecs_endpoint: Option<String>,
}

impl Default for MetadataOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(1),
            attempts: 2,
            ec2_endpoint: None,
            ecs_endpoint: None,
        }
    }
}

/// Caller intent for one resolution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Static access key ID
    pub access_key: Option<String>,
    /// Static secret access key
    pub secret_key: Option<String>,
    /// Static session token
    pub session_token: Option<String>,
    /// Named profile; `AWS_PROFILE` or `default` when unset
    pub profile: Option<String>,
    /// Shared credentials file; `AWS_SHARED_CREDENTIALS_FILE` or `~/.aws/credentials` when unset
    pub credentials_file: Option<PathBuf>,
    /// Shared config file; `AWS_CONFIG_FILE` or `~/.aws/config` when unset
    pub config_file: Option<PathBuf>,
    /// Region
    pub region: Option<String>,
    /// Top-level role assumption
    pub assume_role: Option<AssumeRoleConfig>,
    /// Web identity settings
    pub web_identity: Option<WebIdentityConfig>,
    /// Skip GetCallerIdentity validation
    pub skip_credentials_validation: bool,
    /// Never consult the EC2 instance metadata service
    pub skip_metadata_api_check: bool,
    /// Return an empty account ID
    pub skip_requesting_account_id: bool,
    /// STS endpoint override
    pub sts_endpoint: Option<String>,
    /// STS retry policy
    pub retry: RetryPolicy,
    /// Metadata service options
    pub metadata: MetadataOptions,
}

impl Config {
    /// Static access key and secret key
    #[must_use]
    pub fn with_static_credentials(
        mut self,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        self.access_key = Some(access_key.into());
        self.secret_key = Some(secret_key.into());
        self
    }

    /// Static session token
    #[must_use]
    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    /// Named profile
    #[must_use]
    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    /// Region
    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Shared credentials file path
    #[must_use]
    pub fn with_credentials_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.credentials_file = Some(path.into());
        self
    }

    /// Shared config file path
    #[must_use]
    pub fn with_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    /// Top-level role assumption
    #[must_use]
    pub fn with_assume_role(mut self, assume_role: AssumeRoleConfig) -> Self {
        self.assume_role = Some(assume_role);
        self
    }

    /// STS endpoint override
    #[must_use]
    pub fn with_sts_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.sts_endpoint = Some(endpoint.into());
        self
    }

    /// Skip the GetCallerIdentity validation
    #[must_use]
    pub const fn skip_credentials_validation(mut self, skip: bool) -> Self {
        self.skip_credentials_validation = skip;
        self
    }

    /// Never consult the EC2 instance metadata service
    #[must_use]
    pub const fn skip_metadata_api_check(mut self, skip: bool) -> Self {
        self.skip_metadata_api_check = skip;
        self
    }

    /// Return an empty account ID
    #[must_use]
    pub const fn skip_requesting_account_id(mut self, skip: bool) -> Self {
        self.skip_requesting_account_id = skip;
        self
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub(super) fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 6,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
            call_timeout: Duration::from_secs(1),
        };

        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
        assert_eq!(policy.backoff(4), Duration::from_millis(500));
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{
            "profile": "deploy",
            "region": "eu-central-1",
            "skip_requesting_account_id": true,
            "assume_role": {
                "role_arn": "arn:aws:iam::555555555555:role/deploy",
                "session_name": "ci",
                "tags": {"team": "infra"},
                "transitive_tag_keys": ["team"]
            },
            "retry": {"max_attempts": 3, "base_delay": 10}
        }"#;

        let config: Config = serde_json::from_str(json).expect("valid config json");
        assert_eq!(config.profile.as_deref(), Some("deploy"));
        assert!(config.skip_requesting_account_id);
        assert!(!config.skip_credentials_validation);

        let assume_role = config.assume_role.expect("assume role block");
        assert_eq!(assume_role.session_name, "ci");
        assert_eq!(assume_role.tags.get("team").map(String::as_str), Some("infra"));

        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.base_delay, Duration::from_millis(10));
        assert_eq!(config.retry.max_delay, RetryPolicy::default().max_delay);
    }

    #[test]
    fn test_builder_helpers() {
        let config = Config::default()
            .with_static_credentials("AKID", "SECRET")
            .with_region("us-east-1")
            .skip_metadata_api_check(true);

        assert_eq!(config.access_key.as_deref(), Some("AKID"));
        assert_eq!(config.secret_key.as_deref(), Some("SECRET"));
        assert!(config.skip_metadata_api_check);
    }
}
