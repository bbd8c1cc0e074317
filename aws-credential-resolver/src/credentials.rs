//! Resolved credential and identity values

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which source produced a [`CredentialSet`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderName {
    /// Keys given directly in the config
    Static,
    /// `AWS_ACCESS_KEY_ID` and friends
    Environment,
    /// The shared credentials file
    SharedCredentialsFile,
    /// Keys embedded in a shared config file profile
    SharedConfigFile,
    /// The EC2 instance metadata service
    Ec2InstanceMetadata,
    /// The ECS container credentials endpoint
    EcsContainerMetadata,
    /// STS AssumeRoleWithWebIdentity
    WebIdentity,
    /// STS AssumeRole
    AssumeRole,
}

impl ProviderName {
    /// Stable name, also used as the SDK credential provider name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Static => "Static",
            Self::Environment => "Environment",
            Self::SharedCredentialsFile => "SharedCredentialsFile",
            Self::SharedConfigFile => "SharedConfigFile",
            Self::Ec2InstanceMetadata => "Ec2InstanceMetadata",
            Self::EcsContainerMetadata => "EcsContainerMetadata",
            Self::WebIdentity => "WebIdentity",
            Self::AssumeRole => "AssumeRole",
        }
    }
}

impl fmt::Display for ProviderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One resolved set of AWS credentials
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialSet {
    /// Access key ID
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Session token; present for temporary credentials
    pub session_token: Option<String>,
    /// Source that produced the credentials
    pub provider_name: ProviderName,
    /// Expiry reported by the issuer, not tracked by the engine
    pub expiration: Option<DateTime<Utc>>,
}

impl CredentialSet {
    /// Long-lived or temporary credentials without a known expiry
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: Option<String>,
        provider_name: ProviderName,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: session_token.filter(|token| !token.is_empty()),
            provider_name,
            expiration: None,
        }
    }

    /// Attach an expiry
    #[must_use]
    pub const fn with_expiration(mut self, expiration: Option<DateTime<Utc>>) -> Self {
        self.expiration = expiration;
        self
    }

    /// True when a session token is present
    #[must_use]
    pub const fn is_temporary(&self) -> bool {
        self.session_token.is_some()
    }

    /// Convert into SDK credentials for building clients
    #[must_use]
    pub fn to_sdk_credentials(&self) -> aws_credential_types::Credentials {
        aws_credential_types::Credentials::new(
            &self.access_key_id,
            &self.secret_access_key,
            self.session_token.clone(),
            self.expiration.map(std::time::SystemTime::from),
            self.provider_name.as_str(),
        )
    }
}

impl fmt::Debug for CredentialSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialSet")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"** redacted **")
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "** redacted **"),
            )
            .field("provider_name", &self.provider_name)
            .field("expiration", &self.expiration)
            .finish()
    }
}

/// Account and partition of the resolved principal
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedIdentity {
    /// Account ID; empty when the lookup was skipped
    pub account_id: String,
    /// ARN partition, e.g. `aws`
    pub partition: String,
    /// Caller ARN when GetCallerIdentity was called
    pub arn: Option<String>,
}

/// ARN split into its positional fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arn {
    /// Partition, e.g. `aws-us-gov`
    pub partition: String,
    /// Service, e.g. `sts`
    pub service: String,
    /// Region; empty for global services
    pub region: String,
    /// Account ID
    pub account_id: String,
    /// Resource, e.g. `assumed-role/deploy/session`
    pub resource: String,
}

impl Arn {
    /// Parse `arn:<partition>:<service>:<region>:<account>:<resource>`
    #[must_use]
    pub fn parse(arn: &str) -> Option<Self> {
        let mut parts = arn.splitn(6, ':');
        if parts.next()? != "arn" {
            return None;
        }
        let partition = parts.next()?;
        let service = parts.next()?;
        let region = parts.next()?;
        let account_id = parts.next()?;
        let resource = parts.next()?;
        if partition.is_empty() || service.is_empty() {
            return None;
        }
        Some(Self {
            partition: partition.to_string(),
            service: service.to_string(),
            region: region.to_string(),
            account_id: account_id.to_string(),
            resource: resource.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_assumed_role_arn() {
        let arn = Arn::parse("arn:aws:sts::555555555555:assumed-role/role/AssumeRoleSessionName")
            .expect("valid arn");
        assert_eq!(arn.partition, "aws");
        assert_eq!(arn.service, "sts");
        assert_eq!(arn.account_id, "555555555555");
        assert_eq!(arn.resource, "assumed-role/role/AssumeRoleSessionName");
    }

    #[test]
    fn test_parse_user_arn_in_gov_partition() {
        let arn = Arn::parse("arn:aws-us-gov:iam::123456789012:user/path/to/Alice").expect("valid arn");
        assert_eq!(arn.partition, "aws-us-gov");
        assert_eq!(arn.account_id, "123456789012");
        assert_eq!(arn.resource, "user/path/to/Alice");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(Arn::parse("not-an-arn").is_none());
        assert!(Arn::parse("arn:aws:iam").is_none());
        assert!(Arn::parse("urn:aws:iam::123:user/a").is_none());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let creds = CredentialSet::new(
            "AKID",
            "very-secret",
            Some("token".to_string()),
            ProviderName::Environment,
        );
        let debug = format!("{creds:?}");
        assert!(debug.contains("AKID"));
        assert!(!debug.contains("very-secret"));
        assert!(!debug.contains("token\""));
    }

    #[test]
    fn test_empty_session_token_is_dropped() {
        let creds = CredentialSet::new("AKID", "SECRET", Some(String::new()), ProviderName::Static);
        assert!(!creds.is_temporary());
    }
}
