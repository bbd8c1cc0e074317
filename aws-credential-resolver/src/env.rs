//! Point-in-time snapshot of the process environment.
//!
//! Resolution never calls `std::env` directly: the session assembler captures
//! one [`Env`] per call and every provider reads from it.

use std::collections::HashMap;
use std::path::PathBuf;

pub(crate) const AWS_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
pub(crate) const AWS_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
pub(crate) const AWS_SESSION_TOKEN: &str = "AWS_SESSION_TOKEN";
pub(crate) const AWS_ACCESS_KEY: &str = "AWS_ACCESS_KEY";
pub(crate) const AWS_SECRET_KEY: &str = "AWS_SECRET_KEY";
pub(crate) const AWS_PROFILE: &str = "AWS_PROFILE";
pub(crate) const AWS_REGION: &str = "AWS_REGION";
pub(crate) const AWS_DEFAULT_REGION: &str = "AWS_DEFAULT_REGION";
pub(crate) const AWS_SHARED_CREDENTIALS_FILE: &str = "AWS_SHARED_CREDENTIALS_FILE";
pub(crate) const AWS_CONFIG_FILE: &str = "AWS_CONFIG_FILE";
pub(crate) const AWS_ROLE_ARN: &str = "AWS_ROLE_ARN";
pub(crate) const AWS_ROLE_SESSION_NAME: &str = "AWS_ROLE_SESSION_NAME";
pub(crate) const AWS_WEB_IDENTITY_TOKEN_FILE: &str = "AWS_WEB_IDENTITY_TOKEN_FILE";
pub(crate) const AWS_CONTAINER_CREDENTIALS_RELATIVE_URI: &str =
    "AWS_CONTAINER_CREDENTIALS_RELATIVE_URI";
pub(crate) const AWS_CONTAINER_CREDENTIALS_FULL_URI: &str = "AWS_CONTAINER_CREDENTIALS_FULL_URI";
pub(crate) const AWS_CONTAINER_AUTHORIZATION_TOKEN: &str = "AWS_CONTAINER_AUTHORIZATION_TOKEN";
pub(crate) const AWS_EC2_METADATA_DISABLED: &str = "AWS_EC2_METADATA_DISABLED";
pub(crate) const AWS_EC2_METADATA_SERVICE_ENDPOINT: &str = "AWS_EC2_METADATA_SERVICE_ENDPOINT";

/// Immutable copy of the environment variables relevant to resolution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Env {
    vars: HashMap<String, String>,
}

impl Env {
    /// Capture the current process environment
    #[must_use]
    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    /// Build a snapshot from explicit pairs. Used by tests and embedders.
    #[must_use]
    pub fn from_slice(pairs: &[(&str, &str)]) -> Self {
        Self {
            vars: pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        }
    }

    /// Value of `key`; empty values are treated as unset
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    /// First set variable among `keys`
    pub(crate) fn first_of(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|key| self.get(key))
    }

    /// `true`/`1` style boolean flag
    pub(crate) fn flag(&self, key: &str) -> bool {
        self.get(key)
            .is_some_and(|value| value.eq_ignore_ascii_case("true") || value == "1")
    }

    /// Home directory: `HOME`, then `USERPROFILE`, then the platform lookup
    pub(crate) fn home_dir(&self) -> Option<PathBuf> {
        self.first_of(&["HOME", "USERPROFILE"])
            .map(PathBuf::from)
            .or_else(dirs::home_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_empty_values_are_unset() {
        let env = Env::from_slice(&[(AWS_PROFILE, ""), (AWS_REGION, "us-west-2")]);
        assert_eq!(env.get(AWS_PROFILE), None);
        assert_eq!(env.get(AWS_REGION), Some("us-west-2"));
    }

    #[test]
    fn test_first_of_prefers_earlier_keys() {
        let env = Env::from_slice(&[(AWS_DEFAULT_REGION, "eu-west-1"), (AWS_REGION, "us-east-2")]);
        assert_eq!(env.first_of(&[AWS_REGION, AWS_DEFAULT_REGION]), Some("us-east-2"));
    }

    #[test]
    fn test_flag() {
        let env = Env::from_slice(&[(AWS_EC2_METADATA_DISABLED, "TRUE")]);
        assert!(env.flag(AWS_EC2_METADATA_DISABLED));
        assert!(!Env::default().flag(AWS_EC2_METADATA_DISABLED));
    }

    #[test]
    #[serial]
    fn test_from_process_is_a_snapshot() {
        std::env::set_var("AWS_CREDENTIAL_RESOLVER_SNAPSHOT_TEST", "before");
        let env = Env::from_process();
        std::env::set_var("AWS_CREDENTIAL_RESOLVER_SNAPSHOT_TEST", "after");

        assert_eq!(env.get("AWS_CREDENTIAL_RESOLVER_SNAPSHOT_TEST"), Some("before"));
        std::env::remove_var("AWS_CREDENTIAL_RESOLVER_SNAPSHOT_TEST");
    }
}
