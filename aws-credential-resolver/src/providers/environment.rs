use crate::credentials::{CredentialSet, ProviderName};
use crate::env::{self, Env};
use crate::errors::{codes, CredentialError, Result};

/// Credentials from `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY` / `AWS_SESSION_TOKEN`.
///
/// `AWS_ACCESS_KEY` and `AWS_SECRET_KEY` are accepted as fallbacks. An access
/// key without a secret is a configuration error.
pub(crate) fn resolve(env: &Env) -> Result<Option<CredentialSet>> {
    let Some(access_key) = env.first_of(&[env::AWS_ACCESS_KEY_ID, env::AWS_ACCESS_KEY]) else {
        return Ok(None);
    };
    let secret_key = env
        .first_of(&[env::AWS_SECRET_ACCESS_KEY, env::AWS_SECRET_KEY])
        .ok_or_else(|| {
            CredentialError::configuration(
                codes::ENV_SECRET_KEY_NOT_FOUND,
                "AWS_ACCESS_KEY_ID is set but AWS_SECRET_ACCESS_KEY is not",
            )
        })?;
    Ok(Some(CredentialSet::new(
        access_key,
        secret_key,
        env.get(env::AWS_SESSION_TOKEN).map(ToString::to_string),
        ProviderName::Environment,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_available_without_access_key() {
        let env = Env::from_slice(&[(env::AWS_SECRET_ACCESS_KEY, "SECRET")]);
        assert!(resolve(&env).expect("no error").is_none());
    }

    #[test]
    fn test_reads_all_three_variables() {
        let env = Env::from_slice(&[
            (env::AWS_ACCESS_KEY_ID, "EnvAccessKey"),
            (env::AWS_SECRET_ACCESS_KEY, "EnvSecretKey"),
            (env::AWS_SESSION_TOKEN, "EnvSessionToken"),
        ]);
        let creds = resolve(&env).expect("no error").expect("available");
        assert_eq!(creds.access_key_id, "EnvAccessKey");
        assert_eq!(creds.secret_access_key, "EnvSecretKey");
        assert_eq!(creds.session_token.as_deref(), Some("EnvSessionToken"));
        assert_eq!(creds.provider_name, ProviderName::Environment);
    }

    #[test]
    fn test_legacy_names_are_accepted() {
        let env = Env::from_slice(&[(env::AWS_ACCESS_KEY, "Legacy"), (env::AWS_SECRET_KEY, "LegacySecret")]);
        let creds = resolve(&env).expect("no error").expect("available");
        assert_eq!(creds.access_key_id, "Legacy");
    }

    #[test]
    fn test_missing_secret_is_configuration_error() {
        let env = Env::from_slice(&[(env::AWS_ACCESS_KEY_ID, "EnvAccessKey")]);
        let error = resolve(&env).expect_err("secret missing");
        assert_eq!(error.code(), Some(codes::ENV_SECRET_KEY_NOT_FOUND));
    }
}
