use crate::config::Config;
use crate::credentials::{CredentialSet, ProviderName};

/// Keys given directly in the config; available only when both are non-empty
pub(crate) fn resolve(config: &Config) -> Option<CredentialSet> {
    let access_key = config.access_key.as_deref().filter(|k| !k.is_empty())?;
    let secret_key = config.secret_key.as_deref().filter(|k| !k.is_empty())?;
    Some(CredentialSet::new(
        access_key,
        secret_key,
        config.session_token.clone(),
        ProviderName::Static,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_both_keys_required() {
        assert!(resolve(&Config::default()).is_none());

        let only_access = Config {
            access_key: Some("AKID".to_string()),
            ..Config::default()
        };
        assert!(resolve(&only_access).is_none());

        let creds = resolve(&Config::default().with_static_credentials("AKID", "SECRET"))
            .expect("static keys available");
        assert_eq!(creds.access_key_id, "AKID");
        assert_eq!(creds.provider_name, ProviderName::Static);
        assert!(!creds.is_temporary());
    }

    #[test]
    fn test_session_token_is_carried() {
        let config = Config::default()
            .with_static_credentials("AKID", "SECRET")
            .with_session_token("TOKEN");
        let creds = resolve(&config).expect("static keys available");
        assert_eq!(creds.session_token.as_deref(), Some("TOKEN"));
    }
}
