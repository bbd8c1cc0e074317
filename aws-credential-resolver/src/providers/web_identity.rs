use std::path::Path;

use super::ProviderContext;
use crate::assume_role::AssumeRoleEngine;
use crate::credentials::CredentialSet;
use crate::env;
use crate::errors::{codes, CredentialError, Result};

/// Read and trim an OIDC token file
pub(crate) async fn read_token(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        CredentialError::configuration_with_source(
            codes::WEB_IDENTITY_TOKEN_FILE,
            format!("unable to read web identity token file '{}'", path.display()),
            e,
        )
    })?;
    let token = String::from_utf8(bytes).map_err(|e| {
        CredentialError::configuration_with_source(
            codes::WEB_IDENTITY_TOKEN_FILE,
            format!("web identity token file '{}' is not UTF-8", path.display()),
            e,
        )
    })?;
    Ok(token.trim().to_string())
}

/// Web identity federation from [`crate::config::WebIdentityConfig`] or the environment.
///
/// Available only when a role ARN, a session name and a token file are all known.
pub(crate) async fn resolve(ctx: &ProviderContext<'_>) -> Result<Option<CredentialSet>> {
    let explicit = ctx.config.web_identity.as_ref();

    let role_arn = explicit
        .and_then(|w| w.role_arn.as_deref())
        .filter(|arn| !arn.is_empty())
        .or_else(|| ctx.env.get(env::AWS_ROLE_ARN));
    let session_name = explicit
        .and_then(|w| w.session_name.as_deref())
        .filter(|name| !name.is_empty())
        .or_else(|| ctx.env.get(env::AWS_ROLE_SESSION_NAME));
    let token_file = explicit
        .and_then(|w| w.token_file.as_deref())
        .or_else(|| ctx.env.get(env::AWS_WEB_IDENTITY_TOKEN_FILE).map(Path::new));

    let (Some(role_arn), Some(session_name), Some(token_file)) = (role_arn, session_name, token_file)
    else {
        return Ok(None);
    };

    let token = read_token(token_file).await?;
    AssumeRoleEngine::new(ctx.backend)
        .assume_with_web_identity(role_arn, session_name, token, None)
        .await
        .map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, WebIdentityConfig};
    use crate::credentials::ProviderName;
    use crate::env::Env;
    use crate::testing::FakeBackend;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const ROLE: &str = "arn:aws:iam::555555555555:role/WebIdentityToken";

    fn token_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(contents.as_bytes()).expect("write token");
        file
    }

    #[tokio::test]
    async fn test_from_environment() {
        let file = token_file("oidc-token\n");
        let path = file.path().to_string_lossy().to_string();
        let env = Env::from_slice(&[
            (env::AWS_ROLE_ARN, ROLE),
            (env::AWS_ROLE_SESSION_NAME, "WebIdentityTokenSessionName"),
            (env::AWS_WEB_IDENTITY_TOKEN_FILE, path.as_str()),
        ]);
        let config = Config::default();
        let backend = FakeBackend::new();
        let ctx = ProviderContext::new(&config, &env, &backend);

        let creds = resolve(&ctx).await.expect("no error").expect("available");
        assert_eq!(creds.provider_name, ProviderName::WebIdentity);

        let requests = backend.web_identity_requests();
        assert_eq!(requests[0].web_identity_token, "oidc-token");
        assert_eq!(requests[0].session_name, "WebIdentityTokenSessionName");
    }

    #[tokio::test]
    async fn test_config_overrides_environment() {
        let file = token_file("config-token");
        let env = Env::from_slice(&[
            (env::AWS_ROLE_ARN, "arn:aws:iam::555555555555:role/FromEnv"),
            (env::AWS_ROLE_SESSION_NAME, "EnvSession"),
        ]);
        let config = Config {
            web_identity: Some(WebIdentityConfig {
                role_arn: Some(ROLE.to_string()),
                session_name: None,
                token_file: Some(file.path().to_path_buf()),
            }),
            ..Config::default()
        };
        let backend = FakeBackend::new();
        let ctx = ProviderContext::new(&config, &env, &backend);

        resolve(&ctx).await.expect("no error").expect("available");
        let request = &backend.web_identity_requests()[0];
        assert_eq!(request.role_arn, ROLE);
        assert_eq!(request.session_name, "EnvSession");
    }

    #[tokio::test]
    async fn test_incomplete_settings_are_unavailable() {
        let env = Env::from_slice(&[(env::AWS_ROLE_ARN, ROLE)]);
        let config = Config::default();
        let backend = FakeBackend::new();
        let ctx = ProviderContext::new(&config, &env, &backend);

        assert!(resolve(&ctx).await.expect("no error").is_none());
    }

    #[tokio::test]
    async fn test_unreadable_token_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let missing = dir.path().join("missing-token");
        let missing = missing.to_string_lossy().to_string();
        let env = Env::from_slice(&[
            (env::AWS_ROLE_ARN, ROLE),
            (env::AWS_ROLE_SESSION_NAME, "s"),
            (env::AWS_WEB_IDENTITY_TOKEN_FILE, missing.as_str()),
        ]);
        let config = Config::default();
        let backend = FakeBackend::new();
        let ctx = ProviderContext::new(&config, &env, &backend);

        let error = resolve(&ctx).await.expect_err("unreadable token");
        assert_eq!(error.code(), Some(codes::WEB_IDENTITY_TOKEN_FILE));
    }
}
