use log::debug;

use super::metadata::parse_credentials;
use super::ProviderContext;
use crate::config::DEFAULT_ECS_CREDENTIALS_ENDPOINT;
use crate::credentials::{CredentialSet, ProviderName};
use crate::env;

/// Credentials endpoint URL, relative URI first, then full URI
fn credentials_url(ctx: &ProviderContext<'_>) -> Option<String> {
    if let Some(relative) = ctx.env.get(env::AWS_CONTAINER_CREDENTIALS_RELATIVE_URI) {
        let host = ctx
            .config
            .metadata
            .ecs_endpoint
            .as_deref()
            .unwrap_or(DEFAULT_ECS_CREDENTIALS_ENDPOINT)
            .trim_end_matches('/');
        return Some(format!("{host}/{}", relative.trim_start_matches('/')));
    }
    ctx.env
        .get(env::AWS_CONTAINER_CREDENTIALS_FULL_URI)
        .map(ToString::to_string)
}

/// ECS task role credentials; not available outside a container
pub(crate) async fn resolve(ctx: &ProviderContext<'_>) -> Option<CredentialSet> {
    let url = credentials_url(ctx)?;
    debug!("Requesting container credentials from {url}");

    let headers: Vec<(&str, &str)> = ctx
        .env
        .get(env::AWS_CONTAINER_AUTHORIZATION_TOKEN)
        .map(|token| vec![("authorization", token)])
        .unwrap_or_default();

    let document = ctx.metadata.get(&url, &headers).await?;
    parse_credentials(&document, ProviderName::EcsContainerMetadata)
}
