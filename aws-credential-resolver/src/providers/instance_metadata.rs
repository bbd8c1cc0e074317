//! EC2 instance metadata (IMDS) role credentials.
//!
//! A session token is requested first (IMDSv2); when that fails the requests
//! are sent without one.

use log::debug;

use super::metadata::parse_credentials;
use super::ProviderContext;
use crate::config::DEFAULT_EC2_METADATA_ENDPOINT;
use crate::credentials::{CredentialSet, ProviderName};
use crate::env;

const TOKEN_PATH: &str = "/latest/api/token";
const CREDENTIALS_PATH: &str = "/latest/meta-data/iam/security-credentials/";
const TOKEN_TTL_HEADER: &str = "x-aws-ec2-metadata-token-ttl-seconds";
const TOKEN_HEADER: &str = "x-aws-ec2-metadata-token";
const TOKEN_TTL_SECONDS: &str = "21600";

fn endpoint(ctx: &ProviderContext<'_>) -> String {
    ctx.config
        .metadata
        .ec2_endpoint
        .as_deref()
        .or_else(|| ctx.env.get(env::AWS_EC2_METADATA_SERVICE_ENDPOINT))
        .unwrap_or(DEFAULT_EC2_METADATA_ENDPOINT)
        .trim_end_matches('/')
        .to_string()
}

pub(crate) async fn resolve(ctx: &ProviderContext<'_>) -> Option<CredentialSet> {
    if ctx.ec2_metadata_disabled() {
        return None;
    }
    let base = endpoint(ctx);
    let client = &ctx.metadata;

    let token = client
        .put(&format!("{base}{TOKEN_PATH}"), &[(TOKEN_TTL_HEADER, TOKEN_TTL_SECONDS)])
        .await;
    if token.is_none() {
        debug!("IMDS session token unavailable, falling back to IMDSv1");
    }
    let headers: Vec<(&str, &str)> = token
        .as_deref()
        .map(|token| vec![(TOKEN_HEADER, token)])
        .unwrap_or_default();

    let roles = client.get(&format!("{base}{CREDENTIALS_PATH}"), &headers).await?;
    let role = roles.lines().map(str::trim).find(|line| !line.is_empty())?;
    debug!("IMDS instance profile role: {role}");

    let document = client
        .get(&format!("{base}{CREDENTIALS_PATH}{role}"), &headers)
        .await?;
    parse_credentials(&document, ProviderName::Ec2InstanceMetadata)
}
