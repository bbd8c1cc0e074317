use async_trait::async_trait;
use aws_sdk_sts::config::http::HttpResponse;
use aws_sdk_sts::config::retry::RetryConfig;
use aws_sdk_sts::config::timeout::TimeoutConfig;
use aws_sdk_sts::config::{BehaviorVersion, Credentials as SdkCredentials, Region};
use aws_sdk_sts::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_sts::types::{PolicyDescriptorType, Tag};
use aws_sdk_sts::Client as StsClient;
use chrono::{DateTime, Utc};
use log::trace;
use std::time::Duration;

use crate::aws::{
    AssumeRoleRequest, BackendResult, CredentialBackend, IssuedCredentials, WebIdentityRequest,
};
use crate::config::DEFAULT_STS_REGION;
use crate::credentials::CredentialSet;
use crate::errors::BackendError;

/// Connection settings for [`StsBackend`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StsBackendConfig {
    /// Signing region
    pub region: String,
    /// Endpoint override, e.g. a VPC endpoint or a test server
    pub endpoint: Option<String>,
    /// Deadline for each call
    pub call_timeout: Duration,
}

impl Default for StsBackendConfig {
    fn default() -> Self {
        Self {
            region: DEFAULT_STS_REGION.to_string(),
            endpoint: None,
            call_timeout: Duration::from_secs(30),
        }
    }
}

/// [`CredentialBackend`] that talks to AWS STS through `aws-sdk-sts`.
///
/// A client is built per call so every request is signed with exactly the
/// credentials it was given. SDK retries are disabled; wrap in
/// [`crate::aws::retry::RetryingBackend`] for backoff.
pub struct StsBackend {
    config: StsBackendConfig,
}

impl StsBackend {
    /// New backend
    #[must_use]
    pub const fn new(config: StsBackendConfig) -> Self {
        Self { config }
    }

    fn client(&self, credentials: Option<&CredentialSet>) -> StsClient {
        let mut builder = aws_sdk_sts::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(self.config.region.clone()))
            .retry_config(RetryConfig::disabled())
            .timeout_config(
                TimeoutConfig::builder()
                    .operation_timeout(self.config.call_timeout)
                    .build(),
            );
        if let Some(endpoint) = &self.config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        if let Some(credentials) = credentials {
            builder = builder.credentials_provider(SdkCredentials::new(
                &credentials.access_key_id,
                &credentials.secret_access_key,
                credentials.session_token.clone(),
                None,
                "aws-credential-resolver",
            ));
        }
        StsClient::from_conf(builder.build())
    }
}

/// Map an SDK failure onto a classified [`BackendError`]
fn classify<E>(operation: &str, error: &SdkError<E, HttpResponse>) -> BackendError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    match error {
        SdkError::TimeoutError(_) => {
            BackendError::transport("RequestTimeout", format!("{operation} timed out"))
        }
        SdkError::DispatchFailure(failure) => BackendError::transport(
            "RequestError",
            format!("{operation} dispatch failed: {failure:?}"),
        ),
        SdkError::ResponseError(failure) => BackendError::transport(
            "ResponseError",
            format!("{operation} returned an unreadable response: {failure:?}"),
        ),
        SdkError::ServiceError(service) => {
            let status = service.raw().status().as_u16();
            let inner = service.err();
            BackendError::service(
                inner.code().unwrap_or("Unknown"),
                inner
                    .message()
                    .map_or_else(|| format!("{operation} failed"), ToString::to_string),
                Some(status),
            )
        }
        _ => BackendError::transport("ConstructionFailure", format!("{operation}: {error}")),
    }
}

fn expiration(value: &aws_sdk_sts::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(value.secs(), value.subsec_nanos())
}

fn issued(
    operation: &str,
    credentials: Option<&aws_sdk_sts::types::Credentials>,
) -> BackendResult<IssuedCredentials> {
    let credentials = credentials.ok_or_else(|| {
        BackendError::transport(
            "MissingCredentials",
            format!("{operation} response did not contain credentials"),
        )
    })?;
    Ok(IssuedCredentials {
        access_key_id: credentials.access_key_id().to_string(),
        secret_access_key: credentials.secret_access_key().to_string(),
        session_token: credentials.session_token().to_string(),
        expiration: expiration(credentials.expiration()),
    })
}

#[async_trait]
impl CredentialBackend for StsBackend {
    async fn assume_role(&self, request: &AssumeRoleRequest) -> BackendResult<IssuedCredentials> {
        trace!("STS AssumeRole {}", request.role_arn);
        let mut tags = Vec::with_capacity(request.tags.len());
        for (key, value) in &request.tags {
            let tag = Tag::builder().key(key).value(value).build().map_err(|e| {
                BackendError::transport("InvalidParameter", format!("session tag '{key}': {e}"))
            })?;
            tags.push(tag);
        }
        let policy_arns = request
            .policy_arns
            .iter()
            .map(|arn| PolicyDescriptorType::builder().arn(arn).build())
            .collect::<Vec<_>>();

        let out = self
            .client(Some(&request.credentials))
            .assume_role()
            .role_arn(&request.role_arn)
            .role_session_name(&request.session_name)
            .set_external_id(request.external_id.clone())
            .set_duration_seconds(request.duration_seconds)
            .set_policy(request.policy.clone())
            .set_policy_arns((!policy_arns.is_empty()).then_some(policy_arns))
            .set_tags((!tags.is_empty()).then_some(tags))
            .set_transitive_tag_keys(
                (!request.transitive_tag_keys.is_empty())
                    .then(|| request.transitive_tag_keys.clone()),
            )
            .send()
            .await
            .map_err(|e| classify("AssumeRole", &e))?;
        issued("AssumeRole", out.credentials())
    }

    async fn assume_role_with_web_identity(
        &self,
        request: &WebIdentityRequest,
    ) -> BackendResult<IssuedCredentials> {
        trace!("STS AssumeRoleWithWebIdentity {}", request.role_arn);
        let out = self
            .client(None)
            .assume_role_with_web_identity()
            .role_arn(&request.role_arn)
            .role_session_name(&request.session_name)
            .web_identity_token(&request.web_identity_token)
            .set_duration_seconds(request.duration_seconds)
            .send()
            .await
            .map_err(|e| classify("AssumeRoleWithWebIdentity", &e))?;
        issued("AssumeRoleWithWebIdentity", out.credentials())
    }

    async fn get_caller_identity(&self, credentials: &CredentialSet) -> BackendResult<String> {
        let out = self
            .client(Some(credentials))
            .get_caller_identity()
            .send()
            .await
            .map_err(|e| classify("GetCallerIdentity", &e))?;
        out.arn().map(ToString::to_string).ok_or_else(|| {
            BackendError::transport(
                "MissingArn",
                "STS GetCallerIdentity response did not contain an ARN",
            )
        })
    }
}
