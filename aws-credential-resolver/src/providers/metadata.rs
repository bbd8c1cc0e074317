use chrono::{DateTime, Utc};
use log::debug;
use serde::Deserialize;
use std::time::Duration;

use crate::config::MetadataOptions;
use crate::credentials::{CredentialSet, ProviderName};

/// Small HTTP client for the link-local credential services.
///
/// Failures are never surfaced as errors: after the configured attempts the
/// caller gets `None` and treats the provider as not available.
#[derive(Debug, Clone)]
pub(crate) struct MetadataClient {
    http: reqwest::Client,
    timeout: Duration,
    attempts: u32,
}

/// Credential document served by both IMDS and the ECS endpoint
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct MetadataCredentials {
    access_key_id: String,
    secret_access_key: String,
    token: Option<String>,
    expiration: Option<DateTime<Utc>>,
    code: Option<String>,
}

impl MetadataClient {
    pub(crate) fn new(options: &MetadataOptions) -> Self {
        Self {
            http: reqwest::Client::new(),
            timeout: options.timeout,
            attempts: options.attempts.max(1),
        }
    }

    pub(crate) async fn get(&self, url: &str, headers: &[(&str, &str)]) -> Option<String> {
        self.send(reqwest::Method::GET, url, headers).await
    }

    pub(crate) async fn put(&self, url: &str, headers: &[(&str, &str)]) -> Option<String> {
        self.send(reqwest::Method::PUT, url, headers).await
    }

    async fn send(&self, method: reqwest::Method, url: &str, headers: &[(&str, &str)]) -> Option<String> {
        for attempt in 1..=self.attempts {
            let mut request = self.http.request(method.clone(), url).timeout(self.timeout);
            for (name, value) in headers {
                request = request.header(*name, *value);
            }
            match request.send().await {
                Ok(response) if response.status().is_success() => match response.text().await {
                    Ok(body) => return Some(body),
                    Err(e) => debug!("{method} {url}: unreadable body on attempt {attempt}: {e}"),
                },
                Ok(response) => {
                    debug!("{method} {url}: status {} on attempt {attempt}", response.status());
                    // Client errors will not change on retry
                    if response.status().is_client_error() {
                        return None;
                    }
                }
                Err(e) => debug!("{method} {url}: request failed on attempt {attempt}: {e}"),
            }
        }
        None
    }
}

/// Parse a credential document; `None` when it is malformed or reports failure
pub(crate) fn parse_credentials(body: &str, provider: ProviderName) -> Option<CredentialSet> {
    let document: MetadataCredentials = match serde_json::from_str(body) {
        Ok(document) => document,
        Err(e) => {
            debug!("{provider}: malformed credential document: {e}");
            return None;
        }
    };
    if let Some(code) = document.code.as_deref().filter(|code| *code != "Success") {
        debug!("{provider}: credential document reports {code}");
        return None;
    }
    if document.access_key_id.is_empty() || document.secret_access_key.is_empty() {
        return None;
    }
    Some(
        CredentialSet::new(
            document.access_key_id,
            document.secret_access_key,
            document.token,
            provider,
        )
        .with_expiration(document.expiration),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_credentials_document() {
        let body = r#"{
            "Code": "Success",
            "LastUpdated": "2024-01-01T00:00:00Z",
            "Type": "AWS-HMAC",
            "AccessKeyId": "ASIAINSTANCE",
            "SecretAccessKey": "instance-secret",
            "Token": "instance-token",
            "Expiration": "2030-01-01T00:00:00Z"
        }"#;
        let creds = parse_credentials(body, ProviderName::Ec2InstanceMetadata).expect("valid document");
        assert_eq!(creds.access_key_id, "ASIAINSTANCE");
        assert_eq!(creds.session_token.as_deref(), Some("instance-token"));
        assert!(creds.expiration.is_some());
    }

    #[test]
    fn test_failed_or_malformed_documents_are_unavailable() {
        let failed = r#"{"Code": "Failure", "AccessKeyId": "A", "SecretAccessKey": "S"}"#;
        assert!(parse_credentials(failed, ProviderName::Ec2InstanceMetadata).is_none());
        assert!(parse_credentials("not json", ProviderName::EcsContainerMetadata).is_none());
    }
}
