use async_trait::async_trait;
use log::{debug, warn};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::aws::{
    AssumeRoleRequest, BackendResult, CredentialBackend, IssuedCredentials, WebIdentityRequest,
};
use crate::config::RetryPolicy;
use crate::credentials::CredentialSet;

/// Sleep abstraction so backoff can run against a fake clock in tests
#[async_trait]
pub trait AsyncSleep: Send + Sync {
    /// Wait for `duration`
    async fn sleep(&self, duration: Duration);
}

/// Tokio timer sleep
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleep;

#[async_trait]
impl AsyncSleep for TokioSleep {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Decorates a [`CredentialBackend`] with exponential-backoff retries.
///
/// Only errors for which [`crate::errors::BackendError::is_transient`] holds
/// are retried. The last error is returned unchanged once `max_attempts` is
/// reached.
pub struct RetryingBackend {
    inner: Arc<dyn CredentialBackend>,
    policy: RetryPolicy,
    sleep: Arc<dyn AsyncSleep>,
}

impl RetryingBackend {
    /// Wrap `inner`
    pub fn new(
        inner: Arc<dyn CredentialBackend>,
        policy: RetryPolicy,
        sleep: Arc<dyn AsyncSleep>,
    ) -> Self {
        Self {
            inner,
            policy,
            sleep,
        }
    }

    async fn call<T, F, Fut>(&self, operation: &str, mut attempt_fn: F) -> BackendResult<T>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = BackendResult<T>> + Send,
        T: Send,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match attempt_fn().await {
                Ok(value) => return Ok(value),
                Err(error) if error.is_transient() && attempt < max_attempts => {
                    let delay = self.policy.backoff(attempt);
                    debug!(
                        "{} failed with transient error {} (attempt {}/{}), retrying in {:?}",
                        operation, error.code, attempt, max_attempts, delay
                    );
                    self.sleep.sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => {
                    if error.is_transient() {
                        warn!(
                            "{} still failing after {} attempts: {}",
                            operation, attempt, error
                        );
                    }
                    return Err(error);
                }
            }
        }
    }
}

#[async_trait]
impl CredentialBackend for RetryingBackend {
    async fn assume_role(&self, request: &AssumeRoleRequest) -> BackendResult<IssuedCredentials> {
        self.call("AssumeRole", || self.inner.assume_role(request))
            .await
    }

    async fn assume_role_with_web_identity(
        &self,
        request: &WebIdentityRequest,
    ) -> BackendResult<IssuedCredentials> {
        self.call("AssumeRoleWithWebIdentity", || {
            self.inner.assume_role_with_web_identity(request)
        })
        .await
    }

    async fn get_caller_identity(&self, credentials: &CredentialSet) -> BackendResult<String> {
        self.call("GetCallerIdentity", || {
            self.inner.get_caller_identity(credentials)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::ProviderName;
    use crate::errors::BackendError;
    use crate::testing::{FakeBackend, RecordingSleep};

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
            call_timeout: Duration::from_secs(1),
        }
    }

    fn creds() -> CredentialSet {
        CredentialSet::new("AKID", "SECRET", None, ProviderName::Static)
    }

    #[tokio::test]
    async fn test_throttling_is_retried_until_success() {
        let fake = Arc::new(FakeBackend::new());
        fake.push_identity(Err(BackendError::service("Throttling", "slow down", Some(400))));
        fake.push_identity(Err(BackendError::service("Throttling", "slow down", Some(400))));
        fake.push_identity(Ok("arn:aws:iam::222222222222:user/Alice".to_string()));
        let sleep = Arc::new(RecordingSleep::default());

        let backend = RetryingBackend::new(fake.clone(), policy(5), sleep.clone());
        let arn = backend.get_caller_identity(&creds()).await.expect("third attempt succeeds");

        assert_eq!(arn, "arn:aws:iam::222222222222:user/Alice");
        assert_eq!(fake.identity_calls(), 3);
        assert_eq!(
            sleep.recorded(),
            vec![Duration::from_millis(100), Duration::from_millis(200)]
        );
    }

    #[tokio::test]
    async fn test_retries_stop_at_ceiling() {
        let fake = Arc::new(FakeBackend::new());
        for _ in 0..10 {
            fake.push_identity(Err(BackendError::service("ServiceUnavailable", "down", Some(503))));
        }
        let sleep = Arc::new(RecordingSleep::default());

        let backend = RetryingBackend::new(fake.clone(), policy(3), sleep.clone());
        let error = backend
            .get_caller_identity(&creds())
            .await
            .expect_err("retries exhausted");

        assert_eq!(error.code, "ServiceUnavailable");
        assert_eq!(fake.identity_calls(), 3);
        assert_eq!(sleep.recorded().len(), 2);
    }

    #[tokio::test]
    async fn test_authorization_errors_are_not_retried() {
        let fake = Arc::new(FakeBackend::new());
        fake.push_identity(Err(BackendError::service("AccessDenied", "no", Some(403))));
        let sleep = Arc::new(RecordingSleep::default());

        let backend = RetryingBackend::new(fake.clone(), policy(5), sleep.clone());
        let error = backend
            .get_caller_identity(&creds())
            .await
            .expect_err("terminal");

        assert_eq!(error.code, "AccessDenied");
        assert_eq!(fake.identity_calls(), 1);
        assert!(sleep.recorded().is_empty());
    }
}
