//! Scripted backend and fake clock for tests.
//!
//! Compiled for this crate's tests and for dependents that enable the
//! `test-util` feature.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use crate::aws::retry::AsyncSleep;
use crate::aws::{
    AssumeRoleRequest, BackendResult, CredentialBackend, IssuedCredentials, WebIdentityRequest,
};
use crate::credentials::CredentialSet;

/// Account used by the default caller identity answer
pub const FAKE_ACCOUNT_ID: &str = "222222222222";

/// Caller ARN returned when no identity answer is scripted
pub const FAKE_CALLER_ARN: &str = "arn:aws:iam::222222222222:user/Alice";

#[derive(Default)]
struct Script {
    assume_role: VecDeque<BackendResult<IssuedCredentials>>,
    web_identity: VecDeque<BackendResult<IssuedCredentials>>,
    identity: VecDeque<BackendResult<String>>,
    assume_role_requests: Vec<AssumeRoleRequest>,
    web_identity_requests: Vec<WebIdentityRequest>,
    identity_requests: Vec<CredentialSet>,
}

/// In-memory [`CredentialBackend`] with scripted answers.
///
/// When a queue is empty the backend answers successfully: assumed
/// credentials are derived from the request, so different base credentials
/// yield different session tokens.
#[derive(Default)]
pub struct FakeBackend {
    script: Mutex<Script>,
}

impl FakeBackend {
    /// Backend with empty scripts
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_script<R>(&self, f: impl FnOnce(&mut Script) -> R) -> R {
        let mut guard = match self.script.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    /// Queue an AssumeRole answer
    pub fn push_assume_role(&self, result: BackendResult<IssuedCredentials>) {
        self.with_script(|s| s.assume_role.push_back(result));
    }

    /// Queue an AssumeRoleWithWebIdentity answer
    pub fn push_web_identity(&self, result: BackendResult<IssuedCredentials>) {
        self.with_script(|s| s.web_identity.push_back(result));
    }

    /// Queue a GetCallerIdentity answer
    pub fn push_identity(&self, result: BackendResult<String>) {
        self.with_script(|s| s.identity.push_back(result));
    }

    /// AssumeRole requests received so far
    #[must_use]
    pub fn assume_role_requests(&self) -> Vec<AssumeRoleRequest> {
        self.with_script(|s| s.assume_role_requests.clone())
    }

    /// AssumeRoleWithWebIdentity requests received so far
    #[must_use]
    pub fn web_identity_requests(&self) -> Vec<WebIdentityRequest> {
        self.with_script(|s| s.web_identity_requests.clone())
    }

    /// Number of AssumeRole calls
    #[must_use]
    pub fn assume_role_calls(&self) -> usize {
        self.with_script(|s| s.assume_role_requests.len())
    }

    /// Number of GetCallerIdentity calls
    #[must_use]
    pub fn identity_calls(&self) -> usize {
        self.with_script(|s| s.identity_requests.len())
    }

    /// Credentials GetCallerIdentity was called with
    #[must_use]
    pub fn identity_requests(&self) -> Vec<CredentialSet> {
        self.with_script(|s| s.identity_requests.clone())
    }
}

/// Credentials the fake issues for `role_arn` when signed by `base_key`
#[must_use]
pub fn derived_credentials(base_key: &str, role_arn: &str) -> IssuedCredentials {
    let role_name = role_arn.rsplit('/').next().unwrap_or(role_arn);
    IssuedCredentials {
        access_key_id: format!("ASIA-{role_name}"),
        secret_access_key: format!("secret-{role_name}"),
        session_token: format!("token-{base_key}-{role_name}"),
        expiration: None,
    }
}

#[async_trait]
impl CredentialBackend for FakeBackend {
    async fn assume_role(&self, request: &AssumeRoleRequest) -> BackendResult<IssuedCredentials> {
        self.with_script(|s| {
            s.assume_role_requests.push(request.clone());
            s.assume_role.pop_front().unwrap_or_else(|| {
                Ok(derived_credentials(
                    &request.credentials.access_key_id,
                    &request.role_arn,
                ))
            })
        })
    }

    async fn assume_role_with_web_identity(
        &self,
        request: &WebIdentityRequest,
    ) -> BackendResult<IssuedCredentials> {
        self.with_script(|s| {
            s.web_identity_requests.push(request.clone());
            s.web_identity.pop_front().unwrap_or_else(|| {
                Ok(derived_credentials(
                    &request.web_identity_token,
                    &request.role_arn,
                ))
            })
        })
    }

    async fn get_caller_identity(&self, credentials: &CredentialSet) -> BackendResult<String> {
        self.with_script(|s| {
            s.identity_requests.push(credentials.clone());
            s.identity
                .pop_front()
                .unwrap_or_else(|| Ok(FAKE_CALLER_ARN.to_string()))
        })
    }
}

/// [`AsyncSleep`] that returns immediately and records requested delays
#[derive(Default)]
pub struct RecordingSleep {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleep {
    /// Delays requested so far
    #[must_use]
    pub fn recorded(&self) -> Vec<Duration> {
        match self.delays.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl AsyncSleep for RecordingSleep {
    async fn sleep(&self, duration: Duration) {
        match self.delays.lock() {
            Ok(mut guard) => guard.push(duration),
            Err(poisoned) => poisoned.into_inner().push(duration),
        }
    }
}
