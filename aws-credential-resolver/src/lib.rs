//! This crate resolves the AWS credentials a tool should use:
//! - Precedence-ordered lookup across static keys, environment variables,
//!   shared profiles, web identity and the EC2/ECS metadata services
//! - Role assumption, including `source_profile` chains
//! - Caller identity validation, account and partition lookup
//! - SDK configuration for building AWS clients from the result
//!

pub mod assume_role;
pub mod aws;
mod config;
mod credentials;
mod env;
mod errors;
pub mod identity;
pub mod profile;
pub mod providers;
pub mod resolver;
mod session;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

// Re-exports for a small, focused public API
pub use assume_role::{AssumeRoleEngine, AssumeRoleParams};
pub use aws::retry::{AsyncSleep, RetryingBackend, TokioSleep};
pub use aws::sts::{StsBackend, StsBackendConfig};
pub use aws::{
    AssumeRoleRequest, BackendResult, CredentialBackend, IssuedCredentials, WebIdentityRequest,
};
pub use config::{
    AssumeRoleConfig, Config, MetadataOptions, RetryPolicy, WebIdentityConfig,
    DEFAULT_EC2_METADATA_ENDPOINT, DEFAULT_ECS_CREDENTIALS_ENDPOINT, DEFAULT_STS_REGION,
};
pub use credentials::{Arn, CredentialSet, ProviderName, ResolvedIdentity};
pub use env::Env;
pub use errors::{codes, BackendError, BackendErrorKind, CredentialError, Result};
pub use identity::{partition_for_region, IdentityValidator};
pub use profile::{CredentialSource, ProfileResolver, ProfileSection, SharedFiles};
pub use providers::{ProviderContext, SourceProvider, PRECEDENCE};
pub use resolver::{resolve_region, PrecedenceResolver};
pub use session::{resolve, resolve_with_identity, Session, SessionAssembler};
