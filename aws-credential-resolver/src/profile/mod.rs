//! Shared profile support: reading `~/.aws/credentials` and `~/.aws/config`
//! and resolving profiles, including `source_profile` role chains.

mod files;
mod resolver;

pub use files::{CredentialSource, ProfileFiles, ProfileSection, SharedFiles};
pub use resolver::{ProfileResolver, MAX_CHAIN_DEPTH};
