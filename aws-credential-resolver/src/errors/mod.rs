//! Error handling module

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for operations that can fail with `CredentialError`
pub type Result<T> = std::result::Result<T, CredentialError>;

/// Stable codes carried by [`CredentialError::Configuration`].
pub mod codes {
    /// A profile chains to a source profile or credential source but has no `role_arn`
    pub const CREDENTIAL_REQUIRES_ARN: &str = "CredentialRequiresARNError";
    /// An explicitly requested profile does not exist in either shared file
    pub const PROFILE_NOT_FOUND: &str = "SharedConfigProfileNotExistsError";
    /// A `source_profile` chain revisits a profile
    pub const SOURCE_PROFILE_LOOP: &str = "SourceProfileLoopError";
    /// A `source_profile` chain is longer than the supported depth
    pub const SOURCE_PROFILE_DEPTH: &str = "SourceProfileDepthExceeded";
    /// `credential_source` names an unsupported provider
    pub const INVALID_CREDENTIAL_SOURCE: &str = "InvalidCredentialSource";
    /// `credential_source` names a provider that produced no credentials
    pub const CREDENTIAL_SOURCE_UNAVAILABLE: &str = "CredentialSourceUnavailable";
    /// A profile sets direct keys and also a `source_profile` or `credential_source`
    pub const CONFLICTING_PROFILE_CREDENTIALS: &str = "ConflictingProfileCredentials";
    /// Role assumption was requested without a session name
    pub const SESSION_NAME_REQUIRED: &str = "AssumeRoleSessionNameRequired";
    /// Role assumption was requested without a role ARN
    pub const ROLE_ARN_REQUIRED: &str = "AssumeRoleArnRequired";
    /// Assume-role duration outside the range STS accepts
    pub const INVALID_DURATION: &str = "InvalidAssumeRoleDuration";
    /// Access key found in the environment without a secret key
    pub const ENV_SECRET_KEY_NOT_FOUND: &str = "EnvSecretKeyNotFound";
    /// The web identity token file could not be read
    pub const WEB_IDENTITY_TOKEN_FILE: &str = "WebIdentityTokenFileError";
    /// A shared credentials or config file exists but is not valid INI
    pub const SHARED_FILE_PARSE: &str = "SharedFileParseError";
    /// A profile sets `role_arn` without `source_profile`, `credential_source` or a token file
    pub const ROLE_REQUIRES_SOURCE: &str = "SharedConfigAssumeRoleError";
    /// A `source_profile` exists but yields no credentials
    pub const SOURCE_PROFILE_NO_CREDENTIALS: &str = "SourceProfileNoCredentials";
    /// A profile sets both `source_profile` and `credential_source`
    pub const CONFLICTING_ROLE_SOURCES: &str = "ConflictingSourceProfileAndCredentialSource";
    /// GetCallerIdentity answered with an ARN that could not be parsed
    pub const INVALID_CALLER_ARN: &str = "InvalidCallerArn";
}

/// Error taxonomy of the credential resolution engine.
///
/// Each variant names the stage that failed, so callers can match on the
/// variant (and on [`CredentialError::code`]) without parsing messages.
#[derive(Error, Debug)]
pub enum CredentialError {
    /// Every source in the precedence chain reported "not available"
    #[error("no valid credential sources found: {message}")]
    NoValidCredentialSources {
        /// Which sources were consulted
        message: String,
    },

    /// Malformed profile, missing role fields or a cyclic chain. Never retried.
    #[error("configuration error ({code}): {message}")]
    Configuration {
        /// Stable error code, see [`codes`]
        code: &'static str,
        /// Detailed error message
        message: String,
        /// Optional underlying error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// STS refused the role assumption, or transient failures exhausted the retries
    #[error("cannot assume role '{role_arn}' ({code}): {message}")]
    CannotAssumeRole {
        /// Role that was being assumed
        role_arn: String,
        /// Backend error code, e.g. `InvalidClientTokenId`
        code: String,
        /// Backend error message
        message: String,
    },

    /// GetCallerIdentity failed against the resolved credentials
    #[error("error validating provider credentials ({code}): {message}")]
    IdentityValidation {
        /// Backend error code, verbatim (e.g. `AccessDenied`)
        code: String,
        /// Backend error message
        message: String,
    },

    /// A shared profile file could not be read
    #[error("File system error during {operation} on path '{path}': {source}")]
    FileSystem {
        /// The operation that failed
        operation: String,
        /// The file path involved in the operation
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl CredentialError {
    /// Create a no-valid-sources error
    pub(crate) fn no_valid_sources(message: impl Into<String>) -> Self {
        Self::NoValidCredentialSources {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub(crate) fn configuration(code: &'static str, message: impl Into<String>) -> Self {
        Self::Configuration {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Create a configuration error with source
    pub(crate) fn configuration_with_source(
        code: &'static str,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Configuration {
            code,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a cannot-assume-role error from a terminal backend failure
    pub(crate) fn cannot_assume_role(role_arn: impl Into<String>, error: &BackendError) -> Self {
        Self::CannotAssumeRole {
            role_arn: role_arn.into(),
            code: error.code.clone(),
            message: error.message.clone(),
        }
    }

    /// Create an identity validation error from a terminal backend failure
    pub(crate) fn identity_validation(error: &BackendError) -> Self {
        Self::IdentityValidation {
            code: error.code.clone(),
            message: error.message.clone(),
        }
    }

    /// Create a file system error with operation context
    pub(crate) fn file_system(
        operation: impl Into<String>,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::FileSystem {
            operation: operation.into(),
            path: path.into(),
            source,
        }
    }

    /// Error code for pattern matching: the configuration code or the backend code
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Configuration { code, .. } => Some(*code),
            Self::CannotAssumeRole { code, .. } | Self::IdentityValidation { code, .. } => {
                Some(code.as_str())
            }
            Self::NoValidCredentialSources { .. } | Self::FileSystem { .. } => None,
        }
    }

    /// True when the precedence chain was exhausted
    #[must_use]
    pub const fn is_no_valid_credential_sources(&self) -> bool {
        matches!(self, Self::NoValidCredentialSources { .. })
    }

    /// True when STS refused a role assumption
    #[must_use]
    pub const fn is_cannot_assume_role(&self) -> bool {
        matches!(self, Self::CannotAssumeRole { .. })
    }

    /// True for configuration errors
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }
}

/// Whether a backend failure came from the service or from the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendErrorKind {
    /// The service answered with an error document
    Service,
    /// No usable response: connect failure, timeout, malformed body
    Transport,
}

/// Structured error returned by a [`crate::aws::CredentialBackend`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct BackendError {
    /// Service or transport failure
    pub kind: BackendErrorKind,
    /// Backend-defined code, e.g. `Throttling` or `AccessDenied`
    pub code: String,
    /// Human readable message
    pub message: String,
    /// HTTP status, when a response was received
    pub status: Option<u16>,
}

/// Service error codes that indicate throttling or a transient server fault
const TRANSIENT_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "ThrottledException",
    "RequestThrottledException",
    "TooManyRequestsException",
    "RequestLimitExceeded",
    "RequestThrottled",
    "SlowDown",
    "PriorRequestNotComplete",
    "IDPCommunicationError",
    "InternalError",
    "InternalFailure",
    "ServiceUnavailable",
    "RequestTimeout",
    "RequestTimeoutException",
];

impl BackendError {
    /// Create a service error
    pub fn service(code: impl Into<String>, message: impl Into<String>, status: Option<u16>) -> Self {
        Self {
            kind: BackendErrorKind::Service,
            code: code.into(),
            message: message.into(),
            status,
        }
    }

    /// Create a transport error
    pub fn transport(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: BackendErrorKind::Transport,
            code: code.into(),
            message: message.into(),
            status: None,
        }
    }

    /// Transient failures are retried; authorization and validation failures are not.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        if self.kind == BackendErrorKind::Transport {
            return true;
        }
        if self.status.is_some_and(|status| status >= 500 || status == 429) {
            return true;
        }
        TRANSIENT_CODES.contains(&self.code.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_creation() {
        let error = CredentialError::configuration(
            codes::CREDENTIAL_REQUIRES_ARN,
            "profile 'dev' has source_profile but no role_arn",
        );

        assert!(error.is_configuration());
        assert_eq!(error.code(), Some("CredentialRequiresARNError"));
        assert!(error.to_string().contains("profile 'dev'"));
    }

    #[test]
    fn test_backend_codes_are_preserved() {
        let backend = BackendError::service("AccessDenied", "not authorized", Some(403));
        let error = CredentialError::identity_validation(&backend);
        assert_eq!(error.code(), Some("AccessDenied"));

        let error = CredentialError::cannot_assume_role("arn:aws:iam::1:role/r", &backend);
        assert!(error.is_cannot_assume_role());
        assert_eq!(error.code(), Some("AccessDenied"));
    }

    #[test]
    fn test_transient_classification() {
        assert!(BackendError::service("Throttling", "rate exceeded", Some(400)).is_transient());
        assert!(BackendError::service("Unknown", "boom", Some(503)).is_transient());
        assert!(BackendError::transport("RequestTimeout", "deadline elapsed").is_transient());
        assert!(!BackendError::service("InvalidClientTokenId", "bad token", Some(403))
            .is_transient());
        assert!(!BackendError::service("AccessDenied", "denied", Some(403)).is_transient());
    }

    #[test]
    fn test_file_system_error_creation() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let error = CredentialError::file_system("read", "/path/to/credentials", io_error);

        assert!(matches!(error, CredentialError::FileSystem { .. }));
        assert!(error.to_string().contains("/path/to/credentials"));
        assert_eq!(error.code(), None);
    }
}
