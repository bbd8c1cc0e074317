use anyhow::{Context, Result};
use aws_credential_resolver::{CredentialError, Session};
use log::debug;
use serde::Serialize;
use std::io::{self, Write};

const REDACTED: &str = "** redacted **";

pub(crate) fn note(msg: &str) {
    let _ = writeln!(io::stderr(), "aws-credential-resolver: {msg}");
}

pub(crate) fn warn(msg: &str) {
    let _ = writeln!(io::stderr(), "aws-credential-resolver (warning): {msg}");
}

/// Print a resolution failure with the error code, when it has one
pub(crate) fn print_resolution_error(error: &CredentialError) {
    let stderr = io::stderr();
    let mut w = stderr.lock();
    match error.code() {
        Some(code) => {
            let _ = writeln!(w, "aws-credential-resolver: resolution failed [{code}]");
        }
        None => {
            let _ = writeln!(w, "aws-credential-resolver: resolution failed");
        }
    }
    let _ = writeln!(w, "  {error}");
    if error.is_no_valid_credential_sources() {
        let _ = writeln!(w);
        let _ = writeln!(
            w,
            "Set AWS_ACCESS_KEY_ID/AWS_SECRET_ACCESS_KEY, configure a profile in ~/.aws/credentials,"
        );
        let _ = writeln!(w, "or pass --access-key and --secret-key.");
    }
}

/// JSON document written to stdout
#[derive(Debug, Serialize)]
pub(crate) struct ResolveOutput {
    provider: String,
    access_key_id: String,
    secret_access_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expiration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    account_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    partition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    arn: Option<String>,
}

impl ResolveOutput {
    pub(crate) fn from_session(session: &Session, show_secrets: bool) -> Self {
        let credentials = &session.credentials;
        let secret = |value: &str| {
            if show_secrets {
                value.to_string()
            } else {
                REDACTED.to_string()
            }
        };
        Self {
            provider: credentials.provider_name.to_string(),
            access_key_id: credentials.access_key_id.clone(),
            secret_access_key: secret(&credentials.secret_access_key),
            session_token: credentials.session_token.as_deref().map(secret),
            expiration: credentials.expiration.map(|e| e.to_rfc3339()),
            region: session.region.clone(),
            account_id: session.identity.as_ref().map(|i| i.account_id.clone()),
            partition: session.identity.as_ref().map(|i| i.partition.clone()),
            arn: session.identity.as_ref().and_then(|i| i.arn.clone()),
        }
    }
}

/// Output the resolved session as JSON to stdout
pub(crate) fn output_session(session: &Session, pretty: bool, show_secrets: bool) -> Result<()> {
    debug!("Formatting session output as JSON (pretty: {pretty})");

    let document = ResolveOutput::from_session(session, show_secrets);
    let json_output = if pretty {
        serde_json::to_string_pretty(&document)
            .context("Failed to serialize session output to pretty JSON")?
    } else {
        serde_json::to_string(&document).context("Failed to serialize session output to JSON")?
    };

    print!("{json_output}");
    if pretty {
        println!();
    }

    debug!("Session output JSON written to stdout");
    Ok(())
}
