use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use aws_credential_resolver::{AssumeRoleConfig, Config, CredentialError, SessionAssembler};
use clap::{ArgAction, Args, Parser, Subcommand};
use log::{debug, LevelFilter};

mod output;

#[derive(Debug, Parser)]
#[command(
    name = "aws-credential-resolver",
    version,
    about = "Resolve, validate and print the AWS credentials a tool would use",
    long_about = None
)]
struct Cli {
    #[arg(short = 'v', long, global = true, action = ArgAction::Count, help = "Increase verbosity (-v info, -vv debug, -vvv trace)")]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Resolve credentials and print them as JSON")]
    Resolve(ResolveArgs),
}

#[derive(Debug, Clone, Default, Args)]
struct ResolveArgs {
    #[arg(long, help = "JSON file with a resolver configuration; flags override its values")]
    config: Option<PathBuf>,

    #[arg(short = 'p', long, help = "Shared profile name")]
    profile: Option<String>,

    #[arg(short = 'r', long, help = "AWS region")]
    region: Option<String>,

    #[arg(long, help = "Static access key ID")]
    access_key: Option<String>,

    #[arg(long, help = "Static secret access key")]
    secret_key: Option<String>,

    #[arg(long, help = "Static session token")]
    session_token: Option<String>,

    #[arg(long, help = "Shared credentials file")]
    credentials_file: Option<PathBuf>,

    #[arg(long, help = "Shared config file")]
    config_file: Option<PathBuf>,

    #[arg(long, help = "Role to assume after resolving base credentials")]
    assume_role_arn: Option<String>,

    #[arg(long, requires = "assume_role_arn", help = "Session name for --assume-role-arn")]
    session_name: Option<String>,

    #[arg(long, requires = "assume_role_arn", help = "External ID for --assume-role-arn")]
    external_id: Option<String>,

    #[arg(long, requires = "assume_role_arn", help = "Session duration in seconds for --assume-role-arn")]
    duration_seconds: Option<i32>,

    #[arg(long, help = "Skip the GetCallerIdentity validation")]
    skip_credentials_validation: bool,

    #[arg(long, help = "Never consult the EC2 instance metadata service")]
    skip_metadata_api_check: bool,

    #[arg(long, help = "Do not look up the account ID")]
    skip_requesting_account_id: bool,

    #[arg(long, help = "STS endpoint override")]
    sts_endpoint: Option<String>,

    #[arg(long, help = "Total attempts for each STS call")]
    max_retries: Option<u32>,

    #[arg(long, help = "Pretty-print the JSON output")]
    pretty: bool,

    #[arg(long, help = "Print the secret access key and session token instead of redacting them")]
    show_secrets: bool,
}

impl ResolveArgs {
    /// Configuration file first, then the flags on top
    fn to_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => {
                let contents = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file {}", path.display()))?;
                serde_json::from_str(&contents)
                    .with_context(|| format!("Failed to parse config file {}", path.display()))?
            }
            None => Config::default(),
        };

        if let Some(profile) = &self.profile {
            config.profile = Some(profile.clone());
        }
        if let Some(region) = &self.region {
            config.region = Some(region.clone());
        }
        if let Some(access_key) = &self.access_key {
            config.access_key = Some(access_key.clone());
        }
        if let Some(secret_key) = &self.secret_key {
            config.secret_key = Some(secret_key.clone());
        }
        if let Some(session_token) = &self.session_token {
            config.session_token = Some(session_token.clone());
        }
        if let Some(path) = &self.credentials_file {
            config.credentials_file = Some(path.clone());
        }
        if let Some(path) = &self.config_file {
            config.config_file = Some(path.clone());
        }
        if let Some(role_arn) = &self.assume_role_arn {
            let mut assume_role = AssumeRoleConfig::new(
                role_arn.clone(),
                self.session_name
                    .clone()
                    .unwrap_or_else(|| "aws-credential-resolver".to_string()),
            );
            assume_role.external_id.clone_from(&self.external_id);
            assume_role.duration_seconds = self.duration_seconds;
            config.assume_role = Some(assume_role);
        }
        if let Some(endpoint) = &self.sts_endpoint {
            config.sts_endpoint = Some(endpoint.clone());
        }
        if let Some(max_retries) = self.max_retries {
            config.retry.max_attempts = max_retries;
        }
        config.skip_credentials_validation |= self.skip_credentials_validation;
        config.skip_metadata_api_check |= self.skip_metadata_api_check;
        config.skip_requesting_account_id |= self.skip_requesting_account_id;
        Ok(config)
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level.as_str()))
        .target(env_logger::Target::Stderr)
        .init();
}

async fn run_resolve(args: &ResolveArgs) -> Result<Option<CredentialError>> {
    let config = args.to_config()?;
    if config.access_key.is_some() != config.secret_key.is_some() {
        output::warn("only one of --access-key and --secret-key was given; static keys are ignored");
    }
    debug!("Resolving with profile {:?}", config.profile);

    let session = match SessionAssembler::new(&config).assemble_with_identity().await {
        Ok(session) => session,
        Err(error) => return Ok(Some(error)),
    };
    if config.skip_credentials_validation {
        output::note("credentials were not validated");
    }
    output::output_session(&session, args.pretty, args.show_secrets)?;
    Ok(None)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match &cli.command {
        Commands::Resolve(args) => run_resolve(args).await,
    };
    match result {
        Ok(None) => ExitCode::SUCCESS,
        Ok(Some(error)) => {
            output::print_resolution_error(&error);
            ExitCode::from(2)
        }
        Err(e) => {
            output::warn(&format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}
