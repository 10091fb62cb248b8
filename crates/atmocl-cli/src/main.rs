//! Atmosphere CLI - manage volumes, instances and images.
//!
//! This is the entry point for the `atmocl` binary.

mod args;
mod bootstrap;
mod commands;
mod output;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use atmocl_api::{ApiConfig, ApiError, CreateVolumeRequest, HttpAtmoClient};
use atmocl_auth::{AuthClient, AuthConfig, CredentialCache};
use atmocl_volume::{ShellRunner, StdConsole, VolumeWorkflows, WorkflowConfig, WorkflowError};
use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use args::{Action, Args, EXTENDED_HELP};
use bootstrap::{bootstrap, TerminalPrompt};
use commands::{Dispatcher, Options};

const LOGIN_HINT: &str = "The server refused the login. Run again with -u <username> to log in.";

const DEBUG_FILTER: &str = "atmocl=debug,atmocl_auth=debug,atmocl_api=debug,atmocl_volume=debug,warn";

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    // RUST_LOG wins over -q
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if args.debug { DEBUG_FILTER } else { "warn" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if args.extended_help {
        println!("{EXTENDED_HELP}");
        return ExitCode::SUCCESS;
    }

    let Some(keyword) = args.command.as_deref() else {
        // Help output failing to print is not worth reporting
        let _ = Args::command().print_help();
        println!();
        return ExitCode::SUCCESS;
    };
    let action = match keyword.parse::<Action>() {
        Ok(action) => action,
        Err(message) => {
            println!("{message}");
            return ExitCode::SUCCESS;
        }
    };

    match run(args, action).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e:#}");
            if is_auth_failure(&e) {
                eprintln!("{LOGIN_HINT}");
            }
            let code = e
                .downcast_ref::<WorkflowError>()
                .map_or(0, WorkflowError::exit_code);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

async fn run(args: Args, action: Action) -> anyhow::Result<()> {
    let auth_config = match &args.auth_url {
        Some(url) => AuthConfig::with_url(url.clone()),
        None => AuthConfig::default(),
    };
    let auth = AuthClient::new(auth_config);

    let cache = match &args.credentials_file {
        Some(path) => CredentialCache::new(path.clone()),
        None => CredentialCache::at_home().context("Cannot locate the credential cache")?,
    };

    let bootstrapped = bootstrap(
        &cache,
        &auth,
        args.user.as_deref(),
        args.password.as_deref(),
        &TerminalPrompt,
    )
    .await?;

    let owner = bootstrapped.credentials.username.clone();
    let mut client =
        HttpAtmoClient::new(&ApiConfig::default(), auth).with_credentials(bootstrapped.credentials);
    if let Some((username, password)) = bootstrapped.login {
        client = client.with_login(username, password);
    }
    let api = Arc::new(client);

    let mut config = WorkflowConfig::default();
    config.provisioner.use_sudo = args.sudo;

    let workflows = VolumeWorkflows::new(Arc::clone(&api), ShellRunner::new(), StdConsole, config);
    let options = Options {
        device: args.device,
        force_format: args.force_format,
        instance_id: args.instance,
        owner: Some(owner),
        create: CreateVolumeRequest::new(args.size, args.name),
    };

    Dispatcher::new(api, workflows, options)
        .run(action, &args.params)
        .await
}

/// Returns true if any error in the chain is a rejected login or token.
fn is_auth_failure(error: &anyhow::Error) -> bool {
    error
        .chain()
        .filter_map(|cause| cause.downcast_ref::<ApiError>())
        .any(ApiError::is_auth_failure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use atmocl_auth::AuthError;
    use atmocl_core::VolumeId;

    #[test]
    fn rejected_token_inside_workflow_error_is_an_auth_failure() {
        let err = anyhow::Error::new(WorkflowError::Api(ApiError::Http {
            endpoint: "getVolumeList".to_string(),
            status: 401,
        }));
        assert!(is_auth_failure(&err));

        let err = anyhow::Error::new(ApiError::Auth(AuthError::InvalidCredentials))
            .context("Failed to list volumes");
        assert!(is_auth_failure(&err));
    }

    #[test]
    fn other_failures_get_no_login_hint() {
        let err = anyhow::Error::new(WorkflowError::VolumeNotFound(
            VolumeId::parse("vol-0000abcd").unwrap(),
        ));
        assert!(!is_auth_failure(&err));

        let err = anyhow::Error::new(ApiError::Http {
            endpoint: "getVolumeList".to_string(),
            status: 503,
        });
        assert!(!is_auth_failure(&err));
    }
}
