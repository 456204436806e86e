//! gcal-token CLI entry point.

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;

use gcal_token_cli::cli::Cli;
use gcal_token_cli::error::ClientResult;
use gcal_token_cli::{Authorizer, Outcome};
use gcal_token_core::tracing::{TracingConfig, TracingOutputFormat, init_tracing};
use gcal_token_oauth::{InstalledFlow, InstalledFlowConfig};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> ClientResult<()> {
    let tracing_config = if cli.debug {
        TracingConfig::cli_debug()
    } else {
        TracingConfig::cli()
    };
    let tracing_config = if cli.log_json {
        tracing_config.with_format(TracingOutputFormat::Json)
    } else {
        tracing_config
    };
    init_tracing(tracing_config)?;

    let flow_config = InstalledFlowConfig::default()
        .with_request_timeout(Duration::from_secs(cli.timeout))
        .with_open_browser(!cli.no_browser);
    let flow = InstalledFlow::new(flow_config)?;

    let authorizer = Authorizer::new(cli.authorizer_config(), flow);
    let mut stdout = std::io::stdout().lock();

    // A missing client secrets file is not a failure
    match authorizer.run(&mut stdout).await? {
        Outcome::MissingCredentials => tracing::debug!("nothing to do without client secrets"),
        Outcome::Saved(_) => tracing::debug!("authorization complete"),
    }

    Ok(())
}
