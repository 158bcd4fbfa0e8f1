//! `dcut` -- upload a dataset to the conversion service and fetch the result.
//!
//! Reads configuration from the environment (and `.env`), see
//! [`WizardConfig::from_env`]. Ctrl-C cancels a job that is still
//! processing.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dcut_client::api::ConverterApi;
use dcut_core::ticket::UuidTicketIds;
use dcut_wizard::cli::Cli;
use dcut_wizard::config::WizardConfig;
use dcut_wizard::controller::JobController;
use dcut_wizard::presenter::TerminalPresenter;
use dcut_wizard::session::{run_session, SessionOutcome};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dcut=info,dcut_wizard=info,dcut_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(outcome) => {
            match &outcome {
                SessionOutcome::Saved(path) => println!("Saved {}", path.display()),
                SessionOutcome::LeftOnServer(ticket_id) => {
                    println!("Result left on the server under ticket {ticket_id}")
                }
                SessionOutcome::Failed { state, message } => eprintln!(
                    "Job ended in state {state}: {}",
                    message.as_deref().unwrap_or("no details")
                ),
                SessionOutcome::Cancelled => eprintln!("Job cancelled"),
                SessionOutcome::Interrupted => eprintln!("Interrupted"),
            }
            outcome.exit_code()
        }
        Err(e) => {
            tracing::error!(error = format!("{e:#}"), "dcut failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<SessionOutcome> {
    let mut config = WizardConfig::from_env()?;
    cli.apply_overrides(&mut config);

    tracing::info!(
        api_url = %config.api_url,
        download_dir = %config.download_dir.display(),
        request_timeout_secs = config.request_timeout_secs,
        "Starting dcut",
    );

    let client = config
        .http_client()
        .context("Failed to build HTTP client")?;
    let api = ConverterApi::with_client(client, config.api_url.clone());
    let presenter = Arc::new(TerminalPresenter::new(config.download_dir.clone()));
    let controller = JobController::new(
        Arc::new(api),
        presenter,
        Arc::new(UuidTicketIds),
        config.poll,
    );

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Could not listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    let outcome = run_session(&controller, &cli.form_snapshot(), !cli.no_download, shutdown).await;
    controller.shutdown().await;
    Ok(outcome?)
}
