//! shellcache entry point.
//!
//! Acts as the host for the cache engine: each command delivers one lifecycle
//! event and prints the resulting report as JSON on stdout. Logging goes to
//! stderr so the reports stay machine-readable.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use shellcache_client::{FetchClient, FetchConfig};
use shellcache_core::address::resolve;
use shellcache_core::{AppConfig, Error, Request, Store, StoreDb, StoreHandle, WorkerConfig};
use shellcache_worker::{BypassReason, FetchReply, ResponseSource, ServiceWorker};

mod args;

use args::{Cli, Commands, FetchArgs};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).json().init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let message = format!("{e:#}");
            tracing::error!(error = %message, "command failed");
            let report = ErrorReport { code: e.downcast_ref::<Error>().map(Error::code), message };
            if let Err(err) = print_json(&ErrorEnvelope { error: report }) {
                tracing::error!(error = %err, "failed to write error report");
            }
            ExitCode::FAILURE
        }
    }
}

#[derive(Serialize)]
struct ErrorEnvelope {
    error: ErrorReport,
}

#[derive(Serialize)]
struct ErrorReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<i32>,
    message: String,
}

async fn run(cli: Cli) -> Result<()> {
    let app = AppConfig::load_from(cli.config.as_deref()).context("loading configuration")?;
    let config = Arc::new(app.worker_config().context("resolving configuration")?);
    let store = Arc::new(
        StoreDb::open(&app.db_path)
            .await
            .with_context(|| format!("opening store at {}", app.db_path.display()))?,
    );

    tracing::debug!(generation = %config.generation, origin = %config.origin, "configuration loaded");

    if let Commands::Generations = cli.command {
        return list_generations(&store, &config).await;
    }

    let network = Arc::new(FetchClient::new(FetchConfig::from_app(&app, config.origin.clone()))?);
    let worker = ServiceWorker::new(store, network, config);

    match cli.command {
        Commands::Install => print_json(&worker.on_install().await?),
        Commands::Activate => {
            worker.manager().resume().await?;
            print_json(&worker.on_activate().await?)
        }
        Commands::Fetch(args) => {
            worker.manager().resume().await?;
            fetch(&worker, args).await
        }
        Commands::Generations => unreachable!("generations handled above"),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[derive(Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
enum FetchOutput<'a> {
    Declined {
        url: &'a str,
        method: &'a str,
        reason: BypassReason,
    },
    Responded {
        url: &'a str,
        method: &'a str,
        source: ResponseSource,
        status: u16,
        status_text: &'a str,
        response_type: &'a str,
        redirected: bool,
        headers: &'a [(String, String)],
        body_bytes: usize,
    },
}

async fn fetch<S: Store>(worker: &ServiceWorker<S, FetchClient>, args: FetchArgs) -> Result<()> {
    let url = resolve(&worker.config().origin, &args.url).with_context(|| format!("invalid url {}", args.url))?;
    let request = (if args.navigate { Request::navigate(url) } else { Request::get(url) }).with_method(args.method);

    match worker.on_fetch(&request).await? {
        FetchReply::Decline(reason) => print_json(&FetchOutput::Declined {
            url: request.url.as_str(),
            method: &request.method,
            reason,
        }),
        FetchReply::Respond(mut served) => {
            // keep the process alive until an opportunistic write lands
            served.settle().await;

            if let Some(path) = &args.output {
                tokio::fs::write(path, &served.response.body)
                    .await
                    .with_context(|| format!("writing body to {}", path.display()))?;
            }

            let response = &served.response;
            print_json(&FetchOutput::Responded {
                url: request.url.as_str(),
                method: &request.method,
                source: served.source,
                status: response.status,
                status_text: &response.status_text,
                response_type: response.response_type.as_str(),
                redirected: response.redirected,
                headers: &response.headers,
                body_bytes: response.body.len(),
            })
        }
    }
}

#[derive(Serialize)]
struct GenerationSummary {
    name: String,
    active: bool,
    entries: usize,
}

async fn list_generations(store: &StoreDb, config: &WorkerConfig) -> Result<()> {
    let mut summaries = Vec::new();
    for name in store.keys().await? {
        let entries = store.open(&name).await?.entry_urls().await?.len();
        summaries.push(GenerationSummary { active: name == config.generation, name, entries });
    }
    print_json(&summaries)
}
