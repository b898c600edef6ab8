use anyhow::Context;
use arena_server::{Arena, Coordinator, GameSummary, SECRET_ENV, load_config, router};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Hosts the arena, serves the agents and drives the game until one character is left.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Port to listen on, overrides the configuration file.
    #[arg(long)]
    port: Option<u16>,
    /// Host to bind, overrides the configuration file.
    #[arg(long)]
    host: Option<String>,
    /// The configuration file.
    #[arg(long, default_value = "ArenaConfig.json")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=trace", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_file(true)
                .with_line_number(true)
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(true),
        )
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(summary) => {
            for (reference, entity) in &summary.survivors {
                tracing::info!(reference, %entity, "Survivor.");
            }
            ExitCode::SUCCESS
        }
        Err(error) => {
            tracing::error!(?error, "Arena failed.");
            ExitCode::FAILURE
        }
    }
}

/// Loads the configuration, binds the listener and serves until the coordinator is done.
async fn run(args: Args) -> anyhow::Result<GameSummary> {
    let mut config = load_config(&args.config)
        .await
        .map_err(anyhow::Error::msg)?
        .with_secret_override(std::env::var(SECRET_ENV).ok());
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(host) = args.host {
        config.host = host;
    }

    let arena = Arc::new(Arena::new(&config));
    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port))
        .await
        .with_context(|| format!("cannot bind {}:{}", config.host, config.port))?;
    tracing::info!(
        address = %listener.local_addr()?,
        tournament = arena.is_tournament(),
        "Arena listening."
    );

    let server = axum::serve(listener, router(arena.clone())).into_future();
    let coordinator = Coordinator::new(arena).run();
    tokio::select! {
        result = server => {
            result.context("server failed")?;
            anyhow::bail!("server stopped before the game ended")
        }
        summary = coordinator => Ok(summary),
    }
}
