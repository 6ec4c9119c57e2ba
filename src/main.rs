//! odds-drop server and CLI
//!
//! REST API and CLI for race-card extraction, odds-drop signals and snapshots.

use axum::{routing::get, routing::post, Router};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use odds_drop::cli::{self, Cli, Commands};
use odds_drop::config::AppConfig;
use odds_drop::routes::{self, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so JSON output on stdout stays clean
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "odds_drop=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { host, port } => run_server(Some(host), Some(port)).await,
        Commands::Extract {
            input,
            hint,
            charset,
            format,
        } => cli::run_extract(input, hint, charset, format).await,
        Commands::Fetch {
            races,
            date,
            format,
            simulate_pct,
            archive,
        } => cli::run_fetch(races, date, format, simulate_pct, archive).await,
        Commands::Watch { races, interval } => cli::run_watch(races, interval).await,
        Commands::History { date, race } => cli::run_history(date, race).await,
    }
}

/// Run the API server.
async fn run_server(host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let mut config = AppConfig::load()?;

    // Override with CLI args
    if let Some(h) = host {
        config.server.host = h;
    }
    if let Some(p) = port {
        config.server.port = p;
    }

    tracing::info!("Configuration loaded");
    tracing::info!(
        "Sources: {}",
        config
            .fetch
            .sources
            .iter()
            .map(|s| s.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    tracing::info!("Archive: {}", config.archive.path);

    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);
    let state = Arc::new(AppState::new(config));

    let app = Router::new()
        .route("/health", get(routes::health))
        .route("/extract", post(routes::extract))
        .route("/snapshots/:race_no", post(routes::submit_snapshot))
        .route("/races/:date/:race_no", get(routes::get_race))
        .route("/archive/:date", post(routes::archive_day).get(routes::get_archive))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
