use std::{net::SocketAddr, path::PathBuf};

use anyhow::Context;
use city_buildings::{
    overpass::OverpassClient,
    server::{AppState, router},
    settings::Settings,
};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Serves OpenStreetMap building footprints for a city.
#[derive(Debug, Parser)]
#[command(name = "city-buildings", version, about)]
struct Cli {
    /// Configuration file layered over the global and project files.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on, overrides `server.bind`.
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// Overpass interpreter URL, overrides `overpass.endpoint_url`.
    #[arg(long)]
    endpoint: Option<String>,

    /// -v info, -vv debug, -vvv trace. `RUST_LOG` wins when set.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match cli.verbose {
        0 => EnvFilter::new("warn,city_buildings=info"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let mut settings = Settings::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(bind) = cli.bind {
        settings.server.bind = bind;
    }
    if let Some(endpoint) = cli.endpoint {
        settings.overpass.endpoint_url = endpoint;
    }
    settings.validate()?;

    let client = OverpassClient::new(settings.overpass.clone());
    info!(
        endpoint = client.url(),
        max_retries = client.config().max_retries,
        "Using Overpass interpreter"
    );
    let state = AppState::new(client, settings.server.default_place.clone())
        .with_static_dir(settings.server.static_dir.clone());
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.bind)
        .await
        .with_context(|| format!("binding {}", settings.server.bind))?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
}
