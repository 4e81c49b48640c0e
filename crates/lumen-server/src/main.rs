mod app;
mod views;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use lumen::{manifest, App, Config};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "lumen-server", about = "Reference lumen server")]
struct Args {
    /// Path to the configuration file
    #[arg(long, default_value = "lumen.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let config = Config::load(&args.config)?.apply_env()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.filter.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(config = %args.config.display(), "lumen-server starting");

    let store = app::TodoStore::seeded();
    manifest::install(app::manifest(store, config.routing.case_insensitive)?)?;
    let manifest = manifest::installed()?;
    tracing::info!(
        routes = manifest.routes().len(),
        actions = manifest.actions().len(),
        "routes registered"
    );

    let addr = config.socket_addr()?;
    let router = App::new(manifest, views::engine())
        .with_config(config)
        .router();

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!(address = %listener.local_addr()?, "listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "could not listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
