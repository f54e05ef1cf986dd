use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::sync::Mutex;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = rpn::config::Cli::parse();
    run_server(cli.config).await
}

async fn run_server(config: rpn::config::Config) -> Result<()> {
    let store = rpn::state::JsonSnapshotStore::load_or_init(rpn::state::StoreInit {
        data_dir: config.data_dir.clone(),
    })?;
    info!(
        stacks = store.state().stacks.len(),
        "loaded stack store"
    );
    let store = Arc::new(Mutex::new(store));

    let app = rpn::http::build_router(config.clone(), store)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    info!(
        bind = %config.bind,
        data_dir = %config.data_dir.display(),
        version = rpn::version::VERSION,
        "starting rpn"
    );
    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).compact().init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
    }
}
