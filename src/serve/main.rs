//! Dashboard server.
//!
//! Serves the department selector, the client map, the enriched table as
//! JSON, and the map as a downloadable HTML file.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use clientmap::config::Config;
use clientmap::pipeline::Session;

mod handlers;
use handlers::{router, AppState};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "serve")]
#[command(about = "Client map dashboard server")]
struct Args {
    /// Listen address
    #[arg(short, long, default_value = "0.0.0.0:3000")]
    listen: String,

    /// Optional TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// OpenCage API key
    #[arg(long, env = "API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Clientmap Dashboard Server");

    let config = Config::load(args.config.as_deref())?.with_api_key(args.api_key);
    let (clients, boundaries, geocoder) = config.build()?;
    info!("Client export: {}", clients.url());

    let mut session = Session::new(clients, boundaries, geocoder);

    // Warm the client table; a failure here is reported per request later
    match session.clients().await {
        Ok(records) => info!("Loaded {} clients", records.len()),
        Err(e) => warn!("Client export not available yet: {}", e),
    }

    let download_name = config
        .map
        .output_file
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("client_map.html")
        .to_string();
    let state = Arc::new(AppState::new(
        session,
        config.render_options(),
        &download_name,
    ));

    // Build router
    let app = router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    info!("Starting server on {}", args.listen);

    let listener = tokio::net::TcpListener::bind(&args.listen).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
