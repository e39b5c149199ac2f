use clap::Parser;
use std::sync::Arc;
use marquee::config::ServerConfig;
use marquee::server::MovieServer;
use marquee::MovieCatalog;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info,marquee=info");
    }
    tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .with_target(false)
    .with_level(true)
    .init();

    let config = ServerConfig::parse();

    info!("--- Marquee Movie Catalog v{} ---", env!("CARGO_PKG_VERSION"));
    info!(data_file = %config.data_file.display(), "opening store");

    let catalog = Arc::new(MovieCatalog::open(&config.data_file));

    // Touch the store once so a corrupt file is reported before serving
    match catalog.all() {
        Ok(movies) => info!(count = movies.len(), "store ready"),
        Err(e) => {
            error!(error = %e, "store is unreadable, refusing to start");
            std::process::exit(1);
        }
    }

    let addr = match config.socket_addr() {
        Ok(addr) => addr,
        Err(e) => {
            error!(host = %config.host, port = config.port, error = %e, "cannot resolve listen address");
            std::process::exit(1);
        }
    };

    let server = MovieServer::new(catalog);
    if let Err(e) = server.run(addr).await {
        error!(%addr, error = %e, "server failed");
        std::process::exit(1);
    }
}
