//! find-device-viewer - read-only map over the logger's database

use std::net::SocketAddr;

use clap::Parser;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use find_device_logger::cli::ViewerArgs;
use find_device_logger::config::Config;
use find_device_logger::db::Store;
use find_device_logger::{logging, viewer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = ViewerArgs::parse();

    let mut config = Config::load(args.config.as_deref())?;
    args.apply(&mut config);

    logging::init(&config.logging)?;
    tracing::info!("Starting find-device-viewer...");

    let store = Store::connect_read_only(&config.database.path).await?;

    let app = viewer::routes(store).layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()));

    let addr: SocketAddr = config.viewer.listen.parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
