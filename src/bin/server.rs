extern crate xo_server;

use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use xo_server::config::Config;
use xo_server::server::Server;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    let config = Config::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let server = Server::bind(&config).await?;
    info!("successfully started listening on {}", server.local_addr()?);

    let ct = CancellationToken::new();
    let server = tokio::spawn(server.run(ct.clone()));

    if let Err(err) = signal::ctrl_c().await {
        error!("unable to listen for shutdown signal: {}", err);
    }
    ct.cancel();
    server.await??;

    Ok(())
}
