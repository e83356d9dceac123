use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use rendez_relay::config::RelayConfig;
use rendez_relay::server::Server;

#[tokio::main]
async fn main() -> Result<()> {
    let config = RelayConfig::parse().resolve();

    let filter = EnvFilter::from_default_env().add_directive("rendez_relay=info".parse()?);
    if config.log_json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let server = Server::new(config);
    if let Err(e) = server.run().await {
        tracing::error!("{e}");
        std::process::exit(1);
    }
    Ok(())
}
