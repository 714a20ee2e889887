//! PCX Server - Main entry point

use anyhow::Result;
use pcx_common::logging::{init_logging, LogConfig};
use tracing::info;

use pcx_server::{api, config::Config};

#[tokio::main]
async fn main() -> Result<()> {
    // Environment variables take precedence over the baked-in defaults.
    let log_config = LogConfig::from_env().unwrap_or_else(|_| {
        LogConfig::new()
            .with_prefix("pcx-server")
            .with_filter("pcx_server=debug,tower_http=debug,sqlx=info")
    });
    init_logging(&log_config)?;

    info!("Starting PCX Server");

    let config = Config::load()?;
    info!(
        "Configuration loaded - server will bind to {}:{}",
        config.server.host, config.server.port
    );

    api::serve(config).await
}
