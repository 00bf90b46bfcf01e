//! Queue manager service binary.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use rvoip_queue_manager::config::QueueManagerConfig;
use rvoip_queue_manager::logging::{setup_logging, LoggingConfig};
use rvoip_queue_manager::server::QueueManagerServerBuilder;

#[derive(Parser, Debug)]
#[command(name = "queue-manager")]
#[command(about = "Call-center queue manager")]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level, overrides the configured one
    #[arg(short, long)]
    log_level: Option<String>,

    /// Database URL, overrides the configured one
    #[arg(long)]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = QueueManagerConfig::load(args.config.as_deref())?;
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }

    let logging = LoggingConfig::from_section(&config.logging, config.general.service_name.clone())?;
    setup_logging(&logging)?;

    let mut builder = QueueManagerServerBuilder::new().with_config(config);
    if let Some(url) = args.database_url {
        builder = builder.with_database_url(url);
    }

    let mut server = builder.build().await?;
    server.start().await?;
    info!("Queue manager is running. Press Ctrl+C to stop.");

    tokio::signal::ctrl_c().await?;

    server.stop().await?;
    Ok(())
}
