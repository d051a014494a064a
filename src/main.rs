//! Server entry point: configuration, logging, directory sync, transport.

use anyhow::Result;
use tracing::{Level, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use hotload_mcp_server::core::{Config, McpServer, TransportService};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env();
    init_logging(&config.logging.level, config.logging.with_timestamps);

    info!("Starting {} v{}", config.server.name, config.server.version);
    info!(
        "Watching resources in {} and tools in {}",
        config.catalog.resources_dir.display(),
        config.catalog.tools_dir.display()
    );

    let server = McpServer::new(config.clone());
    server.start().await?;

    let transport = TransportService::new(config.transport);
    tokio::select! {
        result = transport.run(server.clone()) => {
            if let Err(e) = result {
                warn!("Transport stopped with error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl-C");
        }
    }

    info!("Shutting down");
    server.shutdown().await;

    Ok(())
}

/// Log to stderr; stdout belongs to the stdio transport.
fn init_logging(level: &str, with_timestamps: bool) {
    let level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());
    let builder = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    if with_timestamps {
        builder.init();
    } else {
        builder.without_time().init();
    }
}
