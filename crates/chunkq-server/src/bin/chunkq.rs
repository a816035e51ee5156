//! chunkq server binary
//!
//! # Configuration
//!
//! Settings come from an optional TOML file (`--config`), overridden by
//! flags or their environment variables:
//!
//! - `CHUNKQ_DIR`: data directory (required unless set in the config file)
//! - `CHUNKQ_INSTANCE`: instance name prefixing chunk files (default: local)
//! - `CHUNKQ_LISTEN`: listen address (default: 127.0.0.1:8080)
//! - `CHUNKQ_MAX_CHUNK_SIZE`: rotation threshold in bytes (default: 20MiB)
//! - `RUST_LOG`: log filter (default: info)
//!
//! # Example
//!
//! ```bash
//! CHUNKQ_DIR=./data CHUNKQ_INSTANCE=moscow cargo run -p chunkq-server
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chunkq_server::{
    create_router, probe_data_dir, serve_with_shutdown, shutdown_signal, AppState,
    CategoryRegistry, ServerConfig,
};
use chunkq_storage::NoopHooks;
use clap::Parser;
use tokio::net::TcpListener;

#[derive(Parser, Debug)]
#[command(name = "chunkq")]
#[command(about = "Append-only chunked message queue server", long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "CHUNKQ_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory, one subdirectory per category
    #[arg(long, env = "CHUNKQ_DIR")]
    dir: Option<PathBuf>,

    /// Instance name used in chunk file names
    #[arg(long, env = "CHUNKQ_INSTANCE")]
    instance: Option<String>,

    /// Address to listen on
    #[arg(long, env = "CHUNKQ_LISTEN")]
    listen: Option<String>,

    /// Rotate chunks once they would exceed this many bytes
    #[arg(long, env = "CHUNKQ_MAX_CHUNK_SIZE")]
    max_chunk_size: Option<u64>,
}

impl Args {
    fn into_config(self) -> Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::from_toml_file(path)?,
            None => ServerConfig::default(),
        };

        if let Some(dir) = self.dir {
            config.dir = Some(dir);
        }
        if let Some(instance) = self.instance {
            config.instance = instance;
        }
        if let Some(listen) = self.listen {
            config.listen = listen;
        }
        if let Some(max_chunk_size) = self.max_chunk_size {
            config.storage.max_chunk_size = max_chunk_size;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Args::parse().into_config()?;
    let dir = config.validate()?.to_path_buf();

    probe_data_dir(&dir).await?;

    tracing::info!("Configuration:");
    tracing::info!("  Data dir: {}", dir.display());
    tracing::info!("  Instance: {}", config.instance);
    tracing::info!("  Max chunk size: {} bytes", config.storage.max_chunk_size);
    tracing::info!("  Sync on write: {}", config.storage.sync_on_write);

    let registry = CategoryRegistry::new(
        dir,
        config.instance.clone(),
        Arc::new(NoopHooks),
        config.storage.clone(),
    );
    let router = create_router(AppState {
        registry: Arc::new(registry),
        max_write_size: config.max_write_size,
    });

    let listener = TcpListener::bind(&config.listen)
        .await
        .with_context(|| format!("binding {}", config.listen))?;
    tracing::info!("chunkq listening on {}", listener.local_addr()?);

    serve_with_shutdown(listener, router, async {
        let signal = shutdown_signal().await;
        tracing::info!("Received {}, shutting down", signal);
    })
    .await?;

    Ok(())
}
