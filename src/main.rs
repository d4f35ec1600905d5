//! Caching reverse proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌───────────────────────────────────────────────┐
//!                      │                 CACHING PROXY                  │
//!                      │                                                │
//!   Client Request     │  ┌──────────┐    ┌──────────┐   hit   ┌──────┐ │
//!   ───────────────────┼─▶│   net    │───▶│ handler  │────────▶│cache │ │
//!                      │  │ listener │    │          │◀────────│store │ │
//!                      │  └──────────┘    └────┬─────┘         └──────┘ │
//!                      │                       │ miss             ▲     │
//!                      │                       ▼                  │put  │
//!   Client Response    │                  ┌──────────┐            │     │
//!   ◀──────────────────┼──────────────────│forwarder │────────────┘     │
//!                      │                  └────┬─────┘                  │
//!                      └───────────────────────┼────────────────────────┘
//!                                              ▼
//!                                        Upstream origin
//! ```

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

use cache_proxy::config::{load_config, validate_config, ConfigError, ProxyConfig};
use cache_proxy::lifecycle::shutdown_signal;
use cache_proxy::observability::{logging, metrics};
use cache_proxy::CacheProxy;

#[derive(Parser, Debug)]
#[command(name = "cache-proxy")]
#[command(about = "Caching HTTP reverse proxy for a single upstream origin", long_about = None)]
struct Cli {
    /// TOML configuration file; defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen prefix (`host:port` or `http://host:port/`), repeatable.
    #[arg(short, long = "listen")]
    listen: Vec<String>,

    /// Upstream base URL.
    #[arg(short, long)]
    upstream: Option<String>,

    /// Cache root directory.
    #[arg(long)]
    cache_dir: Option<PathBuf>,
}

impl Cli {
    fn into_config(self) -> Result<ProxyConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => ProxyConfig::default(),
        };

        if !self.listen.is_empty() {
            config.listener.prefixes = self.listen;
        }
        if let Some(upstream) = self.upstream {
            config.upstream.base_url = upstream;
        }
        if let Some(cache_dir) = self.cache_dir {
            config.cache.root = cache_dir;
        }

        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Cli::parse().into_config()?;

    logging::init_logging(&config.observability)?;

    tracing::info!("cache-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        prefixes = ?config.listener.prefixes,
        upstream = %config.upstream.base_url,
        cache_root = %config.cache.root.display(),
        upstream_timeout_secs = config.upstream.timeout_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        // Validation guarantees the address parses.
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let running = CacheProxy::new(config).start().await?;

    shutdown_signal().await;
    running.stop().await;

    tracing::info!("Shutdown complete");
    Ok(())
}
