//! Compute balancer.
//!
//! Fronts a pool of interchangeable compute backends.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌────────────────────────────────────────────────────┐
//!                      │                  COMPUTE BALANCER                   │
//!                      │                                                     │
//!   HTTP request       │  ┌────────┐   ┌──────────┐   ┌──────────────────┐  │
//!   ───────────────────┼─▶│  http  │──▶│ dispatch │──▶│  load_balancer   │  │
//!                      │  │ server │   │ proxy /  │   │ registry+select  │  │
//!                      │  └────────┘   │ packet   │   └────────┬─────────┘  │
//!                      │      │        └────┬─────┘            │            │
//!                      │      ▼             │            ┌─────▼──────┐     │
//!                      │  ┌────────┐        └───────────▶│ backend_api│─────┼──▶ Backends
//!                      │  │ admin  │                     └─────▲──────┘     │
//!                      │  └────────┘   ┌──────────┐          │             │
//!                      │               │  health  │──────────┤             │
//!   TCP control frame  │  ┌────────┐   └──────────┘          │             │
//!   ───────────────────┼─▶│control │─────────────────────────┘             │
//!                      │  └────────┘                                        │
//!                      │  config · lifecycle · observability · net          │
//!                      └────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use compute_balancer::config::{load_config, BalancerConfig};
use compute_balancer::lifecycle;
use compute_balancer::observability::logging;

#[derive(Parser)]
#[command(name = "compute-balancer", version, about = "Load balancer for compute backends")]
struct Args {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => BalancerConfig::default(),
    };

    logging::init_logging(&config.observability.log_level);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "compute-balancer starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        control_address = %config.control.bind_address,
        backends = config.backends.len(),
        algorithm = %config.algorithm,
        "Configuration loaded"
    );

    lifecycle::run(config, args.config).await?;
    Ok(())
}
