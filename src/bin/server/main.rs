//! Deployable relay server
//!
//! Bridges Redis pub/sub channels to STOMP-over-WebSocket clients.
//! Every flag can also be set through the environment, which is how
//! container deployments configure it.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use stomp_relay::{Broker, ServerConfig};
use tracing_subscriber::EnvFilter;

mod ingress;

use ingress::RedisArgs;

#[derive(Parser, Debug)]
#[command(name = "stomp-relay-server")]
#[command(version, about = "STOMP-over-WebSocket relay", long_about = None)]
struct Args {
    /// HTTP service address
    #[arg(long, env = "BIND_ADDRESS", default_value = "0.0.0.0:8448")]
    addr: SocketAddr,

    /// Enable transport compression
    #[arg(
        long,
        env = "COMPRESSION",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    compression: bool,

    /// Ingress data source (only "redis" is supported)
    #[arg(long, env = "DATA_SOURCE", default_value = "redis")]
    data_source: String,

    #[command(flatten)]
    redis: RedisArgs,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_tracing();

    if args.data_source != "redis" {
        tracing::error!(data_source = %args.data_source, "unknown data source");
        std::process::exit(1);
    }

    let config = ServerConfig::with_addr(args.addr).compression(args.compression);
    let broker = Broker::new(config);
    broker.setup();
    let broker = Arc::new(broker);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting stomp-relay");

    let ingress_broker = Arc::clone(&broker);
    tokio::spawn(async move {
        if let Err(e) = ingress::run(args.redis, ingress_broker).await {
            tracing::error!(error = %e, "redis ingress failed");
            std::process::exit(1);
        }
    });

    let result = broker
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await;

    if let Err(e) = result {
        tracing::error!(error = %e, "server error");
        std::process::exit(1);
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}
