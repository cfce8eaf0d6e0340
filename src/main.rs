//! Todo server binary
//!
//! Starts the multi-worker HTTP/WebSocket server and, unless disabled, the
//! random message producer.

use std::net::{IpAddr, SocketAddr};
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use todos_rs::server::DEFAULT_PORT;
use todos_rs::{generator, ServerConfig, SharedStore, TodoServer};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "todos-server")]
#[command(about = "In-memory todo service with sharded WebSocket pub/sub")]
struct Args {
    /// Number of worker threads sharing the listening port
    #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u16).range(1..))]
    workers: u16,

    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Address to bind
    #[arg(long, default_value = "0.0.0.0", value_name = "ADDR")]
    bind: IpAddr,

    /// Do not start the random message producer
    #[arg(long)]
    no_random: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    setup_tracing();

    let mut config = ServerConfig::with_addr(SocketAddr::new(args.bind, args.port))
        .workers(usize::from(args.workers));
    if args.no_random {
        config = config.disable_random();
    }
    let random = config.random.clone();

    let running = match TodoServer::new(config, SharedStore::new()).start() {
        Ok(running) => running,
        Err(e) => {
            tracing::error!(error = %e, "Failed to start server");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        addr = %running.local_addr(),
        workers = running.worker_count(),
        "Server ready"
    );

    if random.enabled {
        if let Err(e) = generator::spawn(running.dispatcher().clone(), random) {
            tracing::error!(error = %e, "Failed to start random producer");
            return ExitCode::FAILURE;
        }
    }

    running.wait();
    ExitCode::SUCCESS
}

fn setup_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
