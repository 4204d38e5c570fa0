#![forbid(unsafe_code)]

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use confique::Config;
use daemonize::Daemonize;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, trace};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::snapshot::Snapshot;
use crate::source::ProcSource;

mod metrics;
mod route;
mod sampler;
mod server;
mod snapshot;
mod source;

#[derive(Debug, Parser)]
#[command(name = "hoststat")]
struct Cli {
    #[arg(short, long, value_name = "FILE", help = "Path to config file")]
    config_path: Option<String>,
    #[arg(
        long,
        help = "Detach from the controlling session and run in the background"
    )]
    daemon: bool,
}

#[derive(Config, Debug)]
struct Conf {
    /// Port to listen on
    #[config(default = 1337)]
    port: u16,

    /// Bind address
    #[config(default = "0.0.0.0")]
    address: IpAddr,

    /// Maximum number of concurrently served connections
    #[config(default = 64)]
    max_connections: usize,

    /// Seconds a connection gets to send its request line
    #[config(default = 30)]
    read_timeout: u64,
}

fn config(path: &str) -> anyhow::Result<Conf> {
    Conf::builder()
        .env()
        .file(path)
        .load()
        .map_err(|e| e.into())
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    trace!("using command line arguments {:?}", cli);

    let config = config(&cli.config_path.unwrap_or("config.toml".to_owned()))?;
    trace!("using config {:?}", config);

    if cli.daemon {
        // fork before the runtime exists; tokio threads don't survive one
        Daemonize::new().working_directory("/").umask(0).start()?;
    }

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(config))
}

async fn run(config: Conf) -> anyhow::Result<()> {
    let cores = std::thread::available_parallelism()?.get();
    let snapshot = Arc::new(Snapshot::new(cores));
    let source = Arc::new(ProcSource);
    let shutdown = CancellationToken::new();

    tokio::spawn(sampler::run_cpu(
        source.clone(),
        snapshot.clone(),
        shutdown.clone(),
    ));
    tokio::spawn(sampler::run_load(
        source.clone(),
        snapshot.clone(),
        shutdown.clone(),
    ));
    tokio::spawn(sampler::run_memory(
        source.clone(),
        snapshot.clone(),
        shutdown.clone(),
    ));
    tokio::spawn(sampler::run_netifs(
        source.clone(),
        snapshot.clone(),
        shutdown.clone(),
    ));

    let addr = SocketAddr::from((config.address, config.port));
    let listener = TcpListener::bind(addr).await?;
    info!("listening on {addr}");

    tokio::spawn(shutdown_signal(shutdown.clone()));

    server::serve(
        listener,
        snapshot,
        config.max_connections,
        Duration::from_secs(config.read_timeout),
        shutdown,
    )
    .await
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                #[cfg(debug_assertions)]
                let default_log_level = format!("{}=debug", env!("CARGO_CRATE_NAME")).into();

                #[cfg(not(debug_assertions))]
                let default_log_level = format!("{}=info", env!("CARGO_CRATE_NAME")).into();

                default_log_level
            }),
        )
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();
}

async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutting down");
    shutdown.cancel();
}
