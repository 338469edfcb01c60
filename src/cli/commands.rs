use anyhow::Context as _;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::config::{EngineConfig, ServerConfig};
use crate::engine::Engine;
use crate::logging::{init_logging, LogConfig};
use crate::middleware::{logger, recovery, request_id, Metrics};
use crate::server::{HttpServer, ServerHandle};

#[derive(Parser)]
#[command(name = "whisk")]
#[command(about = "whisk file server", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve a directory over HTTP
    Serve {
        /// Directory to serve
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,

        /// Address to listen on
        #[arg(short, long, env = "WHISK_ADDR", default_value = "127.0.0.1:8080")]
        addr: String,

        /// Engine configuration file (YAML)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Print the route table of the file server
    Routes {
        /// Directory to serve
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,

        /// Engine configuration file (YAML)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn load_config(path: Option<&Path>) -> anyhow::Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::from_yaml_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(EngineConfig::from_env()),
    }
}

/// The file server: request ids, access log, metrics at `GET /metrics` and
/// `dir` mounted at `/`.
pub fn build_engine(dir: &Path, config: EngineConfig) -> (Engine, Arc<Metrics>) {
    let metrics = Arc::new(Metrics::new());
    let mut engine = Engine::new(config);
    engine.use_middleware(vec![request_id(), logger(), metrics.handler(), recovery()]);
    engine.get("/metrics", vec![metrics.endpoint()]);
    engine.static_dir("/", dir);
    (engine, metrics)
}

pub fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Serve { dir, addr, config } => {
            let config = load_config(config.as_deref())?;
            let _guard = init_logging(&LogConfig::for_mode(config.mode))?;
            anyhow::ensure!(dir.is_dir(), "{} is not a directory", dir.display());

            let (engine, _metrics) = build_engine(&dir, config);
            let handle = HttpServer::new(Arc::new(engine), ServerConfig::from_env())
                .start(addr.as_str())
                .with_context(|| format!("Failed to bind {addr}"))?;
            info!(addr = %handle.addr(), dir = %dir.display(), "Serving directory");
            wait_for_shutdown(handle)
        }
        Commands::Routes { dir, config } => {
            let config = load_config(config.as_deref())?;
            let (engine, _metrics) = build_engine(&dir, config);
            for route in engine.routes() {
                println!("{:<8} {:<24} ({} handlers)", route.method, route.pattern, route.handlers);
            }
            Ok(())
        }
    }
}

#[cfg(unix)]
fn wait_for_shutdown(handle: ServerHandle) -> anyhow::Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM]).context("Failed to install signal handlers")?;
    if let Some(signal) = signals.forever().next() {
        info!(signal, "Shutdown signal received");
    }
    handle.stop();
    Ok(())
}

#[cfg(not(unix))]
fn wait_for_shutdown(handle: ServerHandle) -> anyhow::Result<()> {
    handle
        .join()
        .map_err(|_| anyhow::anyhow!("A server worker panicked"))
}
