use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use lrucached::concurrency::Executor;
use lrucached::config::Mode;
use lrucached::{Config, MultiThreadServer, SingleThreadServer};

/// In-memory LRU cache server speaking the memcached text protocol.
#[derive(Parser)]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Listen address, overriding the configuration.
    #[arg(long)]
    listen: Option<String>,

    /// Store byte budget, overriding the configuration.
    #[arg(long)]
    max_size: Option<usize>,

    /// Worker reactor count in multi mode (0 = hardware concurrency).
    #[arg(long)]
    workers: Option<usize>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => match Config::from_file(path) {
            Ok(config) => config,
            Err(err) => {
                error!(?err, "cannot load configuration");
                return ExitCode::FAILURE;
            }
        },
        None => Config::default(),
    };
    if let Some(listen) = args.listen {
        config.listen = listen;
    }
    if let Some(max_size) = args.max_size {
        config.max_size = max_size;
    }
    if let Some(workers) = args.workers {
        config.workers = workers;
    }

    let served = match config.mode {
        Mode::Single => {
            SingleThreadServer::bind(&config.listen, config.max_size).and_then(|server| server.run())
        }
        Mode::Multi => match MultiThreadServer::bind(&config.listen, config.max_size, config.workers)
        {
            Ok(server) => {
                let server = match &config.executor {
                    Some(pool_config) => match Executor::start(pool_config.options()) {
                        Ok(pool) => server.with_offload(pool),
                        Err(err) => {
                            error!(?err, "bad executor options");
                            return ExitCode::FAILURE;
                        }
                    },
                    None => server,
                };
                server.run()
            }
            Err(err) => Err(err),
        },
    };

    if let Err(err) = served {
        error!(error = %err, "server failed");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
