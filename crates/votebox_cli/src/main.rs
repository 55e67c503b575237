/* 📖 # What does the votebox binary do?

It wires the engine to the real platform and serves until it is stopped:

1. Read `votebox.toml` (or the file given with `--config`)
2. Apply `--host` and `--port` on top of it
3. Load the question data file and seed the configured accounts
4. Serve the API over HTTP

Without `--config`, a missing `votebox.toml` means default settings. A config
file named explicitly must exist.

Exit codes:
- 0: The server stopped
- 1: Startup failed (bad config, unreadable data, port in use)
*/

use std::env;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use tracing::info;

use votebox_base::tracing::init_tracing;
use votebox_base::{FilePath, HttpServerConfig, Pal, PalHandle, RealPal, VoteboxResult};
use votebox_engine::store::{InMemoryStore, StoreHandle};
use votebox_engine::{ApiOptions, ApiService, Config, load_config, load_questions, populate, seed_users};

const DEFAULT_CONFIG: &str = "votebox.toml";

/// Polling API server.
#[derive(Debug, Parser)]
#[command(name = "votebox", version)]
struct Args {
    /// Configuration file [default: votebox.toml]
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address to bind to, overriding the configuration
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on, overriding the configuration
    #[arg(long)]
    port: Option<u16>,
}

fn read_config(pal: &dyn Pal, args: &Args) -> VoteboxResult<Config> {
    let mut config = match &args.config {
        Some(path) => load_config(pal, &FilePath::from(path.as_path()))?,
        None => {
            let path = FilePath::from(DEFAULT_CONFIG);
            if pal.file_exists(&path)? {
                load_config(pal, &path)?
            } else {
                info!("no {} found, using defaults", DEFAULT_CONFIG);
                Config::default()
            }
        }
    };
    if let Some(host) = &args.host {
        config.host = host.clone();
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    Ok(config)
}

fn run(args: Args) -> VoteboxResult<()> {
    let current_dir = env::current_dir()
        .map_err(|e| votebox_base::err!("Failed to get current directory: {}", e))?;
    let pal = PalHandle::new(RealPal::new(current_dir));

    let config = read_config(&*pal, &args)?;

    let store = StoreHandle::new(InMemoryStore::new());
    if let Some(data_file) = &config.data_file {
        let records = load_questions(&*pal, &FilePath::from(data_file.as_str()))?;
        populate(&store, &records)?;
    }
    seed_users(&store, &config.users)?;

    let service = ApiService::new(
        store,
        ApiOptions {
            allow_registration: config.allow_registration,
            json_indent: config.json_indent,
        },
    );
    let server_config = HttpServerConfig::new(config.host.clone()).with_port(config.port);
    let handle = pal.start_http_server(Box::new(service), server_config)?;
    info!(
        address = %handle.address(&config.host),
        "votebox listening"
    );
    handle.wait();
    Ok(())
}

fn main() {
    let args = Args::parse();

    if let Err(e) = init_tracing() {
        eprintln!("Error: Failed to initialize logging: {}", e);
        process::exit(1);
    }

    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
