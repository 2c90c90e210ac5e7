use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use idservice::api::{start_server, AppState, ServerConfig};
use idservice::metrics::MetricsRegistry;
use idservice::storage::PersistentAllocator;

/// Serves unique, monotonically increasing u64 ids over HTTP.
///
/// POST /v1/id returns {"id":1}; POST /v1/id?count=10 returns {"ids":[2,11]}.
/// The last issued id is kept in the working directory and survives restarts.
#[derive(Parser, Debug)]
#[command(version, verbatim_doc_comment)]
struct Args {
    /// Address to bind.
    #[arg(long, env = "IDSERVICE_HOST", default_value = "0.0.0.0")]
    host: String,
    /// Port for the server.
    #[arg(short, long, env = "IDSERVICE_PORT", default_value_t = 8000)]
    port: u16,
    /// Working directory holding the id record. Defaults to the current directory.
    #[arg(short, long, env = "IDSERVICE_WORKDIR")]
    workdir: Option<PathBuf>,
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested, draining in-flight requests");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("idservice=info".parse()?))
        .init();

    let args = Args::parse();
    let workdir = match args.workdir {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };

    tracing::info!("idservice starting...");

    let allocator = match PersistentAllocator::open(&workdir) {
        Ok(allocator) => Arc::new(allocator),
        Err(e) => {
            tracing::error!(workdir = %workdir.display(), error = %e, "Unable to initialize");
            return Err(e.into());
        }
    };
    tracing::info!("Serving ids from {}", allocator.location());

    let state = Arc::new(AppState::new(allocator, Arc::new(MetricsRegistry::new())));
    let config = ServerConfig {
        host: args.host,
        port: args.port,
    };

    start_server(config, state, shutdown_signal()).await?;

    tracing::info!("idservice stopped");
    Ok(())
}
