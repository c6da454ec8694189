//! ghsync binary - serves the project-to-GitHub sync API.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use ghsync::paths::CacheLayout;
use ghsync::run::SyncOrchestrator;
use ghsync::server::{self, AppState};
use ghsync::source::DirProjectSource;
use ghsync::workspace::GitWorkspaceCache;

#[derive(Debug, Parser)]
#[command(name = "ghsync", version, about = "Project-to-GitHub synchronization service")]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "GHSYNC_LISTEN", default_value = "127.0.0.1:3890")]
    listen: SocketAddr,

    /// Root of the project store (documents and files per project).
    #[arg(long, env = "GHSYNC_STORE_ROOT")]
    store_root: PathBuf,

    /// Root of the workspace cache and staging area.
    #[arg(long, env = "GHSYNC_CACHE_ROOT")]
    cache_root: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ghsync=info")),
        )
        .init();

    let args = Args::parse();
    let cache_root = args
        .cache_root
        .unwrap_or_else(|| std::env::temp_dir().join("ghsync"));
    tracing::info!(store_root = %args.store_root.display(), cache_root = %cache_root.display(), "starting");

    let layout = CacheLayout::new(cache_root);
    let cache = Arc::new(GitWorkspaceCache::new(layout.clone()));
    let orchestrator = Arc::new(SyncOrchestrator::new(
        Arc::new(DirProjectSource::new(args.store_root)),
        cache.clone(),
        layout,
    ));

    server::serve(
        args.listen,
        AppState {
            orchestrator,
            cache,
        },
    )
    .await
}
