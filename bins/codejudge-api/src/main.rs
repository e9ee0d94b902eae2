mod handlers;
mod routes;

use anyhow::Context;
use codejudge_common::config::Config;
use codejudge_engine::cache::RedisCache;
use codejudge_engine::compiler::ToolchainRegistry;
use codejudge_engine::executor::SubmissionExecutor;
use codejudge_engine::gateway::ProblemGateway;
use codejudge_engine::store::FileProblemStore;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

pub struct AppState {
    pub gateway: Arc<ProblemGateway>,
    pub executor: SubmissionExecutor,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    info!("codejudge API booting...");

    let config = Config::from_env().context("Failed to load configuration")?;

    // Connect to Redis
    let cache = RedisCache::connect(&config.redis_url)
        .await
        .with_context(|| format!("Failed to connect to Redis at {}", config.redis_url))?;
    info!("Connected to Redis: {}", config.redis_url);

    let store = FileProblemStore::new(&config.problems_path);
    info!("Problem store: {}", store.path().display());

    let gateway = Arc::new(ProblemGateway::new(
        Arc::new(store),
        Arc::new(cache),
        config.cache_ttls.clone(),
    ));

    let toolchains = ToolchainRegistry::load_or_default(&config.toolchains_path)?;
    let executor = SubmissionExecutor::from_config(&config, gateway.clone(), toolchains);

    if !config.isolation.enabled {
        warn!("Process isolation is disabled; submissions run with the server's privileges");
    }
    info!(
        workspace_root = %config.workspace_root.display(),
        compile_timeout_ms = config.compile_timeout_ms,
        test_timeout_ms = config.test_timeout_ms,
        output_limit_bytes = config.output_limit_bytes,
        max_parallel_tests = config.max_parallel_tests,
        "Judge configured"
    );

    let state = Arc::new(AppState { gateway, executor });
    let app = routes::routes().with_state(state);

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;
    info!("HTTP server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    warn!("Received shutdown signal, draining in-flight requests...");
}
