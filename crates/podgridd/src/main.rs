//! podgridd: the PodGrid daemon.
//!
//! Single binary that assembles the control plane:
//! - Cluster registry (in memory)
//! - Execution backend (Docker or in-memory)
//! - Liveness monitor
//! - REST API + overview page
//!
//! # Usage
//!
//! ```text
//! podgridd --config podgrid.toml --port 5005
//! podgridd --backend memory --liveness-interval 2s
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use podgrid_backend::{DockerBackend, ExecutionBackend, InMemoryBackend};
use podgrid_core::{BackendConfig, BackendKind, PodgridConfig};
use podgrid_health::LivenessMonitor;
use podgrid_scheduler::ControlPlane;
use podgrid_state::ClusterRegistry;

#[derive(Parser)]
#[command(name = "podgridd", about = "PodGrid control plane daemon")]
struct Cli {
    /// Path to podgrid.toml. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address to bind the API server to.
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on.
    #[arg(long)]
    port: Option<u16>,

    /// Execution backend: docker or memory.
    #[arg(long)]
    backend: Option<BackendKind>,

    /// Liveness check period, e.g. "10s" or "500ms".
    #[arg(long)]
    liveness_interval: Option<String>,
}

impl Cli {
    /// Load the config file (if any) and apply flag overrides.
    fn resolve_config(&self) -> anyhow::Result<PodgridConfig> {
        let mut config = match &self.config {
            Some(path) => PodgridConfig::from_file(path)?,
            None => PodgridConfig::default(),
        };
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(kind) = self.backend {
            config.backend.kind = kind;
        }
        if let Some(interval) = &self.liveness_interval {
            config.liveness.interval = interval.clone();
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,podgridd=debug,podgrid=debug")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.resolve_config()?;
    run(config).await
}

async fn connect_backend(config: &BackendConfig) -> anyhow::Result<Arc<dyn ExecutionBackend>> {
    match config.kind {
        BackendKind::Docker => {
            let docker = DockerBackend::connect(config.image.clone(), config.command.clone())
                .context("connecting to docker")?;
            docker.ping().await.context("docker daemon is not reachable")?;
            info!(image = %config.image, "docker backend connected");
            Ok(Arc::new(docker))
        }
        BackendKind::Memory => {
            warn!("using in-memory backend, nodes are simulated");
            Ok(Arc::new(InMemoryBackend::new()))
        }
    }
}

async fn run(config: PodgridConfig) -> anyhow::Result<()> {
    info!(backend = %config.backend.kind, "PodGrid daemon starting");

    // ── Initialize subsystems ──────────────────────────────────

    let backend = connect_backend(&config.backend).await?;
    let registry = ClusterRegistry::new();
    let control = ControlPlane::new(registry.clone(), backend.clone());

    let interval = config.liveness.interval()?;
    let inspect_timeout = config.liveness.inspect_timeout()?;
    let monitor = LivenessMonitor::new(registry, backend)
        .with_interval(interval)
        .with_inspect_timeout(inspect_timeout);
    info!(?interval, ?inspect_timeout, "liveness monitor initialized");

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Start background tasks ─────────────────────────────────

    let monitor_handle = tokio::spawn(monitor.run(shutdown_rx));

    // ── Start API server ───────────────────────────────────────

    let router = podgrid_api::build_router(control);
    let ip = config
        .server
        .host
        .parse()
        .with_context(|| format!("invalid server.host: {}", config.server.host))?;
    let addr = SocketAddr::new(ip, config.server.port);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "API server listening");

    // Graceful shutdown on Ctrl-C.
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "failed to listen for shutdown signal");
            }
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        })
        .await?;

    // Wait for background tasks.
    let _ = monitor_handle.await;

    info!("PodGrid daemon stopped");
    Ok(())
}
