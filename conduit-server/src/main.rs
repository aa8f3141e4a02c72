mod discovery;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use clap::Parser;
use conduit_core::HostConfig;
use conduit_manager::Manager;
use conduit_middleware::PipelineLayer;
use conduit_plugin::{Pipeline, PluginInstance};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Set by the signal handler; polled by the shutdown-watcher task.
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

#[derive(Parser, Debug)]
#[command(name = "conduit", version, about = "Conduit — subprocess plugin host for HTTP middleware pipelines")]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(long, default_value = "conduit.yaml")]
    config: PathBuf,

    /// Log level, used unless RUST_LOG is set.
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Directory scanned for executable plugin binaries. Overrides the
    /// value in the config file when given.
    #[arg(long)]
    plugin_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level)),
        )
        .with_target(false)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "conduit starting");

    let config_path = cli.config.exists().then_some(cli.config.as_path());
    let mut config = HostConfig::load(config_path)?;
    if let Some(plugin_dir) = cli.plugin_dir {
        config.manager.plugin_dir = plugin_dir;
    }
    info!(plugin_dir = %config.manager.plugin_dir.display(), "configuration loaded");

    let manager = Arc::new(Manager::new(config.manager.clone()));
    let pipeline = Arc::new(Pipeline::new());

    let binaries = discovery::discover_plugins(&config.manager.plugin_dir).unwrap_or_else(|e| {
        warn!(error = %e, dir = %config.manager.plugin_dir.display(), "plugin directory unreadable, starting with no plugins");
        Vec::new()
    });

    for binary in &binaries {
        let file_name = binary.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        let Some(spec) = config.plugins.iter().find(|p| p.file_name == file_name) else {
            info!(plugin = file_name, "discovered binary has no matching entry in config, skipping");
            continue;
        };

        match manager.start(binary).await {
            Ok(instance) => {
                let instance: PluginInstance = instance.required(spec.required);
                info!(plugin = %instance.id, category = ?spec.category, required = spec.required, "plugin registered");
                pipeline.register(spec.category.clone(), instance).await;
            }
            Err(e) => {
                error!(plugin = file_name, error = %e, "failed to start plugin");
                if spec.required {
                    manager.stop_all().await?;
                    return Err(e.into());
                }
            }
        }
    }

    let app = Router::new()
        .route("/", get(echo))
        .layer(PipelineLayer::new(Arc::clone(&pipeline)))
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(config.http.listen_addr).await?;
    info!(addr = %config.http.listen_addr, "conduit is ready — serving traffic");

    setup_signal_handler();
    let shutdown_manager = Arc::clone(&manager);

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown())
        .await?;

    info!("shutdown signal received, stopping plugins");
    shutdown_manager.stop_all().await?;
    info!("conduit stopped");
    Ok(())
}

async fn echo() -> &'static str {
    "conduit"
}

async fn wait_for_shutdown() {
    while !SHUTDOWN.load(Ordering::Relaxed) {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }
}

fn setup_signal_handler() {
    for sig in [libc::SIGTERM, libc::SIGINT] {
        unsafe {
            libc::signal(sig, signal_handler as libc::sighandler_t);
        }
    }
}

extern "C" fn signal_handler(_sig: libc::c_int) {
    SHUTDOWN.store(true, Ordering::Relaxed);
}
