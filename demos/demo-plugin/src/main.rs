use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::Parser;
use clap::ValueEnum;
use conduit_core::HttpResponse;
use conduit_rpc::{serve, RpcHandler};
use serde_json::Value;
use tracing::{info, warn};

/// How this fixture plugin reacts to `HandleRequest`/`Stop`, selected by
/// the test harness that spawned it.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Behavior {
    /// Respond `continue = true` to every request, unchanged.
    Echo,
    /// Short-circuit every request with a fixed status code.
    Reject,
    /// Return a `modifiedRequest` with `/mutated` appended to the path.
    Mutate,
    /// Fail every request call with an RPC error.
    Fail,
    /// Answer `Stop` but never actually exit, to exercise the manager's
    /// force-kill path.
    HangOnStop,
}

#[derive(Debug, Parser)]
struct Cli {
    #[arg(long)]
    address: String,

    #[arg(long, value_enum)]
    network: Network,

    #[arg(long, value_enum, default_value = "echo")]
    behavior: Behavior,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Network {
    Unix,
    Tcp,
}

struct FixtureHandler {
    behavior: Behavior,
    stopping: Arc<AtomicBool>,
}

#[async_trait]
impl RpcHandler for FixtureHandler {
    async fn handle(&self, method: &str, payload: Value) -> Result<Value, String> {
        match method {
            "GetMetadata" => Ok(serde_json::json!({
                "name": format!("demo-plugin-{:?}", self.behavior).to_lowercase(),
                "version": env!("CARGO_PKG_VERSION"),
                "description": "test fixture plugin",
                "commit_hash": "fixture",
                "build_date": "fixture",
            })),
            "GetCapabilities" => Ok(serde_json::json!({"flows": ["FLOW_REQUEST", "FLOW_RESPONSE"]})),
            "Configure" => Ok(serde_json::json!({})),
            "CheckHealth" => Ok(serde_json::json!({})),
            "CheckReady" => Ok(serde_json::json!({})),
            "Stop" => {
                if !matches!(self.behavior, Behavior::HangOnStop) {
                    self.stopping.store(true, Ordering::SeqCst);
                }
                Ok(serde_json::json!({}))
            }
            "HandleRequest" => self.handle_request(payload),
            "HandleResponse" => self.handle_response(payload),
            other => Err(format!("unknown method {other}")),
        }
    }
}

impl FixtureHandler {
    fn handle_request(&self, payload: Value) -> Result<Value, String> {
        match self.behavior {
            Behavior::Fail => Err("fixture configured to fail".to_string()),
            Behavior::Reject => Ok(serde_json::to_value(HttpResponse {
                status_code: 403,
                continue_: false,
                ..Default::default()
            })
            .unwrap()),
            Behavior::Mutate => {
                let mut req: conduit_core::HttpRequest =
                    serde_json::from_value(payload).map_err(|e| e.to_string())?;
                req.path = format!("{}/mutated", req.path);
                Ok(serde_json::to_value(HttpResponse {
                    continue_: true,
                    modified_request: Some(req),
                    ..Default::default()
                })
                .unwrap())
            }
            Behavior::Echo | Behavior::HangOnStop => {
                Ok(serde_json::to_value(HttpResponse::pass_through()).unwrap())
            }
        }
    }

    fn handle_response(&self, _payload: Value) -> Result<Value, String> {
        match self.behavior {
            Behavior::Fail => Err("fixture configured to fail".to_string()),
            _ => Ok(serde_json::to_value(HttpResponse::pass_through()).unwrap()),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::new("info")
        }))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let stopping = Arc::new(AtomicBool::new(false));
    let handler = Arc::new(FixtureHandler {
        behavior: cli.behavior,
        stopping: Arc::clone(&stopping),
    });

    info!(address = %cli.address, network = ?cli.network, "demo-plugin binding");

    match cli.network {
        Network::Tcp => {
            let listener = tokio::net::TcpListener::bind(&cli.address).await?;
            let (stream, _) = listener.accept().await?;
            run_connection(stream, handler, stopping).await;
        }
        Network::Unix => {
            let _ = std::fs::remove_file(&cli.address);
            let listener = tokio::net::UnixListener::bind(&cli.address)?;
            let (stream, _) = listener.accept().await?;
            run_connection(stream, handler, stopping).await;
        }
    }

    Ok(())
}

async fn run_connection<C>(conn: C, handler: Arc<FixtureHandler>, stopping: Arc<AtomicBool>)
where
    C: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    let watcher = tokio::spawn(async move {
        loop {
            if stopping.load(Ordering::SeqCst) {
                // Give the Stop response a moment to flush before exiting.
                tokio::time::sleep(Duration::from_millis(50)).await;
                std::process::exit(0);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    });

    if let Err(e) = serve(conn, handler.as_ref()).await {
        warn!(error = %e, "connection closed with error");
    }
    watcher.abort();
}
