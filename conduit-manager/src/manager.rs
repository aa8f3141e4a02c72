use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;

use conduit_core::{ConduitError, ManagerConfig, Result};
use conduit_plugin::{Adapter, Plugin, PluginInstance};
use conduit_rpc::{dial, generate_address, NetworkKind, RpcClient, TransportAddress};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::time::{sleep, timeout, Duration, Instant};
use tracing::{debug, error, info, warn};

struct RunningPlugin {
    instance: PluginInstance,
    child: Child,
    address: TransportAddress,
}

/// Owns every plugin subprocess and its transport resources for the life
/// of the host. `Start`/`StopAll` hold the running-plugin map only across
/// their own updates, not for the duration of the RPC calls they make.
pub struct Manager {
    config: ManagerConfig,
    running: Mutex<HashMap<String, RunningPlugin>>,
}

impl Manager {
    pub fn new(config: ManagerConfig) -> Self {
        Self {
            config,
            running: Mutex::new(HashMap::new()),
        }
    }

    /// Spawn `binary_path`, wait for it to bind its address, and hand back
    /// a [`PluginInstance`] ready for pipeline registration. Any failure
    /// along the way kills the child and closes the transport; other
    /// already-started plugins are unaffected.
    pub async fn start(&self, binary_path: &Path) -> Result<PluginInstance> {
        self.start_with_args(binary_path, &[]).await
    }

    /// Like [`Manager::start`], but forwards `extra_args` to the spawned
    /// process after the standard `--address`/`--network` pair. Plugin
    /// discovery never needs this; it exists so tests can start a fixture
    /// binary in a non-default mode (e.g. a plugin that ignores `Stop`)
    /// through the real startup/teardown path instead of spawning it by
    /// hand.
    pub async fn start_with_args(&self, binary_path: &Path, extra_args: &[&str]) -> Result<PluginInstance> {
        let name_hint = binary_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "plugin".to_string());

        let address = generate_address(&name_hint).await?;

        let mut command = Command::new(binary_path);
        command
            .arg("--address")
            .arg(&address.address)
            .arg("--network")
            .arg(address.kind.as_flag())
            .args(extra_args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = command.spawn()?;
        pipe_output_to_tracing(&mut child, &name_hint);

        let conn = match self.wait_for_bind(&address).await {
            Ok(conn) => conn,
            Err(e) => {
                let _ = child.start_kill();
                return Err(e);
            }
        };

        let client = Arc::new(RpcClient::new(conn));
        let adapter = match Adapter::new(client, self.config.call_timeout()).await {
            Ok(adapter) => adapter,
            Err(e) => {
                let _ = child.start_kill();
                return Err(e);
            }
        };

        let name = adapter.metadata().name.clone();
        let plugin: Arc<dyn Plugin> = Arc::new(adapter);
        let instance = PluginInstance::new(plugin);

        let mut running = self.running.lock().await;
        running.insert(
            name.clone(),
            RunningPlugin {
                instance: instance.clone(),
                child,
                address,
            },
        );
        drop(running);

        info!(plugin = %name, "plugin started");
        Ok(instance)
    }

    /// Currently running plugins, in no particular order.
    pub async fn plugins(&self) -> Vec<PluginInstance> {
        self.running
            .lock()
            .await
            .values()
            .map(|r| r.instance.clone())
            .collect()
    }

    /// Stop and tear down every running plugin. Idempotent: a second call
    /// on an already-empty map returns `Ok(())` immediately. Returns a
    /// joined error only if a force-kill itself fails.
    pub async fn stop_all(&self) -> Result<()> {
        let snapshot: Vec<(String, RunningPlugin)> = {
            let mut running = self.running.lock().await;
            running.drain().collect()
        };

        let mut kill_failures = Vec::new();
        for (name, entry) in snapshot {
            self.stop_one(name, entry, &mut kill_failures).await;
        }

        if kill_failures.is_empty() {
            Ok(())
        } else {
            Err(ConduitError::from_many(kill_failures))
        }
    }

    async fn stop_one(&self, name: String, mut entry: RunningPlugin, kill_failures: &mut Vec<ConduitError>) {
        match timeout(self.config.stop_rpc_timeout(), entry.instance.plugin.stop()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(plugin = %name, error = %e, "stop RPC failed (non-fatal)"),
            Err(_) => warn!(plugin = %name, "stop RPC timed out (non-fatal)"),
        }

        // Drop our reference to the adapter so its RPC connection closes;
        // the pipeline may still hold its own Arc, which is fine — this
        // only releases the manager's handle.
        drop(entry.instance);

        match timeout(self.config.stop_exit_wait(), entry.child.wait()).await {
            Ok(Ok(status)) => debug!(plugin = %name, %status, "plugin exited"),
            Ok(Err(e)) => warn!(plugin = %name, error = %e, "error waiting on plugin exit"),
            Err(_) => {
                warn!(plugin = %name, "plugin did not exit in time, force-killing");
                if let Err(e) = entry.child.start_kill() {
                    error!(plugin = %name, error = %e, "force-kill failed");
                    kill_failures.push(ConduitError::Io(e));
                } else {
                    let _ = entry.child.wait().await;
                }
            }
        }

        if entry.address.kind == NetworkKind::Unix {
            let _ = std::fs::remove_file(&entry.address.address);
        }
    }

    async fn wait_for_bind(&self, address: &TransportAddress) -> Result<conduit_rpc::Conn> {
        let deadline = Instant::now() + self.config.start_timeout();
        loop {
            if Instant::now() >= deadline {
                return Err(ConduitError::StartTimeout(self.config.start_timeout()));
            }
            match timeout(Duration::from_millis(100), dial(address)).await {
                Ok(Ok(conn)) => return Ok(conn),
                _ => sleep(Duration::from_millis(50)).await,
            }
        }
    }
}

fn pipe_output_to_tracing(child: &mut Child, plugin_name: &str) {
    if let Some(stdout) = child.stdout.take() {
        let name = plugin_name.to_string();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(plugin = %name, "{line}");
            }
        });
    }
    if let Some(stderr) = child.stderr.take() {
        let name = plugin_name.to_string();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                warn!(plugin = %name, "{line}");
            }
        });
    }
}
