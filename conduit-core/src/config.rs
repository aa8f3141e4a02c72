use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::category::Category;
use crate::error::Result;
use crate::wire::TelemetryConfig;

/// Top-level configuration for the Conduit plugin host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    #[serde(default)]
    pub manager: ManagerConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Registration-time metadata for each discovered plugin binary,
    /// keyed by file name (as returned by the directory scan in
    /// `conduit-server::discovery`).
    #[serde(default)]
    pub plugins: Vec<PluginSpec>,
}

/// How a discovered binary should be registered into the pipeline.
///
/// The binary itself only reports `Metadata`/`Capabilities`; the category
/// and `required` flag are host policy, supplied here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginSpec {
    pub file_name: String,
    pub category: Category,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Directory scanned for executable plugin binaries.
    #[serde(default = "default_plugin_dir")]
    pub plugin_dir: PathBuf,

    /// Overall budget for a plugin to bind its transport address.
    #[serde(default = "default_start_timeout_ms")]
    pub start_timeout_ms: u64,

    /// Per-RPC-call deadline during startup and normal operation.
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,

    /// Budget for the `Stop` RPC during shutdown.
    #[serde(default = "default_stop_rpc_timeout_ms")]
    pub stop_rpc_timeout_ms: u64,

    /// How long to wait for graceful process exit before force-killing.
    #[serde(default = "default_stop_exit_wait_ms")]
    pub stop_exit_wait_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
}

impl ManagerConfig {
    pub fn start_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.start_timeout_ms)
    }

    pub fn call_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.call_timeout_ms)
    }

    pub fn stop_rpc_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.stop_rpc_timeout_ms)
    }

    pub fn stop_exit_wait(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.stop_exit_wait_ms)
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            plugin_dir: default_plugin_dir(),
            start_timeout_ms: default_start_timeout_ms(),
            call_timeout_ms: default_call_timeout_ms(),
            stop_rpc_timeout_ms: default_stop_rpc_timeout_ms(),
            stop_exit_wait_ms: default_stop_exit_wait_ms(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            manager: ManagerConfig::default(),
            telemetry: TelemetryConfig::default(),
            http: HttpConfig::default(),
            log_level: default_log_level(),
            plugins: Vec::new(),
        }
    }
}

fn default_plugin_dir() -> PathBuf {
    PathBuf::from("plugins")
}

fn default_start_timeout_ms() -> u64 {
    10_000
}

fn default_call_timeout_ms() -> u64 {
    5_000
}

fn default_stop_rpc_timeout_ms() -> u64 {
    5_000
}

fn default_stop_exit_wait_ms() -> u64 {
    2_000
}

fn default_listen_addr() -> SocketAddr {
    "127.0.0.1:8080".parse().expect("valid default listen address")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl HostConfig {
    /// Load configuration from an optional YAML file, overridden by
    /// `CONDUIT_`-prefixed environment variables (double underscore splits
    /// nested keys, e.g. `CONDUIT_MANAGER__START_TIMEOUT_MS`).
    pub fn load(config_path: Option<&std::path::Path>) -> Result<Self> {
        let mut figment = Figment::from(figment::providers::Serialized::defaults(
            HostConfig::default(),
        ));

        if let Some(path) = config_path {
            figment = figment.merge(Yaml::file(path));
        }

        figment = figment.merge(Env::prefixed("CONDUIT_").split("__"));

        Ok(figment.extract()?)
    }

    pub fn start_timeout(&self) -> std::time::Duration {
        self.manager.start_timeout()
    }

    pub fn call_timeout(&self) -> std::time::Duration {
        self.manager.call_timeout()
    }

    pub fn stop_rpc_timeout(&self) -> std::time::Duration {
        self.manager.stop_rpc_timeout()
    }

    pub fn stop_exit_wait(&self) -> std::time::Duration {
        self.manager.stop_exit_wait()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_load_without_a_file() {
        let config = HostConfig::load(None).unwrap();
        assert_eq!(config.manager.start_timeout_ms, 10_000);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn env_override_splits_nested_keys() {
        // SAFETY: test runs single-threaded within this process for this var.
        unsafe {
            std::env::set_var("CONDUIT_MANAGER__START_TIMEOUT_MS", "42");
        }
        let config = HostConfig::load(None).unwrap();
        unsafe {
            std::env::remove_var("CONDUIT_MANAGER__START_TIMEOUT_MS");
        }
        assert_eq!(config.manager.start_timeout_ms, 42);
    }
}
