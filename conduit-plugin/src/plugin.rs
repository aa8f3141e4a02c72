use async_trait::async_trait;
use conduit_core::{Capabilities, Metadata, Payload, PluginConfig, Result};

/// A no-op span handle. Plugins own their own telemetry; the host never
/// aggregates spans across plugins, so this only needs to exist so call
/// sites don't need a `cfg` gate around tracing calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl NoopTracer {
    pub fn start_span(&self, _name: &str) {}
}

/// A no-op metrics handle, paired with [`NoopTracer`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMeter;

impl NoopMeter {
    pub fn record(&self, _name: &str, _value: f64) {}
}

/// The host-internal interface to one plugin, whether it is backed by a
/// real subprocess ([`crate::adapter::Adapter`]) or an in-process test
/// double. No inheritance: one flat trait object, `Arc<dyn Plugin>`.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Fetched once at handshake; never refreshed.
    fn metadata(&self) -> &Metadata;

    /// Fetched once at handshake; never refreshed.
    fn capabilities(&self) -> &Capabilities;

    async fn configure(&self, config: PluginConfig) -> Result<()>;

    async fn stop(&self) -> Result<()>;

    async fn health(&self) -> Result<()>;

    async fn ready(&self) -> Result<bool>;

    /// `payload` must be [`Payload::Request`]; anything else is a type error.
    async fn handle_request(&self, payload: Payload) -> Result<conduit_core::HttpResponse>;

    /// `payload` must be [`Payload::Response`]; anything else is a type error.
    async fn handle_response(&self, payload: Payload) -> Result<conduit_core::HttpResponse>;

    fn tracer(&self) -> NoopTracer {
        NoopTracer
    }

    fn meter(&self) -> NoopMeter {
        NoopMeter
    }
}

/// A plugin bound to its pipeline registration details: a stable id for
/// logging/error attribution, whether its failures are fatal regardless of
/// category policy, and the configuration it was started with.
#[derive(Clone)]
pub struct PluginInstance {
    pub id: String,
    pub required: bool,
    pub config: PluginConfig,
    pub plugin: std::sync::Arc<dyn Plugin>,
}

impl PluginInstance {
    pub fn new(plugin: std::sync::Arc<dyn Plugin>) -> Self {
        let id = plugin.metadata().name.clone();
        Self {
            id,
            required: false,
            config: PluginConfig::default(),
            plugin,
        }
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn with_config(mut self, config: PluginConfig) -> Self {
        self.config = config;
        self
    }
}
