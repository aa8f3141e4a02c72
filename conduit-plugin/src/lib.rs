pub mod adapter;
pub mod pipeline;
pub mod plugin;

pub use adapter::Adapter;
pub use pipeline::Pipeline;
pub use plugin::{NoopMeter, NoopTracer, Plugin, PluginInstance};
