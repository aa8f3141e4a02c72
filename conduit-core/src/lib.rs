pub mod category;
pub mod config;
pub mod error;
pub mod flow;
pub mod wire;

pub use category::{props_for_category, Category, CategoryProperties, ExecutionMode, ORDERED_CATEGORIES};
pub use config::{HostConfig, ManagerConfig, PluginSpec};
pub use error::{ConduitError, Result};
pub use flow::{Capabilities, Flow};
pub use wire::{HttpRequest, HttpResponse, Metadata, Payload, PluginConfig, TelemetryConfig};
