pub mod conversions;
pub mod layer;
pub mod service;

pub use layer::PipelineLayer;
pub use service::PipelineService;
