use std::sync::Arc;

use conduit_plugin::Pipeline;
use tower::Layer;

use crate::service::PipelineService;

/// `tower::Layer` that installs [`PipelineService`] in front of a service.
#[derive(Clone)]
pub struct PipelineLayer {
    pipeline: Arc<Pipeline>,
}

impl PipelineLayer {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self { pipeline }
    }
}

impl<S> Layer<S> for PipelineLayer {
    type Service = PipelineService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        PipelineService::new(inner, Arc::clone(&self.pipeline))
    }
}
