use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use conduit_plugin::Pipeline;
use http::{Request, Response, StatusCode};
use tower::Service;
use tracing::error;

use crate::conversions::{record_response, request_to_wire, status_response, wire_to_http_response};

type BoxError = Box<dyn std::error::Error + Send + Sync>;
type BoxFuture = Pin<Box<dyn Future<Output = Result<Response<Body>, BoxError>> + Send>>;

/// Wraps an inner [`tower::Service`], running its request through the
/// pipeline's REQUEST flow before calling it and through the RESPONSE flow
/// before returning its reply.
#[derive(Clone)]
pub struct PipelineService<S> {
    inner: S,
    pipeline: Arc<Pipeline>,
}

impl<S> PipelineService<S> {
    pub fn new(inner: S, pipeline: Arc<Pipeline>) -> Self {
        Self { inner, pipeline }
    }
}

impl<S> Service<Request<Body>> for PipelineService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
    S::Error: Into<BoxError>,
{
    type Response = Response<Body>;
    type Error = BoxError;
    type Future = BoxFuture;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let pipeline = Arc::clone(&self.pipeline);
        // `Service::call` requires `&mut self`, but the returned future must
        // be independent of that borrow; swap in a clone per tower's
        // standard "clone-then-move" pattern for boxed-future services.
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let (wire_req, restored_req) = match request_to_wire(req).await {
                Ok(pair) => pair,
                Err(e) => {
                    error!(error = %e, "failed to convert request to wire form");
                    return Ok(status_response(StatusCode::INTERNAL_SERVER_ERROR));
                }
            };

            let request_outcome = match pipeline.run_request(wire_req).await {
                Ok(resp) => resp,
                Err(e) => {
                    error!(error = %e, "pipeline failed on request flow");
                    return Ok(status_response(StatusCode::SERVICE_UNAVAILABLE));
                }
            };

            if !request_outcome.continue_ {
                return Ok(wire_to_http_response(request_outcome));
            }

            let inner_response = inner.call(restored_req).await.map_err(Into::into)?;
            let (wire_resp, restored_resp) = match record_response(inner_response).await {
                Ok(pair) => pair,
                Err(e) => {
                    error!(error = %e, "failed to convert response to wire form");
                    return Ok(status_response(StatusCode::INTERNAL_SERVER_ERROR));
                }
            };

            let response_outcome = match pipeline.run_response(wire_resp).await {
                Ok(resp) => resp,
                Err(e) => {
                    error!(error = %e, "pipeline failed on response flow");
                    return Ok(status_response(StatusCode::SERVICE_UNAVAILABLE));
                }
            };

            if !response_outcome.continue_ {
                Ok(wire_to_http_response(response_outcome))
            } else {
                Ok(restored_resp)
            }
        })
    }
}
