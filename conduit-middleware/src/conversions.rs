use std::collections::HashMap;

use axum::body::Body;
use conduit_core::{ConduitError, HttpRequest as WireRequest, HttpResponse as WireResponse, Result};
use http::{HeaderMap, Request, Response, StatusCode};
use http_body_util::BodyExt;

/// Buffer `req`'s body into memory and build both the wire request the
/// pipeline operates on and a fresh `http::Request` with the body restored
/// for the downstream handler.
pub async fn request_to_wire(req: Request<Body>) -> Result<(WireRequest, Request<Body>)> {
    let (parts, body) = req.into_parts();
    let bytes = body
        .collect()
        .await
        .map_err(|e| ConduitError::Io(std::io::Error::other(e.to_string())))?
        .to_bytes();

    let headers = flatten_headers(&parts.headers);
    let remote_addr = parts
        .extensions
        .get::<std::net::SocketAddr>()
        .map(|a| a.to_string())
        .unwrap_or_default();
    let url = parts.uri.to_string();

    let wire = WireRequest {
        method: parts.method.to_string(),
        url: url.clone(),
        path: parts.uri.path().to_string(),
        headers,
        body: bytes.to_vec(),
        remote_addr,
        request_uri: url,
    };

    let restored = Request::from_parts(parts, Body::from(bytes));
    Ok((wire, restored))
}

/// Buffer `resp`'s body into memory and build both the wire response the
/// pipeline operates on and a fresh `http::Response` with the body restored.
pub async fn record_response(resp: Response<Body>) -> Result<(WireResponse, Response<Body>)> {
    let (parts, body) = resp.into_parts();
    let bytes = body
        .collect()
        .await
        .map_err(|e| ConduitError::Io(std::io::Error::other(e.to_string())))?
        .to_bytes();

    let wire = WireResponse {
        status_code: parts.status.as_u16(),
        headers: flatten_headers(&parts.headers),
        body: bytes.to_vec(),
        continue_: true,
        modified_request: None,
    };

    let restored = Response::from_parts(parts, Body::from(bytes));
    Ok((wire, restored))
}

/// Build an `http::Response` directly from a plugin's short-circuit reply.
pub fn wire_to_http_response(wire: WireResponse) -> Response<Body> {
    let status = StatusCode::from_u16(wire.status_code).unwrap_or(StatusCode::OK);
    let mut builder = Response::builder().status(status);
    for (name, value) in wire.headers {
        builder = builder.header(name, value);
    }
    builder
        .body(Body::from(wire.body))
        .unwrap_or_else(|_| Response::new(Body::empty()))
}

pub fn status_response(status: StatusCode) -> Response<Body> {
    Response::builder()
        .status(status)
        .body(Body::empty())
        .expect("static status response is always well-formed")
}

/// First-value-only flattening: a header sent multiple times keeps only
/// the first value the wire format carries.
fn flatten_headers(headers: &HeaderMap) -> HashMap<String, String> {
    let mut out = HashMap::new();
    for (name, value) in headers.iter() {
        out.entry(name.to_string())
            .or_insert_with(|| value.to_str().unwrap_or_default().to_string());
    }
    out
}
