use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{ConduitError, Result};

/// Plugin identity, fetched once at handshake and never refreshed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Metadata {
    pub name: String,
    pub version: String,
    pub description: String,
    pub commit_hash: String,
    pub build_date: String,
}

/// An HTTP request in its wire representation.
///
/// Headers are first-value-only: a plugin that sends multiple values for
/// the same header name loses all but the first when this is built from
/// a real `http::HeaderMap`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    pub remote_addr: String,
    pub request_uri: String,
}

/// An HTTP response in its wire representation.
///
/// `status_code = 0` is the sentinel for "no status set". `continue_` being
/// `false` means short-circuit: the host writes this response verbatim and
/// runs no further plugins.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HttpResponse {
    pub status_code: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    #[serde(rename = "continue")]
    pub continue_: bool,
    pub modified_request: Option<HttpRequest>,
}

impl HttpResponse {
    /// The "no plugin objected, proceed" response the pipeline synthesises
    /// when a flow produced no wire response of its own.
    pub fn pass_through() -> Self {
        Self {
            continue_: true,
            ..Default::default()
        }
    }
}

/// The opaque payload `HandleRequest`/`HandleResponse` operate on, modeled
/// as a sum type rather than an unconstrained `any`.
#[derive(Debug, Clone)]
pub enum Payload {
    Request(HttpRequest),
    Response(HttpResponse),
}

impl Payload {
    pub fn into_request(self) -> Result<HttpRequest> {
        match self {
            Payload::Request(req) => Ok(req),
            Payload::Response(_) => Err(ConduitError::InvalidRequestType),
        }
    }

    pub fn into_response(self) -> Result<HttpResponse> {
        match self {
            Payload::Response(resp) => Ok(resp),
            Payload::Request(_) => Err(ConduitError::InvalidResponseType),
        }
    }

    pub fn as_request(&self) -> Result<&HttpRequest> {
        match self {
            Payload::Request(req) => Ok(req),
            Payload::Response(_) => Err(ConduitError::InvalidRequestType),
        }
    }
}

impl From<HttpRequest> for Payload {
    fn from(req: HttpRequest) -> Self {
        Payload::Request(req)
    }
}

impl From<HttpResponse> for Payload {
    fn from(resp: HttpResponse) -> Self {
        Payload::Response(resp)
    }
}

/// OTLP export settings handed to every plugin at `Configure` time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default)]
    pub otlp_endpoint: String,
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_environment")]
    pub environment: String,
    #[serde(default = "default_sample_ratio")]
    pub sample_ratio: f64,
}

fn default_service_name() -> String {
    "conduit-host".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_sample_ratio() -> f64 {
    1.0
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            otlp_endpoint: String::new(),
            service_name: default_service_name(),
            environment: default_environment(),
            sample_ratio: default_sample_ratio(),
        }
    }
}

/// Configuration forwarded verbatim to a plugin's `Configure` RPC.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginConfig {
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub custom: HashMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pass_through_continues_with_no_status() {
        let resp = HttpResponse::pass_through();
        assert!(resp.continue_);
        assert_eq!(resp.status_code, 0);
    }

    #[test]
    fn payload_rejects_wrong_variant() {
        let payload = Payload::Response(HttpResponse::default());
        assert!(matches!(
            payload.into_request(),
            Err(ConduitError::InvalidRequestType)
        ));
    }

    #[test]
    fn telemetry_defaults_are_sane() {
        let cfg = TelemetryConfig::default();
        assert_eq!(cfg.sample_ratio, 1.0);
        assert_eq!(cfg.service_name, "conduit-host");
        assert!(cfg.otlp_endpoint.is_empty());
    }
}
