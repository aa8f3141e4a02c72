use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const METHOD_GET_METADATA: &str = "GetMetadata";
pub const METHOD_GET_CAPABILITIES: &str = "GetCapabilities";
pub const METHOD_CONFIGURE: &str = "Configure";
pub const METHOD_STOP: &str = "Stop";
pub const METHOD_CHECK_HEALTH: &str = "CheckHealth";
pub const METHOD_CHECK_READY: &str = "CheckReady";
pub const METHOD_HANDLE_REQUEST: &str = "HandleRequest";
pub const METHOD_HANDLE_RESPONSE: &str = "HandleResponse";

/// One RPC call, as a single length-prefixed JSON frame.
///
/// `id` is a per-connection correlation number the caller picks and the
/// reply echoes back, so several calls can be outstanding on the same
/// connection at once instead of waiting in line for each other's reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub id: u64,
    pub method: String,
    #[serde(default)]
    pub payload: Value,
}

/// The reply to an [`RpcRequest`], as a single length-prefixed JSON frame.
/// `id` matches the request this answers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub id: u64,
    pub result: RpcResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RpcResult {
    Ok(Value),
    Err(String),
}
