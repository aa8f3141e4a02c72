use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use conduit_core::{Capabilities, ConduitError, HttpResponse, Metadata, Payload, PluginConfig, Result};
use conduit_rpc::{
    RpcClient, METHOD_CHECK_HEALTH, METHOD_CHECK_READY, METHOD_CONFIGURE, METHOD_GET_CAPABILITIES,
    METHOD_GET_METADATA, METHOD_HANDLE_REQUEST, METHOD_HANDLE_RESPONSE, METHOD_STOP,
};

use crate::plugin::Plugin;

/// Exposes a remote, RPC-backed plugin as a host-internal [`Plugin`].
///
/// Metadata and capabilities are fetched once at construction and cached;
/// reads of them never block or fail afterwards.
pub struct Adapter {
    client: Arc<RpcClient>,
    metadata: Metadata,
    capabilities: Capabilities,
    call_timeout: Duration,
}

impl Adapter {
    /// Performs the `GetMetadata` / `GetCapabilities` handshake. Rejects a
    /// plugin whose capability set normalises to empty.
    pub async fn new(client: Arc<RpcClient>, call_timeout: Duration) -> Result<Self> {
        let metadata_value = client
            .call(METHOD_GET_METADATA, &serde_json::json!({}), call_timeout)
            .await
            .map_err(|e| ConduitError::HandshakeFailed(e.to_string()))?;
        let metadata: Metadata = serde_json::from_value(metadata_value)?;

        let capabilities_value = client
            .call(METHOD_GET_CAPABILITIES, &serde_json::json!({}), call_timeout)
            .await
            .map_err(|e| ConduitError::HandshakeFailed(e.to_string()))?;
        let flows: Vec<String> = serde_json::from_value(
            capabilities_value
                .get("flows")
                .cloned()
                .unwrap_or(serde_json::Value::Array(Vec::new())),
        )?;
        let capabilities = Capabilities::from_wire_flows(&flows);
        if capabilities.is_empty() {
            return Err(ConduitError::EmptyCapabilities(metadata.name.clone()));
        }

        Ok(Self {
            client,
            metadata,
            capabilities,
            call_timeout,
        })
    }
}

#[async_trait]
impl Plugin for Adapter {
    fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    async fn configure(&self, config: PluginConfig) -> Result<()> {
        self.client.call(METHOD_CONFIGURE, &config, self.call_timeout).await?;
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.client
            .call(METHOD_STOP, &serde_json::json!({}), self.call_timeout)
            .await?;
        Ok(())
    }

    async fn health(&self) -> Result<()> {
        self.client
            .call(METHOD_CHECK_HEALTH, &serde_json::json!({}), self.call_timeout)
            .await?;
        Ok(())
    }

    async fn ready(&self) -> Result<bool> {
        self.client
            .call(METHOD_CHECK_READY, &serde_json::json!({}), self.call_timeout)
            .await?;
        Ok(true)
    }

    async fn handle_request(&self, payload: Payload) -> Result<HttpResponse> {
        let req = payload.into_request()?;
        let value = self
            .client
            .call(METHOD_HANDLE_REQUEST, &req, self.call_timeout)
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn handle_response(&self, payload: Payload) -> Result<HttpResponse> {
        let resp = payload.into_response()?;
        let value = self
            .client
            .call(METHOD_HANDLE_RESPONSE, &resp, self.call_timeout)
            .await?;
        Ok(serde_json::from_value(value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_core::Flow;
    use conduit_rpc::{serve, Conn, RpcHandler};
    use serde_json::Value;

    struct FixtureHandler;

    #[async_trait]
    impl RpcHandler for FixtureHandler {
        async fn handle(&self, method: &str, _payload: Value) -> std::result::Result<Value, String> {
            match method {
                "GetMetadata" => Ok(serde_json::json!({
                    "name": "fixture",
                    "version": "0.1.0",
                    "description": "test fixture",
                    "commit_hash": "deadbeef",
                    "build_date": "2026-01-01",
                })),
                "GetCapabilities" => Ok(serde_json::json!({"flows": ["FLOW_REQUEST", "FLOW_RESPONSE"]})),
                "HandleRequest" => Ok(serde_json::json!({
                    "status_code": 200,
                    "headers": {},
                    "body": [],
                    "continue": true,
                    "modified_request": null,
                })),
                other => Err(format!("unhandled method {other}")),
            }
        }
    }

    async fn connected_pair() -> (Conn, Conn) {
        // duplex does not satisfy Conn's shape, so this test spawns a local
        // TCP loopback pair instead, exercising the real transport path.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accept = tokio::spawn(async move { listener.accept().await.unwrap().0 });
        let client = tokio::net::TcpStream::connect(addr).await.unwrap();
        let server = accept.await.unwrap();
        (Conn::Tcp(client), Conn::Tcp(server))
    }

    #[tokio::test]
    async fn adapter_caches_metadata_and_capabilities_at_construction() {
        let (client_conn, server_conn) = connected_pair().await;
        tokio::spawn(async move {
            let _ = serve(server_conn, &FixtureHandler).await;
        });

        let client = Arc::new(RpcClient::new(client_conn));
        let adapter = Adapter::new(client, Duration::from_secs(1)).await.unwrap();

        assert_eq!(adapter.metadata().name, "fixture");
        assert!(adapter.capabilities().contains(Flow::Request));
        assert!(adapter.capabilities().contains(Flow::Response));
    }

    #[tokio::test]
    async fn handle_request_rejects_response_payload() {
        let (client_conn, server_conn) = connected_pair().await;
        tokio::spawn(async move {
            let _ = serve(server_conn, &FixtureHandler).await;
        });

        let client = Arc::new(RpcClient::new(client_conn));
        let adapter = Adapter::new(client, Duration::from_secs(1)).await.unwrap();

        let err = adapter
            .handle_request(Payload::Response(HttpResponse::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, ConduitError::InvalidRequestType));
    }
}
