use std::time::Duration;

use async_trait::async_trait;
use conduit_rpc::{dial, generate_address, serve, NetworkKind, RpcClient, RpcHandler};
use serde_json::Value;
use tokio::net::TcpListener;

struct EchoHandler;

#[async_trait]
impl RpcHandler for EchoHandler {
    async fn handle(&self, method: &str, payload: Value) -> Result<Value, String> {
        match method {
            "CheckHealth" => Ok(serde_json::json!({"healthy": true})),
            "fail" => Err("nope".to_string()),
            other => Ok(serde_json::json!({"method": other, "payload": payload})),
        }
    }
}

#[cfg(not(windows))]
#[tokio::test]
async fn full_round_trip_over_a_unix_socket() {
    let address = generate_address("roundtrip-test").await.unwrap();
    assert_eq!(address.kind, NetworkKind::Unix);

    let listener = tokio::net::UnixListener::bind(&address.address).unwrap();
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        serve(stream, &EchoHandler).await.unwrap();
    });

    let conn = dial(&address).await.unwrap();
    let client = RpcClient::new(conn);

    let health = client
        .call("CheckHealth", &serde_json::json!({}), Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(health["healthy"], true);

    let echoed = client
        .call("HandleRequest", &serde_json::json!({"path": "/x"}), Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(echoed["payload"]["path"], "/x");

    let err = client
        .call("fail", &serde_json::json!({}), Duration::from_secs(1))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("nope"));

    drop(client);
    let _ = tokio::time::timeout(Duration::from_secs(1), server).await;
    let _ = std::fs::remove_file(&address.address);
}

#[tokio::test]
async fn full_round_trip_over_tcp() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let local_addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        serve(stream, &EchoHandler).await.unwrap();
    });

    let address = conduit_rpc::TransportAddress {
        kind: NetworkKind::Tcp,
        address: local_addr.to_string(),
    };
    let conn = dial(&address).await.unwrap();
    let client = RpcClient::new(conn);

    let health = client
        .call("CheckHealth", &serde_json::json!({}), Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(health["healthy"], true);

    drop(client);
    let _ = tokio::time::timeout(Duration::from_secs(1), server).await;
}
