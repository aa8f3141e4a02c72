use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use conduit_core::{ConduitError, Result};
use serde::Serialize;
use serde_json::Value;
use tokio::io::WriteHalf;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::conn::Conn;
use crate::framing::{read_frame, write_frame};
use crate::protocol::{RpcRequest, RpcResponse, RpcResult};

type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<RpcResponse>>>>;

/// A client for one plugin subprocess's RPC connection.
///
/// Several calls can be outstanding on the connection at once: each
/// request carries a correlation id, a background task owns the read
/// half and demultiplexes replies to the waiting caller by id, and the
/// write half is only held for as long as it takes to push one frame —
/// not for the whole round trip.
pub struct RpcClient {
    writer: Mutex<WriteHalf<Conn>>,
    pending: Pending,
    next_id: AtomicU64,
    reader_task: JoinHandle<()>,
}

impl RpcClient {
    pub fn new(conn: Conn) -> Self {
        let (reader, writer) = tokio::io::split(conn);
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let reader_pending = pending.clone();
        let reader_task = tokio::spawn(async move {
            let mut reader = reader;
            loop {
                let response: RpcResponse = match read_frame(&mut reader).await {
                    Ok(response) => response,
                    Err(_) => break,
                };
                if let Some(sender) = reader_pending.lock().await.remove(&response.id) {
                    let _ = sender.send(response);
                }
            }
        });

        Self {
            writer: Mutex::new(writer),
            pending,
            next_id: AtomicU64::new(0),
            reader_task,
        }
    }

    /// Send `method` with `payload` and wait up to `call_timeout` for a
    /// reply. Maps a timed-out call and an `Err` response both to
    /// [`ConduitError::Rpc`] — callers that need to distinguish a plugin's
    /// own rejection from a transport failure should fold that in before
    /// this returns.
    pub async fn call<T: Serialize>(
        &self,
        method: &str,
        payload: &T,
        call_timeout: Duration,
    ) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = RpcRequest {
            id,
            method: method.to_string(),
            payload: serde_json::to_value(payload)?,
        };

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let write_result = {
            let mut writer = self.writer.lock().await;
            write_frame(&mut *writer, &request).await
        };
        if let Err(e) = write_result {
            self.pending.lock().await.remove(&id);
            return Err(ConduitError::Io(e));
        }

        match timeout(call_timeout, rx).await {
            Ok(Ok(response)) => response.into_result(),
            Ok(Err(_)) => Err(ConduitError::Rpc(format!(
                "connection closed before a reply to '{method}' arrived"
            ))),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(ConduitError::Rpc(format!("call to '{method}' timed out after {call_timeout:?}")))
            }
        }
    }
}

impl RpcResponse {
    fn into_result(self) -> Result<Value> {
        match self.result {
            RpcResult::Ok(value) => Ok(value),
            RpcResult::Err(message) => Err(ConduitError::Rpc(message)),
        }
    }
}

impl Drop for RpcClient {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}
