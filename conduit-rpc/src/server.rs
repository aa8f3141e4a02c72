use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::framing::{read_frame, write_frame};
use crate::protocol::{RpcRequest, RpcResponse, RpcResult};

/// Implemented by a plugin subprocess to answer RPC calls dispatched by
/// method name. Handlers return `Err(String)` for a plugin-level failure;
/// the string becomes the wire `RpcResponse::Err` payload.
#[async_trait]
pub trait RpcHandler: Send + Sync {
    async fn handle(&self, method: &str, payload: Value) -> Result<Value, String>;
}

/// Serve one connection until the peer closes it or sends a frame this
/// handler can't even deserialize as an `RpcRequest`.
pub async fn serve<C, H>(mut conn: C, handler: &H) -> std::io::Result<()>
where
    C: AsyncRead + AsyncWrite + Unpin,
    H: RpcHandler,
{
    loop {
        let request: RpcRequest = match read_frame(&mut conn).await {
            Ok(request) => request,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(e) => return Err(e),
        };

        let result = match handler.handle(&request.method, request.payload).await {
            Ok(value) => RpcResult::Ok(value),
            Err(message) => RpcResult::Err(message),
        };
        write_frame(&mut conn, &RpcResponse { id: request.id, result }).await?;
    }
}
