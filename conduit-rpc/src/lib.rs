pub mod client;
pub mod conn;
pub mod framing;
pub mod protocol;
pub mod server;
pub mod transport;

pub use client::RpcClient;
pub use conn::{dial, Conn};
pub use protocol::{
    RpcRequest, RpcResponse, RpcResult, METHOD_CHECK_HEALTH, METHOD_CHECK_READY, METHOD_CONFIGURE,
    METHOD_GET_CAPABILITIES, METHOD_GET_METADATA, METHOD_HANDLE_REQUEST, METHOD_HANDLE_RESPONSE, METHOD_STOP,
};
pub use server::{serve, RpcHandler};
pub use transport::{generate_address, NetworkKind, TransportAddress};
