// matterlink-api: Async WebSocket RPC client for the Matter bridge server

pub mod envelope;
pub mod error;
pub mod rpc;
pub mod transport;

pub use envelope::{NodeData, RpcRequest, RpcResponse, commands};
pub use error::Error;
pub use rpc::{RpcClient, RpcClientConfig};
pub use transport::{SessionState, WsTransport};
