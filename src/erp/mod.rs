mod transport;
mod types;

pub use transport::{ErpTransport, HttpErpTransport, strip_hop_by_hop};
pub use types::{
    JSONRPC_VERSION, RawRequest, RpcErrorObject, RpcRequest, RpcResponse, UpstreamResponse,
    error_message_from_body,
};
