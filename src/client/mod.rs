// Client module
pub mod rpc_client;
pub mod transport;
pub mod types;

#[cfg(test)]
pub(crate) mod mock;

pub use rpc_client::RpcClient;
pub use transport::{HttpTransport, RpcTransport};
pub use types::{AccountBalance, AccountInfo, FailureKind, HistoryEntry, PendingBlock, RpcResponse};
