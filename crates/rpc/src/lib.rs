//! JSON-RPC surface of the bundler

pub mod debug;
pub mod debug_api;
pub mod error;
pub mod eth;
pub mod eth_api;
pub mod rpc;

pub use debug::DebugApiServerImpl;
pub use debug_api::{DebugApiServer, ResponseSuccess};
pub use error::JsonRpcError;
pub use eth::EthApiServerImpl;
pub use eth_api::EthApiServer;
pub use rpc::JsonRpcServer;
