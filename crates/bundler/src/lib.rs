//! Bundle assembly and on-chain dispatch

pub mod bundler;
pub mod ethereum;
pub mod service;

pub use bundler::Bundler;
pub use ethereum::{EthereumClient, SendBundleOp};
pub use service::BundlerService;
