//! Primitive types shared across the bundler crates

pub mod bundle;
pub mod constants;
pub mod mempool;
pub mod provider;
pub mod reputation;
pub mod user_operation;
pub mod utils;
pub mod wallet;

pub use bundle::BundleMode;
pub use mempool::{mempool_entry_key, MempoolEntry};
pub use user_operation::{
    UserOperation, UserOperationByHash, UserOperationGasEstimation, UserOperationHash,
    UserOperationReceipt,
};
pub use utils::get_address;
pub use wallet::Wallet;
