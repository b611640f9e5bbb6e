pub use crate::debug::DebugApiServerImpl;
use chainguard_primitives::{reputation::ReputationEntry, BundleMode, UserOperation};
use ethers::types::Address;
use jsonrpsee::{core::RpcResult, proc_macros::rpc};
use serde::{Deserialize, Serialize};

/// Result of the debug RPC methods that only signal success
#[derive(Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResponseSuccess {
    Ok,
}

/// The `debug_bundler` namespace RPC methods trait, used by the bundler test suites and
/// for operational inspection
#[rpc(server, namespace = "debug_bundler")]
pub trait DebugApi {
    /// Clears the bundler mempool and reputation registry.
    #[method(name = "clearState")]
    async fn clear_state(&self) -> RpcResult<ResponseSuccess>;

    /// Get all [UserOperations](UserOperation) of the mempool.
    #[method(name = "dumpMempool")]
    async fn dump_mempool(&self) -> RpcResult<Vec<UserOperation>>;

    /// Set the reputation for the given array of [ReputationEntry](ReputationEntry).
    ///
    /// # Arguments
    /// * `reputation_entries: Vec<ReputationEntry>` - The entries to be set.
    /// * `entry_point: Address` - The address of the entry point.
    #[method(name = "setReputation")]
    async fn set_reputation(
        &self,
        reputation_entries: Vec<ReputationEntry>,
        entry_point: Address,
    ) -> RpcResult<ResponseSuccess>;

    /// Return all [ReputationEntries](ReputationEntry) with their computed statuses.
    #[method(name = "dumpReputation")]
    async fn dump_reputation(&self) -> RpcResult<Vec<ReputationEntry>>;

    /// Set the bundling mode.
    ///
    /// # Arguments
    /// * `mode: BundleMode` - Auto bundles on the configured interval, manual on request.
    #[method(name = "setBundlingMode")]
    async fn set_bundling_mode(&self, mode: BundleMode) -> RpcResult<ResponseSuccess>;

    /// Set the auto bundling interval in seconds.
    #[method(name = "setBundleInterval")]
    async fn set_bundle_interval(&self, interval: u64) -> RpcResult<ResponseSuccess>;

    /// Immediately send the current bundle of user operations.
    /// This is useful for testing or in situations where waiting for the next scheduled
    /// bundle is not desirable.
    #[method(name = "sendBundleNow")]
    async fn send_bundle_now(&self) -> RpcResult<ResponseSuccess>;
}
