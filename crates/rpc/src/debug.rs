use crate::{
    debug_api::{DebugApiServer, ResponseSuccess},
    error::JsonRpcError,
};
use async_trait::async_trait;
use chainguard_bundler::{BundlerService, SendBundleOp};
use chainguard_mempool::{Mempool, Reputation, UserOpSimulator};
use chainguard_primitives::{reputation::ReputationEntry, BundleMode, UserOperation};
use ethers::{providers::Middleware, types::Address};
use jsonrpsee::core::RpcResult;

/// Debug RPC surface over the in-process services
pub struct DebugApiServerImpl<M, V, S>
where
    M: Middleware + 'static,
    V: UserOpSimulator + Send + Sync + 'static,
    S: SendBundleOp + 'static,
{
    pub entry_points: Vec<Address>,
    pub mempool: Mempool,
    pub reputation: Reputation,
    pub bundler_service: BundlerService<M, V, S>,
}

#[async_trait]
impl<M, V, S> DebugApiServer for DebugApiServerImpl<M, V, S>
where
    M: Middleware + 'static,
    V: UserOpSimulator + Send + Sync + 'static,
    S: SendBundleOp + 'static,
{
    async fn clear_state(&self) -> RpcResult<ResponseSuccess> {
        self.mempool.clear().map_err(|e| JsonRpcError::from(e).0)?;
        self.reputation.clear().map_err(|e| JsonRpcError::from(e).0)?;
        Ok(ResponseSuccess::Ok)
    }

    async fn dump_mempool(&self) -> RpcResult<Vec<UserOperation>> {
        let mut uos = self.mempool.dump().map_err(|e| JsonRpcError::from(e).0)?;
        uos.sort_by(|a, b| a.nonce.cmp(&b.nonce));
        Ok(uos)
    }

    async fn set_reputation(
        &self,
        entries: Vec<ReputationEntry>,
        ep: Address,
    ) -> RpcResult<ResponseSuccess> {
        if !self.entry_points.contains(&ep) {
            return Err(JsonRpcError::invalid_request(format!(
                "entry point {ep:?} is not supported"
            ))
            .0);
        }

        self.reputation.set_entities(entries).map_err(|e| JsonRpcError::from(e).0)?;
        Ok(ResponseSuccess::Ok)
    }

    async fn dump_reputation(&self) -> RpcResult<Vec<ReputationEntry>> {
        self.reputation.get_all().map_err(|e| JsonRpcError::from(e).0)
    }

    async fn set_bundling_mode(&self, mode: BundleMode) -> RpcResult<ResponseSuccess> {
        self.bundler_service.set_bundle_mode(mode);
        Ok(ResponseSuccess::Ok)
    }

    async fn set_bundle_interval(&self, interval: u64) -> RpcResult<ResponseSuccess> {
        self.bundler_service.set_bundle_interval(interval);
        Ok(ResponseSuccess::Ok)
    }

    async fn send_bundle_now(&self) -> RpcResult<ResponseSuccess> {
        self.bundler_service.send_bundle_now().await.map_err(|e| JsonRpcError::from(e).0)?;
        Ok(ResponseSuccess::Ok)
    }
}
