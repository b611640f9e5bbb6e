use crate::{
    error::EntryPointError,
    gen::{
        entry_point_api,
        multicall_3::{Call3, Multicall3},
    },
};
use chainguard_primitives::UserOperation;
use ethers::{abi::AbiEncode, providers::Middleware, types::Address, types::H256};
use std::sync::Arc;

/// Wrapper around the Multicall3 utility contract, used to batch entry point staticcalls
/// into a single RPC round-trip
#[derive(Clone)]
pub struct Multicall<M: Middleware + 'static> {
    api: Multicall3<M>,
    address: Address,
}

impl<M: Middleware + 'static> Multicall<M> {
    pub fn new(eth_client: Arc<M>, address: Address) -> Self {
        let api = Multicall3::new(address, eth_client);
        Self { api, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Resolves the user operation hashes of a bundle with one `aggregate3` call to
    /// `EntryPoint.getUserOpHash`. Slots of failed subcalls come back zeroed.
    pub async fn get_user_op_hashes(
        &self,
        entry_point: &Address,
        uos: &[UserOperation],
    ) -> Result<Vec<H256>, EntryPointError> {
        let calls: Vec<Call3> = uos
            .iter()
            .map(|uo| Call3 {
                target: *entry_point,
                allow_failure: true,
                call_data: entry_point_api::GetUserOpHashCall {
                    user_op: uo.clone().into(),
                }
                .encode()
                .into(),
            })
            .collect();

        let results = self
            .api
            .aggregate_3(calls)
            .call()
            .await
            .map_err(|err| EntryPointError::Other { inner: format!("multicall error: {err:?}") })?;

        Ok(results
            .into_iter()
            .map(|res| {
                if res.0 && res.1.len() >= 32 {
                    H256::from_slice(&res.1[0..32])
                } else {
                    H256::zero()
                }
            })
            .collect())
    }
}
