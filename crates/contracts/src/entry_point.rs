pub use super::gen::{EntryPointAPI, EntryPointAPIEvents, UserOperationEventFilter};
use super::gen::entry_point_api::{
    self, DepositInfo, EntryPointAPIErrors, SenderAddressResult, ValidationResult,
    ValidationResultWithAggregation,
};
use crate::error::{decode_revert_error, EntryPointError};
use chainguard_primitives::UserOperation;
use ethers::{
    prelude::{ContractError, Event},
    providers::Middleware,
    types::{transaction::eip2718::TypedTransaction, Address, Bytes, H256, U256},
};
use std::sync::Arc;

/// Result of a `simulateValidation` staticcall, decoded from the expected revert
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SimulateValidationResult {
    ValidationResult(ValidationResult),
    ValidationResultWithAggregation(ValidationResultWithAggregation),
}

/// Wrapper around the entry point smart contract
#[derive(Clone)]
pub struct EntryPoint<M: Middleware + 'static> {
    eth_client: Arc<M>,
    address: Address,
    entry_point_api: EntryPointAPI<M>,
}

impl<M: Middleware + 'static> EntryPoint<M> {
    pub fn new(eth_client: Arc<M>, address: Address) -> Self {
        let entry_point_api = EntryPointAPI::new(address, eth_client.clone());
        Self { eth_client, address, entry_point_api }
    }

    pub fn entry_point_api(&self) -> &EntryPointAPI<M> {
        &self.entry_point_api
    }

    pub fn events(&self) -> Event<Arc<M>, M, EntryPointAPIEvents> {
        self.entry_point_api.events()
    }

    pub fn eth_client(&self) -> Arc<M> {
        self.eth_client.clone()
    }

    pub fn address(&self) -> Address {
        self.address
    }

    fn deserialize_error_msg(
        err: ContractError<M>,
    ) -> Result<EntryPointAPIErrors, EntryPointError> {
        match err {
            ContractError::DecodingError(e) => {
                Err(EntryPointError::Decode { inner: e.to_string() })
            }
            ContractError::AbiError(e) => Err(EntryPointError::ABI { inner: e.to_string() }),
            ContractError::MiddlewareError { e } => EntryPointError::from_middleware_error::<M>(e),
            ContractError::ProviderError { e } => EntryPointError::from_provider_error(&e),
            ContractError::Revert(data) => decode_revert_error(data),
            _ => Err(EntryPointError::Other { inner: err.to_string() }),
        }
    }

    /// Staticcalls `simulateValidation`; the entry point is expected to revert with the
    /// validation outcome, so a plain return is an error.
    pub async fn simulate_validation<U: Into<entry_point_api::UserOperation>>(
        &self,
        uo: U,
    ) -> Result<SimulateValidationResult, EntryPointError> {
        let res = self.entry_point_api.simulate_validation(uo.into()).await;

        match res {
            Ok(_) => Err(EntryPointError::NoRevert { function: "simulate_validation".into() }),
            Err(e) => Self::deserialize_error_msg(e).and_then(|op| match op {
                EntryPointAPIErrors::FailedOp(err) => Err(EntryPointError::FailedOp(err)),
                EntryPointAPIErrors::ValidationResult(res) => {
                    Ok(SimulateValidationResult::ValidationResult(res))
                }
                EntryPointAPIErrors::ValidationResultWithAggregation(res) => {
                    Ok(SimulateValidationResult::ValidationResultWithAggregation(res))
                }
                EntryPointAPIErrors::RevertString(reason) => {
                    Err(EntryPointError::ExecutionReverted(reason))
                }
                _ => Err(EntryPointError::Other {
                    inner: format!("simulate validation error: {op:?}"),
                }),
            }),
        }
    }

    /// Builds the `handleOps` transaction for a bundle, ready to be signed and submitted
    pub fn handle_ops_tx(
        &self,
        uos: Vec<UserOperation>,
        beneficiary: Address,
    ) -> TypedTransaction {
        self.entry_point_api
            .handle_ops(uos.into_iter().map(Into::into).collect(), beneficiary)
            .tx
    }

    pub async fn get_user_op_hash<U: Into<entry_point_api::UserOperation>>(
        &self,
        uo: U,
    ) -> Result<H256, EntryPointError> {
        let res = self.entry_point_api.get_user_op_hash(uo.into()).call().await;

        match res {
            Ok(hash) => Ok(H256::from(hash)),
            Err(err) => {
                Err(EntryPointError::Other { inner: format!("get user op hash error: {err:?}") })
            }
        }
    }

    pub async fn balance_of(&self, addr: &Address) -> Result<U256, EntryPointError> {
        let res = self.entry_point_api.balance_of(*addr).call().await;

        match res {
            Ok(balance) => Ok(balance),
            Err(err) => Err(EntryPointError::Other { inner: format!("balance of error: {err:?}") }),
        }
    }

    pub async fn get_deposit_info(&self, addr: &Address) -> Result<DepositInfo, EntryPointError> {
        let res = self.entry_point_api.get_deposit_info(*addr).call().await;

        match res {
            Ok(deposit_info) => Ok(DepositInfo {
                deposit: deposit_info.0,
                staked: deposit_info.1,
                stake: deposit_info.2,
                unstake_delay_sec: deposit_info.3,
                withdraw_time: deposit_info.4,
            }),
            Err(err) => {
                Err(EntryPointError::Other { inner: format!("get deposit info error: {err:?}") })
            }
        }
    }

    pub async fn get_sender_address(
        &self,
        init_code: Bytes,
    ) -> Result<SenderAddressResult, EntryPointError> {
        let res = self.entry_point_api.get_sender_address(init_code).call().await;

        match res {
            Ok(_) => Err(EntryPointError::NoRevert { function: "get_sender_address".into() }),
            Err(e) => Self::deserialize_error_msg(e).and_then(|op| match op {
                EntryPointAPIErrors::SenderAddressResult(res) => Ok(res),
                EntryPointAPIErrors::FailedOp(err) => Err(EntryPointError::FailedOp(err)),
                _ => Err(EntryPointError::Other {
                    inner: format!("get sender address error: {op:?}"),
                }),
            }),
        }
    }
}
