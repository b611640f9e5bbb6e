use crate::{error::JsonRpcError, eth_api::EthApiServer};
use async_trait::async_trait;
use chainguard_contracts::{
    entry_point::UserOperationEventFilter, utils::parse_from_input_data, EntryPoint,
    SimulateValidationResult,
};
use chainguard_mempool::{utils::Overhead, Mempool, MempoolErrorKind, UserOpSimulator};
use chainguard_primitives::{
    constants::mempool::LATEST_SCAN_DEPTH, UserOperation, UserOperationByHash,
    UserOperationGasEstimation, UserOperationHash, UserOperationReceipt,
};
use ethers::{
    contract::EthEvent,
    prelude::LogMeta,
    providers::Middleware,
    types::{Address, Bytes, Log, TransactionRequest, H256, U256, U64},
    utils::to_checksum,
};
use eyre::format_err;
use jsonrpsee::core::RpcResult;
use std::{str::FromStr, sync::Arc};
use tracing::debug;

/// Verification gas limit used for the fee-less simulation during gas estimation
const ESTIMATE_VERIFICATION_GAS_LIMIT: u64 = 10_000_000;

/// RPC-facing orchestration of the user operation flow: admission, validation, gas
/// estimation, and on-chain lookups
pub struct EthApiServerImpl<M, V>
where
    M: Middleware + 'static,
    V: UserOpSimulator + Send + Sync + 'static,
{
    pub eth_client: Arc<M>,
    pub chain_id: u64,
    pub entry_points: Vec<Address>,
    pub mempool: Mempool,
    pub validator: Arc<V>,
}

impl<M, V> EthApiServerImpl<M, V>
where
    M: Middleware + 'static,
    V: UserOpSimulator + Send + Sync + 'static,
{
    fn ensure_entry_point(&self, entry_point: &Address) -> Result<(), JsonRpcError> {
        if self.entry_points.contains(entry_point) {
            Ok(())
        } else {
            Err(JsonRpcError::invalid_request(format!(
                "entry point {entry_point:?} is not supported"
            )))
        }
    }

    /// Scans the configured entry points for the `UserOperationEvent` of the given hash
    async fn get_user_operation_event_meta(
        &self,
        uo_hash: H256,
    ) -> eyre::Result<Option<(UserOperationEventFilter, LogMeta, Address)>> {
        let latest_block = self.eth_client.get_block_number().await?;
        let from_block = latest_block.as_u64().saturating_sub(LATEST_SCAN_DEPTH);

        for ep_addr in &self.entry_points {
            let ep = EntryPoint::new(self.eth_client.clone(), *ep_addr);
            let filter = ep
                .entry_point_api()
                .event::<UserOperationEventFilter>()
                .from_block(from_block)
                .topic1(uo_hash);
            let res: Vec<(UserOperationEventFilter, LogMeta)> = filter.query_with_meta().await?;
            // the same user operation can appear twice in one bundle, take the last event
            if let Some((event, log_meta)) = res.into_iter().last() {
                return Ok(Some((event, log_meta, *ep_addr)));
            }
        }

        Ok(None)
    }
}

/// Slices the receipt logs down to the window belonging to one user operation: everything
/// after the previous `UserOperationEvent` in the same bundle, up to and including this
/// operation's own event
fn filter_user_operation_logs(
    logs: &[Log],
    event_signature: H256,
    uo_hash: H256,
) -> eyre::Result<Vec<Log>> {
    let mut end_index = None;
    for (i, log) in logs.iter().enumerate() {
        if log.topics.len() >= 2 && log.topics[0] == event_signature && log.topics[1] == uo_hash {
            end_index = Some(i);
        }
    }
    let end_index = end_index.ok_or_else(|| format_err!("no user operation event in logs"))?;

    let mut start_index = None;
    for (i, log) in logs[..end_index].iter().enumerate().rev() {
        if log.topics.len() >= 2 && log.topics[0] == event_signature && log.topics[1] != uo_hash {
            start_index = Some(i);
            break;
        }
    }

    let first = start_index.map(|i| i + 1).unwrap_or(0);
    Ok(logs[first..=end_index].to_vec())
}

#[async_trait]
impl<M, V> EthApiServer for EthApiServerImpl<M, V>
where
    M: Middleware + 'static,
    V: UserOpSimulator + Send + Sync + 'static,
{
    async fn chain_id(&self) -> RpcResult<U64> {
        Ok(self.chain_id.into())
    }

    async fn supported_entry_points(&self) -> RpcResult<Vec<String>> {
        Ok(self.entry_points.iter().map(|ep| to_checksum(ep, None)).collect())
    }

    async fn send_user_operation(
        &self,
        uo: UserOperation,
        ep: Address,
    ) -> RpcResult<UserOperationHash> {
        self.ensure_entry_point(&ep).map_err(|e| e.0)?;

        let res = self
            .validator
            .simulate_complete_validation(&uo, &ep)
            .await
            .map_err(|e| JsonRpcError::from(e).0)?;

        let uo_hash = self
            .mempool
            .add_user_op(
                &uo,
                &ep,
                res.return_info.prefund,
                &res.sender_info,
                None,
                res.aggregator(),
            )
            .map_err(|e| JsonRpcError::from(e).0)?;

        Ok(uo_hash)
    }

    async fn validate_user_operation(&self, uo: UserOperation, ep: Address) -> RpcResult<bool> {
        self.ensure_entry_point(&ep).map_err(|e| e.0)?;

        if !self
            .mempool
            .is_new_or_replacing(&uo, &ep)
            .map_err(|e| JsonRpcError::from(e).0)?
        {
            return Err(JsonRpcError::from(MempoolErrorKind::FeeTooLow).0);
        }

        self.validator
            .simulate_complete_validation(&uo, &ep)
            .await
            .map_err(|e| JsonRpcError::from(e).0)?;

        Ok(true)
    }

    async fn estimate_user_operation_gas(
        &self,
        uo: UserOperation,
        ep: Address,
    ) -> RpcResult<UserOperationGasEstimation> {
        self.ensure_entry_point(&ep).map_err(|e| e.0)?;

        // fee-less copy so the estimation does not depend on the wallet's funding
        let uo_for_simulation = uo
            .clone()
            .max_fee_per_gas(U256::zero())
            .max_priority_fee_per_gas(U256::zero())
            .pre_verification_gas(U256::zero())
            .verification_gas_limit(ESTIMATE_VERIFICATION_GAS_LIMIT.into())
            .paymaster_and_data(Bytes::default());

        let res = self
            .validator
            .call_simulate_validation(&uo_for_simulation, &ep)
            .await
            .map_err(|e| JsonRpcError::from(e).0)?;

        let return_info = match res {
            SimulateValidationResult::ValidationResult(res) => res.return_info,
            SimulateValidationResult::ValidationResultWithAggregation(res) => res.return_info,
        };

        let call_gas_limit = self
            .eth_client
            .estimate_gas(
                &TransactionRequest::new().from(ep).to(uo.sender).data(uo.call_data.clone()).into(),
                None,
            )
            .await
            .map_err(|e| {
                JsonRpcError::from(format_err!("call gas estimation failed: {e:?}")).0
            })?;

        let pre_verification_gas = Overhead::default().calculate_pre_verification_gas(&uo);

        Ok(UserOperationGasEstimation {
            pre_verification_gas,
            verification_gas: return_info.0,
            call_gas_limit,
            deadline: if return_info.2.is_zero() { None } else { Some(return_info.2) },
        })
    }

    async fn get_user_operation_receipt(
        &self,
        uo_hash: String,
    ) -> RpcResult<Option<UserOperationReceipt>> {
        let uo_hash = UserOperationHash::from_str(&uo_hash)
            .map_err(|_| JsonRpcError::invalid_user_operation_hash().0)?;

        let event = self
            .get_user_operation_event_meta(uo_hash.0)
            .await
            .map_err(|e| JsonRpcError::from(e).0)?;

        let Some((event, log_meta, _)) = event else {
            return Ok(None);
        };

        let Some(tx_receipt) = self
            .eth_client
            .get_transaction_receipt(log_meta.transaction_hash)
            .await
            .map_err(|e| JsonRpcError::from(format_err!("receipt lookup failed: {e:?}")).0)?
        else {
            return Ok(None);
        };

        let logs = filter_user_operation_logs(
            &tx_receipt.logs,
            <UserOperationEventFilter as EthEvent>::signature(),
            uo_hash.0,
        )
        .map_err(|e| JsonRpcError::from(e).0)?;

        Ok(Some(UserOperationReceipt {
            user_operation_hash: uo_hash,
            sender: event.sender,
            nonce: event.nonce,
            paymaster: if event.paymaster.is_zero() { None } else { Some(event.paymaster) },
            actual_gas_cost: event.actual_gas_cost,
            actual_gas_used: event.actual_gas_used,
            success: event.success,
            reason: String::new(),
            logs,
            tx_receipt,
        }))
    }

    async fn get_user_operation_by_hash(
        &self,
        uo_hash: String,
    ) -> RpcResult<Option<UserOperationByHash>> {
        let uo_hash = UserOperationHash::from_str(&uo_hash)
            .map_err(|_| JsonRpcError::invalid_user_operation_hash().0)?;

        let event = self
            .get_user_operation_event_meta(uo_hash.0)
            .await
            .map_err(|e| JsonRpcError::from(e).0)?;

        let Some((event, log_meta, ep_addr)) = event else {
            return Ok(None);
        };

        let Some(tx) = self
            .eth_client
            .get_transaction(log_meta.transaction_hash)
            .await
            .map_err(|e| JsonRpcError::from(format_err!("transaction lookup failed: {e:?}")).0)?
        else {
            return Ok(None);
        };

        debug!("Parsing user operation {uo_hash:?} out of transaction {:?}", tx.hash);

        let uo = parse_from_input_data(tx.input.clone()).and_then(|uos| {
            uos.into_iter().find(|uo| uo.sender == event.sender && uo.nonce == event.nonce)
        });

        Ok(uo.map(|user_operation| UserOperationByHash {
            user_operation,
            entry_point: tx.to.unwrap_or(ep_addr),
            transaction_hash: log_meta.transaction_hash,
            block_hash: log_meta.block_hash,
            block_number: log_meta.block_number,
        }))
    }
}
