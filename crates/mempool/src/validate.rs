//! Validation of user operations against the entry point contract

use crate::error::SimulationError;
use async_trait::async_trait;
use chainguard_contracts::{EntryPoint, SimulateValidationResult};
use chainguard_primitives::{get_address, reputation::StakeInfo, UserOperation};
use ethers::{
    providers::Middleware,
    types::{Address, U256},
};
use std::{sync::Arc, time::Duration};
use tracing::trace;

/// Gas and prefund information decoded from the validation revert
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReturnInfo {
    pub pre_op_gas: U256,
    pub prefund: U256,
    pub deadline: U256,
}

/// Outcome of a complete off-chain validation of a user operation
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserOpValidationResult {
    pub return_info: ReturnInfo,
    pub sender_info: StakeInfo,
    pub factory_info: Option<StakeInfo>,
    pub paymaster_info: Option<StakeInfo>,
    pub aggregator_info: Option<StakeInfo>,
}

impl UserOpValidationResult {
    /// Address of the aggregator the wallet delegates signatures to, if any
    pub fn aggregator(&self) -> Option<Address> {
        self.aggregator_info.map(|info| info.address)
    }
}

/// Seam for the simulation calls, so bundling and the RPC facade can be driven by stubs
#[async_trait]
pub trait UserOpSimulator: Send + Sync {
    /// Simulates validation and decodes stake and prefund info for every entity involved
    async fn simulate_complete_validation(
        &self,
        uo: &UserOperation,
        entry_point: &Address,
    ) -> Result<UserOpValidationResult, SimulationError>;

    /// Raw simulation call, used by gas estimation where no post-processing is wanted
    async fn call_simulate_validation(
        &self,
        uo: &UserOperation,
        entry_point: &Address,
    ) -> Result<SimulateValidationResult, SimulationError>;
}

/// Optional hook verifying the opcode and storage-access rules over an execution trace
#[async_trait]
pub trait TraceCheck: Send + Sync {
    async fn check_trace(
        &self,
        uo: &UserOperation,
        entry_point: &Address,
    ) -> Result<(), SimulationError>;
}

/// Validation service wrapping `simulateValidation` on the entry point contract
#[derive(Clone)]
pub struct UserOpValidationService<M: Middleware + 'static> {
    eth_client: Arc<M>,
    simulate_timeout: Duration,
    trace_check: Option<Arc<dyn TraceCheck>>,
}

impl<M: Middleware + 'static> UserOpValidationService<M> {
    pub fn new(eth_client: Arc<M>, simulate_timeout: Duration) -> Self {
        Self { eth_client, simulate_timeout, trace_check: None }
    }

    /// Installs a tracing-based rule check applied after every complete validation
    pub fn with_trace_check(mut self, trace_check: Arc<dyn TraceCheck>) -> Self {
        self.trace_check = Some(trace_check);
        self
    }

    async fn simulate(
        &self,
        uo: &UserOperation,
        entry_point: &Address,
    ) -> Result<SimulateValidationResult, SimulationError> {
        let ep = EntryPoint::new(self.eth_client.clone(), *entry_point);

        let res = tokio::time::timeout(self.simulate_timeout, ep.simulate_validation(uo.clone()))
            .await
            .map_err(|_| SimulationError::Timeout)??;

        trace!("Simulation of {uo:?} returned {res:?}");
        Ok(res)
    }
}

#[async_trait]
impl<M: Middleware + 'static> UserOpSimulator for UserOpValidationService<M> {
    async fn simulate_complete_validation(
        &self,
        uo: &UserOperation,
        entry_point: &Address,
    ) -> Result<UserOpValidationResult, SimulationError> {
        let res = self.simulate(uo, entry_point).await?;

        if let Some(trace_check) = &self.trace_check {
            trace_check.check_trace(uo, entry_point).await?;
        }

        let factory = get_address(&uo.init_code);
        let paymaster = get_address(&uo.paymaster_and_data);

        Ok(match res {
            SimulateValidationResult::ValidationResult(res) => UserOpValidationResult {
                return_info: ReturnInfo {
                    pre_op_gas: res.return_info.0,
                    prefund: res.return_info.1,
                    deadline: res.return_info.2,
                },
                sender_info: StakeInfo {
                    address: uo.sender,
                    stake: res.sender_info.0,
                    unstake_delay: res.sender_info.1,
                },
                factory_info: factory.map(|address| StakeInfo {
                    address,
                    stake: res.factory_info.0,
                    unstake_delay: res.factory_info.1,
                }),
                paymaster_info: paymaster.map(|address| StakeInfo {
                    address,
                    stake: res.paymaster_info.0,
                    unstake_delay: res.paymaster_info.1,
                }),
                aggregator_info: None,
            },
            SimulateValidationResult::ValidationResultWithAggregation(res) => {
                UserOpValidationResult {
                    return_info: ReturnInfo {
                        pre_op_gas: res.return_info.0,
                        prefund: res.return_info.1,
                        deadline: res.return_info.2,
                    },
                    sender_info: StakeInfo {
                        address: uo.sender,
                        stake: res.sender_info.0,
                        unstake_delay: res.sender_info.1,
                    },
                    factory_info: factory.map(|address| StakeInfo {
                        address,
                        stake: res.factory_info.0,
                        unstake_delay: res.factory_info.1,
                    }),
                    paymaster_info: paymaster.map(|address| StakeInfo {
                        address,
                        stake: res.paymaster_info.0,
                        unstake_delay: res.paymaster_info.1,
                    }),
                    aggregator_info: Some(StakeInfo {
                        address: res.aggregator_info.0,
                        stake: res.aggregator_info.1.0,
                        unstake_delay: res.aggregator_info.1.1,
                    }),
                }
            }
        })
    }

    async fn call_simulate_validation(
        &self,
        uo: &UserOperation,
        entry_point: &Address,
    ) -> Result<SimulateValidationResult, SimulationError> {
        self.simulate(uo, entry_point).await
    }
}
