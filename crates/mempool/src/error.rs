use chainguard_contracts::EntryPointError;
use chainguard_primitives::UserOperationHash;
use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Key-value store errors
#[derive(Clone, Debug, Error, Serialize, Deserialize)]
pub enum StoreError {
    /// No value stored under the key
    #[error("value not found for key {key}")]
    NotFound { key: String },
    /// Value could not be encoded or decoded
    #[error("codec error: {inner}")]
    Codec { inner: String },
    /// Backend failure
    #[error("store backend error: {inner}")]
    Backend { inner: String },
}

/// Mempool error
#[derive(Debug, Error, Serialize, Deserialize)]
#[error("{kind}")]
pub struct MempoolError {
    /// The user operation hash that caused the error
    pub hash: UserOperationHash,
    /// The error kind
    pub kind: MempoolErrorKind,
}

/// Mempool error kind
#[derive(Debug, Error, Serialize, Deserialize)]
pub enum MempoolErrorKind {
    /// Replacement of an existing user operation without a sufficient fee bump
    #[error("fee too low")]
    FeeTooLow,
    /// User operation rejected because of the reputation of the entities
    #[error(transparent)]
    Reputation(#[from] ReputationError),
    /// User operation rejected because simulation failed
    #[error(transparent)]
    Simulation(#[from] SimulationError),
    /// Store error
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Any other error
    #[error("other error: {inner}")]
    Other { inner: String },
}

/// Error related to reputation of the entities
#[derive(Clone, Debug, Error, Serialize, Deserialize)]
pub enum ReputationError {
    /// Entity is banned
    #[error("{entity} {address:?} is banned")]
    BannedEntity { entity: String, address: Address },
    /// Entity is blacklisted
    #[error("{entity} {address:?} is blacklisted")]
    BlacklistedEntity { entity: String, address: Address },
    /// Stake of the entity is too low
    #[error("{entity} {address:?} stake {stake} is too low (minimum {min_stake})")]
    StakeTooLow { entity: String, address: Address, stake: U256, min_stake: U256 },
    /// Unstake delay of the entity is too low
    #[error(
        "{entity} {address:?} unstake delay {unstake_delay} is too low (minimum {min_unstake_delay})"
    )]
    UnstakeDelayTooLow {
        entity: String,
        address: Address,
        unstake_delay: U256,
        min_unstake_delay: U256,
    },
    /// Store error
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Error when simulation fails
#[derive(Clone, Debug, Error, Serialize, Deserialize)]
pub enum SimulationError {
    /// Entry point rejected the user operation during validation
    #[error("{inner}")]
    Validation { inner: String },
    /// Execution reverted with a decoded reason
    #[error("{inner}")]
    Execution { inner: String },
    /// Simulation call did not complete within the configured bound
    #[error("simulation timed out")]
    Timeout,
    /// Provider error
    #[error("provider error: {inner}")]
    Provider { inner: String },
    /// Any other error
    #[error("other error: {inner}")]
    Other { inner: String },
}

impl From<EntryPointError> for SimulationError {
    fn from(err: EntryPointError) -> Self {
        match err {
            EntryPointError::FailedOp(op) => SimulationError::Validation { inner: op.to_string() },
            EntryPointError::ExecutionReverted(inner) => SimulationError::Execution { inner },
            EntryPointError::Provider { inner } => SimulationError::Provider { inner },
            _ => SimulationError::Other { inner: err.to_string() },
        }
    }
}
