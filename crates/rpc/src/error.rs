use chainguard_mempool::{
    MempoolError, MempoolErrorKind, ReputationError, SimulationError, StoreError,
};
use chainguard_primitives::constants::rpc_error_codes::{
    ENTITY_BANNED, EXECUTION, OPCODE, SANITY_CHECK, STAKE_TOO_LOW, USER_OPERATION_HASH, VALIDATION,
};
use jsonrpsee::types::{
    error::{ErrorCode, INTERNAL_ERROR_CODE},
    ErrorObject, ErrorObjectOwned,
};

/// A wrapper for the [ErrorObjectOwned](ErrorObjectOwned) type
pub struct JsonRpcError(pub ErrorObjectOwned);

impl JsonRpcError {
    /// An invalid request, e.g. an entry point this bundler does not serve
    pub fn invalid_request(message: impl Into<String>) -> Self {
        JsonRpcError(ErrorObject::owned(SANITY_CHECK, message.into(), None::<bool>))
    }

    /// A malformed or unknown user operation hash
    pub fn invalid_user_operation_hash() -> Self {
        JsonRpcError(ErrorObject::owned(
            USER_OPERATION_HASH,
            "Missing/invalid userOpHash".to_string(),
            None::<bool>,
        ))
    }
}

impl From<JsonRpcError> for ErrorObjectOwned {
    fn from(err: JsonRpcError) -> Self {
        err.0
    }
}

impl From<MempoolError> for JsonRpcError {
    fn from(err: MempoolError) -> Self {
        err.kind.into()
    }
}

impl From<MempoolErrorKind> for JsonRpcError {
    fn from(err: MempoolErrorKind) -> Self {
        match err {
            MempoolErrorKind::FeeTooLow => {
                JsonRpcError(ErrorObject::owned(OPCODE, "fee too low".to_string(), None::<bool>))
            }
            MempoolErrorKind::Reputation(err) => err.into(),
            MempoolErrorKind::Simulation(err) => err.into(),
            MempoolErrorKind::Store(err) => err.into(),
            MempoolErrorKind::Other { inner } => {
                JsonRpcError(ErrorObject::owned(INTERNAL_ERROR_CODE, inner, None::<bool>))
            }
        }
    }
}

impl From<ReputationError> for JsonRpcError {
    fn from(err: ReputationError) -> Self {
        JsonRpcError(match err {
            ReputationError::BannedEntity { .. } | ReputationError::BlacklistedEntity { .. } => {
                ErrorObject::owned(ENTITY_BANNED, err.to_string(), None::<bool>)
            }
            ReputationError::StakeTooLow { .. } | ReputationError::UnstakeDelayTooLow { .. } => {
                ErrorObject::owned(STAKE_TOO_LOW, err.to_string(), None::<bool>)
            }
            ReputationError::Store(_) => {
                ErrorObject::owned(INTERNAL_ERROR_CODE, err.to_string(), None::<bool>)
            }
        })
    }
}

impl From<SimulationError> for JsonRpcError {
    fn from(err: SimulationError) -> Self {
        JsonRpcError(match err {
            SimulationError::Validation { .. } => {
                ErrorObject::owned(VALIDATION, err.to_string(), None::<bool>)
            }
            SimulationError::Execution { .. } => {
                ErrorObject::owned(EXECUTION, err.to_string(), None::<bool>)
            }
            _ => ErrorObject::owned(INTERNAL_ERROR_CODE, err.to_string(), None::<bool>),
        })
    }
}

impl From<StoreError> for JsonRpcError {
    fn from(err: StoreError) -> Self {
        JsonRpcError(ErrorObject::owned(INTERNAL_ERROR_CODE, err.to_string(), None::<bool>))
    }
}

impl From<eyre::Report> for JsonRpcError {
    fn from(err: eyre::Report) -> Self {
        JsonRpcError(ErrorObject::owned(
            ErrorCode::InternalError.code(),
            err.to_string(),
            None::<bool>,
        ))
    }
}

impl From<serde_json::Error> for JsonRpcError {
    fn from(err: serde_json::Error) -> Self {
        JsonRpcError(ErrorObject::owned(
            ErrorCode::ParseError.code(),
            format!("JSON serializing error: {err}"),
            None::<bool>,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::Address;

    #[test]
    fn fee_too_low_maps_to_opcode_code() {
        let err: JsonRpcError = MempoolErrorKind::FeeTooLow.into();
        assert_eq!(err.0.code(), OPCODE);
        assert_eq!(err.0.message(), "fee too low");
    }

    #[test]
    fn reputation_errors_map_to_erc4337_codes() {
        let banned: JsonRpcError = ReputationError::BannedEntity {
            entity: "paymaster".into(),
            address: Address::random(),
        }
        .into();
        assert_eq!(banned.0.code(), ENTITY_BANNED);

        let stake: JsonRpcError = ReputationError::StakeTooLow {
            entity: "account".into(),
            address: Address::random(),
            stake: 0.into(),
            min_stake: 1.into(),
        }
        .into();
        assert_eq!(stake.0.code(), STAKE_TOO_LOW);
    }

    #[test]
    fn simulation_errors_map_to_validation_and_execution_codes() {
        let validation: JsonRpcError =
            SimulationError::Validation { inner: "AA23 reverted".into() }.into();
        assert_eq!(validation.0.code(), VALIDATION);

        let execution: JsonRpcError =
            SimulationError::Execution { inner: "reverted".into() }.into();
        assert_eq!(execution.0.code(), EXECUTION);
    }
}
