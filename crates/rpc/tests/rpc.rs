use async_trait::async_trait;
use chainguard_contracts::{gen::entry_point_api, SimulateValidationResult};
use chainguard_mempool::{
    utils::Overhead, Database, MemoryStore, Mempool, Reputation, ReturnInfo, SimulationError,
    UserOpSimulator, UserOpValidationResult,
};
use chainguard_primitives::{
    constants::rpc_error_codes::{OPCODE, SANITY_CHECK},
    reputation::StakeInfo,
    UserOperation,
};
use chainguard_rpc::{EthApiServer, EthApiServerImpl};
use ethers::{
    providers::{MockProvider, Provider},
    types::{Address, U256},
    utils::{parse_ether, to_checksum},
};
use std::sync::Arc;

const CHAIN_ID: u64 = 1337;

/// Simulator stub returning fixed gas figures
struct StubSimulator {
    pre_op_gas: U256,
    deadline: U256,
}

#[async_trait]
impl UserOpSimulator for StubSimulator {
    async fn simulate_complete_validation(
        &self,
        uo: &UserOperation,
        _entry_point: &Address,
    ) -> Result<UserOpValidationResult, SimulationError> {
        Ok(UserOpValidationResult {
            return_info: ReturnInfo {
                pre_op_gas: self.pre_op_gas,
                prefund: parse_ether("0.01").unwrap(),
                deadline: self.deadline,
            },
            sender_info: StakeInfo {
                address: uo.sender,
                stake: U256::zero(),
                unstake_delay: U256::zero(),
            },
            factory_info: None,
            paymaster_info: None,
            aggregator_info: None,
        })
    }

    async fn call_simulate_validation(
        &self,
        _uo: &UserOperation,
        _entry_point: &Address,
    ) -> Result<SimulateValidationResult, SimulationError> {
        Ok(SimulateValidationResult::ValidationResult(entry_point_api::ValidationResult {
            return_info: (self.pre_op_gas, U256::zero(), self.deadline, Default::default()),
            sender_info: (U256::zero(), U256::zero()),
            factory_info: (U256::zero(), U256::zero()),
            paymaster_info: (U256::zero(), U256::zero()),
        }))
    }
}

fn setup(
    pre_op_gas: U256,
    deadline: U256,
) -> (EthApiServerImpl<Provider<MockProvider>, StubSimulator>, MockProvider, Address) {
    let (provider, mock) = Provider::mocked();
    let eth_client = Arc::new(provider);

    let db = Database::new(Box::new(MemoryStore::new()));
    let reputation =
        Reputation::new(CHAIN_ID, 10, 10, 50, U256::from(1), U256::from(86400), db.clone());
    let mempool = Mempool::new(CHAIN_ID, db, reputation);
    let ep = Address::random();

    let api = EthApiServerImpl {
        eth_client,
        chain_id: CHAIN_ID,
        entry_points: vec![ep],
        mempool,
        validator: Arc::new(StubSimulator { pre_op_gas, deadline }),
    };

    (api, mock, ep)
}

#[tokio::test]
async fn chain_id_and_supported_entry_points() {
    let (api, _mock, ep) = setup(U256::zero(), U256::zero());

    assert_eq!(api.chain_id().await.unwrap(), CHAIN_ID.into());
    assert_eq!(api.supported_entry_points().await.unwrap(), vec![to_checksum(&ep, None)]);
}

#[tokio::test]
async fn send_user_operation_admits_and_returns_hash() {
    let (api, _mock, ep) = setup(U256::zero(), U256::zero());

    let uo = UserOperation::default()
        .sender(Address::random())
        .nonce(1.into())
        .max_fee_per_gas(100.into())
        .max_priority_fee_per_gas(10.into());

    let hash = api.send_user_operation(uo.clone(), ep).await.unwrap();
    assert_eq!(hash, uo.hash(&ep, CHAIN_ID));
    assert_eq!(api.mempool.count().unwrap(), 1);
}

#[tokio::test]
async fn send_user_operation_rejects_unknown_entry_point() {
    let (api, _mock, _ep) = setup(U256::zero(), U256::zero());

    let err = api
        .send_user_operation(UserOperation::default().sender(Address::random()), Address::random())
        .await
        .unwrap_err();
    assert_eq!(err.code(), SANITY_CHECK);
}

#[tokio::test]
async fn validate_user_operation_checks_replacement() {
    let (api, _mock, ep) = setup(U256::zero(), U256::zero());

    let uo = UserOperation::default()
        .sender(Address::random())
        .nonce(1.into())
        .max_fee_per_gas(100.into())
        .max_priority_fee_per_gas(10.into());

    assert!(api.validate_user_operation(uo.clone(), ep).await.unwrap());

    api.send_user_operation(uo.clone(), ep).await.unwrap();

    // an identical-fee resubmission is no longer new or replacing
    let err = api.validate_user_operation(uo.clone(), ep).await.unwrap_err();
    assert_eq!(err.code(), OPCODE);

    let replacement = uo.max_fee_per_gas(110.into()).max_priority_fee_per_gas(11.into());
    assert!(api.validate_user_operation(replacement, ep).await.unwrap());
}

#[tokio::test]
async fn estimate_returns_simulated_and_estimated_gas() {
    let (api, mock, ep) = setup(U256::from(123_456), U256::zero());

    let uo = UserOperation::default()
        .sender(Address::random())
        .call_data(vec![0xab; 68].into())
        .max_fee_per_gas(100.into())
        .max_priority_fee_per_gas(10.into());

    // the execution-call estimate is the only chain round-trip
    mock.push(U256::from(33_100)).unwrap();

    let est = api.estimate_user_operation_gas(uo.clone(), ep).await.unwrap();

    assert_eq!(est.verification_gas, U256::from(123_456));
    assert_eq!(est.call_gas_limit, U256::from(33_100));
    assert_eq!(est.deadline, None);
    assert_eq!(
        est.pre_verification_gas,
        Overhead::default().calculate_pre_verification_gas(&uo)
    );
}

#[tokio::test]
async fn estimate_surfaces_nonzero_deadline() {
    let (api, mock, ep) = setup(U256::from(50_000), U256::from(1_700_000_000u64));

    mock.push(U256::from(21_000)).unwrap();

    let est = api
        .estimate_user_operation_gas(UserOperation::default().sender(Address::random()), ep)
        .await
        .unwrap();
    assert_eq!(est.deadline, Some(U256::from(1_700_000_000u64)));
}
