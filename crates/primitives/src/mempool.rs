//! Mempool-related primitives

use crate::{
    constants::mempool::GAS_INCREASE_PERC,
    user_operation::{UserOperation, UserOperationHash},
    utils::calculate_valid_gas,
};
use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Mempool key of a user operation, unique per (chain, sender, nonce)
pub fn mempool_entry_key(chain_id: u64, sender: &Address, nonce: &U256) -> String {
    format!("{chain_id}:{sender:?}:{nonce}")
}

/// A user operation admitted into the mempool, together with the context of its admission
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MempoolEntry {
    pub chain_id: u64,
    pub user_operation: UserOperation,
    pub entry_point: Address,
    /// Amount the entry point reserves from the paying entity before execution
    pub prefund: U256,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregator: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<UserOperationHash>,
    pub last_updated_time: u64,
}

impl MempoolEntry {
    pub fn key(&self) -> String {
        mempool_entry_key(self.chain_id, &self.user_operation.sender, &self.user_operation.nonce)
    }

    /// Whether this entry may replace `prev` under the same mempool key.
    ///
    /// Both fee fields must grow by at least [GAS_INCREASE_PERC] percent.
    pub fn can_replace(&self, prev: &MempoolEntry) -> bool {
        let incr: U256 = GAS_INCREASE_PERC.into();
        self.user_operation.max_fee_per_gas >=
            calculate_valid_gas(prev.user_operation.max_fee_per_gas, incr) &&
            self.user_operation.max_priority_fee_per_gas >=
                calculate_valid_gas(prev.user_operation.max_priority_fee_per_gas, incr)
    }

    /// Descending by `max_priority_fee_per_gas`, the admission priority inside a bundle
    pub fn cmp_by_cost(&self, other: &MempoolEntry) -> Ordering {
        other
            .user_operation
            .max_priority_fee_per_gas
            .cmp(&self.user_operation.max_priority_fee_per_gas)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(max_fee: u64, max_priority_fee: u64) -> MempoolEntry {
        MempoolEntry {
            chain_id: 1337,
            user_operation: UserOperation::default()
                .sender("0x9c5754De1443984659E1b3a8d1931D83475ba29C".parse().unwrap())
                .nonce(1.into())
                .max_fee_per_gas(max_fee.into())
                .max_priority_fee_per_gas(max_priority_fee.into()),
            entry_point: Address::random(),
            prefund: U256::zero(),
            aggregator: None,
            hash: None,
            last_updated_time: 0,
        }
    }

    #[test]
    fn entry_key_format() {
        let e = entry(100, 10);
        assert_eq!(e.key(), format!("1337:{:?}:1", e.user_operation.sender));
    }

    #[test]
    fn replacement_requires_ten_percent_fee_bump() {
        let prev = entry(100, 10);
        assert!(!entry(100, 10).can_replace(&prev));
        assert!(!entry(105, 11).can_replace(&prev));
        assert!(!entry(110, 10).can_replace(&prev));
        assert!(entry(110, 11).can_replace(&prev));
        assert!(entry(200, 20).can_replace(&prev));
    }

    #[test]
    fn cost_order_is_descending_priority_fee() {
        let mut entries = vec![entry(100, 1), entry(100, 3), entry(100, 2)];
        entries.sort_by(|a, b| a.cmp_by_cost(b));
        let fees: Vec<U256> =
            entries.iter().map(|e| e.user_operation.max_priority_fee_per_gas).collect();
        assert_eq!(fees, vec![3.into(), 2.into(), 1.into()]);
    }
}
