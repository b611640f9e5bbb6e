use crate::{
    error::{MempoolError, MempoolErrorKind, ReputationError},
    reputation::Reputation,
    store::Database,
    utils::now_secs,
};
use chainguard_primitives::{
    constants::validation::{
        entities::{AGGREGATOR, FACTORY, PAYMASTER, SENDER},
        reputation::SAME_SENDER_MEMPOOL_COUNT,
    },
    mempool_entry_key,
    reputation::StakeInfo,
    MempoolEntry, UserOperation, UserOperationHash,
};
use ethers::types::{Address, U256};
use tracing::{info, trace, warn};

/// Pending user operation store, keyed per (chain, sender, nonce)
///
/// Consistency between the keys list and the per-key entries is achieved by ordering:
/// the keys list is written first on insert and pruned first on removal. Orphan keys
/// surviving a crash are garbage-collected on the next full fetch.
#[derive(Clone)]
pub struct Mempool {
    /// The [EIP-155](https://eips.ethereum.org/EIPS/eip-155) chain ID
    chain_id: u64,
    /// Key-value store backing the pool
    db: Database,
    /// Reputation registry consulted for sender quotas
    reputation: Reputation,
}

impl Mempool {
    pub fn new(chain_id: u64, db: Database, reputation: Reputation) -> Self {
        Self { chain_id, db, reputation }
    }

    fn keys_key(&self) -> String {
        format!("{}:USEROPKEYS", self.chain_id)
    }

    fn read_keys(&self) -> Result<Vec<String>, MempoolErrorKind> {
        Ok(self.db.get_opt::<Vec<String>>(&self.keys_key())?.unwrap_or_default())
    }

    /// Loads all entries; orphan keys with no stored value are pruned from the keys list
    fn fetch_all(&self) -> Result<Vec<MempoolEntry>, MempoolErrorKind> {
        let keys = self.read_keys()?;
        let values: Vec<Option<MempoolEntry>> = self.db.get_many(&keys)?;

        let mut entries = Vec::with_capacity(values.len());
        let mut live_keys = Vec::with_capacity(keys.len());
        for (key, value) in keys.iter().zip(values) {
            match value {
                Some(entry) => {
                    live_keys.push(key.clone());
                    entries.push(entry);
                }
                None => warn!("Pruning orphan mempool key {key}"),
            }
        }

        if live_keys.len() != keys.len() {
            self.db.put(&self.keys_key(), &live_keys)?;
        }

        Ok(entries)
    }

    /// Adds a [UserOperation](UserOperation) to the mempool.
    ///
    /// A second submission under an existing (sender, nonce) key is a replacement and must
    /// bump both fee fields by at least 10 percent. New senders already holding
    /// [SAME_SENDER_MEMPOOL_COUNT] entries must pass the stake check to grow their quota.
    #[allow(clippy::too_many_arguments)]
    pub fn add_user_op(
        &self,
        uo: &UserOperation,
        entry_point: &Address,
        prefund: U256,
        sender_info: &StakeInfo,
        hash: Option<UserOperationHash>,
        aggregator: Option<Address>,
    ) -> Result<UserOperationHash, MempoolError> {
        let uo_hash = hash.unwrap_or_else(|| uo.hash(entry_point, self.chain_id));

        // blacklisted entities are rejected before any other check
        let (sender, factory, paymaster) = uo.get_entities();
        for (entity, addr) in [
            (SENDER, Some(sender)),
            (FACTORY, factory),
            (PAYMASTER, paymaster),
            (AGGREGATOR, aggregator),
        ] {
            if let Some(addr) = addr {
                let blacklisted = self
                    .reputation
                    .is_blacklist(&addr)
                    .map_err(|e| MempoolError { hash: uo_hash, kind: e.into() })?;
                if blacklisted {
                    return Err(MempoolError {
                        hash: uo_hash,
                        kind: ReputationError::BlacklistedEntity {
                            entity: entity.into(),
                            address: addr,
                        }
                        .into(),
                    });
                }
            }
        }

        let entry = MempoolEntry {
            chain_id: self.chain_id,
            user_operation: uo.clone(),
            entry_point: *entry_point,
            prefund,
            aggregator,
            hash: Some(uo_hash),
            last_updated_time: now_secs(),
        };
        let key = entry.key();

        let prev = self
            .db
            .get_opt::<MempoolEntry>(&key)
            .map_err(|e| MempoolError { hash: uo_hash, kind: e.into() })?;

        match prev {
            Some(prev) => {
                if !entry.can_replace(&prev) {
                    return Err(MempoolError { hash: uo_hash, kind: MempoolErrorKind::FeeTooLow });
                }
                self.db
                    .put(&key, &entry)
                    .map_err(|e| MempoolError { hash: uo_hash, kind: e.into() })?;
            }
            None => {
                let held = self
                    .get_number_by_sender(&uo.sender)
                    .map_err(|kind| MempoolError { hash: uo_hash, kind })?;
                if held >= SAME_SENDER_MEMPOOL_COUNT {
                    self.reputation
                        .check_stake(SENDER, sender_info)
                        .map_err(|e| MempoolError { hash: uo_hash, kind: e.into() })?;
                }

                // keys list first so a crash leaves an orphan key, never an invisible entry
                let mut keys =
                    self.read_keys().map_err(|kind| MempoolError { hash: uo_hash, kind })?;
                keys.push(key.clone());
                self.db
                    .put(&self.keys_key(), &keys)
                    .map_err(|e| MempoolError { hash: uo_hash, kind: e.into() })?;
                self.db
                    .put(&key, &entry)
                    .map_err(|e| MempoolError { hash: uo_hash, kind: e.into() })?;
            }
        }

        self.reputation
            .increment_seen(&sender)
            .map_err(|e| MempoolError { hash: uo_hash, kind: e.into() })?;
        if let Some(paymaster) = paymaster {
            self.reputation
                .increment_seen(&paymaster)
                .map_err(|e| MempoolError { hash: uo_hash, kind: e.into() })?;
        }
        if let Some(aggregator) = aggregator {
            self.reputation
                .increment_seen(&aggregator)
                .map_err(|e| MempoolError { hash: uo_hash, kind: e.into() })?;
        }

        info!("{uo_hash:?} added to the mempool (chain {})", self.chain_id);
        trace!("{uo:?} added to the mempool");

        Ok(uo_hash)
    }

    fn remove_by_key(&self, key: &str) -> Result<bool, MempoolErrorKind> {
        let keys = self.read_keys()?;
        if !keys.iter().any(|k| k == key) {
            return Ok(false);
        }

        // prune the keys list first so a crash leaves an unreachable value, not a dangling key
        let filtered: Vec<String> = keys.into_iter().filter(|k| k != key).collect();
        self.db.put(&self.keys_key(), &filtered)?;
        self.db.del(key)?;
        Ok(true)
    }

    /// Removes a [MempoolEntry](MempoolEntry) from the pool
    pub fn remove(&self, entry: &MempoolEntry) -> Result<bool, MempoolErrorKind> {
        self.remove_by_key(&entry.key())
    }

    /// Removes the entry holding the given user operation's (sender, nonce) slot
    pub fn remove_user_op(&self, uo: &UserOperation) -> Result<bool, MempoolErrorKind> {
        self.remove_by_key(&mempool_entry_key(self.chain_id, &uo.sender, &uo.nonce))
    }

    /// Returns all entries sorted by cost, descending `max_priority_fee_per_gas`;
    /// ties keep their insertion order
    pub fn get_sorted(&self) -> Result<Vec<MempoolEntry>, MempoolErrorKind> {
        let mut entries = self.fetch_all()?;
        entries.sort_by(|a, b| a.cmp_by_cost(b));
        Ok(entries)
    }

    /// Returns all entries in insertion order
    pub fn get_all(&self) -> Result<Vec<MempoolEntry>, MempoolErrorKind> {
        self.fetch_all()
    }

    /// Returns all pending user operations in insertion order
    pub fn dump(&self) -> Result<Vec<UserOperation>, MempoolErrorKind> {
        Ok(self.fetch_all()?.into_iter().map(|entry| entry.user_operation).collect())
    }

    /// Number of pending user operations
    pub fn count(&self) -> Result<usize, MempoolErrorKind> {
        Ok(self.read_keys()?.len())
    }

    /// Number of pending user operations from the given sender
    pub fn get_number_by_sender(&self, sender: &Address) -> Result<usize, MempoolErrorKind> {
        Ok(self
            .fetch_all()?
            .iter()
            .filter(|entry| entry.user_operation.sender == *sender)
            .count())
    }

    /// True iff the user operation would occupy a fresh (sender, nonce) slot or is a
    /// valid replacement of the stored one
    pub fn is_new_or_replacing(
        &self,
        uo: &UserOperation,
        entry_point: &Address,
    ) -> Result<bool, MempoolErrorKind> {
        let key = mempool_entry_key(self.chain_id, &uo.sender, &uo.nonce);
        match self.db.get_opt::<MempoolEntry>(&key)? {
            None => Ok(true),
            Some(prev) => {
                let candidate = MempoolEntry {
                    chain_id: self.chain_id,
                    user_operation: uo.clone(),
                    entry_point: *entry_point,
                    prefund: U256::zero(),
                    aggregator: None,
                    hash: None,
                    last_updated_time: now_secs(),
                };
                Ok(candidate.can_replace(&prev))
            }
        }
    }

    /// Drops every pending user operation
    pub fn clear(&self) -> Result<(), MempoolErrorKind> {
        for key in self.read_keys()? {
            self.db.del(&key)?;
        }
        self.db.del(&self.keys_key())?;
        Ok(())
    }
}
