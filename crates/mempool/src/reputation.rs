use crate::{error::ReputationError, store::Database, utils::now_secs};
use chainguard_primitives::{
    constants::validation::reputation::CRASHED_HANDLE_OPS_SEEN,
    reputation::{ReputationEntry, ReputationStatus, StakeInfo, Status},
};
use ethers::types::{Address, U256};
use tracing::debug;

const SECS_PER_HOUR: u64 = 3600;
const DECAY_DENOMINATOR: u64 = 24;

/// Persisted reputation accounting for the entities of the user operations
/// (senders, factories, paymasters, aggregators)
#[derive(Clone)]
pub struct Reputation {
    /// The [EIP-155](https://eips.ethereum.org/EIPS/eip-155) chain ID
    chain_id: u64,
    /// Minimum denominator for calculating the minimum expected inclusions
    min_inclusion_denominator: u64,
    /// Constant for calculating the throttling threshold
    throttling_slack: u64,
    /// Constant for calculating the ban threshold
    ban_slack: u64,
    /// Minimum stake amount
    min_stake: U256,
    /// Minimum time required to unstake
    min_unstake_delay: U256,
    /// Key-value store backing the registry
    db: Database,
}

impl Reputation {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        chain_id: u64,
        min_inclusion_denominator: u64,
        throttling_slack: u64,
        ban_slack: u64,
        min_stake: U256,
        min_unstake_delay: U256,
        db: Database,
    ) -> Self {
        Self {
            chain_id,
            min_inclusion_denominator,
            throttling_slack,
            ban_slack,
            min_stake,
            min_unstake_delay,
            db,
        }
    }

    fn list_key(&self) -> String {
        format!("{}:REPUTATION", self.chain_id)
    }

    fn entry_key(&self, addr: &Address) -> String {
        format!("{}:REPUTATION:{:?}", self.chain_id, addr)
    }

    fn whitelist_key(&self) -> String {
        format!("{}:REPUTATION:WL", self.chain_id)
    }

    fn blacklist_key(&self) -> String {
        format!("{}:REPUTATION:BL", self.chain_id)
    }

    fn read_list(&self, key: &str) -> Result<Vec<String>, ReputationError> {
        Ok(self.db.get_opt::<Vec<String>>(key)?.unwrap_or_default())
    }

    /// Records the address in the registry index, used by dumps and clears
    fn track_address(&self, addr: &Address) -> Result<(), ReputationError> {
        let key = self.list_key();
        let mut addrs = self.read_list(&key)?;
        let canonical = format!("{addr:?}");
        if !addrs.contains(&canonical) {
            addrs.push(canonical);
            self.db.put(&key, &addrs)?;
        }
        Ok(())
    }

    /// Applies the hourly decay to both counters; every whole elapsed hour each counter
    /// loses a 1/24 share, so bans wear off for entities that stop misbehaving
    fn apply_decay(mut ent: ReputationEntry, now: u64) -> ReputationEntry {
        if ent.last_update_time == 0 {
            ent.last_update_time = now;
            return ent;
        }

        let hours = now.saturating_sub(ent.last_update_time) / SECS_PER_HOUR;
        for _ in 0..hours {
            if ent.uo_seen == 0 && ent.uo_included == 0 {
                break;
            }
            ent.uo_seen -= ent.uo_seen / DECAY_DENOMINATOR;
            ent.uo_included -= ent.uo_included / DECAY_DENOMINATOR;
        }
        ent.last_update_time += hours * SECS_PER_HOUR;

        ent
    }

    /// Loads the decayed entry for an address; a missing value reads as a zero entry
    fn load_entry(&self, addr: &Address) -> Result<Option<ReputationEntry>, ReputationError> {
        let ent = self.db.get_opt::<ReputationEntry>(&self.entry_key(addr))?;
        Ok(ent.map(|ent| Self::apply_decay(ent, now_secs())))
    }

    fn store_entry(&self, ent: &ReputationEntry) -> Result<(), ReputationError> {
        self.track_address(&ent.address)?;
        self.db.put(&self.entry_key(&ent.address), ent)?;
        Ok(())
    }

    /// Get an entity's [ReputationEntry](ReputationEntry) by address, with the status computed
    pub fn get(&self, addr: &Address) -> Result<ReputationEntry, ReputationError> {
        if let Some(ent) = self.load_entry(addr)? {
            Ok(ReputationEntry { status: self.get_status(addr)?, ..ent })
        } else {
            Ok(ReputationEntry::default_with_addr(*addr))
        }
    }

    /// Increase the number of times an entity's address has been seen
    pub fn increment_seen(&self, addr: &Address) -> Result<(), ReputationError> {
        let mut ent = self
            .load_entry(addr)?
            .unwrap_or_else(|| ReputationEntry { last_update_time: now_secs(), ..ReputationEntry::default_with_addr(*addr) });
        ent.uo_seen += 1;
        self.store_entry(&ent)
    }

    /// Increases the number of times an entity successfully got a user operation on chain
    pub fn increment_included(&self, addr: &Address) -> Result<(), ReputationError> {
        let mut ent = self
            .load_entry(addr)?
            .unwrap_or_else(|| ReputationEntry { last_update_time: now_secs(), ..ReputationEntry::default_with_addr(*addr) });
        ent.uo_included += 1;
        self.store_entry(&ent)
    }

    /// Quarantines an entity whose on-chain `handleOps` disagreed with its off-chain
    /// simulation: counters are reset to the crash baseline and the status is pinned to
    /// banned until an explicit reputation overwrite
    pub fn crashed_handle_ops(&self, addr: &Address) -> Result<(), ReputationError> {
        debug!("Banning entity {addr:?} after handleOps revert");
        let ent = ReputationEntry {
            address: *addr,
            uo_seen: CRASHED_HANDLE_OPS_SEEN,
            uo_included: 0,
            status: Status::BANNED.into(),
            last_update_time: now_secs(),
        };
        self.store_entry(&ent)
    }

    /// Overwrite the [ReputationEntry](ReputationEntry) of an entity
    pub fn set_entry(&self, ent: ReputationEntry) -> Result<(), ReputationError> {
        let ent = ReputationEntry {
            last_update_time: if ent.last_update_time == 0 { now_secs() } else { ent.last_update_time },
            ..ent
        };
        self.store_entry(&ent)
    }

    /// Overwrite the [ReputationEntries](ReputationEntry) of multiple entities
    pub fn set_entities(&self, entries: Vec<ReputationEntry>) -> Result<(), ReputationError> {
        for ent in entries {
            self.set_entry(ent)?;
        }
        Ok(())
    }

    /// Get an entity's reputation status
    pub fn get_status(&self, addr: &Address) -> Result<ReputationStatus, ReputationError> {
        if self.is_whitelist(addr)? {
            return Ok(Status::OK.into());
        }

        if self.is_blacklist(addr)? {
            return Ok(Status::BANNED.into());
        }

        Ok(match self.load_entry(addr)? {
            Some(ent) => {
                if Status::from(ent.status) == Status::BANNED {
                    return Ok(Status::BANNED.into());
                }

                let min_expected_included = if self.min_inclusion_denominator == 0 {
                    0
                } else {
                    ent.uo_seen.div_ceil(self.min_inclusion_denominator)
                };
                if min_expected_included <= ent.uo_included + self.throttling_slack {
                    Status::OK.into()
                } else if min_expected_included <= ent.uo_included + self.ban_slack {
                    Status::THROTTLED.into()
                } else {
                    Status::BANNED.into()
                }
            }
            _ => Status::OK.into(),
        })
    }

    /// Verify the stake information of an entity; `Ok(())` means the entity may exceed
    /// the unstaked quotas
    pub fn check_stake(&self, entity: &str, info: &StakeInfo) -> Result<(), ReputationError> {
        if self.is_whitelist(&info.address)? {
            return Ok(());
        }

        if Status::from(self.get_status(&info.address)?) == Status::BANNED {
            return Err(ReputationError::BannedEntity {
                entity: entity.into(),
                address: info.address,
            });
        }

        if info.unstake_delay < self.min_unstake_delay {
            return Err(ReputationError::UnstakeDelayTooLow {
                entity: entity.into(),
                address: info.address,
                unstake_delay: info.unstake_delay,
                min_unstake_delay: self.min_unstake_delay,
            });
        }

        if info.stake < self.min_stake {
            return Err(ReputationError::StakeTooLow {
                entity: entity.into(),
                address: info.address,
                stake: info.stake,
                min_stake: self.min_stake,
            });
        }

        Ok(())
    }

    fn list_contains(&self, key: &str, addr: &Address) -> Result<bool, ReputationError> {
        Ok(self.read_list(key)?.contains(&format!("{addr:?}")))
    }

    fn list_add(&self, key: &str, addr: &Address) -> Result<bool, ReputationError> {
        let mut addrs = self.read_list(key)?;
        let canonical = format!("{addr:?}");
        if addrs.contains(&canonical) {
            return Ok(false);
        }
        addrs.push(canonical);
        self.db.put(key, &addrs)?;
        Ok(true)
    }

    fn list_remove(&self, key: &str, addr: &Address) -> Result<bool, ReputationError> {
        let addrs = self.read_list(key)?;
        let canonical = format!("{addr:?}");
        if !addrs.contains(&canonical) {
            return Ok(false);
        }
        let filtered: Vec<String> = addrs.into_iter().filter(|a| a != &canonical).collect();
        self.db.put(key, &filtered)?;
        Ok(true)
    }

    /// Add an address to the whitelist
    pub fn add_whitelist(&self, addr: &Address) -> Result<bool, ReputationError> {
        self.list_add(&self.whitelist_key(), addr)
    }

    /// Remove an address from the whitelist
    pub fn remove_whitelist(&self, addr: &Address) -> Result<bool, ReputationError> {
        self.list_remove(&self.whitelist_key(), addr)
    }

    /// Check if an address is in the whitelist
    pub fn is_whitelist(&self, addr: &Address) -> Result<bool, ReputationError> {
        self.list_contains(&self.whitelist_key(), addr)
    }

    /// Add an address to the blacklist
    pub fn add_blacklist(&self, addr: &Address) -> Result<bool, ReputationError> {
        self.list_add(&self.blacklist_key(), addr)
    }

    /// Remove an address from the blacklist
    pub fn remove_blacklist(&self, addr: &Address) -> Result<bool, ReputationError> {
        self.list_remove(&self.blacklist_key(), addr)
    }

    /// Check if an address is in the blacklist
    pub fn is_blacklist(&self, addr: &Address) -> Result<bool, ReputationError> {
        self.list_contains(&self.blacklist_key(), addr)
    }

    pub fn min_stake(&self) -> U256 {
        self.min_stake
    }

    pub fn min_unstake_delay(&self) -> U256 {
        self.min_unstake_delay
    }

    /// Get all [ReputationEntries](ReputationEntry) with computed statuses
    pub fn get_all(&self) -> Result<Vec<ReputationEntry>, ReputationError> {
        let addrs = self.read_list(&self.list_key())?;
        let mut entries = Vec::with_capacity(addrs.len());
        for addr in addrs {
            let addr: Address =
                addr.parse().map_err(|_| ReputationError::Store(crate::StoreError::Codec {
                    inner: format!("invalid address in reputation index: {addr}"),
                }))?;
            entries.push(self.get(&addr)?);
        }
        Ok(entries)
    }

    /// Clear all [ReputationEntries](ReputationEntry); white- and blacklists stay in place
    pub fn clear(&self) -> Result<(), ReputationError> {
        let key = self.list_key();
        for addr in self.read_list(&key)? {
            if let Ok(addr) = addr.parse::<Address>() {
                self.db.del(&self.entry_key(&addr))?;
            }
        }
        self.db.del(&key)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{memory::MemoryStore, store::Database};
    use chainguard_primitives::constants::validation::reputation::{
        BAN_SLACK, MIN_INCLUSION_RATE_DENOMINATOR, MIN_UNSTAKE_DELAY, THROTTLING_SLACK,
    };

    fn reputation() -> Reputation {
        Reputation::new(
            1337,
            MIN_INCLUSION_RATE_DENOMINATOR,
            THROTTLING_SLACK,
            BAN_SLACK,
            U256::from(1000),
            U256::from(MIN_UNSTAKE_DELAY),
            Database::new(Box::new(MemoryStore::new())),
        )
    }

    #[test]
    fn missing_entry_reads_as_zero() {
        let rep = reputation();
        let addr = Address::random();

        let ent = rep.get(&addr).unwrap();
        assert_eq!(ent.uo_seen, 0);
        assert_eq!(ent.uo_included, 0);
        assert_eq!(Status::from(rep.get_status(&addr).unwrap()), Status::OK);
    }

    #[test]
    fn counters_increment() {
        let rep = reputation();
        let addr = Address::random();

        rep.increment_seen(&addr).unwrap();
        rep.increment_seen(&addr).unwrap();
        rep.increment_included(&addr).unwrap();

        let ent = rep.get(&addr).unwrap();
        assert_eq!(ent.uo_seen, 2);
        assert_eq!(ent.uo_included, 1);
    }

    #[test]
    fn status_boundaries() {
        let rep = reputation();
        let addr = Address::random();

        for (seen, expected) in [
            (100u64, Status::OK),
            (101, Status::THROTTLED),
            (500, Status::THROTTLED),
            (501, Status::BANNED),
        ] {
            rep.set_entry(ReputationEntry {
                address: addr,
                uo_seen: seen,
                uo_included: 0,
                status: Status::OK.into(),
                last_update_time: 0,
            })
            .unwrap();
            assert_eq!(
                Status::from(rep.get_status(&addr).unwrap()),
                expected,
                "status at opsSeen={seen}"
            );
        }
    }

    #[test]
    fn status_monotone_in_included() {
        let rep = reputation();
        let addr = Address::random();
        let mut prev = Status::BANNED;

        for included in 0..101 {
            rep.set_entry(ReputationEntry {
                address: addr,
                uo_seen: 1000,
                uo_included: included,
                status: Status::OK.into(),
                last_update_time: 0,
            })
            .unwrap();
            let status = Status::from(rep.get_status(&addr).unwrap());
            assert!(status <= prev, "status regressed at opsIncluded={included}");
            prev = status;
        }
        assert_eq!(prev, Status::OK);
    }

    #[test]
    fn crashed_handle_ops_bans_entity() {
        let rep = reputation();
        let addr = Address::random();

        rep.crashed_handle_ops(&addr).unwrap();

        let ent = rep.get(&addr).unwrap();
        assert_eq!(ent.uo_seen, 100);
        assert_eq!(ent.uo_included, 0);
        assert_eq!(Status::from(rep.get_status(&addr).unwrap()), Status::BANNED);

        // an explicit reputation overwrite lifts the quarantine
        rep.set_entry(ReputationEntry {
            address: addr,
            uo_seen: 100,
            uo_included: 0,
            status: Status::OK.into(),
            last_update_time: 0,
        })
        .unwrap();
        assert_eq!(Status::from(rep.get_status(&addr).unwrap()), Status::OK);
    }

    #[test]
    fn hourly_decay_reduces_counters() {
        let now = now_secs();
        let ent = ReputationEntry {
            address: Address::random(),
            uo_seen: 480,
            uo_included: 24,
            status: Status::OK.into(),
            last_update_time: now - 2 * SECS_PER_HOUR - 10,
        };

        let decayed = Reputation::apply_decay(ent, now);
        // 480 -> 460 -> 441, 24 -> 23 -> 23
        assert_eq!(decayed.uo_seen, 441);
        assert_eq!(decayed.uo_included, 23);
        // anchor advances by whole hours only
        assert_eq!(decayed.last_update_time, now - 10);
    }

    #[test]
    fn check_stake_rules() {
        let rep = reputation();
        let addr = Address::random();

        let staked = StakeInfo {
            address: addr,
            stake: U256::from(1000),
            unstake_delay: U256::from(MIN_UNSTAKE_DELAY),
        };
        assert!(rep.check_stake("account", &staked).is_ok());

        let under_staked = StakeInfo { stake: U256::from(999), ..staked };
        assert!(matches!(
            rep.check_stake("account", &under_staked),
            Err(ReputationError::StakeTooLow { .. })
        ));

        let unstakes_early =
            StakeInfo { unstake_delay: U256::from(MIN_UNSTAKE_DELAY - 1), ..staked };
        assert!(matches!(
            rep.check_stake("account", &unstakes_early),
            Err(ReputationError::UnstakeDelayTooLow { .. })
        ));

        // whitelisted entities bypass every check
        rep.add_whitelist(&addr).unwrap();
        assert!(rep.check_stake("account", &under_staked).is_ok());
    }

    #[test]
    fn check_stake_rejects_banned() {
        let rep = reputation();
        let addr = Address::random();
        rep.crashed_handle_ops(&addr).unwrap();

        let staked = StakeInfo {
            address: addr,
            stake: U256::from(1000),
            unstake_delay: U256::from(MIN_UNSTAKE_DELAY),
        };
        assert!(matches!(
            rep.check_stake("paymaster", &staked),
            Err(ReputationError::BannedEntity { .. })
        ));
    }

    #[test]
    fn white_and_blacklists() {
        let rep = reputation();
        let wl = Address::random();
        let bl = Address::random();

        assert!(rep.add_whitelist(&wl).unwrap());
        assert!(!rep.add_whitelist(&wl).unwrap());
        assert!(rep.add_blacklist(&bl).unwrap());

        assert!(rep.is_whitelist(&wl).unwrap());
        assert!(!rep.is_whitelist(&bl).unwrap());
        assert!(rep.is_blacklist(&bl).unwrap());

        assert_eq!(Status::from(rep.get_status(&bl).unwrap()), Status::BANNED);

        assert!(rep.remove_whitelist(&wl).unwrap());
        assert!(!rep.remove_whitelist(&wl).unwrap());
        assert!(rep.remove_blacklist(&bl).unwrap());
        assert_eq!(Status::from(rep.get_status(&bl).unwrap()), Status::OK);
    }

    #[test]
    fn dump_and_clear() {
        let rep = reputation();
        let a = Address::random();
        let b = Address::random();

        rep.increment_seen(&a).unwrap();
        rep.increment_seen(&b).unwrap();
        assert_eq!(rep.get_all().unwrap().len(), 2);

        rep.clear().unwrap();
        assert!(rep.get_all().unwrap().is_empty());
    }
}
