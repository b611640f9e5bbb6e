use crate::ethereum::SendBundleOp;
use chainguard_contracts::{gen::entry_point_api::FailedOp, EntryPoint, EntryPointError, Multicall};
use chainguard_mempool::{Mempool, Reputation, UserOpSimulator};
use chainguard_primitives::{
    constants::validation::reputation::THROTTLED_ENTITY_BUNDLE_COUNT, get_address,
    reputation::Status, MempoolEntry, UserOperation, Wallet,
};
use ethers::{
    providers::Middleware,
    types::{Address, H256, U256},
};
use eyre::format_err;
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::Duration,
};
use tracing::{debug, error, info, warn};

/// Assembles conflict-free bundles out of the mempool and dispatches them as `handleOps`
/// transactions signed by the relayer wallet
pub struct Bundler<M, V, S>
where
    M: Middleware + 'static,
    V: UserOpSimulator,
    S: SendBundleOp,
{
    /// Relayer wallet signing the bundle transactions
    pub wallet: Wallet,
    /// Connection to the Ethereum execution client
    pub eth_client: Arc<M>,
    /// The [EIP-155](https://eips.ethereum.org/EIPS/eip-155) chain ID
    pub chain_id: u64,
    /// Configured receiver of the gas refunds; `None` makes the relayer refund itself
    pub beneficiary: Option<Address>,
    /// Balance under which the relayer starts refunding itself
    pub min_signer_balance: U256,
    /// Multicall contract batching the hash resolution
    pub multicall: Multicall<M>,
    /// Pending user operation store
    pub mempool: Mempool,
    /// Reputation registry
    pub reputation: Reputation,
    /// Second-validation service
    pub validator: Arc<V>,
    /// Transaction submission client
    pub relay: S,
    /// Upper bound for a `handleOps` submission
    pub submit_timeout: Duration,
    /// Exclusive lock over bundle creation + submission + postmortem
    mutex: Arc<tokio::sync::Mutex<()>>,
}

impl<M, V, S> Bundler<M, V, S>
where
    M: Middleware + 'static,
    V: UserOpSimulator,
    S: SendBundleOp,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        wallet: Wallet,
        eth_client: Arc<M>,
        chain_id: u64,
        beneficiary: Option<Address>,
        min_signer_balance: U256,
        multicall: Multicall<M>,
        mempool: Mempool,
        reputation: Reputation,
        validator: Arc<V>,
        relay: S,
        submit_timeout: Duration,
    ) -> Self {
        Self {
            wallet,
            eth_client,
            chain_id,
            beneficiary,
            min_signer_balance,
            multicall,
            mempool,
            reputation,
            validator,
            relay,
            submit_timeout,
            mutex: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    /// Creates and sends the next bundle under the exclusive lock.
    ///
    /// The cost-sorted snapshot is grouped by entry point; one bundle per entry point is
    /// assembled and dispatched. Returns the hash of the last submitted transaction, or
    /// `None` when the mempool yielded no sendable bundle.
    pub async fn send_next_bundle(&self) -> eyre::Result<Option<H256>> {
        let _guard = self.mutex.lock().await;

        let sorted = self
            .mempool
            .get_sorted()
            .map_err(|err| format_err!("Getting sorted mempool entries failed: {err:?}"))?;
        if sorted.is_empty() {
            return Ok(None);
        }

        let mut groups: Vec<(Address, Vec<MempoolEntry>)> = Vec::new();
        for entry in sorted {
            match groups.iter_mut().find(|(ep, _)| *ep == entry.entry_point) {
                Some((_, entries)) => entries.push(entry),
                None => groups.push((entry.entry_point, vec![entry])),
            }
        }

        let mut last_tx = None;
        for (ep_addr, candidates) in groups {
            let entry_point = EntryPoint::new(self.eth_client.clone(), ep_addr);
            let bundle = self.create_bundle(&entry_point, candidates).await?;
            if bundle.is_empty() {
                continue;
            }
            if let Some(tx_hash) = self.send_bundle(&entry_point, bundle).await? {
                last_tx = Some(tx_hash);
            }
        }

        Ok(last_tx)
    }

    /// Admission pass over a cost-sorted snapshot of one entry point's pending operations.
    ///
    /// Banned paymasters and factories get their operations purged, throttled ones are
    /// capped per bundle, senders appear at most once, every candidate is re-simulated,
    /// and paymaster prefunds are checked against the entry point deposit.
    pub async fn create_bundle(
        &self,
        entry_point: &EntryPoint<M>,
        candidates: Vec<MempoolEntry>,
    ) -> eyre::Result<Vec<MempoolEntry>> {
        let mut bundle = Vec::new();
        let mut senders: HashSet<Address> = HashSet::new();
        let mut paymaster_deposit: HashMap<Address, U256> = HashMap::new();
        let mut staked_entity_count: HashMap<Address, usize> = HashMap::new();

        for entry in candidates {
            let uo = &entry.user_operation;
            let paymaster = get_address(&uo.paymaster_and_data);
            let factory = get_address(&uo.init_code);

            if let Some(paymaster) = paymaster {
                let status = Status::from(
                    self.reputation
                        .get_status(&paymaster)
                        .map_err(|err| format_err!("Getting reputation status failed: {err:?}"))?,
                );
                let count = staked_entity_count.get(&paymaster).cloned().unwrap_or(0);

                match status {
                    Status::BANNED => {
                        warn!(
                            "Purging {:?}, paymaster {paymaster:?} is banned",
                            entry.hash
                        );
                        self.mempool.remove(&entry).map_err(|err| {
                            format_err!("Removing a banned user operation failed: {err:?}")
                        })?;
                        continue;
                    }
                    Status::THROTTLED if count >= THROTTLED_ENTITY_BUNDLE_COUNT => {
                        debug!("Skipping {:?}, paymaster {paymaster:?} is throttled", entry.hash);
                        continue;
                    }
                    _ => (),
                }
            }

            if let Some(factory) = factory {
                let status = Status::from(
                    self.reputation
                        .get_status(&factory)
                        .map_err(|err| format_err!("Getting reputation status failed: {err:?}"))?,
                );
                let count = staked_entity_count.get(&factory).cloned().unwrap_or(0);

                match status {
                    Status::BANNED => {
                        warn!("Purging {:?}, factory {factory:?} is banned", entry.hash);
                        self.mempool.remove(&entry).map_err(|err| {
                            format_err!("Removing a banned user operation failed: {err:?}")
                        })?;
                        continue;
                    }
                    Status::THROTTLED if count >= THROTTLED_ENTITY_BUNDLE_COUNT => {
                        debug!("Skipping {:?}, factory {factory:?} is throttled", entry.hash);
                        continue;
                    }
                    _ => (),
                }
            }

            if senders.contains(&uo.sender) {
                continue;
            }

            let val_out = self
                .validator
                .simulate_complete_validation(uo, &entry_point.address())
                .await;

            let val_out = match val_out {
                Ok(val_out) => val_out,
                Err(err) => {
                    debug!("Purging {:?}, second validation failed: {err:?}", entry.hash);
                    self.mempool.remove(&entry).map_err(|err| {
                        format_err!(
                            "Removing a user operation with failed second validation failed: {err:?}"
                        )
                    })?;
                    continue;
                }
            };

            if let Some(paymaster) = paymaster {
                let deposit = match paymaster_deposit.get(&paymaster) {
                    Some(deposit) => *deposit,
                    None => entry_point.balance_of(&paymaster).await.map_err(|err| {
                        format_err!("Getting balance of paymaster {paymaster:?} failed: {err:?}")
                    })?,
                };

                if deposit < val_out.return_info.prefund {
                    debug!(
                        "Skipping {:?}, paymaster {paymaster:?} deposit is depleted",
                        entry.hash
                    );
                    continue;
                }

                paymaster_deposit
                    .insert(paymaster, deposit.saturating_sub(val_out.return_info.prefund));
                staked_entity_count.entry(paymaster).and_modify(|c| *c += 1).or_insert(1);
            }

            if let Some(factory) = factory {
                staked_entity_count.entry(factory).and_modify(|c| *c += 1).or_insert(1);
            }

            senders.insert(uo.sender);
            bundle.push(entry);
        }

        Ok(bundle)
    }

    /// Dispatches an assembled bundle as one `handleOps` transaction.
    ///
    /// On success the included entries leave the mempool and their entities get credited;
    /// a decoded `FailedOp` triggers the reputation postmortem instead.
    pub async fn send_bundle(
        &self,
        entry_point: &EntryPoint<M>,
        bundle: Vec<MempoolEntry>,
    ) -> eyre::Result<Option<H256>> {
        if bundle.is_empty() {
            return Ok(None);
        }

        info!(
            "Sending bundle of {} user operations to entry point {:?}",
            bundle.len(),
            entry_point.address()
        );

        let beneficiary = self.select_beneficiary().await?;
        let uos: Vec<UserOperation> =
            bundle.iter().map(|entry| entry.user_operation.clone()).collect();
        let tx = entry_point.handle_ops_tx(uos.clone(), beneficiary);

        let res = match tokio::time::timeout(self.submit_timeout, self.relay.send_bundle(tx)).await
        {
            Ok(res) => res,
            Err(_) => {
                error!("Bundle submission timed out, dropping bundle");
                return Ok(None);
            }
        };

        match res {
            Ok(tx_hash) => {
                info!("Bundle landed in transaction {tx_hash:?}");

                for entry in &bundle {
                    self.mempool
                        .remove(entry)
                        .map_err(|err| format_err!("Removing included entry failed: {err:?}"))?;

                    let (sender, factory, paymaster) = entry.user_operation.get_entities();
                    self.reputation.increment_included(&sender).ok();
                    if let Some(factory) = factory {
                        self.reputation.increment_included(&factory).ok();
                    }
                    if let Some(paymaster) = paymaster {
                        self.reputation.increment_included(&paymaster).ok();
                    }
                    if let Some(aggregator) = entry.aggregator {
                        self.reputation.increment_included(&aggregator).ok();
                    }
                }

                // hashes are observability only, a failed batch lookup must not undo the send
                match self.multicall.get_user_op_hashes(&entry_point.address(), &uos).await {
                    Ok(hashes) => debug!("Bundle user operation hashes: {hashes:?}"),
                    Err(err) => warn!("Resolving user operation hashes failed: {err:?}"),
                }

                Ok(Some(tx_hash))
            }
            Err(EntryPointError::FailedOp(op)) => {
                warn!("handleOps reverted with {op}");
                self.handle_failed_op(&bundle, op)?;
                Ok(None)
            }
            Err(err) => {
                error!("Sending bundle failed: {err:?}, dropping bundle");
                Ok(None)
            }
        }
    }

    /// Postmortem for an on-chain `FailedOp` revert: quarantine the paymaster or factory
    /// whose off-chain simulation lied, or drop the offending entry
    fn handle_failed_op(&self, bundle: &[MempoolEntry], op: FailedOp) -> eyre::Result<()> {
        if op.paymaster != Address::zero() {
            self.reputation
                .crashed_handle_ops(&op.paymaster)
                .map_err(|err| format_err!("Banning paymaster failed: {err:?}"))?;
            return Ok(());
        }

        let offender = bundle.get(op.op_index.low_u64() as usize);
        let Some(offender) = offender else {
            warn!("FailedOp index {} out of bundle bounds", op.op_index);
            return Ok(());
        };

        if op.reason.starts_with("AA1") {
            if let Some(factory) = get_address(&offender.user_operation.init_code) {
                self.reputation
                    .crashed_handle_ops(&factory)
                    .map_err(|err| format_err!("Banning factory failed: {err:?}"))?;
                return Ok(());
            }
        }

        self.mempool
            .remove(offender)
            .map_err(|err| format_err!("Removing offending entry failed: {err:?}"))?;
        Ok(())
    }

    /// Returns the configured beneficiary, or the relayer's own address when no
    /// beneficiary is configured or the relayer balance ran low
    pub async fn select_beneficiary(&self) -> eyre::Result<Address> {
        let balance = self
            .eth_client
            .get_balance(self.wallet.address(), None)
            .await
            .map_err(|err| format_err!("Getting relayer balance failed: {err:?}"))?;

        match self.beneficiary {
            Some(beneficiary) if balance > self.min_signer_balance => Ok(beneficiary),
            Some(_) => {
                info!("Relayer balance {balance} at or below minimum, refunding the relayer");
                Ok(self.wallet.address())
            }
            None => Ok(self.wallet.address()),
        }
    }
}
