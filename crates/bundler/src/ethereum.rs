use async_trait::async_trait;
use chainguard_contracts::{error::EntryPointError, gen::entry_point_api::EntryPointAPIErrors};
use chainguard_primitives::Wallet;
use ethers::{
    middleware::SignerMiddleware,
    providers::Middleware,
    signers::{LocalWallet, Signer},
    types::{transaction::eip2718::TypedTransaction, H256},
};
use std::{sync::Arc, time::Duration};
use tracing::trace;

/// Ability to submit a bundle transaction to the chain
#[async_trait]
pub trait SendBundleOp: Send + Sync {
    /// Submits the signed `handleOps` transaction and waits for it to be mined.
    ///
    /// A revert decoded as `FailedOp` surfaces as [EntryPointError::FailedOp] so the
    /// caller can run its postmortem.
    async fn send_bundle(&self, bundle: TypedTransaction) -> Result<H256, EntryPointError>;
}

/// A type alias for the Ethereum signer client
#[derive(Clone)]
pub struct EthereumClient<M>(pub SignerMiddleware<Arc<M>, LocalWallet>);

impl<M> EthereumClient<M>
where
    M: Middleware + 'static,
{
    /// Create an Ethereum client signing with the relayer wallet
    pub fn new(eth_client: Arc<M>, wallet: Wallet) -> Self {
        let signer = SignerMiddleware::new(eth_client, wallet.signer);
        Self(signer)
    }
}

#[async_trait]
impl<M> SendBundleOp for EthereumClient<M>
where
    M: Middleware + 'static,
{
    async fn send_bundle(&self, bundle: TypedTransaction) -> Result<H256, EntryPointError> {
        trace!("Sending transaction to the execution client: {bundle:?}");

        let mut tx = bundle;

        let nonce = self
            .0
            .get_transaction_count(self.0.signer().address(), None)
            .await
            .map_err(|err| EntryPointError::Provider { inner: format!("nonce error: {err:?}") })?;
        tx.set_nonce(nonce);

        let (max_fee_per_gas, max_priority_fee_per_gas) =
            self.0.estimate_eip1559_fees(None).await.map_err(|err| EntryPointError::Provider {
                inner: format!("fee estimation error: {err:?}"),
            })?;
        match tx {
            TypedTransaction::Eip1559(ref mut inner) => {
                inner.max_fee_per_gas = Some(max_fee_per_gas);
                inner.max_priority_fee_per_gas = Some(max_priority_fee_per_gas);
            }
            _ => {
                tx.set_gas_price(max_fee_per_gas);
            }
        };

        let pending = self.0.send_transaction(tx, None).await.map_err(|err| {
            match EntryPointError::from_middleware_error::<SignerMiddleware<Arc<M>, LocalWallet>>(
                err,
            ) {
                Ok(EntryPointAPIErrors::FailedOp(op)) => EntryPointError::FailedOp(op),
                Ok(op) => EntryPointError::Other { inner: format!("handle ops error: {op:?}") },
                Err(err) => err,
            }
        })?;

        let pending = pending.interval(Duration::from_millis(75));
        let tx_hash = pending.tx_hash();

        let tx_receipt = pending.await.map_err(|err| EntryPointError::Provider {
            inner: format!("transaction receipt error: {err:?}"),
        })?;

        trace!("Transaction receipt: {tx_receipt:?}");

        Ok(tx_hash)
    }
}
