use crate::{bundler::Bundler, ethereum::SendBundleOp};
use chainguard_mempool::UserOpSimulator;
use chainguard_primitives::BundleMode;
use ethers::{providers::Middleware, types::H256};
use parking_lot::Mutex;
use std::{sync::Arc, time::Duration};
use tracing::{error, info};

/// Drives the [Bundler](Bundler): auto bundling on a periodic timer, manual bundling on
/// request, and the debug controls switching between the two
pub struct BundlerService<M, V, S>
where
    M: Middleware + 'static,
    V: UserOpSimulator + Send + Sync + 'static,
    S: SendBundleOp + 'static,
{
    bundler: Arc<Bundler<M, V, S>>,
    bundle_interval: Arc<Mutex<u64>>,
    min_pool_size: Arc<Mutex<usize>>,
    running: Arc<Mutex<bool>>,
}

impl<M, V, S> Clone for BundlerService<M, V, S>
where
    M: Middleware + 'static,
    V: UserOpSimulator + Send + Sync + 'static,
    S: SendBundleOp + 'static,
{
    fn clone(&self) -> Self {
        Self {
            bundler: self.bundler.clone(),
            bundle_interval: self.bundle_interval.clone(),
            min_pool_size: self.min_pool_size.clone(),
            running: self.running.clone(),
        }
    }
}

fn is_running(running: &Arc<Mutex<bool>>) -> bool {
    *running.lock()
}

impl<M, V, S> BundlerService<M, V, S>
where
    M: Middleware + 'static,
    V: UserOpSimulator + Send + Sync + 'static,
    S: SendBundleOp + 'static,
{
    pub fn new(bundler: Bundler<M, V, S>, bundle_interval: u64, min_pool_size: usize) -> Self {
        Self {
            bundler: Arc::new(bundler),
            bundle_interval: Arc::new(Mutex::new(bundle_interval)),
            min_pool_size: Arc::new(Mutex::new(min_pool_size)),
            running: Arc::new(Mutex::new(false)),
        }
    }

    pub fn is_running(&self) -> bool {
        is_running(&self.running)
    }

    pub fn bundle_interval(&self) -> u64 {
        *self.bundle_interval.lock()
    }

    pub fn min_pool_size(&self) -> usize {
        *self.min_pool_size.lock()
    }

    /// Sends the next bundle when forced, or when the mempool grew past the configured
    /// size threshold
    pub async fn try_bundle(&self, force: bool) -> eyre::Result<Option<H256>> {
        if !force {
            let count = self
                .bundler
                .mempool
                .count()
                .map_err(|err| eyre::format_err!("Counting mempool entries failed: {err:?}"))?;
            if count < self.min_pool_size() {
                return Ok(None);
            }
        }

        self.bundler.send_next_bundle().await
    }

    /// Immediately creates and sends the next bundle
    pub async fn send_bundle_now(&self) -> eyre::Result<Option<H256>> {
        self.bundler.send_next_bundle().await
    }

    /// Stops the auto bundling timer
    pub fn stop_bundling(&self) {
        info!("Stopping auto bundling");
        let mut r = self.running.lock();
        *r = false;
    }

    /// Starts the auto bundling timer; every tick forces a bundle attempt
    pub fn start_bundling(&self) {
        if !self.is_running() {
            let interval = self.bundle_interval();
            info!("Starting auto bundling with interval of {interval} seconds");

            {
                let mut r = self.running.lock();
                *r = true;
            }

            let this = self.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_secs(interval));
                // the immediate first tick would bundle before any operation arrived
                interval.tick().await;
                loop {
                    interval.tick().await;
                    if !is_running(&this.running) {
                        break;
                    }

                    if let Err(err) = this.try_bundle(true).await {
                        error!("Error while sending bundle: {err:?}");
                    }
                }
            });
        }
    }

    /// Switches between auto and manual bundling
    pub fn set_bundle_mode(&self, mode: BundleMode) {
        match mode {
            BundleMode::Auto => self.start_bundling(),
            BundleMode::Manual => self.stop_bundling(),
        }
    }

    /// Changes the auto bundling interval, restarting the timer when it is running
    pub fn set_bundle_interval(&self, interval: u64) {
        {
            let mut int = self.bundle_interval.lock();
            *int = interval;
        }
        if self.is_running() {
            self.stop_bundling();
            self.start_bundling();
        }
    }

    /// Changes the size threshold for size-triggered bundling, restarting the timer when
    /// it is running
    pub fn set_min_pool_size(&self, size: usize) {
        {
            let mut min = self.min_pool_size.lock();
            *min = size;
        }
        if self.is_running() {
            self.stop_bundling();
            self.start_bundling();
        }
    }
}
