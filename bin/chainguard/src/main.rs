mod cli;

use chainguard_bundler::{Bundler, BundlerService, EthereumClient};
use chainguard_contracts::Multicall;
use chainguard_mempool::{
    Database, MemoryStore, Mempool, Reputation, UserOpValidationService,
};
use chainguard_primitives::{provider::create_http_provider, Wallet};
use chainguard_rpc::{
    debug::DebugApiServerImpl, debug_api::DebugApiServer, eth::EthApiServerImpl,
    eth_api::EthApiServer, JsonRpcServer,
};
use clap::Parser;
use cli::Opts;
use ethers::providers::Middleware;
use eyre::{ensure, format_err};
use std::{sync::Arc, time::Duration};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let opts = Opts::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let eth_client = Arc::new(
        create_http_provider(&opts.eth_client_address, Duration::from_millis(500)).await?,
    );
    let chain_id = eth_client
        .get_chainid()
        .await
        .map_err(|err| format_err!("Connecting to {} failed: {err:?}", opts.eth_client_address))?
        .as_u64();
    if let Some(expected) = opts.chain_id {
        ensure!(
            chain_id == expected,
            "Execution client serves chain {chain_id}, expected {expected}"
        );
    }
    info!("Connected to {} (chain {chain_id})", opts.eth_client_address);

    let wallet = Wallet::from_key(&opts.private_key, chain_id)?;
    info!("Relayer address: {:?}", wallet.address());

    let db = Database::new(Box::new(MemoryStore::new()));
    db.start().map_err(|err| format_err!("Starting the store failed: {err:?}"))?;

    let reputation = Reputation::new(
        chain_id,
        opts.min_inclusion_denominator,
        opts.throttling_slack,
        opts.ban_slack,
        opts.min_stake,
        opts.min_unstake_delay.into(),
        db.clone(),
    );
    for addr in &opts.whitelist {
        reputation.add_whitelist(addr).map_err(|err| format_err!("{err:?}"))?;
    }
    for addr in &opts.blacklist {
        reputation.add_blacklist(addr).map_err(|err| format_err!("{err:?}"))?;
    }

    let mempool = Mempool::new(chain_id, db.clone(), reputation.clone());
    let validator = Arc::new(UserOpValidationService::new(
        eth_client.clone(),
        Duration::from_secs(opts.simulate_timeout),
    ));

    let relay = EthereumClient::new(eth_client.clone(), wallet.clone());
    let bundler = Bundler::new(
        wallet,
        eth_client.clone(),
        chain_id,
        opts.beneficiary,
        opts.min_balance,
        Multicall::new(eth_client.clone(), opts.multicall),
        mempool.clone(),
        reputation.clone(),
        validator.clone(),
        relay,
        Duration::from_secs(opts.submit_timeout),
    );

    let bundler_service = BundlerService::new(bundler, opts.bundle_interval, opts.min_pool_size);
    if !opts.manual_bundle_mode {
        bundler_service.start_bundling();
    }

    let mut server = JsonRpcServer::new(format!("{}:{}", opts.http_addr, opts.http_port))
        .with_cors(opts.http_corsdomain.clone());
    server.add_method(
        EthApiServerImpl {
            eth_client: eth_client.clone(),
            chain_id,
            entry_points: opts.entry_points.clone(),
            mempool: mempool.clone(),
            validator,
        }
        .into_rpc(),
    )?;
    server.add_method(
        DebugApiServerImpl {
            entry_points: opts.entry_points.clone(),
            mempool,
            reputation,
            bundler_service,
        }
        .into_rpc(),
    )?;

    let _server_handle = server.start().await?;
    info!(
        "JSON-RPC server listening on {}:{}, serving entry points {:?}",
        opts.http_addr, opts.http_port, opts.entry_points
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    db.stop().map_err(|err| format_err!("Stopping the store failed: {err:?}"))?;

    Ok(())
}
