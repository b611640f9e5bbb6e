use chainguard_primitives::{
    constants::{
        bundler::{BUNDLE_INTERVAL, MIN_POOL_SIZE},
        entry_point,
        rpc::HTTP_PORT,
        timeouts::{SIMULATE_TIMEOUT, SUBMIT_TIMEOUT},
        validation::reputation::{
            BAN_SLACK, MIN_INCLUSION_RATE_DENOMINATOR, MIN_UNSTAKE_DELAY, THROTTLING_SLACK,
        },
    },
    utils::{parse_address, parse_u256},
};
use clap::Parser;
use ethers::types::{Address, U256};
use std::net::{IpAddr, Ipv4Addr};

/// Multicall3, deployed at the same address on every supported chain
const MULTICALL_ADDRESS: &str = "0xcA11bde05977b3631167028862bE2a173976CA11";

/// Bundler CLI options
#[derive(Clone, Debug, Parser)]
#[command(name = "chainguard", about = "Account abstraction (ERC-4337) bundler")]
pub struct Opts {
    /// Ethereum execution client RPC endpoint.
    #[clap(long, default_value = "http://127.0.0.1:8545")]
    pub eth_client_address: String,

    /// Expected chain ID; startup fails when the execution client disagrees.
    #[clap(long)]
    pub chain_id: Option<u64>,

    /// Entry point addresses served by this bundler.
    #[clap(long, value_delimiter = ',', value_parser=parse_address, default_value = entry_point::ADDRESS)]
    pub entry_points: Vec<Address>,

    /// Private key of the relayer wallet signing the bundles.
    #[clap(long)]
    pub private_key: String,

    /// The bundler beneficiary address receiving the gas refunds.
    #[clap(long, value_parser=parse_address)]
    pub beneficiary: Option<Address>,

    /// The minimum balance required for the relayer; below this the relayer refunds itself.
    #[clap(long, default_value = "100000000000000000", value_parser=parse_u256)]
    pub min_balance: U256,

    /// Address of the Multicall3 contract used for batched entry point lookups.
    #[clap(long, value_parser=parse_address, default_value = MULTICALL_ADDRESS)]
    pub multicall: Address,

    /// Minimum stake required for entities.
    #[clap(long, default_value = "1", value_parser=parse_u256)]
    pub min_stake: U256,

    /// Minimum unstake delay (in seconds) required for entities.
    #[clap(long, default_value_t = MIN_UNSTAKE_DELAY)]
    pub min_unstake_delay: u64,

    /// Minimum inclusion denominator of the reputation formula.
    #[clap(long, default_value_t = MIN_INCLUSION_RATE_DENOMINATOR)]
    pub min_inclusion_denominator: u64,

    /// Throttling slack of the reputation formula.
    #[clap(long, default_value_t = THROTTLING_SLACK)]
    pub throttling_slack: u64,

    /// Ban slack of the reputation formula.
    #[clap(long, default_value_t = BAN_SLACK)]
    pub ban_slack: u64,

    /// Addresses of whitelisted entities, bypassing reputation and stake checks.
    #[clap(long, value_delimiter = ',', value_parser=parse_address)]
    pub whitelist: Vec<Address>,

    /// Addresses of blacklisted entities, rejected before any other check.
    #[clap(long, value_delimiter = ',', value_parser=parse_address)]
    pub blacklist: Vec<Address>,

    /// Whether the bundler should send bundles only upon request.
    ///
    /// By default, this option is set to false.
    /// - To enable: `--manual-bundle-mode`.
    /// - To disable: no `--manual-bundle-mode` flag.
    #[clap(long)]
    pub manual_bundle_mode: bool,

    /// The auto bundle interval in seconds.
    #[clap(long, default_value_t = BUNDLE_INTERVAL)]
    pub bundle_interval: u64,

    /// Mempool size that triggers size-based bundling.
    #[clap(long, default_value_t = MIN_POOL_SIZE)]
    pub min_pool_size: usize,

    /// Upper bound for a simulateValidation round-trip, in seconds.
    #[clap(long, default_value_t = SIMULATE_TIMEOUT)]
    pub simulate_timeout: u64,

    /// Upper bound for a handleOps submission, in seconds.
    #[clap(long, default_value_t = SUBMIT_TIMEOUT)]
    pub submit_timeout: u64,

    /// HTTP RPC address to listen on.
    #[clap(long = "http.addr", default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    pub http_addr: IpAddr,

    /// HTTP RPC port to listen on.
    #[clap(long = "http.port", default_value_t = HTTP_PORT)]
    pub http_port: u16,

    /// Configures the allowed CORS domains.
    #[clap(long = "http.corsdomain", value_delimiter = ',', default_value = "*")]
    pub http_corsdomain: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn parse_opts() {
        let args = vec![
            "chainguard",
            "--eth-client-address",
            "http://127.0.0.1:8545",
            "--private-key",
            "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318",
            "--beneficiary",
            "0x690B9A9E9aa1C9dB991C7721a92d351Db4FaC990",
            "--min-balance",
            "100000000000000000",
            "--bundle-interval",
            "15",
            "--min-pool-size",
            "100",
            "--http.port",
            "4337",
        ];
        let opts = Opts::try_parse_from(args).unwrap();

        assert_eq!(
            opts.beneficiary,
            Some(Address::from_str("0x690B9A9E9aa1C9dB991C7721a92d351Db4FaC990").unwrap())
        );
        assert_eq!(opts.min_balance, U256::from(100000000000000000u64));
        assert_eq!(opts.bundle_interval, 15);
        assert_eq!(opts.min_pool_size, 100);
        assert_eq!(opts.http_port, 4337);
        assert_eq!(
            opts.entry_points,
            vec![Address::from_str(entry_point::ADDRESS).unwrap()]
        );
        assert_eq!(opts.multicall, Address::from_str(MULTICALL_ADDRESS).unwrap());
    }
}
