//! Account abstraction (ERC-4337)-related constants

/// Entry point smart contract
pub mod entry_point {
    /// Address of the entry point smart contract
    pub const ADDRESS: &str = "0x5FF137D4b0FDCD49DcA30c7CF57E578a026d2789";
    /// Version of the entry point smart contract
    pub const VERSION: &str = "0.6.0";
}

/// Bundler
pub mod bundler {
    /// Default time interval for auto bundling mode (in seconds)
    pub const BUNDLE_INTERVAL: u64 = 15;
    /// Default mempool size that triggers size-based bundling
    pub const MIN_POOL_SIZE: usize = 2;
}

/// User operation mempool
pub mod mempool {
    /// Percentage increase of gas price to replace a user operation in the mempool
    pub const GAS_INCREASE_PERC: u64 = 10;
    /// Depth scan (in blocks) when searching for user operation events
    pub const LATEST_SCAN_DEPTH: u64 = 1000;
}

/// User operation validation
pub mod validation {
    /// Entities (factory, sender/account, paymaster, aggregator)
    pub mod entities {
        pub const FACTORY: &str = "factory";
        pub const SENDER: &str = "account";
        pub const PAYMASTER: &str = "paymaster";
        pub const AGGREGATOR: &str = "aggregator";
    }

    /// Reputation
    /// <https://github.com/eth-infinitism/account-abstraction/blob/develop/eip/EIPS/eip-aa-rules.md#constants>
    pub mod reputation {
        pub const MIN_UNSTAKE_DELAY: u64 = 86400;
        pub const SAME_SENDER_MEMPOOL_COUNT: usize = 4;
        pub const THROTTLED_ENTITY_BUNDLE_COUNT: usize = 1;
        pub const MIN_INCLUSION_RATE_DENOMINATOR: u64 = 10;
        pub const THROTTLING_SLACK: u64 = 10;
        pub const BAN_SLACK: u64 = 50;
        /// Number of seen operations assigned to an entity that reverted `handleOps` on chain
        pub const CRASHED_HANDLE_OPS_SEEN: u64 = 100;
    }
}

/// RPC error codes
pub mod rpc_error_codes {
    pub const VALIDATION: i32 = -32500;
    pub const PAYMASTER: i32 = -32501;
    pub const OPCODE: i32 = -32502;
    pub const EXPIRATION: i32 = -32503;
    pub const ENTITY_BANNED: i32 = -32504;
    pub const STAKE_TOO_LOW: i32 = -32505;
    pub const SIGNATURE: i32 = -32507;
    pub const EXECUTION: i32 = -32521;
    pub const USER_OPERATION_HASH: i32 = -32601;
    pub const SANITY_CHECK: i32 = -32602;
}

/// RPC
pub mod rpc {
    /// The default port for HTTP
    pub const HTTP_PORT: u16 = 3000;
}

/// Call bounds towards the execution client
pub mod timeouts {
    /// Upper bound for a `simulateValidation` round-trip (in seconds)
    pub const SIMULATE_TIMEOUT: u64 = 10;
    /// Upper bound for a `handleOps` submission (in seconds)
    pub const SUBMIT_TIMEOUT: u64 = 30;
}
