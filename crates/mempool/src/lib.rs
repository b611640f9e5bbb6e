//! User operation mempool, reputation accounting, and validation services

pub mod error;
pub mod memory;
pub mod mempool;
pub mod reputation;
pub mod store;
pub mod utils;
pub mod validate;

pub use error::{MempoolError, MempoolErrorKind, ReputationError, SimulationError, StoreError};
pub use memory::MemoryStore;
pub use mempool::Mempool;
pub use reputation::Reputation;
pub use store::{Database, KeyValueOp};
pub use validate::{
    ReturnInfo, TraceCheck, UserOpSimulator, UserOpValidationResult, UserOpValidationService,
};
