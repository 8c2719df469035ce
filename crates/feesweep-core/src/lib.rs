//! # FeeSweep Core
//!
//! Shared vocabulary for the fee-sweep workspace: domain types, the collaborator
//! traits the engine is driven through, the error taxonomy and configuration.
//!
//! The engine never reaches for a process-wide client. Everything that talks to a
//! chain or a price feed is handed in as a trait object.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::FeeSweepConfig;
pub use error::{Result, SweepError};
pub use traits::{ChainClient, TokenSource};
pub use types::{
    Address, BalanceLookup, BalanceTaggedCandidate, IERC20, PreparedRequest, PriceCandidate,
    PriceMetadata, Receipt, TokenMetadata, TransferOperation, TxHandle, U256, WhitelistTokenMap,
};
