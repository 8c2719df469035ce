//! # FeeSweep Transfer
//!
//! The fee-transfer tick: fetch priced tokens, keep the ones the holder actually
//! has a balance of, and move each balance to the fee collector with retry.
//!
//! ```text
//! FeeTransferJob::run_tick
//!   ├── TokenSource: whitelist + prices
//!   └── for each chunk (in order)
//!         ├── BalanceFilter.filter_chunk   → one batched balance query
//!         └── TransferOrchestrator.run     → fee gate, then per-token retried transfer
//! ```

pub mod batch;
pub mod filter;
pub mod orchestrator;
pub mod sweep;

#[cfg(test)]
mod mock;

pub use batch::TransferBatch;
pub use filter::BalanceFilter;
pub use orchestrator::{FeeAbort, TransferFailure, TransferOrchestrator, TransferReport, TransferSettings};
pub use sweep::{FeeTransferJob, TickSummary};
