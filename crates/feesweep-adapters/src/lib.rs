//! # FeeSweep Adapters
//!
//! Concrete collaborators behind the core traits:
//! - [`JsonRpcClient`]: Ethereum JSON-RPC through an alloy provider (`ChainClient`)
//! - [`PriceApiClient`]: token whitelist and USD prices (`TokenSource`)
//! - [`SwapClient`]: allowance / approve / swap transactions from the same API

pub mod price_api;
pub mod rpc;
pub mod swap;

pub use price_api::PriceApiClient;
pub use rpc::JsonRpcClient;
pub use swap::{CallSender, SwapApi, SwapClient, SwapParams, SwapTx, execute_swap};
