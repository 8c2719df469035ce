//! Collaborator interfaces consumed by the engine.
//!
//! Implementations live in `feesweep-adapters` (JSON-RPC, HTTP) and in the test
//! mocks of each crate.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{
    Address, BalanceLookup, PreparedRequest, PriceCandidate, Receipt, TransferOperation, TxHandle,
    WhitelistTokenMap,
};

/// Source of the tokens worth sweeping.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Tokens the protocol recognises, keyed by address.
    async fn whitelisted_tokens(&self) -> Result<WhitelistTokenMap>;

    /// Priced candidates, in feed order.
    async fn token_prices(&self) -> Result<Vec<PriceCandidate>>;
}

/// Ledger operations needed to inspect balances and submit transfers.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// One batched query for `holder`'s balance of every token in `tokens`.
    ///
    /// `Err` means the batch as a whole failed. Individual lookups that fail
    /// inside a successful batch are reported per address.
    async fn query_balances(
        &self,
        tokens: &[Address],
        holder: Address,
    ) -> Result<Vec<(Address, BalanceLookup)>>;

    /// Current network fee level (gas price, in wei).
    async fn current_fee_level(&self) -> Result<u128>;

    async fn estimate_cost(&self, operation: &TransferOperation) -> Result<u64>;

    async fn prepare_request(
        &self,
        operation: &TransferOperation,
        cost: u64,
        fee_level: u128,
    ) -> Result<PreparedRequest>;

    async fn submit(&self, request: &PreparedRequest) -> Result<TxHandle>;

    /// Wait until `tx` is settled `confirmations` blocks deep.
    async fn await_confirmation(&self, tx: &TxHandle, confirmations: u64) -> Result<Receipt>;
}
