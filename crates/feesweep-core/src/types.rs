//! Domain types shared by the scheduler, the transfer pipeline and the adapters.

use std::collections::HashMap;
use std::fmt;

pub use alloy_primitives::{Address, U256};
use alloy_sol_types::{SolCall, sol};
use serde::{Deserialize, Serialize};

sol! {
    /// The two ERC-20 calls a sweep makes.
    interface IERC20 {
        function transfer(address to, uint256 amount) external returns (bool);
        function balanceOf(address account) external view returns (uint256);
    }
}

/// Token metadata from the whitelist endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub symbol: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_decimals")]
    pub decimals: u8,
}

fn default_decimals() -> u8 {
    18
}

pub type WhitelistTokenMap = HashMap<Address, TokenMetadata>;

/// Price details attached to a candidate. Carried along for logging only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceMetadata {
    #[serde(alias = "price")]
    pub price_usd: f64,
    #[serde(default)]
    pub symbol: Option<String>,
}

/// An asset the price feed knows about. Fetched fresh every tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceCandidate {
    pub address: Address,
    #[serde(flatten)]
    pub price: PriceMetadata,
}

impl PriceCandidate {
    pub fn new(address: Address, price_usd: f64) -> Self {
        Self {
            address,
            price: PriceMetadata {
                price_usd,
                symbol: None,
            },
        }
    }
}

/// Per-address outcome of a batched balance query.
pub type BalanceLookup = Result<U256, String>;

/// A candidate tagged with its current balance. `balance == 0` means "not eligible".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceTaggedCandidate {
    pub address: Address,
    pub balance: U256,
}

/// One unsent transfer intent: move `amount` of token `target` to `destination`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferOperation {
    pub target: Address,
    pub amount: U256,
    pub destination: Address,
}

impl TransferOperation {
    pub fn new(target: Address, amount: U256, destination: Address) -> Self {
        Self {
            target,
            amount,
            destination,
        }
    }

    /// ABI calldata for `transfer(destination, amount)` on the token contract.
    pub fn call_data(&self) -> Vec<u8> {
        IERC20::transferCall {
            to: self.destination,
            amount: self.amount,
        }
        .abi_encode()
    }
}

/// A transfer with gas, fee and chain context merged in, ready to submit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreparedRequest {
    pub operation: TransferOperation,
    pub gas_limit: u64,
    pub gas_price: u128,
    pub chain_id: u64,
    pub nonce: Option<u64>,
}

/// Hash of a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxHandle(pub String);

impl fmt::Display for TxHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Settlement record for a confirmed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub tx_hash: TxHandle,
    pub block_hash: String,
    pub block_number: u64,
    pub success: bool,
}
