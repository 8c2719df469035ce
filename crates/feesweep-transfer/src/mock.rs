//! In-memory collaborators for tests. Every call is recorded in order.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use feesweep_core::{
    Address, BalanceLookup, ChainClient, PreparedRequest, PriceCandidate, Receipt, Result,
    SweepError, TokenMetadata, TokenSource, TransferOperation, TxHandle, U256, WhitelistTokenMap,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    QueryBalances(Vec<Address>),
    FeeLevel,
    Estimate(Address),
    Prepare(Address),
    Submit(Address),
    Confirm(Address),
}

pub fn addr(n: u32) -> Address {
    let mut bytes = [0u8; 20];
    bytes[16..].copy_from_slice(&n.to_be_bytes());
    Address::new(bytes)
}

pub fn collector() -> Address {
    Address::repeat_byte(0xfe)
}

pub fn holder() -> Address {
    Address::repeat_byte(0xab)
}

#[derive(Default)]
pub struct MockChain {
    pub balances: HashMap<Address, BalanceLookup>,
    pub fee_level: u128,
    /// Fail the Nth (0-based) balance batch as a whole.
    pub fail_batch: Option<usize>,
    /// Answer balance batches in reverse order.
    pub reverse_reply: bool,
    /// Submissions of this token fail this many times before succeeding.
    pub submit_failures: HashMap<Address, u32>,
    submit_attempts: Mutex<HashMap<Address, u32>>,
    batches: Mutex<usize>,
    calls: Mutex<Vec<Call>>,
}

impl MockChain {
    pub fn new(fee_level: u128) -> Self {
        Self {
            fee_level,
            ..Default::default()
        }
    }

    pub fn with_balance(mut self, token: Address, balance: u64) -> Self {
        self.balances.insert(token, Ok(U256::from(balance)));
        self
    }

    pub fn with_failed_lookup(mut self, token: Address) -> Self {
        self.balances.insert(token, Err("execution reverted".into()));
        self
    }

    pub fn failing_submits(mut self, token: Address, times: u32) -> Self {
        self.submit_failures.insert(token, times);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn submitted(&self) -> Vec<Address> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Submit(a) => Some(a),
                _ => None,
            })
            .collect()
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::QueryBalances(a) => Some(a.len()),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn query_balances(
        &self,
        tokens: &[Address],
        _holder: Address,
    ) -> Result<Vec<(Address, BalanceLookup)>> {
        self.record(Call::QueryBalances(tokens.to_vec()));
        let index = {
            let mut batches = self.batches.lock().unwrap();
            *batches += 1;
            *batches - 1
        };
        if self.fail_batch == Some(index) {
            return Err(SweepError::Transport("connection reset".into()));
        }
        let mut reply: Vec<_> = tokens
            .iter()
            .map(|t| (*t, self.balances.get(t).cloned().unwrap_or(Ok(U256::ZERO))))
            .collect();
        if self.reverse_reply {
            reply.reverse();
        }
        Ok(reply)
    }

    async fn current_fee_level(&self) -> Result<u128> {
        self.record(Call::FeeLevel);
        Ok(self.fee_level)
    }

    async fn estimate_cost(&self, operation: &TransferOperation) -> Result<u64> {
        self.record(Call::Estimate(operation.target));
        Ok(21_000)
    }

    async fn prepare_request(
        &self,
        operation: &TransferOperation,
        cost: u64,
        fee_level: u128,
    ) -> Result<PreparedRequest> {
        self.record(Call::Prepare(operation.target));
        Ok(PreparedRequest {
            operation: operation.clone(),
            gas_limit: cost,
            gas_price: fee_level,
            chain_id: 80084,
            nonce: None,
        })
    }

    async fn submit(&self, request: &PreparedRequest) -> Result<TxHandle> {
        let token = request.operation.target;
        self.record(Call::Submit(token));
        let mut attempts = self.submit_attempts.lock().unwrap();
        let n = attempts.entry(token).or_insert(0);
        *n += 1;
        if *n <= self.submit_failures.get(&token).copied().unwrap_or(0) {
            return Err(SweepError::Transport(format!("nonce too low for {token}")));
        }
        Ok(TxHandle(format!("0xtx{token}")))
    }

    async fn await_confirmation(&self, tx: &TxHandle, _confirmations: u64) -> Result<Receipt> {
        let token = tx
            .0
            .strip_prefix("0xtx")
            .and_then(|a| a.parse().ok())
            .unwrap_or(Address::ZERO);
        self.record(Call::Confirm(token));
        Ok(Receipt {
            tx_hash: tx.clone(),
            block_hash: format!("0xblock{token}"),
            block_number: 1,
            success: true,
        })
    }
}

#[derive(Default)]
pub struct MockTokens {
    pub whitelist: WhitelistTokenMap,
    pub prices: Vec<PriceCandidate>,
    pub fail_prices: bool,
}

impl MockTokens {
    pub fn with_candidates(addresses: &[Address]) -> Self {
        let whitelist = addresses
            .iter()
            .enumerate()
            .map(|(i, a)| {
                (
                    *a,
                    TokenMetadata {
                        symbol: format!("TKN{i}"),
                        name: String::new(),
                        decimals: 18,
                    },
                )
            })
            .collect();
        Self {
            whitelist,
            prices: addresses.iter().map(|a| PriceCandidate::new(*a, 1.0)).collect(),
            fail_prices: false,
        }
    }
}

#[async_trait]
impl TokenSource for MockTokens {
    async fn whitelisted_tokens(&self) -> Result<WhitelistTokenMap> {
        Ok(self.whitelist.clone())
    }

    async fn token_prices(&self) -> Result<Vec<PriceCandidate>> {
        if self.fail_prices {
            return Err(SweepError::PriceApi("503 Service Unavailable".into()));
        }
        Ok(self.prices.clone())
    }
}
