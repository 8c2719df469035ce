//! Swap helper: allowance check, approval and swap through the aggregator API.
//!
//! The API returns unsigned transactions; they are sent from the node-managed
//! sender account and confirmed the same way transfers are.

use alloy::primitives::Bytes;
use async_trait::async_trait;
use feesweep_core::{Address, ChainClient, Receipt, Result, SweepError, TxHandle, U256};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::price_api::PriceApiClient;

/// One swap request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwapParams {
    pub token_in: Address,
    pub token_out: Address,
    /// Raw `token_in` units.
    pub amount: U256,
    /// Receiver of `token_out`.
    pub to: Address,
    /// Tolerated price movement, 0..=1.
    pub slippage: f64,
}

impl SwapParams {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.slippage) {
            return Err(SweepError::Swap(format!(
                "slippage must be within 0..=1 (got {})",
                self.slippage
            )));
        }
        if self.amount.is_zero() {
            return Err(SweepError::Swap("amount must be greater than zero".into()));
        }
        Ok(())
    }
}

/// Unsigned transaction returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SwapTx {
    pub from: Address,
    pub to: Address,
    pub data: String,
    #[serde(default, deserialize_with = "amount_de")]
    pub value: U256,
}

impl SwapTx {
    /// Raw calldata from the `0x`-prefixed hex `data`.
    pub fn calldata(&self) -> Result<Bytes> {
        let digits = self.data.strip_prefix("0x").unwrap_or(&self.data);
        hex::decode(digits)
            .map(Bytes::from)
            .map_err(|e| SweepError::Swap(format!("bad tx data '{}': {e}", self.data)))
    }
}

#[derive(Deserialize)]
struct TxEnvelope {
    tx: SwapTx,
}

#[derive(Deserialize)]
struct AllowanceReply {
    #[serde(deserialize_with = "amount_de")]
    allowance: U256,
}

/// Amounts arrive as JSON numbers, decimal strings or `0x` quantities.
fn parse_amount(value: &Value) -> std::result::Result<U256, String> {
    match value {
        Value::Null => Ok(U256::ZERO),
        Value::Number(n) => n
            .as_u64()
            .map(U256::from)
            .ok_or_else(|| format!("amount {n} is not a non-negative integer")),
        Value::String(s) => {
            let s = s.trim();
            let parsed = match s.strip_prefix("0x") {
                Some("") => Ok(U256::ZERO),
                Some(digits) => U256::from_str_radix(digits, 16),
                None => U256::from_str_radix(s, 10),
            };
            parsed.map_err(|e| format!("bad amount '{s}': {e}"))
        }
        other => Err(format!("unexpected amount {other}")),
    }
}

fn amount_de<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<U256, D::Error> {
    let value = Value::deserialize(deserializer)?;
    parse_amount(&value).map_err(serde::de::Error::custom)
}

/// The aggregator endpoints a swap needs.
#[async_trait]
pub trait SwapApi: Send + Sync {
    /// How much of `token` the router may pull from `owner`.
    async fn allowance(&self, token: Address, owner: Address) -> Result<U256>;

    async fn approve_tx(&self, token: Address, amount: U256) -> Result<SwapTx>;

    async fn swap_tx(&self, params: &SwapParams) -> Result<SwapTx>;
}

/// A chain client that can also send arbitrary calls from its own account.
#[async_trait]
pub trait CallSender: ChainClient {
    fn sender(&self) -> Address;

    async fn send_call(&self, to: Address, data: Bytes, value: U256) -> Result<TxHandle>;
}

pub struct SwapClient {
    api: PriceApiClient,
}

impl SwapClient {
    pub fn new(api: PriceApiClient) -> Self {
        Self { api }
    }

    pub async fn execute_swap(
        &self,
        chain: &dyn CallSender,
        params: &SwapParams,
        confirmations: u64,
    ) -> Result<Receipt> {
        execute_swap(self, chain, params, confirmations).await
    }
}

#[async_trait]
impl SwapApi for SwapClient {
    /// The native token needs no approval.
    async fn allowance(&self, token: Address, owner: Address) -> Result<U256> {
        if token.is_zero() {
            return Ok(U256::MAX);
        }
        let reply: AllowanceReply = self
            .api
            .get_json(
                "/v1/approve/allowance",
                &[("token", token.to_string()), ("from", owner.to_string())],
            )
            .await?;
        Ok(reply.allowance)
    }

    async fn approve_tx(&self, token: Address, amount: U256) -> Result<SwapTx> {
        let reply: TxEnvelope = self
            .api
            .get_json(
                "/v1/approve",
                &[("token", token.to_string()), ("amount", amount.to_string())],
            )
            .await?;
        Ok(reply.tx)
    }

    async fn swap_tx(&self, params: &SwapParams) -> Result<SwapTx> {
        let reply: TxEnvelope = self.api.get_json("/v1/swap", &swap_query(params)).await?;
        Ok(reply.tx)
    }
}

/// Approve whatever allowance is missing, then swap. Returns the swap receipt.
pub async fn execute_swap(
    api: &dyn SwapApi,
    chain: &dyn CallSender,
    params: &SwapParams,
    confirmations: u64,
) -> Result<Receipt> {
    params.validate()?;
    let owner = chain.sender();

    let allowance = api.allowance(params.token_in, owner).await?;
    tracing::info!("🔎 Allowance of {} for {}: {}", params.token_in, owner, allowance);

    if let Some(missing) = missing_allowance(allowance, params.amount) {
        let tx = api.approve_tx(params.token_in, missing).await?;
        tracing::info!("📝 Submitting approve of {} {}", missing, params.token_in);
        let receipt = send_and_confirm(chain, &tx, confirmations).await?;
        if !receipt.success {
            return Err(SweepError::Swap(format!(
                "approval reverted - tx {}",
                receipt.tx_hash
            )));
        }
        tracing::info!("✅ Approval complete - tx {}", receipt.tx_hash);
    }

    let tx = api.swap_tx(params).await?;
    tracing::info!(
        "🔄 Submitting swap {} {} -> {}",
        params.amount,
        params.token_in,
        params.token_out
    );
    let receipt = send_and_confirm(chain, &tx, confirmations).await?;
    if receipt.success {
        tracing::info!("✅ Swap complete - tx {} block {}", receipt.tx_hash, receipt.block_hash);
    } else {
        tracing::warn!("⚠️ Swap mined but reverted - tx {}", receipt.tx_hash);
    }
    Ok(receipt)
}

/// Only the shortfall is approved.
fn missing_allowance(allowance: U256, amount: U256) -> Option<U256> {
    (allowance < amount).then(|| amount - allowance)
}

fn swap_query(params: &SwapParams) -> Vec<(&'static str, String)> {
    vec![
        ("tokenIn", params.token_in.to_string()),
        ("amount", params.amount.to_string()),
        ("tokenOut", params.token_out.to_string()),
        ("to", params.to.to_string()),
        ("slippage", params.slippage.to_string()),
    ]
}

async fn send_and_confirm(chain: &dyn CallSender, tx: &SwapTx, confirmations: u64) -> Result<Receipt> {
    if tx.from != chain.sender() {
        tracing::warn!(
            "API transaction is from {} but the node account is {}",
            tx.from,
            chain.sender()
        );
    }
    let handle = chain.send_call(tx.to, tx.calldata()?, tx.value).await?;
    chain.await_confirmation(&handle, confirmations).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use feesweep_core::{BalanceLookup, PreparedRequest, TransferOperation};
    use serde_json::json;
    use std::sync::Mutex;

    const OWNER: Address = Address::repeat_byte(0x95);
    const ROUTER: Address = Address::repeat_byte(0x77);
    const TOKEN_IN: Address = Address::repeat_byte(0x25);

    fn params(slippage: f64) -> SwapParams {
        SwapParams {
            token_in: TOKEN_IN,
            token_out: Address::repeat_byte(0x26),
            amount: U256::from(100u64),
            to: OWNER,
            slippage,
        }
    }

    fn api_tx(data: &str) -> SwapTx {
        SwapTx {
            from: OWNER,
            to: ROUTER,
            data: data.to_string(),
            value: U256::ZERO,
        }
    }

    /// Aggregator stand-in with a fixed allowance that records approvals.
    struct FakeApi {
        allowance: U256,
        approvals: Mutex<Vec<U256>>,
    }

    impl FakeApi {
        fn with_allowance(allowance: u64) -> Self {
            Self {
                allowance: U256::from(allowance),
                approvals: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl SwapApi for FakeApi {
        async fn allowance(&self, _token: Address, owner: Address) -> Result<U256> {
            assert_eq!(owner, OWNER);
            Ok(self.allowance)
        }

        async fn approve_tx(&self, _token: Address, amount: U256) -> Result<SwapTx> {
            self.approvals.lock().unwrap().push(amount);
            Ok(api_tx("0xa1"))
        }

        async fn swap_tx(&self, _params: &SwapParams) -> Result<SwapTx> {
            Ok(api_tx("0x5a"))
        }
    }

    /// Node stand-in that records sent calldata; `revert` marks those receipts failed.
    struct FakeChain {
        sent: Mutex<Vec<Vec<u8>>>,
        revert: Vec<u8>,
    }

    impl FakeChain {
        fn new() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                revert: Vec::new(),
            }
        }

        fn sent(&self) -> Vec<Vec<u8>> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChainClient for FakeChain {
        async fn query_balances(
            &self,
            _tokens: &[Address],
            _holder: Address,
        ) -> Result<Vec<(Address, BalanceLookup)>> {
            unreachable!()
        }

        async fn current_fee_level(&self) -> Result<u128> {
            unreachable!()
        }

        async fn estimate_cost(&self, _operation: &TransferOperation) -> Result<u64> {
            unreachable!()
        }

        async fn prepare_request(
            &self,
            _operation: &TransferOperation,
            _cost: u64,
            _fee_level: u128,
        ) -> Result<PreparedRequest> {
            unreachable!()
        }

        async fn submit(&self, _request: &PreparedRequest) -> Result<TxHandle> {
            unreachable!()
        }

        async fn await_confirmation(&self, tx: &TxHandle, _confirmations: u64) -> Result<Receipt> {
            let data = hex::decode(tx.0.trim_start_matches("0xtx")).unwrap();
            Ok(Receipt {
                tx_hash: tx.clone(),
                block_hash: "0xb1".into(),
                block_number: 1,
                success: data != self.revert,
            })
        }
    }

    #[async_trait]
    impl CallSender for FakeChain {
        fn sender(&self) -> Address {
            OWNER
        }

        async fn send_call(&self, to: Address, data: Bytes, _value: U256) -> Result<TxHandle> {
            assert_eq!(to, ROUTER);
            self.sent.lock().unwrap().push(data.to_vec());
            Ok(TxHandle(format!("0xtx{}", hex::encode(&data))))
        }
    }

    #[test]
    fn test_parse_amount_forms() {
        assert_eq!(parse_amount(&json!(12)), Ok(U256::from(12)));
        assert_eq!(parse_amount(&json!("0x10")), Ok(U256::from(16)));
        assert_eq!(parse_amount(&json!("0x")), Ok(U256::ZERO));
        assert_eq!(parse_amount(&Value::Null), Ok(U256::ZERO));
        assert!(parse_amount(&json!(-1)).is_err());
        assert!(parse_amount(&json!("lots")).is_err());
    }

    #[test]
    fn test_unlimited_allowance_parses() {
        let reply: AllowanceReply = serde_json::from_str(
            r#"{"allowance":"115792089237316195423570985008687907853269984665640564039457584007913129639935"}"#,
        )
        .unwrap();
        assert_eq!(reply.allowance, U256::MAX);
        assert_eq!(missing_allowance(reply.allowance, U256::from(1)), None);
    }

    #[test]
    fn test_tx_envelope_parses() {
        let reply: TxEnvelope = serde_json::from_value(json!({
            "tx": {
                "from": "0x95f4c475857c9ca1e87755f0ebc135baca86ebf3",
                "to": "0x2577d24a26f8fa19c1058a8b0106e2c7303454a4",
                "data": "0xdeadbeef",
                "value": "50000000000000000"
            }
        }))
        .unwrap();
        assert_eq!(reply.tx.value, U256::from(50_000_000_000_000_000u64));
        assert_eq!(reply.tx.calldata().unwrap().to_vec(), vec![0xde, 0xad, 0xbe, 0xef]);

        let no_value: SwapTx = serde_json::from_value(json!({
            "from": "0x95f4c475857c9ca1e87755f0ebc135baca86ebf3",
            "to": "0x2577d24a26f8fa19c1058a8b0106e2c7303454a4",
            "data": "0x"
        }))
        .unwrap();
        assert_eq!(no_value.value, U256::ZERO);
        assert!(no_value.calldata().unwrap().is_empty());
    }

    #[test]
    fn test_bad_calldata_is_swap_error() {
        assert!(matches!(api_tx("0xzz").calldata(), Err(SweepError::Swap(_))));
        assert!(matches!(api_tx("0xabc").calldata(), Err(SweepError::Swap(_))));
    }

    #[test]
    fn test_only_shortfall_is_approved() {
        assert_eq!(missing_allowance(U256::from(30), U256::from(100)), Some(U256::from(70)));
        assert_eq!(missing_allowance(U256::from(100), U256::from(100)), None);
        assert_eq!(missing_allowance(U256::MAX, U256::from(1)), None);
    }

    #[test]
    fn test_swap_query_fields() {
        let query = swap_query(&params(0.01));
        let keys: Vec<_> = query.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec!["tokenIn", "amount", "tokenOut", "to", "slippage"]);
        assert_eq!(query[1].1, "100");
        assert_eq!(query[4].1, "0.01");
    }

    #[test]
    fn test_params_validation() {
        assert!(params(0.01).validate().is_ok());
        assert!(params(1.5).validate().is_err());
        let mut zero = params(0.01);
        zero.amount = U256::ZERO;
        assert!(zero.validate().is_err());
    }

    #[tokio::test]
    async fn test_native_token_needs_no_allowance() {
        let api = PriceApiClient::new(&Default::default()).unwrap();
        let client = SwapClient::new(api);
        let allowance = client
            .allowance(Address::ZERO, Address::repeat_byte(1))
            .await
            .unwrap();
        assert_eq!(allowance, U256::MAX);
    }

    #[tokio::test]
    async fn test_shortfall_is_approved_before_swap() {
        let api = FakeApi::with_allowance(30);
        let chain = FakeChain::new();

        let receipt = execute_swap(&api, &chain, &params(0.01), 1).await.unwrap();

        assert_eq!(*api.approvals.lock().unwrap(), vec![U256::from(70)]);
        assert_eq!(chain.sent(), vec![vec![0xa1], vec![0x5a]]);
        assert!(receipt.success);
        assert_eq!(receipt.tx_hash.0, "0xtx5a");
    }

    #[tokio::test]
    async fn test_enough_allowance_swaps_directly() {
        let api = FakeApi::with_allowance(100);
        let chain = FakeChain::new();

        execute_swap(&api, &chain, &params(0.01), 1).await.unwrap();

        assert!(api.approvals.lock().unwrap().is_empty());
        assert_eq!(chain.sent(), vec![vec![0x5a]]);
    }

    #[tokio::test]
    async fn test_reverted_approval_stops_before_swap() {
        let api = FakeApi::with_allowance(0);
        let chain = FakeChain {
            revert: vec![0xa1],
            ..FakeChain::new()
        };

        let err = execute_swap(&api, &chain, &params(0.01), 1).await.unwrap_err();

        assert!(matches!(err, SweepError::Swap(_)));
        assert_eq!(chain.sent(), vec![vec![0xa1]]);
    }

    #[tokio::test]
    async fn test_invalid_params_touch_nothing() {
        let api = FakeApi::with_allowance(0);
        let chain = FakeChain::new();
        assert!(execute_swap(&api, &chain, &params(2.0), 1).await.is_err());
        assert!(chain.sent().is_empty());
    }
}
