//! Ethereum JSON-RPC chain client on an alloy provider.
//!
//! Transactions are sent with `eth_sendTransaction`, so signing stays with the
//! node's managed account. No key material passes through this process.

use std::time::Duration;

use alloy::eips::BlockNumberOrTag;
use alloy::network::ReceiptResponse;
use alloy::primitives::{Bytes, TxHash, TxKind};
use alloy::providers::{Provider, RootProvider};
use alloy::rpc::client::RpcClient;
use alloy::rpc::types::{TransactionInput, TransactionRequest};
use alloy::sol_types::SolCall;
use alloy::transports::TransportError;
use alloy::transports::http::{Http, reqwest};
use async_trait::async_trait;
use feesweep_core::config::ChainConfig;
use feesweep_core::{
    Address, BalanceLookup, ChainClient, IERC20, PreparedRequest, Receipt, Result, SweepError,
    TransferOperation, TxHandle, U256,
};

use crate::swap::CallSender;

/// Give up on a receipt after this long. The orchestrator retries the whole transfer.
const CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(120);

pub struct JsonRpcClient {
    client: RpcClient,
    provider: RootProvider,
    chain_id: u64,
    sender: Address,
    poll_interval: Duration,
}

fn transport(method: &'static str) -> impl Fn(TransportError) -> SweepError {
    move |e| SweepError::Transport(format!("{method}: {e}"))
}

impl JsonRpcClient {
    pub fn new(config: &ChainConfig) -> Result<Self> {
        let url: reqwest::Url = config
            .rpc_url
            .parse()
            .map_err(|e| SweepError::Config(format!("rpc_url '{}': {e}", config.rpc_url)))?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| SweepError::Config(format!("HTTP client: {e}")))?;
        let client = RpcClient::new(Http::with_client(http, url), false);
        let provider = RootProvider::new(client.clone());
        Ok(Self {
            client,
            provider,
            chain_id: config.chain_id,
            sender: config.sender,
            poll_interval: Duration::from_millis(config.receipt_poll_ms),
        })
    }

    fn request(&self, to: Address, input: Bytes) -> TransactionRequest {
        TransactionRequest {
            from: Some(self.sender),
            to: Some(TxKind::Call(to)),
            input: TransactionInput::new(input),
            ..Default::default()
        }
    }

    fn transfer_request(&self, operation: &TransferOperation) -> TransactionRequest {
        self.request(operation.target, operation.call_data().into())
    }

    async fn send(&self, tx: TransactionRequest) -> Result<TxHandle> {
        let pending = self
            .provider
            .send_transaction(tx)
            .await
            .map_err(transport("eth_sendTransaction"))?;
        Ok(TxHandle(pending.tx_hash().to_string()))
    }
}

/// `eth_call` of `balanceOf(holder)` against `token`.
fn balance_call(token: Address, holder: Address) -> TransactionRequest {
    let data = IERC20::balanceOfCall { account: holder }.abi_encode();
    TransactionRequest {
        to: Some(TxKind::Call(token)),
        input: TransactionInput::new(data.into()),
        ..Default::default()
    }
}

/// The single `uint256` a `balanceOf` returns.
fn decode_balance(data: &[u8]) -> std::result::Result<U256, String> {
    if data.len() != 32 {
        return Err(format!("expected a 32-byte word, got {} bytes", data.len()));
    }
    U256::try_from_be_slice(data).ok_or_else(|| "balance does not fit a word".to_string())
}

/// `None` until the receipt carries its block.
fn settled_receipt<R: ReceiptResponse>(receipt: &R) -> Option<Receipt> {
    Some(Receipt {
        tx_hash: TxHandle(receipt.transaction_hash().to_string()),
        block_hash: receipt.block_hash()?.to_string(),
        block_number: receipt.block_number()?,
        success: receipt.status(),
    })
}

#[async_trait]
impl ChainClient for JsonRpcClient {
    async fn query_balances(
        &self,
        tokens: &[Address],
        holder: Address,
    ) -> Result<Vec<(Address, BalanceLookup)>> {
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        let mut batch = self.client.new_batch();
        let mut waiters = Vec::with_capacity(tokens.len());
        for token in tokens {
            let params = (balance_call(*token, holder), BlockNumberOrTag::Latest);
            let waiter = batch
                .add_call::<_, Bytes>("eth_call", &params)
                .map_err(transport("eth_call batch"))?;
            waiters.push(waiter);
        }
        batch.send().await.map_err(transport("eth_call batch"))?;

        // Errors inside the batch stay with their address.
        let mut results = Vec::with_capacity(tokens.len());
        for (token, waiter) in tokens.iter().zip(waiters) {
            let lookup = match waiter.await {
                Ok(data) => decode_balance(&data),
                Err(e) => Err(format!("balanceOf: {e}")),
            };
            results.push((*token, lookup));
        }
        Ok(results)
    }

    async fn current_fee_level(&self) -> Result<u128> {
        self.provider
            .get_gas_price()
            .await
            .map_err(transport("eth_gasPrice"))
    }

    async fn estimate_cost(&self, operation: &TransferOperation) -> Result<u64> {
        self.provider
            .estimate_gas(self.transfer_request(operation))
            .await
            .map_err(transport("eth_estimateGas"))
    }

    async fn prepare_request(
        &self,
        operation: &TransferOperation,
        cost: u64,
        fee_level: u128,
    ) -> Result<PreparedRequest> {
        let nonce = self
            .provider
            .get_transaction_count(self.sender)
            .pending()
            .await
            .map_err(transport("eth_getTransactionCount"))?;
        Ok(PreparedRequest {
            operation: operation.clone(),
            gas_limit: cost,
            gas_price: fee_level,
            chain_id: self.chain_id,
            nonce: Some(nonce),
        })
    }

    async fn submit(&self, request: &PreparedRequest) -> Result<TxHandle> {
        let tx = TransactionRequest {
            gas: Some(request.gas_limit),
            gas_price: Some(request.gas_price),
            chain_id: Some(request.chain_id),
            nonce: request.nonce,
            ..self.transfer_request(&request.operation)
        };
        self.send(tx).await
    }

    async fn await_confirmation(&self, tx: &TxHandle, confirmations: u64) -> Result<Receipt> {
        let hash: TxHash = tx
            .0
            .parse()
            .map_err(|e| SweepError::Transport(format!("bad transaction hash {tx}: {e}")))?;
        let deadline = tokio::time::Instant::now() + CONFIRMATION_TIMEOUT;
        loop {
            let mined = self
                .provider
                .get_transaction_receipt(hash)
                .await
                .map_err(transport("eth_getTransactionReceipt"))?;
            if let Some(receipt) = mined.as_ref().and_then(settled_receipt) {
                let head = self
                    .provider
                    .get_block_number()
                    .await
                    .map_err(transport("eth_blockNumber"))?;
                let depth = head.saturating_sub(receipt.block_number) + 1;
                if depth >= confirmations.max(1) {
                    return Ok(receipt);
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(SweepError::Transport(format!(
                    "timed out waiting for {confirmations} confirmation(s) of {tx}"
                )));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[async_trait]
impl CallSender for JsonRpcClient {
    fn sender(&self) -> Address {
        self.sender
    }

    /// Gas and nonce are left to the node.
    async fn send_call(&self, to: Address, data: Bytes, value: U256) -> Result<TxHandle> {
        let tx = TransactionRequest {
            value: Some(value),
            ..self.request(to, data)
        };
        self.send(tx).await
    }
}
