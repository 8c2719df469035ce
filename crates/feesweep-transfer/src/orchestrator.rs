//! Transfer orchestrator: fee gate, then one retried transfer per eligible token.
//!
//! The fee gate is all-or-nothing for the run. Per-token failures are isolated: a
//! token that exhausts its retries is logged and skipped, the rest still go out.

use std::sync::Arc;

use feesweep_core::{
    Address, BalanceTaggedCandidate, ChainClient, Receipt, Result, SweepError, TransferOperation,
    U256, WhitelistTokenMap,
};
use feesweep_scheduler::{RetryPolicy, run_with_retry};
use serde::Serialize;

use crate::batch::TransferBatch;

/// Fixed parameters of a transfer run.
#[derive(Debug, Clone)]
pub struct TransferSettings {
    /// Fee collector receiving every balance.
    pub destination: Address,
    /// Runs are skipped while the network fee level is above this.
    pub fee_threshold: u128,
    pub confirmations: u64,
    pub retry: RetryPolicy,
}

/// Why a run stopped before submitting anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeeAbort {
    pub fee_level: u128,
    pub threshold: u128,
}

/// A token whose transfer gave up after all retries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferFailure {
    pub token: Address,
    pub amount: U256,
    pub message: String,
}

/// Outcome of one [`TransferOrchestrator::run`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct TransferReport {
    pub fee_level: Option<u128>,
    pub aborted: Option<FeeAbort>,
    pub confirmed: Vec<Receipt>,
    pub failed: Vec<TransferFailure>,
}

impl TransferReport {
    pub fn is_aborted(&self) -> bool {
        self.aborted.is_some()
    }

    pub fn attempted(&self) -> usize {
        self.confirmed.len() + self.failed.len()
    }
}

pub struct TransferOrchestrator {
    chain: Arc<dyn ChainClient>,
    settings: TransferSettings,
    whitelist: WhitelistTokenMap,
}

impl TransferOrchestrator {
    pub fn new(chain: Arc<dyn ChainClient>, settings: TransferSettings) -> Self {
        Self {
            chain,
            settings,
            whitelist: WhitelistTokenMap::new(),
        }
    }

    /// Token metadata used to name tokens in logs.
    pub fn with_whitelist(mut self, whitelist: WhitelistTokenMap) -> Self {
        self.whitelist = whitelist;
        self
    }

    pub fn settings(&self) -> &TransferSettings {
        &self.settings
    }

    fn symbol(&self, token: &Address) -> String {
        self.whitelist
            .get(token)
            .map(|m| m.symbol.clone())
            .unwrap_or_else(|| token.to_string())
    }

    /// Transfer every eligible balance to the destination, in input order.
    ///
    /// Only the fee-level lookup can make this return `Err`. Per-token failures
    /// land in [`TransferReport::failed`].
    pub async fn run(&self, eligible: &[BalanceTaggedCandidate]) -> Result<TransferReport> {
        let mut report = TransferReport::default();
        if eligible.is_empty() {
            return Ok(report);
        }

        let fee_level = self.chain.current_fee_level().await?;
        report.fee_level = Some(fee_level);
        if fee_level > self.settings.fee_threshold {
            tracing::info!(
                "⛽ Fee level {} above threshold {}, skipping {} transfers",
                fee_level,
                self.settings.fee_threshold,
                eligible.len()
            );
            report.aborted = Some(FeeAbort {
                fee_level,
                threshold: self.settings.fee_threshold,
            });
            return Ok(report);
        }

        let batch = TransferBatch::build(eligible, self.settings.destination);
        tracing::info!(
            "📦 Preparing to transfer {} assets to {}",
            batch.len(),
            self.settings.destination
        );

        for operation in batch.operations() {
            let symbol = self.symbol(&operation.target);
            let label = format!("transfer {symbol}");
            let outcome = run_with_retry(&self.settings.retry, &label, || {
                self.transfer_one(operation, fee_level)
            })
            .await;

            match outcome {
                Ok(receipt) => {
                    if receipt.success {
                        tracing::info!(
                            "✅ Transferred {} to {} - tx {} block {}",
                            symbol,
                            self.settings.destination,
                            receipt.tx_hash,
                            receipt.block_hash
                        );
                    } else {
                        tracing::warn!(
                            "⚠️ Transfer of {} mined but reverted - tx {}",
                            symbol,
                            receipt.tx_hash
                        );
                    }
                    report.confirmed.push(receipt);
                }
                Err(e) => {
                    let err = SweepError::from(e);
                    let message = err.extract_message();
                    tracing::error!("❌ Transfer of {} abandoned: {}", symbol, message);
                    report.failed.push(TransferFailure {
                        token: operation.target,
                        amount: operation.amount,
                        message,
                    });
                }
            }
        }

        Ok(report)
    }

    /// Estimate → prepare → submit → wait for confirmation.
    async fn transfer_one(&self, operation: &TransferOperation, fee_level: u128) -> Result<Receipt> {
        let cost = self.chain.estimate_cost(operation).await?;
        let request = self.chain.prepare_request(operation, cost, fee_level).await?;
        let tx = self.chain.submit(&request).await?;
        tracing::debug!("📤 Submitted {} for {}", tx, operation.target);
        self.chain
            .await_confirmation(&tx, self.settings.confirmations)
            .await
    }
}
