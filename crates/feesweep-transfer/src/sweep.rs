//! The fee-transfer tick.
//!
//! One tick: whitelist + prices → chunks of `chunk_size` → balance filter →
//! orchestrator. Chunks run strictly in order. A fee abort ends the tick; a failed
//! batch query aborts it with an error that [`FeeTransferJob::execute_tick`] logs
//! and swallows so the schedule keeps going.

use std::sync::Arc;

use chrono::Utc;
use feesweep_core::{Address, ChainClient, FeeSweepConfig, Result, SweepError, TokenSource};
use feesweep_scheduler::{RetryPolicy, chunk_count, chunks};
use futures::FutureExt;
use futures::future::BoxFuture;
use serde::Serialize;

use crate::filter::BalanceFilter;
use crate::orchestrator::{TransferOrchestrator, TransferSettings};

/// What one tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickSummary {
    pub candidates: usize,
    pub chunks: usize,
    pub eligible: usize,
    pub confirmed: usize,
    pub failed: usize,
    pub fee_aborted: bool,
}

pub struct FeeTransferJob {
    name: String,
    tokens: Arc<dyn TokenSource>,
    chain: Arc<dyn ChainClient>,
    holder: Address,
    chunk_size: usize,
    settings: TransferSettings,
}

impl FeeTransferJob {
    pub fn new(
        tokens: Arc<dyn TokenSource>,
        chain: Arc<dyn ChainClient>,
        config: &FeeSweepConfig,
    ) -> Result<Self> {
        if config.job.chunk_size == 0 {
            return Err(SweepError::InvalidChunkSize(0));
        }
        Ok(Self {
            name: config.job.name.clone(),
            tokens,
            chain,
            holder: config.chain.holder,
            chunk_size: config.job.chunk_size,
            settings: TransferSettings {
                destination: config.chain.destination,
                fee_threshold: u128::from(config.job.fee_threshold),
                confirmations: config.job.confirmations,
                retry: RetryPolicy::from_config(&config.retry)?,
            },
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run one tick, returning the first fatal error.
    pub async fn run_tick(&self) -> Result<TickSummary> {
        let whitelist = self.tokens.whitelisted_tokens().await?;
        let prices = self.tokens.token_prices().await?;

        let filter = BalanceFilter::new(self.chain.clone(), self.holder);
        let orchestrator = TransferOrchestrator::new(self.chain.clone(), self.settings.clone())
            .with_whitelist(whitelist);

        let mut summary = TickSummary {
            candidates: prices.len(),
            ..Default::default()
        };

        let total = chunk_count(prices.len(), self.chunk_size);
        for chunk in chunks(&prices, self.chunk_size)? {
            summary.chunks += 1;
            tracing::debug!(
                "[{}] Chunk {}/{}: {} candidates",
                self.name,
                summary.chunks,
                total,
                chunk.len()
            );
            let eligible = filter.filter_chunk(chunk).await?;
            if eligible.is_empty() {
                tracing::info!(
                    "[{}] No assets found with sufficient balance to transfer (chunk {}/{})",
                    self.name,
                    summary.chunks,
                    total
                );
                continue;
            }
            summary.eligible += eligible.len();

            let report = orchestrator.run(&eligible).await?;
            summary.confirmed += report.confirmed.len();
            summary.failed += report.failed.len();
            if report.is_aborted() {
                summary.fee_aborted = true;
                break;
            }
        }

        Ok(summary)
    }

    /// Run one tick and log its outcome. Never fails.
    pub async fn execute_tick(&self) -> Option<TickSummary> {
        tracing::info!(
            "🚀 [{}] started - timestamp [{}]",
            self.name,
            Utc::now().timestamp_millis()
        );
        let outcome = match self.run_tick().await {
            Ok(summary) => {
                tracing::info!(
                    "[{}] {} candidates, {} eligible, {} confirmed, {} failed{}",
                    self.name,
                    summary.candidates,
                    summary.eligible,
                    summary.confirmed,
                    summary.failed,
                    if summary.fee_aborted { " (fee gate closed)" } else { "" }
                );
                Some(summary)
            }
            Err(e) => {
                tracing::error!("[{}]: error {}", self.name, e.extract_message());
                tracing::error!("[{}]: {:?}", self.name, e);
                None
            }
        };
        tracing::info!(
            "🏁 [{}] finished - timestamp [{}]",
            self.name,
            Utc::now().timestamp_millis()
        );
        outcome
    }

    /// Callback for `ScheduledJob::start`: each call yields one tick.
    pub fn into_callback(self: Arc<Self>) -> impl Fn() -> BoxFuture<'static, ()> + Send + Sync + 'static {
        move || {
            let job = self.clone();
            async move {
                job.execute_tick().await;
            }
            .boxed()
        }
    }
}
