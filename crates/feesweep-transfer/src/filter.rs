//! Balance filter: keep only candidates the holder has a non-zero balance of.

use std::sync::Arc;

use feesweep_core::{
    Address, BalanceTaggedCandidate, ChainClient, PriceCandidate, Result, SweepError, U256,
};
use feesweep_scheduler::chunks;

/// Tags price candidates with the holder's balance, one batched query per chunk.
pub struct BalanceFilter {
    chain: Arc<dyn ChainClient>,
    holder: Address,
}

impl BalanceFilter {
    pub fn new(chain: Arc<dyn ChainClient>, holder: Address) -> Self {
        Self { chain, holder }
    }

    /// Query one chunk and return the candidates with a non-zero balance, in input order.
    ///
    /// A lookup that failed inside the batch counts as a zero balance, and so does
    /// a reply entry for a different address than the one asked at that position.
    /// These cases are not told apart from a real zero. A failure of the batch call itself is returned
    /// as `SweepError::BatchQuery`.
    pub async fn filter_chunk(
        &self,
        candidates: &[PriceCandidate],
    ) -> Result<Vec<BalanceTaggedCandidate>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let tokens: Vec<Address> = candidates.iter().map(|c| c.address).collect();
        let results = self
            .chain
            .query_balances(&tokens, self.holder)
            .await
            .map_err(|e| {
                tracing::info!(
                    "📉 Balance query for {} tokens failed at {}",
                    tokens.len(),
                    chrono::Utc::now().timestamp_millis()
                );
                SweepError::BatchQuery(e.extract_message())
            })?;

        // Results are positional; a short reply leaves the tail as failed lookups.
        let tagged = candidates.iter().enumerate().map(|(i, candidate)| {
            let balance = match results.get(i) {
                Some((address, _)) if *address != candidate.address => {
                    tracing::debug!(
                        "balanceOf {} answered for {} instead",
                        candidate.address,
                        address
                    );
                    U256::ZERO
                }
                Some((_, Ok(balance))) => *balance,
                Some((_, Err(reason))) => {
                    tracing::debug!("balanceOf {} failed: {}", candidate.address, reason);
                    U256::ZERO
                }
                None => U256::ZERO,
            };
            BalanceTaggedCandidate {
                address: candidate.address,
                balance,
            }
        });

        Ok(tagged.filter(|c| !c.balance.is_zero()).collect())
    }

    /// Run [`filter_chunk`](Self::filter_chunk) over every chunk in order and concatenate.
    pub async fn filter_eligible(
        &self,
        candidates: &[PriceCandidate],
        chunk_size: usize,
    ) -> Result<Vec<BalanceTaggedCandidate>> {
        let mut eligible = Vec::new();
        for chunk in chunks(candidates, chunk_size)? {
            eligible.extend(self.filter_chunk(chunk).await?);
        }
        Ok(eligible)
    }
}
