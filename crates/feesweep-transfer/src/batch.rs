//! Per-tick list of transfer operations.
//!
//! Built fresh from each tick's eligible candidates and dropped with the tick, so a
//! partially failed run can never leak operations into the next one.

use feesweep_core::{Address, BalanceTaggedCandidate, TransferOperation};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferBatch {
    operations: Vec<TransferOperation>,
}

impl TransferBatch {
    /// One operation per candidate with a non-zero balance, moving the full balance.
    pub fn build(eligible: &[BalanceTaggedCandidate], destination: Address) -> Self {
        let operations = eligible
            .iter()
            .filter(|c| !c.balance.is_zero())
            .map(|c| TransferOperation::new(c.address, c.balance, destination))
            .collect();
        Self { operations }
    }

    pub fn operations(&self) -> &[TransferOperation] {
        &self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}
