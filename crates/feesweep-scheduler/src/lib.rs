//! # FeeSweep Scheduler
//!
//! The execution engine under the fee-transfer job: when to run, how many at a
//! time, and how hard to try.
//!
//! ## Architecture
//! ```text
//! ScheduledJob (cron / @every trigger, Idle ⇄ Running)
//!   └── on fire → SingleFlightQueue.submit(key, tick)
//!                   ├── idle  → spawn tick, busy until it ends
//!                   └── busy  → drop the tick
//!
//! Inside a tick
//!   ├── chunks(items, n)         → ordered batch slices
//!   └── run_with_retry(policy)   → N attempts, fixed or exponential pause
//! ```

pub mod chunk;
pub mod cron;
pub mod job;
pub mod queue;
pub mod retry;

pub use chunk::{chunk_count, chunks};
pub use cron::{CronExpr, Schedule};
pub use job::{JobHandle, JobState, ScheduledJob};
pub use queue::{Admission, QueueKey, QueueStats, SingleFlightQueue};
pub use retry::{Backoff, RetryError, RetryPolicy, run_with_retry};
