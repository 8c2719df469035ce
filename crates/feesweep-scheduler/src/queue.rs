//! Single-flight queue: one lane, one task in flight, overflow is dropped.
//!
//! A submission made while another task is still running is discarded, not
//! buffered. Two sweeps would otherwise race on the same wallet nonce and balances.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::task::JoinHandle;

/// Label for a queue submission: `"{task}-{unix_millis}"`.
///
/// Purely descriptive. Admission is decided by the queue's busy flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueKey(String);

impl QueueKey {
    pub fn new(task_name: &str) -> Self {
        Self(format!("{}-{}", task_name, chrono::Utc::now().timestamp_millis()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for QueueKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of [`SingleFlightQueue::submit`].
#[derive(Debug)]
pub enum Admission {
    /// The task was spawned. Awaiting the handle waits for it to finish.
    Accepted(JoinHandle<()>),
    /// Another task was in flight; this one was discarded without being polled.
    Dropped,
}

impl Admission {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Admission::Accepted(_))
    }

    pub fn into_handle(self) -> Option<JoinHandle<()>> {
        match self {
            Admission::Accepted(handle) => Some(handle),
            Admission::Dropped => None,
        }
    }
}

struct QueueState {
    name: String,
    busy: AtomicBool,
    accepted: AtomicU64,
    dropped: AtomicU64,
    completed: AtomicU64,
}

/// Clears the busy flag when the running task ends: normally, by panic, or by abort.
struct BusyGuard {
    state: Arc<QueueState>,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.state.completed.fetch_add(1, Ordering::Relaxed);
        self.state.busy.store(false, Ordering::Release);
    }
}

/// Serialized task queue with a single global lane.
#[derive(Clone)]
pub struct SingleFlightQueue {
    state: Arc<QueueState>,
}

impl SingleFlightQueue {
    pub fn new(name: &str) -> Self {
        Self {
            state: Arc::new(QueueState {
                name: name.to_string(),
                busy: AtomicBool::new(false),
                accepted: AtomicU64::new(0),
                dropped: AtomicU64::new(0),
                completed: AtomicU64::new(0),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.state.name
    }

    /// Spawn `task` if nothing is in flight, otherwise drop it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit<F>(&self, label: &QueueKey, task: F) -> Admission
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self
            .state
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.state.dropped.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                "⏭️ Queue[{}] busy, dropped submission {}",
                self.state.name,
                label
            );
            return Admission::Dropped;
        }

        self.state.accepted.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("📥 Queue[{}] accepted {}", self.state.name, label);

        let guard = BusyGuard {
            state: self.state.clone(),
        };
        Admission::Accepted(tokio::spawn(async move {
            let _guard = guard;
            task.await;
        }))
    }

    pub fn is_busy(&self) -> bool {
        self.state.busy.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            name: self.state.name.clone(),
            busy: self.is_busy(),
            accepted: self.state.accepted.load(Ordering::Relaxed),
            dropped: self.state.dropped.load(Ordering::Relaxed),
            completed: self.state.completed.load(Ordering::Relaxed),
        }
    }
}

/// Counters for a queue.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct QueueStats {
    pub name: String,
    pub busy: bool,
    pub accepted: u64,
    pub dropped: u64,
    pub completed: u64,
}
