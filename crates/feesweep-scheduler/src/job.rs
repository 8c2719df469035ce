//! Scheduled job: fires a callback on a schedule through a single-flight queue.
//!
//! A job is either `Idle` or `Running` (trigger loop armed). Starting a running
//! job is rejected. The loop's exit always returns the job to `Idle`, whether it
//! was stopped, ran out of fire times, or panicked.

use std::future::Future;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use feesweep_core::{Result, SweepError};
use tokio::task::JoinHandle;

use crate::cron::Schedule;
use crate::queue::{Admission, QueueKey, SingleFlightQueue};

/// Lifecycle of a scheduled job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum JobState {
    Idle,
    Running,
}

/// Puts the job back to `Idle` when the trigger loop ends.
struct RunningGuard {
    name: String,
    state: Arc<Mutex<JobState>>,
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        *state = JobState::Idle;
        tracing::info!("⏹️ Job '{}' stopped", self.name);
    }
}

/// A named job bound to a schedule and a queue.
pub struct ScheduledJob {
    name: String,
    schedule: Schedule,
    queue: SingleFlightQueue,
    state: Arc<Mutex<JobState>>,
}

impl ScheduledJob {
    pub fn new(name: &str, schedule: Schedule, queue: SingleFlightQueue) -> Self {
        Self {
            name: name.to_string(),
            schedule,
            queue,
            state: Arc::new(Mutex::new(JobState::Idle)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn queue(&self) -> &SingleFlightQueue {
        &self.queue
    }

    pub fn state(&self) -> JobState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Arm the trigger loop. Fails with `AlreadyRunning` if it is already armed.
    ///
    /// On every fire the loop submits `callback()` to the queue; if the queue is
    /// still busy with the previous tick the new one is dropped.
    pub fn start<F, Fut>(&self, callback: F) -> Result<JobHandle>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if *state == JobState::Running {
                return Err(SweepError::AlreadyRunning(self.name.clone()));
            }
            *state = JobState::Running;
        }

        let guard = RunningGuard {
            name: self.name.clone(),
            state: self.state.clone(),
        };
        let name = self.name.clone();
        let schedule = self.schedule.clone();
        let queue = self.queue.clone();

        tracing::info!("⏰ Job '{}' started ({})", name, schedule);

        let task = tokio::spawn(async move {
            let _guard = guard;
            loop {
                let now = Utc::now();
                let Some(next) = schedule.next_after(now) else {
                    tracing::warn!("⚠️ Job '{}' has no future fire time for '{}'", name, schedule);
                    break;
                };
                let wait = (next - now).to_std().unwrap_or_default();
                tracing::debug!("⏳ Job '{}' next fire at {}", name, next);
                tokio::time::sleep(wait).await;

                let key = QueueKey::new(&name);
                if let Admission::Dropped = queue.submit(&key, callback()) {
                    tracing::warn!(
                        "⏭️ Job '{}' tick {} skipped: previous run still in flight",
                        name,
                        key
                    );
                }
            }
        });

        Ok(JobHandle {
            name: self.name.clone(),
            task,
        })
    }

    /// Fire one tick immediately through the same queue.
    pub fn trigger_now<Fut>(&self, tick: Fut) -> Admission
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.queue.submit(&QueueKey::new(&self.name), tick)
    }
}

/// Handle to an armed trigger loop.
pub struct JobHandle {
    name: String,
    task: JoinHandle<()>,
}

impl JobHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Disarm the loop and wait until the job is back to `Idle`.
    ///
    /// A tick already running in the queue is left to finish.
    pub async fn stop(self) {
        self.task.abort();
        let _ = self.task.await;
    }
}
