// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Delayed, cancellable tasks

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Work run once when a scheduled task fires
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Something that can run a task after a delay
pub trait TaskScheduler: Send + Sync {
    fn schedule(&self, name: &str, delay: Duration, task: Task) -> ScheduledTask;
}

const PENDING: u8 = 0;
const CANCELLED: u8 = 1;
const FIRED: u8 = 2;

/// Handle on a scheduled task
///
/// Clones share state; cancelling through any clone prevents the task
/// from running if it has not fired yet.
#[derive(Clone)]
pub struct ScheduledTask {
    name: Arc<str>,
    delay: Duration,
    state: Arc<AtomicU8>,
}

impl ScheduledTask {
    fn new(name: &str, delay: Duration) -> Self {
        Self {
            name: Arc::from(name),
            delay,
            state: Arc::new(AtomicU8::new(PENDING)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Cancel the task; returns false if it already fired or was cancelled
    pub fn cancel(&self) -> bool {
        let cancelled = self
            .state
            .compare_exchange(PENDING, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if cancelled {
            tracing::info!(task = %self.name, "scheduled task cancelled");
        }
        cancelled
    }

    pub fn is_pending(&self) -> bool {
        self.state.load(Ordering::Acquire) == PENDING
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.load(Ordering::Acquire) == CANCELLED
    }

    pub fn has_fired(&self) -> bool {
        self.state.load(Ordering::Acquire) == FIRED
    }

    /// Claim the right to run; false if cancelled first
    fn try_fire(&self) -> bool {
        self.state
            .compare_exchange(PENDING, FIRED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl std::fmt::Debug for ScheduledTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduledTask")
            .field("name", &self.name)
            .field("delay", &self.delay)
            .field("pending", &self.is_pending())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Run `task` unless its handle was cancelled; true if it ran
fn run(handle: &ScheduledTask, task: Task) -> bool {
    if !handle.try_fire() {
        return false;
    }
    tracing::info!(task = %handle.name, "scheduled task firing");
    task();
    true
}

/// Runs tasks on a tokio runtime after sleeping for their delay
#[derive(Clone)]
pub struct TokioScheduler {
    runtime: tokio::runtime::Handle,
}

impl TokioScheduler {
    pub fn new(runtime: tokio::runtime::Handle) -> Self {
        Self { runtime }
    }

    /// Use the runtime of the calling context
    pub fn current() -> Result<Self, tokio::runtime::TryCurrentError> {
        Ok(Self::new(tokio::runtime::Handle::try_current()?))
    }
}

impl TaskScheduler for TokioScheduler {
    fn schedule(&self, name: &str, delay: Duration, task: Task) -> ScheduledTask {
        let handle = ScheduledTask::new(name, delay);
        let fired = handle.clone();
        self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            run(&fired, task);
        });
        tracing::debug!(task = name, delay_ms = delay.as_millis() as u64, "task scheduled");
        handle
    }
}

struct FakeEntry {
    deadline: Duration,
    seq: u64,
    handle: ScheduledTask,
    task: Task,
}

impl PartialEq for FakeEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Eq for FakeEntry {}

impl PartialOrd for FakeEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FakeEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Min-heap: earliest first, then in scheduling order
        Reverse((self.deadline, self.seq)).cmp(&Reverse((other.deadline, other.seq)))
    }
}

#[derive(Default)]
struct FakeSchedulerState {
    now: Duration,
    next_seq: u64,
    entries: BinaryHeap<FakeEntry>,
}

/// Scheduler on virtual time for testing
///
/// Tasks run on the thread calling [`advance`](Self::advance).
#[derive(Clone, Default)]
pub struct FakeScheduler {
    state: Arc<Mutex<FakeSchedulerState>>,
}

impl FakeScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move virtual time forward, running every task that falls due
    ///
    /// Returns the number of tasks that ran.
    pub fn advance(&self, by: Duration) -> usize {
        let due = {
            let mut state = self.lock();
            state.now += by;
            let now = state.now;
            let mut due = Vec::new();
            while state.entries.peek().is_some_and(|e| e.deadline <= now) {
                if let Some(entry) = state.entries.pop() {
                    due.push(entry);
                }
            }
            due
        };

        due.into_iter()
            .map(|entry| run(&entry.handle, entry.task))
            .filter(|ran| *ran)
            .count()
    }

    /// Virtual time elapsed since creation
    pub fn elapsed(&self) -> Duration {
        self.lock().now
    }

    /// Tasks that are neither fired nor cancelled
    pub fn pending(&self) -> usize {
        self.lock()
            .entries
            .iter()
            .filter(|e| e.handle.is_pending())
            .count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeSchedulerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl TaskScheduler for FakeScheduler {
    fn schedule(&self, name: &str, delay: Duration, task: Task) -> ScheduledTask {
        let handle = ScheduledTask::new(name, delay);
        let mut state = self.lock();
        let seq = state.next_seq;
        state.next_seq += 1;
        let deadline = state.now + delay;
        state.entries.push(FakeEntry {
            deadline,
            seq,
            handle: handle.clone(),
            task,
        });
        handle
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
