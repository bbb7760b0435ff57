//! Test doubles for the durable broker.
//!
//! `InMemoryBroker` implements the full `TaskBroker` capability against
//! process memory so engine tests need no running store; `FlakyBroker`
//! wraps it to simulate a broker that rejects the first N writes.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use taskmill::{Result, TaskBroker, TaskSchedule, TaskmillError};

#[derive(Default)]
struct BrokerState {
    persisted: Vec<(i64, Vec<u8>)>,
    ready: VecDeque<Vec<u8>>,
}

/// In-memory stand-in for the Redis-compatible store: a scored list and
/// a blocking FIFO.
#[derive(Default)]
pub struct InMemoryBroker {
    state: Mutex<BrokerState>,
    ready_notify: Notify,
}

impl InMemoryBroker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Entries written to the score-ordered set, in insertion order.
    pub fn persisted(&self) -> Vec<(i64, Vec<u8>)> {
        self.state.lock().persisted.clone()
    }

    pub fn persisted_count(&self) -> usize {
        self.state.lock().persisted.len()
    }
}

#[async_trait]
impl TaskBroker for InMemoryBroker {
    async fn persist_scheduled(&self, schedule: &TaskSchedule) -> Result<()> {
        let payload = schedule.to_bytes()?;
        self.state.lock().persisted.push((schedule.score(), payload));
        Ok(())
    }

    async fn pop_ready(&self) -> Result<Vec<u8>> {
        loop {
            if let Some(payload) = self.state.lock().ready.pop_front() {
                return Ok(payload);
            }
            self.ready_notify.notified().await;
        }
    }

    async fn push_ready(&self, payload: Vec<u8>) -> Result<()> {
        self.state.lock().ready.push_back(payload);
        self.ready_notify.notify_one();
        Ok(())
    }
}

/// Broker whose first `failures` persist calls are rejected; everything
/// else delegates to the wrapped in-memory broker.
pub struct FlakyBroker {
    inner: Arc<InMemoryBroker>,
    failures_remaining: AtomicUsize,
    persist_attempts: AtomicUsize,
}

impl FlakyBroker {
    pub fn new(inner: Arc<InMemoryBroker>, failures: usize) -> Arc<Self> {
        Arc::new(Self {
            inner,
            failures_remaining: AtomicUsize::new(failures),
            persist_attempts: AtomicUsize::new(0),
        })
    }

    pub fn persist_attempts(&self) -> usize {
        self.persist_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TaskBroker for FlakyBroker {
    async fn persist_scheduled(&self, schedule: &TaskSchedule) -> Result<()> {
        self.persist_attempts.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(TaskmillError::BrokerError(
                "simulated broker outage".to_string(),
            ));
        }
        self.inner.persist_scheduled(schedule).await
    }

    async fn pop_ready(&self) -> Result<Vec<u8>> {
        self.inner.pop_ready().await
    }

    async fn push_ready(&self, payload: Vec<u8>) -> Result<()> {
        self.inner.push_ready(payload).await
    }
}

/// Poll `predicate` until it holds or `timeout` elapses.
pub async fn wait_until(timeout: Duration, mut predicate: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if predicate() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    predicate()
}
