//! Schedule requests and the local scheduling buffer.

use chrono::{DateTime, Utc};
use crossbeam::queue::SegQueue;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// A schedule request travelling from the caller to a worker process.
///
/// Serializes to a byte encoding that round-trips all three fields
/// exactly; argument values stay generic JSON structures because the
/// concrete parameter types are only known to the process that registered
/// the handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSchedule {
    pub name: String,
    pub args: Vec<Value>,
    pub run_at: DateTime<Utc>,
}

impl TaskSchedule {
    pub fn new(name: impl Into<String>, run_at: DateTime<Utc>, args: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            args,
            run_at,
        }
    }

    /// Score used in the durable ordered set: the UTC Unix timestamp of
    /// the execution time.
    pub fn score(&self) -> i64 {
        self.run_at.timestamp()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Unbounded thread-safe FIFO for schedule requests not yet committed to
/// the durable broker.
///
/// Decouples the caller's enqueue latency from broker round-trips: any
/// number of producers enqueue, the promotion loop is the only consumer.
/// Items are never dropped here — a failed promotion re-enqueues at the
/// tail.
#[derive(Debug, Default)]
pub struct ScheduleBuffer {
    queue: SegQueue<TaskSchedule>,
}

impl ScheduleBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, schedule: TaskSchedule) {
        self.queue.push(schedule);
    }

    /// Non-blocking pop; `None` when the buffer is empty.
    pub fn dequeue(&self) -> Option<TaskSchedule> {
        self.queue.pop()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
