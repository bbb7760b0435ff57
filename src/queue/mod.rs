//! # Distributed Task Queue Engine
//!
//! Named task handlers, schedule requests, and a worker pool consuming
//! from a durable broker.
//!
//! Flow of a task instance: `scheduled` (local buffer) → `persisted`
//! (durable score-ordered set, score = UTC execution time) → `ready`
//! (durable FIFO; the promotion into this state is an external
//! collaborator's job) → `running` (popped by a worker) → `done` or
//! `failed`, both terminal and logged, never retried automatically.
//!
//! The local buffer is volatile: a crash between [`TaskRef::schedule`]
//! and a successful broker write loses those requests. Known limitation,
//! kept deliberately — `schedule` must never block on broker I/O.

mod broker;
mod engine;
mod promoter;
mod schedule;
mod worker;

pub use broker::{RedisBroker, TaskBroker, READY_TASKS_KEY, SCHEDULED_TASKS_KEY};
pub use engine::{TaskEngine, TaskRef};
pub use schedule::{ScheduleBuffer, TaskSchedule};
