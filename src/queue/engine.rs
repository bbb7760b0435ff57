//! Engine lifecycle: construct, register, start, shutdown.
//!
//! The engine is an explicitly constructed object passed to whatever
//! needs it — no process-wide globals. Registration happens before
//! `start`; the registry is read-only once workers consume.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use futures::future::join_all;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::TaskmillConfig;
use crate::error::Result;
use crate::invoke::{HandlerRegistry, IntoTaskHandler};
use crate::logging::TaskLogSink;
use crate::queue::broker::{RedisBroker, TaskBroker};
use crate::queue::promoter::{run_promoter, PromoterContext};
use crate::queue::schedule::{ScheduleBuffer, TaskSchedule};
use crate::queue::worker::{run_worker, WorkerContext};

/// The distributed task queue engine.
pub struct TaskEngine {
    registry: Arc<HandlerRegistry>,
    buffer: Arc<ScheduleBuffer>,
    broker: Option<Arc<dyn TaskBroker>>,
    sink: Arc<TaskLogSink>,
    worker_threads: usize,
    promotion_idle_sleep: Duration,
    promotion_retry_backoff: Duration,
    pop_failure_delay: Duration,
    shutdown_tx: broadcast::Sender<()>,
    loop_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl TaskEngine {
    /// Build an engine from configuration, connecting to the broker when
    /// one is configured. With no broker host/port the distributed half
    /// stays disabled: schedule requests still buffer locally but are
    /// never persisted, and `start` spawns nothing.
    pub async fn from_config(config: &TaskmillConfig) -> Result<Self> {
        let broker: Option<Arc<dyn TaskBroker>> = match config.broker.addr() {
            Some(_) => Some(Arc::new(RedisBroker::connect(&config.broker).await?)),
            None => {
                warn!("task broker not configured, distributed task queue disabled");
                None
            }
        };
        let sink = Arc::new(TaskLogSink::from_config(config.task_log_file.as_deref())?);
        Ok(Self::build(broker, sink, config))
    }

    /// Build an engine around an externally supplied broker — any
    /// [`TaskBroker`] implementation, including test doubles.
    pub fn with_broker(
        broker: Arc<dyn TaskBroker>,
        sink: Arc<TaskLogSink>,
        config: &TaskmillConfig,
    ) -> Self {
        Self::build(Some(broker), sink, config)
    }

    fn build(
        broker: Option<Arc<dyn TaskBroker>>,
        sink: Arc<TaskLogSink>,
        config: &TaskmillConfig,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(8);
        Self {
            registry: Arc::new(HandlerRegistry::new()),
            buffer: Arc::new(ScheduleBuffer::new()),
            broker,
            sink,
            worker_threads: config.worker_threads.max(1),
            promotion_idle_sleep: config.promotion_idle_sleep,
            promotion_retry_backoff: config.promotion_retry_backoff,
            pop_failure_delay: config.pop_failure_delay,
            shutdown_tx,
            loop_handles: Mutex::new(Vec::new()),
        }
    }

    /// Register a task handler under a unique name, before `start`.
    ///
    /// Returns a [`TaskRef`] for scheduling executions of this task.
    ///
    /// # Panics
    ///
    /// Panics if the name is already registered.
    pub fn register<F, Args>(&self, name: &str, handler: F) -> TaskRef
    where
        F: IntoTaskHandler<Args>,
    {
        self.registry.register(name, handler);
        TaskRef {
            name: Arc::from(name),
            buffer: self.buffer.clone(),
        }
    }

    /// Number of schedule requests still waiting in the local buffer.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Spawn the promotion loop and the worker pool. A no-op (with a
    /// warning) when no broker is configured or the engine is already
    /// running.
    pub fn start(&self) {
        let Some(broker) = self.broker.clone() else {
            warn!("start requested without a configured broker, no workers started");
            return;
        };

        let mut handles = self.loop_handles.lock();
        if !handles.is_empty() {
            warn!("task engine already started");
            return;
        }

        info!(workers = self.worker_threads, "starting task engine");

        handles.push(tokio::spawn(run_promoter(
            PromoterContext {
                buffer: self.buffer.clone(),
                broker: broker.clone(),
                idle_sleep: self.promotion_idle_sleep,
                retry_backoff: self.promotion_retry_backoff,
            },
            self.shutdown_tx.subscribe(),
        )));

        let worker_ctx = Arc::new(WorkerContext {
            registry: self.registry.clone(),
            broker,
            sink: self.sink.clone(),
            pop_failure_delay: self.pop_failure_delay,
        });
        for worker_id in 0..self.worker_threads {
            handles.push(tokio::spawn(run_worker(
                worker_id,
                worker_ctx.clone(),
                self.shutdown_tx.subscribe(),
            )));
        }
    }

    /// Signal all loops to stop and wait for them to finish. In-flight
    /// task invocations run to completion first.
    pub async fn shutdown(&self) {
        let handles: Vec<_> = self.loop_handles.lock().drain(..).collect();
        if handles.is_empty() {
            return;
        }

        info!("shutting down task engine");
        let _ = self.shutdown_tx.send(());
        join_all(handles).await;
        info!("task engine stopped");
    }
}

impl std::fmt::Debug for TaskEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskEngine")
            .field("registry", &self.registry)
            .field("buffered", &self.buffer.len())
            .field("worker_threads", &self.worker_threads)
            .field("broker_configured", &self.broker.is_some())
            .finish()
    }
}

/// Handle for scheduling executions of one registered task.
#[derive(Clone)]
pub struct TaskRef {
    name: Arc<str>,
    buffer: Arc<ScheduleBuffer>,
}

impl TaskRef {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Enqueue an execution request for `run_at`, converted to UTC.
    /// Returns immediately; the promotion loop owns all broker I/O.
    pub fn schedule<Tz: TimeZone>(&self, run_at: DateTime<Tz>, args: Vec<Value>) {
        let schedule = TaskSchedule::new(self.name.as_ref(), run_at.with_timezone(&Utc), args);
        debug!(task = %self.name, run_at = %schedule.run_at, "schedule request buffered");
        self.buffer.enqueue(schedule);
    }
}

impl std::fmt::Debug for TaskRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRef").field("name", &self.name).finish()
    }
}
