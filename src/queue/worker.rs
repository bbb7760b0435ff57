//! Worker loop: durable ready FIFO → handler invocation → outcome log.
//!
//! Each worker processes one task at a time. A bad payload or unknown
//! handler name is logged and discarded; a panicking handler is isolated
//! and recorded as a 500. Nothing here terminates the loop short of
//! shutdown — a failed task never diminishes the pool.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tokio::time::sleep;
use tracing::{debug, error};

use crate::invoke::{run_isolated, HandlerRegistry};
use crate::logging::TaskLogSink;
use crate::queue::broker::TaskBroker;
use crate::queue::schedule::TaskSchedule;

pub(crate) struct WorkerContext {
    pub registry: Arc<HandlerRegistry>,
    pub broker: Arc<dyn TaskBroker>,
    pub sink: Arc<TaskLogSink>,
    pub pop_failure_delay: Duration,
}

pub(crate) async fn run_worker(
    worker_id: usize,
    ctx: Arc<WorkerContext>,
    mut shutdown: broadcast::Receiver<()>,
) {
    debug!(worker_id, "worker loop started");

    loop {
        let popped = tokio::select! {
            popped = ctx.broker.pop_ready() => popped,
            _ = shutdown.recv() => break,
        };

        match popped {
            Ok(payload) => process_payload(worker_id, &ctx, payload).await,
            Err(e) => {
                error!(worker_id, error = %e, "blocking pop failed");
                tokio::select! {
                    _ = sleep(ctx.pop_failure_delay) => {}
                    _ = shutdown.recv() => break,
                }
            }
        }
    }

    debug!(worker_id, "worker loop stopped");
}

async fn process_payload(worker_id: usize, ctx: &WorkerContext, payload: Vec<u8>) {
    let schedule = match TaskSchedule::from_bytes(&payload) {
        Ok(schedule) => schedule,
        Err(e) => {
            error!(worker_id, error = %e, "discarding undecodable task payload");
            return;
        }
    };

    let Some(handler) = ctx.registry.get(&schedule.name) else {
        error!(worker_id, task = %schedule.name, "unknown task, discarding");
        return;
    };

    debug!(worker_id, task = %schedule.name, "running task");

    let name = schedule.name.clone();
    let args = schedule.args;
    let started = Instant::now();

    let outcome = tokio::task::spawn_blocking({
        let name = name.clone();
        move || run_isolated(&name, move || handler.invoke(args))
    })
    .await;

    let status = match outcome {
        Ok(Ok(Ok(()))) => 200,
        Ok(Ok(Err(bind_error))) => {
            error!(worker_id, task = %name, error = %bind_error, "argument binding failed");
            500
        }
        // The isolation boundary already logged the panic.
        Ok(Err(_failure)) => 500,
        Err(join_error) => {
            error!(worker_id, task = %name, error = %join_error, "invocation task aborted");
            500
        }
    };

    ctx.sink.record(&name, status, started.elapsed());
}
