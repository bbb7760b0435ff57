//! Promotion loop: local buffer → durable scored set.
//!
//! A single dedicated loop drains the local scheduling buffer and writes
//! each schedule into the broker's score-ordered set. A failed write
//! re-enqueues the schedule at the buffer's tail and backs off; retries
//! are unbounded, so an unreachable broker grows the buffer rather than
//! losing work.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::sleep;
use tracing::{debug, error};

use crate::queue::broker::TaskBroker;
use crate::queue::schedule::ScheduleBuffer;

pub(crate) struct PromoterContext {
    pub buffer: Arc<ScheduleBuffer>,
    pub broker: Arc<dyn TaskBroker>,
    pub idle_sleep: Duration,
    pub retry_backoff: Duration,
}

pub(crate) async fn run_promoter(ctx: PromoterContext, mut shutdown: broadcast::Receiver<()>) {
    debug!("promotion loop started");

    loop {
        match shutdown.try_recv() {
            Err(broadcast::error::TryRecvError::Empty) => {}
            _ => break,
        }

        match ctx.buffer.dequeue() {
            None => {
                tokio::select! {
                    _ = sleep(ctx.idle_sleep) => {}
                    _ = shutdown.recv() => break,
                }
            }
            Some(schedule) => {
                if let Err(e) = ctx.broker.persist_scheduled(&schedule).await {
                    error!(
                        task = %schedule.name,
                        score = schedule.score(),
                        error = %e,
                        "failed to persist schedule, re-enqueueing"
                    );
                    ctx.buffer.enqueue(schedule);
                    tokio::select! {
                        _ = sleep(ctx.retry_backoff) => {}
                        _ = shutdown.recv() => break,
                    }
                }
            }
        }
    }

    debug!("promotion loop stopped");
}
