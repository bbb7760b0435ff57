//! Durable broker capability.
//!
//! The engine needs exactly two primitives from its durable store: a
//! score-ordered set holding serialized schedules keyed by execution
//! time, and a blocking FIFO of ready-to-run payloads. [`TaskBroker`]
//! captures that surface; [`RedisBroker`] implements it against any
//! Redis-compatible store. Moving entries from the scored set into the
//! ready FIFO when their time arrives is an external collaborator's job
//! (a periodic reaper), not part of this crate.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{ConnectionAddr, ConnectionInfo, RedisConnectionInfo};
use tracing::{debug, info};

use crate::config::BrokerConfig;
use crate::error::{Result, TaskmillError};
use crate::queue::schedule::TaskSchedule;

/// Scored set of serialized schedules awaiting promotion.
pub const SCHEDULED_TASKS_KEY: &str = "scheduled_tasks";
/// FIFO of payloads ready for worker consumption.
pub const READY_TASKS_KEY: &str = "todo_tasks";

/// The two durable-store primitives the engine depends on.
#[async_trait]
pub trait TaskBroker: Send + Sync + 'static {
    /// Insert a serialized schedule into the score-ordered set, scored
    /// by its UTC Unix execution timestamp.
    async fn persist_scheduled(&self, schedule: &TaskSchedule) -> Result<()>;

    /// Zero-timeout blocking pop of the next ready payload. Blocks
    /// indefinitely until an item is available.
    async fn pop_ready(&self) -> Result<Vec<u8>>;

    /// Push a payload onto the ready FIFO. Used by the external
    /// promotion collaborator (and by tests).
    async fn push_ready(&self, payload: Vec<u8>) -> Result<()>;
}

/// Redis-compatible implementation of [`TaskBroker`].
///
/// Non-blocking commands share one multiplexed connection. Blocking pops
/// get their own slots: a zero-timeout `BLPOP` monopolizes its
/// connection, so `pool_size` dedicated connections are opened up front
/// and handed out round-robin — workers beyond the pool size contend for
/// slots exactly like the pool in front of any shared client.
pub struct RedisBroker {
    write: ConnectionManager,
    poppers: Vec<tokio::sync::Mutex<ConnectionManager>>,
    next_popper: AtomicUsize,
}

impl RedisBroker {
    pub async fn connect(config: &BrokerConfig) -> Result<Self> {
        let (host, port) = match (&config.host, config.port) {
            (Some(host), Some(port)) => (host.clone(), port),
            _ => {
                return Err(TaskmillError::ConfigurationError(
                    "broker host/port not configured".to_string(),
                ))
            }
        };
        let addr = format!("{host}:{port}");

        let info = ConnectionInfo {
            addr: ConnectionAddr::Tcp(host, port),
            redis: RedisConnectionInfo {
                db: config.db,
                password: if config.password.is_empty() {
                    None
                } else {
                    Some(config.password.clone())
                },
                ..Default::default()
            },
        };
        let client = redis::Client::open(info)
            .map_err(|e| TaskmillError::BrokerError(format!("invalid broker address: {e}")))?;

        let write_config = ConnectionManagerConfig::new()
            .set_connection_timeout(config.pool_timeout)
            .set_response_timeout(config.pool_timeout);
        let write = ConnectionManager::new_with_config(client.clone(), write_config)
            .await
            .map_err(|e| TaskmillError::BrokerError(format!("cannot connect to {addr}: {e}")))?;

        // No response timeout here: these connections sit in BLPOP for
        // as long as the queue stays empty.
        let mut poppers = Vec::with_capacity(config.pool_size.max(1));
        for _ in 0..config.pool_size.max(1) {
            let pop_config =
                ConnectionManagerConfig::new().set_connection_timeout(config.pool_timeout);
            let manager = ConnectionManager::new_with_config(client.clone(), pop_config)
                .await
                .map_err(|e| {
                    TaskmillError::BrokerError(format!("cannot connect to {addr}: {e}"))
                })?;
            poppers.push(tokio::sync::Mutex::new(manager));
        }

        info!(addr = %addr, pool_size = poppers.len(), "connected to task broker");

        Ok(Self {
            write,
            poppers,
            next_popper: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl TaskBroker for RedisBroker {
    async fn persist_scheduled(&self, schedule: &TaskSchedule) -> Result<()> {
        let payload = schedule.to_bytes()?;
        let mut conn = self.write.clone();

        redis::cmd("ZADD")
            .arg(SCHEDULED_TASKS_KEY)
            .arg(schedule.score())
            .arg(payload)
            .query_async::<i64>(&mut conn)
            .await
            .map_err(|e| TaskmillError::BrokerError(format!("ZADD failed: {e}")))?;

        debug!(task = %schedule.name, score = schedule.score(), "schedule persisted");
        Ok(())
    }

    async fn pop_ready(&self) -> Result<Vec<u8>> {
        let slot = self.next_popper.fetch_add(1, Ordering::Relaxed) % self.poppers.len();
        let mut conn = self.poppers[slot].lock().await;

        let popped: Option<(String, Vec<u8>)> = redis::cmd("BLPOP")
            .arg(READY_TASKS_KEY)
            .arg(0)
            .query_async(&mut *conn)
            .await
            .map_err(|e| TaskmillError::BrokerError(format!("BLPOP failed: {e}")))?;

        match popped {
            Some((_key, payload)) => Ok(payload),
            None => Err(TaskmillError::BrokerError(
                "BLPOP returned no payload".to_string(),
            )),
        }
    }

    async fn push_ready(&self, payload: Vec<u8>) -> Result<()> {
        let mut conn = self.write.clone();

        redis::cmd("RPUSH")
            .arg(READY_TASKS_KEY)
            .arg(payload)
            .query_async::<i64>(&mut conn)
            .await
            .map_err(|e| TaskmillError::BrokerError(format!("RPUSH failed: {e}")))?;

        Ok(())
    }
}

impl std::fmt::Debug for RedisBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisBroker")
            .field("poppers", &self.poppers.len())
            .finish()
    }
}
