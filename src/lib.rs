#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Taskmill
//!
//! Asynchronous and distributed task execution engine: fire-and-forget
//! in-process calls with future-style handles, plus named task handlers
//! executed by decoupled worker processes through a Redis-compatible
//! durable broker.
//!
//! ## Architecture
//!
//! Two engines share one dispatch core. The **in-process engine**
//! ([`AsyncFunction`]) launches a handler on an independent thread and
//! hands back a [`CallHandle`] the caller may wait on or drop. The
//! **distributed engine** ([`TaskEngine`]) registers named handlers,
//! buffers schedule requests locally, promotes them into a durable
//! score-ordered set keyed by execution time, and runs a worker pool
//! that blocking-pops ready payloads from a durable FIFO.
//!
//! The dispatch core binds loosely-typed arguments to each handler's
//! declared parameter types without runtime reflection: every
//! registration wraps the function in a type-erased callable that closes
//! over its concrete signature. Absent arguments bind the parameter
//! type's zero value; a [`Variadic`] tail binds element-wise. Every
//! invocation runs inside a failure-isolation scope — a panicking
//! handler costs one failed task, never a worker.
//!
//! ## Module Organization
//!
//! - [`config`] - Environment-driven configuration
//! - [`context`] - Request-context capability from the HTTP layer
//! - [`error`] - Structured error handling
//! - [`invoke`] - Handler registry, argument binding, failure isolation
//! - [`logging`] - Diagnostic logging and the task outcome log
//! - [`queue`] - Distributed task queue engine and worker pool
//! - [`spawn`] - In-process async call engine
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use taskmill::{RequestContext, TaskEngine, TaskmillConfig};
//! use chrono::{Duration, Utc};
//! use serde_json::json;
//!
//! # async fn example() -> taskmill::Result<()> {
//! taskmill::logging::init_logging();
//!
//! let config = TaskmillConfig::from_env()?;
//! let engine = TaskEngine::from_config(&config).await?;
//!
//! let greet = engine.register("greet", |name: String| {
//!     println!("hello {name}");
//! });
//!
//! engine.start();
//! greet.schedule(Utc::now() + Duration::hours(1), vec![json!("world")]);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod invoke;
pub mod logging;
pub mod queue;
pub mod spawn;

pub use config::{BrokerConfig, TaskmillConfig};
pub use context::RequestContext;
pub use error::{InvokeError, Result, TaskmillError};
pub use invoke::{
    capture_panic, CallArg, CallBind, HandlerRegistry, IntoTaskHandler, InvocationFailure,
    TaskArg, Variadic,
};
pub use logging::TaskLogSink;
pub use queue::{
    RedisBroker, ScheduleBuffer, TaskBroker, TaskEngine, TaskRef, TaskSchedule, READY_TASKS_KEY,
    SCHEDULED_TASKS_KEY,
};
pub use spawn::{AsyncFunction, CallHandle, IntoAsyncHandler};
