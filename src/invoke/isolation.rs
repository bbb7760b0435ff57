//! Failure isolation scope.
//!
//! Every handler invocation — worker pool or async call — runs inside
//! [`run_isolated`], the single point where an abnormal handler
//! termination is intercepted and converted into a structured failure
//! value. The enclosing loop logs one critical error and keeps running;
//! a defective handler costs one failed task, not a worker.

use std::any::Any;
use std::backtrace::Backtrace;
use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::error;

use crate::error::TaskmillError;

/// Structured record of an isolated handler failure.
#[derive(Debug)]
pub struct InvocationFailure {
    pub handler: String,
    pub message: String,
    pub backtrace: String,
}

/// Run `f` inside the isolation scope.
///
/// A panic raised by `f` is caught at this boundary, logged at error
/// level with the handler name and a captured backtrace, and returned as
/// an [`InvocationFailure`]. It never unwinds past this function.
pub fn run_isolated<T>(handler: &str, f: impl FnOnce() -> T) -> Result<T, InvocationFailure> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Ok(value),
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            let backtrace = Backtrace::force_capture().to_string();
            error!(
                handler = handler,
                message = %message,
                backtrace = %backtrace,
                "handler panicked, invocation isolated"
            );
            Err(InvocationFailure {
                handler: handler.to_string(),
                message,
                backtrace,
            })
        }
    }
}

/// Capture a panic into an error value.
///
/// For call sites outside the engines that want failures funneled into an
/// error channel instead of only logged.
pub fn capture_panic<T>(f: impl FnOnce() -> T) -> Result<T, TaskmillError> {
    catch_unwind(AssertUnwindSafe(f))
        .map_err(|payload| TaskmillError::ExecutionFailure(panic_message(payload.as_ref())))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
