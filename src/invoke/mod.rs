//! # Handler Registry and Dynamic Invoker
//!
//! The dispatch core shared by both execution engines. Handlers are
//! plain functions registered under a name; each registration wraps the
//! function in a type-erased callable that closes over the concrete
//! parameter types and performs typed decoding explicitly, so the
//! dispatcher itself stays signature-agnostic without any runtime
//! reflection.
//!
//! Binding rules (applied per declared parameter position):
//!
//! - a supplied value crossing the serialization boundary is decoded
//!   structurally into the declared type (generic JSON maps decode into
//!   nested records);
//! - a supplied in-process value is bound by downcast, no decoding;
//! - an absent (`null`) value binds the zero value of the declared type,
//!   or of the variadic *element* type when the position falls in a
//!   [`Variadic`] tail.
//!
//! Every invocation runs inside the failure-isolation scope in
//! [`isolation`]: a panicking handler degrades to one failed invocation,
//! never a crashed loop.

mod args;
mod handler;
mod isolation;
mod registry;

pub use args::{CallArg, CallBind, TaskArg, Variadic};
pub use handler::{ErasedTaskHandler, IntoTaskHandler};
pub use isolation::{capture_panic, run_isolated, InvocationFailure};
pub use registry::HandlerRegistry;
