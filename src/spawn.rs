//! # In-Process Async Call Engine
//!
//! Fire-and-forget invocation of a named handler on an independent
//! blocking thread, with a single-use [`CallHandle`] for callers that
//! want the result.
//!
//! Every async handler takes the request context as its first parameter;
//! the [`IntoAsyncHandler`] bound enforces that shape at compile time.
//! Remaining arguments follow the in-process binding rules: concrete
//! values bind by downcast (no serialization boundary is crossed),
//! absent arguments bind the declared type's zero value, and a
//! [`Variadic`] tail binds element-wise.
//!
//! A handler that panics is intercepted at the isolation boundary and
//! logged; the handle's completion signal still fires, and
//! [`CallHandle::wait`] returns `None` instead of surfacing the failure.

use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::error;

use crate::context::RequestContext;
use crate::error::InvokeError;
use crate::invoke::{run_isolated, CallArg, CallBind, Variadic};

/// A handler after binding: context plus loosely-typed arguments in,
/// typed result (or binding error) out.
pub type BoundAsyncHandler<R> =
    Arc<dyn Fn(RequestContext, Vec<CallArg>) -> Result<R, InvokeError> + Send + Sync>;

/// Conversion from a concrete `Fn(RequestContext, A0, .., An) -> R` into
/// the bound form the engine dispatches. The context-first parameter is
/// part of the trait shape: a function without it simply does not
/// implement this trait.
pub trait IntoAsyncHandler<Args, R> {
    fn into_bound(self) -> BoundAsyncHandler<R>;
}

macro_rules! impl_async_handler {
    ($($param:ident),*) => {
        impl<F, R, $($param,)*> IntoAsyncHandler<($($param,)*), R> for F
        where
            F: Fn(RequestContext, $($param),*) -> R + Send + Sync + 'static,
            R: 'static,
            $($param: CallBind,)*
        {
            #[allow(non_snake_case, unused_mut, unused_variables)]
            fn into_bound(self) -> BoundAsyncHandler<R> {
                Arc::new(move |ctx: RequestContext, args: Vec<CallArg>| {
                    let expected = (&[$(stringify!($param)),*] as &[&str]).len();
                    if args.len() != expected {
                        return Err(InvokeError::Arity { expected, supplied: args.len() });
                    }
                    let mut supplied = args.into_iter();
                    let mut position = 0usize;
                    $(
                        let $param: $param = match supplied.next() {
                            Some(arg) => CallBind::bind_call(position, arg)?,
                            None => return Err(InvokeError::Arity { expected, supplied: position }),
                        };
                        position += 1;
                    )*
                    Ok((self)(ctx, $($param),*))
                })
            }
        }
    };
}

macro_rules! impl_async_handler_variadic {
    ($($param:ident),*) => {
        impl<F, R, $($param,)* V> IntoAsyncHandler<($($param,)* Variadic<V>,), R> for F
        where
            F: Fn(RequestContext, $($param,)* Variadic<V>) -> R + Send + Sync + 'static,
            R: 'static,
            $($param: CallBind,)*
            V: CallBind,
        {
            #[allow(non_snake_case, unused_mut, unused_variables)]
            fn into_bound(self) -> BoundAsyncHandler<R> {
                Arc::new(move |ctx: RequestContext, args: Vec<CallArg>| {
                    let fixed = (&[$(stringify!($param)),*] as &[&str]).len();
                    if args.len() < fixed {
                        return Err(InvokeError::ArityVariadic { expected: fixed, supplied: args.len() });
                    }
                    let mut supplied = args.into_iter();
                    let mut position = 0usize;
                    $(
                        let $param: $param = match supplied.next() {
                            Some(arg) => CallBind::bind_call(position, arg)?,
                            None => return Err(InvokeError::ArityVariadic { expected: fixed, supplied: position }),
                        };
                        position += 1;
                    )*
                    let tail: Variadic<V> = Variadic::bind_calls(position, supplied)?;
                    Ok((self)(ctx, $($param,)* tail))
                })
            }
        }
    };
}

impl_async_handler!();
impl_async_handler!(A0);
impl_async_handler!(A0, A1);
impl_async_handler!(A0, A1, A2);
impl_async_handler!(A0, A1, A2, A3);
impl_async_handler!(A0, A1, A2, A3, A4);
impl_async_handler!(A0, A1, A2, A3, A4, A5);

impl_async_handler_variadic!();
impl_async_handler_variadic!(A0);
impl_async_handler_variadic!(A0, A1);
impl_async_handler_variadic!(A0, A1, A2);
impl_async_handler_variadic!(A0, A1, A2, A3);
impl_async_handler_variadic!(A0, A1, A2, A3, A4);

/// A named handler callable without blocking the caller.
pub struct AsyncFunction<R> {
    name: Arc<str>,
    handler: BoundAsyncHandler<R>,
}

impl<R> Clone for AsyncFunction<R> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            handler: self.handler.clone(),
        }
    }
}

impl<R: Send + 'static> AsyncFunction<R> {
    /// Wrap a handler function. The first declared parameter must be
    /// [`RequestContext`]; that requirement is part of the
    /// [`IntoAsyncHandler`] bound, so a mismatched signature fails to
    /// compile rather than at construction.
    pub fn new<F, Args>(name: impl Into<String>, handler: F) -> Self
    where
        F: IntoAsyncHandler<Args, R>,
    {
        Self {
            name: Arc::from(name.into()),
            handler: handler.into_bound(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Launch the handler on an independent blocking thread and return
    /// immediately. The context binds as the implicit first argument.
    /// Must be called from within a Tokio runtime.
    ///
    /// Dropping the returned handle is allowed; the invocation still
    /// runs to completion.
    pub fn call(&self, ctx: RequestContext, args: Vec<CallArg>) -> CallHandle<R> {
        let (tx, rx) = oneshot::channel();
        let handler = self.handler.clone();
        let name = self.name.clone();

        tokio::task::spawn_blocking(move || {
            let outcome = run_isolated(&name, || handler(ctx, args));
            let value = match outcome {
                Ok(Ok(value)) => Some(value),
                Ok(Err(bind_error)) => {
                    error!(handler = %name, error = %bind_error, "async call binding failed");
                    None
                }
                // Already logged at the isolation boundary.
                Err(_failure) => None,
            };
            let _ = tx.send(value);
        });

        CallHandle { rx }
    }
}

/// Single-use completion handle for an async call.
pub struct CallHandle<R> {
    rx: oneshot::Receiver<Option<R>>,
}

impl<R> CallHandle<R> {
    /// Block until the invocation has fully returned.
    ///
    /// Yields `Some(result)` on success and `None` after an isolated
    /// failure — failure detail is available only through the log.
    pub async fn wait(self) -> Option<R> {
        self.rx.await.unwrap_or(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn call_returns_handler_result() {
        let greet = AsyncFunction::new("greet", |_ctx: RequestContext, name: String| {
            format!("hello {name}")
        });

        let handle = greet.call(RequestContext::new(), vec![CallArg::of("world".to_string())]);
        assert_eq!(handle.wait().await.as_deref(), Some("hello world"));
    }

    #[tokio::test]
    async fn absent_argument_binds_zero_value() {
        let f = AsyncFunction::new("count", |_ctx: RequestContext, n: u64, label: String| {
            (n, label)
        });

        let handle = f.call(
            RequestContext::new(),
            vec![CallArg::absent(), CallArg::of("x".to_string())],
        );
        assert_eq!(handle.wait().await, Some((0, "x".to_string())));
    }

    #[tokio::test]
    async fn wait_returns_after_panic_instead_of_hanging() {
        let f = AsyncFunction::new("explode", |_ctx: RequestContext| -> u32 {
            panic!("handler bug")
        });

        let handle = f.call(RequestContext::new(), vec![]);
        assert_eq!(handle.wait().await, None);
    }

    #[tokio::test]
    async fn type_mismatch_resolves_the_handle() {
        let f = AsyncFunction::new("typed", |_ctx: RequestContext, _n: u32| 1u8);

        let handle = f.call(RequestContext::new(), vec![CallArg::of("not a u32")]);
        assert_eq!(handle.wait().await, None);
    }

    #[tokio::test]
    async fn variadic_call_binds_tail_elements() {
        let f = AsyncFunction::new(
            "sum",
            |_ctx: RequestContext, base: u64, rest: Variadic<u64>| {
                base + rest.iter().sum::<u64>()
            },
        );

        let handle = f.call(
            RequestContext::new(),
            vec![
                CallArg::of(10u64),
                CallArg::of(1u64),
                CallArg::absent(),
                CallArg::of(2u64),
            ],
        );
        assert_eq!(handle.wait().await, Some(13));
    }

    #[tokio::test]
    async fn dropped_handle_still_runs_the_handler() {
        static RAN: AtomicUsize = AtomicUsize::new(0);

        let f = AsyncFunction::new("fire_and_forget", |_ctx: RequestContext| {
            RAN.fetch_add(1, Ordering::SeqCst);
        });

        drop(f.call(RequestContext::new(), vec![]));

        for _ in 0..50 {
            if RAN.load(Ordering::SeqCst) == 1 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("handler did not run after handle was dropped");
    }

    #[test]
    fn wait_drives_from_a_plain_runtime() {
        tokio_test::block_on(async {
            let double = AsyncFunction::new("double", |_ctx: RequestContext, n: u32| n * 2);
            let handle = double.call(RequestContext::new(), vec![CallArg::of(21u32)]);
            assert_eq!(handle.wait().await, Some(42));
        });
    }

    #[tokio::test]
    async fn context_is_bound_as_first_argument() {
        let ctx = RequestContext::new();
        ctx.insert("tenant", serde_json::json!("acme"));

        let f = AsyncFunction::new("whoami", |ctx: RequestContext| {
            ctx.get("tenant")
        });

        let handle = f.call(ctx, vec![]);
        assert_eq!(handle.wait().await, Some(Some(serde_json::json!("acme"))));
    }
}
