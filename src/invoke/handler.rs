//! Type-erased handler wrappers.
//!
//! Each registered function is wrapped in a callable that remembers the
//! concrete parameter types at compile time and exposes the uniform
//! [`ErasedTaskHandler::invoke`] capability over loosely-typed argument
//! vectors. Return values are discarded: the distributed engine records
//! only success or failure.

use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::Value;

use crate::error::InvokeError;
use crate::invoke::args::{TaskArg, Variadic};

/// Uniform invocation capability over an erased handler signature.
pub trait ErasedTaskHandler: Send + Sync + 'static {
    fn invoke(&self, args: Vec<Value>) -> Result<(), InvokeError>;
}

/// Conversion from a concrete function into an erased handler.
///
/// Implemented for `Fn(A0, .., An) -> R` up to six parameters, plus the
/// variadic forms `Fn(A0, .., Ak, Variadic<T>) -> R`. The `Args` type
/// parameter exists only to keep the impls apart during inference.
pub trait IntoTaskHandler<Args> {
    fn into_handler(self) -> Arc<dyn ErasedTaskHandler>;
}

struct FnTaskHandler<F, Args> {
    f: F,
    _args: PhantomData<fn(Args)>,
}

macro_rules! impl_fixed_arity {
    ($($param:ident),*) => {
        impl<F, R, $($param,)*> IntoTaskHandler<($($param,)*)> for F
        where
            F: Fn($($param),*) -> R + Send + Sync + 'static,
            R: 'static,
            $($param: TaskArg,)*
        {
            fn into_handler(self) -> Arc<dyn ErasedTaskHandler> {
                Arc::new(FnTaskHandler {
                    f: self,
                    _args: PhantomData::<fn(($($param,)*))>,
                })
            }
        }

        impl<F, R, $($param,)*> ErasedTaskHandler for FnTaskHandler<F, ($($param,)*)>
        where
            F: Fn($($param),*) -> R + Send + Sync + 'static,
            R: 'static,
            $($param: TaskArg,)*
        {
            #[allow(non_snake_case, unused_mut, unused_variables)]
            fn invoke(&self, args: Vec<Value>) -> Result<(), InvokeError> {
                let expected = (&[$(stringify!($param)),*] as &[&str]).len();
                if args.len() != expected {
                    return Err(InvokeError::Arity { expected, supplied: args.len() });
                }
                let mut values = args.into_iter();
                let mut position = 0usize;
                $(
                    let $param: $param = match values.next() {
                        Some(value) => TaskArg::bind_value(position, value)?,
                        None => return Err(InvokeError::Arity { expected, supplied: position }),
                    };
                    position += 1;
                )*
                let _ = (self.f)($($param),*);
                Ok(())
            }
        }
    };
}

macro_rules! impl_variadic_arity {
    ($($param:ident),*) => {
        impl<F, R, $($param,)* V> IntoTaskHandler<($($param,)* Variadic<V>,)> for F
        where
            F: Fn($($param,)* Variadic<V>) -> R + Send + Sync + 'static,
            R: 'static,
            $($param: TaskArg,)*
            V: TaskArg,
        {
            fn into_handler(self) -> Arc<dyn ErasedTaskHandler> {
                Arc::new(FnTaskHandler {
                    f: self,
                    _args: PhantomData::<fn(($($param,)* Variadic<V>,))>,
                })
            }
        }

        impl<F, R, $($param,)* V> ErasedTaskHandler for FnTaskHandler<F, ($($param,)* Variadic<V>,)>
        where
            F: Fn($($param,)* Variadic<V>) -> R + Send + Sync + 'static,
            R: 'static,
            $($param: TaskArg,)*
            V: TaskArg,
        {
            #[allow(non_snake_case, unused_mut, unused_variables)]
            fn invoke(&self, args: Vec<Value>) -> Result<(), InvokeError> {
                let fixed = (&[$(stringify!($param)),*] as &[&str]).len();
                if args.len() < fixed {
                    return Err(InvokeError::ArityVariadic { expected: fixed, supplied: args.len() });
                }
                let mut values = args.into_iter();
                let mut position = 0usize;
                $(
                    let $param: $param = match values.next() {
                        Some(value) => TaskArg::bind_value(position, value)?,
                        None => return Err(InvokeError::ArityVariadic { expected: fixed, supplied: position }),
                    };
                    position += 1;
                )*
                let tail: Variadic<V> = Variadic::bind_values(position, values)?;
                let _ = (self.f)($($param,)* tail);
                Ok(())
            }
        }
    };
}

impl_fixed_arity!();
impl_fixed_arity!(A0);
impl_fixed_arity!(A0, A1);
impl_fixed_arity!(A0, A1, A2);
impl_fixed_arity!(A0, A1, A2, A3);
impl_fixed_arity!(A0, A1, A2, A3, A4);
impl_fixed_arity!(A0, A1, A2, A3, A4, A5);

impl_variadic_arity!();
impl_variadic_arity!(A0);
impl_variadic_arity!(A0, A1);
impl_variadic_arity!(A0, A1, A2);
impl_variadic_arity!(A0, A1, A2, A3);
impl_variadic_arity!(A0, A1, A2, A3, A4);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoke::args::Variadic;
    use parking_lot::Mutex;
    use serde_json::json;

    fn erase<F, Args>(f: F) -> Arc<dyn ErasedTaskHandler>
    where
        F: IntoTaskHandler<Args>,
    {
        f.into_handler()
    }

    #[test]
    fn invokes_with_decoded_arguments() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handler = erase(move |name: String, count: u32| {
            sink.lock().push((name, count));
        });

        handler.invoke(vec![json!("widget"), json!(3)]).unwrap();
        assert_eq!(seen.lock().as_slice(), &[("widget".to_string(), 3)]);
    }

    #[test]
    fn null_argument_binds_zero_value_at_its_position() {
        let seen = Arc::new(Mutex::new(None));
        let sink = seen.clone();
        let handler = erase(move |name: String, count: u32| {
            *sink.lock() = Some((name, count));
        });

        handler.invoke(vec![json!("widget"), json!(null)]).unwrap();
        assert_eq!(*seen.lock(), Some(("widget".to_string(), 0)));
    }

    #[test]
    fn arity_mismatch_is_rejected() {
        let handler = erase(|_: String, _: u32| {});

        let err = handler.invoke(vec![json!("only one")]).unwrap_err();
        assert_eq!(err, InvokeError::Arity { expected: 2, supplied: 1 });

        let err = handler
            .invoke(vec![json!("a"), json!(1), json!("extra")])
            .unwrap_err();
        assert_eq!(err, InvokeError::Arity { expected: 2, supplied: 3 });
    }

    #[test]
    fn variadic_tail_collects_remaining_arguments() {
        let seen = Arc::new(Mutex::new(None));
        let sink = seen.clone();
        let handler = erase(move |prefix: String, rest: Variadic<String>| {
            *sink.lock() = Some((prefix, rest.into_inner()));
        });

        handler
            .invoke(vec![json!("p"), json!("a"), json!(null), json!("c")])
            .unwrap();
        let (prefix, rest) = seen.lock().take().unwrap();
        assert_eq!(prefix, "p");
        assert_eq!(rest, vec!["a".to_string(), String::new(), "c".to_string()]);
    }

    #[test]
    fn variadic_accepts_empty_tail() {
        let seen = Arc::new(Mutex::new(None));
        let sink = seen.clone();
        let handler = erase(move |rest: Variadic<u64>| {
            *sink.lock() = Some(rest.into_inner());
        });

        handler.invoke(vec![]).unwrap();
        assert_eq!(seen.lock().take().unwrap(), Vec::<u64>::new());
    }

    #[test]
    fn zero_arity_handler_runs() {
        let seen = Arc::new(Mutex::new(0usize));
        let sink = seen.clone();
        let handler = erase(move || {
            *sink.lock() += 1;
        });

        handler.invoke(vec![]).unwrap();
        assert_eq!(*seen.lock(), 1);
    }

    mod binding_properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            // Supplied values bind exactly; null always binds the zero
            // value regardless of position.
            #[test]
            fn supplied_values_round_trip(n in any::<i64>(), s in ".*") {
                let seen = Arc::new(Mutex::new(None));
                let sink = seen.clone();
                let handler = erase(move |a: i64, b: String| {
                    *sink.lock() = Some((a, b));
                });

                handler.invoke(vec![json!(n), json!(s.clone())]).unwrap();
                prop_assert_eq!(seen.lock().take(), Some((n, s)));
            }

            #[test]
            fn null_in_variadic_tail_binds_element_default(values in proptest::collection::vec(any::<u32>(), 0..8)) {
                let seen = Arc::new(Mutex::new(None));
                let sink = seen.clone();
                let handler = erase(move |rest: Variadic<u32>| {
                    *sink.lock() = Some(rest.into_inner());
                });

                let mut args: Vec<serde_json::Value> = values.iter().map(|v| json!(v)).collect();
                args.push(json!(null));

                handler.invoke(args).unwrap();
                let mut expected = values.clone();
                expected.push(0);
                prop_assert_eq!(seen.lock().take(), Some(expected));
            }
        }
    }
}
