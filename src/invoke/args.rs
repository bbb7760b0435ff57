//! Argument binding for dynamically dispatched handlers.
//!
//! Two binding paths share the same rules but cross different
//! boundaries: [`TaskArg`] decodes loosely-typed JSON values that arrived
//! through the durable broker, while [`CallBind`] binds concrete
//! in-process values by downcast. Both synthesize the zero value
//! (`Default`) for absent arguments.

use std::any::Any;
use std::fmt;
use std::ops::Deref;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::InvokeError;

/// One argument of an in-process async call: either a concrete value or
/// an explicit absence that binds the parameter's zero value.
pub enum CallArg {
    Absent,
    Value(Box<dyn Any + Send>),
}

impl CallArg {
    /// Wrap a concrete value. The value must have exactly the declared
    /// parameter type; in-process calls cross no serialization boundary,
    /// so no conversion is attempted at bind time.
    pub fn of<T: Any + Send>(value: T) -> Self {
        CallArg::Value(Box::new(value))
    }

    /// An absent argument; binds `Default::default()` of the declared
    /// parameter type (or of the variadic element type in the tail).
    pub fn absent() -> Self {
        CallArg::Absent
    }
}

impl fmt::Debug for CallArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallArg::Absent => write!(f, "CallArg::Absent"),
            CallArg::Value(_) => write!(f, "CallArg::Value(..)"),
        }
    }
}

/// A parameter type bindable from a loosely-typed broker value.
pub trait TaskArg: Sized + Send + 'static {
    fn bind_value(position: usize, value: Value) -> Result<Self, InvokeError>;
}

impl<T> TaskArg for T
where
    T: DeserializeOwned + Default + Send + 'static,
{
    fn bind_value(position: usize, value: Value) -> Result<Self, InvokeError> {
        match value {
            Value::Null => Ok(T::default()),
            value => serde_json::from_value(value).map_err(|e| InvokeError::Decode {
                position,
                reason: e.to_string(),
            }),
        }
    }
}

/// A parameter type bindable from a concrete in-process value.
pub trait CallBind: Sized + Send + 'static {
    fn bind_call(position: usize, arg: CallArg) -> Result<Self, InvokeError>;
}

impl<T> CallBind for T
where
    T: Any + Default + Send + 'static,
{
    fn bind_call(position: usize, arg: CallArg) -> Result<Self, InvokeError> {
        match arg {
            CallArg::Absent => Ok(T::default()),
            CallArg::Value(boxed) => boxed
                .downcast::<T>()
                .map(|boxed| *boxed)
                .map_err(|_| InvokeError::TypeMismatch { position }),
        }
    }
}

/// Marker for a variadic trailing parameter.
///
/// A handler whose last parameter is `Variadic<T>` accepts any number of
/// trailing arguments; each one binds as a `T`, with absent values
/// binding `T::default()`. `Variadic` deliberately implements neither
/// [`TaskArg`] nor [`CallBind`] (it has no `Default`), which keeps the
/// fixed-arity and variadic wrapper impls from overlapping.
pub struct Variadic<T>(pub Vec<T>);

impl<T> Variadic<T> {
    pub fn into_inner(self) -> Vec<T> {
        self.0
    }
}

impl<T> Deref for Variadic<T> {
    type Target = Vec<T>;

    fn deref(&self) -> &Vec<T> {
        &self.0
    }
}

impl<T> IntoIterator for Variadic<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<T: fmt::Debug> fmt::Debug for Variadic<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Variadic").field(&self.0).finish()
    }
}

impl<T: TaskArg> Variadic<T> {
    pub(crate) fn bind_values(
        start: usize,
        tail: impl Iterator<Item = Value>,
    ) -> Result<Self, InvokeError> {
        let mut items = Vec::new();
        for (offset, value) in tail.enumerate() {
            items.push(T::bind_value(start + offset, value)?);
        }
        Ok(Variadic(items))
    }
}

impl<T: CallBind> Variadic<T> {
    pub(crate) fn bind_calls(
        start: usize,
        tail: impl Iterator<Item = CallArg>,
    ) -> Result<Self, InvokeError> {
        let mut items = Vec::new();
        for (offset, arg) in tail.enumerate() {
            items.push(T::bind_call(start + offset, arg)?);
        }
        Ok(Variadic(items))
    }
}
