//! Process-wide handler registry.
//!
//! Populated during initialization, read concurrently and lock-free by
//! every worker afterwards. Nothing is ever unregistered.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::info;

use crate::invoke::handler::{ErasedTaskHandler, IntoTaskHandler};

#[derive(Default)]
pub struct HandlerRegistry {
    handlers: DashMap<String, Arc<dyn ErasedTaskHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under a unique name.
    ///
    /// # Panics
    ///
    /// Panics if `name` is already registered. Two handlers answering to
    /// the same name is ambiguous routing; the process must not start.
    pub fn register<F, Args>(&self, name: &str, handler: F)
    where
        F: IntoTaskHandler<Args>,
    {
        match self.handlers.entry(name.to_string()) {
            Entry::Occupied(_) => panic!("duplicate task handler name: {name}"),
            Entry::Vacant(slot) => {
                slot.insert(handler.into_handler());
            }
        }
        info!(task = name, "registered task handler");
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ErasedTaskHandler>> {
        self.handlers.get(name).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn registered_handler_is_retrievable() {
        let registry = HandlerRegistry::new();
        registry.register("noop", || {});

        assert_eq!(registry.len(), 1);
        let handler = registry.get("noop").expect("registered");
        handler.invoke(vec![]).unwrap();
    }

    #[test]
    fn unknown_name_yields_none() {
        let registry = HandlerRegistry::new();
        assert!(registry.get("missing").is_none());
    }

    #[test]
    #[should_panic(expected = "duplicate task handler name: send_email")]
    fn duplicate_name_is_fatal() {
        let registry = HandlerRegistry::new();
        registry.register("send_email", |_: String| {});
        registry.register("send_email", |_: String| {});
    }

    #[test]
    fn handlers_with_different_names_coexist() {
        let registry = HandlerRegistry::new();
        registry.register("a", |_: u32| {});
        registry.register("b", |_: String, _: u32| {});

        registry.get("a").unwrap().invoke(vec![json!(1)]).unwrap();
        registry
            .get("b")
            .unwrap()
            .invoke(vec![json!("x"), json!(2)])
            .unwrap();
    }
}
