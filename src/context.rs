//! Request-context capability.
//!
//! The HTTP layer that fronts this engine is an external collaborator; it
//! hands every in-process async call an opaque [`RequestContext`] as the
//! implicit first argument. The engine never looks inside it beyond the
//! type itself — the data map exists for handlers and middleware to
//! share request-scoped values.

use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

/// Opaque per-request value passed to every async handler.
///
/// Cheap to clone; clones share the same underlying data.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    inner: Arc<ContextInner>,
}

#[derive(Debug, Default)]
struct ContextInner {
    request_id: Uuid,
    data: parking_lot::RwLock<HashMap<String, serde_json::Value>>,
}

impl RequestContext {
    /// Create a context with a fresh correlation id.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ContextInner {
                request_id: Uuid::new_v4(),
                data: parking_lot::RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Correlation id assigned when the request entered the system.
    pub fn request_id(&self) -> Uuid {
        self.inner.request_id
    }

    /// Attach a request-scoped value.
    pub fn insert(&self, key: impl Into<String>, value: serde_json::Value) {
        self.inner.data.write().insert(key.into(), value);
    }

    /// Read back a request-scoped value.
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.inner.data.read().get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_data() {
        let ctx = RequestContext::new();
        let other = ctx.clone();

        ctx.insert("user_id", serde_json::json!(42));
        assert_eq!(other.get("user_id"), Some(serde_json::json!(42)));
        assert_eq!(ctx.request_id(), other.request_id());
    }
}
