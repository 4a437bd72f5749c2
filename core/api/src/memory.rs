//! In-memory remote API for testing.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::api::{Method, RemoteApi};
use doctor_common::{Error, Result};

/// A call recorded by [`MemoryApi`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

#[derive(Default)]
struct State {
    /// Documents served by `get`, keyed by path.
    documents: HashMap<String, Value>,
    /// Paths that fail for every verb, with the error message.
    failures: HashMap<String, String>,
    calls: Vec<RecordedCall>,
}

/// In-memory remote API.
///
/// Serves seeded documents for GET, echoes request bodies for POST/PUT and
/// records every call in order. Unseeded GET paths answer `NotFound`.
#[derive(Clone, Default)]
pub struct MemoryApi {
    state: Arc<Mutex<State>>,
}

impl MemoryApi {
    /// Create a new empty API.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Serve `document` for GET requests on `path`.
    pub fn seed(&self, path: impl Into<String>, document: Value) {
        self.lock().documents.insert(path.into(), document);
    }

    /// Make every call on `path` fail with a network error.
    pub fn fail(&self, path: impl Into<String>, message: impl Into<String>) {
        self.lock().failures.insert(path.into(), message.into());
    }

    /// All calls made so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    /// POST and PUT calls made so far, in order.
    pub fn writes(&self) -> Vec<RecordedCall> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.method != Method::Get)
            .cloned()
            .collect()
    }

    /// Whether a call with this verb and path was made.
    pub fn was_called(&self, method: Method, path: &str) -> bool {
        self.lock()
            .calls
            .iter()
            .any(|c| c.method == method && c.path == path)
    }

    fn record(&self, method: Method, path: &str, body: Option<&Value>) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(RecordedCall {
            method,
            path: path.to_string(),
            body: body.cloned(),
        });

        match state.failures.get(path) {
            Some(message) => Err(Error::Network(format!("{} {}: {}", method, path, message))),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RemoteApi for MemoryApi {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, path: &str) -> Result<Value> {
        self.record(Method::Get, path, None)?;

        self.lock()
            .documents
            .get(path)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Nothing at {}", path)))
    }

    async fn create(&self, path: &str, body: &Value) -> Result<Value> {
        self.record(Method::Create, path, Some(body))?;
        Ok(body.clone())
    }

    async fn update(&self, path: &str, body: &Value) -> Result<Value> {
        self.record(Method::Update, path, Some(body))?;
        Ok(body.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_memory_get_seeded() {
        let api = MemoryApi::new();
        api.seed("elements", json!([{"key": "sfdc"}]));

        let doc = api.get("elements").await.unwrap();
        assert_eq!(doc, json!([{"key": "sfdc"}]));
    }

    #[tokio::test]
    async fn test_memory_get_unseeded_is_not_found() {
        let api = MemoryApi::new();
        let result = api.get("organizations/objects/definitions").await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_memory_records_writes() {
        let api = MemoryApi::new();
        api.create("elements", &json!({"key": "a"})).await.unwrap();
        api.update("elements/a", &json!({"key": "a"})).await.unwrap();
        let _ = api.get("elements").await;

        let writes = api.writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].method, Method::Create);
        assert_eq!(writes[1].path, "elements/a");
        assert_eq!(api.calls().len(), 3);
        assert!(api.was_called(Method::Update, "elements/a"));
    }

    #[tokio::test]
    async fn test_memory_injected_failure() {
        let api = MemoryApi::new();
        api.fail("elements", "connection reset");

        let result = api.create("elements", &json!({})).await;
        assert!(matches!(result, Err(Error::Network(_))));
        // Failed calls are still recorded.
        assert_eq!(api.calls().len(), 1);
    }
}
