//! Remote API trait definition.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use doctor_common::Result;

/// HTTP verb a call was issued with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    /// Read a collection or a single resource (GET).
    Get,
    /// Create a new resource (POST).
    Create,
    /// Replace an existing resource (PUT).
    Update,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Method::Get => "GET",
            Method::Create => "POST",
            Method::Update => "PUT",
        })
    }
}

/// The three verbs the sync core needs from the remote side.
///
/// Paths are relative to the API root (`organizations/objects/definitions`),
/// never absolute URLs. Implementations handle authentication and their own
/// request timeouts.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// Get the client name (e.g., "http", "memory").
    fn name(&self) -> &str;

    /// Fetch the JSON document at `path`.
    ///
    /// # Errors
    /// - `NotFound` when the remote has nothing at `path`
    /// - Network/authentication errors
    async fn get(&self, path: &str) -> Result<Value>;

    /// Create a resource at `path`.
    ///
    /// # Returns
    /// The parsed response body, `Value::Null` when the remote sends none.
    async fn create(&self, path: &str, body: &Value) -> Result<Value>;

    /// Update the resource at `path`.
    async fn update(&self, path: &str, body: &Value) -> Result<Value>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_display() {
        assert_eq!(Method::Get.to_string(), "GET");
        assert_eq!(Method::Create.to_string(), "POST");
        assert_eq!(Method::Update.to_string(), "PUT");
    }
}
