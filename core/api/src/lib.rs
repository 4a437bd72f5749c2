//! Remote API abstraction for doctor.
//!
//! The sync core only ever talks to the remote side through the
//! [`RemoteApi`] trait: `get`, `create` and `update` on API-relative paths.
//!
//! # Implementations
//! - [`HttpApiClient`]: reqwest client bound to one configured environment
//! - [`MemoryApi`]: in-memory double that records calls, used by tests

pub mod api;
pub mod http;
pub mod memory;

pub use api::{Method, RemoteApi};
pub use http::HttpApiClient;
pub use memory::{MemoryApi, RecordedCall};
