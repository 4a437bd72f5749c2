//! Common utilities and types shared across doctor crates.
//!
//! Holds the error type, the scope model (organization / account / instance)
//! and the environment description the API client is built from.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{Environment, ScopeContext, ScopeLevel, Secret};
