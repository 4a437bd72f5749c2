//! Per-batch outcome reporting.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::extract::Rejected;

/// A record that could not be synced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub id: String,
    pub reason: String,
}

/// Outcome of reconciling one or more batches.
///
/// Fetch problems end up in `warnings`, record problems in `failed`; neither
/// stops the rest of the batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub created: Vec<String>,
    pub updated: Vec<String>,
    pub failed: Vec<Failure>,
    pub warnings: Vec<String>,
}

impl SyncReport {
    /// Create an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_created(&mut self, id: impl Into<String>) {
        self.created.push(id.into());
    }

    pub fn record_updated(&mut self, id: impl Into<String>) {
        self.updated.push(id.into());
    }

    pub fn record_failed(&mut self, id: impl Into<String>, reason: impl Into<String>) {
        self.failed.push(Failure {
            id: id.into(),
            reason: reason.into(),
        });
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Add records rejected during extraction as failures.
    pub fn record_rejected(&mut self, rejected: &[Rejected]) {
        for r in rejected {
            self.record_failed(r.id.clone(), r.reason.clone());
        }
    }

    /// Append another report's outcomes after this one's.
    pub fn merge(&mut self, other: SyncReport) {
        self.created.extend(other.created);
        self.updated.extend(other.updated);
        self.failed.extend(other.failed);
        self.warnings.extend(other.warnings);
    }

    /// True when no record failed. Warnings do not count.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Number of records processed, successful or not.
    pub fn total(&self) -> usize {
        self.created.len() + self.updated.len() + self.failed.len()
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} created, {} updated, {} failed, {} warnings",
            self.created.len(),
            self.updated.len(),
            self.failed.len(),
            self.warnings.len()
        )
    }
}
