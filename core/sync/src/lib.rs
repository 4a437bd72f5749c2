//! Doctor sync engine
//!
//! Turns local upload documents into create-or-update calls against the
//! remote API, and exports remote resources back into the same format:
//! - Path resolution per resource kind, scope level and operation
//! - Extraction of definitions and transformations by name and level
//! - Version selection for repeated resource groups
//! - Concurrent reconciliation with per-record reporting

pub mod export;
pub mod extract;
pub mod loader;
pub mod model;
pub mod orchestrator;
pub mod paths;
pub mod reconcile;
pub mod report;
pub mod version;

pub use export::{ExportObject, Exporter};
pub use extract::{align_field_types, extract_definitions, extract_transformations, Extracted, Rejected};
pub use loader::InputSource;
pub use model::{Field, ObjectDefinition, ResourceGroup, Transformation, TransformationBody, UploadDocument};
pub use orchestrator::{Orchestrator, UploadObject, UploadOptions};
pub use paths::{resolve_path, Operation, PathParams, ResourceKind};
pub use reconcile::Reconciler;
pub use report::{Failure, SyncReport};
pub use version::apply_version;
