//! Top-level upload dispatch.

use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use doctor_api::RemoteApi;
use doctor_common::{Error, Result, ScopeContext, ScopeLevel};

use crate::extract::{align_field_types, extract_definitions, extract_transformations};
use crate::loader::InputSource;
use crate::model::{json_kind, UploadDocument};
use crate::reconcile::Reconciler;
use crate::report::SyncReport;
use crate::version::apply_version;

/// What an upload pushes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UploadObject {
    /// Resource groups (object definitions and transformations), optionally
    /// scoped to a level.
    Vdrs,
    /// Resource groups pushed organization-wide, ignoring any level.
    CommonResources,
    /// Private element definitions.
    Elements,
    /// A full backup `{"vdrs": [...], "elements": [...]}`: groups
    /// organization-wide, then elements.
    All,
}

impl UploadObject {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadObject::Vdrs => "vdrs",
            UploadObject::CommonResources => "commonResources",
            UploadObject::Elements => "elements",
            UploadObject::All => "all",
        }
    }
}

/// Options of one upload, as given on the command line.
#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub object: UploadObject,
    pub file: Option<PathBuf>,
    pub dir: Option<PathBuf>,
    /// Only the group (or element) with this name.
    pub name: Option<String>,
    /// Target level; `None` pushes everything organization-wide.
    pub level: Option<ScopeLevel>,
    pub account_id: Option<String>,
    pub instance_id: Option<String>,
    pub version: Option<String>,
    /// Copy definition field types onto matching transformation fields.
    pub align_field_types: bool,
}

impl UploadOptions {
    /// Options with no source, filters or scope.
    pub fn new(object: UploadObject) -> Self {
        Self {
            object,
            file: None,
            dir: None,
            name: None,
            level: None,
            account_id: None,
            instance_id: None,
            version: None,
            align_field_types: true,
        }
    }

    /// The validated scope, or `None` for an unscoped sync.
    ///
    /// # Errors
    /// - `Configuration` if the level needs an identifier that is missing
    pub fn scope(&self) -> Result<Option<ScopeContext>> {
        let Some(level) = self.level else {
            return Ok(None);
        };

        if self.object != UploadObject::Vdrs {
            warn!("Level '{}' is ignored for {}", level, self.object.as_str());
            return Ok(None);
        }

        let scope = ScopeContext {
            level,
            account_id: self.account_id.clone(),
            instance_id: self.instance_id.clone(),
        };
        scope.validate()?;
        Ok(Some(scope))
    }
}

/// Reads the input, narrows it down and hands it to the reconciler.
pub struct Orchestrator<A: RemoteApi + ?Sized> {
    reconciler: Reconciler<A>,
}

impl<A: RemoteApi + ?Sized> Orchestrator<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self {
            reconciler: Reconciler::new(api),
        }
    }

    /// Run an upload.
    ///
    /// The scope is validated before anything is read or sent.
    ///
    /// # Errors
    /// - `Configuration` for missing identifiers or input source
    /// - `Io`, `Serialization` or `Validation` if the input cannot be read
    ///
    /// Per-record problems do not error; they are in the returned report.
    pub async fn upload(&self, options: &UploadOptions) -> Result<SyncReport> {
        let start = Instant::now();
        let scope = options.scope()?;
        let source = InputSource::select(options.file.as_deref(), options.dir.as_deref())?;

        info!("Uploading {} from {:?}", options.object.as_str(), source);
        let raw = source.load().await?;

        let report = match options.object {
            UploadObject::Elements => self.upload_elements(raw, options.name.as_deref()).await?,
            UploadObject::Vdrs | UploadObject::CommonResources => {
                self.upload_vdrs(raw, options, scope.as_ref()).await?
            }
            UploadObject::All => self.upload_backup(raw, options).await?,
        };

        info!("Upload completed in {:?}: {}", start.elapsed(), report);
        Ok(report)
    }

    /// Push the records of `doc`.
    ///
    /// With a scope, only records annotated with its level are pushed there.
    /// Without one, every record is pushed to the organization regardless of
    /// its level. Definitions always go before transformations.
    pub async fn sync_document(
        &self,
        doc: &UploadDocument,
        name: Option<&str>,
        scope: Option<&ScopeContext>,
        align: bool,
    ) -> Result<SyncReport> {
        let (level, target) = match scope {
            Some(scope) => (Some(scope.level), scope.clone()),
            None => (None, ScopeContext::organization()),
        };
        target.validate()?;

        let definitions = extract_definitions(doc, name, level);
        let mut transformations = extract_transformations(doc, name, level);
        if align {
            align_field_types(&mut transformations.records, &definitions.records);
        }

        if definitions.is_empty() && transformations.is_empty() {
            warn!(
                "Nothing to upload for name {:?} at level {}",
                name,
                level.map_or("any", |l| l.as_str())
            );
        }

        let mut report = SyncReport::new();
        report.record_rejected(&definitions.rejected);
        report.merge(
            self.reconciler
                .reconcile_definitions(&definitions.records, &target)
                .await?,
        );
        report.record_rejected(&transformations.rejected);
        report.merge(
            self.reconciler
                .reconcile_transformations(&transformations.records, &target)
                .await?,
        );
        Ok(report)
    }

    async fn upload_vdrs(
        &self,
        raw: Value,
        options: &UploadOptions,
        scope: Option<&ScopeContext>,
    ) -> Result<SyncReport> {
        let doc = apply_version(UploadDocument::from_value(raw)?, options.version.as_deref());
        if doc.is_empty() {
            warn!("Upload document has no object definitions or transformations");
        }
        self.sync_document(&doc, options.name.as_deref(), scope, options.align_field_types)
            .await
    }

    /// Restore what `export all` wrote. A missing section is skipped with a
    /// warning.
    async fn upload_backup(&self, raw: Value, options: &UploadOptions) -> Result<SyncReport> {
        let mut backup = match raw {
            Value::Object(map) => map,
            other => {
                return Err(Error::Validation(format!(
                    "A full upload needs an object with vdrs and elements, got {}",
                    json_kind(&other)
                )))
            }
        };

        let mut report = SyncReport::new();
        match backup.remove("vdrs") {
            Some(vdrs) => report.merge(self.upload_vdrs(vdrs, options, None).await?),
            None => warn!("No vdrs in the upload document"),
        }
        match backup.remove("elements") {
            Some(elements) => {
                report.merge(self.upload_elements(elements, options.name.as_deref()).await?)
            }
            None => warn!("No elements in the upload document"),
        }
        Ok(report)
    }

    async fn upload_elements(&self, raw: Value, name: Option<&str>) -> Result<SyncReport> {
        let elements = match raw {
            Value::Array(items) => items,
            value @ Value::Object(_) => vec![value],
            other => {
                return Err(Error::Validation(format!(
                    "Elements must be an object or a list of objects, got {}",
                    json_kind(&other)
                )))
            }
        };

        let elements: Vec<Value> = match name {
            Some(name) => elements
                .into_iter()
                .filter(|e| e.get("key").and_then(Value::as_str) == Some(name))
                .collect(),
            None => elements,
        };
        if elements.is_empty() {
            warn!("No elements to upload for name {:?}", name);
        }

        Ok(self.reconciler.reconcile_elements(&elements).await)
    }
}
