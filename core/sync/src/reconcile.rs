//! Create-or-update reconciliation of local records against the remote API.

use futures::future::join_all;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use doctor_api::RemoteApi;
use doctor_common::{Error, Result, ScopeContext, ScopeLevel};

use crate::model::{json_kind, ObjectDefinition, Transformation};
use crate::paths::{element_path, resolve_path, Operation, PathParams, ResourceKind, ELEMENTS_PATH};
use crate::report::SyncReport;

/// Write to issue for one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteOp {
    Create,
    Update,
}

impl WriteOp {
    fn for_existing(exists: bool) -> Self {
        if exists {
            WriteOp::Update
        } else {
            WriteOp::Create
        }
    }

    fn operation(self) -> Operation {
        match self {
            WriteOp::Create => Operation::Create,
            WriteOp::Update => Operation::Update,
        }
    }
}

/// A resolved write, or the reason none could be planned.
struct Plan {
    id: String,
    action: std::result::Result<(WriteOp, String, Value), String>,
}

enum Outcome {
    Created,
    Updated,
    Failed(String),
}

/// Decides per record whether to create or update, and issues the calls.
///
/// Every batch fetches the remote collection once, then runs all record
/// writes concurrently and waits for all of them before returning. A failed
/// write is recorded and never cancels its siblings.
pub struct Reconciler<A: RemoteApi + ?Sized> {
    api: Arc<A>,
}

impl<A: RemoteApi + ?Sized> Reconciler<A> {
    /// Create a reconciler over the given API.
    pub fn new(api: Arc<A>) -> Self {
        Self { api }
    }

    /// Get the underlying API.
    pub fn api(&self) -> &Arc<A> {
        &self.api
    }

    /// Create or update object definitions in `scope`.
    ///
    /// # Errors
    /// - `Configuration` if the scope lacks a required identifier; no call is made
    pub async fn reconcile_definitions(
        &self,
        definitions: &[ObjectDefinition],
        scope: &ScopeContext,
    ) -> Result<SyncReport> {
        scope.validate()?;
        let mut report = SyncReport::new();
        if definitions.is_empty() {
            return Ok(report);
        }

        let existing = self
            .fetch_existing(ResourceKind::Definitions, scope, &mut report)
            .await;
        let params = PathParams::for_scope(scope);

        let plans = definitions
            .iter()
            .map(|definition| {
                let op = WriteOp::for_existing(existing.contains(definition.key()));
                let path = resolve_path(
                    ResourceKind::Definitions,
                    scope.level,
                    op.operation(),
                    &params.object(&definition.object_name),
                );
                Plan {
                    id: definition.object_name.clone(),
                    action: plan_write(op, path, definition.payload(), scope.level),
                }
            })
            .collect();

        report.merge(self.apply(plans).await);
        Ok(report)
    }

    /// Create or update transformations in `scope`.
    ///
    /// # Errors
    /// - `Configuration` if the scope lacks a required identifier; no call is made
    pub async fn reconcile_transformations(
        &self,
        transformations: &[Transformation],
        scope: &ScopeContext,
    ) -> Result<SyncReport> {
        scope.validate()?;
        let mut report = SyncReport::new();
        if transformations.is_empty() {
            return Ok(report);
        }

        let existing = self
            .fetch_existing(ResourceKind::Transformations, scope, &mut report)
            .await;
        let params = PathParams::for_scope(scope);
        let mut planned = HashSet::new();

        let plans = transformations
            .iter()
            .map(|transformation| {
                let key = transformation_key(scope.level, &transformation.element_key, &transformation.object_name);
                if !planned.insert(key.clone()) {
                    // Two elements mapping one object on an instance share a path.
                    return Plan {
                        id: transformation.id(),
                        action: Err(Error::Validation(format!(
                            "Another transformation of {} is already sent to this {}",
                            transformation.object_name, scope.level
                        ))
                        .to_string()),
                    };
                }
                let op = WriteOp::for_existing(existing.contains(&key));
                let path = resolve_path(
                    ResourceKind::Transformations,
                    scope.level,
                    op.operation(),
                    &params
                        .object(&transformation.object_name)
                        .element(&transformation.element_key),
                );
                Plan {
                    id: transformation.id(),
                    action: plan_write(op, path, transformation.payload(), scope.level),
                }
            })
            .collect();

        report.merge(self.apply(plans).await);
        Ok(report)
    }

    /// Create or update private elements, matched by `key`.
    pub async fn reconcile_elements(&self, elements: &[Value]) -> SyncReport {
        let mut report = SyncReport::new();
        if elements.is_empty() {
            return report;
        }

        let existing = match self.api.get(ELEMENTS_PATH).await {
            Ok(value) => private_element_keys(&value).unwrap_or_else(|reason| {
                fallback_warning(&mut report, ELEMENTS_PATH, &reason);
                HashSet::new()
            }),
            Err(e) => {
                fallback_warning(&mut report, ELEMENTS_PATH, &e.to_string());
                HashSet::new()
            }
        };

        let plans = elements
            .iter()
            .enumerate()
            .map(|(index, element)| match element.get("key").and_then(Value::as_str) {
                Some(key) if !key.trim().is_empty() => {
                    let op = WriteOp::for_existing(existing.contains(key));
                    let path = match op {
                        WriteOp::Create => Some(ELEMENTS_PATH.to_string()),
                        WriteOp::Update => element_path(key),
                    };
                    let action = path
                        .map(|path| (op, path, element.clone()))
                        .ok_or_else(|| {
                            Error::Configuration(format!("No path for element '{}'", key)).to_string()
                        });
                    Plan {
                        id: key.to_string(),
                        action,
                    }
                }
                _ => Plan {
                    id: format!("elements[{}]", index),
                    action: Err(Error::Validation("Element has no key".to_string()).to_string()),
                },
            })
            .collect();

        report.merge(self.apply(plans).await);
        report
    }

    /// Keys of the records already present in the scope.
    ///
    /// Any failure degrades to an empty set plus a report warning, so every
    /// record is routed through create.
    async fn fetch_existing(
        &self,
        kind: ResourceKind,
        scope: &ScopeContext,
        report: &mut SyncReport,
    ) -> HashSet<String> {
        let params = PathParams::for_scope(scope);
        let Some(path) = resolve_path(kind, scope.level, Operation::Retrieve, &params) else {
            fallback_warning(report, &format!("{:?} at {}", kind, scope.level), "no retrieve path");
            return HashSet::new();
        };

        debug!("Fetching existing {:?} from {}", kind, path);
        match self.api.get(&path).await {
            Ok(value) => index_remote(kind, scope.level, &value).unwrap_or_else(|reason| {
                fallback_warning(report, &path, &reason);
                HashSet::new()
            }),
            Err(e) => {
                fallback_warning(report, &path, &e.to_string());
                HashSet::new()
            }
        }
    }

    /// Run every planned write concurrently and collect the outcomes in
    /// plan order.
    async fn apply(&self, plans: Vec<Plan>) -> SyncReport {
        let api = &self.api;

        let outcomes = join_all(plans.into_iter().map(|plan| async move {
            let outcome = match plan.action {
                Err(reason) => Outcome::Failed(reason),
                Ok((op, path, body)) => {
                    let result = match op {
                        WriteOp::Create => api.create(&path, &body).await,
                        WriteOp::Update => api.update(&path, &body).await,
                    };
                    match (result, op) {
                        (Ok(_), WriteOp::Create) => Outcome::Created,
                        (Ok(_), WriteOp::Update) => Outcome::Updated,
                        (Err(e), _) => Outcome::Failed(e.to_string()),
                    }
                }
            };
            (plan.id, outcome)
        }))
        .await;

        let mut report = SyncReport::new();
        for (id, outcome) in outcomes {
            match outcome {
                Outcome::Created => {
                    info!("Created {}", id);
                    report.record_created(id);
                }
                Outcome::Updated => {
                    info!("Updated {}", id);
                    report.record_updated(id);
                }
                Outcome::Failed(reason) => {
                    error!("Failed to sync {}: {}", id, reason);
                    report.record_failed(id, reason);
                }
            }
        }
        report
    }
}

fn plan_write(
    op: WriteOp,
    path: Option<String>,
    payload: Result<Value>,
    level: ScopeLevel,
) -> std::result::Result<(WriteOp, String, Value), String> {
    let path = path.ok_or_else(|| {
        Error::Configuration(format!(
            "No {:?} path at level {}: missing identifier",
            op, level
        ))
        .to_string()
    })?;
    let body = payload.map_err(|e| e.to_string())?;
    Ok((op, path, body))
}

fn fallback_warning(report: &mut SyncReport, source: &str, reason: &str) {
    warn!("Could not read existing records from {}: {}. Treating as empty", source, reason);
    report.warn(format!(
        "Could not read existing records from {} ({}); all records were sent as creates",
        source, reason
    ));
}

/// Identity of a transformation within a scope.
///
/// An instance is bound to a single element, so there the object name alone
/// identifies the transformation.
pub fn transformation_key(level: ScopeLevel, element_key: &str, object_name: &str) -> String {
    match level {
        ScopeLevel::Instance => object_name.to_string(),
        ScopeLevel::Organization | ScopeLevel::Account => format!("{}/{}", element_key, object_name),
    }
}

/// Normalize a retrieve response into identity keys.
///
/// Accepts the map shapes the API returns (`{objectName: ...}` for
/// definitions and instance transformations,
/// `{elementKey: {objectName: ...}}` for organization and account
/// transformations) as well as arrays of records.
pub fn index_remote(
    kind: ResourceKind,
    level: ScopeLevel,
    value: &Value,
) -> std::result::Result<HashSet<String>, String> {
    let nested = kind == ResourceKind::Transformations && level != ScopeLevel::Instance;

    match value {
        Value::Null => Ok(HashSet::new()),
        Value::Object(map) if !nested => Ok(map.keys().cloned().collect()),
        Value::Object(map) => {
            let mut keys = HashSet::new();
            for (element_key, inner) in map {
                let inner = inner.as_object().ok_or_else(|| {
                    format!(
                        "transformations of element {} should be an object, got {}",
                        element_key,
                        json_kind(inner)
                    )
                })?;
                keys.extend(
                    inner
                        .keys()
                        .map(|object_name| transformation_key(level, element_key, object_name)),
                );
            }
            Ok(keys)
        }
        Value::Array(items) => Ok(items
            .iter()
            .filter_map(|item| {
                let object_name = item
                    .get("objectName")
                    .or_else(|| item.get("name"))
                    .and_then(Value::as_str)?;
                if kind == ResourceKind::Definitions {
                    return Some(object_name.to_string());
                }
                let element_key = item
                    .get("elementKey")
                    .or_else(|| item.get("element").and_then(|e| e.get("key")))
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                Some(transformation_key(level, element_key, object_name))
            })
            .collect()),
        other => Err(format!("expected an object or an array, got {}", json_kind(other))),
    }
}

/// Keys of the private elements in a `GET elements` response.
fn private_element_keys(value: &Value) -> std::result::Result<HashSet<String>, String> {
    let items = value
        .as_array()
        .ok_or_else(|| format!("expected an array of elements, got {}", json_kind(value)))?;

    Ok(items
        .iter()
        .filter(|e| e.get("private").and_then(Value::as_bool) == Some(true))
        .filter_map(|e| e.get("key").and_then(Value::as_str))
        .map(str::to_string)
        .collect())
}
