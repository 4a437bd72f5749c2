//! Exporting remote resources to a local JSON file.
//!
//! The exported VDR document has the same shape uploads accept, so an export
//! can be edited and pushed back.

use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info};

use doctor_api::RemoteApi;
use doctor_common::{Error, Result, ScopeContext, ScopeLevel};

use crate::model::{json_kind, ResourceGroup};
use crate::paths::{resolve_path, Operation, PathParams, ResourceKind, ELEMENTS_PATH};

/// What an export writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportObject {
    Vdrs,
    /// Same content as `Vdrs`: organization resources are the common ones.
    CommonResources,
    Elements,
    /// `{"vdrs": [...], "elements": [...]}`
    All,
}

impl ExportObject {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportObject::Vdrs => "vdrs",
            ExportObject::CommonResources => "commonResources",
            ExportObject::Elements => "elements",
            ExportObject::All => "all",
        }
    }
}

/// Reads organization-level resources back from the remote API.
pub struct Exporter<A: RemoteApi + ?Sized> {
    api: Arc<A>,
}

impl<A: RemoteApi + ?Sized> Exporter<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self { api }
    }

    /// Build the export and write it to `file` as pretty-printed JSON.
    ///
    /// # Returns
    /// The exported document.
    pub async fn export(&self, object: ExportObject, file: &Path) -> Result<Value> {
        let document = self.build(object).await?;
        write_json(file, &document).await?;
        info!("Exported {} to {}", object.as_str(), file.display());
        Ok(document)
    }

    /// Build the export without writing it.
    pub async fn build(&self, object: ExportObject) -> Result<Value> {
        match object {
            ExportObject::Vdrs | ExportObject::CommonResources => self.vdrs().await,
            ExportObject::Elements => self.elements().await,
            ExportObject::All => Ok(json!({
                "vdrs": self.vdrs().await?,
                "elements": self.elements().await?,
            })),
        }
    }

    /// Organization definitions and transformations grouped per object name,
    /// in name order.
    pub async fn vdrs(&self) -> Result<Value> {
        let scope = ScopeContext::organization();
        let params = PathParams::for_scope(&scope);
        let mut groups: BTreeMap<String, ResourceGroup> = BTreeMap::new();

        let path = retrieve_path(ResourceKind::Definitions, &params)?;
        match self.get_or_empty(&path).await? {
            Value::Null => {}
            Value::Object(map) => {
                for (name, definition) in map {
                    let record = annotate(definition, &name)?;
                    group_for(&mut groups, &name).object_definitions.push(record);
                }
            }
            Value::Array(items) => {
                for definition in items {
                    let Some(name) = object_name_of(&definition) else {
                        debug!("Skipping definition without objectName");
                        continue;
                    };
                    let record = annotate(definition, &name)?;
                    group_for(&mut groups, &name).object_definitions.push(record);
                }
            }
            other => return Err(unexpected(&path, &other)),
        }

        let path = retrieve_path(ResourceKind::Transformations, &params)?;
        match self.get_or_empty(&path).await? {
            Value::Null => {}
            Value::Object(map) => {
                for (element_key, by_object) in map {
                    let by_object = match by_object {
                        Value::Object(by_object) => by_object,
                        other => return Err(unexpected(&path, &other)),
                    };
                    for (name, body) in by_object {
                        let mut entry = Map::new();
                        entry.insert(element_key.clone(), annotate(body, &name)?);
                        group_for(&mut groups, &name)
                            .transformations
                            .push(Value::Object(entry));
                    }
                }
            }
            Value::Array(items) => {
                for mut body in items {
                    let (Some(element_key), Some(name)) = (element_key_of(&body), object_name_of(&body)) else {
                        debug!("Skipping transformation without elementKey or objectName");
                        continue;
                    };
                    if let Some(map) = body.as_object_mut() {
                        map.remove("elementKey");
                        map.remove("element");
                    }
                    let mut entry = Map::new();
                    entry.insert(element_key, annotate(body, &name)?);
                    group_for(&mut groups, &name)
                        .transformations
                        .push(Value::Object(entry));
                }
            }
            other => return Err(unexpected(&path, &other)),
        }

        info!("Exporting {} VDRs", groups.len());
        serde_json::to_value(groups.into_values().collect::<Vec<_>>())
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Private elements only.
    pub async fn elements(&self) -> Result<Value> {
        let elements = match self.get_or_empty(ELEMENTS_PATH).await? {
            Value::Null => Vec::new(),
            Value::Array(items) => items
                .into_iter()
                .filter(|e| e.get("private").and_then(Value::as_bool) == Some(true))
                .collect(),
            other => return Err(unexpected(ELEMENTS_PATH, &other)),
        };

        info!("Exporting {} private elements", elements.len());
        Ok(Value::Array(elements))
    }

    /// GET that treats a missing collection as empty.
    async fn get_or_empty(&self, path: &str) -> Result<Value> {
        match self.api.get(path).await {
            Err(Error::NotFound(_)) => {
                debug!("{} not found, exporting nothing from it", path);
                Ok(Value::Null)
            }
            other => other,
        }
    }
}

fn retrieve_path(kind: ResourceKind, params: &PathParams<'_>) -> Result<String> {
    resolve_path(kind, ScopeLevel::Organization, Operation::Retrieve, params)
        .ok_or_else(|| Error::Configuration(format!("No retrieve path for {:?}", kind)))
}

fn object_name_of(record: &Value) -> Option<String> {
    record
        .get("objectName")
        .or_else(|| record.get("name"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn element_key_of(record: &Value) -> Option<String> {
    record
        .get("elementKey")
        .or_else(|| record.get("element").and_then(|e| e.get("key")))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn group_for<'a>(groups: &'a mut BTreeMap<String, ResourceGroup>, name: &str) -> &'a mut ResourceGroup {
    groups.entry(name.to_string()).or_insert_with(|| ResourceGroup {
        object_name: Some(name.to_string()),
        ..ResourceGroup::default()
    })
}

/// Stamp a remote record with its object name and organization level.
fn annotate(record: Value, object_name: &str) -> Result<Value> {
    let mut map: Map<String, Value> = match record {
        Value::Object(map) => map,
        other => {
            return Err(Error::Validation(format!(
                "Record {} should be an object, got {}",
                object_name,
                json_kind(&other)
            )))
        }
    };
    map.insert("objectName".to_string(), json!(object_name));
    map.insert("level".to_string(), json!(ScopeLevel::Organization));
    Ok(Value::Object(map))
}

fn unexpected(path: &str, value: &Value) -> Error {
    Error::Validation(format!("Unexpected response from {}: {}", path, json_kind(value)))
}

/// Write `value` as pretty JSON, creating parent directories.
pub async fn write_json(file: &Path, value: &Value) -> Result<()> {
    if let Some(parent) = file.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    let bytes = serde_json::to_vec_pretty(value).map_err(|e| Error::Serialization(e.to_string()))?;
    fs::write(file, bytes).await?;
    Ok(())
}
