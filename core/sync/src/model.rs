//! Resource records and the upload document envelope.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use doctor_common::{Error, Result, ScopeLevel};

/// Read a record's `level` annotation.
///
/// Case does not matter. Anything that is not a known level reads as no
/// annotation, so an unscoped sync still takes the record.
fn lenient_level<'de, D>(deserializer: D) -> std::result::Result<Option<ScopeLevel>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    let level = raw.as_ref().and_then(Value::as_str).and_then(|s| s.parse().ok());
    if level.is_none() {
        if let Some(raw) = raw.filter(|v| !v.is_null()) {
            debug!("Ignoring unknown level {}", raw);
        }
    }
    Ok(level)
}

/// A single field of an object definition or transformation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub path: String,
    #[serde(rename = "type")]
    pub field_type: String,
    /// Keys this tool does not interpret (`vendorPath`, `mask`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Field {
    pub fn new(path: impl Into<String>, field_type: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            field_type: field_type.into(),
            extra: Map::new(),
        }
    }
}

/// Schema of a custom object. Identified by `object_name` within a scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectDefinition {
    pub object_name: String,
    #[serde(
        default,
        deserialize_with = "lenient_level",
        skip_serializing_if = "Option::is_none"
    )]
    pub level: Option<ScopeLevel>,
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ObjectDefinition {
    /// Identity key within a scope.
    pub fn key(&self) -> &str {
        &self.object_name
    }

    /// Request body sent to the remote. The level is expressed by the path,
    /// so it is left out.
    pub fn payload(&self) -> Result<Value> {
        let mut body = to_object(self)?;
        body.remove("level");
        Ok(Value::Object(body))
    }
}

/// Transformation body as it appears under its element key in an upload
/// document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformationBody {
    pub object_name: String,
    #[serde(
        default,
        deserialize_with = "lenient_level",
        skip_serializing_if = "Option::is_none"
    )]
    pub level: Option<ScopeLevel>,
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Mapping from an element's fields onto an object definition.
/// Identified by `(element_key, object_name)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Transformation {
    pub element_key: String,
    pub object_name: String,
    pub level: Option<ScopeLevel>,
    pub fields: Vec<Field>,
    pub extra: Map<String, Value>,
}

impl Transformation {
    pub fn from_body(element_key: impl Into<String>, body: TransformationBody) -> Self {
        Self {
            element_key: element_key.into(),
            object_name: body.object_name,
            level: body.level,
            fields: body.fields,
            extra: body.extra,
        }
    }

    /// `elementKey/objectName`, used in reports and for de-duplication.
    pub fn id(&self) -> String {
        format!("{}/{}", self.element_key, self.object_name)
    }

    pub fn body(&self) -> TransformationBody {
        TransformationBody {
            object_name: self.object_name.clone(),
            level: self.level,
            fields: self.fields.clone(),
            extra: self.extra.clone(),
        }
    }

    /// Request body sent to the remote, without the local level annotation.
    pub fn payload(&self) -> Result<Value> {
        let mut body = to_object(&self.body())?;
        body.remove("level");
        Ok(Value::Object(body))
    }
}

/// One VDR: an object's definitions and transformations bundled together.
///
/// Records are kept as raw JSON so that one malformed record can be rejected
/// on its own during extraction instead of failing the whole document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceGroup {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Value>,
    #[serde(default)]
    pub object_definitions: Vec<Value>,
    /// Single-key maps `{elementKey: body}`.
    #[serde(default)]
    pub transformations: Vec<Value>,
}

impl ResourceGroup {
    /// Group name for log messages and report ids.
    pub fn label(&self) -> &str {
        self.object_name.as_deref().unwrap_or("<unnamed>")
    }
}

/// Parsed upload input: a single group or a list of groups.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadDocument {
    SingleGroup(ResourceGroup),
    GroupList(Vec<ResourceGroup>),
}

impl UploadDocument {
    /// Decide the document shape once.
    ///
    /// # Errors
    /// - `Validation` if the value is neither an object nor an array of objects
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| parse_group(item).map_err(|e| at_index(e, i)))
                .collect::<Result<Vec<_>>>()
                .map(UploadDocument::GroupList),
            value @ Value::Object(_) => parse_group(value).map(UploadDocument::SingleGroup),
            other => Err(Error::Validation(format!(
                "Upload document must be an object or a list of objects, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// All groups, regardless of shape.
    pub fn groups(&self) -> &[ResourceGroup] {
        match self {
            UploadDocument::SingleGroup(group) => std::slice::from_ref(group),
            UploadDocument::GroupList(groups) => groups,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.groups().iter().all(|g| {
            g.object_definitions.is_empty() && g.transformations.is_empty()
        })
    }
}

fn parse_group(value: Value) -> Result<ResourceGroup> {
    if !value.is_object() {
        return Err(Error::Validation(format!(
            "Resource group must be an object, got {}",
            json_kind(&value)
        )));
    }
    serde_json::from_value(value)
        .map_err(|e| Error::Validation(format!("Invalid resource group: {}", e)))
}

fn at_index(err: Error, index: usize) -> Error {
    match err {
        Error::Validation(message) => Error::Validation(format!("[{}] {}", index, message)),
        other => other,
    }
}

fn to_object<T: Serialize>(record: &T) -> Result<Map<String, Value>> {
    match serde_json::to_value(record) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(Error::Serialization("Record did not serialize to an object".to_string())),
        Err(e) => Err(Error::Serialization(e.to_string())),
    }
}

/// Short name of a JSON value's type, for error messages.
pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_document_shapes() {
        let single = UploadDocument::from_value(json!({
            "objectName": "vdrA",
            "objectDefinitions": [],
            "transformations": []
        }))
        .unwrap();
        assert!(matches!(single, UploadDocument::SingleGroup(_)));

        let list = UploadDocument::from_value(json!([
            {"objectName": "vdrA"},
            {"objectName": "vdrB"}
        ]))
        .unwrap();
        assert_eq!(list.groups().len(), 2);
        assert!(list.is_empty());
    }

    #[test]
    fn test_document_rejects_scalars() {
        assert!(matches!(
            UploadDocument::from_value(json!("nope")),
            Err(Error::Validation(_))
        ));

        match UploadDocument::from_value(json!([{"objectName": "a"}, 3])) {
            Err(Error::Validation(message)) => assert!(message.starts_with("[1]")),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_definition_keeps_unknown_keys() {
        let def: ObjectDefinition = serde_json::from_value(json!({
            "objectName": "Contact",
            "level": "organization",
            "fields": [{"path": "email", "type": "string", "mask": "x"}],
            "description": "people"
        }))
        .unwrap();

        assert_eq!(def.level, Some(ScopeLevel::Organization));
        assert_eq!(def.fields[0].extra.get("mask"), Some(&json!("x")));

        let payload = def.payload().unwrap();
        assert_eq!(payload["description"], json!("people"));
        assert!(payload.get("level").is_none());
        assert_eq!(payload["fields"][0]["type"], json!("string"));
    }

    #[test]
    fn test_transformation_payload() {
        let body: TransformationBody = serde_json::from_value(json!({
            "objectName": "Contact",
            "level": "account",
            "fields": [{"path": "email", "type": "string", "vendorPath": "Email"}]
        }))
        .unwrap();
        let transformation = Transformation::from_body("sfdc", body);

        assert_eq!(transformation.id(), "sfdc/Contact");
        let payload = transformation.payload().unwrap();
        assert_eq!(payload["objectName"], json!("Contact"));
        assert_eq!(payload["fields"][0]["vendorPath"], json!("Email"));
        assert!(payload.get("level").is_none());
        assert!(payload.get("elementKey").is_none());
    }
}
