//! Pull the records relevant to one sync out of an upload document.
//!
//! Groups are selected by name, records by level. Records that do not parse
//! are returned as [`Rejected`] instead of failing the extraction.

use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

use doctor_common::ScopeLevel;

use crate::model::{json_kind, ObjectDefinition, ResourceGroup, Transformation, TransformationBody, UploadDocument};

/// A record skipped because of its shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejected {
    /// Location of the record, e.g. `vdrA/transformations[2]`.
    pub id: String,
    pub reason: String,
}

/// Extraction result: usable records plus the ones that were rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted<T> {
    pub records: Vec<T>,
    pub rejected: Vec<Rejected>,
}

impl<T> Default for Extracted<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            rejected: Vec::new(),
        }
    }
}

impl<T> Extracted<T> {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.rejected.is_empty()
    }
}

/// Groups taking part in the sync.
///
/// A name filter only applies to group lists; a single group is used as is.
fn select_groups<'a>(doc: &'a UploadDocument, name: Option<&str>) -> Vec<&'a ResourceGroup> {
    match (doc, name) {
        (UploadDocument::SingleGroup(group), _) => vec![group],
        (UploadDocument::GroupList(groups), Some(name)) => groups
            .iter()
            .filter(|g| g.object_name.as_deref() == Some(name))
            .collect(),
        (UploadDocument::GroupList(groups), None) => groups.iter().collect(),
    }
}

/// Whether a raw record's `level` passes the filter. `None` keeps everything.
fn level_matches(raw: &Value, level: Option<ScopeLevel>) -> bool {
    match level {
        None => true,
        Some(level) => raw
            .get("level")
            .and_then(Value::as_str)
            .is_some_and(|l| l.eq_ignore_ascii_case(level.as_str())),
    }
}

/// Object definitions of the selected groups at `level`.
///
/// Duplicates by object name are dropped, first occurrence wins.
pub fn extract_definitions(
    doc: &UploadDocument,
    name: Option<&str>,
    level: Option<ScopeLevel>,
) -> Extracted<ObjectDefinition> {
    let mut out = Extracted::default();
    let mut seen = HashSet::new();

    for group in select_groups(doc, name) {
        for (index, raw) in group.object_definitions.iter().enumerate() {
            if !level_matches(raw, level) {
                continue;
            }
            let id = format!("{}/objectDefinitions[{}]", group.label(), index);

            match serde_json::from_value::<ObjectDefinition>(raw.clone()) {
                Ok(definition) if definition.object_name.trim().is_empty() => {
                    reject(&mut out.rejected, id, "objectName is empty".to_string());
                }
                Ok(definition) => {
                    if seen.insert(definition.object_name.clone()) {
                        out.records.push(definition);
                    } else {
                        debug!("Skipping duplicate definition {}", definition.object_name);
                    }
                }
                Err(e) => reject(&mut out.rejected, id, format!("Invalid object definition: {}", e)),
            }
        }
    }

    out
}

/// Transformations of the selected groups at `level`.
///
/// Each entry must be a map with exactly one key, the element key. Entries
/// with zero or several keys are rejected rather than resolved arbitrarily.
pub fn extract_transformations(
    doc: &UploadDocument,
    name: Option<&str>,
    level: Option<ScopeLevel>,
) -> Extracted<Transformation> {
    let mut out = Extracted::default();
    let mut seen = HashSet::new();

    for group in select_groups(doc, name) {
        for (index, raw) in group.transformations.iter().enumerate() {
            let id = format!("{}/transformations[{}]", group.label(), index);

            let (element_key, body) = match unwrap_entry(raw) {
                Ok(entry) => entry,
                Err(reason) => {
                    reject(&mut out.rejected, id, reason);
                    continue;
                }
            };
            if !level_matches(body, level) {
                continue;
            }

            match serde_json::from_value::<TransformationBody>(body.clone()) {
                Ok(body) if body.object_name.trim().is_empty() => {
                    reject(&mut out.rejected, id, "objectName is empty".to_string());
                }
                Ok(body) => {
                    let transformation = Transformation::from_body(element_key, body);
                    if seen.insert(transformation.id()) {
                        out.records.push(transformation);
                    } else {
                        debug!("Skipping duplicate transformation {}", transformation.id());
                    }
                }
                Err(e) => reject(&mut out.rejected, id, format!("Invalid transformation: {}", e)),
            }
        }
    }

    out
}

/// Split `{elementKey: body}` into its only key and value.
fn unwrap_entry(raw: &Value) -> Result<(&str, &Value), String> {
    let map = raw
        .as_object()
        .ok_or_else(|| format!("Transformation entry must be an object, got {}", json_kind(raw)))?;

    let mut entries = map.iter();
    match (entries.next(), entries.next()) {
        (Some((key, body)), None) if !key.trim().is_empty() => Ok((key.as_str(), body)),
        (Some(_), None) => Err("Transformation entry has an empty element key".to_string()),
        (None, _) => Err("Transformation entry is empty".to_string()),
        (Some(_), Some(_)) => Err(format!(
            "Transformation entry must have exactly one element key, found {}: {}",
            map.len(),
            map.keys().cloned().collect::<Vec<_>>().join(", ")
        )),
    }
}

fn reject(rejected: &mut Vec<Rejected>, id: String, reason: String) {
    warn!("Rejected {}: {}", id, reason);
    rejected.push(Rejected { id, reason });
}

/// Copy field types from object definitions onto transformations.
///
/// A transformation field takes the type of the definition field with the
/// same path on the definition with the same object name. Fields without a
/// counterpart are left alone.
///
/// # Returns
/// Number of fields whose type changed.
pub fn align_field_types(
    transformations: &mut [Transformation],
    definitions: &[ObjectDefinition],
) -> usize {
    let types: HashMap<&str, HashMap<&str, &str>> = definitions
        .iter()
        .map(|d| {
            let fields = d
                .fields
                .iter()
                .map(|f| (f.path.as_str(), f.field_type.as_str()))
                .collect();
            (d.object_name.as_str(), fields)
        })
        .collect();

    let mut changed = 0;
    for transformation in transformations.iter_mut() {
        let Some(fields) = types.get(transformation.object_name.as_str()) else {
            continue;
        };
        let id = transformation.id();
        for field in transformation.fields.iter_mut() {
            if let Some(&field_type) = fields.get(field.path.as_str()) {
                if field.field_type != field_type {
                    debug!(
                        "{}: field {} type {} -> {}",
                        id,
                        field.path,
                        field.field_type,
                        field_type
                    );
                    field.field_type = field_type.to_string();
                    changed += 1;
                }
            }
        }
    }

    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn two_groups() -> UploadDocument {
        UploadDocument::from_value(json!([
            {
                "objectName": "vdrA",
                "objectDefinitions": [
                    {"objectName": "Contact", "level": "organization", "fields": [{"path": "email", "type": "string"}]},
                    {"objectName": "Lead", "level": "account", "fields": []}
                ],
                "transformations": [
                    {"el1": {"objectName": "Contact", "level": "organization", "fields": [{"path": "email", "type": "string"}]}},
                    {"el2": {"objectName": "Lead", "level": "account", "fields": []}}
                ]
            },
            {
                "objectName": "vdrB",
                "objectDefinitions": [
                    {"objectName": "Account", "level": "organization", "fields": []},
                    {"objectName": "Contact", "level": "organization", "fields": []}
                ],
                "transformations": [
                    {"el1": {"objectName": "Account", "level": "organization", "fields": []}},
                    {"el1": {"objectName": "Contact", "level": "organization", "fields": []}}
                ]
            }
        ]))
        .unwrap()
    }

    fn names(definitions: &[ObjectDefinition]) -> Vec<&str> {
        definitions.iter().map(|d| d.object_name.as_str()).collect()
    }

    #[test]
    fn test_name_filter_selects_one_group() {
        let doc = two_groups();

        let definitions = extract_definitions(&doc, Some("vdrB"), Some(ScopeLevel::Organization));
        assert_eq!(names(&definitions.records), vec!["Account", "Contact"]);

        let transformations = extract_transformations(&doc, Some("vdrA"), Some(ScopeLevel::Organization));
        assert_eq!(transformations.records.len(), 1);
        assert_eq!(transformations.records[0].id(), "el1/Contact");
    }

    #[test]
    fn test_no_filter_unions_without_duplicates() {
        let doc = two_groups();

        let definitions = extract_definitions(&doc, None, Some(ScopeLevel::Organization));
        assert_eq!(names(&definitions.records), vec!["Contact", "Account"]);

        let transformations = extract_transformations(&doc, None, Some(ScopeLevel::Organization));
        let ids: Vec<String> = transformations.records.iter().map(|t| t.id()).collect();
        assert_eq!(ids, vec!["el1/Contact", "el1/Account"]);
    }

    #[test]
    fn test_level_filter() {
        let doc = two_groups();

        let definitions = extract_definitions(&doc, None, Some(ScopeLevel::Account));
        assert_eq!(names(&definitions.records), vec!["Lead"]);

        let transformations = extract_transformations(&doc, None, Some(ScopeLevel::Instance));
        assert!(transformations.is_empty());

        // Unscoped extraction ignores the level annotation.
        let all = extract_definitions(&doc, None, None);
        assert_eq!(names(&all.records), vec!["Contact", "Lead", "Account"]);
    }

    #[test]
    fn test_single_group_ignores_name() {
        let doc = UploadDocument::from_value(json!({
            "objectName": "vdrA",
            "objectDefinitions": [{"objectName": "Contact", "level": "instance", "fields": []}]
        }))
        .unwrap();

        let definitions = extract_definitions(&doc, Some("somethingElse"), Some(ScopeLevel::Instance));
        assert_eq!(names(&definitions.records), vec!["Contact"]);
    }

    #[test]
    fn test_unknown_name_yields_nothing() {
        let doc = two_groups();
        assert!(extract_definitions(&doc, Some("vdrZ"), Some(ScopeLevel::Organization)).is_empty());
        assert!(extract_transformations(&doc, Some("vdrZ"), None).is_empty());
    }

    #[test]
    fn test_level_annotation_read_leniently() {
        let doc = UploadDocument::from_value(json!({
            "objectName": "vdrA",
            "objectDefinitions": [
                {"objectName": "Contact", "level": "global", "fields": []},
                {"objectName": "Lead", "level": "Organization", "fields": []}
            ],
            "transformations": [
                {"el1": {"objectName": "Contact", "level": "Organization", "fields": []}},
                {"el2": {"objectName": "Lead", "level": 7, "fields": []}}
            ]
        }))
        .unwrap();

        // Unscoped: every record, whatever its annotation.
        let definitions = extract_definitions(&doc, None, None);
        assert_eq!(names(&definitions.records), vec!["Contact", "Lead"]);
        assert!(definitions.rejected.is_empty());
        assert_eq!(definitions.records[0].level, None);
        assert_eq!(definitions.records[1].level, Some(ScopeLevel::Organization));

        let transformations = extract_transformations(&doc, None, None);
        assert_eq!(transformations.records.len(), 2);
        assert!(transformations.rejected.is_empty());

        // Scoped: capitalised level matches, unknown ones are filtered out.
        let definitions = extract_definitions(&doc, None, Some(ScopeLevel::Organization));
        assert_eq!(names(&definitions.records), vec!["Lead"]);
        assert!(definitions.rejected.is_empty());

        let transformations = extract_transformations(&doc, None, Some(ScopeLevel::Organization));
        assert_eq!(transformations.records.len(), 1);
        assert_eq!(transformations.records[0].id(), "el1/Contact");
        assert!(transformations.rejected.is_empty());
    }

    #[test]
    fn test_two_key_entry_rejected() {
        let doc = UploadDocument::from_value(json!({
            "objectName": "vdrA",
            "transformations": [
                {
                    "el1": {"objectName": "Contact", "level": "organization", "fields": []},
                    "el2": {"objectName": "Contact", "level": "organization", "fields": []}
                },
                {"el3": {"objectName": "Contact", "level": "organization", "fields": []}}
            ]
        }))
        .unwrap();

        let extracted = extract_transformations(&doc, None, Some(ScopeLevel::Organization));
        assert_eq!(extracted.records.len(), 1);
        assert_eq!(extracted.records[0].element_key, "el3");
        assert_eq!(extracted.rejected.len(), 1);
        assert_eq!(extracted.rejected[0].id, "vdrA/transformations[0]");
        assert!(extracted.rejected[0].reason.contains("exactly one element key"));
    }

    #[test]
    fn test_malformed_records_rejected() {
        let doc = UploadDocument::from_value(json!({
            "objectName": "vdrA",
            "objectDefinitions": [
                {"level": "organization", "fields": []},
                {"objectName": "Contact", "level": "organization", "fields": [{"path": "email"}]},
                {"objectName": "Account", "level": "organization"}
            ],
            "transformations": [{}, "el1", {"el1": {"level": "organization"}}]
        }))
        .unwrap();

        let definitions = extract_definitions(&doc, None, Some(ScopeLevel::Organization));
        assert_eq!(names(&definitions.records), vec!["Account"]);
        assert_eq!(definitions.rejected.len(), 2);

        let transformations = extract_transformations(&doc, None, Some(ScopeLevel::Organization));
        assert!(transformations.records.is_empty());
        assert_eq!(transformations.rejected.len(), 3);
    }

    #[test]
    fn test_align_field_types() {
        let doc = UploadDocument::from_value(json!({
            "objectName": "vdrA",
            "objectDefinitions": [
                {"objectName": "Contact", "level": "organization", "fields": [
                    {"path": "email", "type": "string"},
                    {"path": "age", "type": "number"}
                ]}
            ],
            "transformations": [
                {"el1": {"objectName": "Contact", "level": "organization", "fields": [
                    {"path": "email", "type": "string", "vendorPath": "Email"},
                    {"path": "age", "type": "string", "vendorPath": "Age"},
                    {"path": "nickname", "type": "string", "vendorPath": "Nick"}
                ]}},
                {"el1": {"objectName": "Lead", "level": "organization", "fields": [
                    {"path": "age", "type": "string"}
                ]}}
            ]
        }))
        .unwrap();

        let definitions = extract_definitions(&doc, None, None);
        let mut transformations = extract_transformations(&doc, None, None);

        let changed = align_field_types(&mut transformations.records, &definitions.records);
        assert_eq!(changed, 1);

        let contact = &transformations.records[0];
        assert_eq!(contact.fields[1].field_type, "number");
        assert_eq!(contact.fields[1].extra.get("vendorPath"), Some(&json!("Age")));
        assert_eq!(contact.fields[2].field_type, "string");

        // No definition for Lead, untouched.
        assert_eq!(transformations.records[1].fields[0].field_type, "string");
    }
}
