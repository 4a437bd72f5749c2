//! Selecting one version per resource group.

use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

use crate::model::{ResourceGroup, UploadDocument};

/// Textual form of a version value, which may be a JSON number or string.
fn version_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Finite numeric value of a version, if it has one.
fn numeric(version: &str) -> Option<f64> {
    version.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Order versions numerically when both are finite numbers, otherwise by text.
fn compare_versions(a: &str, b: &str) -> Ordering {
    match (numeric(a), numeric(b)) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        _ => a.cmp(b),
    }
}

fn versions_equal(a: &str, b: &str) -> bool {
    a == b || (numeric(a).is_some() && numeric(b).is_some() && compare_versions(a, b) == Ordering::Equal)
}

/// Collapse groups that share an object name down to a single version.
///
/// The group whose version equals `requested` wins; without a request, or
/// when the request matches nothing for that name, the highest version wins.
/// Groups without a name or version are kept untouched, and the surviving
/// groups keep the position of the first group with their name.
pub fn apply_version(doc: UploadDocument, requested: Option<&str>) -> UploadDocument {
    let groups = match doc {
        UploadDocument::SingleGroup(group) => {
            if let (Some(requested), Some(version)) = (requested, group.version.as_ref().and_then(version_text)) {
                if !versions_equal(requested, &version) {
                    warn!(
                        "{} has version {}, not the requested {}; uploading it anyway",
                        group.label(),
                        version,
                        requested
                    );
                }
            }
            return UploadDocument::SingleGroup(group);
        }
        UploadDocument::GroupList(groups) => groups,
    };

    // Index of the chosen group per versioned name.
    let mut chosen: HashMap<&str, usize> = HashMap::new();
    for (index, group) in groups.iter().enumerate() {
        let (Some(name), Some(version)) = (
            versioned_name(group),
            group.version.as_ref().and_then(version_text),
        ) else {
            continue;
        };

        match chosen.get(name).copied() {
            None => {
                chosen.insert(name, index);
            }
            Some(current) => {
                if prefer(&version, &groups[current], requested) {
                    chosen.insert(name, index);
                }
            }
        }
    }

    if let Some(requested) = requested {
        for (name, &index) in &chosen {
            let matched = groups[index]
                .version
                .as_ref()
                .and_then(version_text)
                .is_some_and(|v| versions_equal(requested, &v));
            if !matched {
                warn!(
                    "Version {} of {} not found; using the latest instead",
                    requested, name
                );
            }
        }
    }

    // Each versioned name is emitted once, at the position of its first group.
    let mut emitted = HashSet::new();
    let mut kept = Vec::with_capacity(groups.len());
    for group in &groups {
        match versioned_name(group) {
            None => kept.push(group.clone()),
            Some(name) => {
                if emitted.insert(name) {
                    kept.push(groups[chosen[name]].clone());
                } else {
                    debug!("Collapsing duplicate versions of {}", name);
                }
            }
        }
    }

    UploadDocument::GroupList(kept)
}

/// Object name of a group that carries both a name and a version.
fn versioned_name(group: &ResourceGroup) -> Option<&str> {
    group
        .object_name
        .as_deref()
        .filter(|_| group.version.as_ref().and_then(version_text).is_some())
}

/// Whether a group with `candidate` version beats `current`.
fn prefer(candidate: &str, current: &ResourceGroup, requested: Option<&str>) -> bool {
    let Some(current_version) = current.version.as_ref().and_then(version_text) else {
        return true;
    };

    if let Some(requested) = requested {
        let candidate_matches = versions_equal(requested, candidate);
        let current_matches = versions_equal(requested, &current_version);
        if candidate_matches != current_matches {
            return candidate_matches;
        }
    }

    compare_versions(candidate, &current_version) == Ordering::Greater
}
