//! Remote collection paths by resource kind, scope level and operation.

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

use doctor_common::{ScopeContext, ScopeLevel};

/// Characters escaped inside a single path segment.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Which collection a path addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Definitions,
    Transformations,
}

/// What the caller intends to do at the path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Fetch the existing collection for the scope.
    Retrieve,
    Create,
    Update,
}

impl Operation {
    pub const ALL: [Operation; 3] = [Operation::Retrieve, Operation::Create, Operation::Update];
}

/// Identifiers substituted into path templates.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathParams<'a> {
    pub account_id: Option<&'a str>,
    pub instance_id: Option<&'a str>,
    pub object_name: Option<&'a str>,
    pub element_key: Option<&'a str>,
}

impl<'a> PathParams<'a> {
    /// Parameters carrying the scope's identifiers.
    pub fn for_scope(scope: &'a ScopeContext) -> Self {
        Self {
            account_id: scope.account_id.as_deref(),
            instance_id: scope.instance_id.as_deref(),
            ..Self::default()
        }
    }

    pub fn object(mut self, object_name: &'a str) -> Self {
        self.object_name = Some(object_name);
        self
    }

    pub fn element(mut self, element_key: &'a str) -> Self {
        self.element_key = Some(element_key);
        self
    }
}

/// Non-empty, escaped path segment.
fn segment(value: Option<&str>) -> Option<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .map(|v| utf8_percent_encode(v, SEGMENT).to_string())
}

/// Resolve the remote path for `(kind, level, op)`.
///
/// Every combination has exactly one arm below and the match has no
/// wildcard, so adding a level or operation fails to compile until it is
/// mapped.
///
/// # Returns
/// `None` when an identifier the template needs is missing from `params`.
/// Callers must treat that as a configuration error for the record and make
/// no network call.
pub fn resolve_path(
    kind: ResourceKind,
    level: ScopeLevel,
    op: Operation,
    params: &PathParams<'_>,
) -> Option<String> {
    use Operation::{Create, Retrieve, Update};
    use ResourceKind::{Definitions, Transformations};
    use ScopeLevel::{Account, Instance, Organization};

    let account = || segment(params.account_id);
    let instance = || segment(params.instance_id);
    let object = || segment(params.object_name);
    let element = || segment(params.element_key);

    match (kind, level, op) {
        (Definitions, Organization, Retrieve) => Some("organizations/objects/definitions".to_string()),
        (Definitions, Organization, Create | Update) => {
            Some(format!("organizations/objects/{}/definitions", object()?))
        }
        (Definitions, Account, Retrieve) => Some(format!("accounts/{}/objects/definitions", account()?)),
        (Definitions, Account, Create | Update) => Some(format!(
            "accounts/{}/objects/{}/definitions",
            account()?,
            object()?
        )),
        (Definitions, Instance, Retrieve) => {
            Some(format!("instances/{}/objects/definitions", instance()?))
        }
        (Definitions, Instance, Create | Update) => Some(format!(
            "instances/{}/objects/{}/definitions",
            instance()?,
            object()?
        )),
        (Transformations, Organization, Retrieve) => Some("organizations/transformations".to_string()),
        (Transformations, Organization, Create | Update) => Some(format!(
            "organizations/elements/{}/transformations/{}",
            element()?,
            object()?
        )),
        (Transformations, Account, Retrieve) => Some(format!("accounts/{}/transformations", account()?)),
        (Transformations, Account, Create | Update) => Some(format!(
            "accounts/{}/elements/{}/transformations/{}",
            account()?,
            element()?,
            object()?
        )),
        (Transformations, Instance, Retrieve) => {
            Some(format!("instances/{}/transformations", instance()?))
        }
        (Transformations, Instance, Create | Update) => Some(format!(
            "instances/{}/transformations/{}",
            instance()?,
            object()?
        )),
    }
}

/// Collection of private elements.
pub const ELEMENTS_PATH: &str = "elements";

/// Path of a single element, addressed by key.
pub fn element_path(key: &str) -> Option<String> {
    segment(Some(key)).map(|key| format!("{}/{}", ELEMENTS_PATH, key))
}
