//! Common types used throughout doctor.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use zeroize::Zeroize;

/// Hierarchy level a resource lives at on the remote side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeLevel {
    Organization,
    Account,
    Instance,
}

impl ScopeLevel {
    /// Every level, in hierarchy order.
    pub const ALL: [ScopeLevel; 3] = [
        ScopeLevel::Organization,
        ScopeLevel::Account,
        ScopeLevel::Instance,
    ];

    /// Wire name of the level.
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeLevel::Organization => "organization",
            ScopeLevel::Account => "account",
            ScopeLevel::Instance => "instance",
        }
    }
}

impl fmt::Display for ScopeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScopeLevel {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "organization" => Ok(ScopeLevel::Organization),
            "account" => Ok(ScopeLevel::Account),
            "instance" => Ok(ScopeLevel::Instance),
            other => Err(crate::Error::Configuration(format!(
                "Unknown level '{}'. Use: organization, account, or instance",
                other
            ))),
        }
    }
}

/// The scope a sync targets: a level plus the identifiers that level needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeContext {
    pub level: ScopeLevel,
    pub account_id: Option<String>,
    pub instance_id: Option<String>,
}

impl ScopeContext {
    /// Organization scope; needs no identifiers.
    pub fn organization() -> Self {
        Self {
            level: ScopeLevel::Organization,
            account_id: None,
            instance_id: None,
        }
    }

    /// Account scope for the given account.
    pub fn account(account_id: impl Into<String>) -> Self {
        Self {
            level: ScopeLevel::Account,
            account_id: Some(account_id.into()),
            instance_id: None,
        }
    }

    /// Instance scope for the given instance.
    pub fn instance(instance_id: impl Into<String>) -> Self {
        Self {
            level: ScopeLevel::Instance,
            account_id: None,
            instance_id: Some(instance_id.into()),
        }
    }

    /// Check that the identifiers required by the level are present.
    ///
    /// # Errors
    /// - `Configuration` when `account` lacks an account id or `instance`
    ///   lacks an instance id.
    pub fn validate(&self) -> crate::Result<()> {
        let missing = match self.level {
            ScopeLevel::Organization => None,
            ScopeLevel::Account if is_blank(&self.account_id) => Some("an account id (-a)"),
            ScopeLevel::Instance if is_blank(&self.instance_id) => Some("an instance id (-i)"),
            _ => None,
        };

        match missing {
            Some(what) => Err(crate::Error::Configuration(format!(
                "Level '{}' requires {}",
                self.level, what
            ))),
            None => Ok(()),
        }
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

/// Credential string that zeroizes on drop.
#[derive(Clone, Default, Zeroize, Deserialize)]
#[zeroize(drop)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the secret value.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret([REDACTED])")
    }
}

fn default_timeout_secs() -> u64 {
    30
}

/// A remote deployment the CLI can talk to.
///
/// The environment is passed explicitly to the API client; nothing reads it
/// from process-wide state.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    /// Environment name as given on the command line (filled in by the loader).
    #[serde(default)]
    pub name: String,
    /// API root, e.g. `https://staging.example.com/elements/api-v2`.
    pub base_url: String,
    pub user_secret: Secret,
    pub org_secret: Secret,
    /// Client-level request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Environment {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        user_secret: Secret,
        org_secret: Secret,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            user_secret,
            org_secret,
            timeout_secs: default_timeout_secs(),
        }
    }

    /// Value of the `Authorization` header for this environment.
    pub fn authorization(&self) -> String {
        format!(
            "User {}, Organization {}",
            self.user_secret.expose(),
            self.org_secret.expose()
        )
    }
}
