//! CLI configuration file.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use doctor_common::{Environment, Error, Result};

/// Contents of `config.json`.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Named remote deployments.
    #[serde(default)]
    pub environments: BTreeMap<String, Environment>,
}

impl Config {
    /// `<config dir>/doctor/config.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("doctor").join("config.json"))
    }

    /// Load from `path`, or from the default location when `None`.
    ///
    /// # Errors
    /// - `Configuration` if there is no such file or no default location
    /// - `Serialization` if the file is not valid configuration JSON
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::default_path().ok_or_else(|| {
                Error::Configuration("Could not determine the configuration directory".to_string())
            })?,
        };

        let content = std::fs::read_to_string(&path).map_err(|e| {
            Error::Configuration(format!("Cannot read config {}: {}", path.display(), e))
        })?;

        let mut config: Config = serde_json::from_str(&content)
            .map_err(|e| Error::Serialization(format!("{}: {}", path.display(), e)))?;
        for (name, environment) in config.environments.iter_mut() {
            environment.name = name.clone();
        }
        Ok(config)
    }

    /// Look up an environment by name.
    pub fn environment(&self, name: &str) -> Result<&Environment> {
        self.environments.get(name).ok_or_else(|| {
            let known: Vec<&str> = self.environments.keys().map(String::as_str).collect();
            Error::Configuration(format!(
                "Unknown environment '{}'. Known environments: {}",
                name,
                if known.is_empty() {
                    "none".to_string()
                } else {
                    known.join(", ")
                }
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("config.json");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_environments() {
        let temp = TempDir::new().unwrap();
        let path = write_config(
            &temp,
            r#"{"environments": {
                "staging": {"baseUrl": "https://staging.example.com/api", "userSecret": "u", "orgSecret": "o"},
                "prod": {"baseUrl": "https://example.com/api", "userSecret": "u2", "orgSecret": "o2", "timeoutSecs": 5}
            }}"#,
        );

        let config = Config::load(Some(&path)).unwrap();
        let staging = config.environment("staging").unwrap();
        assert_eq!(staging.name, "staging");
        assert_eq!(staging.timeout_secs, 30);
        assert_eq!(staging.authorization(), "User u, Organization o");
        assert_eq!(config.environment("prod").unwrap().timeout_secs, 5);
    }

    #[test]
    fn test_unknown_environment_lists_known() {
        let temp = TempDir::new().unwrap();
        let path = write_config(
            &temp,
            r#"{"environments": {"staging": {"baseUrl": "x", "userSecret": "u", "orgSecret": "o"}}}"#,
        );

        let config = Config::load(Some(&path)).unwrap();
        match config.environment("prod") {
            Err(Error::Configuration(message)) => assert!(message.contains("staging")),
            other => panic!("expected configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_load_errors() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            Config::load(Some(&temp.path().join("missing.json"))),
            Err(Error::Configuration(_))
        ));

        let path = write_config(&temp, "{broken");
        assert!(matches!(Config::load(Some(&path)), Err(Error::Serialization(_))));
    }
}
