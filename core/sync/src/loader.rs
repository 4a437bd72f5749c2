//! Reading upload documents from a file or a directory.

use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

use doctor_common::{Error, Result};

/// Where the upload document comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    /// One JSON file holding a group or a list of groups.
    File(PathBuf),
    /// A directory of JSON files, assembled into a list of groups.
    Directory(PathBuf),
}

impl InputSource {
    /// Pick the source from the `-f` / `-d` options.
    ///
    /// When both are given the file wins.
    ///
    /// # Errors
    /// - `Configuration` if neither is given
    pub fn select(file: Option<&Path>, dir: Option<&Path>) -> Result<Self> {
        match (file, dir) {
            (Some(file), Some(dir)) => {
                warn!(
                    "Both a file ({}) and a directory ({}) were given; using the file",
                    file.display(),
                    dir.display()
                );
                Ok(InputSource::File(file.to_path_buf()))
            }
            (Some(file), None) => Ok(InputSource::File(file.to_path_buf())),
            (None, Some(dir)) => Ok(InputSource::Directory(dir.to_path_buf())),
            (None, None) => Err(Error::Configuration(
                "Please specify a file with -f or a directory with -d".to_string(),
            )),
        }
    }

    /// Load the raw JSON document.
    pub async fn load(&self) -> Result<Value> {
        match self {
            InputSource::File(path) => read_file(path).await,
            InputSource::Directory(path) => build_from_directory(path).await,
        }
    }
}

/// Parse one JSON file.
pub async fn read_file(path: &Path) -> Result<Value> {
    let bytes = fs::read(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::Configuration(format!("File not found: {}", path.display()))
        } else {
            Error::Io(e)
        }
    })?;

    serde_json::from_slice(&bytes)
        .map_err(|e| Error::Serialization(format!("{}: {}", path.display(), e)))
}

/// Assemble a list of groups from the `*.json` files in `dir` and in its
/// immediate subdirectories (one subdirectory per named resource).
///
/// Files are read in sorted path order. A file holding an array contributes
/// each element; a file holding an object contributes itself.
pub async fn build_from_directory(dir: &Path) -> Result<Value> {
    let metadata = fs::metadata(dir)
        .await
        .map_err(|_| Error::Configuration(format!("Directory not found: {}", dir.display())))?;
    if !metadata.is_dir() {
        return Err(Error::Configuration(format!("Not a directory: {}", dir.display())));
    }

    let mut files = Vec::new();
    for entry in sorted_entries(dir).await? {
        if fs::metadata(&entry).await?.is_dir() {
            files.extend(
                sorted_entries(&entry)
                    .await?
                    .into_iter()
                    .filter(|p| is_json(p)),
            );
        } else if is_json(&entry) {
            files.push(entry);
        }
    }

    let mut groups = Vec::new();
    for file in files {
        debug!("Loading {}", file.display());
        match read_file(&file).await? {
            Value::Array(items) => groups.extend(items),
            value => groups.push(value),
        }
    }

    Ok(Value::Array(groups))
}

async fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir).await?;
    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        paths.push(entry.path());
    }
    paths.sort();
    Ok(paths)
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_select_file_wins() {
        let source = InputSource::select(Some(Path::new("a.json")), Some(Path::new("dir"))).unwrap();
        assert_eq!(source, InputSource::File(PathBuf::from("a.json")));

        let source = InputSource::select(None, Some(Path::new("dir"))).unwrap();
        assert_eq!(source, InputSource::Directory(PathBuf::from("dir")));

        assert!(matches!(
            InputSource::select(None, None),
            Err(Error::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_read_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("vdrs.json");
        std::fs::write(&path, r#"[{"objectName": "vdrA"}]"#).unwrap();

        let value = read_file(&path).await.unwrap();
        assert_eq!(value, json!([{"objectName": "vdrA"}]));
    }

    #[tokio::test]
    async fn test_read_file_errors() {
        let temp = TempDir::new().unwrap();

        let missing = read_file(&temp.path().join("missing.json")).await;
        assert!(matches!(missing, Err(Error::Configuration(_))));

        let broken = temp.path().join("broken.json");
        std::fs::write(&broken, "{not json").unwrap();
        assert!(matches!(read_file(&broken).await, Err(Error::Serialization(_))));
    }

    #[tokio::test]
    async fn test_build_from_directory() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("b.json"), r#"{"objectName": "vdrB"}"#).unwrap();
        std::fs::write(
            temp.path().join("a.json"),
            r#"[{"objectName": "vdrA1"}, {"objectName": "vdrA2"}]"#,
        )
        .unwrap();
        std::fs::write(temp.path().join("notes.txt"), "ignored").unwrap();
        std::fs::create_dir(temp.path().join("c")).unwrap();
        std::fs::write(temp.path().join("c").join("c.json"), r#"{"objectName": "vdrC"}"#).unwrap();

        let value = build_from_directory(temp.path()).await.unwrap();
        let names: Vec<&str> = value
            .as_array()
            .unwrap()
            .iter()
            .map(|g| g["objectName"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["vdrA1", "vdrA2", "vdrB", "vdrC"]);
    }

    #[tokio::test]
    async fn test_build_from_missing_directory() {
        let temp = TempDir::new().unwrap();
        let result = build_from_directory(&temp.path().join("nope")).await;
        assert!(matches!(result, Err(Error::Configuration(_))));
    }
}
