// Copyright 2025 Cowboy AI, LLC.

//! Scenario loader
//!
//! Resolves a scenario name to `business/<name>.json` by walking from the
//! current working directory up through its ancestors, then parses and
//! validates the file. Every failure carries enough context to act on:
//! where the search started, which file failed to parse, or the full
//! validation issue list.

use crate::errors::ScenarioValidationError;
use crate::scenario::Scenario;
use crate::validate::validate_scenario;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while loading a scenario file.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// No `business/<name>.json` exists under the start directory or any
    /// of its ancestors
    #[error(
        "Scenario \"{name}\" not found: no business/{name}.json under {} or any ancestor directory",
        .searched_from.display()
    )]
    NotFound {
        /// The scenario name that was requested
        name: String,
        /// The directory the upward walk started from
        searched_from: PathBuf,
    },

    /// The scenario file exists but could not be read
    #[error("Failed to read scenario file {}: {source}", .path.display())]
    Io {
        /// The file that could not be read
        path: PathBuf,
        /// The underlying I/O error
        source: std::io::Error,
    },

    /// The scenario file is not valid JSON
    #[error("Failed to parse scenario file {}: {source}", .path.display())]
    Parse {
        /// The file that failed to parse
        path: PathBuf,
        /// The underlying JSON error
        source: serde_json::Error,
    },

    /// The document parsed but failed validation
    #[error(transparent)]
    Validation(#[from] ScenarioValidationError),
}

/// Load and validate `business/<name>.json`, searching upward from the
/// current working directory.
///
/// # Errors
///
/// See [`LoaderError`].
pub fn load_scenario(name: &str) -> Result<Scenario, LoaderError> {
    let cwd = std::env::current_dir().map_err(|source| LoaderError::Io {
        path: PathBuf::from("."),
        source,
    })?;
    match resolve_scenario_path(name, &cwd) {
        Some(path) => load_scenario_from_path(&path),
        None => Err(LoaderError::NotFound {
            name: name.to_string(),
            searched_from: cwd,
        }),
    }
}

/// Load and validate a scenario from an explicit file path.
///
/// # Errors
///
/// See [`LoaderError`].
pub fn load_scenario_from_path(path: &Path) -> Result<Scenario, LoaderError> {
    let raw = std::fs::read_to_string(path).map_err(|source| LoaderError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let value: serde_json::Value =
        serde_json::from_str(&raw).map_err(|source| LoaderError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(validate_scenario(&value)?)
}

/// Walk from `start` up to the filesystem root looking for
/// `business/<name>.json`.
fn resolve_scenario_path(name: &str, start: &Path) -> Option<PathBuf> {
    let mut dir = start.to_path_buf();
    loop {
        let candidate = dir.join("business").join(format!("{name}.json"));
        if candidate.is_file() {
            return Some(candidate);
        }
        if !dir.pop() {
            return None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_scenario(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let business = dir.join("business");
        fs::create_dir_all(&business).unwrap();
        let path = business.join(format!("{name}.json"));
        fs::write(&path, contents).unwrap();
        path
    }

    const VALID: &str = r#"{
        "name": "shop",
        "version": 1,
        "domains": [{
            "id": "order",
            "queue": "order-q",
            "events": [{"name": "OrderCreated", "payloadSchema": {"orderId": "string"}}]
        }]
    }"#;

    #[test]
    fn resolves_from_an_ancestor_directory() {
        let root = tempfile::tempdir().unwrap();
        let expected = write_scenario(root.path(), "shop", VALID);
        let deep = root.path().join("services").join("order");
        fs::create_dir_all(&deep).unwrap();

        let found = resolve_scenario_path("shop", &deep).unwrap();
        assert_eq!(found, expected);
    }

    #[test]
    fn nearest_ancestor_wins() {
        let root = tempfile::tempdir().unwrap();
        write_scenario(root.path(), "shop", VALID);
        let nested = root.path().join("nested");
        fs::create_dir_all(&nested).unwrap();
        let near = write_scenario(&nested, "shop", VALID);

        let found = resolve_scenario_path("shop", &nested).unwrap();
        assert_eq!(found, near);
    }

    #[test]
    fn missing_scenario_reports_search_start() {
        let root = tempfile::tempdir().unwrap();
        assert!(resolve_scenario_path("ghost", root.path()).is_none());

        let err = LoaderError::NotFound {
            name: "ghost".into(),
            searched_from: root.path().to_path_buf(),
        };
        let message = err.to_string();
        assert!(message.contains("business/ghost.json"));
        assert!(message.contains(&root.path().display().to_string()));
    }

    #[test]
    fn parse_failure_names_the_file() {
        let root = tempfile::tempdir().unwrap();
        let path = write_scenario(root.path(), "broken", "{not json");

        let err = load_scenario_from_path(&path).unwrap_err();
        match &err {
            LoaderError::Parse { path: reported, .. } => assert_eq!(reported, &path),
            other => panic!("expected parse error, got {other:?}"),
        }
        assert!(err.to_string().contains("broken.json"));
    }

    #[test]
    fn validation_failure_surfaces_the_issue_list() {
        let root = tempfile::tempdir().unwrap();
        let path = write_scenario(root.path(), "invalid", r#"{"name": "x"}"#);

        let err = load_scenario_from_path(&path).unwrap_err();
        match err {
            LoaderError::Validation(validation) => {
                assert!(!validation.issues.is_empty());
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn valid_scenario_loads() {
        let root = tempfile::tempdir().unwrap();
        let path = write_scenario(root.path(), "shop", VALID);
        let scenario = load_scenario_from_path(&path).unwrap();
        assert_eq!(scenario.name, "shop");
    }
}
