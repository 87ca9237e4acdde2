// Copyright 2025 Cowboy AI, LLC.

//! Error types for scenario compilation
//!
//! Validation is total: the validator walks the whole scenario document and
//! collects every issue before failing, so authoring tools can surface all
//! errors at once instead of fixing them one by one.

use schemars::JsonSchema;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// One segment of a path into the scenario JSON document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(untagged)]
pub enum PathSegment {
    /// An object key
    Key(String),
    /// An array index
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(key) => write!(f, "{key}"),
            PathSegment::Index(idx) => write!(f, "{idx}"),
        }
    }
}

/// A JSON-pointer-style path locating an issue inside a scenario document.
///
/// Paths are built incrementally while the validator descends; cloning is
/// cheap enough for the depth a scenario document can reach.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, JsonSchema)]
#[serde(transparent)]
pub struct IssuePath(Vec<PathSegment>);

impl IssuePath {
    /// The document root.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Extend the path with an object key.
    pub fn key(&self, key: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Key(key.into()));
        Self(segments)
    }

    /// Extend the path with an array index.
    pub fn index(&self, idx: usize) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Index(idx));
        Self(segments)
    }

    /// The path segments, outermost first.
    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }
}

impl fmt::Display for IssuePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "/");
        }
        for segment in &self.0 {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

/// A single structured problem found while validating a scenario document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct ValidationIssue {
    /// Where in the document the problem was found
    pub path: IssuePath,
    /// Human-readable description of the problem
    pub message: String,
}

impl ValidationIssue {
    /// Create an issue at the given path.
    pub fn new(path: IssuePath, message: impl Into<String>) -> Self {
        Self {
            path,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Aggregated validation failure carrying every issue found in a document.
#[derive(Debug, Clone, Error)]
#[error("scenario validation failed with {} issue(s)", .issues.len())]
pub struct ScenarioValidationError {
    /// Every issue found, in document order
    pub issues: Vec<ValidationIssue>,
}

/// Result type for scenario validation.
pub type ValidationResult<T> = Result<T, ScenarioValidationError>;

impl ScenarioValidationError {
    /// Wrap a non-empty issue list.
    pub fn new(issues: Vec<ValidationIssue>) -> Self {
        Self { issues }
    }

    /// Render every issue on its own line, for logs and CLI output.
    pub fn detail(&self) -> String {
        self.issues
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }
}
