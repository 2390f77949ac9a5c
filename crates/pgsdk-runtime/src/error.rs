//! # Request-time error types
//!
//! `ApiError` is the unified error enum for everything that can go wrong while
//! serving a generated endpoint. Each variant maps to exactly one HTTP status
//! (see `http::error_response`); the mapping is the contract, the variant
//! names are internal.

use serde::Serialize;
use thiserror::Error;

/// One field-level validation problem, surfaced in 400 responses.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Issue {
    /// Dotted path into the offending input (`"where.name.$like"`, `"title"`).
    pub path: String,
    pub message: String,
}

impl Issue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// All errors that can occur while handling a generated API request.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("validation failed: {}", format_issues(issues))]
    Validation { issues: Vec<Issue> },

    #[error("not found")]
    NotFound,

    #[error("unauthorized: {message}")]
    Auth { message: String },

    #[error("database error during {operation}: {source}")]
    Database {
        operation: String,
        #[source]
        source: sqlx::Error,
    },

    /// A per-edge failure inside the include loader. Caught at each edge in
    /// non-strict mode; only strict mode lets it reach the handler boundary.
    #[error("include stitch failed at '{path}': {message}")]
    IncludeStitch { path: String, message: String },
}

impl ApiError {
    /// Shorthand for a single-issue validation error.
    pub fn invalid(path: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::Validation {
            issues: vec![Issue::new(path, message)],
        }
    }

    pub fn db(operation: impl Into<String>, source: sqlx::Error) -> Self {
        ApiError::Database {
            operation: operation.into(),
            source,
        }
    }

    /// Merge accumulated issues into a validation error, or pass through.
    pub fn from_issues(issues: Vec<Issue>) -> Option<Self> {
        if issues.is_empty() {
            None
        } else {
            Some(ApiError::Validation { issues })
        }
    }
}

fn format_issues(issues: &[Issue]) -> String {
    issues
        .iter()
        .map(|i| format!("{}: {}", i.path, i.message))
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display_names_paths() {
        let err = ApiError::Validation {
            issues: vec![
                Issue::new("title", "required"),
                Issue::new("where.age.$like", "operator requires a text column"),
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("title: required"));
        assert!(msg.contains("where.age.$like"));
    }

    #[test]
    fn test_invalid_shorthand() {
        let err = ApiError::invalid("limit", "must be at most 100");
        match err {
            ApiError::Validation { issues } => {
                assert_eq!(issues.len(), 1);
                assert_eq!(issues[0].path, "limit");
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_from_issues_empty_is_none() {
        assert!(ApiError::from_issues(Vec::new()).is_none());
        assert!(ApiError::from_issues(vec![Issue::new("a", "b")]).is_some());
    }
}
