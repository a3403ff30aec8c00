// src/error.rs
//! Error taxonomy for the decision core.
//!
//! Only structurally invalid configuration is an error here. Missing article
//! fields, filtered articles and empty matches are ordinary values.

use std::fmt;

use thiserror::Error;

/// One problem found while validating a filter expression.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ExpressionIssue {
    /// JSON path of the offending node, e.g. `$.children[1].right.value`.
    pub path: String,
    pub message: String,
}

impl ExpressionIssue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ExpressionIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Malformed expression tree, unknown operator or invalid regex.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct InvalidExpressionError {
    pub issues: Vec<ExpressionIssue>,
}

impl InvalidExpressionError {
    pub fn single(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            issues: vec![ExpressionIssue::new(path, message)],
        }
    }

    /// Re-root every issue path under `prefix`, e.g. `$.forumThreadTags[0].filters.expression`.
    pub fn under(mut self, prefix: &str) -> Self {
        for issue in &mut self.issues {
            issue.path = issue.path.replacen('$', prefix, 1);
        }
        self
    }
}

impl fmt::Display for InvalidExpressionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.issues.as_slice() {
            [] => write!(f, "invalid filter expression"),
            [only] => write!(f, "invalid filter expression: {only}"),
            [first, rest @ ..] => write!(
                f,
                "invalid filter expression: {first} (and {} more)",
                rest.len()
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArticleError {
    #[error("article is missing the required `id` field")]
    MissingId,
    #[error("raw article must be a JSON object")]
    NotAnObject,
}

/// Unexpected template or date rendering fault. Never fatal: the formatter
/// logs it and falls back to best-effort content.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormattingError {
    #[error("invalid date format `{0}`")]
    InvalidDateFormat(String),
    #[error("unknown timezone `{0}`")]
    UnknownTimezone(String),
}

/// Destination resolution or job construction failure. Recorded on the
/// emitted job rather than returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error(transparent)]
    InvalidFilter(#[from] InvalidExpressionError),
    #[error("connection has neither a webhook nor a channel configured")]
    NoDestination,
    #[error("webhook `{0}` has no token")]
    MissingWebhookToken(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config from {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported config format")]
    UnsupportedFormat,
    #[error("invalid config value `{key}`: {reason}")]
    InvalidValue { key: &'static str, reason: String },
}
