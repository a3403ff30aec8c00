// src/filters/expression.rs
//! Persisted form of filter expressions.
//!
//! JSON shape (matches what connections store and what the filter
//! validation endpoint receives):
//!
//! ```json
//! { "type": "LOGICAL", "op": "AND", "children": [
//!     { "type": "RELATIONAL", "op": "CONTAINS",
//!       "left":  { "type": "ARTICLE", "value": "title" },
//!       "right": { "type": "STRING",  "value": "Breaking" } }
//! ] }
//! ```

use serde::{Deserialize, Serialize};

use crate::error::InvalidExpressionError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum Expression {
    Logical(LogicalExpression),
    Relational(RelationalExpression),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicalExpression {
    pub op: LogicalOperator,
    #[serde(default)]
    pub children: Vec<Expression>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalOperator {
    And,
    Or,
    Not,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationalExpression {
    pub op: RelationalOperator,
    pub left: RelationalLeft,
    pub right: RelationalRight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationalOperator {
    Eq,
    NotEq,
    Contains,
    NotContain,
    Matches,
}

impl RelationalOperator {
    /// Negated operators treat a missing field as a match.
    pub fn is_negated(self) -> bool {
        matches!(self, Self::NotEq | Self::NotContain)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum RelationalLeft {
    /// Flattened article field name.
    Article { value: String },
}

impl RelationalLeft {
    pub fn field(&self) -> &str {
        match self {
            Self::Article { value } => value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum RelationalRight {
    String { value: String },
    Regexp { value: String },
}

impl RelationalRight {
    pub fn value(&self) -> &str {
        match self {
            Self::String { value } | Self::Regexp { value } => value,
        }
    }
}

/// `{ "expression": ... }` wrapper stored on connections and forum tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterExpression {
    pub expression: Expression,
}

impl Expression {
    pub fn and(children: Vec<Expression>) -> Self {
        Self::Logical(LogicalExpression {
            op: LogicalOperator::And,
            children,
        })
    }

    pub fn or(children: Vec<Expression>) -> Self {
        Self::Logical(LogicalExpression {
            op: LogicalOperator::Or,
            children,
        })
    }

    pub fn not(child: Expression) -> Self {
        Self::Logical(LogicalExpression {
            op: LogicalOperator::Not,
            children: vec![child],
        })
    }

    /// Relational node comparing an article field against a literal string.
    pub fn string(op: RelationalOperator, field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Relational(RelationalExpression {
            op,
            left: RelationalLeft::Article {
                value: field.into(),
            },
            right: RelationalRight::String {
                value: value.into(),
            },
        })
    }

    /// Relational node comparing an article field against a regex.
    pub fn regexp(op: RelationalOperator, field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::Relational(RelationalExpression {
            op,
            left: RelationalLeft::Article {
                value: field.into(),
            },
            right: RelationalRight::Regexp {
                value: pattern.into(),
            },
        })
    }

    /// Parse the persisted JSON form. Unknown node types or operators are
    /// reported as `InvalidExpressionError` at the root path.
    pub fn from_json(value: serde_json::Value) -> Result<Self, InvalidExpressionError> {
        serde_json::from_value(value).map_err(|e| InvalidExpressionError::single("$", e.to_string()))
    }

    pub fn from_json_str(s: &str) -> Result<Self, InvalidExpressionError> {
        serde_json::from_str(s).map_err(|e| InvalidExpressionError::single("$", e.to_string()))
    }
}
