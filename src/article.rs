// src/article.rs
//! Article records as produced by the fetch layer.
//!
//! Filters and templates only ever see the flattened, string-keyed view. The
//! raw JSON form is carried along untouched for display purposes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ArticleError;

/// Separator used when flattening nested raw objects (`author__name`).
pub const FLATTEN_SEPARATOR: &str = "__";

/// Explicit field lookup used by the evaluator and the formatter.
pub trait FieldSource {
    fn field(&self, name: &str) -> Option<&str>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ArticleRepr", into = "ArticleRepr")]
pub struct Article {
    flattened: BTreeMap<String, String>,
    raw: Value,
}

#[derive(Serialize, Deserialize)]
struct ArticleRepr {
    flattened: BTreeMap<String, String>,
    #[serde(default)]
    raw: Value,
}

impl TryFrom<ArticleRepr> for Article {
    type Error = ArticleError;

    fn try_from(repr: ArticleRepr) -> Result<Self, Self::Error> {
        Article::with_raw(repr.flattened, repr.raw)
    }
}

impl From<Article> for ArticleRepr {
    fn from(a: Article) -> Self {
        Self {
            flattened: a.flattened,
            raw: a.raw,
        }
    }
}

impl Article {
    /// Build from already-flattened pairs. Fails when `id` is absent or empty.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, ArticleError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let flattened = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::with_raw(flattened, Value::Null)
    }

    pub fn with_raw(flattened: BTreeMap<String, String>, raw: Value) -> Result<Self, ArticleError> {
        match flattened.get("id") {
            Some(id) if !id.is_empty() => Ok(Self { flattened, raw }),
            _ => Err(ArticleError::MissingId),
        }
    }

    /// Flatten a raw JSON object: nested objects become `parent__child`,
    /// arrays `parent__0`, scalars are stringified, nulls and empty strings
    /// are dropped.
    pub fn from_raw(raw: Value) -> Result<Self, ArticleError> {
        let obj = raw.as_object().ok_or(ArticleError::NotAnObject)?;
        let mut flattened = BTreeMap::new();
        for (k, v) in obj {
            flatten_into(&mut flattened, k, v);
        }
        Self::with_raw(flattened, raw)
    }

    pub fn id(&self) -> &str {
        // presence is checked at construction
        self.flattened.get("id").map(String::as_str).unwrap_or_default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.flattened.get(name).map(String::as_str)
    }

    pub fn flattened(&self) -> &BTreeMap<String, String> {
        &self.flattened
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }
}

impl FieldSource for Article {
    fn field(&self, name: &str) -> Option<&str> {
        self.get(name)
    }
}

/// Article merged with medium-specific context values. Article keys win.
#[derive(Debug, Clone, Copy)]
pub struct FilterContext<'a> {
    article: &'a Article,
    extra: &'a BTreeMap<String, String>,
}

impl<'a> FilterContext<'a> {
    pub fn new(article: &'a Article, extra: &'a BTreeMap<String, String>) -> Self {
        Self { article, extra }
    }
}

impl FieldSource for FilterContext<'_> {
    fn field(&self, name: &str) -> Option<&str> {
        self.article
            .get(name)
            .or_else(|| self.extra.get(name).map(String::as_str))
    }
}

impl FieldSource for BTreeMap<String, String> {
    fn field(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str)
    }
}

fn flatten_into(out: &mut BTreeMap<String, String>, key: &str, value: &Value) {
    match value {
        Value::Null => {}
        Value::Bool(b) => {
            out.insert(key.to_string(), b.to_string());
        }
        Value::Number(n) => {
            out.insert(key.to_string(), n.to_string());
        }
        Value::String(s) => {
            if !s.is_empty() {
                out.insert(key.to_string(), s.clone());
            }
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                flatten_into(out, &format!("{key}{FLATTEN_SEPARATOR}{i}"), item);
            }
        }
        Value::Object(map) => {
            for (k, v) in map {
                flatten_into(out, &format!("{key}{FLATTEN_SEPARATOR}{k}"), v);
            }
        }
    }
}
