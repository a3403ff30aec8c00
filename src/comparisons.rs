// src/comparisons.rs
//! Comparison (novelty) engine.
//!
//! Blocking fields suppress delivery when their value was already seen;
//! passing fields force delivery when their value is new. Precedence:
//! force > block > filter expression. The engine is stateless: it reads a
//! snapshot and returns the updated one for the storage layer to persist.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::article::Article;

/// Field name → previously seen values, oldest first, no duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComparisonSnapshot {
    values: BTreeMap<String, Vec<String>>,
}

impl ComparisonSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seen(&self, field: &str) -> &[String] {
        self.values.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_history(&self, field: &str) -> bool {
        !self.seen(field).is_empty()
    }

    pub fn contains(&self, field: &str, value: &str) -> bool {
        self.seen(field).iter().any(|v| v == value)
    }

    /// Record a value; returns false if it was already present.
    pub fn record(&mut self, field: &str, value: &str) -> bool {
        let list = self.values.entry(field.to_string()).or_default();
        if list.iter().any(|v| v == value) {
            return false;
        }
        list.push(value.to_string());
        true
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

impl<K, V> FromIterator<(K, Vec<V>)> for ComparisonSnapshot
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, Vec<V>)>>(iter: I) -> Self {
        let mut snap = Self::new();
        for (k, vs) in iter {
            let k = k.into();
            for v in vs {
                snap.record(&k, &v.into());
            }
        }
        snap
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComparisonVerdict {
    /// A passing field changed: deliver even if the filter rejects.
    ForcePass,
    /// A blocking field repeats a seen value: do not deliver.
    Block,
    /// Nothing to say; the filter expression decides.
    Defer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoveltyOutcome {
    pub verdict: ComparisonVerdict,
    /// Field that produced the verdict, for logging.
    pub decided_by: Option<String>,
    pub updated_values: ComparisonSnapshot,
}

impl NoveltyOutcome {
    pub fn is_new(&self) -> bool {
        self.verdict != ComparisonVerdict::Block
    }

    /// Combine with the filter expression result.
    pub fn resolve(&self, expression_passed: bool) -> bool {
        match self.verdict {
            ComparisonVerdict::ForcePass => true,
            ComparisonVerdict::Block => false,
            ComparisonVerdict::Defer => expression_passed,
        }
    }
}

/// Decide novelty for `article` against the `previous` snapshot.
///
/// Fields with no recorded history never block or force; their first value
/// is only recorded. Fields absent from the article are skipped.
pub fn compute_novelty(
    article: &Article,
    blocking_fields: &[String],
    passing_fields: &[String],
    previous: &ComparisonSnapshot,
) -> NoveltyOutcome {
    let mut updated = previous.clone();
    let mut forced_by: Option<&str> = None;
    let mut blocked_by: Option<&str> = None;

    for field in passing_fields {
        let Some(value) = article.get(field) else {
            continue;
        };
        if forced_by.is_none() && previous.has_history(field) && !previous.contains(field, value) {
            forced_by = Some(field.as_str());
        }
        updated.record(field, value);
    }

    for field in blocking_fields {
        let Some(value) = article.get(field) else {
            continue;
        };
        if blocked_by.is_none() && previous.contains(field, value) {
            blocked_by = Some(field.as_str());
        }
        updated.record(field, value);
    }

    let (verdict, decided_by) = match (forced_by, blocked_by) {
        (Some(f), _) => (ComparisonVerdict::ForcePass, Some(f.to_string())),
        (None, Some(f)) => (ComparisonVerdict::Block, Some(f.to_string())),
        (None, None) => (ComparisonVerdict::Defer, None),
    };

    if let Some(field) = &decided_by {
        tracing::debug!(
            target: "dispatch",
            article = article.id(),
            field = field.as_str(),
            ?verdict,
            "comparison verdict"
        );
    }

    NoveltyOutcome {
        verdict,
        decided_by,
        updated_values: updated,
    }
}
