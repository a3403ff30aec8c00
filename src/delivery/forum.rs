// src/delivery/forum.rs
//! Forum tag selection.
//!
//! Each configured tag is judged on its own: a tag without a filter always
//! applies, a tag with a filter applies when the filter passes. The result is
//! the union, in configuration order, without duplicates.

use serde::{Deserialize, Serialize};

use crate::article::FieldSource;
use crate::error::InvalidExpressionError;
use crate::filters::{CompiledFilter, FilterExpression};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForumTag {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<FilterExpression>,
}

#[derive(Debug, Clone)]
pub struct CompiledForumTag {
    pub id: String,
    filter: Option<CompiledFilter>,
}

impl CompiledForumTag {
    pub fn compile(tag: &ForumTag) -> Result<Self, InvalidExpressionError> {
        let filter = tag
            .filters
            .as_ref()
            .map(|f| CompiledFilter::compile(&f.expression))
            .transpose()?;
        Ok(Self {
            id: tag.id.clone(),
            filter,
        })
    }

    pub fn applies<S: FieldSource + ?Sized>(&self, source: &S) -> bool {
        self.filter.as_ref().map_or(true, |f| f.evaluate(source))
    }
}

/// Compile every tag, reporting issues under `$.forumThreadTags[i]`.
pub fn compile_forum_tags(tags: &[ForumTag]) -> Result<Vec<CompiledForumTag>, InvalidExpressionError> {
    let mut issues = Vec::new();
    let mut compiled = Vec::with_capacity(tags.len());
    for (i, tag) in tags.iter().enumerate() {
        match CompiledForumTag::compile(tag) {
            Ok(c) => compiled.push(c),
            Err(e) => issues.extend(
                e.under(&format!("$.forumThreadTags[{i}].filters.expression"))
                    .issues,
            ),
        }
    }
    if issues.is_empty() {
        Ok(compiled)
    } else {
        Err(InvalidExpressionError { issues })
    }
}

/// Tag ids to apply to a new forum thread for this article.
pub fn resolve_forum_tags<S: FieldSource + ?Sized>(source: &S, tags: &[CompiledForumTag]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        if tag.applies(source) && !out.contains(&tag.id) {
            out.push(tag.id.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::article::Article;
    use crate::filters::{Expression, RelationalOperator};

    fn tag(id: &str, filter: Option<Expression>) -> ForumTag {
        ForumTag {
            id: id.into(),
            filters: filter.map(|expression| FilterExpression { expression }),
        }
    }

    #[test]
    fn unfiltered_tags_always_apply_and_results_are_a_union() {
        let article = Article::from_pairs([("id", "1"), ("title", "Rust 2.0 released")]).unwrap();
        let tags = compile_forum_tags(&[
            tag("always", None),
            tag(
                "rust",
                Some(Expression::string(RelationalOperator::Contains, "title", "Rust")),
            ),
            tag(
                "go",
                Some(Expression::string(RelationalOperator::Contains, "title", "Go")),
            ),
            tag("always", None),
        ])
        .unwrap();
        assert_eq!(resolve_forum_tags(&article, &tags), ["always", "rust"]);
    }

    #[test]
    fn bad_tag_filter_is_reported_with_its_index() {
        let err = compile_forum_tags(&[
            tag("ok", None),
            tag(
                "bad",
                Some(Expression::regexp(RelationalOperator::Matches, "title", "(")),
            ),
        ])
        .unwrap_err();
        assert!(err.issues[0]
            .path
            .starts_with("$.forumThreadTags[1].filters.expression"));
    }
}
