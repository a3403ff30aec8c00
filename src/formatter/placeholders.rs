// src/formatter/placeholders.rs
//! Placeholder substitution for content and embed templates.
//!
//! Accepted forms: `{{title}}`, `{title}`, fallbacks `{{title||description}}`
//! and literal fallbacks `{{title||text::Untitled}}`. Unresolved placeholders
//! render as the empty string.

use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static RE_PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{([^{}]*)\}\}|\{([^{}\s]+)\}").expect("placeholder regex")
});

const FALLBACK_SEPARATOR: &str = "||";
const LITERAL_PREFIX: &str = "text::";

/// Replace every placeholder in `template` using `lookup`. Single pass:
/// substituted values are never re-scanned.
pub fn substitute<'a, F>(template: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<Cow<'a, str>>,
{
    RE_PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            let inner = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();
            resolve(inner, &lookup)
        })
        .into_owned()
}

fn resolve<'a, F>(inner: &str, lookup: &F) -> String
where
    F: Fn(&str) -> Option<Cow<'a, str>>,
{
    for candidate in inner.split(FALLBACK_SEPARATOR) {
        let candidate = candidate.trim();
        if let Some(literal) = candidate.strip_prefix(LITERAL_PREFIX) {
            return literal.to_string();
        }
        if candidate.is_empty() {
            continue;
        }
        if let Some(v) = lookup(candidate) {
            if !v.is_empty() {
                return v.into_owned();
            }
        }
    }
    String::new()
}

/// Field names referenced by a template, in order of appearance.
pub fn referenced_fields(template: &str) -> Vec<String> {
    let mut out = Vec::new();
    for caps in RE_PLACEHOLDER.captures_iter(template) {
        let inner = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str())
            .unwrap_or_default();
        for candidate in inner.split(FALLBACK_SEPARATOR) {
            let c = candidate.trim();
            if !c.is_empty() && !c.starts_with(LITERAL_PREFIX) && !out.iter().any(|o| o == c) {
                out.push(c.to_string());
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn lookup_in<'m>(map: &'m BTreeMap<String, String>) -> impl Fn(&str) -> Option<Cow<'m, str>> + 'm {
        move |k| map.get(k).map(|v| Cow::Borrowed(v.as_str()))
    }

    fn fields() -> BTreeMap<String, String> {
        let mut m = BTreeMap::new();
        m.insert("title".into(), "Hello".into());
        m.insert("link".into(), "https://x.test/a".into());
        m.insert("braces".into(), "{title}".into());
        m
    }

    #[test]
    fn both_brace_styles_resolve() {
        let f = fields();
        assert_eq!(substitute("{{title}} - {link}", lookup_in(&f)), "Hello - https://x.test/a");
        assert_eq!(substitute("{{ title }}", lookup_in(&f)), "Hello");
    }

    #[test]
    fn unresolved_render_empty() {
        let f = fields();
        assert_eq!(substitute("[{{summary}}][{summary}]", lookup_in(&f)), "[][]");
    }

    #[test]
    fn fallbacks_pick_first_non_empty() {
        let f = fields();
        assert_eq!(substitute("{{summary||title}}", lookup_in(&f)), "Hello");
        assert_eq!(substitute("{{summary||text::n/a}}", lookup_in(&f)), "n/a");
    }

    #[test]
    fn values_are_not_rescanned() {
        let f = fields();
        assert_eq!(substitute("{{braces}}", lookup_in(&f)), "{title}");
    }

    #[test]
    fn lists_referenced_fields_once() {
        assert_eq!(
            referenced_fields("{{title}} {link} {{title||text::x||summary}}"),
            vec!["title", "link", "summary"]
        );
    }
}
