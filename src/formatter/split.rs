// src/formatter/split.rs
//! Message splitting for platform length limits.
//!
//! Chunks are produced lazily and in order. Each chunk, including the inserted
//! prepend/append characters, fits within the limit. Stripping those inserted
//! characters and concatenating the chunks gives back the original content.

use std::iter::FusedIterator;

use serde::{Deserialize, Serialize};

/// Discord's maximum message content length.
pub const DISCORD_MESSAGE_LIMIT: usize = 2000;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SplitOptions {
    pub is_enabled: bool,
    pub split_char: Option<String>,
    pub append_char: Option<String>,
    pub prepend_char: Option<String>,
}

impl SplitOptions {
    pub fn enabled() -> Self {
        Self {
            is_enabled: true,
            ..Default::default()
        }
    }

    pub fn with_split_char(mut self, c: impl Into<String>) -> Self {
        self.split_char = Some(c.into());
        self
    }

    pub fn with_append_char(mut self, c: impl Into<String>) -> Self {
        self.append_char = Some(c.into());
        self
    }

    pub fn with_prepend_char(mut self, c: impl Into<String>) -> Self {
        self.prepend_char = Some(c.into());
        self
    }
}

/// Lazy chunk iterator returned by [`split_message`]. Consumes its input;
/// not restartable.
#[derive(Debug, Clone)]
pub struct SplitChunks<'a> {
    rest: &'a str,
    first: bool,
    enabled: bool,
    split: &'a str,
    prepend: &'a str,
    append: &'a str,
    limit: usize,
}

/// Split `content` according to `options`. `default_split` is used when the
/// options carry no split character.
///
/// With splitting disabled an over-long message is truncated to the limit,
/// since the transport would reject it anyway.
pub fn split_message<'a>(
    content: &'a str,
    options: &'a SplitOptions,
    limit: usize,
    default_split: &'a str,
) -> SplitChunks<'a> {
    let limit = limit.max(1);
    let mut prepend = options.prepend_char.as_deref().unwrap_or("");
    let mut append = options.append_char.as_deref().unwrap_or("");
    if options.is_enabled && prepend.chars().count() + append.chars().count() >= limit {
        tracing::warn!(
            target: "dispatch",
            limit,
            prepend,
            append,
            "split markers leave no room for content, ignoring them"
        );
        prepend = "";
        append = "";
    }

    SplitChunks {
        rest: content,
        first: true,
        enabled: options.is_enabled,
        split: options
            .split_char
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(default_split),
        prepend,
        append,
        limit,
    }
}

impl Iterator for SplitChunks<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.rest.is_empty() {
            return None;
        }

        if !self.enabled {
            let end = byte_offset_of_char(self.rest, self.limit);
            if end < self.rest.len() {
                tracing::warn!(
                    target: "dispatch",
                    limit = self.limit,
                    dropped_bytes = self.rest.len() - end,
                    "message over limit with splitting disabled, truncating"
                );
            }
            let chunk = self.rest[..end].to_string();
            self.rest = "";
            return Some(chunk);
        }

        let prefix = if self.first { "" } else { self.prepend };
        self.first = false;
        let prefix_len = prefix.chars().count();

        if prefix_len + self.rest.chars().count() <= self.limit {
            let chunk = format!("{prefix}{}", self.rest);
            self.rest = "";
            return Some(chunk);
        }

        let budget = self
            .limit
            .saturating_sub(prefix_len + self.append.chars().count())
            .max(1);
        let window_end = byte_offset_of_char(self.rest, budget);
        let window = &self.rest[..window_end];

        let cut = if self.split.is_empty() {
            None
        } else {
            window
                .rfind(self.split)
                .map(|i| i + self.split.len())
                .filter(|&c| c > 0)
        };
        // no boundary below the limit: hard cut, nothing is lost
        let cut = cut.unwrap_or(window_end);

        let chunk = format!("{prefix}{}{}", &self.rest[..cut], self.append);
        self.rest = &self.rest[cut..];
        Some(chunk)
    }
}

impl FusedIterator for SplitChunks<'_> {}

/// Byte offset of the `n`th char, or the string length if shorter.
fn byte_offset_of_char(s: &str, n: usize) -> usize {
    s.char_indices().nth(n).map(|(i, _)| i).unwrap_or(s.len())
}
