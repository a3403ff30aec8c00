// src/formatter/mod.rs
//! Article formatter: placeholders → image stripping → tables, for content and
//! embeds. Never fails; configuration faults are logged and fall back to
//! best-effort output.

pub mod embeds;
pub mod placeholders;
pub mod split;
pub mod tables;

use std::borrow::Cow;

use chrono::{DateTime, FixedOffset};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::article::Article;
use crate::error::FormattingError;

pub use embeds::{DiscordEmbed, EmbedTemplate};
pub use split::{split_message, SplitChunks, SplitOptions, DISCORD_MESSAGE_LIMIT};

use embeds::{
    truncate_chars, DiscordEmbedAuthor, DiscordEmbedField, DiscordEmbedFooter, DiscordEmbedMedia,
    EMBED_AUTHOR_LIMIT, EMBED_DESCRIPTION_LIMIT, EMBED_FIELD_NAME_LIMIT, EMBED_FIELD_VALUE_LIMIT,
    EMBED_FOOTER_LIMIT, EMBED_MAX_FIELDS, EMBED_TITLE_LIMIT,
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FormatOptions {
    pub format_tables: bool,
    pub strip_images: bool,
    /// strftime-style format applied to date fields.
    pub date_format: Option<String>,
    /// IANA timezone name; UTC when absent.
    pub date_timezone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormattedContent {
    pub content: String,
    pub embeds: Vec<DiscordEmbed>,
}

static RE_MARKDOWN_IMAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!\[[^\]]*\]\([^)]*\)").expect("markdown image regex"));
static RE_IMG_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<img\b[^>]*>").expect("img tag regex"));
static RE_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)https?://[^\s<>()]+").expect("url regex"));

const IMAGE_EXTENSIONS: [&str; 7] = [".png", ".jpg", ".jpeg", ".gif", ".webp", ".bmp", ".svg"];

const DATE_FIELD_NAMES: [&str; 5] = ["date", "pubdate", "published", "updated", "isodate"];

/// Formatter bound to one connection's options. Date settings are validated
/// once here rather than per placeholder.
#[derive(Debug, Clone)]
pub struct ArticleFormatter {
    options: FormatOptions,
    date_format: Option<String>,
    timezone: Tz,
}

impl ArticleFormatter {
    pub fn new(options: &FormatOptions) -> Self {
        let date_format = match options.date_format.as_deref() {
            Some(f) => match check_date_format(f) {
                Ok(()) => Some(f.to_string()),
                Err(e) => {
                    tracing::warn!(target: "dispatch", error = %e, "falling back to raw dates");
                    None
                }
            },
            None => None,
        };

        let timezone = match options.date_timezone.as_deref() {
            Some(name) => match parse_timezone(name) {
                Ok(tz) => tz,
                Err(e) => {
                    tracing::warn!(target: "dispatch", error = %e, "falling back to UTC");
                    Tz::UTC
                }
            },
            None => Tz::UTC,
        };

        Self {
            options: options.clone(),
            date_format,
            timezone,
        }
    }

    pub fn options(&self) -> &FormatOptions {
        &self.options
    }

    /// Substitute placeholders only. Used for URLs and other non-prose fields.
    pub fn substitute(&self, template: &str, article: &Article) -> String {
        placeholders::substitute(template, |name| self.field_value(article, name))
    }

    /// Full text pipeline: placeholders, then image stripping and tables.
    pub fn render_text(&self, template: &str, article: &Article) -> String {
        let mut out = self.substitute(template, article);
        if self.options.strip_images {
            out = strip_images(&out);
        }
        if self.options.format_tables {
            out = tables::format_tables(&out);
        }
        out
    }

    pub fn format(
        &self,
        article: &Article,
        content: Option<&str>,
        embeds: &[EmbedTemplate],
        max_embeds: usize,
    ) -> FormattedContent {
        let content = content
            .map(|c| self.render_text(c, article))
            .unwrap_or_default();
        let embeds = embeds
            .iter()
            .map(|t| self.render_embed(t, article))
            .filter(|e| !e.is_empty())
            .take(max_embeds)
            .collect();
        FormattedContent { content, embeds }
    }

    fn render_embed(&self, t: &EmbedTemplate, article: &Article) -> DiscordEmbed {
        let text = |s: &Option<String>, limit: usize| {
            s.as_deref()
                .map(|v| truncate_chars(self.render_text(v, article).trim(), limit))
                .filter(|v| !v.is_empty())
        };
        let link = |s: &Option<String>| {
            s.as_deref()
                .map(|v| self.substitute(v, article).trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let author = t.author.as_ref().and_then(|a| {
            text(&a.name, EMBED_AUTHOR_LIMIT).map(|name| DiscordEmbedAuthor {
                name,
                url: link(&a.url),
                icon_url: link(&a.icon_url),
            })
        });
        let footer = t.footer.as_ref().and_then(|f| {
            text(&f.text, EMBED_FOOTER_LIMIT).map(|text| DiscordEmbedFooter {
                text,
                icon_url: link(&f.icon_url),
            })
        });
        let media = |m: &Option<embeds::EmbedMediaTemplate>| {
            if self.options.strip_images {
                return None;
            }
            m.as_ref()
                .and_then(|m| link(&m.url))
                .map(|url| DiscordEmbedMedia { url })
        };
        let fields = t
            .fields
            .iter()
            .filter_map(|f| {
                let name = truncate_chars(self.render_text(&f.name, article).trim(), EMBED_FIELD_NAME_LIMIT);
                let value =
                    truncate_chars(self.render_text(&f.value, article).trim(), EMBED_FIELD_VALUE_LIMIT);
                if name.is_empty() || value.is_empty() {
                    return None;
                }
                Some(DiscordEmbedField {
                    name,
                    value,
                    inline: f.inline.unwrap_or(false),
                })
            })
            .take(EMBED_MAX_FIELDS)
            .collect();

        DiscordEmbed {
            title: text(&t.title, EMBED_TITLE_LIMIT),
            description: text(&t.description, EMBED_DESCRIPTION_LIMIT),
            url: link(&t.url),
            color: t.color,
            // raw values: a custom date format would not parse back
            timestamp: t
                .timestamp
                .as_deref()
                .map(|v| placeholders::substitute(v, |n| article.get(n).map(Cow::Borrowed)))
                .and_then(|ts| normalize_timestamp(&ts)),
            author,
            footer,
            image: media(&t.image),
            thumbnail: media(&t.thumbnail),
            fields,
        }
    }

    fn field_value<'a>(&self, article: &'a Article, name: &str) -> Option<Cow<'a, str>> {
        let raw = article.get(name)?;
        if let Some(fmt) = &self.date_format {
            if is_date_field(name) {
                if let Some(dt) = parse_date(raw) {
                    return Some(Cow::Owned(
                        dt.with_timezone(&self.timezone).format(fmt).to_string(),
                    ));
                }
            }
        }
        Some(Cow::Borrowed(raw))
    }
}

/// One-shot convenience over [`ArticleFormatter`].
pub fn format(
    article: &Article,
    content: Option<&str>,
    embeds: &[EmbedTemplate],
    options: &FormatOptions,
) -> FormattedContent {
    ArticleFormatter::new(options).format(article, content, embeds, crate::config::DEFAULT_MAX_EMBEDS)
}

/// Remove markdown images, `<img>` tags and bare image links.
pub fn strip_images(text: &str) -> String {
    let out = RE_MARKDOWN_IMAGE.replace_all(text, "");
    let out = RE_IMG_TAG.replace_all(&out, "");
    RE_URL
        .replace_all(&out, |caps: &regex::Captures| {
            let url = &caps[0];
            // sentence punctuation after a link is not part of it
            let trimmed = url.trim_end_matches(['.', ',', ';', ':', '!']);
            if is_image_url(trimmed) {
                url[trimmed.len()..].to_string()
            } else {
                url.to_string()
            }
        })
        .into_owned()
}

fn is_image_url(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url).to_ascii_lowercase();
    IMAGE_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

fn is_date_field(name: &str) -> bool {
    let last = name
        .rsplit(crate::article::FLATTEN_SEPARATOR)
        .next()
        .unwrap_or(name)
        .to_ascii_lowercase();
    DATE_FIELD_NAMES.contains(&last.as_str()) || last.ends_with("date")
}

fn parse_date(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_rfc2822(raw))
        .ok()
}

fn normalize_timestamp(raw: &str) -> Option<String> {
    parse_date(raw).map(|dt| dt.to_rfc3339())
}

fn check_date_format(fmt: &str) -> Result<(), FormattingError> {
    use chrono::format::{Item, StrftimeItems};
    if StrftimeItems::new(fmt).any(|item| matches!(item, Item::Error)) {
        return Err(FormattingError::InvalidDateFormat(fmt.to_string()));
    }
    Ok(())
}

fn parse_timezone(name: &str) -> Result<Tz, FormattingError> {
    name.parse::<Tz>()
        .map_err(|_| FormattingError::UnknownTimezone(name.to_string()))
}
