// src/filters/legacy.rs
//! One-shot conversion of legacy feed settings into current connections.
//!
//! Only migration tooling calls into this module; nothing on the dispatch
//! path depends on it.
//!
//! Legacy regular filters map `category -> [pattern]`:
//! - `!~v` / `~!v`  → `NOT_CONTAIN v`, ANDed
//! - `!v`           → `NOT_EQ v`, ANDed
//! - `~v`           → `CONTAINS v`, in the shared OR group
//! - `v`            → `EQ v`, in the shared OR group
//!
//! The shared OR group is one AND child and only exists when it has members,
//! so a feed with only blocking patterns passes anything not blocked.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::delivery::connection::{ChannelKind, Connection, FeedDetails, WebhookTarget};
use crate::filters::{Expression, FilterExpression, RelationalOperator};
use crate::formatter::embeds::{
    EmbedAuthorTemplate, EmbedFieldTemplate, EmbedFooterTemplate, EmbedMediaTemplate,
};
use crate::formatter::{EmbedTemplate, FormatOptions, SplitOptions};

const RAW_PREFIX: &str = "raw:";

static RE_LEGACY_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([^{}]*)\}").expect("legacy placeholder regex"));

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LegacyEmbedField {
    pub name: String,
    pub value: String,
    pub inline: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LegacyEmbed {
    pub title: Option<String>,
    #[serde(rename = "authorIconURL")]
    pub author_icon_url: Option<String>,
    pub author_name: Option<String>,
    #[serde(rename = "authorURL")]
    pub author_url: Option<String>,
    /// Decimal color, stored as text.
    pub color: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "footerIconURL")]
    pub footer_icon_url: Option<String>,
    pub footer_text: Option<String>,
    #[serde(rename = "imageURL")]
    pub image_url: Option<String>,
    #[serde(rename = "thumbnailURL")]
    pub thumbnail_url: Option<String>,
    pub timestamp: Option<String>,
    pub url: Option<String>,
    pub fields: Vec<LegacyEmbedField>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LegacyWebhook {
    pub id: String,
    pub name: Option<String>,
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LegacySplit {
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LegacyFeed {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub url: String,
    pub guild: String,
    pub channel: String,
    pub webhook: Option<LegacyWebhook>,
    pub text: Option<String>,
    pub embeds: Vec<LegacyEmbed>,
    pub filters: BTreeMap<String, Vec<String>>,
    pub rfilters: BTreeMap<String, String>,
    pub ncomparisons: Vec<String>,
    pub pcomparisons: Vec<String>,
    pub split: Option<LegacySplit>,
    pub format_tables: bool,
    pub img_links_existence: bool,
}

/// Guild-wide legacy display settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LegacyGuildProfile {
    pub date_format: Option<String>,
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertedFeed {
    pub feed: FeedDetails,
    pub connection: Connection,
}

fn category_field(category: &str) -> &str {
    category.strip_prefix(RAW_PREFIX).unwrap_or(category)
}

/// Convert `category -> [pattern]` filters. `None` when there is nothing to convert.
pub fn convert_regular_filters(filters: &BTreeMap<String, Vec<String>>) -> Option<FilterExpression> {
    if filters.is_empty() {
        return None;
    }

    let mut and_children = Vec::new();
    let mut or_children = Vec::new();

    for (category, patterns) in filters {
        let field = category_field(category);
        for pattern in patterns {
            if let Some(v) = pattern
                .strip_prefix("!~")
                .or_else(|| pattern.strip_prefix("~!"))
            {
                and_children.push(Expression::string(RelationalOperator::NotContain, field, v));
            } else if let Some(v) = pattern.strip_prefix('!') {
                and_children.push(Expression::string(RelationalOperator::NotEq, field, v));
            } else if let Some(v) = pattern.strip_prefix('~') {
                or_children.push(Expression::string(RelationalOperator::Contains, field, v));
            } else {
                or_children.push(Expression::string(RelationalOperator::Eq, field, pattern.as_str()));
            }
        }
    }

    if !or_children.is_empty() {
        and_children.insert(0, Expression::or(or_children));
    }

    Some(FilterExpression {
        expression: Expression::and(and_children),
    })
}

/// Convert `category -> regex` filters into an OR of regex `CONTAINS` checks.
pub fn convert_regex_filters(filters: &BTreeMap<String, String>) -> Option<FilterExpression> {
    if filters.is_empty() {
        return None;
    }
    let children = filters
        .iter()
        .map(|(category, pattern)| {
            Expression::regexp(
                RelationalOperator::Contains,
                category_field(category),
                pattern.as_str(),
            )
        })
        .collect();
    Some(FilterExpression {
        expression: Expression::or(children),
    })
}

/// `{title}` → `{{title}}`. Already doubled placeholders are left alone.
pub fn convert_placeholders(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    let mut last = 0;
    for m in RE_LEGACY_PLACEHOLDER.find_iter(text) {
        let before = &text[last..m.start()];
        let after = &text[m.end()..];
        out.push_str(before);
        if before.ends_with('{') && after.starts_with('}') {
            out.push_str(m.as_str());
        } else {
            out.push_str("{{");
            out.push_str(&m.as_str()[1..m.as_str().len() - 1]);
            out.push_str("}}");
        }
        last = m.end();
    }
    out.push_str(&text[last..]);
    out
}

fn convert_opt(text: &Option<String>) -> Option<String> {
    text.as_deref()
        .filter(|t| !t.is_empty())
        .map(convert_placeholders)
}

pub fn convert_embed(embed: &LegacyEmbed) -> EmbedTemplate {
    let author = match (
        convert_opt(&embed.author_name),
        convert_opt(&embed.author_url),
        convert_opt(&embed.author_icon_url),
    ) {
        (None, None, None) => None,
        (name, url, icon_url) => Some(EmbedAuthorTemplate {
            name,
            url,
            icon_url,
        }),
    };
    let footer = match (convert_opt(&embed.footer_text), convert_opt(&embed.footer_icon_url)) {
        (None, None) => None,
        (text, icon_url) => Some(EmbedFooterTemplate { text, icon_url }),
    };
    let color = embed.color.as_deref().and_then(|c| match c.trim().parse::<u32>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(target: "dispatch", color = c, "dropping unparsable legacy embed color");
            None
        }
    });

    EmbedTemplate {
        title: convert_opt(&embed.title),
        description: convert_opt(&embed.description),
        url: convert_opt(&embed.url),
        color,
        timestamp: convert_opt(&embed.timestamp),
        author,
        footer,
        image: convert_opt(&embed.image_url).map(|url| EmbedMediaTemplate { url: Some(url) }),
        thumbnail: convert_opt(&embed.thumbnail_url).map(|url| EmbedMediaTemplate { url: Some(url) }),
        fields: embed
            .fields
            .iter()
            .map(|f| EmbedFieldTemplate {
                name: convert_placeholders(&f.name),
                value: convert_placeholders(&f.value),
                inline: f.inline,
            })
            .collect(),
    }
}

/// Convert a whole legacy feed. The webhook token is not stored on legacy
/// feeds; the caller fetches it from Discord and passes it in.
pub fn convert_feed(
    feed: &LegacyFeed,
    profile: Option<&LegacyGuildProfile>,
    webhook_token: Option<&str>,
) -> ConvertedFeed {
    // regex filters replace regular ones entirely when present
    let filters = if feed.rfilters.is_empty() {
        convert_regular_filters(&feed.filters)
    } else {
        convert_regex_filters(&feed.rfilters)
    };

    let mut connection = Connection::new(feed.id.clone(), feed.guild.clone());
    connection.name = Some(feed.title.clone()).filter(|t| !t.is_empty());
    connection.filters = filters;
    connection.content = convert_opt(&feed.text);
    connection.embeds = feed.embeds.iter().map(convert_embed).collect();
    connection.formatter = FormatOptions {
        format_tables: feed.format_tables,
        strip_images: feed.img_links_existence,
        date_format: profile.and_then(|p| p.date_format.clone()).filter(|s| !s.is_empty()),
        date_timezone: profile.and_then(|p| p.timezone.clone()).filter(|s| !s.is_empty()),
    };
    connection.split_options = SplitOptions {
        is_enabled: feed.split.as_ref().is_some_and(|s| s.enabled),
        ..Default::default()
    };

    match &feed.webhook {
        Some(webhook) => {
            connection.webhook = Some(WebhookTarget {
                id: webhook.id.clone(),
                token: webhook_token.map(str::to_string),
                name: convert_opt(&webhook.name),
                icon_url: convert_opt(&webhook.avatar),
                kind: ChannelKind::Text,
            });
        }
        None => {
            connection = connection.with_channel(feed.channel.clone(), ChannelKind::Text);
        }
    }

    tracing::info!(
        target: "dispatch",
        feed = feed.id.as_str(),
        webhook = connection.webhook.is_some(),
        has_filters = connection.filters.is_some(),
        "converted legacy feed"
    );

    ConvertedFeed {
        feed: FeedDetails {
            id: feed.id.clone(),
            url: feed.url.clone(),
            blocking_comparisons: feed.ncomparisons.clone(),
            passing_comparisons: feed.pcomparisons.clone(),
        },
        connection,
    }
}
