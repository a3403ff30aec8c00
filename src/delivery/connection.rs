// src/delivery/connection.rs
//! Connection configuration as stored per feed, and its prepared form.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::delivery::forum::{compile_forum_tags, CompiledForumTag, ForumTag};
use crate::error::InvalidExpressionError;
use crate::filters::{CompiledFilter, FilterExpression};
use crate::formatter::{ArticleFormatter, EmbedTemplate, FormatOptions, SplitOptions};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    #[default]
    Text,
    Forum,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookTarget {
    pub id: String,
    #[serde(default)]
    pub token: Option<String>,
    /// Username template.
    #[serde(default)]
    pub name: Option<String>,
    /// Avatar URL template.
    #[serde(default)]
    pub icon_url: Option<String>,
    #[serde(default)]
    pub kind: ChannelKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelTarget {
    pub id: String,
    #[serde(default)]
    pub kind: ChannelKind,
}

/// One delivery target attached to a feed. When both a webhook and a channel
/// are configured, the webhook wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    /// Medium id.
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub guild_id: String,
    #[serde(default)]
    pub filters: Option<FilterExpression>,
    /// Extra values visible to filters only. Article fields take precedence.
    #[serde(default)]
    pub filter_context: BTreeMap<String, String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub embeds: Vec<EmbedTemplate>,
    #[serde(default)]
    pub formatter: FormatOptions,
    #[serde(default)]
    pub split_options: SplitOptions,
    #[serde(default)]
    pub webhook: Option<WebhookTarget>,
    #[serde(default)]
    pub channel: Option<ChannelTarget>,
    /// Thread title template for forum destinations; `{{title}}` when unset.
    #[serde(default)]
    pub forum_thread_title: Option<String>,
    #[serde(default)]
    pub forum_thread_tags: Vec<ForumTag>,
}

impl Connection {
    pub fn new(id: impl Into<String>, guild_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            guild_id: guild_id.into(),
            filters: None,
            filter_context: BTreeMap::new(),
            content: None,
            embeds: Vec::new(),
            formatter: FormatOptions::default(),
            split_options: SplitOptions::default(),
            webhook: None,
            channel: None,
            forum_thread_title: None,
            forum_thread_tags: Vec::new(),
        }
    }

    pub fn with_filters(mut self, filters: FilterExpression) -> Self {
        self.filters = Some(filters);
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_channel(mut self, id: impl Into<String>, kind: ChannelKind) -> Self {
        self.channel = Some(ChannelTarget { id: id.into(), kind });
        self
    }

    pub fn with_webhook(mut self, webhook: WebhookTarget) -> Self {
        self.webhook = Some(webhook);
        self
    }

    pub fn with_split_options(mut self, split: SplitOptions) -> Self {
        self.split_options = split;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedDetails {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub blocking_comparisons: Vec<String>,
    #[serde(default)]
    pub passing_comparisons: Vec<String>,
}

/// A connection with its filters compiled and formatter options validated.
/// Built when the configuration is saved; evaluation cannot fail afterwards.
#[derive(Debug, Clone)]
pub struct PreparedConnection {
    connection: Connection,
    filter: Option<CompiledFilter>,
    forum_tags: Vec<CompiledForumTag>,
    formatter: ArticleFormatter,
}

impl PreparedConnection {
    pub fn prepare(connection: Connection) -> Result<Self, InvalidExpressionError> {
        let filter = connection
            .filters
            .as_ref()
            .map(|f| CompiledFilter::compile(&f.expression))
            .transpose();
        let forum_tags = compile_forum_tags(&connection.forum_thread_tags);

        let (filter, forum_tags) = match (filter, forum_tags) {
            (Ok(f), Ok(t)) => (f, t),
            (filter, tags) => {
                let mut issues = Vec::new();
                if let Err(e) = filter {
                    issues.extend(e.under("$.filters.expression").issues);
                }
                if let Err(e) = tags {
                    issues.extend(e.issues);
                }
                return Err(InvalidExpressionError { issues });
            }
        };

        let formatter = ArticleFormatter::new(&connection.formatter);
        Ok(Self {
            connection,
            filter,
            forum_tags,
            formatter,
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn id(&self) -> &str {
        &self.connection.id
    }

    pub fn filter(&self) -> Option<&CompiledFilter> {
        self.filter.as_ref()
    }

    pub fn forum_tags(&self) -> &[CompiledForumTag] {
        &self.forum_tags
    }

    pub fn formatter(&self) -> &ArticleFormatter {
        &self.formatter
    }
}
