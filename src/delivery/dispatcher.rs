// src/delivery/dispatcher.rs
//! Per-article delivery decisions.
//!
//! For each (article, connection):
//!   filter (article merged with filter context)
//!   → comparison override (force > block > filter)
//!   → Filtered job, or format → destination → forum tags → one job per chunk.
//!
//! Configuration faults become `Failed` jobs carrying an error code; nothing
//! here returns an error for an article that simply did not match.

use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::article::{Article, FilterContext};
use crate::comparisons::{compute_novelty, ComparisonSnapshot, NoveltyOutcome};
use crate::config::DispatchConfig;
use crate::delivery::connection::{ChannelKind, Connection, FeedDetails, PreparedConnection};
use crate::delivery::forum::resolve_forum_tags;
use crate::delivery::job::{
    derive_delivery_id, ArticleDeliveryContentType, ArticleDeliveryState, DeliveryErrorCode,
    DeliveryJob, JobDestination, JobIdentity, MessageBody,
};
use crate::error::DispatchError;
use crate::formatter::embeds::truncate_chars;
use crate::formatter::split_message;

/// Discord caps webhook usernames at 80 chars.
const WEBHOOK_USERNAME_LIMIT: usize = 80;
const DEFAULT_THREAD_TITLE: &str = "{{title}}";
const FALLBACK_THREAD_NAME: &str = "New article";

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "dispatch_jobs_total",
            "Delivery jobs emitted, labelled by status."
        );
        describe_counter!(
            "dispatch_filter_errors_total",
            "Connections whose stored filters failed to compile at dispatch time."
        );
    });
}

/// Everything produced for one article across a feed's connections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleDispatch {
    pub jobs: Vec<DeliveryJob>,
    /// Updated comparison values for the storage layer to persist.
    pub comparisons: ComparisonSnapshot,
}

impl ArticleDispatch {
    pub fn outcomes(&self) -> Vec<ArticleDeliveryState> {
        self.jobs.iter().map(DeliveryJob::outcome).collect()
    }

    pub fn pending(&self) -> impl Iterator<Item = &DeliveryJob> {
        self.jobs.iter().filter(|j| j.is_pending())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    config: DispatchConfig,
}

impl Dispatcher {
    pub fn new(config: DispatchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Dispatch one article to every prepared connection of its feed.
    /// Comparisons are computed once for the feed.
    pub fn dispatch_article(
        &self,
        article: &Article,
        feed: &FeedDetails,
        connections: &[PreparedConnection],
        previous: &ComparisonSnapshot,
    ) -> ArticleDispatch {
        ensure_metrics_described();
        let novelty = compute_novelty(
            article,
            &feed.blocking_comparisons,
            &feed.passing_comparisons,
            previous,
        );

        let mut jobs = Vec::with_capacity(connections.len());
        for connection in connections {
            let identity = job_identity(article, feed, connection.connection());
            jobs.extend(self.dispatch_connection(article, &identity, connection, &novelty));
        }

        tracing::info!(
            target: "dispatch",
            feed = feed.id.as_str(),
            article = article.id(),
            connections = connections.len(),
            jobs = jobs.len(),
            "article dispatched"
        );

        ArticleDispatch {
            jobs,
            comparisons: novelty.updated_values,
        }
    }

    /// Same as [`Dispatcher::dispatch_article`] for connections that were
    /// never prepared. A connection whose filters do not compile yields a
    /// `Failed` job instead of aborting the others.
    pub fn dispatch_stored(
        &self,
        article: &Article,
        feed: &FeedDetails,
        connections: &[Connection],
        previous: &ComparisonSnapshot,
    ) -> ArticleDispatch {
        ensure_metrics_described();
        let novelty = compute_novelty(
            article,
            &feed.blocking_comparisons,
            &feed.passing_comparisons,
            previous,
        );

        let mut jobs = Vec::with_capacity(connections.len());
        for connection in connections {
            let identity = job_identity(article, feed, connection);
            match PreparedConnection::prepare(connection.clone()) {
                Ok(prepared) => {
                    jobs.extend(self.dispatch_connection(article, &identity, &prepared, &novelty))
                }
                Err(e) => {
                    counter!("dispatch_filter_errors_total").increment(1);
                    let err = DispatchError::from(e);
                    tracing::warn!(
                        target: "dispatch",
                        connection = connection.id.as_str(),
                        error = %err,
                        "stored filter is invalid"
                    );
                    jobs.push(record(identity.failed(DeliveryErrorCode::from(&err), err.to_string())));
                }
            }
        }

        ArticleDispatch {
            jobs,
            comparisons: novelty.updated_values,
        }
    }

    /// Jobs for one connection. Always returns at least one job.
    pub fn dispatch_connection(
        &self,
        article: &Article,
        identity: &JobIdentity,
        connection: &PreparedConnection,
        novelty: &NoveltyOutcome,
    ) -> Vec<DeliveryJob> {
        let ctx = FilterContext::new(article, &connection.connection().filter_context);
        let passed = connection.filter().map_or(true, |f| f.evaluate(&ctx));

        if !novelty.resolve(passed) {
            tracing::debug!(
                target: "dispatch",
                connection = connection.id(),
                article = article.id(),
                filter_passed = passed,
                verdict = ?novelty.verdict,
                "article filtered"
            );
            return vec![record(identity.filtered())];
        }

        let (destination, kind) = match resolve_destination(connection.connection()) {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!(
                    target: "dispatch",
                    connection = connection.id(),
                    error = %e,
                    "no usable destination"
                );
                return vec![record(identity.failed(DeliveryErrorCode::from(&e), e.to_string()))];
            }
        };

        let bodies = self.render_bodies(article, connection, kind);
        if bodies.is_empty() {
            tracing::warn!(
                target: "dispatch",
                connection = connection.id(),
                article = article.id(),
                "formatted message is empty"
            );
            return vec![record(identity.failed(
                DeliveryErrorCode::EmptyMessage,
                "formatted message has neither content nor embeds",
            ))];
        }

        bodies
            .into_iter()
            .enumerate()
            .map(|(i, body)| {
                let content_type = if i == 0 && kind == ChannelKind::Forum {
                    ArticleDeliveryContentType::DiscordThreadCreation
                } else {
                    ArticleDeliveryContentType::DiscordArticleMessage
                };
                record(identity.pending(i, content_type, destination.clone(), body))
            })
            .collect()
    }

    /// Render message bodies without filters or comparisons, for test sends.
    pub fn preview(&self, article: &Article, connection: &PreparedConnection) -> Vec<MessageBody> {
        let kind = resolve_destination(connection.connection())
            .map(|(_, kind)| kind)
            .unwrap_or_default();
        self.render_bodies(article, connection, kind)
    }

    fn render_bodies(
        &self,
        article: &Article,
        connection: &PreparedConnection,
        kind: ChannelKind,
    ) -> Vec<MessageBody> {
        let conn = connection.connection();
        let formatter = connection.formatter();
        let formatted = formatter.format(
            article,
            conn.content.as_deref(),
            &conn.embeds,
            self.config.max_embeds,
        );

        let mut bodies: Vec<MessageBody> = split_message(
            &formatted.content,
            &conn.split_options,
            self.config.max_message_length,
            &self.config.default_split_char,
        )
        .map(|chunk| MessageBody {
            content: Some(chunk),
            ..Default::default()
        })
        .collect();

        // embeds ride on the last chunk
        if !formatted.embeds.is_empty() {
            match bodies.last_mut() {
                Some(last) => last.embeds = formatted.embeds,
                None => bodies.push(MessageBody {
                    embeds: formatted.embeds,
                    ..Default::default()
                }),
            }
        }

        if let Some(webhook) = &conn.webhook {
            let render = |t: &Option<String>, limit: Option<usize>| {
                t.as_deref()
                    .map(|t| formatter.substitute(t, article).trim().to_string())
                    .map(|v| match limit {
                        Some(l) => truncate_chars(&v, l),
                        None => v,
                    })
                    .filter(|v| !v.is_empty())
            };
            let username = render(&webhook.name, Some(WEBHOOK_USERNAME_LIMIT));
            let avatar_url = render(&webhook.icon_url, None);
            for body in &mut bodies {
                body.username = username.clone();
                body.avatar_url = avatar_url.clone();
            }
        }

        if kind == ChannelKind::Forum {
            if let Some(first) = bodies.first_mut() {
                let ctx = FilterContext::new(article, &conn.filter_context);
                first.thread_name = Some(self.thread_name(article, connection));
                first.applied_tags = resolve_forum_tags(&ctx, connection.forum_tags());
            }
        }

        bodies
    }

    fn thread_name(&self, article: &Article, connection: &PreparedConnection) -> String {
        let template = connection
            .connection()
            .forum_thread_title
            .as_deref()
            .unwrap_or(DEFAULT_THREAD_TITLE);
        let name = connection.formatter().substitute(template, article);
        let name = truncate_chars(name.trim(), self.config.max_thread_name_length);
        if name.is_empty() {
            FALLBACK_THREAD_NAME.to_string()
        } else {
            name
        }
    }
}

fn job_identity(article: &Article, feed: &FeedDetails, connection: &Connection) -> JobIdentity {
    JobIdentity {
        delivery_id: derive_delivery_id(&feed.id, &connection.id, article.id()),
        medium_id: connection.id.clone(),
        article_id: article.id().to_string(),
        feed_id: feed.id.clone(),
        guild_id: connection.guild_id.clone(),
    }
}

/// Webhook first, then channel.
pub fn resolve_destination(
    connection: &Connection,
) -> Result<(JobDestination, ChannelKind), DispatchError> {
    if let Some(webhook) = &connection.webhook {
        let token = webhook
            .token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| DispatchError::MissingWebhookToken(webhook.id.clone()))?;
        return Ok((
            JobDestination::Webhook {
                webhook_id: webhook.id.clone(),
                webhook_token: token.to_string(),
            },
            webhook.kind,
        ));
    }
    if let Some(channel) = &connection.channel {
        return Ok((
            JobDestination::Channel {
                channel: channel.id.clone(),
            },
            channel.kind,
        ));
    }
    Err(DispatchError::NoDestination)
}

fn record(job: DeliveryJob) -> DeliveryJob {
    counter!("dispatch_jobs_total", "status" => job.status.as_str()).increment(1);
    job
}
