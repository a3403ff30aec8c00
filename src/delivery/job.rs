// src/delivery/job.rs
//! Delivery job records handed to the execution layer.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::DispatchError;
use crate::formatter::DiscordEmbed;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArticleDeliveryStatus {
    PendingDelivery,
    Filtered,
    Failed,
}

impl ArticleDeliveryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PendingDelivery => "pending-delivery",
            Self::Filtered => "filtered",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArticleDeliveryContentType {
    DiscordArticleMessage,
    DiscordThreadCreation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryErrorCode {
    InvalidFilterExpression,
    NoDestination,
    MissingWebhookToken,
    EmptyMessage,
}

impl From<&DispatchError> for DeliveryErrorCode {
    fn from(e: &DispatchError) -> Self {
        match e {
            DispatchError::InvalidFilter(_) => Self::InvalidFilterExpression,
            DispatchError::NoDestination => Self::NoDestination,
            DispatchError::MissingWebhookToken(_) => Self::MissingWebhookToken,
        }
    }
}

/// Where the execution layer should post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JobDestination {
    #[serde(rename_all = "camelCase")]
    Webhook {
        webhook_id: String,
        webhook_token: String,
    },
    Channel {
        channel: String,
    },
}

/// Message payload in Discord's REST shape (snake_case keys).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default)]
    pub embeds: Vec<DiscordEmbed>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub applied_tags: Vec<String>,
}

/// One record per (article, medium, chunk). Immutable once emitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryJob {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub medium_id: String,
    #[serde(rename = "articleID")]
    pub article_id: String,
    pub feed_id: String,
    pub guild_id: String,
    pub status: ArticleDeliveryStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<ArticleDeliveryContentType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<DeliveryErrorCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_message: Option<String>,
    #[serde(flatten)]
    pub destination: Option<JobDestination>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<MessageBody>,
}

/// Outcome projection reported back to delivery records / feed health.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleDeliveryState {
    pub id: String,
    pub medium_id: String,
    pub status: ArticleDeliveryStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<ArticleDeliveryContentType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<DeliveryErrorCode>,
}

/// Identity shared by every job emitted for one (article, medium) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobIdentity {
    pub delivery_id: String,
    pub medium_id: String,
    pub article_id: String,
    pub feed_id: String,
    pub guild_id: String,
}

impl JobIdentity {
    fn base(&self, status: ArticleDeliveryStatus) -> DeliveryJob {
        DeliveryJob {
            id: self.delivery_id.clone(),
            parent_id: None,
            medium_id: self.medium_id.clone(),
            article_id: self.article_id.clone(),
            feed_id: self.feed_id.clone(),
            guild_id: self.guild_id.clone(),
            status,
            content_type: None,
            error_code: None,
            internal_message: None,
            destination: None,
            body: None,
        }
    }

    pub fn filtered(&self) -> DeliveryJob {
        self.base(ArticleDeliveryStatus::Filtered)
    }

    pub fn failed(&self, code: DeliveryErrorCode, message: impl Into<String>) -> DeliveryJob {
        let mut job = self.base(ArticleDeliveryStatus::Failed);
        job.error_code = Some(code);
        job.internal_message = Some(message.into());
        job
    }

    /// Pending job for chunk `index`; chunks after the first point at the first.
    pub fn pending(
        &self,
        index: usize,
        content_type: ArticleDeliveryContentType,
        destination: JobDestination,
        body: MessageBody,
    ) -> DeliveryJob {
        let mut job = self.base(ArticleDeliveryStatus::PendingDelivery);
        if index > 0 {
            job.id = chunk_job_id(&self.delivery_id, index);
            job.parent_id = Some(self.delivery_id.clone());
        }
        job.content_type = Some(content_type);
        job.destination = Some(destination);
        job.body = Some(body);
        job
    }
}

impl DeliveryJob {
    pub fn outcome(&self) -> ArticleDeliveryState {
        ArticleDeliveryState {
            id: self.id.clone(),
            medium_id: self.medium_id.clone(),
            status: self.status,
            content_type: self.content_type,
            error_code: self.error_code,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == ArticleDeliveryStatus::PendingDelivery
    }
}

/// Deterministic delivery id for an (feed, medium, article) triple.
pub fn derive_delivery_id(feed_id: &str, medium_id: &str, article_id: &str) -> String {
    short_hash(&[feed_id, medium_id, article_id])
}

fn chunk_job_id(delivery_id: &str, index: usize) -> String {
    short_hash(&[delivery_id, &index.to_string()])
}

fn short_hash(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for p in parts {
        hasher.update(p.as_bytes());
        // separator so ("ab","c") and ("a","bc") differ
        hasher.update([0u8]);
    }
    let digest = hasher.finalize();
    let mut out = String::with_capacity(32);
    for b in digest.iter().take(16) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn identity() -> JobIdentity {
        JobIdentity {
            delivery_id: "d1".into(),
            medium_id: "m1".into(),
            article_id: "a1".into(),
            feed_id: "f1".into(),
            guild_id: "g1".into(),
        }
    }

    #[test]
    fn pending_webhook_job_json_shape() {
        let job = identity().pending(
            0,
            ArticleDeliveryContentType::DiscordArticleMessage,
            JobDestination::Webhook {
                webhook_id: "w1".into(),
                webhook_token: "tok".into(),
            },
            MessageBody {
                content: Some("hi".into()),
                ..Default::default()
            },
        );
        assert_eq!(
            serde_json::to_value(&job).unwrap(),
            json!({
                "id": "d1",
                "mediumId": "m1",
                "articleID": "a1",
                "feedId": "f1",
                "guildId": "g1",
                "status": "pending-delivery",
                "contentType": "discord-article-message",
                "webhookId": "w1",
                "webhookToken": "tok",
                "body": { "content": "hi", "embeds": [] }
            })
        );
    }

    #[test]
    fn filtered_job_has_no_body_or_destination() {
        let v = serde_json::to_value(identity().filtered()).unwrap();
        assert_eq!(v["status"], "filtered");
        assert!(v.get("body").is_none());
        assert!(v.get("channel").is_none());
    }

    #[test]
    fn follow_up_chunks_link_to_parent() {
        let dest = JobDestination::Channel {
            channel: "c1".into(),
        };
        let a = identity().pending(
            1,
            ArticleDeliveryContentType::DiscordArticleMessage,
            dest.clone(),
            MessageBody::default(),
        );
        let b = identity().pending(
            1,
            ArticleDeliveryContentType::DiscordArticleMessage,
            dest,
            MessageBody::default(),
        );
        assert_eq!(a.parent_id.as_deref(), Some("d1"));
        assert_ne!(a.id, "d1");
        assert_eq!(a.id, b.id);
    }

    #[test]
    fn delivery_ids_are_stable_and_distinct() {
        assert_eq!(
            derive_delivery_id("f", "m", "a"),
            derive_delivery_id("f", "m", "a")
        );
        assert_ne!(
            derive_delivery_id("f", "ma", ""),
            derive_delivery_id("f", "m", "a")
        );
        assert_eq!(derive_delivery_id("f", "m", "a").len(), 32);
    }
}
