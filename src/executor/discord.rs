// src/executor/discord.rs
//! Discord REST executor.
//!
//! Webhook jobs post to `/webhooks/{id}/{token}`; channel jobs post to
//! `/channels/{id}/messages`, or `/channels/{id}/threads` for a forum thread
//! creation, authenticated with a bot token.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

use super::{DeliveryExecutor, PostOutcome};
use crate::config::DispatchConfig;
use crate::delivery::{ArticleDeliveryContentType, DeliveryJob, JobDestination, MessageBody};

const MAX_RETRIES: u8 = 10;
const BACKOFF_CAP_MS: u64 = 30_000;

/// A request ready to send: where, what, and whether it needs bot auth.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscordRequest {
    pub url: String,
    pub body: Value,
    pub bot_auth: bool,
    creates_thread: bool,
}

#[derive(Clone)]
pub struct DiscordRestExecutor {
    api_base: String,
    bot_token: Option<String>,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

impl DiscordRestExecutor {
    pub fn new(api_base: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            bot_token: None,
            client: Client::new(),
            timeout: Duration::from_secs(5),
            max_retries: 3,
        }
    }

    pub fn from_config(config: &DispatchConfig) -> Self {
        Self::new(config.discord_api_base.clone())
    }

    pub fn with_bot_token(mut self, token: impl Into<String>) -> Self {
        self.bot_token = Some(token.into());
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries.clamp(1, MAX_RETRIES);
        self
    }

    /// Build the HTTP request for a pending job.
    pub fn request_for(&self, job: &DeliveryJob, thread_id: Option<&str>) -> Result<DiscordRequest> {
        let body = job
            .body
            .as_ref()
            .ok_or_else(|| anyhow!("job {} has no message body", job.id))?;
        let destination = job
            .destination
            .as_ref()
            .ok_or_else(|| anyhow!("job {} has no destination", job.id))?;
        let creates_thread = job.content_type == Some(ArticleDeliveryContentType::DiscordThreadCreation);

        let req = match destination {
            JobDestination::Webhook {
                webhook_id,
                webhook_token,
            } => {
                let mut url = format!("{}/webhooks/{webhook_id}/{webhook_token}?wait=true", self.api_base);
                if let Some(t) = thread_id {
                    url.push_str("&thread_id=");
                    url.push_str(t);
                }
                DiscordRequest {
                    url,
                    body: serde_json::to_value(body)?,
                    bot_auth: false,
                    creates_thread,
                }
            }
            JobDestination::Channel { channel } if creates_thread => DiscordRequest {
                url: format!("{}/channels/{channel}/threads", self.api_base),
                body: json!({
                    "name": body.thread_name.clone().unwrap_or_default(),
                    "applied_tags": body.applied_tags,
                    "message": message_only(body),
                }),
                bot_auth: true,
                creates_thread,
            },
            JobDestination::Channel { channel } => {
                let target = thread_id.unwrap_or(channel);
                DiscordRequest {
                    url: format!("{}/channels/{target}/messages", self.api_base),
                    body: message_only(body),
                    bot_auth: true,
                    creates_thread,
                }
            }
        };
        Ok(req)
    }

    async fn send_with_retries(&self, req: &DiscordRequest) -> Result<Value> {
        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let mut builder = self
                .client
                .post(&req.url)
                .timeout(self.timeout)
                .json(&req.body);
            if req.bot_auth {
                let token = self
                    .bot_token
                    .as_deref()
                    .ok_or_else(|| anyhow!("channel delivery requires a bot token"))?;
                builder = builder.header("Authorization", format!("Bot {token}"));
            }

            match builder.send().await {
                Ok(rsp) => {
                    let status = rsp.status();
                    if status.is_success() {
                        if status == StatusCode::NO_CONTENT {
                            return Ok(Value::Null);
                        }
                        return rsp.json::<Value>().await.context("decoding Discord response");
                    }
                    if is_retryable(status) && attempt < self.max_retries {
                        tokio::time::sleep(backoff(attempt)).await;
                        continue;
                    }
                    let text = rsp.text().await.unwrap_or_default();
                    bail!("Discord HTTP {status}: {text}");
                }
                Err(e) => {
                    if attempt < self.max_retries {
                        tokio::time::sleep(backoff(attempt)).await;
                        continue;
                    }
                    return Err(anyhow!("Discord request failed: {e}"));
                }
            }
        }
    }
}

#[async_trait]
impl DeliveryExecutor for DiscordRestExecutor {
    fn name(&self) -> &'static str {
        "discord"
    }

    async fn post(&self, job: &DeliveryJob, thread_id: Option<&str>) -> Result<PostOutcome> {
        let req = self.request_for(job, thread_id)?;
        let rsp = self.send_with_retries(&req).await?;
        tracing::debug!(target: "dispatch", job = job.id.as_str(), "posted to Discord");
        Ok(PostOutcome {
            thread_id: req.creates_thread.then(|| created_thread_id(&req, &rsp)).flatten(),
        })
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn message_only(body: &MessageBody) -> Value {
    json!({
        "content": body.content,
        "embeds": body.embeds,
    })
}

// webhook posts answer with the message (thread id = channel_id);
// the threads endpoint answers with the thread channel itself
/// 500ms doubling per attempt, capped.
fn backoff(attempt: u8) -> Duration {
    let shift = u32::from(attempt.saturating_sub(1)).min(16);
    let ms = (500u64 << shift).min(BACKOFF_CAP_MS);
    Duration::from_millis(ms)
}

fn created_thread_id(req: &DiscordRequest, rsp: &Value) -> Option<String> {
    let key = if req.bot_auth { "id" } else { "channel_id" };
    rsp.get(key).and_then(Value::as_str).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::JobIdentity;

    fn identity() -> JobIdentity {
        JobIdentity {
            delivery_id: "d1".into(),
            medium_id: "m1".into(),
            article_id: "a1".into(),
            feed_id: "f1".into(),
            guild_id: "g1".into(),
        }
    }

    fn body() -> MessageBody {
        MessageBody {
            content: Some("hello".into()),
            thread_name: Some("Title".into()),
            applied_tags: vec!["t1".into()],
            ..Default::default()
        }
    }

    fn exec() -> DiscordRestExecutor {
        DiscordRestExecutor::new("https://discord.test/api/v10/")
    }

    #[test]
    fn webhook_urls_include_thread_for_follow_ups() {
        let dest = JobDestination::Webhook {
            webhook_id: "w1".into(),
            webhook_token: "tok".into(),
        };
        let first = identity().pending(0, ArticleDeliveryContentType::DiscordThreadCreation, dest.clone(), body());
        let req = exec().request_for(&first, None).unwrap();
        assert_eq!(req.url, "https://discord.test/api/v10/webhooks/w1/tok?wait=true");
        assert!(!req.bot_auth);
        assert_eq!(req.body["thread_name"], "Title");

        let next = identity().pending(1, ArticleDeliveryContentType::DiscordArticleMessage, dest, body());
        let req = exec().request_for(&next, Some("th9")).unwrap();
        assert_eq!(
            req.url,
            "https://discord.test/api/v10/webhooks/w1/tok?wait=true&thread_id=th9"
        );
    }

    #[test]
    fn channel_urls() {
        let dest = JobDestination::Channel {
            channel: "c1".into(),
        };
        let plain = identity().pending(0, ArticleDeliveryContentType::DiscordArticleMessage, dest.clone(), body());
        let req = exec().request_for(&plain, None).unwrap();
        assert_eq!(req.url, "https://discord.test/api/v10/channels/c1/messages");
        assert!(req.bot_auth);
        assert!(req.body.get("thread_name").is_none());

        let thread = identity().pending(0, ArticleDeliveryContentType::DiscordThreadCreation, dest.clone(), body());
        let req = exec().request_for(&thread, None).unwrap();
        assert_eq!(req.url, "https://discord.test/api/v10/channels/c1/threads");
        assert_eq!(req.body["name"], "Title");
        assert_eq!(req.body["applied_tags"][0], "t1");
        assert_eq!(req.body["message"]["content"], "hello");

        let follow = identity().pending(1, ArticleDeliveryContentType::DiscordArticleMessage, dest, body());
        let req = exec().request_for(&follow, Some("th9")).unwrap();
        assert_eq!(req.url, "https://discord.test/api/v10/channels/th9/messages");
    }

    #[test]
    fn retries_are_clamped_and_backoff_is_capped() {
        assert_eq!(exec().with_retries(200).max_retries, MAX_RETRIES);
        assert_eq!(exec().with_retries(0).max_retries, 1);
        assert_eq!(backoff(1), Duration::from_millis(500));
        assert_eq!(backoff(3), Duration::from_millis(2000));
        assert_eq!(backoff(64), Duration::from_millis(BACKOFF_CAP_MS));
        assert_eq!(backoff(u8::MAX), Duration::from_millis(BACKOFF_CAP_MS));
    }

    #[test]
    fn filtered_jobs_cannot_be_posted() {
        assert!(exec().request_for(&identity().filtered(), None).is_err());
    }

    #[test]
    fn thread_id_is_read_per_endpoint() {
        let webhook = DiscordRequest {
            url: String::new(),
            body: Value::Null,
            bot_auth: false,
            creates_thread: true,
        };
        let rsp = json!({ "id": "msg", "channel_id": "thread" });
        assert_eq!(created_thread_id(&webhook, &rsp).as_deref(), Some("thread"));
        let channel = DiscordRequest {
            bot_auth: true,
            ..webhook
        };
        assert_eq!(created_thread_id(&channel, &rsp).as_deref(), Some("msg"));
    }
}
