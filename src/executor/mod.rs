// src/executor/mod.rs
//! Execution seam: hands emitted delivery jobs to the network.
//!
//! Jobs of one article are posted strictly in order. A forum thread created
//! by the first chunk receives the follow-up chunks; when a chunk fails, the
//! remaining chunks of that delivery are not attempted.

pub mod discord;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::delivery::{ArticleDeliveryContentType, ArticleDeliveryStatus, DeliveryJob};

pub use discord::DiscordRestExecutor;

/// What a successful post told us.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostOutcome {
    /// Thread created by this post, if any.
    pub thread_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReport {
    pub job_id: String,
    pub medium_id: String,
    pub status: ArticleDeliveryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[async_trait]
pub trait DeliveryExecutor: Send + Sync {
    fn name(&self) -> &'static str;

    /// Post one pending job. `thread_id` is set for chunks following a
    /// forum thread creation.
    async fn post(&self, job: &DeliveryJob, thread_id: Option<&str>) -> Result<PostOutcome>;
}

/// Post every pending job in order and report per-job results. Non-pending
/// jobs are reported unchanged.
pub async fn execute_jobs<E>(executor: &E, jobs: &[DeliveryJob]) -> Vec<ExecutionReport>
where
    E: DeliveryExecutor + ?Sized,
{
    let mut threads: HashMap<&str, String> = HashMap::new();
    let mut failed_parents: Vec<&str> = Vec::new();
    let mut reports = Vec::with_capacity(jobs.len());

    for job in jobs {
        if !job.is_pending() {
            reports.push(report(job, job.status, job.internal_message.clone()));
            continue;
        }

        let parent = job.parent_id.as_deref();
        if parent.is_some_and(|p| failed_parents.contains(&p)) {
            reports.push(report(
                job,
                ArticleDeliveryStatus::Failed,
                Some("previous chunk failed".to_string()),
            ));
            continue;
        }

        let thread_id = parent.and_then(|p| threads.get(p)).map(String::as_str);
        match executor.post(job, thread_id).await {
            Ok(outcome) => {
                if job.content_type == Some(ArticleDeliveryContentType::DiscordThreadCreation) {
                    if let Some(t) = outcome.thread_id {
                        threads.insert(job.id.as_str(), t);
                    }
                }
                reports.push(report(job, ArticleDeliveryStatus::PendingDelivery, None));
            }
            Err(e) => {
                tracing::warn!(
                    target: "dispatch",
                    executor = executor.name(),
                    job = job.id.as_str(),
                    error = %e,
                    "delivery failed"
                );
                failed_parents.push(parent.unwrap_or(job.id.as_str()));
                reports.push(report(job, ArticleDeliveryStatus::Failed, Some(e.to_string())));
            }
        }
    }

    reports
}

fn report(job: &DeliveryJob, status: ArticleDeliveryStatus, error: Option<String>) -> ExecutionReport {
    ExecutionReport {
        job_id: job.id.clone(),
        medium_id: job.medium_id.clone(),
        status,
        error,
    }
}

/// Logs jobs instead of sending them. Used by the preview binary and tests.
#[derive(Debug, Default)]
pub struct LogExecutor {
    posted: AtomicUsize,
}

impl LogExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn posted(&self) -> usize {
        self.posted.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl DeliveryExecutor for LogExecutor {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn post(&self, job: &DeliveryJob, thread_id: Option<&str>) -> Result<PostOutcome> {
        self.posted.fetch_add(1, Ordering::Relaxed);
        let body = job.body.as_ref();
        tracing::info!(
            target: "dispatch",
            job = job.id.as_str(),
            parent = job.parent_id.as_deref(),
            medium = job.medium_id.as_str(),
            thread = thread_id,
            content_chars = body.and_then(|b| b.content.as_deref()).map_or(0, |c| c.chars().count()),
            embeds = body.map_or(0, |b| b.embeds.len()),
            "delivery job"
        );
        let thread_id = (job.content_type == Some(ArticleDeliveryContentType::DiscordThreadCreation))
            .then(|| format!("thread-{}", job.id));
        Ok(PostOutcome { thread_id })
    }
}
