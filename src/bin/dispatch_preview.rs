//! Reads a dispatch request (JSON, from a file argument or stdin), runs the
//! dispatcher and prints the resulting jobs. With `--send` the pending jobs are
//! posted through the Discord REST executor (channel jobs need
//! `DISCORD_BOT_TOKEN`); otherwise they are only logged.
//!
//! Request shape:
//! { "article": {...}, "feed": {...}, "connections": [...], "comparisons": {...} }

use std::io::Read;

use anyhow::{Context, Result};
use serde::Deserialize;

use feed_dispatch::{
    execute_jobs, telemetry, Article, ComparisonSnapshot, Connection, DeliveryExecutor,
    DiscordRestExecutor, DispatchConfig, Dispatcher, FeedDetails, LogExecutor,
};

const ENV_BOT_TOKEN: &str = "DISCORD_BOT_TOKEN";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PreviewRequest {
    /// Raw article JSON; flattened before dispatch.
    article: serde_json::Value,
    feed: FeedDetails,
    #[serde(default)]
    connections: Vec<Connection>,
    #[serde(default)]
    comparisons: ComparisonSnapshot,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    telemetry::init_tracing();

    let mut send = false;
    let mut path = None;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--send" => send = true,
            other => path = Some(other.to_string()),
        }
    }

    let raw = match &path {
        Some(p) => std::fs::read_to_string(p).with_context(|| format!("reading {p}"))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading request from stdin")?;
            buf
        }
    };
    let req: PreviewRequest = serde_json::from_str(&raw).context("parsing dispatch request")?;
    let article = Article::from_raw(req.article).context("building article")?;

    let config = DispatchConfig::load_default().context("loading dispatch config")?;
    let dispatcher = Dispatcher::new(config.clone());
    let out = dispatcher.dispatch_stored(&article, &req.feed, &req.connections, &req.comparisons);

    println!("{}", serde_json::to_string_pretty(&out)?);

    let executor: Box<dyn DeliveryExecutor> = if send {
        let mut discord = DiscordRestExecutor::from_config(&config);
        if let Ok(token) = std::env::var(ENV_BOT_TOKEN) {
            discord = discord.with_bot_token(token);
        }
        Box::new(discord)
    } else {
        Box::new(LogExecutor::new())
    };

    let reports = execute_jobs(executor.as_ref(), &out.jobs).await;
    eprintln!("{}", serde_json::to_string_pretty(&reports)?);
    Ok(())
}
