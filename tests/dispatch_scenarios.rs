// tests/dispatch_scenarios.rs
use feed_dispatch::delivery::{
    ArticleDeliveryContentType, ArticleDeliveryStatus, ChannelKind, DeliveryErrorCode, ForumTag,
    JobDestination, WebhookTarget,
};
use feed_dispatch::filters::RelationalOperator;
use feed_dispatch::formatter::SplitOptions;
use feed_dispatch::{
    Article, ComparisonSnapshot, Connection, DispatchConfig, Dispatcher, Expression, FeedDetails,
    FilterExpression, PreparedConnection,
};
use serde_json::json;

fn breaking_news() -> Article {
    Article::from_pairs([("id", "1"), ("title", "Breaking News")]).unwrap()
}

fn feed() -> FeedDetails {
    FeedDetails {
        id: "feed-1".into(),
        url: "https://news.test/rss".into(),
        ..Default::default()
    }
}

fn title_contains(v: &str) -> FilterExpression {
    FilterExpression {
        expression: Expression::string(RelationalOperator::Contains, "title", v),
    }
}

fn channel_connection(filter: Option<FilterExpression>) -> Connection {
    let mut c = Connection::new("medium-1", "guild-1")
        .with_content("{title}")
        .with_channel("chan-1", ChannelKind::Text);
    c.filters = filter;
    c
}

fn dispatch_one(connection: Connection, article: &Article) -> feed_dispatch::ArticleDispatch {
    let prepared = PreparedConnection::prepare(connection).unwrap();
    Dispatcher::default().dispatch_article(article, &feed(), &[prepared], &ComparisonSnapshot::new())
}

#[test]
fn matching_filter_emits_pending_job_with_content() {
    let out = dispatch_one(
        channel_connection(Some(title_contains("Breaking"))),
        &breaking_news(),
    );
    assert_eq!(out.jobs.len(), 1);
    let job = &out.jobs[0];
    assert_eq!(job.status, ArticleDeliveryStatus::PendingDelivery);
    assert_eq!(job.article_id, "1");
    assert_eq!(job.medium_id, "medium-1");
    assert_eq!(
        job.destination,
        Some(JobDestination::Channel {
            channel: "chan-1".into()
        })
    );
    let content = job.body.as_ref().unwrap().content.as_deref().unwrap();
    assert!(content.contains("Breaking News"));
}

#[test]
fn non_matching_filter_emits_filtered_job_without_body() {
    let out = dispatch_one(
        channel_connection(Some(title_contains("Sports"))),
        &breaking_news(),
    );
    assert_eq!(out.jobs.len(), 1);
    assert_eq!(out.jobs[0].status, ArticleDeliveryStatus::Filtered);
    assert!(out.jobs[0].body.is_none());
    assert!(out.jobs[0].destination.is_none());
}

#[test]
fn long_content_is_split_into_linked_jobs() {
    let article = Article::from_pairs([("id", "9"), ("body", "A".repeat(2500).as_str())]).unwrap();
    let connection = Connection::new("medium-1", "guild-1")
        .with_content("{{body}}")
        .with_channel("chan-1", ChannelKind::Text)
        .with_split_options(SplitOptions::enabled().with_split_char(" "));
    let out = dispatch_one(connection, &article);

    assert_eq!(out.jobs.len(), 2);
    let first = out.jobs[0].body.as_ref().unwrap().content.clone().unwrap();
    let second = out.jobs[1].body.as_ref().unwrap().content.clone().unwrap();
    assert!(first.chars().count() <= 2000);
    assert_eq!(format!("{first}{second}"), "A".repeat(2500));
    assert_eq!(out.jobs[1].parent_id.as_deref(), Some(out.jobs[0].id.as_str()));
    assert!(out.jobs.iter().all(|j| j.is_pending()));
}

#[test]
fn filter_context_is_visible_to_filters_but_article_wins() {
    let mut c = channel_connection(Some(FilterExpression {
        expression: Expression::and(vec![
            Expression::string(RelationalOperator::Eq, "region", "eu"),
            Expression::string(RelationalOperator::Eq, "title", "Breaking News"),
        ]),
    }));
    c.filter_context.insert("region".into(), "eu".into());
    c.filter_context.insert("title".into(), "shadowed".into());
    let out = dispatch_one(c, &breaking_news());
    assert!(out.jobs[0].is_pending());
}

#[test]
fn webhook_jobs_carry_rendered_identity() {
    let c = channel_connection(None).with_webhook(WebhookTarget {
        id: "wh-1".into(),
        token: Some("secret".into()),
        name: Some("{{title}} bot".into()),
        icon_url: Some("{{missing}}".into()),
        kind: ChannelKind::Text,
    });
    let out = dispatch_one(c, &breaking_news());
    let job = &out.jobs[0];
    assert_eq!(
        job.destination,
        Some(JobDestination::Webhook {
            webhook_id: "wh-1".into(),
            webhook_token: "secret".into()
        })
    );
    let body = job.body.as_ref().unwrap();
    assert_eq!(body.username.as_deref(), Some("Breaking News bot"));
    assert_eq!(body.avatar_url, None);
}

#[test]
fn forum_channel_creates_thread_with_tags() {
    let mut c = Connection::new("medium-1", "guild-1")
        .with_content("{{title}}")
        .with_channel("forum-1", ChannelKind::Forum);
    c.forum_thread_tags = vec![
        ForumTag {
            id: "news".into(),
            filters: None,
        },
        ForumTag {
            id: "breaking".into(),
            filters: Some(title_contains("Breaking")),
        },
        ForumTag {
            id: "sports".into(),
            filters: Some(title_contains("Sports")),
        },
    ];
    let out = dispatch_one(c, &breaking_news());
    let job = &out.jobs[0];
    assert_eq!(
        job.content_type,
        Some(ArticleDeliveryContentType::DiscordThreadCreation)
    );
    let body = job.body.as_ref().unwrap();
    assert_eq!(body.thread_name.as_deref(), Some("Breaking News"));
    assert_eq!(body.applied_tags, ["news", "breaking"]);
}

#[test]
fn forum_thread_name_is_capped_and_falls_back_when_blank() {
    let long_title = "T".repeat(300);
    let article = Article::from_pairs([("id", "2"), ("title", long_title.as_str())]).unwrap();
    let forum = |title: Option<&str>| {
        let mut c = Connection::new("medium-1", "guild-1")
            .with_content("body")
            .with_channel("forum-1", ChannelKind::Forum);
        c.forum_thread_title = title.map(str::to_string);
        PreparedConnection::prepare(c).unwrap()
    };
    let thread_name = |d: &Dispatcher, c: PreparedConnection| {
        let out = d.dispatch_article(&article, &feed(), &[c], &ComparisonSnapshot::new());
        out.jobs[0].body.as_ref().unwrap().thread_name.clone().unwrap()
    };

    let d = Dispatcher::default();
    assert_eq!(thread_name(&d, forum(None)).chars().count(), 100);
    assert_eq!(thread_name(&d, forum(Some("  {{missing}}  "))), "New article");

    let short = Dispatcher::new(DispatchConfig {
        max_thread_name_length: 12,
        ..Default::default()
    });
    assert_eq!(thread_name(&short, forum(None)), "T".repeat(12));
}

#[test]
fn webhook_username_is_capped_at_discord_limit() {
    let c = channel_connection(None).with_webhook(WebhookTarget {
        id: "wh-1".into(),
        token: Some("secret".into()),
        name: Some("N".repeat(120)),
        icon_url: None,
        kind: ChannelKind::Text,
    });
    let out = dispatch_one(c, &breaking_news());
    let body = out.jobs[0].body.as_ref().unwrap();
    assert_eq!(body.username.as_deref().map(|u| u.chars().count()), Some(80));
}

#[test]
fn blocking_comparison_suppresses_and_snapshot_is_returned() {
    let mut f = feed();
    f.blocking_comparisons = vec!["title".into()];
    let prepared = PreparedConnection::prepare(channel_connection(None)).unwrap();
    let d = Dispatcher::default();

    let first = d.dispatch_article(&breaking_news(), &f, &[prepared.clone()], &ComparisonSnapshot::new());
    assert!(first.jobs[0].is_pending());
    assert_eq!(first.comparisons.seen("title"), ["Breaking News"]);

    let again = Article::from_pairs([("id", "2"), ("title", "Breaking News")]).unwrap();
    let second = d.dispatch_article(&again, &f, &[prepared], &first.comparisons);
    assert_eq!(second.jobs[0].status, ArticleDeliveryStatus::Filtered);
}

#[test]
fn passing_comparison_overrides_a_rejecting_filter() {
    let mut f = feed();
    f.passing_comparisons = vec!["title".into()];
    let prev: ComparisonSnapshot = [("title", vec!["Old headline"])].into_iter().collect();
    let prepared = PreparedConnection::prepare(channel_connection(Some(title_contains("Sports")))).unwrap();
    let out = Dispatcher::default().dispatch_article(&breaking_news(), &f, &[prepared], &prev);
    assert!(out.jobs[0].is_pending());
}

#[test]
fn stored_connection_with_bad_regex_fails_without_blocking_others() {
    let bad = channel_connection(Some(FilterExpression {
        expression: Expression::regexp(RelationalOperator::Matches, "title", "(unclosed"),
    }));
    let mut good = channel_connection(None);
    good.id = "medium-2".into();

    let out = Dispatcher::default().dispatch_stored(
        &breaking_news(),
        &feed(),
        &[bad, good],
        &ComparisonSnapshot::new(),
    );
    assert_eq!(out.jobs.len(), 2);
    assert_eq!(out.jobs[0].status, ArticleDeliveryStatus::Failed);
    assert_eq!(
        out.jobs[0].error_code,
        Some(DeliveryErrorCode::InvalidFilterExpression)
    );
    assert!(out.jobs[1].is_pending());
}

#[test]
fn preview_ignores_filters() {
    let prepared = PreparedConnection::prepare(channel_connection(Some(title_contains("Sports")))).unwrap();
    let bodies = Dispatcher::default().preview(&breaking_news(), &prepared);
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0].content.as_deref(), Some("Breaking News"));
}

#[test]
fn stored_json_connection_dispatches() {
    let c: Connection = serde_json::from_value(json!({
        "id": "medium-json",
        "guildId": "guild-1",
        "filters": { "expression": {
            "type": "LOGICAL", "op": "AND", "children": [
                { "type": "RELATIONAL", "op": "MATCHES",
                  "left": { "type": "ARTICLE", "value": "title" },
                  "right": { "type": "REGEXP", "value": "^Break" } }
            ]
        }},
        "content": "**{{title}}**",
        "embeds": [{ "title": "{{title}}", "footer": { "text": "via feed" } }],
        "channel": { "id": "chan-9" }
    }))
    .unwrap();
    let out = dispatch_one(c, &breaking_news());
    let v = serde_json::to_value(&out.jobs[0]).unwrap();
    assert_eq!(v["status"], "pending-delivery");
    assert_eq!(v["articleID"], "1");
    assert_eq!(v["channel"], "chan-9");
    assert_eq!(v["body"]["content"], "**Breaking News**");
    assert_eq!(v["body"]["embeds"][0]["footer"]["text"], "via feed");
}
