// src/delivery/mod.rs
pub mod connection;
pub mod dispatcher;
pub mod forum;
pub mod job;

pub use connection::{
    ChannelKind, ChannelTarget, Connection, FeedDetails, PreparedConnection, WebhookTarget,
};
pub use dispatcher::{resolve_destination, ArticleDispatch, Dispatcher};
pub use forum::{resolve_forum_tags, ForumTag};
pub use job::{
    derive_delivery_id, ArticleDeliveryContentType, ArticleDeliveryState, ArticleDeliveryStatus,
    DeliveryErrorCode, DeliveryJob, JobDestination, JobIdentity, MessageBody,
};
