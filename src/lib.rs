// src/lib.rs
// Public library surface for the preview binary and integration tests.

pub mod article;
pub mod comparisons;
pub mod config;
pub mod delivery;
pub mod error;
pub mod executor;
pub mod filters;
pub mod formatter;
pub mod telemetry;

// ---- Re-exports for stable public API ----
pub use crate::article::{Article, FieldSource, FilterContext};
pub use crate::comparisons::{compute_novelty, ComparisonSnapshot, ComparisonVerdict, NoveltyOutcome};
pub use crate::config::DispatchConfig;
pub use crate::delivery::{
    ArticleDispatch, Connection, DeliveryJob, Dispatcher, FeedDetails, PreparedConnection,
};
pub use crate::error::{
    ArticleError, ConfigError, DispatchError, ExpressionIssue, FormattingError,
    InvalidExpressionError,
};
pub use crate::executor::{execute_jobs, DeliveryExecutor, DiscordRestExecutor, LogExecutor};
pub use crate::filters::{CompiledFilter, Expression, FilterExpression};
pub use crate::formatter::{format, ArticleFormatter, FormatOptions, FormattedContent};
