//! crates/forum_answers_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, keeping the
//! pipeline independent of the forum's HTTP API and of the generation provider.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{Comment, ForumSnapshot, Post, Timeframe};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// The failure taxonomy shared by every port and by the orchestrator.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PortError {
    #[error("Invalid request: {0}")]
    Validation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Authentication failed: {0}")]
    Auth(String),
    #[error("Upstream error{}: {message}", status_suffix(.status))]
    Upstream { status: Option<u16>, message: String },
    #[error("Insufficient content: {0}")]
    InsufficientContent(String),
    #[error("Generation failed: {0}")]
    Generation(String),
    #[error("Rate limited: {0}")]
    RateLimited(String),
    #[error("Request cancelled: {0}")]
    Cancelled(String),
}

impl PortError {
    pub fn upstream(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Upstream {
            status,
            message: message.into(),
        }
    }

    /// The caller-visible category of this failure.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation(_) => ErrorCategory::Validation,
            Self::NotFound(_) => ErrorCategory::NotFound,
            Self::Forbidden(_) => ErrorCategory::Forbidden,
            Self::Auth(_) => ErrorCategory::Auth,
            Self::Upstream { status, .. } => ErrorCategory::Upstream { throttled: *status == Some(429) },
            Self::InsufficientContent(_) => ErrorCategory::InsufficientContent,
            Self::Generation(_) => ErrorCategory::Generation,
            Self::RateLimited(_) => ErrorCategory::RateLimited,
            Self::Cancelled(_) => ErrorCategory::Cancelled,
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({s})")).unwrap_or_default()
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// Stable error categories exposed to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    NotFound,
    Forbidden,
    Auth,
    /// `throttled` is set when the forum itself answered 429.
    Upstream { throttled: bool },
    InsufficientContent,
    Generation,
    RateLimited,
    Cancelled,
}

impl ErrorCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::Forbidden => "forbidden",
            Self::Auth => "auth",
            Self::Upstream { .. } => "upstream",
            Self::InsufficientContent => "insufficient_content",
            Self::Generation => "generation",
            Self::RateLimited => "rate_limited",
            Self::Cancelled => "cancelled",
        }
    }

    /// HTTP-equivalent status code for the envelope.
    pub fn http_status(self) -> u16 {
        match self {
            Self::Validation => 400,
            Self::Auth => 401,
            Self::Forbidden => 403,
            Self::NotFound => 404,
            Self::InsufficientContent => 422,
            Self::RateLimited | Self::Upstream { throttled: true } => 429,
            Self::Upstream { throttled: false } | Self::Generation => 500,
            Self::Cancelled => 504,
        }
    }

    /// Whether the same request may succeed if the caller tries again later.
    pub fn retryable(self) -> bool {
        matches!(
            self,
            Self::Upstream { .. } | Self::Generation | Self::RateLimited | Self::Cancelled
        )
    }
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// A source of the current time, injectable so expiry logic can be tested.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Returns a bearer token, refreshing it first if the cached one has expired.
    async fn get_token(&self) -> PortResult<String>;

    /// Discards `token` after the API rejected it, so the next call fetches a
    /// fresh one. Providers that cannot refresh may ignore this.
    async fn invalidate(&self, _token: &str) {}
}

/// Wire-level access to the forum's content endpoints.
#[async_trait]
pub trait ForumApi: Send + Sync {
    /// Top-ranked submissions for `forum` within `bucket` ("day" or "week"),
    /// in upstream order with pinned submissions already discarded.
    async fn top_posts(&self, forum: &str, bucket: &str, limit: u32) -> PortResult<Vec<Post>>;

    /// Top-level comments of one submission, in upstream order.
    async fn top_comments(&self, forum: &str, post_id: &str, limit: u32)
        -> PortResult<Vec<Comment>>;
}

#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Retrieves a ranked, bounded snapshot of recent discussion in `forum`.
    async fn fetch_snapshot(
        &self,
        forum: &str,
        timeframe: Timeframe,
        limit: u32,
    ) -> PortResult<ForumSnapshot>;
}

/// Everything the generation collaborator needs for one call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub instructions: String,
    pub input: String,
    pub model: String,
    pub max_output_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOutput {
    pub text: String,
    pub total_tokens: Option<u32>,
    /// The model identifier echoed back by the provider.
    pub model: String,
}

#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Generates text for a grounded prompt.
    async fn generate(&self, request: GenerationRequest) -> PortResult<GenerationOutput>;
}
