//! crates/forum_answers_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! Everything here lives for the duration of a single request, with the
//! exception of `Credential`, which is owned by the token cache.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Author recorded when the upstream omits one or reports an account as gone.
pub const DELETED_AUTHOR: &str = "[deleted]";

/// Body markers the forum substitutes for content that is no longer available.
pub const REMOVED_BODY_MARKERS: [&str; 2] = ["[deleted]", "[removed]"];

/// Returns true when a body is one of the deleted/removed sentinels.
pub fn is_removed_body(body: &str) -> bool {
    let trimmed = body.trim();
    REMOVED_BODY_MARKERS.iter().any(|marker| trimmed == *marker)
}

//=========================================================================================
// Credentials
//=========================================================================================

/// A bearer credential issued by the forum's OAuth2 token endpoint.
#[derive(Debug, Clone)]
pub struct Credential {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    /// Upstream tokens live for 60 minutes; we stop using them 10 minutes early.
    pub const VALIDITY_MINUTES: i64 = 50;

    /// Creates a credential valid for [`Self::VALIDITY_MINUTES`] from `issued_at`.
    pub fn issued(token: impl Into<String>, issued_at: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            expires_at: issued_at + Duration::minutes(Self::VALIDITY_MINUTES),
        }
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

//=========================================================================================
// Forum Content
//=========================================================================================

/// The time window used when ranking submissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Timeframe {
    #[default]
    #[serde(rename = "24h")]
    Day,
    #[serde(rename = "48h")]
    TwoDays,
    #[serde(rename = "week")]
    Week,
}

impl Timeframe {
    /// Parses a caller-supplied window. Unknown values fall back to the last 24 hours.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "48h" => Self::TwoDays,
            "week" => Self::Week,
            _ => Self::Day,
        }
    }

    /// The upstream only knows day/week buckets, so 48h widens to "day".
    pub fn upstream_bucket(self) -> &'static str {
        match self {
            Self::Day | Self::TwoDays => "day",
            Self::Week => "week",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Day => "24h",
            Self::TwoDays => "48h",
            Self::Week => "week",
        }
    }
}

/// A top-level submission within a forum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub title: String,
    pub body_text: String,
    pub author: String,
    pub score: i64,
    pub comment_count: u64,
    /// Unix seconds.
    pub created_utc: i64,
    pub url: String,
    pub forum_name: String,
    pub permalink: String,
    pub upvote_ratio: f64,
}

/// A comment on a submission. Replies are capped at 3 per level when decoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub body_text: String,
    pub author: String,
    pub score: i64,
    /// Unix seconds.
    pub created_utc: i64,
    pub depth: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub replies: Vec<Comment>,
}

impl Comment {
    /// Maximum number of replies kept per nesting level.
    pub const MAX_REPLIES_PER_LEVEL: usize = 3;
}

/// The bounded set of posts and comments retrieved for one question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForumSnapshot {
    pub forum_name: String,
    /// Score-descending.
    pub posts: Vec<Post>,
    /// Score-descending, across all fetched posts.
    pub comments: Vec<Comment>,
    pub fetched_at: DateTime<Utc>,
}

//=========================================================================================
// Generation
//=========================================================================================

/// The grounded prompt handed to the generation collaborator.
#[derive(Debug, Clone)]
pub struct PromptPayload {
    pub forum_name: String,
    pub question: String,
    pub content: String,
}

impl PromptPayload {
    /// Renders the user-facing half of the prompt.
    pub fn render_input(&self) -> String {
        format!(
            "FORUM: r/{}\n\nQUESTION:\n{}\n\nRECENT DISCUSSION:\n---\n{}\n---",
            self.forum_name, self.question, self.content
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Forum,
    Post,
    Comment,
}

/// A reference to the material an answer was grounded on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    pub title: String,
    pub url: String,
    pub kind: SourceKind,
}

/// The answer returned to the caller. Kept small so clients can store it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub answer_text: String,
    pub sources: Vec<SourceRef>,
    pub confidence_score: f64,
    pub model: String,
    pub tokens_used: Option<u32>,
}
