//! services/api/src/web/protocol.rs
//!
//! Defines the JSON payloads exchanged between the browser client and the API
//! server, including the uniform success/error envelope.

use chrono::{DateTime, Utc};
use forum_answers_core::domain::{
    Comment, ForumSnapshot, GenerationResult, Post, SourceKind, SourceRef,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

//=========================================================================================
// Envelope
//=========================================================================================

/// Wraps every successful response: `{"success": true, "data": ...}`.
#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: T,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// The error half of the envelope: `{"success": false, "error": {...}}`.
#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct ErrorEnvelope {
    pub success: bool,
    pub error: ErrorBody,
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct ErrorBody {
    /// Stable category name, e.g. `validation` or `rate_limited`.
    pub category: String,
    pub message: String,
    /// Whether the same request may succeed later.
    pub retryable: bool,
}

impl ErrorEnvelope {
    pub fn new(category: &str, message: String, retryable: bool) -> Self {
        Self {
            success: false,
            error: ErrorBody {
                category: category.to_string(),
                message,
                retryable,
            },
        }
    }
}

//=========================================================================================
// Requests
//=========================================================================================

/// Body of `POST /answer`.
#[derive(Deserialize, Debug, ToSchema)]
pub struct AnswerRequest {
    /// Forum name without the `r/` prefix.
    pub forum: String,
    pub question: String,
    /// One of the allow-listed models; the default is used when omitted.
    #[serde(default)]
    pub model: Option<String>,
}

/// Query string of `GET /forums/{forum}/snapshot`.
#[derive(Deserialize, Debug, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SnapshotParams {
    /// `24h`, `48h` or `week`. Anything else means `24h`.
    pub timeframe: Option<String>,
    /// Number of posts. Out-of-range values are clamped to 1..=100. Defaults to 25.
    pub limit: Option<String>,
}

//=========================================================================================
// Responses
//=========================================================================================

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct ModelsResponse {
    pub models: Vec<String>,
    pub default: String,
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct SourceDto {
    pub title: String,
    pub url: String,
    /// `forum`, `post` or `comment`.
    pub kind: String,
}

impl From<SourceRef> for SourceDto {
    fn from(source: SourceRef) -> Self {
        let kind = match source.kind {
            SourceKind::Forum => "forum",
            SourceKind::Post => "post",
            SourceKind::Comment => "comment",
        };
        Self {
            title: source.title,
            url: source.url,
            kind: kind.to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct AnswerResponse {
    pub answer_text: String,
    pub sources: Vec<SourceDto>,
    pub confidence_score: f64,
    pub model: String,
    pub tokens_used: Option<u32>,
}

impl From<GenerationResult> for AnswerResponse {
    fn from(result: GenerationResult) -> Self {
        Self {
            answer_text: result.answer_text,
            sources: result.sources.into_iter().map(SourceDto::from).collect(),
            confidence_score: result.confidence_score,
            model: result.model,
            tokens_used: result.tokens_used,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct PostDto {
    pub id: String,
    pub title: String,
    pub body_text: String,
    pub author: String,
    pub score: i64,
    pub comment_count: u64,
    pub created_utc: i64,
    pub url: String,
    pub forum_name: String,
    pub permalink: String,
    pub upvote_ratio: f64,
}

impl From<Post> for PostDto {
    fn from(post: Post) -> Self {
        Self {
            id: post.id,
            title: post.title,
            body_text: post.body_text,
            author: post.author,
            score: post.score,
            comment_count: post.comment_count,
            created_utc: post.created_utc,
            url: post.url,
            forum_name: post.forum_name,
            permalink: post.permalink,
            upvote_ratio: post.upvote_ratio,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct CommentDto {
    pub id: String,
    pub body_text: String,
    pub author: String,
    pub score: i64,
    pub created_utc: i64,
    pub depth: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[schema(value_type = Vec<Object>)]
    pub replies: Vec<CommentDto>,
}

impl From<Comment> for CommentDto {
    fn from(comment: Comment) -> Self {
        Self {
            id: comment.id,
            body_text: comment.body_text,
            author: comment.author,
            score: comment.score,
            created_utc: comment.created_utc,
            depth: comment.depth,
            replies: comment.replies.into_iter().map(CommentDto::from).collect(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct SnapshotResponse {
    pub forum_name: String,
    pub timeframe: String,
    pub posts: Vec<PostDto>,
    pub comments: Vec<CommentDto>,
    pub fetched_at: DateTime<Utc>,
}

impl SnapshotResponse {
    pub fn new(snapshot: ForumSnapshot, timeframe: &str) -> Self {
        Self {
            forum_name: snapshot.forum_name,
            timeframe: timeframe.to_string(),
            posts: snapshot.posts.into_iter().map(PostDto::from).collect(),
            comments: snapshot.comments.into_iter().map(CommentDto::from).collect(),
            fetched_at: snapshot.fetched_at,
        }
    }
}
