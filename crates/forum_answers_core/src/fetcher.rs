//! crates/forum_answers_core/src/fetcher.rs
//!
//! Assembles a `ForumSnapshot` from the wire-level `ForumApi` port: clamps the
//! request, fetches comments for the leading posts, filters, and ranks.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{info, warn};

use crate::domain::{is_removed_body, Comment, ForumSnapshot, Post, Timeframe};
use crate::ports::{Clock, ForumApi, PortResult, SnapshotSource};
use crate::validation::validate_forum_name;

pub const MIN_POST_LIMIT: u32 = 1;
pub const MAX_POST_LIMIT: u32 = 100;
/// Comments are only fetched for this many leading posts.
pub const POSTS_WITH_COMMENTS: usize = 5;
pub const COMMENTS_PER_POST: u32 = 10;

pub struct ContentFetcher {
    api: Arc<dyn ForumApi>,
    clock: Arc<dyn Clock>,
}

impl ContentFetcher {
    pub fn new(api: Arc<dyn ForumApi>, clock: Arc<dyn Clock>) -> Self {
        Self { api, clock }
    }

    /// Fetches and filters comments for one post. Failures are logged and
    /// yield an empty list so a single post never fails the snapshot.
    async fn comments_for(&self, forum: &str, post: &Post) -> Vec<Comment> {
        match self.api.top_comments(forum, &post.id, COMMENTS_PER_POST).await {
            Ok(comments) => select_comments(comments, COMMENTS_PER_POST as usize),
            Err(e) => {
                warn!("Skipping comments for post {} in r/{}: {}", post.id, forum, e);
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl SnapshotSource for ContentFetcher {
    async fn fetch_snapshot(
        &self,
        forum: &str,
        timeframe: Timeframe,
        limit: u32,
    ) -> PortResult<ForumSnapshot> {
        validate_forum_name(forum)?;
        let limit = limit.clamp(MIN_POST_LIMIT, MAX_POST_LIMIT);
        let start = Instant::now();

        let fetched = self
            .api
            .top_posts(forum, timeframe.upstream_bucket(), limit)
            .await?;
        let mut posts = retain_posts(forum, fetched);

        let comment_batches = join_all(
            posts
                .iter()
                .take(POSTS_WITH_COMMENTS)
                .map(|post| self.comments_for(forum, post)),
        )
        .await;

        let mut comments: Vec<Comment> = comment_batches.into_iter().flatten().collect();
        // `sort_by` is stable, so upstream order survives on equal scores.
        posts.sort_by(|a, b| b.score.cmp(&a.score));
        comments.sort_by(|a, b| b.score.cmp(&a.score));

        info!(
            "Fetched r/{} ({}): {} posts, {} comments in {:?}",
            forum,
            timeframe.as_str(),
            posts.len(),
            comments.len(),
            start.elapsed()
        );

        Ok(ForumSnapshot {
            forum_name: forum.to_string(),
            posts,
            comments,
            fetched_at: self.clock.now(),
        })
    }
}

/// Drops posts with removed bodies or from a different forum, keeping upstream order.
fn retain_posts(forum: &str, posts: Vec<Post>) -> Vec<Post> {
    posts
        .into_iter()
        .filter(|post| {
            if !post.forum_name.eq_ignore_ascii_case(forum) {
                warn!(
                    "Dropping post {} from r/{} while fetching r/{}",
                    post.id, post.forum_name, forum
                );
                return false;
            }
            !is_removed_body(&post.body_text)
        })
        .collect()
}

/// Keeps comments with a live body and a positive score, then caps the list.
///
/// Filtering happens before the cap, so a low-scoring comment early in the
/// upstream order never crowds out a qualifying one further down.
pub fn select_comments(comments: Vec<Comment>, limit: usize) -> Vec<Comment> {
    comments
        .into_iter()
        .filter(|c| !c.body_text.trim().is_empty() && !is_removed_body(&c.body_text))
        .filter(|c| c.score > 0)
        .take(limit)
        .collect()
}
