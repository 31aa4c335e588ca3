//! crates/forum_answers_core/src/normalizer.rs
//!
//! Turns fetched posts and comments into the bounded text block that grounds
//! the generation prompt. Everything here is pure and synchronous.

use std::sync::LazyLock;

use regex::Regex;

use crate::domain::{Comment, Post};

/// Separates individual post or comment blocks.
pub const BLOCK_SEPARATOR: &str = "\n\n---\n\n";
/// Separates the post group from the comment group.
pub const POSTS_END_MARKER: &str = "\n\n=== END OF POSTS / TOP COMMENTS ===\n\n";

pub const URL_PLACEHOLDER: &str = "[link]";
pub const FORUM_PLACEHOLDER: &str = "[forum]";
pub const USER_PLACEHOLDER: &str = "[user]";

static BOLD: LazyLock<Regex> = LazyLock::new(|| compile(r"\*\*(.+?)\*\*"));
static ITALIC: LazyLock<Regex> = LazyLock::new(|| compile(r"\*(.+?)\*"));
static STRIKETHROUGH: LazyLock<Regex> = LazyLock::new(|| compile(r"~~(.+?)~~"));
static CODE_SPAN: LazyLock<Regex> = LazyLock::new(|| compile(r"`([^`]+)`"));
static URL: LazyLock<Regex> = LazyLock::new(|| compile(r"https?://\S+"));
static FORUM_MENTION: LazyLock<Regex> = LazyLock::new(|| compile(r"/?\br/[A-Za-z0-9_]+"));
static USER_MENTION: LazyLock<Regex> = LazyLock::new(|| compile(r"/?\bu/[A-Za-z0-9_-]+"));
static HORIZONTAL_SPACE: LazyLock<Regex> = LazyLock::new(|| compile(r"[^\S\n]+"));
static SPACE_AROUND_NEWLINE: LazyLock<Regex> = LazyLock::new(|| compile(r" ?\n ?"));
static EXCESS_NEWLINES: LazyLock<Regex> = LazyLock::new(|| compile(r"\n{3,}"));

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("normalizer patterns are valid")
}

/// Selection and size limits applied while building the prompt text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizerLimits {
    /// Posts must have strictly more body characters than this.
    pub min_post_body_chars: usize,
    pub max_posts: usize,
    pub max_post_body_chars: usize,
    /// Comments must have strictly more body characters than this.
    pub min_comment_body_chars: usize,
    pub max_comments: usize,
    pub max_comment_body_chars: usize,
    pub max_total_chars: usize,
}

impl Default for NormalizerLimits {
    fn default() -> Self {
        Self {
            min_post_body_chars: 50,
            max_posts: 10,
            max_post_body_chars: 1500,
            min_comment_body_chars: 30,
            max_comments: 15,
            max_comment_body_chars: 600,
            max_total_chars: 12_000,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ContentNormalizer {
    limits: NormalizerLimits,
}

impl ContentNormalizer {
    pub fn new(limits: NormalizerLimits) -> Self {
        Self { limits }
    }

    /// Builds the grounding text from already score-sorted posts and comments.
    ///
    /// Returns an empty string when nothing qualifies; callers must treat that
    /// as insufficient content rather than prompting with an empty payload.
    pub fn build_prompt_text(&self, posts: &[Post], comments: &[Comment]) -> String {
        let limits = &self.limits;

        let post_blocks: Vec<String> = posts
            .iter()
            .filter(|post| post.body_text.chars().count() > limits.min_post_body_chars)
            .take(limits.max_posts)
            .map(|post| {
                let body = truncate_chars(&clean_text(&post.body_text), limits.max_post_body_chars);
                format!("[Post | score {}] {}\n{}", post.score, post.title.trim(), body)
            })
            .collect();

        let comment_blocks: Vec<String> = comments
            .iter()
            .filter(|comment| {
                comment.score > 0
                    && comment.body_text.chars().count() > limits.min_comment_body_chars
            })
            .take(limits.max_comments)
            .map(|comment| {
                let body =
                    truncate_chars(&clean_text(&comment.body_text), limits.max_comment_body_chars);
                format!("[Comment | score {}]\n{}", comment.score, body)
            })
            .collect();

        let mut budget = limits.max_total_chars;
        let posts_text = join_within_budget(&post_blocks, &mut budget);
        if !posts_text.is_empty() {
            budget = budget.saturating_sub(POSTS_END_MARKER.chars().count());
        }
        let comments_text = join_within_budget(&comment_blocks, &mut budget);

        match (posts_text.is_empty(), comments_text.is_empty()) {
            (true, true) => String::new(),
            (false, true) => posts_text,
            (true, false) => comments_text,
            (false, false) => format!("{posts_text}{POSTS_END_MARKER}{comments_text}"),
        }
    }
}

/// Strips markdown emphasis, masks links and mentions, and normalizes whitespace.
pub fn clean_text(text: &str) -> String {
    let text = BOLD.replace_all(text, "${1}");
    let text = ITALIC.replace_all(&text, "${1}");
    let text = STRIKETHROUGH.replace_all(&text, "${1}");
    let text = CODE_SPAN.replace_all(&text, "${1}");
    let text = URL.replace_all(&text, URL_PLACEHOLDER);
    let text = FORUM_MENTION.replace_all(&text, FORUM_PLACEHOLDER);
    let text = USER_MENTION.replace_all(&text, USER_PLACEHOLDER);
    let text = HORIZONTAL_SPACE.replace_all(&text, " ");
    let text = SPACE_AROUND_NEWLINE.replace_all(&text, "\n");
    let text = EXCESS_NEWLINES.replace_all(&text, "\n\n");
    text.trim().to_string()
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}...", cut.trim_end())
}

/// Joins blocks with [`BLOCK_SEPARATOR`], dropping trailing blocks that would
/// overrun `budget` (counted in characters). The budget is decremented in place.
fn join_within_budget(blocks: &[String], budget: &mut usize) -> String {
    let separator_len = BLOCK_SEPARATOR.chars().count();
    let mut kept: Vec<&str> = Vec::new();
    for block in blocks {
        let cost = block.chars().count() + if kept.is_empty() { 0 } else { separator_len };
        if cost > *budget {
            break;
        }
        *budget -= cost;
        kept.push(block);
    }
    kept.join(BLOCK_SEPARATOR)
}
