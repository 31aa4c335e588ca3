//! crates/forum_answers_core/src/orchestrator.rs
//!
//! The single entry point the web layer calls to answer a question about a
//! forum. It is a fail-fast pipeline: validate, fetch, normalize, generate.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::domain::{GenerationResult, PromptPayload, SourceKind, SourceRef, Timeframe};
use crate::normalizer::ContentNormalizer;
use crate::ports::{GenerationRequest, GenerationService, PortError, PortResult, SnapshotSource};
use crate::validation::{validate_forum_name, validate_model, validate_question};

pub const SYSTEM_INSTRUCTIONS: &str = r#"You answer questions about what a community forum has been discussing recently.

You receive the forum name, the user's QUESTION, and RECENT DISCUSSION made of the forum's top posts followed by its top comments. Each block starts with its score.

Rules:
- Synthesize an answer from the RECENT DISCUSSION. Do not invent facts, quotes, or opinions that are not supported by it.
- When posts or comments disagree, present the different viewpoints and say roughly how much support each one has.
- Higher-scored content reflects broader agreement in the community; weigh it accordingly.
- If the discussion does not contain enough information to answer the question, say so explicitly instead of guessing.
- Placeholders such as [link], [forum] and [user] stand for removed URLs and mentions; do not try to reconstruct them.
- Keep the answer focused and readable: a short summary first, then supporting points."#;

/// Fixed knobs of the answering pipeline.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Allowed model identifiers. The first entry is the default.
    pub allowed_models: Vec<String>,
    pub timeframe: Timeframe,
    pub post_limit: u32,
    /// Prompts with less grounding text than this are refused.
    pub min_prompt_chars: usize,
    pub max_output_tokens: u32,
    pub temperature: f32,
    /// Reported until a real confidence estimate exists.
    pub confidence_score: f64,
    /// Base of the forum's public web pages, e.g. `https://www.reddit.com`.
    pub forum_web_base: String,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            allowed_models: vec!["gpt-4o-mini".to_string(), "gpt-4o".to_string()],
            timeframe: Timeframe::Day,
            post_limit: 25,
            min_prompt_chars: 100,
            max_output_tokens: 1000,
            temperature: 0.7,
            confidence_score: 0.8,
            forum_web_base: "https://www.reddit.com".to_string(),
        }
    }
}

pub struct QueryOrchestrator {
    snapshots: Arc<dyn SnapshotSource>,
    generator: Arc<dyn GenerationService>,
    normalizer: ContentNormalizer,
    settings: OrchestratorSettings,
}

impl QueryOrchestrator {
    pub fn new(
        snapshots: Arc<dyn SnapshotSource>,
        generator: Arc<dyn GenerationService>,
        normalizer: ContentNormalizer,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            snapshots,
            generator,
            normalizer,
            settings,
        }
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// The model used when the caller does not pick one.
    pub fn default_model(&self) -> Option<&str> {
        self.settings.allowed_models.first().map(String::as_str)
    }

    /// Answers `question` using recent discussion in `forum`.
    ///
    /// `model` must be one of the allow-listed identifiers. The call gives up
    /// with [`PortError::Cancelled`] as soon as `cancel` fires.
    pub async fn answer(
        &self,
        forum: &str,
        question: &str,
        model: &str,
        cancel: &CancellationToken,
    ) -> PortResult<GenerationResult> {
        let start = Instant::now();

        // --- 1. Validate before touching the network ---
        validate_forum_name(forum)?;
        let question = validate_question(question)?;
        let model = validate_model(model, &self.settings.allowed_models)?;

        // --- 2. Acquire the snapshot ---
        let snapshot = until_cancelled(
            cancel,
            self.snapshots
                .fetch_snapshot(forum, self.settings.timeframe, self.settings.post_limit),
        )
        .await?;

        if snapshot.posts.is_empty() {
            return Err(PortError::InsufficientContent(
                "no recent content for this forum".to_string(),
            ));
        }

        // --- 3. Normalize ---
        let content = self
            .normalizer
            .build_prompt_text(&snapshot.posts, &snapshot.comments);
        if content.chars().count() < self.settings.min_prompt_chars {
            return Err(PortError::InsufficientContent(
                "content too sparse to ground an answer".to_string(),
            ));
        }

        let payload = PromptPayload {
            forum_name: snapshot.forum_name,
            question: question.to_string(),
            content,
        };

        // --- 4. Generate ---
        let request = GenerationRequest {
            instructions: SYSTEM_INSTRUCTIONS.to_string(),
            input: payload.render_input(),
            model: model.to_string(),
            max_output_tokens: self.settings.max_output_tokens,
            temperature: self.settings.temperature,
        };
        let output = until_cancelled(cancel, self.generator.generate(request))
            .await
            .map_err(|e| {
                let mapped = generation_failure(e);
                error!("Generation for r/{} failed: {}", forum, mapped);
                mapped
            })?;

        info!(
            "Answered question for r/{} with {} in {:?}",
            forum,
            output.model,
            start.elapsed()
        );

        Ok(GenerationResult {
            answer_text: output.text,
            sources: vec![self.forum_source(&payload.forum_name)],
            confidence_score: self.settings.confidence_score,
            model: output.model,
            tokens_used: output.total_tokens,
        })
    }

    fn forum_source(&self, forum: &str) -> SourceRef {
        SourceRef {
            title: format!("r/{forum}"),
            url: format!("{}/r/{forum}", self.settings.forum_web_base.trim_end_matches('/')),
            kind: SourceKind::Forum,
        }
    }
}

/// Keeps rate-limit, auth and cancellation failures; everything else from the
/// generation collaborator is a generation failure.
fn generation_failure(err: PortError) -> PortError {
    match err {
        PortError::RateLimited(_)
        | PortError::Auth(_)
        | PortError::Cancelled(_)
        | PortError::Generation(_) => err,
        other => PortError::Generation(other.to_string()),
    }
}

async fn until_cancelled<T>(
    cancel: &CancellationToken,
    work: impl Future<Output = PortResult<T>>,
) -> PortResult<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(PortError::Cancelled(
            "request was cancelled before it completed".to_string(),
        )),
        result = work => result,
    }
}
