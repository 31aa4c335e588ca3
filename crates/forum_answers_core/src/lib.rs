pub mod domain;
pub mod fetcher;
pub mod normalizer;
pub mod orchestrator;
pub mod ports;
pub mod validation;

pub use domain::{
    Comment, Credential, ForumSnapshot, GenerationResult, Post, PromptPayload, SourceKind,
    SourceRef, Timeframe,
};
pub use fetcher::ContentFetcher;
pub use normalizer::{ContentNormalizer, NormalizerLimits};
pub use orchestrator::{OrchestratorSettings, QueryOrchestrator};
pub use ports::{
    Clock, ErrorCategory, ForumApi, GenerationOutput, GenerationRequest, GenerationService,
    PortError, PortResult, SnapshotSource, SystemClock, TokenProvider,
};
