pub mod answer_llm;
pub mod listing;
pub mod reddit;
pub mod token_cache;

pub use answer_llm::OpenAiAnswerAdapter;
pub use reddit::RedditApiAdapter;
pub use token_cache::{ClientCredentials, TokenCache};
