//! services/api/src/adapters/answer_llm.rs
//!
//! This module contains the adapter for the answer-generating LLM.
//! It implements the `GenerationService` port from the `core` crate.

use async_openai::{
    config::OpenAIConfig,
    error::{ApiError, OpenAIError},
    types::responses::CreateResponseArgs,
    Client,
};
use async_trait::async_trait;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use forum_answers_core::ports::{
    GenerationOutput, GenerationRequest, GenerationService, PortError, PortResult,
};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `GenerationService` using the OpenAI Responses API.
#[derive(Clone)]
pub struct OpenAiAnswerAdapter {
    client: Client<OpenAIConfig>,
    timeout: Duration,
}

impl OpenAiAnswerAdapter {
    /// Creates a new `OpenAiAnswerAdapter`. Each call is abandoned after `timeout`.
    ///
    /// The client makes exactly one attempt per call; throttling and server
    /// errors are reported to the caller instead of being retried.
    pub fn new(config: OpenAIConfig, timeout: Duration) -> Self {
        let client = Client::with_config(config).with_backoff(single_attempt());
        Self { client, timeout }
    }
}

fn single_attempt() -> ExponentialBackoff {
    ExponentialBackoffBuilder::new()
        .with_max_elapsed_time(Some(Duration::ZERO))
        .build()
}

//=========================================================================================
// `GenerationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl GenerationService for OpenAiAnswerAdapter {
    async fn generate(&self, request: GenerationRequest) -> PortResult<GenerationOutput> {
        debug!(
            "Generating with {} ({} input chars)",
            request.model,
            request.input.chars().count()
        );

        let body = CreateResponseArgs::default()
            .model(&request.model)
            .instructions(request.instructions)
            .input(request.input)
            .max_output_tokens(request.max_output_tokens)
            .temperature(request.temperature)
            .build()
            .map_err(|e| PortError::Generation(e.to_string()))?;

        let start = Instant::now();
        let response = tokio::time::timeout(self.timeout, self.client.responses().create(body))
            .await
            .map_err(|_| {
                warn!("Generation with {} timed out", request.model);
                PortError::Generation(format!(
                    "generation timed out after {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(map_openai_error)?;
        debug!("Generation finished in {:?}", start.elapsed());

        let text = response.output_text().unwrap_or_default().trim().to_string();
        if text.is_empty() {
            return Err(PortError::Generation(
                "model returned an empty answer".to_string(),
            ));
        }

        Ok(GenerationOutput {
            text,
            total_tokens: response.usage.as_ref().map(|u| u.total_tokens),
            model: response.model,
        })
    }
}

//=========================================================================================
// Error Classification
//=========================================================================================

fn map_openai_error(error: OpenAIError) -> PortError {
    match error {
        OpenAIError::Reqwest(e) => match e.status().map(|s| s.as_u16()) {
            Some(429) => PortError::RateLimited(format!("provider throttled the request: {e}")),
            Some(401) | Some(403) => PortError::Auth(format!("provider rejected the API key: {e}")),
            _ => PortError::Generation(format!("provider request failed: {e}")),
        },
        OpenAIError::ApiError(api_error) if is_rate_limit_api_error(&api_error) => {
            PortError::RateLimited(api_error.message)
        }
        OpenAIError::ApiError(api_error) if is_auth_api_error(&api_error) => {
            PortError::Auth(api_error.message)
        }
        OpenAIError::ApiError(api_error) => PortError::Generation(api_error.message),
        other => PortError::Generation(other.to_string()),
    }
}

fn lowered(api_error: &ApiError) -> (String, String, String) {
    (
        api_error.message.to_lowercase(),
        api_error.r#type.clone().unwrap_or_default().to_lowercase(),
        api_error.code.clone().unwrap_or_default().to_lowercase(),
    )
}

fn is_rate_limit_api_error(api_error: &ApiError) -> bool {
    let (message, error_type, code) = lowered(api_error);
    message.contains("rate limit")
        || message.contains("too many requests")
        || error_type.contains("rate_limit")
        || error_type == "insufficient_quota"
        || code.contains("rate_limit")
        || code == "insufficient_quota"
}

fn is_auth_api_error(api_error: &ApiError) -> bool {
    let (message, error_type, code) = lowered(api_error);
    message.contains("incorrect api key")
        || message.contains("invalid api key")
        || message.contains("unauthorized")
        || code.contains("invalid_api_key")
        || error_type.contains("authentication")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::{
        matchers::{method, path},
        Mock, MockServer, ResponseTemplate,
    };

    fn api_error(message: &str, error_type: Option<&str>, code: Option<&str>) -> ApiError {
        ApiError {
            message: message.to_string(),
            r#type: error_type.map(str::to_string),
            param: None,
            code: code.map(str::to_string),
        }
    }

    fn request() -> GenerationRequest {
        GenerationRequest {
            instructions: "Answer from the discussion.".to_string(),
            input: "Forum: r/technology\n\nQUESTION:\nWhat is new?".to_string(),
            model: "gpt-4o-mini".to_string(),
            max_output_tokens: 1000,
            temperature: 0.7,
        }
    }

    fn adapter(server: &MockServer, timeout: Duration) -> OpenAiAnswerAdapter {
        let config = OpenAIConfig::new()
            .with_api_key("sk-test")
            .with_api_base(server.uri());
        OpenAiAnswerAdapter::new(config, timeout)
    }

    #[test]
    fn quota_and_rate_limit_errors_are_rate_limited() {
        let cases = [
            api_error("You exceeded your current quota", Some("insufficient_quota"), Some("insufficient_quota")),
            api_error("Rate limit reached for gpt-4o", Some("requests"), Some("rate_limit_exceeded")),
            api_error("Too many requests", None, None),
        ];
        for case in cases {
            assert!(matches!(
                map_openai_error(OpenAIError::ApiError(case)),
                PortError::RateLimited(_)
            ));
        }
    }

    #[test]
    fn bad_keys_are_auth_errors() {
        let err = map_openai_error(OpenAIError::ApiError(api_error(
            "Incorrect API key provided: sk-test",
            Some("invalid_request_error"),
            Some("invalid_api_key"),
        )));
        assert!(matches!(err, PortError::Auth(_)));
    }

    #[test]
    fn other_api_errors_are_generation_failures() {
        let err = map_openai_error(OpenAIError::ApiError(api_error(
            "The model `gpt-9` does not exist",
            Some("invalid_request_error"),
            Some("model_not_found"),
        )));
        assert_eq!(
            err,
            PortError::Generation("The model `gpt-9` does not exist".to_string())
        );

        let err = map_openai_error(OpenAIError::InvalidArgument("bad".to_string()));
        assert!(matches!(err, PortError::Generation(_)));
    }

    #[tokio::test]
    async fn rejected_key_from_provider_maps_to_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/responses"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": {
                    "message": "Incorrect API key provided: sk-test.",
                    "type": "invalid_request_error",
                    "param": null,
                    "code": "invalid_api_key"
                }
            })))
            .mount(&server)
            .await;

        let err = adapter(&server, Duration::from_secs(5))
            .generate(request())
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::Auth(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn exhausted_quota_maps_to_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/responses"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "error": {
                    "message": "You exceeded your current quota.",
                    "type": "insufficient_quota",
                    "param": null,
                    "code": "insufficient_quota"
                }
            })))
            .mount(&server)
            .await;

        let err = adapter(&server, Duration::from_secs(5))
            .generate(request())
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::RateLimited(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn throttled_request_is_rate_limited_without_retrying() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/responses"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "error": {
                    "message": "Rate limit reached for gpt-4o-mini on requests per min.",
                    "type": "requests",
                    "param": null,
                    "code": "rate_limit_exceeded"
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = adapter(&server, Duration::from_secs(3))
            .generate(request())
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::RateLimited(_)), "got {err:?}");
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn server_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/responses"))
            .respond_with(ResponseTemplate::new(503).set_body_json(json!({
                "error": {
                    "message": "The server is overloaded.",
                    "type": "server_error",
                    "param": null,
                    "code": null
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = adapter(&server, Duration::from_secs(3))
            .generate(request())
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::Generation(_)), "got {err:?}");
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn slow_provider_times_out_as_generation_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let err = adapter(&server, Duration::from_millis(50))
            .generate(request())
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::Generation(ref m) if m.contains("timed out")));
    }
}
