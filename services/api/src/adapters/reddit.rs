//! services/api/src/adapters/reddit.rs
//!
//! This module contains the adapter for the forum's authenticated content API.
//! It implements the `ForumApi` port from the `core` crate.

use crate::adapters::listing::{decode_comments, decode_posts};
use async_trait::async_trait;
use forum_answers_core::{
    domain::{Comment, Post},
    ports::{ForumApi, PortError, PortResult, TokenProvider},
};
use reqwest::{header::USER_AGENT, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `ForumApi` against the forum's OAuth API host.
#[derive(Clone)]
pub struct RedditApiAdapter {
    http: reqwest::Client,
    api_base: String,
    user_agent: String,
    tokens: Arc<dyn TokenProvider>,
}

impl RedditApiAdapter {
    /// Creates a new `RedditApiAdapter`. `http` should carry the per-call timeout.
    pub fn new(
        http: reqwest::Client,
        api_base: impl Into<String>,
        user_agent: impl Into<String>,
        tokens: Arc<dyn TokenProvider>,
    ) -> Self {
        Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            user_agent: user_agent.into(),
            tokens,
        }
    }

    /// Performs an authenticated GET and maps failure statuses onto the port taxonomy.
    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> PortResult<Value> {
        let token = self.tokens.get_token().await?;
        let url = format!("{}{}", self.api_base, path);
        debug!("GET {}", url);

        let response = self
            .http
            .get(&url)
            .bearer_auth(&token)
            .header(USER_AGENT, &self.user_agent)
            .query(query)
            .send()
            .await
            .map_err(|e| {
                let reason = if e.is_timeout() { "timed out" } else { "failed" };
                PortError::upstream(None, format!("request to {path} {reason}: {e}"))
            })?;

        let status = response.status();
        match status {
            StatusCode::NOT_FOUND => {
                return Err(PortError::NotFound("forum does not exist".to_string()))
            }
            StatusCode::FORBIDDEN => {
                return Err(PortError::Forbidden(
                    "forum is private or banned".to_string(),
                ))
            }
            StatusCode::UNAUTHORIZED => {
                self.tokens.invalidate(&token).await;
                return Err(PortError::Auth(
                    "forum API rejected the bearer token".to_string(),
                ));
            }
            s if !s.is_success() => {
                error!("Forum API returned {} for {}", s, path);
                return Err(PortError::upstream(
                    Some(s.as_u16()),
                    s.canonical_reason().unwrap_or("unexpected status"),
                ));
            }
            _ => {}
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| PortError::upstream(None, format!("unreadable response from {path}: {e}")))
    }
}

//=========================================================================================
// `ForumApi` Trait Implementation
//=========================================================================================

#[async_trait]
impl ForumApi for RedditApiAdapter {
    async fn top_posts(&self, forum: &str, bucket: &str, limit: u32) -> PortResult<Vec<Post>> {
        let body = self
            .get_json(
                &format!("/r/{forum}/top"),
                &[
                    ("t", bucket.to_string()),
                    ("limit", limit.to_string()),
                    ("raw_json", "1".to_string()),
                ],
            )
            .await?;
        decode_posts(body, forum)
    }

    async fn top_comments(
        &self,
        forum: &str,
        post_id: &str,
        limit: u32,
    ) -> PortResult<Vec<Comment>> {
        if post_id.is_empty() || !post_id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(PortError::upstream(
                None,
                format!("unexpected submission id '{post_id}'"),
            ));
        }

        let body = self
            .get_json(
                &format!("/r/{forum}/comments/{post_id}"),
                &[
                    ("limit", limit.to_string()),
                    ("sort", "top".to_string()),
                    ("depth", "2".to_string()),
                    ("raw_json", "1".to_string()),
                ],
            )
            .await?;
        decode_comments(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::{
        matchers::{header, method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    struct StaticToken;

    #[async_trait]
    impl TokenProvider for StaticToken {
        async fn get_token(&self) -> PortResult<String> {
            Ok("test-token".to_string())
        }
    }

    struct BrokenToken;

    #[async_trait]
    impl TokenProvider for BrokenToken {
        async fn get_token(&self) -> PortResult<String> {
            Err(PortError::Auth("token endpoint returned 401".to_string()))
        }
    }

    /// Remembers which tokens the adapter reported as rejected.
    #[derive(Default)]
    struct RecordingToken {
        invalidated: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TokenProvider for RecordingToken {
        async fn get_token(&self) -> PortResult<String> {
            Ok("test-token".to_string())
        }

        async fn invalidate(&self, token: &str) {
            self.invalidated.lock().unwrap().push(token.to_string());
        }
    }

    fn adapter(server: &MockServer) -> RedditApiAdapter {
        RedditApiAdapter::new(
            reqwest::Client::new(),
            server.uri(),
            "forum-answers-test/0.1",
            Arc::new(StaticToken),
        )
    }

    fn submissions() -> Value {
        json!({
            "kind": "Listing",
            "data": { "children": [
                { "kind": "t3", "data": { "id": "abc", "title": "Hello", "score": 3, "subreddit": "technology" } }
            ] }
        })
    }

    #[tokio::test]
    async fn top_posts_sends_bearer_token_user_agent_and_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/r/technology/top"))
            .and(header("authorization", "Bearer test-token"))
            .and(header("user-agent", "forum-answers-test/0.1"))
            .and(query_param("t", "week"))
            .and(query_param("limit", "25"))
            .respond_with(ResponseTemplate::new(200).set_body_json(submissions()))
            .expect(1)
            .mount(&server)
            .await;

        let posts = adapter(&server).top_posts("technology", "week", 25).await.unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].id, "abc");
    }

    #[tokio::test]
    async fn status_codes_map_to_port_errors() {
        let cases = [
            (404, "not_found"),
            (403, "forbidden"),
            (401, "auth"),
            (500, "upstream"),
            (429, "upstream"),
        ];
        for (status, category) in cases {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .respond_with(ResponseTemplate::new(status))
                .mount(&server)
                .await;

            let err = adapter(&server)
                .top_posts("technology", "day", 25)
                .await
                .unwrap_err();
            assert_eq!(err.category().as_str(), category, "status {status}");
        }
    }

    #[tokio::test]
    async fn upstream_errors_carry_status_and_reason() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = adapter(&server)
            .top_posts("technology", "day", 25)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            PortError::upstream(Some(503), "Service Unavailable")
        );
    }

    #[tokio::test]
    async fn token_failures_stop_before_any_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(submissions()))
            .expect(0)
            .mount(&server)
            .await;

        let adapter = RedditApiAdapter::new(
            reqwest::Client::new(),
            server.uri(),
            "forum-answers-test/0.1",
            Arc::new(BrokenToken),
        );
        let err = adapter.top_posts("technology", "day", 25).await.unwrap_err();
        assert!(matches!(err, PortError::Auth(_)));
    }

    #[tokio::test]
    async fn rejected_bearer_token_is_invalidated() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let tokens = Arc::new(RecordingToken::default());
        let adapter = RedditApiAdapter::new(
            reqwest::Client::new(),
            server.uri(),
            "forum-answers-test/0.1",
            tokens.clone(),
        );
        let err = adapter.top_posts("technology", "day", 25).await.unwrap_err();
        assert!(matches!(err, PortError::Auth(_)));
        assert_eq!(*tokens.invalidated.lock().unwrap(), vec!["test-token".to_string()]);
    }

    #[tokio::test]
    async fn other_failures_keep_the_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let tokens = Arc::new(RecordingToken::default());
        let adapter = RedditApiAdapter::new(reqwest::Client::new(), server.uri(), "ua", tokens.clone());
        adapter.top_posts("technology", "day", 25).await.unwrap_err();
        assert!(tokens.invalidated.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn top_comments_requests_top_sorted_depth_two() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/r/technology/comments/abc"))
            .and(query_param("sort", "top"))
            .and(query_param("depth", "2"))
            .and(query_param("limit", "10"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                submissions(),
                { "kind": "Listing", "data": { "children": [
                    { "kind": "t1", "data": { "id": "c1", "body": "Nice", "score": 4, "replies": "" } }
                ] } }
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let comments = adapter(&server)
            .top_comments("technology", "abc", 10)
            .await
            .unwrap();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].body_text, "Nice");
    }

    #[tokio::test]
    async fn suspicious_submission_ids_are_refused() {
        let server = MockServer::start().await;
        let err = adapter(&server)
            .top_comments("technology", "../../api", 10)
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::Upstream { .. }));
    }

    #[tokio::test]
    async fn slow_upstream_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(submissions())
                    .set_delay(std::time::Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(50))
            .build()
            .unwrap();
        let adapter = RedditApiAdapter::new(http, server.uri(), "ua", Arc::new(StaticToken));
        let err = adapter.top_posts("technology", "day", 25).await.unwrap_err();
        assert!(matches!(err, PortError::Upstream { status: None, ref message } if message.contains("timed out")));
    }
}
