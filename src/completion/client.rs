//! Cortex completion client
//!
//! Submits a prompt to a hosted model and returns the whole answer text.
//! - Endpoint: POST /api/v2/cortex/inference:complete
//! - Streamed (`text/event-stream`) and plain JSON responses are both accepted

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::completion::parser::{delta_text, EventStreamParser, StreamEvent};
use crate::errors::{RagError, Result};
use crate::session::Session;

/// Completion endpoint path
pub const COMPLETE_PATH: &str = "/api/v2/cortex/inference:complete";

/// A hosted text completion service
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, model: &str, prompt: &str) -> Result<String>;
}

/// HTTP client for Cortex completions
#[derive(Clone)]
pub struct CortexCompleteClient {
    session: Session,
}

impl CortexCompleteClient {
    pub fn new(session: Session) -> Self {
        Self { session }
    }
}

#[async_trait]
impl CompletionService for CortexCompleteClient {
    async fn complete(&self, model: &str, prompt: &str) -> Result<String> {
        let request = CompleteRequest {
            model,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
            stream: true,
        };

        debug!(model, prompt_chars = prompt.len(), "cortex complete");

        let response = self
            .session
            .post(COMPLETE_PATH)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RagError::CompletionError {
                status: status.as_u16(),
                message: error_text,
            });
        }

        let is_event_stream = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map_or(false, |v| v.starts_with("text/event-stream"));

        if !is_event_stream {
            let body: CompleteResponse = response.json().await?;
            return body
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message)
                .map(|m| m.content)
                .ok_or_else(|| RagError::CompletionError {
                    status: 200,
                    message: "response carried no choices".to_string(),
                });
        }

        let status = response.status().as_u16();
        let mut parser = EventStreamParser::new();
        let mut answer = String::new();
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            for event in parser.add_bytes(&chunk?)? {
                append_event(&mut answer, &event, status)?;
            }
        }
        if let Some(event) = parser.finish() {
            append_event(&mut answer, &event, status)?;
        }

        debug!(answer_chars = answer.len(), "cortex complete done");
        Ok(answer)
    }
}

/// Append one streamed fragment; an error frame aborts the answer
fn append_event(answer: &mut String, event: &StreamEvent, status: u16) -> Result<()> {
    if let Some(message) = event.error_message() {
        warn!(%message, partial_chars = answer.len(), "completion stream reported an error");
        return Err(RagError::CompletionError { status, message });
    }
    if let Some(text) = delta_text(&event.data)? {
        answer.push_str(&text);
    }
    Ok(())
}

/// Completion request body
#[derive(Debug, Serialize)]
struct CompleteRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

/// Non-streamed completion response
#[derive(Debug, Deserialize)]
struct CompleteResponse {
    #[serde(default)]
    choices: Vec<ResponseChoice>,
}

#[derive(Debug, Deserialize)]
struct ResponseChoice {
    #[serde(default)]
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::config::ConnectionConfig;
    use crate::session::credentials::tests::sample_credentials;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> CortexCompleteClient {
        let mut credentials = sample_credentials();
        credentials.pat = Some("pat".to_string());
        let config = ConnectionConfig {
            base_url: Some(server.uri()),
            request_timeout_secs: 5,
        };
        CortexCompleteClient::new(Session::connect(&credentials, &config).await.unwrap())
    }

    #[tokio::test]
    async fn test_streamed_answer_is_concatenated() {
        let server = MockServer::start().await;
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"X is \"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"a widget.\"}}]}\n\n",
            "data: [DONE]\n\n",
        );
        Mock::given(method("POST"))
            .and(path(COMPLETE_PATH))
            .and(body_partial_json(json!({
                "model": "mistral-large2",
                "messages": [{ "role": "user", "content": "prompt text" }],
                "stream": true
            })))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let answer = client.complete("mistral-large2", "prompt text").await.unwrap();
        assert_eq!(answer, "X is a widget.");
    }

    #[tokio::test]
    async fn test_error_frame_mid_stream_fails_the_completion() {
        let server = MockServer::start().await;
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"X is \"}}]}\n\n",
            "event: error\n",
            "data: {\"code\":\"390\",\"message\":\"model overloaded\"}\n\n",
        );
        Mock::given(method("POST"))
            .and(path(COMPLETE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let result = client.complete("mistral-large2", "prompt text").await;
        assert!(matches!(
            result,
            Err(RagError::CompletionError { status: 200, ref message })
                if message.contains("model overloaded") && message.contains("390")
        ));
    }

    #[tokio::test]
    async fn test_json_answer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(COMPLETE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "content": "plain answer" } }]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        assert_eq!(client.complete("m", "p").await.unwrap(), "plain answer");
    }

    #[tokio::test]
    async fn test_unknown_model_is_completion_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(COMPLETE_PATH))
            .respond_with(ResponseTemplate::new(400).set_body_string("unknown model \"nope\""))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let result = client.complete("nope", "p").await;
        assert!(matches!(
            result,
            Err(RagError::CompletionError { status: 400, ref message }) if message.contains("nope")
        ));
    }
}
