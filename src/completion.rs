use std::time::Duration;

use anyhow::Context;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::config::ApiConfig;
use crate::transcript::encoder::Message;

#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("request timed out: {}", error_chain(.0))]
    Timeout(#[source] reqwest::Error),
    #[error("{}", error_chain(.0))]
    Transport(#[source] reqwest::Error),
    #[error("HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("malformed completion response: {0}")]
    MalformedResponse(String),
}

impl From<reqwest::Error> for CompletionError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            CompletionError::Timeout(error)
        } else {
            CompletionError::Transport(error)
        }
    }
}

/// Renders an error followed by each of its sources, `: `-separated. reqwest
/// keeps the actual cause (refused connection, DNS, TLS) in the source chain.
fn error_chain(error: &dyn std::error::Error) -> String {
    let mut rendered = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}

/// One request/response exchange with a chat model.
pub trait CompletionClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, CompletionError>;
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f64,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

pub struct ChatCompletionClient {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    temperature: f64,
    api_key: String,
}

impl ChatCompletionClient {
    pub fn new(api: &ApiConfig, api_key: String) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(api.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            endpoint: api.endpoint.clone(),
            model: api.model.clone(),
            temperature: api.temperature,
            api_key,
        })
    }
}

impl CompletionClient for ChatCompletionClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, CompletionError> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if status != StatusCode::OK {
            return Err(CompletionError::Status { status, body });
        }

        extract_content(&body)
    }
}

/// Pulls `choices[0].message.content` out of a chat-completions body.
pub fn extract_content(body: &str) -> Result<String, CompletionError> {
    let response: ChatCompletionResponse = serde_json::from_str(body)
        .map_err(|error| CompletionError::MalformedResponse(error.to_string()))?;

    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_owned())
        .ok_or_else(|| CompletionError::MalformedResponse("no message content in choices".into()))
}


#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::transcript::encoder::MessageRole;

    const OK_BODY: &str = r#"{"choices":[{"message":{"role":"assistant","content":"  hi  "}}]}"#;

    fn client_for(endpoint: String, timeout_secs: u64) -> ChatCompletionClient {
        let api = ApiConfig {
            endpoint,
            timeout_secs,
            ..ApiConfig::default()
        };
        ChatCompletionClient::new(&api, "sk-test".to_owned()).unwrap()
    }

    fn hello() -> Vec<Message> {
        vec![Message {
            role: MessageRole::User,
            content: "[Root] Hello".into(),
        }]
    }

    #[tokio::test]
    async fn ok_reply_is_trimmed_and_request_is_authorized() {
        let (endpoint, server) = test_server::serve_once("200 OK", OK_BODY, Duration::ZERO).await;

        let reply = client_for(endpoint, 5).complete(&hello()).await.unwrap();
        assert_eq!(reply, "hi");

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /v1/chat/completions "));
        assert!(request.to_lowercase().contains("authorization: bearer sk-test"));
        assert!(request.contains(r#""model":"deepseek-chat""#));
        assert!(request.contains(r#""content":"[Root] Hello""#));
    }

    #[tokio::test]
    async fn any_status_but_200_fails_with_body() {
        let (endpoint, _server) =
            test_server::serve_once("201 Created", OK_BODY, Duration::ZERO).await;
        match client_for(endpoint, 5).complete(&hello()).await {
            Err(CompletionError::Status { status, body }) => {
                assert_eq!(status, StatusCode::CREATED);
                assert_eq!(body, OK_BODY);
            }
            other => panic!("expected status error, got {other:?}"),
        }

        let (endpoint, _server) =
            test_server::serve_once("500 Internal Server Error", "boom", Duration::ZERO).await;
        let error = client_for(endpoint, 5).complete(&hello()).await.unwrap_err();
        assert_eq!(error.to_string(), "HTTP 500 Internal Server Error: boom");
    }

    #[tokio::test]
    async fn slow_server_times_out() {
        let (endpoint, _server) =
            test_server::serve_once("200 OK", OK_BODY, Duration::from_secs(3)).await;

        let error = client_for(endpoint, 1).complete(&hello()).await.unwrap_err();
        assert!(matches!(error, CompletionError::Timeout(_)), "{error:?}");
        assert!(error.to_string().starts_with("request timed out"), "{error}");
    }

    #[tokio::test]
    async fn refused_connection_keeps_its_cause() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}/", listener.local_addr().unwrap());
        drop(listener);

        let error = client_for(endpoint, 5).complete(&hello()).await.unwrap_err();
        assert!(matches!(error, CompletionError::Transport(_)), "{error:?}");
        let rendered = error.to_string();
        assert!(
            rendered.starts_with("error sending request") && rendered.matches(": ").count() >= 1,
            "{rendered}"
        );
    }

    #[test]
    fn extracts_first_choice_trimmed() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"  Hi there \n"}},{"message":{"content":"second"}}]}"#;
        assert_eq!(extract_content(body).unwrap(), "Hi there");
    }

    #[test]
    fn missing_content_is_malformed() {
        for body in [
            r#"{"choices":[]}"#,
            r#"{"choices":[{"message":{"content":null}}]}"#,
            r#"{"error":"nope"}"#,
            "not json",
        ] {
            assert!(
                matches!(extract_content(body), Err(CompletionError::MalformedResponse(_))),
                "body {body}"
            );
        }
    }

    #[test]
    fn request_body_shape() {
        let messages = vec![Message {
            role: MessageRole::User,
            content: "[Root] Hello".into(),
        }];
        let request = ChatCompletionRequest {
            model: "deepseek-chat",
            messages: &messages,
            temperature: 0.5,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({
                "model": "deepseek-chat",
                "messages": [{"role": "user", "content": "[Root] Hello"}],
                "temperature": 0.5,
            })
        );
    }

    #[test]
    fn status_error_carries_body() {
        let error = CompletionError::Status {
            status: StatusCode::UNAUTHORIZED,
            body: "invalid key".into(),
        };
        assert_eq!(error.to_string(), "HTTP 401 Unauthorized: invalid key");
    }
}
