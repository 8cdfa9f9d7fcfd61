use std::time::Duration;

use anyhow::{Context, anyhow};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::{ChatMessage, ChatModel, StdResult};

/// The default endpoint of a local Ollama server.
pub const OLLAMA_ENDPOINT: &str = "http://localhost:11434";

/// The model used when none is configured.
pub const DEFAULT_CHAT_MODEL: &str = "deepseek-r1:8b";

const CHAT_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Serialize, Debug)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Deserialize, Debug)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Deserialize, Debug)]
struct ResponseMessage {
    content: String,
}

/// A chat model served by Ollama.
pub struct OllamaChat {
    client: Client,
    endpoint: String,
    model: String,
}

impl OllamaChat {
    /// Creates a new `OllamaChat` for the given server and model.
    pub fn try_new(endpoint: &str, model: &str) -> StdResult<Self> {
        let client = Client::builder()
            .timeout(CHAT_TIMEOUT)
            .build()
            .with_context(|| "Failed to build the HTTP client")?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl ChatModel for OllamaChat {
    async fn chat(&self, messages: &[ChatMessage]) -> StdResult<String> {
        let response = self
            .client
            .post(format!("{}/api/chat", self.endpoint))
            .json(&ChatRequest {
                model: &self.model,
                messages,
                stream: false,
            })
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Chat request failed with {status}: {body}"));
        }
        let response: ChatResponse = response
            .json()
            .await
            .with_context(|| "Badly formatted chat response")?;

        Ok(response.message.content)
    }
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn chat_returns_message_content() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/api/chat").json_body(json!({
                    "model": "deepseek-r1:8b",
                    "messages": [
                        { "role": "system", "content": "Answer in JSON" },
                        { "role": "user", "content": "digital twin" }
                    ],
                    "stream": false
                }));
                then.status(200).json_body(json!({
                    "model": "deepseek-r1:8b",
                    "message": { "role": "assistant", "content": "{\"keywords\": []}" },
                    "done": true
                }));
            })
            .await;
        let chat = OllamaChat::try_new(&server.base_url(), DEFAULT_CHAT_MODEL).unwrap();

        let content = chat
            .chat(&[
                ChatMessage::system("Answer in JSON"),
                ChatMessage::user("digital twin"),
            ])
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!("{\"keywords\": []}", content);
    }

    #[tokio::test]
    async fn chat_fails_on_server_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/chat");
                then.status(404)
                    .json_body(json!({ "error": "model not found" }));
            })
            .await;
        let chat = OllamaChat::try_new(&server.base_url(), "missing").unwrap();

        chat.chat(&[ChatMessage::user("digital twin")])
            .await
            .expect_err("Chat should fail on server error");
    }
}
