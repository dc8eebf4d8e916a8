//! Relay to an Ollama-compatible chat endpoint.
//!
//! The endpoint and model come from `AI_BASE_URL` and `AI_MODEL`, read at
//! call time so tests can point the relay at a mock server.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

impl ChatTurn {
    pub fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: String,
    messages: &'a [ChatTurn],
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: Option<AssistantMessage>,
}

#[derive(Deserialize)]
struct AssistantMessage {
    content: String,
}

fn base_url() -> String {
    std::env::var("AI_BASE_URL").unwrap_or_else(|_| "http://localhost:11434".to_string())
}

fn model_name() -> String {
    std::env::var("AI_MODEL").unwrap_or_else(|_| "llama3".to_string())
}

/// Send a full conversation and return the assistant's reply text.
pub async fn chat(messages: &[ChatTurn]) -> Result<String, String> {
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(60))
        .build()
        .map_err(|e| format!("Failed to build client: {}", e))?;

    let url = format!("{}/api/chat", base_url().trim_end_matches('/'));
    let request = ChatRequest {
        model: model_name(),
        messages,
        stream: false,
    };

    let resp = client
        .post(&url)
        .json(&request)
        .send()
        .await
        .map_err(|e| format!("AI request failed: {}", e))?;

    if !resp.status().is_success() {
        return Err(format!("AI endpoint returned {}", resp.status()));
    }

    let parsed: ChatResponse = resp
        .json()
        .await
        .map_err(|e| format!("Failed to parse AI response: {}", e))?;

    Ok(parsed.message.map(|m| m.content).unwrap_or_default())
}
