//! services/api/src/adapters/assistant.rs
//!
//! This module contains the adapter for the writing-assistant service.
//! It implements the `WritingAssistant` port from the `core` crate over the
//! assistant's JSON-over-HTTP contract: `POST /api/chat` with the user input
//! and the sanitized project snapshot, `GET /health` as an advisory probe.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use writing_project_core::ports::{AssistantExchange, PortError, PortResult, WritingAssistant};

//=========================================================================================
// Wire Types
//=========================================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequest<'a> {
    user_input: &'a str,
    current_project: &'a Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatResponse {
    assistant_reply: Option<String>,
    project: Option<Value>,
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `WritingAssistant` against an HTTP endpoint.
///
/// `base_url == None` models a deployment without an assistant configured:
/// every chat call fails with `NotConfigured` so the manager can answer with
/// its fixed message, while the rest of the application keeps working.
#[derive(Clone)]
pub struct HttpAssistantAdapter {
    client: reqwest::Client,
    base_url: Option<String>,
}

impl HttpAssistantAdapter {
    /// Creates a new `HttpAssistantAdapter`.
    pub fn new(client: reqwest::Client, base_url: Option<String>) -> Self {
        Self { client, base_url }
    }

    fn base_url(&self) -> PortResult<&str> {
        self.base_url
            .as_deref()
            .ok_or_else(|| PortError::NotConfigured("ASSISTANT_URL is not set".to_string()))
    }
}

//=========================================================================================
// `WritingAssistant` Trait Implementation
//=========================================================================================

#[async_trait]
impl WritingAssistant for HttpAssistantAdapter {
    async fn chat(
        &self,
        user_input: &str,
        sanitized_project: &Value,
    ) -> PortResult<AssistantExchange> {
        let base = self.base_url()?;
        let url = format!("{base}/api/chat");
        debug!(%url, "sending chat turn to assistant service");

        let response = self
            .client
            .post(&url)
            .json(&ChatRequest {
                user_input,
                current_project: sanitized_project,
            })
            .send()
            .await
            .map_err(|e| PortError::Unexpected(format!("assistant request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PortError::Protocol(format!(
                "assistant answered {status}: {body}"
            )));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            PortError::Protocol(format!("assistant returned a non-JSON body: {e}"))
        })?;

        Ok(AssistantExchange {
            reply: parsed.assistant_reply,
            project: parsed.project,
        })
    }

    async fn health(&self) -> PortResult<bool> {
        let base = self.base_url()?;
        let url = format!("{base}/health");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| PortError::Unexpected(format!("health probe failed: {e}")))?;
        Ok(response.status().is_success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_response_tolerates_missing_fields() {
        let parsed: ChatResponse =
            serde_json::from_str(r#"{"assistantReply": "Sure thing."}"#).unwrap();
        assert_eq!(parsed.assistant_reply.as_deref(), Some("Sure thing."));
        assert!(parsed.project.is_none());
    }

    #[test]
    fn chat_request_uses_the_wire_field_names() {
        let project = serde_json::json!({ "plan": {} });
        let body = serde_json::to_value(ChatRequest {
            user_input: "hello",
            current_project: &project,
        })
        .unwrap();
        assert_eq!(body["userInput"], "hello");
        assert!(body.get("currentProject").is_some());
    }

    #[tokio::test]
    async fn unconfigured_adapter_reports_not_configured() {
        let adapter = HttpAssistantAdapter::new(reqwest::Client::new(), None);
        let result = adapter.chat("hi", &serde_json::json!({})).await;
        assert!(matches!(result, Err(PortError::NotConfigured(_))));
    }
}
