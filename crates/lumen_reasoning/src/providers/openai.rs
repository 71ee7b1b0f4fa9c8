use crate::api_types::{Message, Role, ToolCall};
use crate::llm::{CompletionParams, LlmClient};
use crate::retry::{with_retry, RetryConfig};
use anyhow::{Context, Result};
use lumen_core::config::LlmConfig;
use lumen_core::Tool;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

/// Any OpenAI-compatible chat completions endpoint (OpenAI, OpenRouter, vLLM...).
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    retry: RetryConfig,
}

impl OpenAiClient {
    pub fn new(config: &LlmConfig, api_key: &str) -> Result<Self> {
        Ok(Self {
            client: Client::builder()
                .timeout(Duration::from_secs(config.request_timeout_secs))
                .build()?,
            api_key: api_key.to_string(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            retry: RetryConfig::default(),
        })
    }

    /// Build from config, taking the key from the environment.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .api_key()
            .context("No LLM API key set (OPENROUTER_API_KEY or LLM_API_KEY)")?;
        Self::new(config, &api_key)
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

fn to_wire_tools(tools: &[Tool]) -> Vec<Value> {
    tools
        .iter()
        .map(|t| {
            json!({
                "type": "function",
                "function": {
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.input_schema
                }
            })
        })
        .collect()
}

// The system prompt goes first with role "system".
fn to_wire_messages(system: &str, messages: &[Message]) -> Vec<Value> {
    let mut wire = Vec::with_capacity(messages.len() + 1);
    if !system.is_empty() {
        wire.push(json!({"role": "system", "content": system}));
    }

    for msg in messages {
        match msg.role() {
            Role::User => wire.push(json!({"role": "user", "content": msg.content()})),
            Role::Tool => wire.push(json!({
                "role": "tool",
                "tool_call_id": msg.tool_call_id().unwrap_or_default(),
                "content": msg.content()
            })),
            Role::Assistant => {
                let mut obj = json!({"role": "assistant", "content": msg.content()});
                if !msg.tool_calls().is_empty() {
                    let calls: Vec<Value> = msg
                        .tool_calls()
                        .iter()
                        .map(|c| {
                            json!({
                                "id": c.id,
                                "type": "function",
                                "function": {
                                    "name": c.name,
                                    // arguments travel as stringified JSON
                                    "arguments": c.input.to_string()
                                }
                            })
                        })
                        .collect();
                    obj["tool_calls"] = json!(calls);
                    if msg.content().is_empty() {
                        obj["content"] = Value::Null;
                    }
                }
                wire.push(obj);
            }
        }
    }
    wire
}

fn parse_reply(body: &Value) -> Result<Message> {
    let message = body
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .context("Completion response has no choices[0].message")?;

    let content = message["content"].as_str().unwrap_or_default().to_string();

    let mut calls = Vec::new();
    if let Some(tool_calls) = message["tool_calls"].as_array() {
        for call in tool_calls {
            let id = call["id"].as_str().unwrap_or_default();
            let func = &call["function"];
            let name = func["name"].as_str().unwrap_or_default();
            let args = func["arguments"].as_str().unwrap_or("{}");
            let input: Value = serde_json::from_str(args).unwrap_or_else(|e| {
                tracing::warn!("Tool call {} has unparseable arguments ({}): {}", name, e, args);
                json!({})
            });
            calls.push(ToolCall::new(id, name, input));
        }
    }

    Ok(Message::assistant(content, calls))
}

#[async_trait::async_trait]
impl LlmClient for OpenAiClient {
    async fn complete_with_tools(
        &self,
        system: &str,
        messages: Vec<Message>,
        tools: Vec<Tool>,
        params: CompletionParams,
    ) -> Result<Message> {
        let mut payload = json!({
            "model": self.model,
            "messages": to_wire_messages(system, &messages),
            "temperature": params.temperature,
            "max_tokens": params.max_tokens,
        });
        if !tools.is_empty() {
            payload["tools"] = json!(to_wire_tools(&tools));
        }

        tracing::debug!(
            "LLM request: model={}, messages={}, tools={}",
            self.model,
            messages.len(),
            tools.len()
        );

        let url = format!("{}/chat/completions", self.base_url);
        let response = with_retry(&self.retry, "LLM", || {
            let request = self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&payload);
            async move { request.send().await.context("Failed to send completion request") }
        })
        .await?;

        let body: Value = response
            .json()
            .await
            .context("Failed to decode completion response")?;
        parse_reply(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_core::{ToolInputSchema, ToolKind};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> OpenAiClient {
        let config = LlmConfig {
            base_url: format!("{}/v1/", server.uri()),
            model: "test-model".into(),
            ..LlmConfig::default()
        };
        OpenAiClient::new(&config, "sk-test").unwrap().with_retry_config(RetryConfig {
            max_attempts: 2,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            backoff_factor: 2.0,
        })
    }

    #[test]
    fn test_wire_messages_cover_all_roles() {
        let call = ToolCall::new("call_1", "search_web", json!({"query": "rust"}));
        let wire = to_wire_messages(
            "be helpful",
            &[
                Message::user("hi"),
                Message::assistant("", vec![call]),
                Message::tool_result("call_1", "results"),
            ],
        );
        assert_eq!(wire.len(), 4);
        assert_eq!(wire[0]["role"], "system");
        assert_eq!(wire[2]["content"], Value::Null);
        assert_eq!(wire[2]["tool_calls"][0]["function"]["arguments"], r#"{"query":"rust"}"#);
        assert_eq!(wire[3]["role"], "tool");
        assert_eq!(wire[3]["tool_call_id"], "call_1");
    }

    #[test]
    fn test_parse_reply_with_tool_calls() {
        let body = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [
                        {"id": "a", "type": "function", "function": {"name": "search_knowledge_base", "arguments": "{\"query\":\"vacation\"}"}},
                        {"id": "b", "type": "function", "function": {"name": "search_web", "arguments": "not json"}}
                    ]
                },
                "finish_reason": "tool_calls"
            }]
        });
        let reply = parse_reply(&body).unwrap();
        assert_eq!(reply.role(), Role::Assistant);
        assert_eq!(reply.content(), "");
        assert_eq!(reply.tool_calls().len(), 2);
        assert_eq!(reply.tool_calls()[0].input, json!({"query": "vacation"}));
        assert_eq!(reply.tool_calls()[1].input, json!({}));
    }

    #[test]
    fn test_parse_reply_without_choices() {
        assert!(parse_reply(&json!({"error": "overloaded"})).is_err());
    }

    #[tokio::test]
    async fn test_complete_with_tools_round_trip() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "model": "test-model",
                "tools": [{"type": "function", "function": {"name": "search_web"}}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "Paris."}}]
            })))
            .mount(&server)
            .await;

        let tool = Tool {
            name: ToolKind::WebSearch.name().into(),
            description: "search".into(),
            input_schema: ToolInputSchema::object(json!({"query": {"type": "string"}}), &["query"]),
        };
        let reply = client_for(&server)
            .complete_with_tools("sys", vec![Message::user("capital of France?")], vec![tool], CompletionParams::default())
            .await
            .unwrap();
        assert_eq!(reply.content(), "Paris.");
        assert!(reply.tool_calls().is_empty());
    }

    #[tokio::test]
    async fn test_plain_complete_sends_no_tools() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "SELECT 1"}}]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let text = client
            .complete("", vec![Message::user("one")], CompletionParams::default())
            .await
            .unwrap();
        assert_eq!(text, "SELECT 1");

        let requests = server.received_requests().await.unwrap();
        let sent: Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert!(sent.get("tools").is_none());
        assert_eq!(sent["messages"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_api_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad model"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .complete("sys", vec![Message::user("x")], CompletionParams::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("bad model"));
    }
}
