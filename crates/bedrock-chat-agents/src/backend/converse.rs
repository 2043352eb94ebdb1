use std::sync::Arc;

use async_trait::async_trait;
use bedrock_chat_common::{ChatRequest, Result, Role, Turn};
use bedrock_chat_config::InvocationMode;
use bedrock_chat_security::signing::encode_path_segment;
use serde_json::{Value, json};

use super::{BackendInvoker, BackendReply};
use crate::bedrock::BedrockClient;

/// Sampling settings sent with every Converse call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InferenceConfig {
    pub max_tokens: u32,
    pub temperature: f64,
    pub top_p: f64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            max_tokens: 512,
            temperature: 0.3,
            top_p: 0.9,
        }
    }
}

/// Talks to a model directly through the Bedrock Converse API, passing the
/// history as structured turns.
pub struct ConverseInvoker {
    client: Arc<BedrockClient>,
    endpoint: String,
    model_id: String,
    inference: InferenceConfig,
}

impl ConverseInvoker {
    pub fn new(client: Arc<BedrockClient>, endpoint: String, model_id: String) -> Self {
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model_id,
            inference: InferenceConfig::default(),
        }
    }

    pub fn with_inference(mut self, inference: InferenceConfig) -> Self {
        self.inference = inference;
        self
    }

    fn url(&self) -> String {
        format!(
            "{}/model/{}/converse",
            self.endpoint,
            encode_path_segment(&self.model_id)
        )
    }

    pub fn request_body(&self, message: &str, history: &[Turn]) -> Value {
        let mut messages: Vec<Value> = Vec::with_capacity(history.len() + 1);
        let mut system: Vec<Value> = Vec::new();

        for turn in history {
            match turn.role {
                // Converse only accepts user/assistant inside `messages`.
                Role::System => system.push(json!({ "text": turn.content })),
                Role::User | Role::Assistant => messages.push(json!({
                    "role": turn.role.as_str(),
                    "content": [{ "text": turn.content }],
                })),
            }
        }
        messages.push(json!({
            "role": "user",
            "content": [{ "text": message }],
        }));

        let mut body = json!({
            "messages": messages,
            "inferenceConfig": {
                "maxTokens": self.inference.max_tokens,
                "temperature": self.inference.temperature,
                "topP": self.inference.top_p,
            },
        });
        if !system.is_empty() {
            body["system"] = Value::Array(system);
        }
        body
    }
}

/// Concatenate the `text` of every content item of `output.message`.
/// Items without text (tool use, images, reasoning) are dropped.
pub fn reply_text(response: &Value) -> String {
    response["output"]["message"]["content"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("text").and_then(Value::as_str))
                .collect::<String>()
        })
        .unwrap_or_default()
}

#[async_trait]
impl BackendInvoker for ConverseInvoker {
    fn mode(&self) -> InvocationMode {
        InvocationMode::DirectConverse
    }

    async fn invoke(&self, request: &ChatRequest) -> Result<BackendReply> {
        let body = self.request_body(&request.message, &request.history);
        let response = self
            .client
            .post_json(&self.url(), &body, "application/json")
            .await?;
        let raw: Value = response.json().await?;
        Ok(BackendReply::complete(reply_text(&raw)))
    }
}
