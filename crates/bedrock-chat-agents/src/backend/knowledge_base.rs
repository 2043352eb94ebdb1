use std::sync::Arc;

use async_trait::async_trait;
use bedrock_chat_common::{ChatRequest, Result};
use bedrock_chat_config::InvocationMode;
use serde_json::{Value, json};

use super::{BackendInvoker, BackendReply};
use crate::bedrock::BedrockClient;
use crate::prompt::build_prompt;

/// Retrieval-augmented generation against a Bedrock knowledge base. The
/// history is flattened into the single input text.
pub struct KnowledgeBaseInvoker {
    client: Arc<BedrockClient>,
    endpoint: String,
    knowledge_base_id: String,
    model_arn: String,
}

impl KnowledgeBaseInvoker {
    pub fn new(
        client: Arc<BedrockClient>,
        endpoint: String,
        knowledge_base_id: String,
        model_arn: String,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            knowledge_base_id,
            model_arn,
        }
    }

    pub fn request_body(&self, prompt: &str) -> Value {
        json!({
            "input": { "text": prompt },
            "retrieveAndGenerateConfiguration": {
                "type": "KNOWLEDGE_BASE",
                "knowledgeBaseConfiguration": {
                    "knowledgeBaseId": self.knowledge_base_id,
                    "modelArn": self.model_arn,
                },
            },
        })
    }
}

#[async_trait]
impl BackendInvoker for KnowledgeBaseInvoker {
    fn mode(&self) -> InvocationMode {
        InvocationMode::KnowledgeBaseRag
    }

    async fn invoke(&self, request: &ChatRequest) -> Result<BackendReply> {
        let prompt = build_prompt(&request.message, &request.history);
        let url = format!("{}/retrieveAndGenerate", self.endpoint);
        let response = self
            .client
            .post_json(&url, &self.request_body(&prompt), "application/json")
            .await?;

        let raw: Value = response.json().await?;
        let text = raw["output"]["text"].as_str().unwrap_or_default();
        Ok(BackendReply::complete(text))
    }
}

#[cfg(test)]
mod tests {
    use bedrock_chat_security::{AwsCredentials, RequestSigner, StaticCredentialsProvider};

    use super::*;

    #[test]
    fn body_targets_configured_knowledge_base() {
        let creds = Arc::new(StaticCredentialsProvider::new(AwsCredentials::new("AKID", "SECRET")));
        let client = BedrockClient::new(RequestSigner::new(creds, "us-east-1"), 5).unwrap();
        let invoker = KnowledgeBaseInvoker::new(
            Arc::new(client),
            "https://bedrock-agent-runtime.us-east-1.amazonaws.com".to_string(),
            "IVIFHG7AO2".to_string(),
            "arn:aws:bedrock:us-east-1::foundation-model/meta.llama3".to_string(),
        );

        let body = invoker.request_body("What is X?");
        assert_eq!(body["input"]["text"], "What is X?");
        let kb = &body["retrieveAndGenerateConfiguration"];
        assert_eq!(kb["type"], "KNOWLEDGE_BASE");
        assert_eq!(kb["knowledgeBaseConfiguration"]["knowledgeBaseId"], "IVIFHG7AO2");
        assert_eq!(
            kb["knowledgeBaseConfiguration"]["modelArn"],
            "arn:aws:bedrock:us-east-1::foundation-model/meta.llama3"
        );
    }
}
