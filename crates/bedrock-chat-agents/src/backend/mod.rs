use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use bedrock_chat_common::{ChatRequest, Result};
use bedrock_chat_config::{BedrockConfig, InvocationMode};
use bytes::Bytes;
use futures::Stream;
use tracing::info;

use crate::bedrock::BedrockClient;

pub mod agent;
pub mod converse;
pub mod knowledge_base;

pub use agent::AgentInvoker;
pub use converse::{ConverseInvoker, InferenceConfig};
pub use knowledge_base::KnowledgeBaseInvoker;

/// One backend strategy. A deployment wires exactly one of these into the
/// dispatcher; the dispatcher never inspects a request to choose between them.
#[async_trait]
pub trait BackendInvoker: Send + Sync {
    fn mode(&self) -> InvocationMode;

    /// Send the validated request to the backend. Errors are returned as-is;
    /// invokers never retry.
    async fn invoke(&self, request: &ChatRequest) -> Result<BackendReply>;
}

pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<ResponseChunk>> + Send>>;

/// A single streamed response fragment. Fragments without a payload are
/// skipped by the aggregator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseChunk {
    pub bytes: Option<Bytes>,
}

impl ResponseChunk {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: Some(bytes.into()),
        }
    }

    pub fn empty() -> Self {
        Self { bytes: None }
    }
}

pub enum BackendResult {
    /// The backend returned the whole reply at once.
    Complete(String),
    /// The reply arrives as chunks that must be drained in order.
    Streamed(ChunkStream),
}

impl fmt::Debug for BackendResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendResult::Complete(text) => f.debug_tuple("Complete").field(text).finish(),
            BackendResult::Streamed(_) => f.write_str("Streamed(..)"),
        }
    }
}

#[derive(Debug)]
pub struct BackendReply {
    pub result: BackendResult,
    /// Only the agent strategy resolves a session id.
    pub session_id: Option<String>,
}

impl BackendReply {
    pub fn complete(text: impl Into<String>) -> Self {
        Self {
            result: BackendResult::Complete(text.into()),
            session_id: None,
        }
    }
}

/// Build the strategy selected by `config.mode`, sharing one client.
pub fn invoker_from_config(
    config: &BedrockConfig,
    client: Arc<BedrockClient>,
) -> Result<Arc<dyn BackendInvoker>> {
    config.validate()?;

    let invoker: Arc<dyn BackendInvoker> = match config.mode {
        InvocationMode::DirectConverse => Arc::new(ConverseInvoker::new(
            client,
            config.runtime_endpoint(),
            config.model_id.clone().unwrap_or_default(),
        )),
        InvocationMode::KnowledgeBaseRag => Arc::new(KnowledgeBaseInvoker::new(
            client,
            config.agent_runtime_endpoint(),
            config.knowledge_base_id.clone().unwrap_or_default(),
            config.model_id.clone().unwrap_or_default(),
        )),
        InvocationMode::AgentSession => Arc::new(AgentInvoker::new(
            client,
            config.agent_runtime_endpoint(),
            config.agent_id.clone().unwrap_or_default(),
            config.agent_alias_id.clone().unwrap_or_default(),
        )),
    };

    info!(mode = %invoker.mode(), region = %config.region, "backend invoker ready");
    Ok(invoker)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bedrock_chat_security::{AwsCredentials, RequestSigner, StaticCredentialsProvider};

    use super::*;

    fn client() -> Arc<BedrockClient> {
        let creds = Arc::new(StaticCredentialsProvider::new(AwsCredentials::new("AKID", "SECRET")));
        Arc::new(BedrockClient::new(RequestSigner::new(creds, "us-east-1"), 5).unwrap())
    }

    #[test]
    fn factory_builds_the_configured_mode() {
        let config = BedrockConfig {
            mode: InvocationMode::DirectConverse,
            model_id: Some("meta.llama3-8b-instruct-v1:0".to_string()),
            ..Default::default()
        };
        let invoker = invoker_from_config(&config, client()).unwrap();
        assert_eq!(invoker.mode(), InvocationMode::DirectConverse);

        let config = BedrockConfig {
            agent_id: Some("AGENT".to_string()),
            agent_alias_id: Some("ALIAS".to_string()),
            ..Default::default()
        };
        let invoker = invoker_from_config(&config, client()).unwrap();
        assert_eq!(invoker.mode(), InvocationMode::AgentSession);
    }

    #[test]
    fn factory_rejects_incomplete_config() {
        let config = BedrockConfig {
            mode: InvocationMode::KnowledgeBaseRag,
            ..Default::default()
        };
        assert!(invoker_from_config(&config, client()).is_err());
    }
}
