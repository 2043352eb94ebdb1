use std::fmt;
use std::str::FromStr;

use bedrock_chat_common::{Error, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_REGION: &str = "us-east-1";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub gateway: GatewayConfig,
    pub bedrock: BedrockConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

/// Which backend strategy a deployment is wired to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationMode {
    DirectConverse,
    KnowledgeBaseRag,
    #[default]
    AgentSession,
}

impl InvocationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvocationMode::DirectConverse => "direct_converse",
            InvocationMode::KnowledgeBaseRag => "knowledge_base_rag",
            InvocationMode::AgentSession => "agent_session",
        }
    }
}

impl fmt::Display for InvocationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvocationMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "direct_converse" | "converse" | "direct" => Ok(Self::DirectConverse),
            "knowledge_base_rag" | "knowledge_base" | "kb" | "rag" => Ok(Self::KnowledgeBaseRag),
            "agent_session" | "agent" => Ok(Self::AgentSession),
            other => Err(Error::Config(format!("unknown invocation mode: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BedrockConfig {
    pub mode: InvocationMode,
    pub region: String,
    /// Model id, inference profile or model ARN.
    pub model_id: Option<String>,
    pub knowledge_base_id: Option<String>,
    pub agent_id: Option<String>,
    pub agent_alias_id: Option<String>,
    /// Overrides `https://bedrock-runtime.{region}.amazonaws.com`.
    pub runtime_endpoint: Option<String>,
    /// Overrides `https://bedrock-agent-runtime.{region}.amazonaws.com`.
    pub agent_runtime_endpoint: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for BedrockConfig {
    fn default() -> Self {
        Self {
            mode: InvocationMode::default(),
            region: DEFAULT_REGION.to_string(),
            model_id: None,
            knowledge_base_id: None,
            agent_id: None,
            agent_alias_id: None,
            runtime_endpoint: None,
            agent_runtime_endpoint: None,
            request_timeout_secs: 60,
        }
    }
}

impl BedrockConfig {
    pub fn runtime_endpoint(&self) -> String {
        self.runtime_endpoint
            .clone()
            .unwrap_or_else(|| format!("https://bedrock-runtime.{}.amazonaws.com", self.region))
    }

    pub fn agent_runtime_endpoint(&self) -> String {
        self.agent_runtime_endpoint.clone().unwrap_or_else(|| {
            format!("https://bedrock-agent-runtime.{}.amazonaws.com", self.region)
        })
    }

    /// Check that the selected mode has every identifier it reads.
    pub fn validate(&self) -> Result<()> {
        if self.region.trim().is_empty() {
            return Err(Error::Config("region must not be empty".to_string()));
        }
        let required: &[(&str, &Option<String>)] = match self.mode {
            InvocationMode::DirectConverse => &[("model_id", &self.model_id)],
            InvocationMode::KnowledgeBaseRag => &[
                ("knowledge_base_id", &self.knowledge_base_id),
                ("model_id", &self.model_id),
            ],
            InvocationMode::AgentSession => &[
                ("agent_id", &self.agent_id),
                ("agent_alias_id", &self.agent_alias_id),
            ],
        };
        for (name, value) in required {
            if value.as_deref().is_none_or(|v| v.trim().is_empty()) {
                return Err(Error::Config(format!(
                    "{name} is required for {} mode",
                    self.mode
                )));
            }
        }
        Ok(())
    }
}
