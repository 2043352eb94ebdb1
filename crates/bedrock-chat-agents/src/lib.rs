pub mod aggregate;
pub mod backend;
pub mod bedrock;
pub mod normalize;
pub mod prompt;

pub use aggregate::drain;
pub use backend::{
    AgentInvoker, BackendInvoker, BackendReply, BackendResult, ChunkStream, ConverseInvoker,
    InferenceConfig, KnowledgeBaseInvoker, ResponseChunk, invoker_from_config,
};
pub use bedrock::BedrockClient;
pub use normalize::{FALLBACK_REPLY, normalize};
pub use prompt::build_prompt;
