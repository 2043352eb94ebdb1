use bedrock_chat_common::ChatResponse;

/// Shown when a backend call succeeds but produces no text.
pub const FALLBACK_REPLY: &str =
    "The agent didn't return a response in time. Please try a simpler or more specific question.";

pub fn normalize(reply: String, session_id: Option<String>) -> ChatResponse {
    let reply = if reply.is_empty() {
        FALLBACK_REPLY.to_string()
    } else {
        reply
    };
    ChatResponse { reply, session_id }
}
