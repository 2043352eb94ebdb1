use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

pub const MESSAGE_REQUIRED: &str = "message is required";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

/// One prior turn of the conversation, oldest first in a history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// A validated inbound chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub message: String,
    pub history: Vec<Turn>,
    pub session_id: Option<String>,
}

impl ChatRequest {
    /// Parse and validate a raw JSON body.
    ///
    /// A missing or unparseable body is treated as `{}`. The message is
    /// trimmed and must be non-empty. A malformed `history` falls back to an
    /// empty history, and an empty `sessionId` counts as absent.
    pub fn from_body(body: Option<&str>) -> Result<Self> {
        let value = body
            .and_then(|raw| serde_json::from_str::<Value>(raw).ok())
            .unwrap_or_else(|| Value::Object(Default::default()));
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> Result<Self> {
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default();
        if message.is_empty() {
            return Err(Error::Validation(MESSAGE_REQUIRED.to_string()));
        }

        let history = value
            .get("history")
            .and_then(|h| serde_json::from_value::<Vec<Turn>>(h.clone()).ok())
            .unwrap_or_default();

        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Ok(Self {
            message: message.to_string(),
            history,
            session_id,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub reply: String,
    #[serde(
        rename = "sessionId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub session_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_body() {
        let body = r#"{
            "message": "  What is X?  ",
            "history": [
                {"role": "user", "content": "hi"},
                {"role": "assistant", "content": "hello"}
            ],
            "sessionId": "abc-123"
        }"#;
        let req = ChatRequest::from_body(Some(body)).unwrap();
        assert_eq!(req.message, "What is X?");
        assert_eq!(
            req.history,
            vec![Turn::user("hi"), Turn::assistant("hello")]
        );
        assert_eq!(req.session_id.as_deref(), Some("abc-123"));
    }

    #[test]
    fn missing_body_is_rejected_as_missing_message() {
        let err = ChatRequest::from_body(None).unwrap_err();
        assert!(err.is_validation());
        assert_eq!(err.to_string(), MESSAGE_REQUIRED);
    }

    #[test]
    fn unparseable_body_is_treated_as_empty_object() {
        let err = ChatRequest::from_body(Some("not json {")).unwrap_err();
        assert_eq!(err.to_string(), MESSAGE_REQUIRED);
    }

    #[test]
    fn whitespace_message_is_rejected() {
        for body in [r#"{"message": ""}"#, r#"{"message": "   \n\t"}"#, r#"{"message": 42}"#] {
            let err = ChatRequest::from_body(Some(body)).unwrap_err();
            assert!(err.is_validation(), "body {body} should be rejected");
        }
    }

    #[test]
    fn malformed_history_defaults_to_empty() {
        let body = r#"{"message": "hi", "history": [{"role": "robot", "content": 1}]}"#;
        let req = ChatRequest::from_body(Some(body)).unwrap();
        assert!(req.history.is_empty());
    }

    #[test]
    fn empty_session_id_counts_as_absent() {
        let req = ChatRequest::from_body(Some(r#"{"message": "hi", "sessionId": ""}"#)).unwrap();
        assert_eq!(req.session_id, None);
    }

    #[test]
    fn response_omits_absent_session_id() {
        let resp = ChatResponse {
            reply: "ok".to_string(),
            session_id: None,
        };
        assert_eq!(serde_json::to_string(&resp).unwrap(), r#"{"reply":"ok"}"#);

        let resp = ChatResponse {
            reply: "ok".to_string(),
            session_id: Some("s1".to_string()),
        };
        assert_eq!(
            serde_json::to_string(&resp).unwrap(),
            r#"{"reply":"ok","sessionId":"s1"}"#
        );
    }
}
