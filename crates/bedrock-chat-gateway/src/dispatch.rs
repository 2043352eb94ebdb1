//! Request dispatch: turns one inbound proxy envelope into one outbound
//! envelope, whatever the transport (the axum router or the `invoke` CLI).

use std::collections::BTreeMap;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bedrock_chat_agents::{BackendInvoker, drain, normalize};
use bedrock_chat_common::{ChatRequest, ChatResponse, Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error, warn};

pub const ALLOW_ORIGIN: &str = "*";
pub const ALLOW_HEADERS: &str = "Content-Type";
pub const ALLOW_METHODS: &str = "OPTIONS,POST";

const INTERNAL_SERVER_ERROR: &str = "Internal server error";

/// An API Gateway proxy event. REST APIs put the method in `httpMethod`,
/// HTTP APIs in `requestContext.http.method`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_context: Option<RequestContext>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub is_base64_encoded: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http: Option<HttpContext>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpContext {
    #[serde(default)]
    pub method: Option<String>,
}

impl InboundEnvelope {
    pub fn new(method: impl Into<String>, body: Option<String>) -> Self {
        Self {
            http_method: Some(method.into()),
            body,
            ..Default::default()
        }
    }

    pub fn method(&self) -> Option<&str> {
        self.http_method.as_deref().or_else(|| {
            self.request_context
                .as_ref()
                .and_then(|ctx| ctx.http.as_ref())
                .and_then(|http| http.method.as_deref())
        })
    }

    pub fn is_preflight(&self) -> bool {
        self.method()
            .is_some_and(|m| m.eq_ignore_ascii_case("OPTIONS"))
    }

    /// The body as text. A body that fails base64 decoding is treated as
    /// absent.
    pub fn body_text(&self) -> Option<String> {
        let body = self.body.as_ref()?;
        if !self.is_base64_encoded {
            return Some(body.clone());
        }
        match BASE64.decode(body) {
            Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
            Err(e) => {
                warn!("discarding undecodable base64 body: {}", e);
                None
            }
        }
    }
}

/// Proxy response: `{statusCode, headers, body}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundEnvelope {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl OutboundEnvelope {
    pub fn preflight() -> Self {
        Self {
            status_code: 200,
            headers: cors_headers(),
            body: String::new(),
        }
    }

    pub fn json(status_code: u16, body: &serde_json::Value) -> Self {
        let mut headers = cors_headers();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        Self {
            status_code,
            headers,
            body: body.to_string(),
        }
    }

    pub fn error(status_code: u16, message: &str) -> Self {
        Self::json(status_code, &json!({ "error": message }))
    }
}

/// The headers attached to every response.
pub fn cors_headers() -> BTreeMap<String, String> {
    BTreeMap::from([
        (
            "Access-Control-Allow-Origin".to_string(),
            ALLOW_ORIGIN.to_string(),
        ),
        (
            "Access-Control-Allow-Headers".to_string(),
            ALLOW_HEADERS.to_string(),
        ),
        (
            "Access-Control-Allow-Methods".to_string(),
            ALLOW_METHODS.to_string(),
        ),
    ])
}

/// Validates each request, drives the configured backend strategy and maps
/// the outcome to a response. Holds no per-request state.
#[derive(Clone)]
pub struct ChatDispatcher {
    invoker: Arc<dyn BackendInvoker>,
}

impl ChatDispatcher {
    pub fn new(invoker: Arc<dyn BackendInvoker>) -> Self {
        Self { invoker }
    }

    pub fn invoker(&self) -> &Arc<dyn BackendInvoker> {
        &self.invoker
    }

    pub async fn handle(&self, envelope: InboundEnvelope) -> OutboundEnvelope {
        if envelope.is_preflight() {
            return OutboundEnvelope::preflight();
        }

        let body = envelope.body_text();
        let request = match ChatRequest::from_body(body.as_deref()) {
            Ok(request) => request,
            Err(e) => {
                debug!("rejecting chat request: {}", e);
                return OutboundEnvelope::error(400, &e.to_string());
            }
        };

        match self.respond(&request).await {
            Ok(response) => match serde_json::to_value(&response) {
                Ok(value) => OutboundEnvelope::json(200, &value),
                Err(e) => failure(&Error::from(e)),
            },
            Err(e) if e.is_validation() => OutboundEnvelope::error(400, &e.to_string()),
            Err(e) => failure(&e),
        }
    }

    async fn respond(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let reply = self.invoker.invoke(request).await?;
        let session_id = reply.session_id;
        let text = drain(reply.result).await?;
        Ok(normalize(text, session_id))
    }
}

fn failure(err: &Error) -> OutboundEnvelope {
    error!(error = ?err, "chat request failed: {}", err);
    let description = err.to_string();
    let message = if description.trim().is_empty() {
        INTERNAL_SERVER_ERROR
    } else {
        description.as_str()
    };
    OutboundEnvelope::error(500, message)
}
