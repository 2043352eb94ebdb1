use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bedrock_chat_common::{ChatRequest, Error, Result};
use bedrock_chat_config::InvocationMode;
use bedrock_chat_security::signing::encode_path_segment;
use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use serde_json::{Value, json};
use tracing::{debug, trace};
use uuid::Uuid;

use super::{BackendInvoker, BackendReply, BackendResult, ChunkStream, ResponseChunk};
use crate::bedrock::{EventMessage, EventStreamDecoder};

const EVENT_STREAM_CONTENT_TYPE: &str = "application/vnd.amazon.eventstream";

/// Invokes a Bedrock agent alias. The agent keeps conversation state
/// server-side under the session id, so the history is not sent.
pub struct AgentInvoker {
    client: Arc<crate::bedrock::BedrockClient>,
    endpoint: String,
    agent_id: String,
    agent_alias_id: String,
}

impl AgentInvoker {
    pub fn new(
        client: Arc<crate::bedrock::BedrockClient>,
        endpoint: String,
        agent_id: String,
        agent_alias_id: String,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            agent_id,
            agent_alias_id,
        }
    }

    fn url(&self, session_id: &str) -> String {
        format!(
            "{}/agents/{}/agentAliases/{}/sessions/{}/text",
            self.endpoint,
            encode_path_segment(&self.agent_id),
            encode_path_segment(&self.agent_alias_id),
            encode_path_segment(session_id),
        )
    }
}

/// A fresh random (v4, 122 random bits) session identifier.
pub fn new_session_id() -> String {
    Uuid::new_v4().to_string()
}

#[async_trait]
impl BackendInvoker for AgentInvoker {
    fn mode(&self) -> InvocationMode {
        InvocationMode::AgentSession
    }

    async fn invoke(&self, request: &ChatRequest) -> Result<BackendReply> {
        let session_id = request.session_id.clone().unwrap_or_else(new_session_id);
        debug!(
            session_id = %session_id,
            resumed = request.session_id.is_some(),
            "invoking agent"
        );

        let body = json!({ "inputText": request.message });
        let response = self
            .client
            .post_json(&self.url(&session_id), &body, EVENT_STREAM_CONTENT_TYPE)
            .await?;

        Ok(BackendReply {
            result: BackendResult::Streamed(decode_agent_stream(response.bytes_stream())),
            session_id: Some(session_id),
        })
    }
}

type ByteSource<E> = Pin<Box<dyn Stream<Item = std::result::Result<Bytes, E>> + Send>>;

/// Turn a raw event-stream body into completion chunks, in arrival order.
///
/// `chunk` events are yielded (with `bytes: None` when the event carries no
/// payload); other event types such as `trace` are skipped. Exception and
/// error frames end the stream with an error.
pub fn decode_agent_stream<S, E>(bytes: S) -> ChunkStream
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
    E: Into<Error> + Send + 'static,
{
    let source: ByteSource<E> = Box::pin(bytes);
    let chunks = stream::try_unfold((source, EventStreamDecoder::new()), |state| next_chunk(state));
    Box::pin(chunks)
}

async fn next_chunk<E>(
    (mut source, mut decoder): (ByteSource<E>, EventStreamDecoder),
) -> Result<Option<(ResponseChunk, (ByteSource<E>, EventStreamDecoder))>>
where
    E: Into<Error>,
{
    loop {
        while let Some(message) = decoder.next_message()? {
            if let Some(chunk) = chunk_from_message(&message)? {
                return Ok(Some((chunk, (source, decoder))));
            }
        }

        match source.next().await {
            Some(Ok(data)) => decoder.feed(&data),
            Some(Err(e)) => return Err(e.into()),
            None if decoder.pending() > 0 => {
                return Err(Error::Stream(format!(
                    "stream ended with {} undecoded bytes",
                    decoder.pending()
                )));
            }
            None => return Ok(None),
        }
    }
}

fn chunk_from_message(message: &EventMessage) -> Result<Option<ResponseChunk>> {
    let payload: Option<Value> = serde_json::from_slice(&message.payload).ok();

    match message.message_type() {
        Some("exception") => {
            let kind = message.exception_type().map(str::to_string);
            let text = payload
                .as_ref()
                .and_then(|p| p.get("message").or_else(|| p.get("Message")))
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| kind.clone())
                .unwrap_or_else(|| "agent stream exception".to_string());
            return Err(Error::Backend {
                status: None,
                kind,
                message: text,
            });
        }
        Some("error") => {
            return Err(Error::Backend {
                status: None,
                kind: message.header_str(":error-code").map(str::to_string),
                message: message
                    .header_str(":error-message")
                    .unwrap_or("agent stream error")
                    .to_string(),
            });
        }
        _ => {}
    }

    match message.event_type() {
        Some("chunk") => {
            let encoded = payload
                .as_ref()
                .and_then(|p| p.get("bytes"))
                .and_then(Value::as_str);
            match encoded {
                Some(encoded) => {
                    let decoded = BASE64
                        .decode(encoded)
                        .map_err(|e| Error::Stream(format!("invalid chunk bytes: {e}")))?;
                    Ok(Some(ResponseChunk::new(decoded)))
                }
                None => Ok(Some(ResponseChunk::empty())),
            }
        }
        other => {
            trace!(event_type = ?other, "skipping agent event");
            Ok(None)
        }
    }
}
