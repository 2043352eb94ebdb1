#![allow(dead_code)]

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bedrock_chat_agents::BedrockClient;
use bedrock_chat_security::{AwsCredentials, RequestSigner, StaticCredentialsProvider};
use crc32c::crc32c;

pub fn client() -> Arc<BedrockClient> {
    let creds = StaticCredentialsProvider::new(AwsCredentials::new(
        "AKIDEXAMPLE",
        "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
    ));
    let signer = RequestSigner::new(Arc::new(creds), "us-east-1");
    Arc::new(BedrockClient::new(signer, 5).unwrap())
}

/// Encode one event-stream frame with string headers.
pub fn frame(headers: &[(&str, &str)], payload: &[u8]) -> Vec<u8> {
    let mut header_bytes = Vec::new();
    for (name, value) in headers {
        header_bytes.push(name.len() as u8);
        header_bytes.extend_from_slice(name.as_bytes());
        header_bytes.push(7);
        header_bytes.extend_from_slice(&(value.len() as u16).to_be_bytes());
        header_bytes.extend_from_slice(value.as_bytes());
    }

    let total = 12 + header_bytes.len() + payload.len() + 4;
    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&(total as u32).to_be_bytes());
    out.extend_from_slice(&(header_bytes.len() as u32).to_be_bytes());
    let prelude_crc = crc32c(&out);
    out.extend_from_slice(&prelude_crc.to_be_bytes());
    out.extend_from_slice(&header_bytes);
    out.extend_from_slice(payload);
    let message_crc = crc32c(&out);
    out.extend_from_slice(&message_crc.to_be_bytes());
    out
}

/// A `chunk` event carrying `text` as base64 bytes.
pub fn chunk_frame(text: &str) -> Vec<u8> {
    let payload = format!(r#"{{"bytes":"{}"}}"#, BASE64.encode(text));
    frame(
        &[
            (":message-type", "event"),
            (":event-type", "chunk"),
            (":content-type", "application/json"),
        ],
        payload.as_bytes(),
    )
}

pub fn trace_frame() -> Vec<u8> {
    frame(
        &[(":message-type", "event"), (":event-type", "trace")],
        br#"{"trace":{"orchestrationTrace":{}}}"#,
    )
}

pub fn exception_frame(kind: &str, message: &str) -> Vec<u8> {
    let payload = format!(r#"{{"message":"{message}"}}"#);
    frame(
        &[(":message-type", "exception"), (":exception-type", kind)],
        payload.as_bytes(),
    )
}
