use bedrock_chat_common::Error;
use serde_json::Value;

const ERROR_TYPE_HEADER: &str = "x-amzn-errortype";

pub(crate) async fn error_from_response(response: reqwest::Response) -> Error {
    let status = response.status().as_u16();
    let error_type = response
        .headers()
        .get(ERROR_TYPE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = response.text().await.unwrap_or_default();
    map_service_error(status, error_type.as_deref(), &body)
}

/// Map an AWS JSON error response to [`Error::Backend`].
///
/// The error kind comes from `x-amzn-ErrorType` (e.g.
/// `ThrottlingException:http://internal.amazon.com/...`) or the body's
/// `__type`; the message from the body's `message` or `Message`.
pub fn map_service_error(status: u16, error_type: Option<&str>, body: &str) -> Error {
    let json: Option<Value> = serde_json::from_str(body).ok();

    let kind = error_type
        .map(str::to_string)
        .or_else(|| {
            json.as_ref()
                .and_then(|j| j.get("__type"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .map(|k| short_error_kind(&k).to_string())
        .filter(|k| !k.is_empty());

    let message = json
        .as_ref()
        .and_then(|j| j.get("message").or_else(|| j.get("Message")))
        .and_then(Value::as_str)
        .map(str::to_string)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| match &kind {
            Some(kind) => format!("{kind} (HTTP {status})"),
            None if !body.trim().is_empty() && json.is_none() => body.trim().to_string(),
            None => format!("Bedrock request failed with HTTP {status}"),
        });

    Error::Backend {
        status: Some(status),
        kind,
        message,
    }
}

fn short_error_kind(raw: &str) -> &str {
    let raw = raw.split(':').next().unwrap_or(raw);
    raw.rsplit('#').next().unwrap_or(raw)
}
