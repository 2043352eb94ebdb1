use bedrock_chat_common::Result;
use futures::StreamExt;
use tracing::trace;

use crate::backend::BackendResult;

/// Collapse a backend result into the full reply text.
///
/// Streamed chunks are consumed to exhaustion in arrival order. Chunks
/// without a payload are skipped. Payload bytes are concatenated before UTF-8
/// decoding so a character split across two chunks survives. The first
/// stream error aborts the drain; no partial reply is returned.
pub async fn drain(result: BackendResult) -> Result<String> {
    match result {
        BackendResult::Complete(text) => Ok(text),
        BackendResult::Streamed(mut chunks) => {
            let mut buf: Vec<u8> = Vec::new();
            let mut count = 0usize;
            while let Some(chunk) = chunks.next().await {
                let chunk = chunk?;
                count += 1;
                if let Some(bytes) = chunk.bytes {
                    buf.extend_from_slice(&bytes);
                }
            }
            trace!(chunks = count, bytes = buf.len(), "stream drained");
            Ok(String::from_utf8_lossy(&buf).into_owned())
        }
    }
}

#[cfg(test)]
mod tests {
    use bedrock_chat_common::Error;
    use futures::stream;

    use super::*;
    use crate::backend::ResponseChunk;

    fn streamed(chunks: Vec<Result<ResponseChunk>>) -> BackendResult {
        BackendResult::Streamed(Box::pin(stream::iter(chunks)))
    }

    #[tokio::test]
    async fn complete_text_is_returned_directly() {
        let text = drain(BackendResult::Complete("done".to_string())).await.unwrap();
        assert_eq!(text, "done");
    }

    #[tokio::test]
    async fn chunks_are_concatenated_in_order() {
        let result = streamed(vec![
            Ok(ResponseChunk::new(&b"He"[..])),
            Ok(ResponseChunk::new(&b"llo"[..])),
        ]);
        assert_eq!(drain(result).await.unwrap(), "Hello");
    }

    #[tokio::test]
    async fn zero_chunks_yield_empty_string() {
        assert_eq!(drain(streamed(vec![])).await.unwrap(), "");
    }

    #[tokio::test]
    async fn chunks_without_payload_are_skipped() {
        let result = streamed(vec![
            Ok(ResponseChunk::new(&b"a"[..])),
            Ok(ResponseChunk::empty()),
            Ok(ResponseChunk::new(&b"b"[..])),
        ]);
        assert_eq!(drain(result).await.unwrap(), "ab");
    }

    #[tokio::test]
    async fn multibyte_character_split_across_chunks() {
        let bytes = "héllo".as_bytes();
        let result = streamed(vec![
            Ok(ResponseChunk::new(bytes[..2].to_vec())),
            Ok(ResponseChunk::new(bytes[2..].to_vec())),
        ]);
        assert_eq!(drain(result).await.unwrap(), "héllo");
    }

    #[tokio::test]
    async fn stream_error_aborts_without_partial_reply() {
        let result = streamed(vec![
            Ok(ResponseChunk::new(&b"partial"[..])),
            Err(Error::Stream("connection reset".to_string())),
            Ok(ResponseChunk::new(&b"never"[..])),
        ]);
        let err = drain(result).await.unwrap_err();
        assert!(err.to_string().contains("connection reset"));
    }
}
