use std::time::Duration;

use bedrock_chat_common::{Error, Result};
use bedrock_chat_security::RequestSigner;
use reqwest::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::Value;
use tracing::debug;
use url::Url;

use super::error::error_from_response;

/// Long-lived client shared by every request: one connection pool, one signer.
#[derive(Debug)]
pub struct BedrockClient {
    http: Client,
    signer: RequestSigner,
}

impl BedrockClient {
    /// `timeout_secs` bounds the whole call, including reading a streamed body.
    pub fn new(signer: RequestSigner, timeout_secs: u64) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self { http, signer })
    }

    pub fn region(&self) -> &str {
        self.signer.region()
    }

    /// Sign and POST a JSON body. Non-2xx responses become [`Error::Backend`].
    pub async fn post_json(&self, url: &str, body: &Value, accept: &str) -> Result<reqwest::Response> {
        let url = Url::parse(url)
            .map_err(|e| Error::Config(format!("invalid endpoint url {url}: {e}")))?;
        let payload = serde_json::to_vec(body)?;
        let signed = self.signer.sign("POST", &url, &payload).await?;

        debug!(path = %url.path(), bytes = payload.len(), "calling bedrock");

        let mut request = self
            .http
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, accept);
        for (name, value) in &signed {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.body(payload).send().await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        Ok(response)
    }
}
