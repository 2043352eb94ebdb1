//! AWS Signature Version 4 for Bedrock runtime and agent-runtime calls.

use std::fmt;
use std::sync::Arc;

use bedrock_chat_common::Result;
use chrono::{DateTime, Utc};
use ring::{digest, hmac};
use url::Url;

use crate::credentials::{AwsCredentials, CredentialsProvider};

const AWS_ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Signing name shared by `bedrock-runtime` and `bedrock-agent-runtime`.
pub const BEDROCK_SERVICE: &str = "bedrock";

/// Headers to attach to the outbound request, lowercase names.
pub type SignedHeaders = Vec<(String, String)>;

pub struct RequestSigner {
    credentials: Arc<dyn CredentialsProvider>,
    region: String,
    service: String,
}

impl RequestSigner {
    pub fn new(credentials: Arc<dyn CredentialsProvider>, region: impl Into<String>) -> Self {
        Self {
            credentials,
            region: region.into(),
            service: BEDROCK_SERVICE.to_string(),
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Sign a request with the current time and freshly resolved credentials.
    pub async fn sign(&self, method: &str, url: &Url, body: &[u8]) -> Result<SignedHeaders> {
        let credentials = self.credentials.credentials().await?;
        Ok(self.sign_at(method, url, body, &credentials, Utc::now()))
    }

    pub fn sign_at(
        &self,
        method: &str,
        url: &Url,
        body: &[u8],
        credentials: &AwsCredentials,
        timestamp: DateTime<Utc>,
    ) -> SignedHeaders {
        let payload_hash = sha256_hex(body);
        let amz_date = format_datetime(&timestamp);

        let mut headers: SignedHeaders = vec![
            ("host".to_string(), host_header(url)),
            ("x-amz-content-sha256".to_string(), payload_hash.clone()),
            ("x-amz-date".to_string(), amz_date),
        ];
        if let Some(token) = credentials.session_token() {
            headers.push(("x-amz-security-token".to_string(), token.to_string()));
        }

        let authorization = authorization_header(
            method,
            url.path(),
            url.query().unwrap_or(""),
            &headers,
            &payload_hash,
            credentials,
            &self.region,
            &self.service,
            &timestamp,
        );

        // reqwest derives `host` from the URL itself.
        headers.retain(|(name, _)| name != "host");
        headers.push(("authorization".to_string(), authorization));
        headers
    }
}

impl fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestSigner")
            .field("credentials", &self.credentials.name())
            .field("region", &self.region)
            .field("service", &self.service)
            .finish()
    }
}

/// Percent-encode a single path segment (model ids and ARNs contain `:` and `/`).
pub fn encode_path_segment(segment: &str) -> String {
    uri_encode(segment, true)
}

fn host_header(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.format("%Y%m%dT%H%M%SZ").to_string()
}

fn format_date_stamp(dt: &DateTime<Utc>) -> String {
    dt.format("%Y%m%d").to_string()
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(digest::digest(&digest::SHA256, data))
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let key = hmac::Key::new(hmac::HMAC_SHA256, key);
    hmac::sign(&key, data).as_ref().to_vec()
}

fn derive_signing_key(secret_key: &str, date_stamp: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(format!("AWS4{secret_key}").as_bytes(), date_stamp.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

fn uri_encode(input: &str, encode_slash: bool) -> String {
    let mut result = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                result.push(byte as char);
            }
            b'/' if !encode_slash => result.push('/'),
            _ => result.push_str(&format!("%{byte:02X}")),
        }
    }
    result
}

fn canonical_query_string(query: &str) -> String {
    let mut params: Vec<(String, String)> = query
        .split('&')
        .filter(|p| !p.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (uri_encode(key, true), uri_encode(value, true))
        })
        .collect();
    params.sort();
    params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

fn signed_header_names(headers: &[(String, String)]) -> String {
    let mut names: Vec<String> = headers.iter().map(|(n, _)| n.to_lowercase()).collect();
    names.sort();
    names.join(";")
}

fn canonical_headers(headers: &[(String, String)]) -> String {
    let mut sorted: Vec<(String, String)> = headers
        .iter()
        .map(|(n, v)| (n.to_lowercase(), v.trim().to_string()))
        .collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));
    sorted.iter().map(|(n, v)| format!("{n}:{v}\n")).collect()
}

fn canonical_request(
    method: &str,
    path: &str,
    query: &str,
    headers: &[(String, String)],
    payload_hash: &str,
) -> String {
    let path = if path.is_empty() { "/" } else { path };
    format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        method,
        uri_encode(path, false),
        canonical_query_string(query),
        canonical_headers(headers),
        signed_header_names(headers),
        payload_hash
    )
}

#[allow(clippy::too_many_arguments)]
fn authorization_header(
    method: &str,
    path: &str,
    query: &str,
    headers: &[(String, String)],
    payload_hash: &str,
    credentials: &AwsCredentials,
    region: &str,
    service: &str,
    timestamp: &DateTime<Utc>,
) -> String {
    let date_stamp = format_date_stamp(timestamp);
    let scope = format!("{date_stamp}/{region}/{service}/aws4_request");

    let request = canonical_request(method, path, query, headers, payload_hash);
    let string_to_sign = format!(
        "{AWS_ALGORITHM}\n{}\n{scope}\n{}",
        format_datetime(timestamp),
        sha256_hex(request.as_bytes())
    );

    let key = derive_signing_key(credentials.secret_access_key(), &date_stamp, region, service);
    let signature = hex::encode(hmac_sha256(&key, string_to_sign.as_bytes()));

    format!(
        "{AWS_ALGORITHM} Credential={}/{scope}, SignedHeaders={}, Signature={signature}",
        credentials.access_key_id(),
        signed_header_names(headers),
    )
}
