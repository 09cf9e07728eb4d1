use hmac::{Hmac, Mac};
use reqwest::StatusCode;
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Asana appends the rule's submission form link below this line.
pub const FORM_FOOTER_SEPARATOR: &str = "———————————————";

pub const SIGNATURE_HEADER: &str = "X-Asana-Request-Signature";

/// The `notes` text up to the first form footer separator.
pub fn strip_form_footer(notes: &str) -> &str {
    notes
        .split_once(FORM_FOOTER_SEPARATOR)
        .map_or(notes, |(head, _)| head)
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TaskDetails {
    pub notes: String,
    pub permalink_url: String,
}

#[derive(Debug, Deserialize)]
struct TaskEnvelope {
    data: TaskDetails,
}

#[derive(Debug, thiserror::Error)]
pub enum TaskFetchError {
    #[error("asana request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("asana returned {0}")]
    Status(StatusCode),
    #[error("unexpected task payload: {0}")]
    Shape(#[from] serde_json::Error),
}

/// Client for the Asana REST API (1.0).
pub struct AsanaClient {
    http: reqwest::Client,
    api_base: String,
    bearer: String,
}

impl AsanaClient {
    pub fn new(http: reqwest::Client, api_base: &str, bearer: String) -> Self {
        Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            bearer,
        }
    }

    pub async fn fetch_task(&self, task_id: u64) -> Result<TaskDetails, TaskFetchError> {
        let resp = self
            .http
            .get(format!("{}/tasks/{}", self.api_base, task_id))
            .bearer_auth(&self.bearer)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(TaskFetchError::Status(resp.status()));
        }

        let body = resp.bytes().await?;
        let envelope: TaskEnvelope = serde_json::from_slice(&body)?;
        Ok(envelope.data)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("missing header: {0}")]
    MissingHeader(&'static str),
    #[error("invalid header: {0}")]
    InvalidHeader(&'static str),
    #[error("signature mismatch")]
    SignatureMismatch,
}

/// Check an app component request signature: hex HMAC-SHA256 of `message`
/// (the query string for GET, the raw body for POST) keyed by the client secret.
pub fn verify_asana_signature(
    client_secret: &str,
    message: &[u8],
    signature: Option<&str>,
) -> Result<(), SignatureError> {
    let signature = signature
        .ok_or(SignatureError::MissingHeader(SIGNATURE_HEADER))?
        .trim();
    if signature.is_empty() {
        return Err(SignatureError::InvalidHeader(SIGNATURE_HEADER));
    }

    let mut mac = HmacSha256::new_from_slice(client_secret.as_bytes())
        .map_err(|_| SignatureError::SignatureMismatch)?;
    mac.update(message);
    let expected = hex::encode(mac.finalize().into_bytes());

    let given = signature.to_ascii_lowercase();
    if expected.as_bytes().ct_eq(given.as_bytes()).unwrap_u8() != 1 {
        return Err(SignatureError::SignatureMismatch);
    }

    Ok(())
}

#[cfg(test)]
pub fn sign(client_secret: &str, message: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(client_secret.as_bytes()).unwrap();
    mac.update(message);
    hex::encode(mac.finalize().into_bytes())
}
