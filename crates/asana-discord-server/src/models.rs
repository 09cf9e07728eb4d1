use chrono::{DateTime, NaiveDate, Utc};
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};

/// RFC 3339 timestamp, or a bare `YYYY-MM-DD` date read as midnight UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

fn de_timestamp<'de, D: Deserializer<'de>>(de: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(de)?;
    parse_timestamp(&raw).ok_or_else(|| D::Error::custom(format!("invalid timestamp {raw:?}")))
}

fn de_opt_timestamp<'de, D: Deserializer<'de>>(
    de: D,
) -> Result<Option<DateTime<Utc>>, D::Error> {
    match Option::<String>::deserialize(de)? {
        Some(raw) => parse_timestamp(&raw)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("invalid timestamp {raw:?}"))),
        None => Ok(None),
    }
}

/// Query string Asana sends when it renders the action form.
#[derive(Debug, Clone, Deserialize)]
pub struct MetadataQuery {
    pub action: Option<String>,
    pub action_type: String,
    pub project: String,
    pub workspace: String,
    pub user: String,
    #[serde(deserialize_with = "de_timestamp")]
    pub expires_at: DateTime<Utc>,
}

/// Outer body of Asana's POST callbacks; `data` is itself a JSON document.
#[derive(Debug, Deserialize)]
struct Envelope {
    data: String,
}

#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("invalid request body: {0}")]
    Envelope(#[source] serde_json::Error),
    #[error("invalid data payload: {0}")]
    Data(#[source] serde_json::Error),
    #[error("invalid discord channel id: {0:?}")]
    ChannelId(String),
}

/// Decode `{"data": "<json>"}` and then the embedded document as `T`.
pub fn decode_envelope<T: DeserializeOwned>(body: &[u8]) -> Result<T, PayloadError> {
    let envelope: Envelope = serde_json::from_slice(body).map_err(PayloadError::Envelope)?;
    serde_json::from_str(&envelope.data).map_err(PayloadError::Data)
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitValues {
    pub discord_channel_id: String,
}

/// Form submission (`on_submit_callback`).
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitData {
    pub action: String,
    pub values: SubmitValues,
    #[serde(default, deserialize_with = "de_opt_timestamp")]
    pub expires_at: Option<DateTime<Utc>>,
    pub user: Option<u64>,
    pub workspace: Option<u64>,
    pub project: Option<u64>,
    pub task: Option<String>,
    pub rule_name: Option<String>,
    pub action_type: Option<String>,
}

/// Rule trigger (`run_action_url`).
#[derive(Debug, Clone, Deserialize)]
pub struct RunData {
    pub action: String,
    pub idempotency_key: String,
    pub target_object: Option<u64>,
    #[serde(default, deserialize_with = "de_opt_timestamp")]
    pub expires_at: Option<DateTime<Utc>>,
    pub user: Option<u64>,
    pub workspace: Option<u64>,
    pub project: Option<u64>,
    pub action_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FormMetadata {
    pub template: &'static str,
    pub metadata: FormBody,
}

#[derive(Debug, Serialize)]
pub struct FormBody {
    pub title: String,
    pub on_submit_callback: String,
    pub fields: Vec<FormField>,
}

#[derive(Debug, Serialize)]
pub struct FormField {
    pub id: &'static str,
    pub is_required: bool,
    pub name: &'static str,
    pub placeholder: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub value: String,
    pub width: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ActionResult {
    pub action_result: &'static str,
}
