//! Conversion service wire types and response normalization.
//!
//! The service answers with loosely-shaped JSON: most fields are optional
//! and the lifecycle state is a free-form string. Everything here is
//! deserialized leniently and then interpreted into the typed
//! [`dcut_core`] domain values.

use std::borrow::Cow;

use serde::Deserialize;
use serde_json::Value;

use dcut_core::lifecycle::JobState;
use dcut_core::status::{normalize_progress, LabelMeta, PollResult};

// ---------------------------------------------------------------------------
// Upload
// ---------------------------------------------------------------------------

/// Body returned by `POST /upload`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmitResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub ticket_id: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub bytes_received: Option<u64>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Acknowledgement of an accepted upload.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SubmitAck {
    pub message: Option<String>,
    /// State reported with the acknowledgement, if it was recognisable.
    pub state: Option<JobState>,
    pub bytes_received: Option<u64>,
}

impl From<SubmitResponse> for SubmitAck {
    fn from(r: SubmitResponse) -> Self {
        Self {
            message: r.message.or(r.status),
            state: r
                .state
                .as_deref()
                .and_then(|s| JobState::from_str_wire(s.trim()).ok())
                .filter(|s| !s.is_client_only()),
            bytes_received: r.bytes_received,
        }
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Upload counters inside a status snapshot.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadSnapshot {
    #[serde(default)]
    pub bytes_received: Option<u64>,
    #[serde(default)]
    pub bytes_total: Option<u64>,
    #[serde(default)]
    pub progress: Option<f64>,
}

/// Body returned by `GET /status`.
///
/// `state` and `label_meta` are kept as raw JSON so a malformed value
/// degrades to `unknown` / no metadata instead of failing the whole poll.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusResponse {
    #[serde(default)]
    pub ticket_id: Option<String>,
    #[serde(default)]
    pub state: Option<Value>,
    #[serde(default)]
    pub upload: Option<UploadSnapshot>,
    #[serde(default)]
    pub label_meta: Option<Value>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub detail: Option<Value>,
    #[serde(default)]
    pub message: Option<String>,
}

impl StatusResponse {
    /// Interpret the raw snapshot.
    pub fn into_poll_result(self) -> PollResult {
        let state = JobState::from_reported(self.state.as_ref().and_then(Value::as_str));

        let upload = self.upload.unwrap_or_default();
        let progress = normalize_progress(upload.progress.or_else(|| {
            match (upload.bytes_received, upload.bytes_total) {
                (Some(received), Some(total)) if total > 0 => {
                    Some(received as f64 / total as f64)
                }
                _ => None,
            }
        }));

        let label_meta = self.label_meta.filter(|v| !v.is_null()).and_then(|raw| {
            match serde_json::from_value::<LabelMeta>(raw) {
                Ok(meta) => Some(meta),
                Err(e) => {
                    tracing::warn!(error = %e, "Ignoring malformed label metadata");
                    None
                }
            }
        });

        let message = self
            .error_message
            .filter(|m| !m.trim().is_empty())
            .or_else(|| self.detail.as_ref().and_then(flatten_detail))
            .or(self.message.filter(|m| !m.trim().is_empty()));

        PollResult {
            state,
            progress,
            bytes_received: upload.bytes_received,
            bytes_total: upload.bytes_total,
            label_meta,
            message,
        }
    }
}

// ---------------------------------------------------------------------------
// Cancel
// ---------------------------------------------------------------------------

/// Body returned by `POST /cancel`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CancelResponse {
    #[serde(default)]
    pub ticket_id: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CancelAck {
    pub message: Option<String>,
    pub state: Option<JobState>,
}

impl From<CancelResponse> for CancelAck {
    fn from(r: CancelResponse) -> Self {
        Self {
            message: r.message,
            state: r
                .state
                .as_deref()
                .and_then(|s| JobState::from_str_wire(s.trim()).ok()),
        }
    }
}

// ---------------------------------------------------------------------------
// Download
// ---------------------------------------------------------------------------

/// Result archive fetched from `GET /download`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Default name the service gives result archives.
pub fn default_result_file_name(ticket_id: &str) -> String {
    format!("{ticket_id}_output.zip")
}

/// Extract a safe file name from a `Content-Disposition` header value.
///
/// Prefers the RFC 5987 `filename*` parameter over plain `filename`, and
/// strips any directory components.
pub fn file_name_from_content_disposition(header: &str) -> Option<String> {
    let mut plain = None;
    let mut extended = None;

    for param in header.split(';').map(str::trim) {
        let Some((key, value)) = param.split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches('"');
        match key.trim().to_ascii_lowercase().as_str() {
            "filename*" => {
                // charset'lang'value
                let raw = value.splitn(3, '\'').nth(2).unwrap_or(value);
                extended = Some(percent_decode(raw));
            }
            "filename" => plain = Some(value.to_string()),
            _ => {}
        }
    }

    extended
        .or(plain)
        .map(|name| {
            name.rsplit(['/', '\\'])
                .next()
                .unwrap_or_default()
                .trim()
                .to_string()
        })
        .filter(|name| !name.is_empty() && name != "." && name != "..")
}

/// Decode an RFC 5987 value, replacing invalid UTF-8 rather than failing.
fn percent_decode(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(Cow::into_owned)
        .unwrap_or_else(|_| {
            String::from_utf8_lossy(&urlencoding::decode_binary(raw.as_bytes())).into_owned()
        })
}

// ---------------------------------------------------------------------------
// Error payloads
// ---------------------------------------------------------------------------

/// Flatten a structured error body into a human-readable message.
///
/// Understands `{"detail": "..."}`, `{"detail": [{"loc": [...], "msg":
/// "..."}, ...]}` (field-level messages joined with `"; "`), and
/// `{"message": ...}` / `{"error": ...}`. Returns `None` when the body
/// carries nothing usable.
pub fn flatten_error_body(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let obj = value.as_object()?;
    ["detail", "message", "error"]
        .iter()
        .filter_map(|key| obj.get(*key))
        .find_map(flatten_detail)
}

fn flatten_detail(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => non_empty(s),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(flatten_item).collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join("; "))
            }
        }
        Value::Object(_) => flatten_item(value),
        _ => None,
    }
}

fn flatten_item(item: &Value) -> Option<String> {
    match item {
        Value::String(s) => non_empty(s),
        Value::Object(obj) => {
            let msg = obj
                .get("msg")
                .or_else(|| obj.get("message"))
                .and_then(Value::as_str)
                .and_then(non_empty)?;
            let loc = obj
                .get("loc")
                .and_then(Value::as_array)
                .map(|parts| {
                    parts
                        .iter()
                        .filter_map(|p| match p {
                            // Request-section prefixes carry no information for the user.
                            Value::String(s) if matches!(s.as_str(), "body" | "query" | "form") => {
                                None
                            }
                            Value::String(s) => Some(s.clone()),
                            Value::Number(n) => Some(n.to_string()),
                            _ => None,
                        })
                        .collect::<Vec<_>>()
                        .join(".")
                })
                .unwrap_or_default();
            if loc.is_empty() {
                Some(msg)
            } else {
                Some(format!("{loc}: {msg}"))
            }
        }
        _ => None,
    }
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Message used when an error response has no structured payload.
pub fn generic_status_message(status: reqwest::StatusCode) -> String {
    format!("Request failed with status {status}")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
