//! Response normalization
//!
//! The cluster answers with a JSON array, a single JSON object, or
//! newline-delimited objects depending on the endpoint and response mode.
//! Everything is folded into `ResponseBody` here so callers see one shape,
//! and error records hidden inside a 2xx body are surfaced as errors.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::{TransportError, TransportResult};
use crate::replication::null_as_default;

/// A parsed response body
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Empty,
    Single(Value),
    Many(Vec<Value>),
}

impl ResponseBody {
    /// Parse a raw body.
    ///
    /// Whole-document JSON is tried first; if that fails the body is read
    /// as one JSON value per non-blank line.
    pub fn parse(body: &str) -> TransportResult<Self> {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            return Ok(ResponseBody::Empty);
        }

        if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
            return match value {
                Value::Array(items) => Ok(ResponseBody::Many(items)),
                Value::Object(_) => Ok(ResponseBody::Single(value)),
                Value::Null => Ok(ResponseBody::Empty),
                other => Err(TransportError::InvalidResponseShape(format!(
                    "expected object or array, got {}",
                    other
                ))),
            };
        }

        let mut records = Vec::new();
        for (lineno, line) in trimmed.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let value: Value = serde_json::from_str(line).map_err(|e| {
                TransportError::InvalidResponseShape(format!("line {}: {}", lineno + 1, e))
            })?;
            records.push(value);
        }
        Ok(ResponseBody::Many(records))
    }

    /// Flatten into a list of records
    pub fn into_records(self) -> Vec<Value> {
        match self {
            ResponseBody::Empty => Vec::new(),
            ResponseBody::Single(value) => vec![value],
            ResponseBody::Many(values) => values,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ResponseBody::Empty => true,
            ResponseBody::Single(_) => false,
            ResponseBody::Many(values) => values.is_empty(),
        }
    }
}

/// Parse a body into records, failing on the first embedded error record.
pub fn parse_records(body: &str) -> TransportResult<Vec<Value>> {
    let records = ResponseBody::parse(body)?.into_records();
    if let Some(err) = records.iter().find_map(error_from_record) {
        return Err(err);
    }
    Ok(records)
}

/// True for records the cluster uses to report failure inside a body
pub fn is_error_record(record: &Value) -> bool {
    if record.get("type").and_then(Value::as_str) == Some("error") {
        return true;
    }
    record.get("code").is_some() && record.get("message").is_some() && record.get("cid").is_none()
}

fn error_from_record(record: &Value) -> Option<TransportError> {
    if !is_error_record(record) {
        return None;
    }
    let message = record
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("unknown cluster error");
    let code = record.get("code").and_then(Value::as_i64).unwrap_or(0);
    Some(TransportError::cluster(message, code))
}

/// Message to report for a non-2xx body: its `message` field when it is
/// JSON, the raw text otherwise.
pub fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

/// A CID given either as a plain string or as a `{"/": "<cid>"}` link
pub fn extract_cid(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Object(map) => map.get("/").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

/// Unsigned integer given as a JSON number or a decimal string
pub fn value_as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Deserialize one record into a typed value
pub fn decode<T: DeserializeOwned>(record: Value) -> TransportResult<T> {
    serde_json::from_value(record).map_err(|e| TransportError::InvalidResponseShape(e.to_string()))
}

/// One entry returned by `/add`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddedRecord {
    pub name: String,
    pub cid: String,
    pub size: u64,
}

impl AddedRecord {
    pub fn from_record(record: &Value) -> TransportResult<Self> {
        let cid = record
            .get("cid")
            .and_then(extract_cid)
            .ok_or_else(|| TransportError::InvalidResponseShape(format!("add record without cid: {}", record)))?;
        let name = record
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let size = record.get("size").and_then(value_as_u64).unwrap_or(0);
        Ok(Self { name, cid, size })
    }
}

/// One entry returned by `/peers`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub peername: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub addresses: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub error: String,
}

impl PeerRecord {
    pub fn is_online(&self) -> bool {
        self.error.is_empty()
    }
}

/// One freespace metric from `/monitor/metrics/freespace`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreespaceMetric {
    pub peer: String,
    pub bytes: u64,
}

impl FreespaceMetric {
    /// Returns None for records without a peer or an unparseable value
    pub fn from_record(record: &Value) -> Option<Self> {
        let peer = record.get("peer").and_then(Value::as_str)?;
        let bytes = record.get("value").and_then(value_as_u64)?;
        Some(Self {
            peer: peer.to_string(),
            bytes,
        })
    }
}
