//! Typed JSON payloads carried after the header.
//!
//! INIT carries an [`InitPayload`] descriptor; DATA carries a
//! [`DataPayload`] batch of sensor readings.  ACK, END and HEARTBEAT carry
//! nothing.  Decoding never panics: anything that is not valid UTF-8 JSON of
//! the right shape becomes a [`PayloadError`], which the server treats as a
//! degraded-but-logged packet.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Protocol name announced in the INIT descriptor.
pub const PROTOCOL_NAME: &str = "AUDP-X";

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("payload is not valid UTF-8")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("payload is not a valid JSON document: {0}")]
    Json(#[from] serde_json::Error),
}

/// Session descriptor sent with INIT.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitPayload {
    pub proto: String,
    pub version: u8,
    pub info: String,
}

impl InitPayload {
    pub fn new(version: u8) -> Self {
        Self {
            proto: PROTOCOL_NAME.to_string(),
            version,
            info: "init".to_string(),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, PayloadError> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// One synthetic sensor reading.
///
/// Every field is optional on the way in: a reading only has to be a JSON
/// value inside the `batch` list to count towards the batch size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Absent or non-integer ids are excluded from the completeness check.
    #[serde(default, deserialize_with = "lenient_id")]
    pub reading_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_value")]
    pub value: Option<f64>,
    #[serde(default, deserialize_with = "lenient_unit")]
    pub unit: Option<String>,
}

/// Body of a DATA packet.  A missing `batch` key is an empty batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataPayload {
    #[serde(default)]
    pub batch: Vec<Reading>,
}

impl DataPayload {
    pub fn encode(&self) -> Result<Vec<u8>, PayloadError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, PayloadError> {
        let text = std::str::from_utf8(bytes)?;
        Ok(serde_json::from_str(text)?)
    }

    /// Reading ids expected in `[first_id, first_id + batch.len() - 1]` but
    /// not present in the batch, ascending.
    ///
    /// An empty batch, or one with no usable ids at all, reports nothing.
    pub fn missing_ids(&self, first_id: i64) -> Vec<i64> {
        let present: BTreeSet<i64> = self.batch.iter().filter_map(|r| r.reading_id).collect();
        if present.is_empty() {
            return Vec::new();
        }
        (first_id..first_id + self.batch.len() as i64)
            .filter(|id| !present.contains(id))
            .collect()
    }
}

fn lenient_id<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value.as_i64())
}

fn lenient_value<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value.as_f64())
}

fn lenient_unit<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value.as_str().map(str::to_string))
}
