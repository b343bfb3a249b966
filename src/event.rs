// Copyright 2025 coScene
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::error::BackendError;

pub type Metadata = Map<String, Value>;

/// One logical event fanned out to every backend
///
/// Built once per `write_event` call and dropped after dispatch; each backend
/// persists its own copy in its own shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub key: String,
    pub value: f64,
    pub metadata: Metadata,
    #[serde(rename = "ts")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "ts_unix")]
    pub timestamp_unix: i64,
}

impl Event {
    /// Create an event stamped with the current time
    pub fn new(
        key: impl Into<String>,
        value: f64,
        metadata: Option<Metadata>,
    ) -> Result<Self, BackendError> {
        Self::at(key, value, metadata, Utc::now())
    }

    /// Create an event with an explicit timestamp
    pub fn at(
        key: impl Into<String>,
        value: f64,
        metadata: Option<Metadata>,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, BackendError> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(BackendError::validation("event key must not be empty"));
        }
        if !value.is_finite() {
            return Err(BackendError::validation(format!(
                "event value must be finite, got {}",
                value
            )));
        }

        Ok(Self {
            key,
            value,
            metadata: metadata.unwrap_or_default(),
            timestamp,
            timestamp_unix: timestamp.timestamp(),
        })
    }
}

/// A record read back from a backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub ts: DateTime<Utc>,
    pub key: String,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl StoredEvent {
    pub fn from_unix(ts_unix: i64, key: String, value: f64) -> Result<Self, BackendError> {
        let ts = Utc
            .timestamp_opt(ts_unix, 0)
            .single()
            .ok_or_else(|| BackendError::serialization(format!("invalid timestamp {}", ts_unix)))?;
        Ok(Self {
            ts,
            key,
            value,
            metadata: None,
        })
    }

    /// Turn a stored record back into an event for re-dispatch, keeping its timestamp
    pub fn to_event(&self) -> Result<Event, BackendError> {
        let metadata = match &self.metadata {
            Some(Value::Object(map)) => Some(map.clone()),
            _ => None,
        };
        Event::at(self.key.clone(), self.value, metadata, self.ts)
    }
}

/// Successful write acknowledgment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteAck {
    /// The backend accepted the write
    Written,
    /// Pull-based backend; nothing to push
    PullBased,
}

impl fmt::Display for WriteAck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteAck::Written => f.write_str("ok"),
            WriteAck::PullBased => f.write_str("ok (pull-based, no push needed)"),
        }
    }
}

impl Serialize for WriteAck {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Build a metadata map from `key=value` pairs, parsing values as JSON when possible
pub fn parse_metadata_pairs<I, S>(pairs: I) -> Result<Metadata, BackendError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut metadata = Metadata::new();
    for pair in pairs {
        let pair = pair.as_ref();
        let (k, v) = pair
            .split_once('=')
            .ok_or_else(|| BackendError::validation(format!("expected key=value, got '{}'", pair)))?;
        let value = serde_json::from_str(v).unwrap_or_else(|_| Value::String(v.to_string()));
        metadata.insert(k.to_string(), value);
    }
    Ok(metadata)
}
