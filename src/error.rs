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

// Error types shared by the mesh and its backend adapters

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Failure class of a single backend call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Could not reach the backend (refused, DNS, broken connection)
    Connectivity,
    /// The call did not finish within its deadline
    Timeout,
    /// Input rejected before any backend was contacted
    Validation,
    /// The backend answered with an error
    Rejected,
    /// Payload could not be encoded or a response could not be decoded
    Serialization,
    /// The handle was already released by `close()`
    Closed,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Connectivity => "connectivity",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Validation => "validation",
            ErrorKind::Rejected => "rejected",
            ErrorKind::Serialization => "serialization",
            ErrorKind::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Result of one backend call that did not succeed
#[derive(Debug, Clone, PartialEq, Error)]
#[error("error: {message}")]
pub struct BackendError {
    pub kind: ErrorKind,
    pub message: String,
}

impl BackendError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn connectivity(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Connectivity, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Rejected, message)
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Serialization, message)
    }

    pub fn closed(backend: &str) -> Self {
        Self::new(ErrorKind::Closed, format!("{} handle is closed", backend))
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            BackendError::timeout(e.to_string())
        } else if e.is_connect() || e.is_request() {
            BackendError::connectivity(e.to_string())
        } else if e.is_decode() || e.is_body() {
            BackendError::serialization(e.to_string())
        } else {
            BackendError::rejected(e.to_string())
        }
    }
}

impl From<sqlx::Error> for BackendError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::PoolTimedOut => BackendError::timeout(e.to_string()),
            sqlx::Error::PoolClosed => BackendError::new(ErrorKind::Closed, e.to_string()),
            sqlx::Error::Io(_) | sqlx::Error::Tls(_) => BackendError::connectivity(e.to_string()),
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) | sqlx::Error::Encode(_) => {
                BackendError::serialization(e.to_string())
            }
            _ => BackendError::rejected(e.to_string()),
        }
    }
}

impl From<redis::RedisError> for BackendError {
    fn from(e: redis::RedisError) -> Self {
        if e.is_timeout() {
            BackendError::timeout(e.to_string())
        } else if e.is_connection_refusal() || e.is_connection_dropped() || e.is_io_error() {
            BackendError::connectivity(e.to_string())
        } else {
            BackendError::rejected(e.to_string())
        }
    }
}

impl From<mongodb::error::Error> for BackendError {
    fn from(e: mongodb::error::Error) -> Self {
        use mongodb::error::ErrorKind as MongoKind;

        match e.kind.as_ref() {
            MongoKind::Io(_) | MongoKind::ServerSelection { .. } | MongoKind::DnsResolve { .. } => {
                BackendError::connectivity(e.to_string())
            }
            MongoKind::BsonSerialization(_) | MongoKind::BsonDeserialization(_) => {
                BackendError::serialization(e.to_string())
            }
            MongoKind::Shutdown => BackendError::new(ErrorKind::Closed, e.to_string()),
            _ => BackendError::rejected(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(e: serde_json::Error) -> Self {
        BackendError::serialization(e.to_string())
    }
}

/// Errors raised by mesh-level operations (as opposed to per-backend results)
#[derive(Debug, Error)]
pub enum MeshError {
    #[error("backend '{0}' is not configured")]
    BackendNotConfigured(String),

    #[error("backend '{backend}' failed: {source}")]
    Backend {
        backend: String,
        #[source]
        source: BackendError,
    },

    #[error("failed to close {} backend(s): {}", .0.len(), describe_failures(.0))]
    Close(Vec<(String, BackendError)>),
}

fn describe_failures(failures: &[(String, BackendError)]) -> String {
    failures
        .iter()
        .map(|(name, e)| format!("{} ({})", name, e.message))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_display_has_error_prefix() {
        let e = BackendError::connectivity("connection refused");
        assert_eq!(e.to_string(), "error: connection refused");
        assert_eq!(e.kind, ErrorKind::Connectivity);
    }

    #[test]
    fn test_closed_error_names_backend() {
        let e = BackendError::closed("redis");
        assert_eq!(e.kind, ErrorKind::Closed);
        assert!(e.message.contains("redis"));
    }

    #[test]
    fn test_close_error_lists_every_failure() {
        let e = MeshError::Close(vec![
            ("redis".to_string(), BackendError::rejected("boom")),
            ("mongodb".to_string(), BackendError::timeout("slow")),
        ]);
        let text = e.to_string();
        assert!(text.contains("2 backend(s)"));
        assert!(text.contains("redis (boom)"));
        assert!(text.contains("mongodb (slow)"));
    }
}
