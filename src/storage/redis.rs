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

// Redis cache backend: latest value per key plus a metadata hash

use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use serde_json::Value;
use std::sync::Mutex;
use tracing::{debug, info};

use super::backend::{Backend, EventWriter};
use crate::config::RedisConfig;
use crate::error::BackendError;
use crate::event::{Event, Metadata, WriteAck};

pub struct RedisBackend {
    conn: Mutex<Option<MultiplexedConnection>>,
}

impl RedisBackend {
    pub async fn connect(config: &RedisConfig) -> Result<Self> {
        let client = redis::Client::open(config.url.as_str()).context("Invalid Redis URL")?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .context("Failed to connect to Redis")?;

        info!("Connected to Redis");
        Ok(Self {
            conn: Mutex::new(Some(conn)),
        })
    }

    /// Cheap clone of the shared multiplexed connection
    fn connection(&self) -> Result<MultiplexedConnection, BackendError> {
        let guard = self
            .conn
            .lock()
            .map_err(|_| BackendError::rejected("redis connection lock poisoned"))?;
        guard.clone().ok_or_else(|| BackendError::closed("redis"))
    }
}

/// Key holding the metadata hash of `key`
pub fn meta_key(key: &str) -> String {
    format!("{}:meta", key)
}

/// Hash fields for the metadata map; strings are stored raw, everything else as JSON
pub fn metadata_fields(metadata: &Metadata) -> Vec<(String, String)> {
    metadata
        .iter()
        .map(|(k, v)| {
            let text = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), text)
        })
        .collect()
}

#[async_trait]
impl Backend for RedisBackend {
    fn name(&self) -> &str {
        "redis"
    }

    async fn health_check(&self) -> Result<bool, BackendError> {
        let mut conn = self.connection()?;
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(pong == "PONG")
    }

    async fn close(&self) -> Result<(), BackendError> {
        // Dropping the last clone shuts the multiplexed connection down
        let released = self
            .conn
            .lock()
            .map_err(|_| BackendError::rejected("redis connection lock poisoned"))?
            .take();
        if released.is_some() {
            debug!("Redis connection released");
        }
        Ok(())
    }
}

#[async_trait]
impl EventWriter for RedisBackend {
    async fn write(&self, event: &Event) -> Result<WriteAck, BackendError> {
        let mut conn = self.connection()?;

        let _: () = conn.set(&event.key, event.value).await?;

        // HSET with no fields is an error on the server side
        let fields = metadata_fields(&event.metadata);
        if !fields.is_empty() {
            let _: () = conn.hset_multiple(meta_key(&event.key), fields.as_slice()).await?;
        }

        Ok(WriteAck::Written)
    }
}
