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

// MongoDB document backend

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use futures_util::TryStreamExt;
use mongodb::bson::{self, doc, Bson, DateTime as BsonDateTime, Document};
use mongodb::{Client, Collection};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tracing::{debug, info};

use super::backend::{Backend, EventReader, EventWriter};
use crate::config::MongoConfig;
use crate::error::BackendError;
use crate::event::{Event, StoredEvent, WriteAck};

/// Document shape of one event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventDocument {
    pub ts: BsonDateTime,
    pub key: String,
    pub value: f64,
    #[serde(default)]
    pub metadata: Document,
    pub ts_unix: i64,
}

impl EventDocument {
    pub fn from_event(event: &Event) -> Result<Self, BackendError> {
        let metadata = bson::to_document(&event.metadata)
            .map_err(|e| BackendError::serialization(e.to_string()))?;
        Ok(Self {
            ts: BsonDateTime::from_millis(event.timestamp.timestamp_millis()),
            key: event.key.clone(),
            value: event.value,
            metadata,
            ts_unix: event.timestamp_unix,
        })
    }

    pub fn into_stored(self) -> Result<StoredEvent, BackendError> {
        let ts = Utc
            .timestamp_millis_opt(self.ts.timestamp_millis())
            .single()
            .ok_or_else(|| BackendError::serialization("document timestamp out of range"))?;
        let metadata = if self.metadata.is_empty() {
            None
        } else {
            Some(Bson::Document(self.metadata).into_relaxed_extjson())
        };
        Ok(StoredEvent {
            ts,
            key: self.key,
            value: self.value,
            metadata,
        })
    }
}

pub struct MongoBackend {
    client: Mutex<Option<Client>>,
    events: Collection<EventDocument>,
}

impl MongoBackend {
    pub async fn connect(config: &MongoConfig) -> Result<Self> {
        let client = Client::with_uri_str(&config.uri)
            .await
            .context("Failed to create MongoDB client")?;
        let events = client
            .database(&config.database)
            .collection::<EventDocument>(&config.collection);

        info!(
            "MongoDB client ready for {}.{}",
            config.database, config.collection
        );
        Ok(Self {
            client: Mutex::new(Some(client)),
            events,
        })
    }

    fn client(&self) -> Result<Client, BackendError> {
        let guard = self
            .client
            .lock()
            .map_err(|_| BackendError::rejected("mongodb client lock poisoned"))?;
        guard.clone().ok_or_else(|| BackendError::closed("mongodb"))
    }
}

#[async_trait]
impl Backend for MongoBackend {
    fn name(&self) -> &str {
        "mongodb"
    }

    async fn health_check(&self) -> Result<bool, BackendError> {
        let client = self.client()?;
        let reply = client.database("admin").run_command(doc! { "ping": 1 }).await?;
        Ok(reply.get_f64("ok").map(|ok| ok == 1.0).unwrap_or(true))
    }

    async fn close(&self) -> Result<(), BackendError> {
        let client = self
            .client
            .lock()
            .map_err(|_| BackendError::rejected("mongodb client lock poisoned"))?
            .take();
        if let Some(client) = client {
            client.shutdown().await;
            debug!("MongoDB client shut down");
        }
        Ok(())
    }
}

#[async_trait]
impl EventWriter for MongoBackend {
    async fn write(&self, event: &Event) -> Result<WriteAck, BackendError> {
        self.client()?;
        self.events
            .insert_one(EventDocument::from_event(event)?)
            .await?;
        Ok(WriteAck::Written)
    }
}

#[async_trait]
impl EventReader for MongoBackend {
    async fn fetch(&self, key: &str, limit: Option<u32>) -> Result<Vec<StoredEvent>, BackendError> {
        self.client()?;

        let mut find = self.events.find(doc! { "key": key }).sort(doc! { "ts": -1 });
        if let Some(n) = limit {
            find = find.limit(i64::from(n));
        }

        let docs: Vec<EventDocument> = find.await?.try_collect().await?;
        docs.into_iter().map(EventDocument::into_stored).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_document_from_event_keeps_whole_event() {
        let mut metadata = crate::event::Metadata::new();
        metadata.insert("sensor".to_string(), json!("lab_01"));
        metadata.insert("batch".to_string(), json!(2));
        let event = Event::new("temperature", 23.5, Some(metadata)).unwrap();

        let doc = EventDocument::from_event(&event).unwrap();
        assert_eq!(doc.key, "temperature");
        assert_eq!(doc.ts_unix, event.timestamp_unix);
        assert_eq!(doc.ts.timestamp_millis(), event.timestamp.timestamp_millis());
        assert_eq!(doc.metadata.get_str("sensor").unwrap(), "lab_01");
    }

    #[test]
    fn test_document_into_stored_event() {
        let event = Event::new("temperature", 23.5, None).unwrap();
        let stored = EventDocument::from_event(&event)
            .unwrap()
            .into_stored()
            .unwrap();

        assert_eq!(stored.key, "temperature");
        assert_eq!(stored.value, 23.5);
        assert!(stored.metadata.is_none());
        assert_eq!(stored.ts.timestamp(), event.timestamp_unix);
    }
}
