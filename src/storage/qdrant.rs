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

// Qdrant vector backend (REST points API)

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use uuid::Uuid;

use super::backend::{Backend, EventWriter};
use super::http::{build_client, ensure_success, trim_base, CloseFlag, HttpAuth};
use crate::config::QdrantConfig;
use crate::error::BackendError;
use crate::event::{Event, WriteAck};

pub struct QdrantBackend {
    client: Client,
    base_url: String,
    collection: String,
    vector: Vec<f32>,
    closed: CloseFlag,
}

impl QdrantBackend {
    pub fn new(config: QdrantConfig) -> Result<Self> {
        let auth = match &config.api_key {
            Some(key) => HttpAuth::Header {
                name: "api-key",
                value: key,
            },
            None => HttpAuth::None,
        };
        let client = build_client(config.timeout_seconds, auth, false)?;

        Ok(Self {
            client,
            base_url: trim_base(&config.url),
            collection: config.collection,
            vector: config.placeholder_vector,
            closed: CloseFlag::default(),
        })
    }

    fn points_url(&self) -> String {
        format!("{}/collections/{}/points", self.base_url, self.collection)
    }
}

/// Upsert body with a single point
///
/// Point ids are random UUIDs so two events in the same second stay distinct.
pub fn upsert_body(id: Uuid, vector: &[f32], event: &Event) -> Value {
    json!({
        "points": [{
            "id": id.to_string(),
            "vector": vector,
            "payload": {
                "key": event.key,
                "value": event.value,
                "ts_unix": event.timestamp_unix,
                "metadata": event.metadata,
            }
        }]
    })
}

#[async_trait]
impl Backend for QdrantBackend {
    fn name(&self) -> &str {
        "qdrant"
    }

    async fn health_check(&self) -> Result<bool, BackendError> {
        self.closed.check(self.name())?;
        let url = format!("{}/collections/{}", self.base_url, self.collection);
        let response = self.client.get(&url).send().await?;
        Ok(response.status().is_success())
    }

    async fn close(&self) -> Result<(), BackendError> {
        self.closed.close();
        Ok(())
    }
}

#[async_trait]
impl EventWriter for QdrantBackend {
    async fn write(&self, event: &Event) -> Result<WriteAck, BackendError> {
        self.closed.check(self.name())?;

        let body = upsert_body(Uuid::new_v4(), &self.vector, event);
        let response = self
            .client
            .put(self.points_url())
            .query(&[("wait", "true")])
            .json(&body)
            .send()
            .await?;

        ensure_success(self.name(), response).await?;
        Ok(WriteAck::Written)
    }
}
