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

// Neo4j graph backend over the HTTP transactional endpoint

use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::{json, Value};

use super::backend::{Backend, EventWriter};
use super::http::{build_client, ensure_success, trim_base, CloseFlag, HttpAuth};
use crate::config::Neo4jConfig;
use crate::error::BackendError;
use crate::event::{Event, WriteAck};

const UPSERT_EVENT: &str = "MERGE (e:Event {k: $key}) SET e.ts = $ts, e.v = $value RETURN e";

pub struct Neo4jBackend {
    client: Client,
    commit_url: String,
    base_url: String,
    username: String,
    password: Option<String>,
    closed: CloseFlag,
}

#[derive(Debug, Deserialize)]
struct TxResponse {
    #[serde(default)]
    errors: Vec<TxError>,
}

#[derive(Debug, Deserialize)]
struct TxError {
    code: String,
    message: String,
}

impl Neo4jBackend {
    pub fn new(config: Neo4jConfig) -> Result<Self> {
        let client = build_client(config.timeout_seconds, HttpAuth::None, false)?;
        let base_url = trim_base(&config.url);

        Ok(Self {
            client,
            commit_url: format!("{}/db/{}/tx/commit", base_url, config.database),
            base_url,
            username: config.username,
            password: config.password,
            closed: CloseFlag::default(),
        })
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request.basic_auth(&self.username, self.password.as_ref())
    }

    async fn run(&self, body: Value) -> Result<(), BackendError> {
        let response = self
            .authed(self.client.post(&self.commit_url))
            .json(&body)
            .send()
            .await?;
        let response = ensure_success(self.name(), response).await?;

        // Cypher failures come back as 200 with a populated `errors` array
        let tx: TxResponse = response.json().await?;
        match tx.errors.first() {
            Some(e) => Err(BackendError::rejected(format!("{}: {}", e.code, e.message))),
            None => Ok(()),
        }
    }
}

/// Transactional endpoint body for the node upsert
pub fn upsert_body(event: &Event) -> Value {
    json!({
        "statements": [{
            "statement": UPSERT_EVENT,
            "parameters": {
                "key": event.key,
                "ts": event.timestamp_unix,
                "value": event.value,
            }
        }]
    })
}

#[async_trait]
impl Backend for Neo4jBackend {
    fn name(&self) -> &str {
        "neo4j"
    }

    async fn health_check(&self) -> Result<bool, BackendError> {
        self.closed.check(self.name())?;
        let response = self.authed(self.client.get(&self.base_url)).send().await?;
        Ok(response.status().is_success())
    }

    async fn close(&self) -> Result<(), BackendError> {
        self.closed.close();
        Ok(())
    }
}

#[async_trait]
impl EventWriter for Neo4jBackend {
    async fn write(&self, event: &Event) -> Result<WriteAck, BackendError> {
        self.closed.check(self.name())?;
        self.run(upsert_body(event)).await?;
        Ok(WriteAck::Written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_body_binds_parameters() {
        let event = Event::new("temperature", 23.5, None).unwrap();
        let body = upsert_body(&event);

        let statement = &body["statements"][0];
        assert_eq!(statement["statement"], UPSERT_EVENT);
        assert_eq!(statement["parameters"]["key"], "temperature");
        assert_eq!(statement["parameters"]["value"], 23.5);
        assert_eq!(statement["parameters"]["ts"], event.timestamp_unix);
    }

    #[test]
    fn test_commit_url_uses_database() {
        let backend = Neo4jBackend::new(Neo4jConfig {
            url: "http://graph:7474/".to_string(),
            database: "events".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(backend.commit_url, "http://graph:7474/db/events/tx/commit");
    }

    #[test]
    fn test_tx_errors_parse() {
        let tx: TxResponse = serde_json::from_str(
            r#"{"results":[],"errors":[{"code":"Neo.ClientError.Statement.SyntaxError","message":"bad"}]}"#,
        )
        .unwrap();
        assert_eq!(tx.errors.len(), 1);
        assert_eq!(tx.errors[0].message, "bad");
    }
}
