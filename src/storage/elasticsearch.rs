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

// Elasticsearch search backend (REST document and search APIs)

use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::{json, Value};

use super::backend::{Backend, EventReader, EventWriter};
use super::http::{build_client, ensure_success, trim_base, CloseFlag, HttpAuth};
use crate::config::ElasticsearchConfig;
use crate::error::BackendError;
use crate::event::{Event, StoredEvent, WriteAck};

/// Upper bound on hits returned when no limit is given
const MAX_RESULT_WINDOW: u32 = 10_000;

pub struct ElasticsearchBackend {
    client: Client,
    base_url: String,
    index: String,
    username: Option<String>,
    password: Option<String>,
    closed: CloseFlag,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: Hits,
}

#[derive(Debug, Deserialize)]
struct Hits {
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(rename = "_source")]
    source: Value,
}

#[derive(Debug, Deserialize)]
struct EventSource {
    key: String,
    value: f64,
    ts_unix: i64,
    #[serde(default)]
    metadata: Option<Value>,
}

impl ElasticsearchBackend {
    pub fn new(config: ElasticsearchConfig) -> Result<Self> {
        let client = build_client(
            config.timeout_seconds,
            HttpAuth::None,
            config.accept_invalid_certs,
        )?;

        Ok(Self {
            client,
            base_url: trim_base(&config.url),
            index: config.index,
            username: config.username,
            password: config.password,
            closed: CloseFlag::default(),
        })
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.username {
            Some(user) => request.basic_auth(user, self.password.as_ref()),
            None => request,
        }
    }
}

/// Search body: exact key on the dynamic `keyword` subfield, newest first
pub fn search_body(key: &str, limit: Option<u32>) -> Value {
    json!({
        "query": { "term": { "key.keyword": key } },
        "sort": [{ "ts_unix": { "order": "desc", "unmapped_type": "long" } }],
        "size": limit.unwrap_or(MAX_RESULT_WINDOW),
    })
}

fn parse_hits(response: SearchResponse) -> Result<Vec<StoredEvent>, BackendError> {
    response
        .hits
        .hits
        .into_iter()
        .map(|hit| {
            let source: EventSource = serde_json::from_value(hit.source)?;
            let mut stored = StoredEvent::from_unix(source.ts_unix, source.key, source.value)?;
            stored.metadata = source.metadata.filter(|m| !is_empty_object(m));
            Ok(stored)
        })
        .collect()
}

fn is_empty_object(value: &Value) -> bool {
    value.as_object().is_some_and(|m| m.is_empty())
}

#[async_trait]
impl Backend for ElasticsearchBackend {
    fn name(&self) -> &str {
        "elasticsearch"
    }

    async fn health_check(&self) -> Result<bool, BackendError> {
        self.closed.check(self.name())?;
        let url = format!("{}/_cluster/health", self.base_url);
        let response = self.authed(self.client.get(&url)).send().await?;
        let response = ensure_success(self.name(), response).await?;

        let health: Value = response.json().await?;
        Ok(health["status"] != "red")
    }

    async fn close(&self) -> Result<(), BackendError> {
        self.closed.close();
        Ok(())
    }
}

#[async_trait]
impl EventWriter for ElasticsearchBackend {
    async fn write(&self, event: &Event) -> Result<WriteAck, BackendError> {
        self.closed.check(self.name())?;

        // wait_for makes the document visible to the next search
        let url = format!("{}/{}/_doc", self.base_url, self.index);
        let response = self
            .authed(self.client.post(&url))
            .query(&[("refresh", "wait_for")])
            .json(event)
            .send()
            .await?;

        ensure_success(self.name(), response).await?;
        Ok(WriteAck::Written)
    }
}

#[async_trait]
impl EventReader for ElasticsearchBackend {
    async fn fetch(&self, key: &str, limit: Option<u32>) -> Result<Vec<StoredEvent>, BackendError> {
        self.closed.check(self.name())?;

        // A missing index searches as empty instead of 404
        let url = format!("{}/{}/_search", self.base_url, self.index);
        let response = self
            .authed(self.client.post(&url))
            .query(&[("ignore_unavailable", "true")])
            .json(&search_body(key, limit))
            .send()
            .await?;

        let response = ensure_success(self.name(), response).await?;
        parse_hits(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_body() {
        let body = search_body("temperature", Some(5));
        assert_eq!(body["query"]["term"]["key.keyword"], "temperature");
        assert!(body["query"].get("match").is_none());
        assert_eq!(body["size"], 5);
        assert_eq!(body["sort"][0]["ts_unix"]["order"], "desc");

        let unbounded = search_body("temperature", None);
        assert_eq!(unbounded["size"], MAX_RESULT_WINDOW);
    }

    #[test]
    fn test_search_body_keeps_hyphenated_key_whole() {
        let body = search_body("sensor-2", None);
        assert_eq!(
            body["query"],
            json!({ "term": { "key.keyword": "sensor-2" } })
        );
    }

    #[test]
    fn test_parse_hits() {
        let response: SearchResponse = serde_json::from_value(json!({
            "took": 1,
            "hits": {
                "total": { "value": 2, "relation": "eq" },
                "hits": [
                    { "_index": "mesh-events", "_source": {
                        "key": "temperature", "value": 23.5, "ts": "2024-01-01T00:00:10Z",
                        "ts_unix": 1704067210, "metadata": { "sensor": "lab_01" } } },
                    { "_index": "mesh-events", "_source": {
                        "key": "temperature", "value": 22.0, "ts": "2024-01-01T00:00:00Z",
                        "ts_unix": 1704067200, "metadata": {} } }
                ]
            }
        }))
        .unwrap();

        let rows = parse_hits(response).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].value, 23.5);
        assert_eq!(rows[0].metadata.as_ref().unwrap()["sensor"], "lab_01");
        assert!(rows[1].metadata.is_none());
    }

    #[test]
    fn test_parse_no_hits() {
        let response: SearchResponse =
            serde_json::from_value(json!({ "hits": { "hits": [] } })).unwrap();
        assert!(parse_hits(response).unwrap().is_empty());
    }
}
