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

// ClickHouse OLAP backend over the HTTP interface
//
// Values never enter the SQL text: they travel as `param_<name>` query
// parameters and are referenced as `{name:Type}` placeholders.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::backend::{Backend, EventReader, EventWriter};
use super::http::{build_client, ensure_success, trim_base, CloseFlag, HttpAuth};
use crate::config::ClickHouseConfig;
use crate::error::BackendError;
use crate::event::{Event, StoredEvent, WriteAck};

pub struct ClickHouseBackend {
    client: Client,
    base_url: String,
    user: String,
    password: Option<String>,
    table: String,
    closed: CloseFlag,
}

#[derive(Debug, Deserialize)]
struct ChRow {
    ts_unix: i64,
    k: String,
    v: f64,
}

/// Statement plus its bound parameters
#[derive(Debug, Clone, PartialEq)]
pub struct ChQuery {
    pub sql: String,
    pub params: Vec<(String, String)>,
}

impl ClickHouseBackend {
    pub fn new(config: ClickHouseConfig) -> Result<Self> {
        let client = build_client(config.timeout_seconds, HttpAuth::None, false)?;
        Ok(Self {
            client,
            base_url: trim_base(&config.url),
            user: config.user,
            password: config.password,
            table: format!("{}.{}", config.database, config.table),
            closed: CloseFlag::default(),
        })
    }

    pub fn insert_query(&self, event: &Event) -> ChQuery {
        ChQuery {
            sql: format!(
                "INSERT INTO {} SELECT toDateTime({{ts:Int64}}), {{key:String}}, {{value:Float64}}",
                self.table
            ),
            params: vec![
                ("ts".to_string(), event.timestamp_unix.to_string()),
                ("key".to_string(), event.key.clone()),
                ("value".to_string(), event.value.to_string()),
            ],
        }
    }

    pub fn select_query(&self, key: &str, limit: Option<u32>) -> ChQuery {
        let mut params = vec![("key".to_string(), key.to_string())];
        let limit_clause = match limit {
            Some(n) => {
                params.push(("limit".to_string(), n.to_string()));
                " LIMIT {limit:UInt32}"
            }
            None => "",
        };

        ChQuery {
            sql: format!(
                "SELECT toUnixTimestamp(ts) AS ts_unix, k, toFloat64(v) AS v \
                 FROM {} WHERE k = {{key:String}} ORDER BY ts DESC{} FORMAT JSONEachRow",
                self.table, limit_clause
            ),
            params,
        }
    }

    async fn exec(&self, query: &ChQuery) -> Result<String, BackendError> {
        // Credentials go in the Authorization header, never the URL
        let url_params: Vec<(String, &str)> = query
            .params
            .iter()
            .map(|(name, value)| (format!("param_{}", name), value.as_str()))
            .collect();

        let response = self
            .client
            .post(&self.base_url)
            .basic_auth(&self.user, self.password.as_ref())
            .query(&url_params)
            .body(query.sql.clone())
            .send()
            .await?;

        let response = ensure_success(self.name(), response).await?;
        Ok(response.text().await?)
    }
}

/// Parse a `FORMAT JSONEachRow` body
fn parse_rows(body: &str) -> Result<Vec<StoredEvent>, BackendError> {
    body.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let row: ChRow = serde_json::from_str(line)?;
            StoredEvent::from_unix(row.ts_unix, row.k, row.v)
        })
        .collect()
}

#[async_trait]
impl Backend for ClickHouseBackend {
    fn name(&self) -> &str {
        "clickhouse"
    }

    async fn health_check(&self) -> Result<bool, BackendError> {
        self.closed.check(self.name())?;
        let body = self
            .exec(&ChQuery {
                sql: "SELECT 1".to_string(),
                params: vec![],
            })
            .await?;
        Ok(body.trim() == "1")
    }

    async fn close(&self) -> Result<(), BackendError> {
        self.closed.close();
        Ok(())
    }
}

#[async_trait]
impl EventWriter for ClickHouseBackend {
    async fn write(&self, event: &Event) -> Result<WriteAck, BackendError> {
        self.closed.check(self.name())?;
        self.exec(&self.insert_query(event)).await?;
        Ok(WriteAck::Written)
    }
}

#[async_trait]
impl EventReader for ClickHouseBackend {
    async fn fetch(&self, key: &str, limit: Option<u32>) -> Result<Vec<StoredEvent>, BackendError> {
        self.closed.check(self.name())?;
        let body = self.exec(&self.select_query(key, limit)).await?;
        parse_rows(&body)
    }
}
