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

// InfluxDB v2 backend (write API, line protocol)

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use tracing::warn;

use super::backend::{Backend, EventWriter};
use super::http::{build_client, ensure_success, trim_base, CloseFlag, HttpAuth};
use crate::config::InfluxConfig;
use crate::error::BackendError;
use crate::event::{Event, WriteAck};

pub struct InfluxBackend {
    client: Client,
    base_url: String,
    org: String,
    bucket: String,
    measurement: String,
    closed: CloseFlag,
}

impl InfluxBackend {
    pub fn new(config: InfluxConfig) -> Result<Self> {
        let auth = match &config.token {
            Some(token) => HttpAuth::Token {
                scheme: "Token",
                token,
            },
            None => HttpAuth::None,
        };
        let client = build_client(config.timeout_seconds, auth, false)?;

        Ok(Self {
            client,
            base_url: trim_base(&config.url),
            org: config.org,
            bucket: config.bucket,
            measurement: config.measurement,
            closed: CloseFlag::default(),
        })
    }
}

/// Escape a measurement name (backslashes, commas and spaces)
fn escape_measurement(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace(',', "\\,")
        .replace(' ', "\\ ")
}

/// Escape a tag key or value (backslashes, commas, equals signs and spaces)
fn escape_tag(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace(',', "\\,")
        .replace('=', "\\=")
        .replace(' ', "\\ ")
}

/// One point: `<measurement>,key=<key> value=<value> <unix seconds>`
///
/// Line breaks cannot be escaped in line protocol, so keys holding them are rejected.
pub fn line_protocol(measurement: &str, event: &Event) -> Result<String, BackendError> {
    if event.key.contains(['\n', '\r']) {
        return Err(BackendError::validation(
            "influx tag values must not contain line breaks",
        ));
    }

    Ok(format!(
        "{},key={} value={} {}",
        escape_measurement(measurement),
        escape_tag(&event.key),
        event.value,
        event.timestamp_unix
    ))
}

#[async_trait]
impl Backend for InfluxBackend {
    fn name(&self) -> &str {
        "influx"
    }

    async fn health_check(&self) -> Result<bool, BackendError> {
        self.closed.check(self.name())?;
        let url = format!("{}/ping", self.base_url);
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            warn!("Influx health check failed with status: {}", response.status());
        }
        Ok(response.status().is_success())
    }

    async fn close(&self) -> Result<(), BackendError> {
        self.closed.close();
        Ok(())
    }
}

#[async_trait]
impl EventWriter for InfluxBackend {
    async fn write(&self, event: &Event) -> Result<WriteAck, BackendError> {
        self.closed.check(self.name())?;
        let body = line_protocol(&self.measurement, event)?;

        let url = format!("{}/api/v2/write", self.base_url);
        let response = self
            .client
            .post(&url)
            .query(&[
                ("org", self.org.as_str()),
                ("bucket", self.bucket.as_str()),
                ("precision", "s"),
            ])
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(body)
            .send()
            .await?;

        ensure_success(self.name(), response).await?;
        Ok(WriteAck::Written)
    }
}
