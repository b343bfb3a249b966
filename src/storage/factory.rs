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

// Backend factory for opening the configured backends

use super::backend::BackendHandle;
use super::clickhouse::ClickHouseBackend;
use super::elasticsearch::ElasticsearchBackend;
use super::influx::InfluxBackend;
use super::mongodb::MongoBackend;
use super::neo4j::Neo4jBackend;
use super::postgres::{PostgresBackend, TimescaleBackend};
use super::prometheus::PrometheusBackend;
use super::qdrant::QdrantBackend;
use super::redis::RedisBackend;
use crate::config::BackendsConfig;
use anyhow::{bail, Context, Result};
use tracing::info;

pub struct BackendFactory;

impl BackendFactory {
    /// Open every configured backend, in dispatch order
    ///
    /// Fails on the first backend that cannot be opened. Handles opened
    /// before the failure are dropped.
    pub async fn open_all(config: &BackendsConfig) -> Result<Vec<BackendHandle>> {
        let names = config.enabled();
        if names.is_empty() {
            bail!("No backends configured. Add at least one section under 'backends'");
        }

        let mut handles = Vec::with_capacity(names.len());
        for name in names {
            let handle = Self::open(name, config)
                .await
                .with_context(|| format!("Failed to open backend '{}'", name))?;
            handles.push(handle);
        }

        info!("Opened {} backend(s)", handles.len());
        Ok(handles)
    }

    /// Open a single backend by name
    pub async fn open(name: &str, config: &BackendsConfig) -> Result<BackendHandle> {
        let missing = || anyhow::anyhow!("{} config missing", name);

        let handle = match name {
            "redis" => {
                let c = config.redis.as_ref().ok_or_else(missing)?;
                BackendHandle::write_only(RedisBackend::connect(c).await?)
            }
            "timescale" => {
                let c = config.timescale.as_ref().ok_or_else(missing)?;
                BackendHandle::read_write(TimescaleBackend::connect(c).await?)
            }
            "influx" => {
                let c = config.influx.clone().ok_or_else(missing)?;
                BackendHandle::write_only(InfluxBackend::new(c)?)
            }
            "neo4j" => {
                let c = config.neo4j.clone().ok_or_else(missing)?;
                BackendHandle::write_only(Neo4jBackend::new(c)?)
            }
            "clickhouse" => {
                let c = config.clickhouse.clone().ok_or_else(missing)?;
                BackendHandle::read_write(ClickHouseBackend::new(c)?)
            }
            "qdrant" => {
                let c = config.qdrant.clone().ok_or_else(missing)?;
                BackendHandle::write_only(QdrantBackend::new(c)?)
            }
            "postgres" => {
                let c = config.postgres.as_ref().ok_or_else(missing)?;
                BackendHandle::read_write(PostgresBackend::connect(c).await?)
            }
            "mongodb" => {
                let c = config.mongodb.as_ref().ok_or_else(missing)?;
                BackendHandle::read_write(MongoBackend::connect(c).await?)
            }
            "elasticsearch" => {
                let c = config.elasticsearch.clone().ok_or_else(missing)?;
                BackendHandle::read_write(ElasticsearchBackend::new(c)?)
            }
            "prometheus" => {
                let c = config.prometheus.clone().ok_or_else(missing)?;
                BackendHandle::write_only(PrometheusBackend::new(c))
            }
            unknown => bail!(
                "Unknown backend: '{}'. Supported: {}",
                unknown,
                super::BACKEND_ORDER.join(", ")
            ),
        };

        Ok(handle)
    }
}
