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

// Configuration types for fanout-mesh

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MeshConfig {
    #[serde(default)]
    pub mesh: MeshSettings,
    #[serde(default)]
    pub backends: BackendsConfig,
    #[serde(default)]
    pub smoke: SmokeConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// How backend calls of one fan-out are scheduled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// One backend after another, in fixed order
    #[default]
    Sequential,
    /// All backends at once, joined before returning
    Concurrent,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MeshSettings {
    #[serde(default)]
    pub dispatch: DispatchMode,

    /// Upper bound for a single backend call
    #[serde(default = "default_backend_timeout_ms")]
    pub backend_timeout_ms: u64,

    #[serde(default = "default_query_limit")]
    pub default_query_limit: u32,
}

impl Default for MeshSettings {
    fn default() -> Self {
        Self {
            dispatch: DispatchMode::default(),
            backend_timeout_ms: default_backend_timeout_ms(),
            default_query_limit: default_query_limit(),
        }
    }
}

impl MeshSettings {
    pub fn backend_timeout(&self) -> Duration {
        Duration::from_millis(self.backend_timeout_ms)
    }
}

/// Backend sections; a backend takes part in the mesh only when its section is present
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BackendsConfig {
    #[serde(default)]
    pub redis: Option<RedisConfig>,
    #[serde(default)]
    pub timescale: Option<TimescaleConfig>,
    #[serde(default)]
    pub influx: Option<InfluxConfig>,
    #[serde(default)]
    pub neo4j: Option<Neo4jConfig>,
    #[serde(default)]
    pub clickhouse: Option<ClickHouseConfig>,
    #[serde(default)]
    pub qdrant: Option<QdrantConfig>,
    #[serde(default)]
    pub postgres: Option<PostgresConfig>,
    #[serde(default)]
    pub mongodb: Option<MongoConfig>,
    #[serde(default)]
    pub elasticsearch: Option<ElasticsearchConfig>,
    #[serde(default)]
    pub prometheus: Option<PrometheusConfig>,
}

impl BackendsConfig {
    /// Every backend section populated with local defaults
    pub fn all_local() -> Self {
        Self {
            redis: Some(RedisConfig::default()),
            timescale: Some(TimescaleConfig::default()),
            influx: Some(InfluxConfig::default()),
            neo4j: Some(Neo4jConfig::default()),
            clickhouse: Some(ClickHouseConfig::default()),
            qdrant: Some(QdrantConfig::default()),
            postgres: Some(PostgresConfig::default()),
            mongodb: Some(MongoConfig::default()),
            elasticsearch: Some(ElasticsearchConfig::default()),
            prometheus: Some(PrometheusConfig::default()),
        }
    }

    /// Names of the configured backends in dispatch order
    pub fn enabled(&self) -> Vec<&'static str> {
        let flags = [
            ("redis", self.redis.is_some()),
            ("timescale", self.timescale.is_some()),
            ("influx", self.influx.is_some()),
            ("neo4j", self.neo4j.is_some()),
            ("clickhouse", self.clickhouse.is_some()),
            ("qdrant", self.qdrant.is_some()),
            ("postgres", self.postgres.is_some()),
            ("mongodb", self.mongodb.is_some()),
            ("elasticsearch", self.elasticsearch.is_some()),
            ("prometheus", self.prometheus.is_some()),
        ];
        flags
            .into_iter()
            .filter(|(_, on)| *on)
            .map(|(name, _)| name)
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RedisConfig {
    /// redis://[:password@]host:port[/db]
    pub url: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimescaleConfig {
    pub url: String,
    #[serde(default = "default_readings_table")]
    pub table: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for TimescaleConfig {
    fn default() -> Self {
        Self {
            url: "postgres://postgres@localhost:5433/telemetry".to_string(),
            table: default_readings_table(),
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PostgresConfig {
    pub url: String,
    #[serde(default = "default_events_table")]
    pub table: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            url: "postgres://postgres@localhost:5432/mesh".to_string(),
            table: default_events_table(),
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InfluxConfig {
    pub url: String,
    #[serde(default)]
    pub token: Option<String>,
    pub org: String,
    pub bucket: String,
    #[serde(default = "default_measurement")]
    pub measurement: String,
    #[serde(default = "default_http_timeout")]
    pub timeout_seconds: u64,
}

impl Default for InfluxConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8086".to_string(),
            token: None,
            org: "mesh".to_string(),
            bucket: "default".to_string(),
            measurement: default_measurement(),
            timeout_seconds: default_http_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Neo4jConfig {
    /// HTTP endpoint, e.g. http://localhost:7474
    pub url: String,
    #[serde(default = "default_neo4j_database")]
    pub database: String,
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_http_timeout")]
    pub timeout_seconds: u64,
}

impl Default for Neo4jConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:7474".to_string(),
            database: default_neo4j_database(),
            username: "neo4j".to_string(),
            password: None,
            timeout_seconds: default_http_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClickHouseConfig {
    pub url: String,
    #[serde(default = "default_clickhouse_user")]
    pub user: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_clickhouse_database")]
    pub database: String,
    #[serde(default = "default_events_table")]
    pub table: String,
    #[serde(default = "default_http_timeout")]
    pub timeout_seconds: u64,
}

impl Default for ClickHouseConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8123".to_string(),
            user: default_clickhouse_user(),
            password: None,
            database: default_clickhouse_database(),
            table: default_events_table(),
            timeout_seconds: default_http_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QdrantConfig {
    pub url: String,
    pub collection: String,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Vector stored with every point until a real embedding source is wired in
    #[serde(default = "default_placeholder_vector")]
    pub placeholder_vector: Vec<f32>,
    #[serde(default = "default_http_timeout")]
    pub timeout_seconds: u64,
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6333".to_string(),
            collection: "events".to_string(),
            api_key: None,
            placeholder_vector: default_placeholder_vector(),
            timeout_seconds: default_http_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
    #[serde(default = "default_events_table")]
    pub collection: String,
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            uri: "mongodb://localhost:27017/".to_string(),
            database: "mesh".to_string(),
            collection: default_events_table(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ElasticsearchConfig {
    pub url: String,
    pub index: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub accept_invalid_certs: bool,
    #[serde(default = "default_http_timeout")]
    pub timeout_seconds: u64,
}

impl Default for ElasticsearchConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9200".to_string(),
            index: "mesh-events".to_string(),
            username: None,
            password: None,
            accept_invalid_certs: false,
            timeout_seconds: default_http_timeout(),
        }
    }
}

/// Prometheus scrapes the mesh; nothing is pushed
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PrometheusConfig {
    #[serde(default = "default_prometheus_url")]
    pub url: String,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            url: default_prometheus_url(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SmokeConfig {
    #[serde(default = "default_iterations")]
    pub iterations: usize,

    /// Pause between the write and the read-back in the read scenario
    #[serde(default = "default_read_delay_ms")]
    pub read_delay_ms: u64,

    /// Share of backends that must succeed for a scenario to pass
    #[serde(default = "default_min_success_ratio")]
    pub min_success_ratio: f64,
}

impl Default for SmokeConfig {
    fn default() -> Self {
        Self {
            iterations: default_iterations(),
            read_delay_ms: default_read_delay_ms(),
            min_success_ratio: default_min_success_ratio(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"

    #[serde(default = "default_log_format")]
    pub format: String, // "text", "json"
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Default value functions
fn default_backend_timeout_ms() -> u64 { 10_000 }
fn default_query_limit() -> u32 { 10 }
fn default_readings_table() -> String { "readings".to_string() }
fn default_events_table() -> String { "events".to_string() }
fn default_max_connections() -> u32 { 1 }
fn default_measurement() -> String { "readings".to_string() }
fn default_http_timeout() -> u64 { 30 }
fn default_neo4j_database() -> String { "neo4j".to_string() }
fn default_clickhouse_user() -> String { "default".to_string() }
fn default_clickhouse_database() -> String { "logs".to_string() }
fn default_placeholder_vector() -> Vec<f32> { vec![0.1, 0.2, 0.3, 0.4] }
fn default_prometheus_url() -> String { "http://localhost:9090".to_string() }
fn default_iterations() -> usize { 100 }
fn default_read_delay_ms() -> u64 { 2000 }
fn default_min_success_ratio() -> f64 { 0.8 }
fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "text".to_string() }
