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

// Storage backend module
//
// One adapter per backend, each translating an `Event` into that system's
// native write. Adapters that can read events back also implement
// `EventReader`; everything else is write-only.

pub mod backend;
pub mod clickhouse;
pub mod elasticsearch;
pub mod factory;
pub mod http;
pub mod influx;
pub mod mongodb;
pub mod neo4j;
pub mod postgres;
pub mod prometheus;
pub mod qdrant;
pub mod redis;

pub use backend::{Backend, BackendHandle, EventReader, EventWriter};
pub use clickhouse::ClickHouseBackend;
pub use elasticsearch::ElasticsearchBackend;
pub use factory::BackendFactory;
pub use influx::InfluxBackend;
pub use mongodb::MongoBackend;
pub use neo4j::Neo4jBackend;
pub use postgres::{PostgresBackend, TimescaleBackend};
pub use prometheus::PrometheusBackend;
pub use qdrant::QdrantBackend;
pub use redis::RedisBackend;

/// Dispatch order of a full mesh
pub const BACKEND_ORDER: [&str; 10] = [
    "redis",
    "timescale",
    "influx",
    "neo4j",
    "clickhouse",
    "qdrant",
    "postgres",
    "mongodb",
    "elasticsearch",
    "prometheus",
];

/// Backends that answer `query_recent_events`
pub const QUERYABLE: [&str; 5] = ["timescale", "clickhouse", "postgres", "mongodb", "elasticsearch"];
