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

// Write-everywhere fan-out mesh
//
// Pushes one (key, value, metadata) event into every configured backend:
// - cache, relational, time-series, graph, OLAP, vector, document, search
// - per-backend outcome reported back, never aborting on partial failure
// - read-back of recent events from the queryable subset
// - one-way timescale -> clickhouse sync
// - smoke harness exercising a live deployment

pub mod config;
pub mod error;
pub mod event;
pub mod mesh;
pub mod metrics;
pub mod report;
pub mod smoke;
pub mod storage;

// Re-export main types
pub use config::{load_config, load_config_with_env, DispatchMode, MeshConfig};
pub use error::{BackendError, ErrorKind, MeshError};
pub use event::{parse_metadata_pairs, Event, Metadata, StoredEvent, WriteAck};
pub use mesh::{DataMesh, SyncOutcome};
pub use metrics::MeshMetrics;
pub use report::FanOutReport;
pub use smoke::{SmokeReport, SmokeRunner};
pub use storage::{Backend, BackendHandle, EventReader, EventWriter, BACKEND_ORDER, QUERYABLE};
