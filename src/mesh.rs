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

// Fan-out mesh
//
// Holds one handle per configured backend and issues every operation
// independently against each of them. Per-backend failures are collected
// into the returned report; they never stop the remaining backends.

use anyhow::Result;
use futures_util::future::{join_all, BoxFuture};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::{DispatchMode, MeshConfig, MeshSettings};
use crate::error::{BackendError, MeshError};
use crate::event::{Event, Metadata, StoredEvent, WriteAck};
use crate::metrics::MeshMetrics;
use crate::report::FanOutReport;
use crate::storage::{BackendFactory, BackendHandle, EventReader, EventWriter};

/// Outcome of a cross-database sync
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Synced(usize),
    NotImplemented,
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncOutcome::Synced(n) => write!(f, "Synced {} rows", n),
            SyncOutcome::NotImplemented => f.write_str("Sync pattern not implemented"),
        }
    }
}

/// Source/target pairs `sync_data_cross_database` knows how to copy
const SYNC_PATTERNS: [(&str, &str); 1] = [("timescale", "clickhouse")];

pub struct DataMesh {
    backends: Vec<BackendHandle>,
    settings: MeshSettings,
    metrics: Option<Arc<MeshMetrics>>,
}

impl DataMesh {
    /// Open every configured backend
    ///
    /// Fails if any configured backend cannot be opened.
    pub async fn connect(config: &MeshConfig) -> Result<Self> {
        let backends = BackendFactory::open_all(&config.backends).await?;
        Ok(Self::from_backends(backends, config.mesh.clone()))
    }

    /// Build a mesh over already opened backends, kept in the given order
    pub fn from_backends(backends: Vec<BackendHandle>, settings: MeshSettings) -> Self {
        info!(
            "Mesh ready with {} backend(s), {:?} dispatch, {} ms per call",
            backends.len(),
            settings.dispatch,
            settings.backend_timeout_ms
        );
        Self {
            backends,
            settings,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MeshMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn backend_names(&self) -> Vec<&str> {
        self.backends.iter().map(|h| h.name()).collect()
    }

    pub fn reader_names(&self) -> Vec<&str> {
        self.backends
            .iter()
            .filter(|h| h.reader.is_some())
            .map(|h| h.name())
            .collect()
    }

    /// Write one event to every backend
    ///
    /// Metadata defaults to an empty map. Invalid input (empty key,
    /// non-finite value) yields the same `Validation` error for every backend
    /// and contacts none of them.
    pub async fn write_event(
        &self,
        key: &str,
        value: f64,
        metadata: Option<Metadata>,
    ) -> FanOutReport<WriteAck> {
        match Event::new(key, value, metadata) {
            Ok(event) => self.write(&event).await,
            Err(e) => {
                warn!("Rejected event for key '{}': {}", key, e.message);
                self.backends
                    .iter()
                    .map(|h| (h.name().to_string(), Err(e.clone())))
                    .collect()
            }
        }
    }

    /// Write an already built event to every backend
    pub async fn write(&self, event: &Event) -> FanOutReport<WriteAck> {
        let calls = self
            .backends
            .iter()
            .map(|h| (h.name(), h.writer.write(event)))
            .collect();

        let report = self.dispatch("write", calls).await;
        debug!(
            "write_event '{}': {}/{} backends ok",
            event.key,
            report.success_count(),
            report.len()
        );
        report
    }

    /// Most recent records for `key` from every queryable backend, newest first
    ///
    /// `limit` defaults to `mesh.default_query_limit`.
    pub async fn query_recent_events(
        &self,
        key: &str,
        limit: Option<u32>,
    ) -> FanOutReport<Vec<StoredEvent>> {
        let limit = limit.unwrap_or(self.settings.default_query_limit);
        let calls = self
            .backends
            .iter()
            .filter_map(|h| h.reader.as_ref().map(|r| (h.name(), r.fetch(key, Some(limit)))))
            .collect();

        self.dispatch("query", calls).await
    }

    /// Copy every record of `key` from `source` into `target`
    ///
    /// Only timescale -> clickhouse is supported. Source timestamps are kept.
    /// Re-running duplicates rows in the target.
    pub async fn sync_data_cross_database(
        &self,
        source: &str,
        target: &str,
        key: &str,
    ) -> Result<SyncOutcome, MeshError> {
        if !SYNC_PATTERNS.contains(&(source, target)) {
            debug!("No sync pattern for {} -> {}", source, target);
            return Ok(SyncOutcome::NotImplemented);
        }

        let reader = self.reader(source)?;
        let writer = self.writer(target)?;

        let rows = self
            .call(source, "sync_read", reader.fetch(key, None))
            .await
            .map_err(|e| MeshError::Backend {
                backend: source.to_string(),
                source: e,
            })?;

        let mut synced = 0;
        for row in &rows {
            let written = match row.to_event() {
                Ok(event) => self.call(target, "sync_write", writer.write(&event)).await,
                Err(e) => Err(e),
            };
            written.map_err(|e| MeshError::Backend {
                backend: target.to_string(),
                source: e,
            })?;
            synced += 1;
        }

        info!("Synced {} row(s) of '{}' from {} to {}", synced, key, source, target);
        Ok(SyncOutcome::Synced(synced))
    }

    /// Liveness probe against every backend
    pub async fn health_check(&self) -> FanOutReport<bool> {
        let calls = self
            .backends
            .iter()
            .map(|h| (h.name(), h.writer.health_check()))
            .collect();

        self.dispatch("health", calls).await
    }

    /// Release every backend handle
    ///
    /// All backends are attempted even if some fail. Calling it again is a
    /// no-op for handles already released.
    pub async fn close(&self) -> Result<(), MeshError> {
        let calls = self
            .backends
            .iter()
            .map(|h| (h.name(), h.writer.close()))
            .collect();

        let failures: Vec<(String, BackendError)> = self
            .dispatch("close", calls)
            .await
            .into_iter()
            .filter_map(|(name, result)| result.err().map(|e| (name, e)))
            .collect();

        if failures.is_empty() {
            info!("Closed {} backend(s)", self.backends.len());
            Ok(())
        } else {
            Err(MeshError::Close(failures))
        }
    }

    fn handle(&self, name: &str) -> Result<&BackendHandle, MeshError> {
        self.backends
            .iter()
            .find(|h| h.name() == name)
            .ok_or_else(|| MeshError::BackendNotConfigured(name.to_string()))
    }

    fn reader(&self, name: &str) -> Result<&Arc<dyn EventReader>, MeshError> {
        self.handle(name)?
            .reader
            .as_ref()
            .ok_or_else(|| MeshError::BackendNotConfigured(name.to_string()))
    }

    fn writer(&self, name: &str) -> Result<&Arc<dyn EventWriter>, MeshError> {
        Ok(&self.handle(name)?.writer)
    }

    /// Run one call per backend, sequentially or all at once
    ///
    /// The report keeps the order of `calls` in both modes.
    async fn dispatch<'a, T>(
        &'a self,
        op: &'static str,
        calls: Vec<(&'a str, BoxFuture<'a, Result<T, BackendError>>)>,
    ) -> FanOutReport<T> {
        let guarded = calls.into_iter().map(move |(name, fut)| async move {
            let result = self.call(name, op, fut).await;
            (name.to_string(), result)
        });

        match self.settings.dispatch {
            DispatchMode::Sequential => {
                let mut report = FanOutReport::new();
                for call in guarded {
                    let (name, result) = call.await;
                    report.push(name, result);
                }
                report
            }
            DispatchMode::Concurrent => join_all(guarded).await.into_iter().collect(),
        }
    }

    /// Bound one backend call by the configured timeout and record its outcome
    async fn call<T>(
        &self,
        backend: &str,
        op: &'static str,
        fut: BoxFuture<'_, Result<T, BackendError>>,
    ) -> Result<T, BackendError> {
        let timeout = self.settings.backend_timeout();
        let started = Instant::now();

        let result = match tokio::time::timeout(timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(BackendError::timeout(format!(
                "{} {} did not complete within {} ms",
                backend,
                op,
                timeout.as_millis()
            ))),
        };

        if let Err(e) = &result {
            warn!("{} {} failed ({}): {}", backend, op, e.kind, e.message);
        }
        if let Some(metrics) = &self.metrics {
            metrics.record(
                backend,
                op,
                started.elapsed().as_secs_f64(),
                result.as_ref().err().map(|e| e.kind),
            );
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::storage::Backend;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct SlowBackend {
        name: &'static str,
        delay: Duration,
        writes: AtomicUsize,
    }

    impl SlowBackend {
        fn new(name: &'static str, delay_ms: u64) -> Self {
            Self {
                name,
                delay: Duration::from_millis(delay_ms),
                writes: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Backend for SlowBackend {
        fn name(&self) -> &str {
            self.name
        }

        async fn health_check(&self) -> Result<bool, BackendError> {
            Ok(true)
        }

        async fn close(&self) -> Result<(), BackendError> {
            Ok(())
        }
    }

    #[async_trait]
    impl EventWriter for SlowBackend {
        async fn write(&self, _event: &Event) -> Result<WriteAck, BackendError> {
            tokio::time::sleep(self.delay).await;
            self.writes.fetch_add(1, Ordering::SeqCst);
            Ok(WriteAck::Written)
        }
    }

    fn settings(dispatch: DispatchMode, timeout_ms: u64) -> MeshSettings {
        MeshSettings {
            dispatch,
            backend_timeout_ms: timeout_ms,
            ..Default::default()
        }
    }

    #[test]
    fn test_sync_outcome_display() {
        assert_eq!(SyncOutcome::Synced(3).to_string(), "Synced 3 rows");
        assert_eq!(
            SyncOutcome::NotImplemented.to_string(),
            "Sync pattern not implemented"
        );
    }

    #[tokio::test]
    async fn test_concurrent_dispatch_keeps_order() {
        let mesh = DataMesh::from_backends(
            vec![
                BackendHandle::write_only(SlowBackend::new("slow", 80)),
                BackendHandle::write_only(SlowBackend::new("fast", 1)),
            ],
            settings(DispatchMode::Concurrent, 1_000),
        );

        let report = mesh.write_event("temperature", 23.5, None).await;
        assert_eq!(report.names(), vec!["slow", "fast"]);
        assert_eq!(report.success_count(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_dispatch_overlaps_calls() {
        let mesh = DataMesh::from_backends(
            vec![
                BackendHandle::write_only(SlowBackend::new("a", 200)),
                BackendHandle::write_only(SlowBackend::new("b", 200)),
                BackendHandle::write_only(SlowBackend::new("c", 200)),
            ],
            settings(DispatchMode::Concurrent, 5_000),
        );

        let started = Instant::now();
        let report = mesh.write_event("temperature", 23.5, None).await;
        assert_eq!(report.success_count(), 3);
        assert!(started.elapsed() < Duration::from_millis(550));
    }

    #[tokio::test]
    async fn test_timeout_only_hits_slow_backend() {
        for dispatch in [DispatchMode::Sequential, DispatchMode::Concurrent] {
            let mesh = DataMesh::from_backends(
                vec![
                    BackendHandle::write_only(SlowBackend::new("stuck", 2_000)),
                    BackendHandle::write_only(SlowBackend::new("quick", 1)),
                ],
                settings(dispatch, 100),
            );

            let report = mesh.write_event("temperature", 23.5, None).await;
            let stuck = report.get("stuck").unwrap().as_ref().unwrap_err();
            assert_eq!(stuck.kind, ErrorKind::Timeout);
            assert!(report.get("quick").unwrap().is_ok());
        }
    }

    #[tokio::test]
    async fn test_metrics_record_each_call() {
        let metrics = Arc::new(MeshMetrics::new().unwrap());
        let mesh = DataMesh::from_backends(
            vec![BackendHandle::write_only(SlowBackend::new("quick", 1))],
            settings(DispatchMode::Sequential, 1_000),
        )
        .with_metrics(metrics.clone());

        mesh.write_event("temperature", 23.5, None).await;
        mesh.write_event("temperature", 24.0, None).await;

        assert_eq!(
            metrics
                .backend_ops
                .with_label_values(&["quick", "write", "ok"])
                .get(),
            2
        );
    }
}
