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

// Prometheus metrics for fan-out operations
//
// Every backend call of the mesh is counted by backend, operation and
// outcome, and its latency observed in a histogram.

use anyhow::{Context, Result};
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};

use crate::error::ErrorKind;

pub struct MeshMetrics {
    registry: Registry,
    pub backend_ops: IntCounterVec,
    pub backend_op_duration: HistogramVec,
}

impl MeshMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let backend_ops = IntCounterVec::new(
            Opts::new("fanout_backend_ops_total", "Backend calls issued by the mesh"),
            &["backend", "op", "outcome"],
        )?;
        registry.register(Box::new(backend_ops.clone()))?;

        let backend_op_duration = HistogramVec::new(
            HistogramOpts::new(
                "fanout_backend_op_duration_seconds",
                "Latency of a single backend call",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0]),
            &["backend", "op"],
        )?;
        registry.register(Box::new(backend_op_duration.clone()))?;

        Ok(Self {
            registry,
            backend_ops,
            backend_op_duration,
        })
    }

    /// Record one backend call; `failure` is the error kind when it failed
    pub fn record(&self, backend: &str, op: &str, duration_secs: f64, failure: Option<ErrorKind>) {
        let outcome = match failure {
            None => "ok".to_string(),
            Some(kind) => kind.to_string(),
        };
        self.backend_ops
            .with_label_values(&[backend, op, outcome.as_str()])
            .inc();
        self.backend_op_duration
            .with_label_values(&[backend, op])
            .observe(duration_secs);
    }

    /// Text exposition of everything recorded so far
    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .context("Failed to encode metrics")?;
        String::from_utf8(buffer).context("Metrics exposition is not UTF-8")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_outcomes() {
        let metrics = MeshMetrics::new().unwrap();
        metrics.record("redis", "write", 0.002, None);
        metrics.record("redis", "write", 0.003, None);
        metrics.record("neo4j", "write", 1.2, Some(ErrorKind::Timeout));

        assert_eq!(
            metrics
                .backend_ops
                .with_label_values(&["redis", "write", "ok"])
                .get(),
            2
        );
        assert_eq!(
            metrics
                .backend_ops
                .with_label_values(&["neo4j", "write", "timeout"])
                .get(),
            1
        );
    }

    #[test]
    fn test_render_text_exposition() {
        let metrics = MeshMetrics::new().unwrap();
        metrics.record("clickhouse", "query", 0.01, None);

        let text = metrics.render().unwrap();
        assert!(text.contains("fanout_backend_ops_total"));
        assert!(text.contains("backend=\"clickhouse\""));
        assert!(text.contains("fanout_backend_op_duration_seconds_bucket"));
    }
}
