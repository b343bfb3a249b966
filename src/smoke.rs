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

// End-to-end smoke harness run against a live mesh

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::config::SmokeConfig;
use crate::event::{Metadata, WriteAck};
use crate::mesh::DataMesh;
use crate::report::FanOutReport;

const ROTATING_KEYS: usize = 10;
const PROGRESS_EVERY: usize = 25;
const MIN_THROUGHPUT: f64 = 1.0;
const MIN_READERS: usize = 3;
const PARAMETER_SET: [(&str, f64); 3] = [("alpha", 0.55), ("lambda", 0.115), ("K", 1.47)];

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    pub name: &'static str,
    pub passed: bool,
    pub detail: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SmokeReport {
    pub scenarios: Vec<ScenarioResult>,
}

impl SmokeReport {
    pub fn all_passed(&self) -> bool {
        !self.scenarios.is_empty() && self.scenarios.iter().all(|s| s.passed)
    }

    pub fn passed_count(&self) -> usize {
        self.scenarios.iter().filter(|s| s.passed).count()
    }

    /// Process exit code: 0 only when every scenario passed
    pub fn exit_code(&self) -> i32 {
        if self.all_passed() {
            0
        } else {
            1
        }
    }
}

pub struct SmokeRunner<'a> {
    mesh: &'a DataMesh,
    config: SmokeConfig,
}

impl<'a> SmokeRunner<'a> {
    pub fn new(mesh: &'a DataMesh, config: SmokeConfig) -> Self {
        Self { mesh, config }
    }

    /// Run the five scenarios in order
    pub async fn run(&self) -> SmokeReport {
        let mut report = SmokeReport::default();

        report.scenarios.push(self.connectivity().await);
        report.scenarios.push(self.write().await);
        report.scenarios.push(self.read().await);
        report.scenarios.push(self.throughput().await);
        report.scenarios.push(self.parameter_set().await);

        for s in &report.scenarios {
            if s.passed {
                info!("PASSED {:<15} {}", s.name, s.detail);
            } else {
                error!("FAILED {:<15} {}", s.name, s.detail);
            }
        }
        info!(
            "Smoke run finished: {}/{} scenarios passed",
            report.passed_count(),
            report.scenarios.len()
        );

        report
    }

    /// Smallest success count that meets `min_success_ratio` of `total`
    fn required(&self, total: usize) -> usize {
        (self.config.min_success_ratio * total as f64).ceil() as usize
    }

    pub async fn connectivity(&self) -> ScenarioResult {
        let health = self.mesh.health_check().await;
        let up = health.iter().filter(|(_, r)| matches!(r, Ok(true))).count();
        for (name, result) in health.iter() {
            match result {
                Ok(true) => info!("{:<15} connected", name),
                Ok(false) => warn!("{:<15} reachable but unhealthy", name),
                Err(e) => warn!("{:<15} {}", name, e),
            }
        }

        ScenarioResult {
            name: "connectivity",
            passed: up >= self.required(health.len()),
            detail: format!("{}/{} backends healthy", up, health.len()),
        }
    }

    pub async fn write(&self) -> ScenarioResult {
        let key = format!("smoke_write_{}", Utc::now().timestamp());
        let metadata = to_metadata(json!({
            "lambda": 0.115,
            "K": 1.47,
            "test": "pipeline_validation",
            "timestamp": Utc::now().to_rfc3339(),
        }));

        let report = self.mesh.write_event(&key, 0.55, metadata).await;
        log_writes(&report);

        ScenarioResult {
            name: "write",
            passed: report.success_count() >= self.required(report.len()),
            detail: format!("{}/{} backends wrote '{}'", report.success_count(), report.len(), key),
        }
    }

    pub async fn read(&self) -> ScenarioResult {
        let key = format!("smoke_read_{}", Utc::now().timestamp());
        self.mesh
            .write_event(&key, 42.0, to_metadata(json!({ "purpose": "read_test" })))
            .await;

        tokio::time::sleep(Duration::from_millis(self.config.read_delay_ms)).await;

        let report = self.mesh.query_recent_events(&key, Some(5)).await;
        for (name, result) in report.iter() {
            match result {
                Ok(rows) => info!("{:<15} retrieved {} event(s)", name, rows.len()),
                Err(e) => warn!("{:<15} {}", name, e),
            }
        }

        let required = MIN_READERS.min(self.mesh.reader_names().len());
        ScenarioResult {
            name: "read",
            passed: report.success_count() >= required,
            detail: format!(
                "{}/{} readers answered (need {})",
                report.success_count(),
                report.len(),
                required
            ),
        }
    }

    pub async fn throughput(&self) -> ScenarioResult {
        let iterations = self.config.iterations;
        let started = Instant::now();

        for i in 0..iterations {
            let key = format!("perf_test_{}", i % ROTATING_KEYS);
            let metadata = to_metadata(json!({ "batch": i / ROTATING_KEYS, "iteration": i }));
            self.mesh.write_event(&key, i as f64 * 0.55, metadata).await;

            if (i + 1) % PROGRESS_EVERY == 0 {
                let elapsed = started.elapsed().as_secs_f64();
                info!(
                    "{:>4}/{} events | {:.1} events/sec | {:.1}s elapsed",
                    i + 1,
                    iterations,
                    (i + 1) as f64 / elapsed,
                    elapsed
                );
            }
        }

        let elapsed = started.elapsed().as_secs_f64().max(f64::EPSILON);
        let rate = iterations as f64 / elapsed;
        ScenarioResult {
            name: "throughput",
            passed: rate > MIN_THROUGHPUT,
            detail: format!(
                "{} events in {:.2}s ({:.2} events/sec, {:.1} ms/event)",
                iterations,
                elapsed,
                rate,
                elapsed * 1000.0 / iterations.max(1) as f64
            ),
        }
    }

    pub async fn parameter_set(&self) -> ScenarioResult {
        let mut passed = true;
        let mut counts = Vec::with_capacity(PARAMETER_SET.len());

        for (name, value) in PARAMETER_SET {
            let metadata = to_metadata(json!({
                "type": "model_parameter",
                "validated": true,
                "kernel_version": "v4",
            }));
            let report = self
                .mesh
                .write_event(&format!("param_{}", name), value, metadata)
                .await;

            passed &= report.success_count() >= self.required(report.len());
            counts.push(format!("{}={}/{}", name, report.success_count(), report.len()));
        }

        ScenarioResult {
            name: "parameter_set",
            passed,
            detail: counts.join(", "),
        }
    }
}

fn to_metadata(value: serde_json::Value) -> Option<Metadata> {
    match value {
        serde_json::Value::Object(map) => Some(map),
        _ => None,
    }
}

fn log_writes(report: &FanOutReport<WriteAck>) {
    for (name, result) in report.iter() {
        match result {
            Ok(ack) => info!("{:<15} {}", name, ack),
            Err(e) => warn!("{:<15} {}", name, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code() {
        let mut report = SmokeReport::default();
        assert_eq!(report.exit_code(), 1);

        report.scenarios.push(ScenarioResult {
            name: "write",
            passed: true,
            detail: String::new(),
        });
        assert_eq!(report.exit_code(), 0);

        report.scenarios.push(ScenarioResult {
            name: "read",
            passed: false,
            detail: String::new(),
        });
        assert_eq!(report.exit_code(), 1);
        assert_eq!(report.passed_count(), 1);
    }
}
