// Smoke harness scenarios over in-memory backends

mod common;

use common::{build_mesh, healthy_mesh, settings, Behaviour};
use fanout_mesh::config::{DispatchMode, SmokeConfig};
use fanout_mesh::SmokeRunner;

fn quick_smoke() -> SmokeConfig {
    SmokeConfig {
        iterations: 30,
        read_delay_ms: 0,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_all_scenarios_pass_on_healthy_mesh() {
    let t = healthy_mesh();

    let report = SmokeRunner::new(&t.mesh, quick_smoke()).run().await;

    let names: Vec<&str> = report.scenarios.iter().map(|s| s.name).collect();
    assert_eq!(
        names,
        vec!["connectivity", "write", "read", "throughput", "parameter_set"]
    );
    assert!(report.all_passed(), "{:?}", report);
    assert_eq!(report.exit_code(), 0);

    // 1 write + 1 read + 30 throughput + 3 parameter writes
    assert_eq!(t.store("redis").writes(), 35);
}

#[tokio::test]
async fn test_one_backend_down_stays_above_threshold() {
    let t = build_mesh(settings(DispatchMode::Concurrent), |m| {
        if m.name == "neo4j" {
            m.behaviour = Behaviour::Unreachable;
        }
    });

    let report = SmokeRunner::new(&t.mesh, quick_smoke()).run().await;

    assert!(report.all_passed(), "{:?}", report);
}

#[tokio::test]
async fn test_three_backends_down_fail_write_scenarios() {
    let t = build_mesh(settings(DispatchMode::Sequential), |m| {
        if ["redis", "influx", "qdrant"].contains(&m.name.as_str()) {
            m.behaviour = Behaviour::Unreachable;
        }
    });

    let runner = SmokeRunner::new(&t.mesh, quick_smoke());

    let write = runner.write().await;
    assert!(!write.passed);
    assert!(write.detail.starts_with("7/10"));

    assert!(!runner.connectivity().await.passed);
    assert!(!runner.parameter_set().await.passed);

    // All queryable backends are still up
    assert!(runner.read().await.passed);
}

#[tokio::test]
async fn test_read_scenario_needs_three_readers() {
    let t = build_mesh(settings(DispatchMode::Sequential), |m| {
        if ["timescale", "clickhouse", "postgres"].contains(&m.name.as_str()) {
            m.behaviour = Behaviour::Unreachable;
        }
    });

    let read = SmokeRunner::new(&t.mesh, quick_smoke()).read().await;

    assert!(!read.passed);
    assert!(read.detail.starts_with("2/5"));
}

#[tokio::test]
async fn test_failed_run_exits_non_zero() {
    let t = build_mesh(settings(DispatchMode::Sequential), |m| {
        m.behaviour = Behaviour::Unreachable;
    });

    let report = SmokeRunner::new(&t.mesh, quick_smoke()).run().await;

    assert!(!report.all_passed());
    assert_eq!(report.exit_code(), 1);
    // Throughput only measures the mesh call rate, which stays high
    assert!(report.scenarios[3].passed);
}
