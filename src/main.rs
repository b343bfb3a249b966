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

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use fanout_mesh::{
    load_config_with_env, parse_metadata_pairs, DataMesh, MeshConfig, MeshError, MeshMetrics,
    SmokeRunner,
};

/// Fan-out mesh - write one event into every configured backend
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/default.yaml")]
    config: PathBuf,

    /// Log level (overrides config file)
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a sample temperature event and read it back (default)
    Demo,
    /// Write one event to every backend
    Write {
        #[arg(short, long)]
        key: String,
        #[arg(short, long, allow_negative_numbers = true)]
        value: f64,
        /// Metadata as key=value, repeatable
        #[arg(short, long = "meta")]
        meta: Vec<String>,
    },
    /// Query the most recent events for a key
    Query {
        #[arg(short, long)]
        key: String,
        #[arg(short, long)]
        limit: Option<u32>,
    },
    /// Copy all records of a key from one backend into another
    Sync {
        #[arg(short, long)]
        source: String,
        #[arg(short, long)]
        target: String,
        #[arg(short, long)]
        key: String,
    },
    /// Probe every backend
    Health,
    /// Run the smoke scenarios against a live deployment
    Smoke,
    /// Print the metrics exposition after a demo write
    Metrics,
}

fn init_tracing(level: &str, format: &str) -> Result<()> {
    let log_level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr);
    if format == "json" {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to render report")?
    );
    Ok(())
}

async fn demo(mesh: &DataMesh) -> Result<()> {
    let metadata = parse_metadata_pairs(["sensor=lab_01", "location=lab"])?;
    let writes = mesh.write_event("temperature", 23.5, Some(metadata)).await;
    print_json(&writes)?;
    println!("{}/{} backends ok", writes.success_count(), writes.len());

    let recent = mesh.query_recent_events("temperature", Some(5)).await;
    print_json(&recent)?;
    Ok(())
}

async fn run(
    mesh: &DataMesh,
    metrics: &MeshMetrics,
    config: &MeshConfig,
    command: Command,
) -> Result<i32> {
    match command {
        Command::Demo => demo(mesh).await?,
        Command::Write { key, value, meta } => {
            let metadata = parse_metadata_pairs(&meta)?;
            let report = mesh.write_event(&key, value, Some(metadata)).await;
            print_json(&report)?;
        }
        Command::Query { key, limit } => {
            let report = mesh.query_recent_events(&key, limit).await;
            print_json(&report)?;
        }
        Command::Sync { source, target, key } => {
            let outcome = mesh.sync_data_cross_database(&source, &target, &key).await?;
            print_json(&json!({ "result": outcome.to_string() }))?;
        }
        Command::Health => {
            let report = mesh.health_check().await;
            print_json(&report)?;
        }
        Command::Smoke => {
            let report = SmokeRunner::new(mesh, config.smoke.clone()).run().await;
            print_json(&report)?;
            return Ok(report.exit_code());
        }
        Command::Metrics => {
            mesh.write_event("temperature", 23.5, None).await;
            print!("{}", metrics.render()?);
        }
    }
    Ok(0)
}

/// The command's own result wins over a close failure, which is only logged
fn finish(outcome: Result<i32>, closed: Result<(), MeshError>) -> Result<i32> {
    match closed {
        Ok(()) => info!("Mesh closed"),
        Err(e) => warn!("Failed to close mesh: {}", e),
    }
    outcome
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Load configuration from file
    let config: MeshConfig = load_config_with_env(&args.config)?;

    let level = args.log_level.as_deref().unwrap_or(&config.logging.level);
    init_tracing(level, &config.logging.format)?;

    info!("Loaded configuration from: {:?}", args.config);
    info!("Backends: {}", config.backends.enabled().join(", "));

    let metrics = Arc::new(MeshMetrics::new()?);
    let mesh = DataMesh::connect(&config)
        .await
        .context("Failed to open backends")?
        .with_metrics(metrics.clone());

    let outcome = run(&mesh, &metrics, &config, args.command.unwrap_or(Command::Demo)).await;

    // Release handles even when the command failed
    let exit_code = finish(outcome, mesh.close().await)?;
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}
