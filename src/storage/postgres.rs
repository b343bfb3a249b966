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

// Postgres-protocol backends: the TimescaleDB readings table and the
// relational events table. Both use bound parameters; table names come from
// validated configuration.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use std::time::Duration;
use tracing::info;

use super::backend::{Backend, EventReader, EventWriter};
use crate::config::{PostgresConfig, TimescaleConfig};
use crate::error::BackendError;
use crate::event::{Event, StoredEvent, WriteAck};

async fn connect_pool(url: &str, max_connections: u32, label: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect(url)
        .await
        .with_context(|| format!("Failed to connect to {}", label))?;

    info!("Connected to {} (pool size {})", label, max_connections);
    Ok(pool)
}

async fn ping(pool: &PgPool) -> Result<bool, BackendError> {
    let one: i32 = sqlx::query_scalar("SELECT 1").fetch_one(pool).await?;
    Ok(one == 1)
}

fn limit_param(limit: Option<u32>) -> Option<i64> {
    limit.map(i64::from)
}

/// TimescaleDB hypertable `(ts, k, v)`
pub struct TimescaleBackend {
    pool: PgPool,
    insert_sql: String,
    select_sql: String,
}

impl TimescaleBackend {
    pub async fn connect(config: &TimescaleConfig) -> Result<Self> {
        let pool = connect_pool(&config.url, config.max_connections, "TimescaleDB").await?;
        Ok(Self::with_pool(pool, &config.table))
    }

    pub fn with_pool(pool: PgPool, table: &str) -> Self {
        Self {
            pool,
            insert_sql: format!("INSERT INTO {} (ts, k, v) VALUES ($1, $2, $3)", table),
            // LIMIT NULL means no limit
            select_sql: format!(
                "SELECT ts::timestamptz AS ts, k::text AS k, v::float8 AS v \
                 FROM {} WHERE k = $1 ORDER BY ts DESC LIMIT $2",
                table
            ),
        }
    }
}

#[async_trait]
impl Backend for TimescaleBackend {
    fn name(&self) -> &str {
        "timescale"
    }

    async fn health_check(&self) -> Result<bool, BackendError> {
        ping(&self.pool).await
    }

    async fn close(&self) -> Result<(), BackendError> {
        self.pool.close().await;
        Ok(())
    }
}

#[async_trait]
impl EventWriter for TimescaleBackend {
    async fn write(&self, event: &Event) -> Result<WriteAck, BackendError> {
        sqlx::query(&self.insert_sql)
            .bind(event.timestamp)
            .bind(&event.key)
            .bind(event.value)
            .execute(&self.pool)
            .await?;
        Ok(WriteAck::Written)
    }
}

#[async_trait]
impl EventReader for TimescaleBackend {
    async fn fetch(&self, key: &str, limit: Option<u32>) -> Result<Vec<StoredEvent>, BackendError> {
        let rows: Vec<(DateTime<Utc>, String, f64)> = sqlx::query_as(&self.select_sql)
            .bind(key)
            .bind(limit_param(limit))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(ts, key, value)| StoredEvent {
                ts,
                key,
                value,
                metadata: None,
            })
            .collect())
    }
}

/// Relational `events (ts, key, value, metadata)` table
pub struct PostgresBackend {
    pool: PgPool,
    insert_sql: String,
    select_sql: String,
}

impl PostgresBackend {
    pub async fn connect(config: &PostgresConfig) -> Result<Self> {
        let pool = connect_pool(&config.url, config.max_connections, "PostgreSQL").await?;
        Ok(Self::with_pool(pool, &config.table))
    }

    pub fn with_pool(pool: PgPool, table: &str) -> Self {
        Self {
            pool,
            insert_sql: format!(
                "INSERT INTO {} (ts, key, value, metadata) VALUES ($1, $2, $3, $4)",
                table
            ),
            select_sql: format!(
                "SELECT ts::timestamptz AS ts, key::text AS key, value::float8 AS value, \
                 metadata::jsonb AS metadata \
                 FROM {} WHERE key = $1 ORDER BY ts DESC LIMIT $2",
                table
            ),
        }
    }
}

#[async_trait]
impl Backend for PostgresBackend {
    fn name(&self) -> &str {
        "postgres"
    }

    async fn health_check(&self) -> Result<bool, BackendError> {
        ping(&self.pool).await
    }

    async fn close(&self) -> Result<(), BackendError> {
        self.pool.close().await;
        Ok(())
    }
}

#[async_trait]
impl EventWriter for PostgresBackend {
    async fn write(&self, event: &Event) -> Result<WriteAck, BackendError> {
        sqlx::query(&self.insert_sql)
            .bind(event.timestamp)
            .bind(&event.key)
            .bind(event.value)
            .bind(Json(&event.metadata))
            .execute(&self.pool)
            .await?;
        Ok(WriteAck::Written)
    }
}

#[async_trait]
impl EventReader for PostgresBackend {
    async fn fetch(&self, key: &str, limit: Option<u32>) -> Result<Vec<StoredEvent>, BackendError> {
        let rows: Vec<(DateTime<Utc>, String, f64, Option<Value>)> =
            sqlx::query_as(&self.select_sql)
                .bind(key)
                .bind(limit_param(limit))
                .fetch_all(&self.pool)
                .await?;

        Ok(rows
            .into_iter()
            .map(|(ts, key, value, metadata)| StoredEvent {
                ts,
                key,
                value,
                metadata,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lazy_pool() -> PgPool {
        PgPoolOptions::new()
            .connect_lazy("postgres://user@127.0.0.1:1/none")
            .unwrap()
    }

    #[tokio::test]
    async fn test_timescale_statements_use_configured_table() {
        let backend = TimescaleBackend::with_pool(lazy_pool(), "readings");
        assert_eq!(
            backend.insert_sql,
            "INSERT INTO readings (ts, k, v) VALUES ($1, $2, $3)"
        );
        assert!(backend.select_sql.contains("FROM readings WHERE k = $1"));
        assert!(backend.select_sql.ends_with("ORDER BY ts DESC LIMIT $2"));
    }

    #[tokio::test]
    async fn test_postgres_statements_bind_metadata() {
        let backend = PostgresBackend::with_pool(lazy_pool(), "events");
        assert!(backend.insert_sql.contains("(ts, key, value, metadata)"));
        assert!(backend.insert_sql.contains("$4"));
        assert!(backend.select_sql.contains("FROM events WHERE key = $1"));
    }

    #[tokio::test]
    async fn test_closed_pool_reports_closed() {
        let backend = PostgresBackend::with_pool(lazy_pool(), "events");
        backend.close().await.unwrap();
        backend.close().await.unwrap();

        let event = Event::new("k", 1.0, None).unwrap();
        let err = backend.write(&event).await.unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Closed);
    }

    #[test]
    fn test_limit_param() {
        assert_eq!(limit_param(Some(5)), Some(5));
        assert_eq!(limit_param(None), None);
    }
}
