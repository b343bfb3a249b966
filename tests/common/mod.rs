// In-memory backends standing in for the real services

#![allow(dead_code)]

use async_trait::async_trait;
use fanout_mesh::config::{DispatchMode, MeshSettings, PrometheusConfig};
use fanout_mesh::storage::PrometheusBackend;
use fanout_mesh::{
    Backend, BackendError, BackendHandle, DataMesh, Event, EventReader, EventWriter, StoredEvent,
    WriteAck, BACKEND_ORDER, QUERYABLE,
};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Behaviour {
    Healthy,
    Unreachable,
    Slow(Duration),
}

/// Records kept by one mock backend
#[derive(Debug, Default)]
pub struct MemoryStore {
    pub rows: Mutex<Vec<StoredEvent>>,
    pub write_calls: AtomicUsize,
    pub closed: AtomicBool,
}

impl MemoryStore {
    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn writes(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }
}

pub struct MockBackend {
    pub name: String,
    pub behaviour: Behaviour,
    /// Cache semantics: one value per key, last write wins
    pub last_write_wins: bool,
    pub fail_close: bool,
    pub store: Arc<MemoryStore>,
}

impl MockBackend {
    pub fn new(name: &str, behaviour: Behaviour) -> Self {
        Self {
            name: name.to_string(),
            behaviour,
            last_write_wins: name == "redis",
            fail_close: false,
            store: Arc::new(MemoryStore::default()),
        }
    }

    fn check(&self) -> Result<(), BackendError> {
        if self.store.closed.load(Ordering::SeqCst) {
            return Err(BackendError::closed(&self.name));
        }
        if self.behaviour == Behaviour::Unreachable {
            return Err(BackendError::connectivity(format!(
                "{}: connection refused",
                self.name
            )));
        }
        Ok(())
    }

    async fn pause(&self) {
        if let Behaviour::Slow(delay) = self.behaviour {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl Backend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn health_check(&self) -> Result<bool, BackendError> {
        self.check()?;
        self.pause().await;
        Ok(true)
    }

    async fn close(&self) -> Result<(), BackendError> {
        if self.fail_close {
            return Err(BackendError::rejected("socket already torn down"));
        }
        self.store.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl EventWriter for MockBackend {
    async fn write(&self, event: &Event) -> Result<WriteAck, BackendError> {
        self.store.write_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.pause().await;

        let row = StoredEvent {
            ts: event.timestamp,
            key: event.key.clone(),
            value: event.value,
            metadata: if event.metadata.is_empty() {
                None
            } else {
                Some(Value::Object(event.metadata.clone()))
            },
        };

        let mut rows = self.store.rows.lock().unwrap();
        if self.last_write_wins {
            rows.retain(|r| r.key != row.key);
        }
        rows.push(row);
        Ok(WriteAck::Written)
    }
}

#[async_trait]
impl EventReader for MockBackend {
    async fn fetch(&self, key: &str, limit: Option<u32>) -> Result<Vec<StoredEvent>, BackendError> {
        self.check()?;
        self.pause().await;

        let mut rows: Vec<StoredEvent> = self
            .store
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.key == key)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.ts.cmp(&a.ts));
        if let Some(n) = limit {
            rows.truncate(n as usize);
        }
        Ok(rows)
    }
}

/// Full ten-backend mesh over mocks plus the real metrics backend
pub struct TestMesh {
    pub mesh: DataMesh,
    pub stores: Vec<(String, Arc<MemoryStore>)>,
}

impl TestMesh {
    pub fn store(&self, name: &str) -> &Arc<MemoryStore> {
        &self
            .stores
            .iter()
            .find(|(n, _)| n == name)
            .unwrap_or_else(|| panic!("no store for {}", name))
            .1
    }
}

pub fn settings(dispatch: DispatchMode) -> MeshSettings {
    MeshSettings {
        dispatch,
        backend_timeout_ms: 1_000,
        ..Default::default()
    }
}

/// Build a mesh in dispatch order; `tweak` can adjust each mock before it is wrapped
pub fn build_mesh<F>(settings: MeshSettings, mut tweak: F) -> TestMesh
where
    F: FnMut(&mut MockBackend),
{
    let mut handles = Vec::new();
    let mut stores = Vec::new();

    for name in BACKEND_ORDER {
        if name == "prometheus" {
            handles.push(BackendHandle::write_only(PrometheusBackend::new(
                PrometheusConfig::default(),
            )));
            continue;
        }

        let mut mock = MockBackend::new(name, Behaviour::Healthy);
        tweak(&mut mock);
        stores.push((name.to_string(), mock.store.clone()));

        if QUERYABLE.contains(&name) {
            handles.push(BackendHandle::read_write(mock));
        } else {
            handles.push(BackendHandle::write_only(mock));
        }
    }

    TestMesh {
        mesh: DataMesh::from_backends(handles, settings),
        stores,
    }
}

pub fn healthy_mesh() -> TestMesh {
    build_mesh(settings(DispatchMode::Sequential), |_| {})
}
