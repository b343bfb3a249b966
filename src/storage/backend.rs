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

// Role traits implemented by every backend adapter

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::BackendError;
use crate::event::{Event, StoredEvent, WriteAck};

/// Common surface of every backend adapter
#[async_trait]
pub trait Backend: Send + Sync {
    /// Stable backend name used as the key in fan-out reports
    fn name(&self) -> &str;

    /// Liveness probe
    async fn health_check(&self) -> Result<bool, BackendError>;

    /// Release the underlying handle
    ///
    /// Must be idempotent: closing an already closed adapter returns `Ok`.
    async fn close(&self) -> Result<(), BackendError>;
}

/// Backend that can persist an event
#[async_trait]
pub trait EventWriter: Backend {
    /// Translate the event into the backend's native write and perform it
    async fn write(&self, event: &Event) -> Result<WriteAck, BackendError>;
}

/// Backend that can read events back
#[async_trait]
pub trait EventReader: Backend {
    /// Records for `key`, newest first
    ///
    /// # Arguments
    /// * `key` - Event key to match
    /// * `limit` - Maximum number of records; `None` returns every record
    async fn fetch(&self, key: &str, limit: Option<u32>) -> Result<Vec<StoredEvent>, BackendError>;
}

/// One opened backend with the roles it supports
#[derive(Clone)]
pub struct BackendHandle {
    pub writer: Arc<dyn EventWriter>,
    pub reader: Option<Arc<dyn EventReader>>,
}

impl BackendHandle {
    pub fn write_only<W: EventWriter + 'static>(backend: W) -> Self {
        Self {
            writer: Arc::new(backend),
            reader: None,
        }
    }

    pub fn read_write<B: EventWriter + EventReader + 'static>(backend: B) -> Self {
        let backend = Arc::new(backend);
        Self {
            writer: backend.clone(),
            reader: Some(backend),
        }
    }

    pub fn name(&self) -> &str {
        self.writer.name()
    }
}

impl std::fmt::Debug for BackendHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendHandle")
            .field("name", &self.name())
            .field("readable", &self.reader.is_some())
            .finish()
    }
}
