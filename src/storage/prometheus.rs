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

// Prometheus scrapes its targets; there is nothing to push per event.

use async_trait::async_trait;
use tracing::debug;

use super::backend::{Backend, EventWriter};
use crate::config::PrometheusConfig;
use crate::error::BackendError;
use crate::event::{Event, WriteAck};

#[derive(Debug, Clone, Default)]
pub struct PrometheusBackend;

impl PrometheusBackend {
    pub fn new(config: PrometheusConfig) -> Self {
        debug!("Prometheus pulls from its scrape targets ({})", config.url);
        Self
    }
}

#[async_trait]
impl Backend for PrometheusBackend {
    fn name(&self) -> &str {
        "prometheus"
    }

    async fn health_check(&self) -> Result<bool, BackendError> {
        Ok(true)
    }

    async fn close(&self) -> Result<(), BackendError> {
        Ok(())
    }
}

#[async_trait]
impl EventWriter for PrometheusBackend {
    async fn write(&self, _event: &Event) -> Result<WriteAck, BackendError> {
        Ok(WriteAck::PullBased)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_is_pull_based() {
        let backend = PrometheusBackend::new(PrometheusConfig::default());
        let event = Event::new("temperature", 23.5, None).unwrap();

        let ack = backend.write(&event).await.unwrap();
        assert_eq!(ack, WriteAck::PullBased);
        assert_eq!(ack.to_string(), "ok (pull-based, no push needed)");
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let backend = PrometheusBackend::new(PrometheusConfig::default());
        backend.close().await.unwrap();
        backend.close().await.unwrap();
        assert!(backend.health_check().await.unwrap());
    }
}
