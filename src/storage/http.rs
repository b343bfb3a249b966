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

// Shared plumbing for backends reached over HTTP

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Response};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::error::BackendError;

/// Authorization header attached to every request
pub enum HttpAuth<'a> {
    None,
    /// `Authorization: <scheme> <token>`
    Token { scheme: &'a str, token: &'a str },
    /// Vendor-specific key header, e.g. `api-key: <value>`
    Header { name: &'static str, value: &'a str },
}

/// Build a pooled HTTP client for one backend
pub fn build_client(
    timeout_seconds: u64,
    auth: HttpAuth<'_>,
    accept_invalid_certs: bool,
) -> Result<Client> {
    let mut client_builder = reqwest::ClientBuilder::new()
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .timeout(Duration::from_secs(timeout_seconds))
        .danger_accept_invalid_certs(accept_invalid_certs);

    let mut headers = HeaderMap::new();
    match auth {
        HttpAuth::None => {}
        HttpAuth::Token { scheme, token } => {
            let auth_value = format!("{} {}", scheme, token);
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&auth_value).context("Invalid API token")?,
            );
        }
        HttpAuth::Header { name, value } => {
            headers.insert(name, HeaderValue::from_str(value).context("Invalid API key")?);
        }
    }
    if !headers.is_empty() {
        client_builder = client_builder.default_headers(headers);
    }

    client_builder.build().context("Failed to build HTTP client")
}

/// Turn a non-2xx response into a `Rejected` error carrying the body
pub async fn ensure_success(backend: &str, response: Response) -> Result<Response, BackendError> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let error_text = response.text().await.unwrap_or_default();
    Err(BackendError::rejected(format!(
        "{} request failed with status {}: {}",
        backend,
        status,
        error_text.trim()
    )))
}

/// Open/closed flag for handles whose client has no explicit close
#[derive(Debug, Default)]
pub struct CloseFlag(AtomicBool);

impl CloseFlag {
    /// Fails with `ErrorKind::Closed` once `close` has been called
    pub fn check(&self, backend: &str) -> Result<(), BackendError> {
        if self.0.load(Ordering::Acquire) {
            Err(BackendError::closed(backend))
        } else {
            Ok(())
        }
    }

    pub fn close(&self) {
        self.0.store(true, Ordering::Release);
    }
}

pub fn trim_base(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}
