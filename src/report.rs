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

// Per-backend outcome map returned by every fan-out operation

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::BackendError;

/// Outcome of one fan-out, keyed by backend name in dispatch order
#[derive(Debug, Clone)]
pub struct FanOutReport<T> {
    entries: Vec<(String, Result<T, BackendError>)>,
}

impl<T> Default for FanOutReport<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> FanOutReport<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, backend: impl Into<String>, result: Result<T, BackendError>) {
        self.entries.push((backend.into(), result));
    }

    pub fn get(&self, backend: &str) -> Option<&Result<T, BackendError>> {
        self.entries
            .iter()
            .find(|(name, _)| name == backend)
            .map(|(_, result)| result)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Result<T, BackendError>)> {
        self.entries.iter().map(|(name, result)| (name.as_str(), result))
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn success_count(&self) -> usize {
        self.entries.iter().filter(|(_, r)| r.is_ok()).count()
    }

    pub fn failures(&self) -> Vec<(&str, &BackendError)> {
        self.entries
            .iter()
            .filter_map(|(name, r)| r.as_ref().err().map(|e| (name.as_str(), e)))
            .collect()
    }
}

impl<T> IntoIterator for FanOutReport<T> {
    type Item = (String, Result<T, BackendError>);
    type IntoIter = std::vec::IntoIter<Self::Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<T> FromIterator<(String, Result<T, BackendError>)> for FanOutReport<T> {
    fn from_iter<I: IntoIterator<Item = (String, Result<T, BackendError>)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Serialises as `{ "<backend>": <value> | "error: <message>" }`
impl<T: Serialize> Serialize for FanOutReport<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, result) in &self.entries {
            match result {
                Ok(value) => map.serialize_entry(name, value)?,
                Err(e) => map.serialize_entry(name, &e.to_string())?,
            }
        }
        map.end()
    }
}
