// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A transport-neutral HTTP response and its mapping to [Error].

use crate::{Error, ErrorKind};
use bytes::Bytes;
use std::collections::HashMap;

/// The pieces of an HTTP response the protocol layer consumes.
///
/// Header names are stored lowercased, matching what reqwest exposes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HttpResponse {
    pub status_code: u16,
    pub payload: Bytes,
    pub headers: HashMap<String, String>,
}

impl HttpResponse {
    pub fn new(status_code: u16, payload: Bytes, headers: HashMap<String, String>) -> Self {
        Self {
            status_code,
            payload,
            headers,
        }
    }

    /// Returns a header value by its lowercase name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Converts a failed response into the [Error] it represents.
    pub fn as_status(&self) -> Error {
        let kind = ErrorKind::from_http_status(self.status_code);
        let body = String::from_utf8_lossy(&self.payload);
        Error::new(
            kind,
            format!("HTTP error {} returned: {}", self.status_code, body),
        )
    }
}
