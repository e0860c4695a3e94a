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

//! The source of bytes for object reads.

use crate::http_response::HttpResponse;
use crate::{Error, Result};
use bytes::Bytes;
use std::collections::HashMap;
use std::io::Read;

/// The result of one pull from an [ObjectReadSource].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReadSourceResult {
    /// The number of bytes placed in the caller's buffer; 0 signals the end
    /// of the stream.
    pub bytes_received: usize,
    /// The response metadata: the status code and any headers received so
    /// far, including the server-reported hashes.
    pub response: HttpResponse,
}

/// Defines the interface to pull object data from a response body.
#[cfg_attr(test, mockall::automock)]
pub trait ObjectReadSource: Send {
    /// Pulls more data, filling `buf` as far as the transport allows.
    fn read(&mut self, buf: &mut [u8]) -> Result<ReadSourceResult>;
}

/// An [ObjectReadSource] streaming from a `reqwest::blocking::Response`.
pub struct HttpObjectReadSource {
    body: reqwest::blocking::Response,
    status_code: u16,
    headers: HashMap<String, String>,
}

impl HttpObjectReadSource {
    pub fn new(response: reqwest::blocking::Response) -> Self {
        let status_code = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| {
                v.to_str()
                    .ok()
                    .map(|v| (k.as_str().to_string(), v.to_string()))
            })
            .collect();
        Self {
            body: response,
            status_code,
            headers,
        }
    }
}

impl ObjectReadSource for HttpObjectReadSource {
    fn read(&mut self, buf: &mut [u8]) -> Result<ReadSourceResult> {
        let bytes_received = self
            .body
            .read(buf)
            .map_err(|e| Error::unavailable(format!("error reading response body: {e}")))?;
        Ok(ReadSourceResult {
            bytes_received,
            response: HttpResponse::new(self.status_code, Bytes::new(), self.headers.clone()),
        })
    }
}

impl std::fmt::Debug for HttpObjectReadSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpObjectReadSource")
            .field("status_code", &self.status_code)
            .finish()
    }
}
