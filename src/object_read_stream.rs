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

//! The read-side streambuf adapter.
//!
//! Pulls from an [ObjectReadSource], feeds the hash validator, accumulates
//! response headers, and surfaces hash validation when the stream closes.

use crate::hash_validator::{HashResult, HashValidator, create_hash_validator};
use crate::object_read_source::ObjectReadSource;
use crate::request::ReadObjectRangeRequest;
use crate::{Error, Result};
use std::collections::HashMap;

const PULL_BUFFER_SIZE: usize = 128 * 1024;

/// Streams an object's data to a byte consumer.
///
/// Implements [std::io::Read]; reads larger than the internal pull buffer
/// bypass it and fill the caller's buffer directly. Hash mismatches do not
/// fail reads mid-stream, they surface through
/// [status][ObjectReadStream::status] once the stream is closed.
pub struct ObjectReadStream {
    source: Option<Box<dyn ObjectReadSource>>,
    buffer: Vec<u8>,
    pos: usize,
    hash_validator: Option<HashValidator>,
    hash_result: HashResult,
    received_hash_header: String,
    status: Result<()>,
    headers: HashMap<String, String>,
}

impl ObjectReadStream {
    pub fn new(request: &ReadObjectRangeRequest, source: Box<dyn ObjectReadSource>) -> Self {
        Self {
            source: Some(source),
            buffer: Vec::new(),
            pos: 0,
            hash_validator: Some(create_hash_validator(request.options())),
            hash_result: HashResult::default(),
            received_hash_header: String::new(),
            status: Ok(()),
            headers: HashMap::new(),
        }
    }

    /// Creates a stream in a permanent error state; all reads return
    /// end-of-stream.
    pub fn new_with_error(request: &ReadObjectRangeRequest, status: Error) -> Self {
        Self {
            source: None,
            buffer: Vec::new(),
            pos: 0,
            hash_validator: Some(create_hash_validator(request.options())),
            hash_result: HashResult::default(),
            received_hash_header: String::new(),
            status: Err(status),
            headers: HashMap::new(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.source.is_some()
    }

    /// The final status of the stream; hash mismatches appear here after
    /// [close][ObjectReadStream::close].
    pub fn status(&self) -> &Result<()> {
        &self.status
    }

    pub fn received_hash(&self) -> &str {
        &self.hash_result.received
    }

    pub fn computed_hash(&self) -> &str {
        &self.hash_result.computed
    }

    /// The response headers accumulated while reading.
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Drains the source and finalizes the hash validator.
    ///
    /// A digest mismatch is reported through
    /// [status][ObjectReadStream::status], not as a panic or a read error.
    pub fn close(&mut self) {
        let mut sink = vec![0_u8; PULL_BUFFER_SIZE];
        while self.source.is_some() {
            match self.pull(&mut sink) {
                Ok(0) | Err(_) => break,
                Ok(_) => continue,
            }
        }
        self.source = None;
        let Some(validator) = self.hash_validator.take() else {
            return;
        };
        self.hash_result = validator.finish(std::mem::take(&mut self.received_hash_header));
        if self.status.is_ok() && self.hash_result.is_mismatch() {
            self.status = Err(Error::unknown(format!(
                "mismatched hashes in download, computed={}, received={}",
                self.hash_result.computed, self.hash_result.received
            )));
        }
    }

    /// Pulls directly from the source into `buf`, updating the validator and
    /// the accumulated headers.
    fn pull(&mut self, buf: &mut [u8]) -> Result<usize> {
        let Some(source) = self.source.as_mut() else {
            return Ok(0);
        };
        let result = match source.read(buf) {
            Ok(r) => r,
            Err(e) => {
                self.status = Err(e.clone());
                self.source = None;
                return Err(e);
            }
        };
        for (name, value) in &result.response.headers {
            self.headers
                .entry(name.clone())
                .or_insert_with(|| value.clone());
        }
        if result.bytes_received == 0 {
            // End of the stream: capture the server-reported hashes for
            // close() to compare against.
            if let (Some(validator), Some(header)) = (
                self.hash_validator.as_ref(),
                result.response.header("x-goog-hash"),
            ) {
                self.received_hash_header = validator.received_from_header(header);
            }
            self.source = None;
            return Ok(0);
        }
        if let Some(validator) = self.hash_validator.as_mut() {
            validator.update(&buf[..result.bytes_received]);
        }
        Ok(result.bytes_received)
    }
}

impl std::io::Read for ObjectReadStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        // Serve from the pull buffer first.
        if self.pos < self.buffer.len() {
            let n = std::cmp::min(buf.len(), self.buffer.len() - self.pos);
            buf[..n].copy_from_slice(&self.buffer[self.pos..self.pos + n]);
            self.pos += n;
            return Ok(n);
        }
        if self.source.is_none() {
            return Ok(0);
        }
        // Large reads bypass the pull buffer and fill the caller's buffer
        // directly.
        if buf.len() >= PULL_BUFFER_SIZE {
            return self.pull(buf).map_err(std::io::Error::other);
        }
        let mut scratch = vec![0_u8; PULL_BUFFER_SIZE];
        let n = self.pull(&mut scratch).map_err(std::io::Error::other)?;
        scratch.truncate(n);
        self.buffer = scratch;
        self.pos = 0;
        let n = std::cmp::min(buf.len(), self.buffer.len());
        buf[..n].copy_from_slice(&self.buffer[..n]);
        self.pos = n;
        Ok(n)
    }
}
