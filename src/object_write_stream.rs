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

//! The write-side streambuf adapter.
//!
//! Turns arbitrary byte appends into quantum-aligned chunk commits against
//! a resumable upload session, and issues the final chunk on close.

use crate::hash_validator::{HashResult, HashValidator};
use crate::model::ObjectMetadata;
use crate::request::UploadChunkRequest;
use crate::resumable_upload_session::{ResumableUploadResponse, ResumableUploadSession};
use crate::{Error, Result};
use bytes::Bytes;

/// Buffers appended bytes and commits them through a resumable upload
/// session.
///
/// Implements [std::io::Write]. Intermediate commits only ever send whole
/// multiples of the chunk quantum; the residual stays buffered until more
/// data arrives or the stream is closed. A failed commit invalidates the
/// stream: later calls return the stored failure and the session is not
/// reused.
pub struct ObjectWriteStream {
    session: Box<dyn ResumableUploadSession>,
    buffer: Vec<u8>,
    max_buffer_size: usize,
    hash_validator: Option<HashValidator>,
    hash_result: HashResult,
    last_response: Option<Result<ResumableUploadResponse>>,
    open: bool,
}

impl ObjectWriteStream {
    /// Creates a new stream owning `session`.
    ///
    /// `max_buffer_size` must be a positive multiple of
    /// [CHUNK_SIZE_QUANTUM][UploadChunkRequest::CHUNK_SIZE_QUANTUM].
    pub fn new(
        session: Box<dyn ResumableUploadSession>,
        max_buffer_size: usize,
        hash_validator: HashValidator,
    ) -> Result<Self> {
        let quantum = UploadChunkRequest::CHUNK_SIZE_QUANTUM;
        if max_buffer_size == 0 || max_buffer_size % quantum != 0 {
            return Err(Error::invalid_argument(format!(
                "the buffer size ({max_buffer_size}) must be a positive multiple of the upload quantum ({quantum})"
            )));
        }
        Ok(Self {
            session,
            buffer: Vec::with_capacity(max_buffer_size),
            max_buffer_size,
            hash_validator: Some(hash_validator),
            hash_result: HashResult::default(),
            last_response: None,
            open: true,
        })
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn received_hash(&self) -> &str {
        &self.hash_result.received
    }

    pub fn computed_hash(&self) -> &str {
        &self.hash_result.computed
    }

    /// The session id; callers can persist it to resume the upload later.
    pub fn resumable_session_id(&self) -> &str {
        self.session.session_id()
    }

    /// The next byte the server expects.
    pub fn next_expected_byte(&self) -> u64 {
        self.session.next_expected_byte()
    }

    /// Commits all complete quanta currently buffered.
    ///
    /// Never sends a partial chunk; the residual stays in the buffer.
    pub fn sync(&mut self) -> Result<()> {
        if let Some(Err(e)) = &self.last_response {
            return Err(e.clone());
        }
        if !self.open {
            return Err(Error::failed_precondition("the stream is already closed"));
        }
        let quantum = UploadChunkRequest::CHUNK_SIZE_QUANTUM;
        let aligned = (self.buffer.len() / quantum) * quantum;
        if aligned == 0 {
            return Ok(());
        }
        let payload = Bytes::copy_from_slice(&self.buffer[..aligned]);
        match self.session.upload_chunk(payload) {
            Ok(response) => {
                if let Some(validator) = self.hash_validator.as_mut() {
                    validator.update(&self.buffer[..aligned]);
                }
                self.buffer.drain(..aligned);
                self.last_response = Some(Ok(response));
                Ok(())
            }
            Err(e) => {
                tracing::warn!("error committing chunk, the upload stream is now invalid: {e}");
                self.last_response = Some(Err(e.clone()));
                Err(e)
            }
        }
    }

    /// Commits the remaining bytes, finalizes the object, and validates the
    /// content hashes against the returned metadata.
    pub fn close(&mut self) -> Result<ResumableUploadResponse> {
        if let Some(Err(e)) = &self.last_response {
            let e = e.clone();
            self.open = false;
            return Err(e);
        }
        if !self.open {
            return self
                .last_response
                .clone()
                .unwrap_or_else(|| Err(Error::failed_precondition("the stream is already closed")));
        }
        let upload_size = self.session.next_expected_byte() + self.buffer.len() as u64;
        let payload = Bytes::copy_from_slice(&self.buffer);
        let result = self.session.upload_final_chunk(payload, upload_size);
        self.open = false;
        match result {
            Ok(response) => {
                if let Some(validator) = self.hash_validator.as_mut() {
                    validator.update(&self.buffer);
                }
                self.buffer.clear();
                self.last_response = Some(Ok(response.clone()));
                self.validate_hash(&response)?;
                Ok(response)
            }
            Err(e) => {
                self.last_response = Some(Err(e.clone()));
                Err(e)
            }
        }
    }

    /// Compares the computed hashes against the finalized object metadata.
    fn validate_hash(&mut self, response: &ResumableUploadResponse) -> Result<()> {
        let Some(validator) = self.hash_validator.take() else {
            return Ok(());
        };
        let received = match ObjectMetadata::from_payload(&response.payload) {
            Ok(metadata) => validator.received_from_metadata(&metadata),
            // The service may return a trimmed payload (e.g. with the
            // `Fields` option); skip validation rather than fail the upload.
            Err(_) => String::new(),
        };
        self.hash_result = validator.finish(received);
        if self.hash_result.is_mismatch() {
            return Err(Error::unknown(format!(
                "mismatched hashes in upload, computed={}, received={}",
                self.hash_result.computed, self.hash_result.received
            )));
        }
        Ok(())
    }

    fn failed(&self) -> bool {
        matches!(&self.last_response, Some(Err(_)))
    }

    fn stored_failure(&self) -> Error {
        match &self.last_response {
            Some(Err(e)) => e.clone(),
            _ => Error::failed_precondition("the stream is already closed"),
        }
    }
}

impl std::io::Write for ObjectWriteStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if !self.open || self.failed() {
            return Err(std::io::Error::other(self.stored_failure()));
        }
        self.buffer.extend_from_slice(buf);
        if self.buffer.len() >= self.max_buffer_size {
            self.sync().map_err(std::io::Error::other)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.sync().map_err(std::io::Error::other)
    }
}

impl std::fmt::Debug for ObjectWriteStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectWriteStream")
            .field("session_id", &self.session.session_id())
            .field("buffered", &self.buffer.len())
            .field("max_buffer_size", &self.max_buffer_size)
            .field("open", &self.open)
            .finish()
    }
}
