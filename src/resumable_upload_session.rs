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

//! The resumable upload session abstraction.
//!
//! A session commits chunks at increasing offsets against an opaque session
//! URL, can query the server for the current commit frontier, and finalizes
//! the object with the last chunk. A session is owned by a single writer.

use crate::http_response::HttpResponse;
use crate::{Error, Result};
use bytes::Bytes;

/// The progress state reported by a session operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UploadState {
    InProgress,
    Done,
}

/// The result of a resumable upload session operation.
#[derive(Clone, Debug, PartialEq)]
pub struct ResumableUploadResponse {
    /// The session URL, populated from the `location` header on session
    /// creation and empty otherwise.
    pub upload_session_url: String,
    /// The inclusive index of the last byte committed by the server, or 0
    /// when the server reported no progress.
    pub last_committed_byte: u64,
    /// The response body, carrying the object metadata when the upload
    /// finalizes.
    pub payload: Bytes,
    pub upload_state: UploadState,
}

impl ResumableUploadResponse {
    /// Builds a response from the raw HTTP exchange.
    ///
    /// The upload is `Done` only on HTTP 200 or 201. The committed byte is
    /// parsed from a `range` header of the exact form `bytes=0-<digits>`;
    /// any other shape reports no progress.
    pub fn from_http_response(response: HttpResponse) -> Self {
        let upload_state = match response.status_code {
            200 | 201 => UploadState::Done,
            _ => UploadState::InProgress,
        };
        let upload_session_url = response.header("location").unwrap_or_default().to_string();
        let last_committed_byte = response
            .header("range")
            .and_then(parse_last_committed_byte)
            .unwrap_or(0);
        Self {
            upload_session_url,
            last_committed_byte,
            payload: response.payload,
            upload_state,
        }
    }
}

fn parse_last_committed_byte(range: &str) -> Option<u64> {
    let (head, tail) = range.split_at_checked("bytes=0-".len())?;
    if !head.eq_ignore_ascii_case("bytes=0-") {
        return None;
    }
    if tail.is_empty() || !tail.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    tail.parse::<u64>().ok()
}

/// Defines the interface for a resumable upload session.
#[cfg_attr(test, mockall::automock)]
pub trait ResumableUploadSession: Send + std::fmt::Debug {
    /// Uploads a chunk and returns the resulting response.
    ///
    /// The payload size must be a positive multiple of
    /// [CHUNK_SIZE_QUANTUM][crate::request::UploadChunkRequest::CHUNK_SIZE_QUANTUM].
    fn upload_chunk(&mut self, payload: Bytes) -> Result<ResumableUploadResponse>;

    /// Uploads the last chunk, committing all previous data.
    ///
    /// `upload_size` is the total size of the object. An empty payload with
    /// `upload_size == 0` finalizes a zero-length object.
    fn upload_final_chunk(
        &mut self,
        payload: Bytes,
        upload_size: u64,
    ) -> Result<ResumableUploadResponse>;

    /// Queries the server for the current commit frontier.
    fn reset_session(&mut self) -> Result<ResumableUploadResponse>;

    /// The next byte the server expects.
    ///
    /// Callers should check this value after a partially failed
    /// `upload_chunk()` to learn which suffix needs to be re-sent.
    fn next_expected_byte(&self) -> u64;

    /// The session URL; may change during an upload.
    fn session_id(&self) -> &str;

    /// Returns true once the session reached a terminal state.
    fn done(&self) -> bool;

    /// The last response observed by this session.
    fn last_response(&self) -> &Result<ResumableUploadResponse>;
}

/// A resumable upload session that always returns an error.
///
/// Created when an unrecoverable error is detected, so callers hold a
/// session that reports the failure instead of a null value.
#[derive(Debug)]
pub struct ResumableUploadSessionError {
    last_response: Result<ResumableUploadResponse>,
    id: String,
}

impl ResumableUploadSessionError {
    pub fn new(status: Error) -> Self {
        Self {
            last_response: Err(status),
            id: String::new(),
        }
    }

    fn status(&self) -> Error {
        self.last_response
            .as_ref()
            .expect_err("constructed from an error")
            .clone()
    }
}

impl ResumableUploadSession for ResumableUploadSessionError {
    fn upload_chunk(&mut self, _payload: Bytes) -> Result<ResumableUploadResponse> {
        Err(self.status())
    }

    fn upload_final_chunk(
        &mut self,
        _payload: Bytes,
        _upload_size: u64,
    ) -> Result<ResumableUploadResponse> {
        Err(self.status())
    }

    fn reset_session(&mut self) -> Result<ResumableUploadResponse> {
        Err(self.status())
    }

    fn next_expected_byte(&self) -> u64 {
        0
    }

    fn session_id(&self) -> &str {
        &self.id
    }

    fn done(&self) -> bool {
        true
    }

    fn last_response(&self) -> &Result<ResumableUploadResponse> {
        &self.last_response
    }
}
