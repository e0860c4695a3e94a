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

//! A blocking client engine for [Google Cloud Storage] resumable uploads.
//!
//! This crate implements the client side of the [resumable upload]
//! protocol: a stateful upload session with at-most-one-object-create
//! semantics, chunked transfer at a fixed 256 KiB quantum, policy-driven
//! retry and backoff around session resets, and buffering adapters that
//! turn arbitrary byte writes (and reads) into protocol operations while
//! validating content hashes on both sides.
//!
//! The main entry points are:
//!
//! - [HttpClient][http_client::HttpClient] creates, restores, and drives
//!   resumable upload sessions over HTTP, and starts object reads.
//! - [RetryResumableUploadSession][retry_resumable_upload_session::RetryResumableUploadSession]
//!   decorates a session with a [RetryPolicy][retry_policy::RetryPolicy]
//!   and a [BackoffPolicy][backoff_policy::BackoffPolicy].
//! - [ObjectWriteStream][object_write_stream::ObjectWriteStream] and
//!   [ObjectReadStream][object_read_stream::ObjectReadStream] adapt the
//!   protocol to `std::io::Write` / `std::io::Read`.
//! - [credentials] parses service account keys (JSON and PKCS#12).
//!
//! # Example: upload through a write stream
//!
//! ```no_run
//! use gcs_client::http_client::HttpClient;
//! use gcs_client::hash_validator::HashValidator;
//! use gcs_client::object_write_stream::ObjectWriteStream;
//! use gcs_client::options::ClientOptions;
//! use gcs_client::request::{ResumableUploadRequest, UploadChunkRequest};
//! use gcs_client::retry_resumable_upload_session::RetryResumableUploadSession;
//! use std::io::Write;
//!
//! # fn sample() -> gcs_client::Result<()> {
//! let options = ClientOptions::new();
//! let retry = options.default_retry_policy();
//! let backoff = options.default_backoff_policy();
//! let client = HttpClient::new(options)?;
//!
//! let request = ResumableUploadRequest::new("my-bucket", "my-object");
//! let session = client.create_resumable_session(&request)?;
//! let session = Box::new(RetryResumableUploadSession::new(session, retry, backoff));
//!
//! let mut stream = ObjectWriteStream::new(
//!     session,
//!     UploadChunkRequest::CHUNK_SIZE_QUANTUM,
//!     HashValidator::new_composite(),
//! )?;
//! stream.write_all(b"hello world").expect("buffered writes do not fail");
//! let response = stream.close()?;
//! println!("upload complete: {response:?}");
//! # Ok(()) }
//! ```
//!
//! A session is owned by a single writer and is not safe for concurrent
//! use; run independent sessions on independent threads.
//!
//! [Google Cloud Storage]: https://cloud.google.com/storage
//! [resumable upload]: https://cloud.google.com/storage/docs/resumable-uploads

pub mod backoff_policy;
pub mod credentials;
mod error;
pub mod hash_validator;
pub mod http_client;
pub mod http_response;
pub mod model;
pub mod object_read_source;
pub mod object_read_stream;
pub mod object_write_stream;
pub mod options;
pub mod request;
pub mod resumable_upload_session;
pub mod retry_policy;
pub mod retry_resumable_upload_session;
pub mod version;

pub use error::{Error, ErrorKind, Result};
