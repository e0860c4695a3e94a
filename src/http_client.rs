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

//! The HTTP implementation of the upload and read protocols.

use crate::http_response::HttpResponse;
use crate::object_read_source::HttpObjectReadSource;
use crate::options::ClientOptions;
use crate::request::{
    QueryResumableUploadRequest, ReadObjectRangeRequest, ResumableUploadRequest,
    UploadChunkRequest,
};
use crate::resumable_upload_session::{
    ResumableUploadResponse, ResumableUploadSession, UploadState,
};
use crate::version::x_goog_api_client;
use crate::{Error, Result};
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;

/// The two transport calls a resumable upload session consumes.
///
/// The retry loop for these calls is very different from the standard
/// one-shot retry loop, so they are a separate seam from the rest of the
/// client surface.
#[cfg_attr(test, mockall::automock)]
pub trait StorageTransport: Send + Sync {
    /// Commits one chunk against the session URL in the request.
    fn upload_chunk(&self, request: &UploadChunkRequest) -> Result<ResumableUploadResponse>;

    /// Queries the commit frontier of the session URL in the request.
    fn query_resumable_upload(
        &self,
        request: &QueryResumableUploadRequest,
    ) -> Result<ResumableUploadResponse>;
}

/// A [ResumableUploadSession] driven over a [StorageTransport].
pub struct HttpResumableUploadSession {
    client: Arc<dyn StorageTransport>,
    session_url: String,
    next_expected: u64,
    done: bool,
    failed: bool,
    last_response: Result<ResumableUploadResponse>,
}

impl HttpResumableUploadSession {
    pub fn new(client: Arc<dyn StorageTransport>, session_url: String) -> Self {
        Self {
            client,
            session_url,
            next_expected: 0,
            done: false,
            failed: false,
            last_response: Err(Error::unknown("no response received in this session")),
        }
    }

    /// Records the result of an operation and keeps the commit frontier and
    /// terminal flags in sync with it.
    fn update(&mut self, result: Result<ResumableUploadResponse>) -> Result<ResumableUploadResponse> {
        match &result {
            Ok(response) => {
                self.next_expected = match response.last_committed_byte {
                    0 => 0,
                    last => last + 1,
                };
                if response.upload_state == UploadState::Done {
                    self.done = true;
                }
                // The session URL may change during an upload.
                if !response.upload_session_url.is_empty() {
                    self.session_url = response.upload_session_url.clone();
                }
            }
            Err(e) => {
                if !e.is_transient() {
                    tracing::debug!("permanent error, the session is now terminal: {e}");
                    self.failed = true;
                }
            }
        }
        self.last_response = result.clone();
        result
    }
}

impl ResumableUploadSession for HttpResumableUploadSession {
    fn upload_chunk(&mut self, payload: Bytes) -> Result<ResumableUploadResponse> {
        if self.done || self.failed {
            return self.last_response.clone();
        }
        let quantum = UploadChunkRequest::CHUNK_SIZE_QUANTUM;
        if payload.is_empty() || payload.len() % quantum != 0 {
            return Err(Error::invalid_argument(format!(
                "the chunk size ({}) must be a positive multiple of the upload quantum ({quantum})",
                payload.len()
            )));
        }
        let request = UploadChunkRequest::new(self.session_url.clone(), self.next_expected, payload);
        let result = self.client.upload_chunk(&request);
        self.update(result)
    }

    fn upload_final_chunk(
        &mut self,
        payload: Bytes,
        upload_size: u64,
    ) -> Result<ResumableUploadResponse> {
        if self.done || self.failed {
            return self.last_response.clone();
        }
        let request = UploadChunkRequest::last(
            self.session_url.clone(),
            self.next_expected,
            payload,
            upload_size,
        );
        let result = self.client.upload_chunk(&request);
        self.update(result)
    }

    fn reset_session(&mut self) -> Result<ResumableUploadResponse> {
        if self.done || self.failed {
            return self.last_response.clone();
        }
        let request = QueryResumableUploadRequest::new(self.session_url.clone());
        let result = self.client.query_resumable_upload(&request);
        self.update(result)
    }

    fn next_expected_byte(&self) -> u64 {
        self.next_expected
    }

    fn session_id(&self) -> &str {
        &self.session_url
    }

    fn done(&self) -> bool {
        self.done
    }

    fn last_response(&self) -> &Result<ResumableUploadResponse> {
        &self.last_response
    }
}

impl std::fmt::Debug for HttpResumableUploadSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResumableUploadSession")
            .field("session_url", &self.session_url)
            .field("next_expected", &self.next_expected)
            .field("done", &self.done)
            .field("failed", &self.failed)
            .finish()
    }
}

/// The object-name characters escaped when the name is spliced into a
/// request path.
///
/// Object names are the only URL component built from caller input: the
/// session URL is opaque, query parameters are encoded by the request
/// builder, and bucket names are restricted by the service to lowercase
/// letters, digits, `-`, `_`, and `.`. Everything outside the RFC 3986
/// unreserved characters is escaped, except `%` so names that arrive
/// pre-encoded are not encoded twice.
const OBJECT_NAME_ESCAPES: percent_encoding::AsciiSet = percent_encoding::NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'%');

fn enc_object_name(name: &str) -> percent_encoding::PercentEncode<'_> {
    percent_encoding::utf8_percent_encode(name, &OBJECT_NAME_ESCAPES)
}

/// A blocking client for the storage JSON API upload and read surface.
///
/// Cloning is cheap; the underlying connection pool is shared between
/// clones.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::blocking::Client,
    options: ClientOptions,
    storage_endpoint: String,
    upload_endpoint: String,
}

impl HttpClient {
    pub fn new(options: ClientOptions) -> Result<Self> {
        let user_agent = match options.user_agent_prefix() {
            "" => x_goog_api_client().to_string(),
            prefix => format!("{prefix} {}", x_goog_api_client()),
        };
        let client = reqwest::blocking::Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| Error::unknown(format!("cannot initialize the HTTP client: {e}")))?;
        let storage_endpoint = format!("{}/storage/{}", options.endpoint(), options.version());
        let upload_endpoint =
            format!("{}/upload/storage/{}", options.endpoint(), options.version());
        Ok(Self {
            client,
            options,
            storage_endpoint,
            upload_endpoint,
        })
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Starts a resumable upload session.
    ///
    /// Honors [UseResumableUploadSession]
    /// [crate::request::RequestOption::UseResumableUploadSession] by
    /// restoring the named session instead of creating a new one.
    pub fn create_resumable_session(
        &self,
        request: &ResumableUploadRequest,
    ) -> Result<Box<dyn ResumableUploadSession>> {
        if let Some(session_id) = request.session_id() {
            return self.restore_resumable_session(session_id);
        }
        let mut builder = self
            .client
            .post(format!(
                "{}/b/{}/o",
                self.upload_endpoint,
                request.bucket_name()
            ))
            .query(&[("uploadType", "resumable")]);
        for option in request.options() {
            if let Some((key, value)) = option.query_parameter() {
                builder = builder.query(&[(key, value)]);
            }
        }
        let builder = match request.json_payload() {
            None => builder
                .query(&[("name", request.object_name())])
                .header("content-type", "application/json; charset=UTF-8")
                .body(String::new()),
            Some(payload) => builder
                .header("content-type", "application/json; charset=UTF-8")
                .body(payload),
        };
        let response = self.send(builder)?;
        if response.status_code >= 300 {
            return Err(response.as_status());
        }
        let response = ResumableUploadResponse::from_http_response(response);
        if response.upload_session_url.is_empty() {
            return Err(Error::unknown(format!(
                "invalid server response, missing session URL when creating an upload for {}/{}",
                request.bucket_name(),
                request.object_name()
            )));
        }
        Ok(Box::new(HttpResumableUploadSession::new(
            Arc::new(self.clone()) as Arc<dyn StorageTransport>,
            response.upload_session_url,
        )))
    }

    /// Restores a resumable upload session from its id.
    ///
    /// Queries the commit frontier so the caller can continue from the right
    /// offset.
    pub fn restore_resumable_session(
        &self,
        session_id: &str,
    ) -> Result<Box<dyn ResumableUploadSession>> {
        let mut session = HttpResumableUploadSession::new(
            Arc::new(self.clone()) as Arc<dyn StorageTransport>,
            session_id.to_string(),
        );
        session.reset_session()?;
        Ok(Box::new(session))
    }

    /// Starts reading an object.
    pub fn read_object(&self, request: &ReadObjectRangeRequest) -> Result<HttpObjectReadSource> {
        let mut builder = self
            .client
            .get(format!(
                "{}/b/{}/o/{}",
                self.storage_endpoint,
                request.bucket_name(),
                enc_object_name(request.object_name())
            ))
            .query(&[("alt", "media")])
            .header("x-goog-api-client", x_goog_api_client());
        for option in request.options() {
            if let Some((key, value)) = option.query_parameter() {
                builder = builder.query(&[(key, value)]);
            }
        }
        if let Some(range) = request.range_header() {
            builder = builder.header("range", range);
        }
        let response = builder
            .send()
            .map_err(|e| Error::unavailable(format!("transport error: {e}")))?;
        if !response.status().is_success() {
            let status_code = response.status().as_u16();
            let headers = collect_headers(response.headers());
            let payload = response
                .bytes()
                .map_err(|e| Error::unavailable(format!("transport error: {e}")))?;
            return Err(HttpResponse::new(status_code, payload, headers).as_status());
        }
        Ok(HttpObjectReadSource::new(response))
    }

    /// Sends a request and collects the full response.
    fn send(&self, builder: reqwest::blocking::RequestBuilder) -> Result<HttpResponse> {
        let response = builder
            .header("x-goog-api-client", x_goog_api_client())
            .send()
            .map_err(|e| Error::unavailable(format!("transport error: {e}")))?;
        let status_code = response.status().as_u16();
        let headers = collect_headers(response.headers());
        let payload = response
            .bytes()
            .map_err(|e| Error::unavailable(format!("transport error: {e}")))?;
        Ok(HttpResponse::new(status_code, payload, headers))
    }
}

impl StorageTransport for HttpClient {
    fn upload_chunk(&self, request: &UploadChunkRequest) -> Result<ResumableUploadResponse> {
        let builder = self
            .client
            .put(request.upload_session_url())
            .header("Content-Range", request.range_header())
            .header("content-type", "application/octet-stream")
            .body(request.payload().clone());
        let response = self.send(builder)?;
        if response.status_code < 300 || response.status_code == 308 {
            return Ok(ResumableUploadResponse::from_http_response(response));
        }
        Err(response.as_status())
    }

    fn query_resumable_upload(
        &self,
        request: &QueryResumableUploadRequest,
    ) -> Result<ResumableUploadResponse> {
        let builder = self
            .client
            .put(request.upload_session_url())
            .header("Content-Range", "bytes */*")
            .header("content-type", "application/octet-stream")
            .body(String::new());
        let response = self.send(builder)?;
        if response.status_code < 300 || response.status_code == 308 {
            return Ok(ResumableUploadResponse::from_http_response(response));
        }
        Err(response.as_status())
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("storage_endpoint", &self.storage_endpoint)
            .field("upload_endpoint", &self.upload_endpoint)
            .finish()
    }
}

fn collect_headers(headers: &reqwest::header::HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(k, v)| {
            v.to_str()
                .ok()
                .map(|v| (k.as_str().to_string(), v.to_string()))
        })
        .collect()
}
