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

//! The request types consumed by the upload and read protocols.

use bytes::Bytes;

/// A modifier applied to a request.
///
/// Most options become query parameters on the HTTP request; a few only
/// steer the client (hash computation, session reuse).
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum RequestOption {
    /// Succeed only if the object's generation matches.
    IfGenerationMatch(i64),
    /// Succeed only if the object's generation does not match.
    IfGenerationNotMatch(i64),
    /// Succeed only if the object's metageneration matches.
    IfMetagenerationMatch(i64),
    /// Succeed only if the object's metageneration does not match.
    IfMetagenerationNotMatch(i64),
    /// Restrict the fields returned in the response.
    Fields(String),
    /// Set the projection of the returned resource.
    Projection(String),
    /// Bill the request to the given project.
    UserProject(String),
    /// Apply a predefined ACL to the new object.
    PredefinedAcl(String),
    /// Encrypt the new object with the given Cloud KMS key.
    KmsKeyName(String),
    /// The content type of the new object.
    ContentType(String),
    /// The content encoding of the new object.
    ContentEncoding(String),
    /// Skip MD5 hash computation and validation.
    DisableMD5Hash(bool),
    /// Skip CRC32C checksum computation and validation.
    DisableCrc32cChecksum(bool),
    /// Resume the upload session with the given id.
    ///
    /// An empty id requests a new resumable upload session.
    UseResumableUploadSession(String),
}

impl RequestOption {
    /// The query parameter for this option, if it maps to one.
    pub fn query_parameter(&self) -> Option<(&'static str, String)> {
        match self {
            RequestOption::IfGenerationMatch(v) => Some(("ifGenerationMatch", v.to_string())),
            RequestOption::IfGenerationNotMatch(v) => {
                Some(("ifGenerationNotMatch", v.to_string()))
            }
            RequestOption::IfMetagenerationMatch(v) => {
                Some(("ifMetagenerationMatch", v.to_string()))
            }
            RequestOption::IfMetagenerationNotMatch(v) => {
                Some(("ifMetagenerationNotMatch", v.to_string()))
            }
            RequestOption::Fields(v) => Some(("fields", v.clone())),
            RequestOption::Projection(v) => Some(("projection", v.clone())),
            RequestOption::UserProject(v) => Some(("userProject", v.clone())),
            RequestOption::PredefinedAcl(v) => Some(("predefinedAcl", v.clone())),
            RequestOption::KmsKeyName(v) => Some(("kmsKeyName", v.clone())),
            RequestOption::ContentType(_)
            | RequestOption::ContentEncoding(_)
            | RequestOption::DisableMD5Hash(_)
            | RequestOption::DisableCrc32cChecksum(_)
            | RequestOption::UseResumableUploadSession(_) => None,
        }
    }
}

/// A request to create (or restore) a resumable upload session.
#[derive(Clone, Debug, PartialEq)]
pub struct ResumableUploadRequest {
    bucket_name: String,
    object_name: String,
    options: Vec<RequestOption>,
}

impl ResumableUploadRequest {
    pub fn new<B: Into<String>, O: Into<String>>(bucket_name: B, object_name: O) -> Self {
        Self {
            bucket_name: bucket_name.into(),
            object_name: object_name.into(),
            options: Vec::new(),
        }
    }

    pub fn with_option(mut self, option: RequestOption) -> Self {
        self.options.push(option);
        self
    }

    pub fn bucket_name(&self) -> &str {
        &self.bucket_name
    }

    pub fn object_name(&self) -> &str {
        &self.object_name
    }

    pub fn options(&self) -> &[RequestOption] {
        &self.options
    }

    /// The session id to restore, when the caller requested one.
    pub fn session_id(&self) -> Option<&str> {
        self.options.iter().find_map(|o| match o {
            RequestOption::UseResumableUploadSession(id) if !id.is_empty() => Some(id.as_str()),
            _ => None,
        })
    }

    /// The JSON body for the session-init POST.
    ///
    /// Returns `None` when no metadata needs to travel in the body; the
    /// object name is passed as a query parameter in that case.
    pub fn json_payload(&self) -> Option<String> {
        let mut resource = serde_json::Map::new();
        for option in &self.options {
            match option {
                RequestOption::ContentType(v) => {
                    resource.insert("contentType".to_string(), v.clone().into());
                }
                RequestOption::ContentEncoding(v) => {
                    resource.insert("contentEncoding".to_string(), v.clone().into());
                }
                _ => {}
            }
        }
        if resource.is_empty() {
            return None;
        }
        resource.insert("name".to_string(), self.object_name.clone().into());
        Some(serde_json::Value::Object(resource).to_string())
    }
}

/// A request to upload one chunk of a resumable upload.
#[derive(Clone, Debug, PartialEq)]
pub struct UploadChunkRequest {
    upload_session_url: String,
    range_begin: u64,
    payload: Bytes,
    source_size: Option<u64>,
}

impl UploadChunkRequest {
    /// All chunks, except the last one, must be multiples of this quantum.
    pub const CHUNK_SIZE_QUANTUM: usize = 256 * 1024;

    /// Creates a request for an intermediate chunk.
    pub fn new<U: Into<String>>(upload_session_url: U, range_begin: u64, payload: Bytes) -> Self {
        Self {
            upload_session_url: upload_session_url.into(),
            range_begin,
            payload,
            source_size: None,
        }
    }

    /// Creates a request for the last chunk, committing the upload.
    pub fn last<U: Into<String>>(
        upload_session_url: U,
        range_begin: u64,
        payload: Bytes,
        source_size: u64,
    ) -> Self {
        Self {
            upload_session_url: upload_session_url.into(),
            range_begin,
            payload,
            source_size: Some(source_size),
        }
    }

    pub fn upload_session_url(&self) -> &str {
        &self.upload_session_url
    }

    pub fn range_begin(&self) -> u64 {
        self.range_begin
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn last_chunk(&self) -> bool {
        self.source_size.is_some()
    }

    pub fn source_size(&self) -> Option<u64> {
        self.source_size
    }

    /// The value of the `Content-Range` header for this chunk.
    ///
    /// Intermediate chunks use `*` as the total because the full size is not
    /// known until the caller closes the stream.
    pub fn range_header(&self) -> String {
        let total = match self.source_size {
            None => "*".to_string(),
            Some(size) => size.to_string(),
        };
        if self.payload.is_empty() {
            return format!("bytes */{total}");
        }
        let last = self.range_begin + self.payload.len() as u64 - 1;
        format!("bytes {}-{}/{}", self.range_begin, last, total)
    }
}

/// A request for the commit frontier of a resumable upload session.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryResumableUploadRequest {
    upload_session_url: String,
}

impl QueryResumableUploadRequest {
    pub fn new<U: Into<String>>(upload_session_url: U) -> Self {
        Self {
            upload_session_url: upload_session_url.into(),
        }
    }

    pub fn upload_session_url(&self) -> &str {
        &self.upload_session_url
    }
}

/// A request to read an object, or a range of it.
#[derive(Clone, Debug, PartialEq)]
pub struct ReadObjectRangeRequest {
    bucket_name: String,
    object_name: String,
    begin: u64,
    end: u64,
    options: Vec<RequestOption>,
}

impl ReadObjectRangeRequest {
    /// Creates a request for the full object.
    pub fn new<B: Into<String>, O: Into<String>>(bucket_name: B, object_name: O) -> Self {
        Self {
            bucket_name: bucket_name.into(),
            object_name: object_name.into(),
            begin: 0,
            end: 0,
            options: Vec::new(),
        }
    }

    /// Restricts the read to the `[begin, end)` byte range.
    pub fn with_range(mut self, begin: u64, end: u64) -> Self {
        self.begin = begin;
        self.end = end;
        self
    }

    pub fn with_option(mut self, option: RequestOption) -> Self {
        self.options.push(option);
        self
    }

    pub fn bucket_name(&self) -> &str {
        &self.bucket_name
    }

    pub fn object_name(&self) -> &str {
        &self.object_name
    }

    pub fn options(&self) -> &[RequestOption] {
        &self.options
    }

    /// The value of the `Range` header, when the request is not a full read.
    pub fn range_header(&self) -> Option<String> {
        if self.begin == 0 && self.end == 0 {
            return None;
        }
        Some(format!("bytes={}-{}", self.begin, self.end - 1))
    }
}
