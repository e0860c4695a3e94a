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

//! The error and result types used at every boundary of this crate.

/// The kind of an [Error].
///
/// The kinds follow the canonical status codes used by Google Cloud services.
/// Only the codes the upload and read protocols can produce are represented.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The caller provided malformed input, e.g. bad credentials or a chunk
    /// that is not a multiple of the upload quantum.
    InvalidArgument,
    /// The named resource does not exist.
    NotFound,
    /// A generation or metageneration precondition did not hold.
    FailedPrecondition,
    /// The service is temporarily unavailable.
    Unavailable,
    /// The operation did not complete within the allotted time.
    DeadlineExceeded,
    /// The caller exceeded a quota or rate limit.
    ResourceExhausted,
    /// The caller lacks permission on the resource.
    PermissionDenied,
    /// The request carried missing or invalid authentication.
    Unauthenticated,
    /// Anything else, including failures in the TLS and crypto libraries.
    Unknown,
}

impl ErrorKind {
    /// Returns true if the retry policies are permitted to mask this kind.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ErrorKind::Unavailable | ErrorKind::DeadlineExceeded | ErrorKind::ResourceExhausted
        )
    }

    /// Classify an HTTP status code.
    ///
    /// The storage service recommends retrying 408, 429, and all 5xx status
    /// codes; those map to the transient kinds. Everything else in the 4xx
    /// range is permanent.
    pub fn from_http_status(status_code: u16) -> Self {
        match status_code {
            401 => ErrorKind::Unauthenticated,
            403 => ErrorKind::PermissionDenied,
            404 => ErrorKind::NotFound,
            408 => ErrorKind::DeadlineExceeded,
            412 => ErrorKind::FailedPrecondition,
            429 => ErrorKind::ResourceExhausted,
            400..=499 => ErrorKind::InvalidArgument,
            500..=599 => ErrorKind::Unavailable,
            _ => ErrorKind::Unknown,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::InvalidArgument => "INVALID_ARGUMENT",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::FailedPrecondition => "FAILED_PRECONDITION",
            ErrorKind::Unavailable => "UNAVAILABLE",
            ErrorKind::DeadlineExceeded => "DEADLINE_EXCEEDED",
            ErrorKind::ResourceExhausted => "RESOURCE_EXHAUSTED",
            ErrorKind::PermissionDenied => "PERMISSION_DENIED",
            ErrorKind::Unauthenticated => "UNAUTHENTICATED",
            ErrorKind::Unknown => "UNKNOWN",
        };
        write!(f, "{name}")
    }
}

/// The error type returned by all operations in this crate.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct Error {
    kind: ErrorKind,
    message: String,
}

impl Error {
    /// Creates a new [Error] from a kind and a message.
    pub fn new<S: Into<String>>(kind: ErrorKind, message: S) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_argument<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    pub fn not_found<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn failed_precondition<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::FailedPrecondition, message)
    }

    pub fn unavailable<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::Unavailable, message)
    }

    pub fn deadline_exceeded<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::DeadlineExceeded, message)
    }

    pub fn resource_exhausted<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::ResourceExhausted, message)
    }

    pub fn permission_denied<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::PermissionDenied, message)
    }

    pub fn unauthenticated<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::Unauthenticated, message)
    }

    pub fn unknown<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::Unknown, message)
    }

    /// Returns the [ErrorKind] associated with this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the diagnostic message associated with this error.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns true if the retry policies are permitted to mask this error.
    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }
}

/// The result type returned by all operations in this crate.
pub type Result<T> = std::result::Result<T, Error>;
