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

//! Define types to compute and compare object content hashes.
//!
//! The service reports the CRC32C checksum and the MD5 hash of each object.
//! The streambuf adapters feed every transferred byte through a
//! [HashValidator] and compare the computed digests against the
//! server-reported values when the transfer finalizes.

use crate::model::ObjectMetadata;
use crate::request::RequestOption;
use base64::Engine as _;
use base64::prelude::BASE64_STANDARD;

/// The result of a hash validation.
///
/// Both strings empty means no hashes were computed (validation disabled).
/// Mismatched non-empty digests entitle the adapter to fail the transfer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HashResult {
    /// The digest reported by the service.
    pub received: String,
    /// The digest computed from the transferred bytes.
    pub computed: String,
}

impl HashResult {
    /// Returns true if the received and computed digests disagree.
    ///
    /// Digests with the `crc32c=`/`md5=` labels are compared label-wise, so
    /// a service response that omits one of the hashes (common with composed
    /// objects) does not count as a mismatch.
    pub fn is_mismatch(&self) -> bool {
        if self.received.is_empty() || self.computed.is_empty() {
            return false;
        }
        match (labeled_parts(&self.received), labeled_parts(&self.computed)) {
            (Some(received), Some(computed)) => received
                .iter()
                .any(|(k, v)| computed.iter().any(|(ck, cv)| ck == k && cv != v)),
            _ => self.received != self.computed,
        }
    }
}

fn labeled_parts(value: &str) -> Option<Vec<(&'static str, &str)>> {
    let mut parts = Vec::new();
    for part in value.split(',') {
        if let Some(v) = part.strip_prefix("crc32c=") {
            parts.push(("crc32c", v));
        } else if let Some(v) = part.strip_prefix("md5=") {
            parts.push(("md5", v));
        } else {
            return None;
        }
    }
    Some(parts)
}

/// An incremental content hasher with a pluggable algorithm.
#[derive(Clone)]
pub enum HashValidator {
    /// Computes no hashes; `finish()` returns empty digests.
    Null,
    /// Computes only the MD5 hash.
    Md5(md5::Context),
    /// Computes only the CRC32C checksum.
    Crc32c(u32),
    /// Computes both digests.
    Composite { md5: md5::Context, crc32c: u32 },
}

impl HashValidator {
    pub fn new_md5() -> Self {
        HashValidator::Md5(md5::Context::new())
    }

    pub fn new_crc32c() -> Self {
        HashValidator::Crc32c(0)
    }

    pub fn new_composite() -> Self {
        HashValidator::Composite {
            md5: md5::Context::new(),
            crc32c: 0,
        }
    }

    /// Feeds `data` into the running digests.
    ///
    /// The computation is incremental: splitting the input at arbitrary chunk
    /// boundaries produces the same digest as a single update.
    pub fn update(&mut self, data: &[u8]) {
        match self {
            HashValidator::Null => {}
            HashValidator::Md5(context) => context.consume(data),
            HashValidator::Crc32c(state) => *state = crc32c::crc32c_append(*state, data),
            HashValidator::Composite { md5, crc32c } => {
                md5.consume(data);
                *crc32c = crc32c::crc32c_append(*crc32c, data);
            }
        }
    }

    /// Freezes the computed digest and pairs it with the server-reported one.
    pub fn finish<S: Into<String>>(self, received: S) -> HashResult {
        let computed = match self {
            HashValidator::Null => String::new(),
            HashValidator::Md5(context) => encode_md5(context),
            HashValidator::Crc32c(state) => encode_crc32c(state),
            HashValidator::Composite { md5, crc32c } => {
                format!("crc32c={},md5={}", encode_crc32c(crc32c), encode_md5(md5))
            }
        };
        HashResult {
            received: received.into(),
            computed,
        }
    }

    /// Extracts the digest this validator compares against from an
    /// `x-goog-hash` header value (`crc32c=...,md5=...`).
    pub fn received_from_header(&self, header_value: &str) -> String {
        let (crc32c, md5) = split_hash_header(header_value);
        self.received_from_parts(crc32c, md5)
    }

    /// Extracts the digest this validator compares against from the object
    /// metadata returned when an upload finalizes.
    pub fn received_from_metadata(&self, metadata: &ObjectMetadata) -> String {
        let crc32c = Some(metadata.crc32c.as_str()).filter(|v| !v.is_empty());
        let md5 = Some(metadata.md5_hash.as_str()).filter(|v| !v.is_empty());
        self.received_from_parts(crc32c, md5)
    }

    fn received_from_parts(&self, crc32c: Option<&str>, md5: Option<&str>) -> String {
        match self {
            HashValidator::Null => String::new(),
            HashValidator::Md5(_) => md5.unwrap_or_default().to_string(),
            HashValidator::Crc32c(_) => crc32c.unwrap_or_default().to_string(),
            HashValidator::Composite { .. } => match (crc32c, md5) {
                (None, None) => String::new(),
                (Some(c), None) => format!("crc32c={c}"),
                (None, Some(m)) => format!("md5={m}"),
                (Some(c), Some(m)) => format!("crc32c={c},md5={m}"),
            },
        }
    }
}

impl std::fmt::Debug for HashValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // md5::Context has no Debug implementation, so the digest state is
        // skipped.
        match self {
            HashValidator::Null => write!(f, "Null"),
            HashValidator::Md5(_) => write!(f, "Md5"),
            HashValidator::Crc32c(state) => write!(f, "Crc32c({state:#010x})"),
            HashValidator::Composite { crc32c, .. } => {
                write!(f, "Composite(crc32c: {crc32c:#010x})")
            }
        }
    }
}

fn encode_md5(context: md5::Context) -> String {
    BASE64_STANDARD.encode(context.finalize().0)
}

fn encode_crc32c(state: u32) -> String {
    BASE64_STANDARD.encode(state.to_be_bytes())
}

fn split_hash_header(value: &str) -> (Option<&str>, Option<&str>) {
    let mut crc32c = None;
    let mut md5 = None;
    for part in value.split(',') {
        let part = part.trim();
        if let Some(v) = part.strip_prefix("crc32c=") {
            crc32c = Some(v);
        } else if let Some(v) = part.strip_prefix("md5=") {
            md5 = Some(v);
        }
    }
    (crc32c, md5)
}

/// Creates the validator implied by the request options.
///
/// Both hashes are computed unless the options disable one (or both) of
/// them.
pub fn create_hash_validator(options: &[RequestOption]) -> HashValidator {
    let disable_md5 = options
        .iter()
        .any(|o| matches!(o, RequestOption::DisableMD5Hash(true)));
    let disable_crc32c = options
        .iter()
        .any(|o| matches!(o, RequestOption::DisableCrc32cChecksum(true)));
    match (disable_crc32c, disable_md5) {
        (true, true) => HashValidator::Null,
        (true, false) => HashValidator::new_md5(),
        (false, true) => HashValidator::new_crc32c(),
        (false, false) => HashValidator::new_composite(),
    }
}
