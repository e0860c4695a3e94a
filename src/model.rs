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

//! The slice of the object resource model the upload and read protocols
//! return.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Object metadata as returned by the JSON API.
///
/// The API encodes 64-bit integral fields (`generation`, `size`, ...) as
/// JSON strings; they are kept as strings here, the upload protocol only
/// forwards them.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ObjectMetadata {
    pub id: String,
    pub kind: String,
    pub name: String,
    pub bucket: String,
    pub generation: String,
    pub metageneration: String,
    pub content_type: String,
    pub size: String,
    pub etag: String,
    pub md5_hash: String,
    pub crc32c: String,
    pub storage_class: String,
    pub time_created: String,
    pub updated: String,
}

impl ObjectMetadata {
    /// Parses the payload returned when an upload finalizes.
    pub fn from_payload(payload: &[u8]) -> Result<Self> {
        serde_json::from_slice(payload).map_err(|e| {
            Error::invalid_argument(format!("cannot parse object metadata from payload: {e}"))
        })
    }
}
