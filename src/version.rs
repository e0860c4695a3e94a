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

//! Build information and the `x-goog-api-client` header value.

use std::sync::LazyLock;

/// Build metadata injected at compile time for non-release builds.
pub(crate) fn build_metadata() -> &'static str {
    option_env!("GCS_CLIENT_BUILD_METADATA").unwrap_or("")
}

/// True if this is a release build, false for development branches.
pub(crate) fn is_release() -> bool {
    build_metadata().is_empty()
}

/// The client library version, e.g. `v0.3.0` or `v0.3.0+20250802`.
pub fn version_string() -> &'static str {
    static VERSION: LazyLock<String> = LazyLock::new(|| {
        let mut v = format!("v{}", env!("CARGO_PKG_VERSION"));
        if !is_release() {
            v.push('+');
            v.push_str(build_metadata());
        }
        v
    });
    VERSION.as_str()
}

/// The value of the `x-goog-api-client` header sent with every request.
pub fn x_goog_api_client() -> &'static str {
    static HEADER: LazyLock<String> = LazyLock::new(|| {
        format!(
            "gl-rust/{} gccl/{}",
            env!("CARGO_PKG_RUST_VERSION"),
            version_string()
        )
    });
    HEADER.as_str()
}
