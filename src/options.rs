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

//! Client configuration.

use crate::backoff_policy::{BackoffPolicy, ExponentialBackoffPolicy};
use crate::credentials::GOOGLE_OAUTH_REFRESH_ENDPOINT;
use crate::retry_policy::{LimitedTimeRetryPolicy, RetryPolicy};
use std::time::Duration;

const DEFAULT_ENDPOINT: &str = "https://storage.googleapis.com";
const DEFAULT_VERSION: &str = "v1";

const DEFAULT_MAXIMUM_RETRY_PERIOD: Duration = Duration::from_secs(15 * 60);
const DEFAULT_INITIAL_BACKOFF_DELAY: Duration = Duration::from_millis(10);
const DEFAULT_MAXIMUM_BACKOFF_DELAY: Duration = Duration::from_secs(5 * 60);
const DEFAULT_BACKOFF_SCALING: f64 = 2.0;

/// Configuration for [HttpClient][crate::http_client::HttpClient].
#[derive(Clone, Debug)]
pub struct ClientOptions {
    endpoint: String,
    version: String,
    user_agent_prefix: String,
    default_token_uri: String,
    upload_buffer_size: usize,
}

impl ClientOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Changes the service endpoint, e.g. to talk to a testbench.
    pub fn with_endpoint<S: Into<String>>(mut self, endpoint: S) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Prepends `prefix` to the user-agent sent with every request.
    pub fn with_user_agent_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.user_agent_prefix = prefix.into();
        self
    }

    pub fn with_default_token_uri<S: Into<String>>(mut self, token_uri: S) -> Self {
        self.default_token_uri = token_uri.into();
        self
    }

    /// Changes the buffer size used by write streams.
    ///
    /// The value is validated when the stream is created: it must be a
    /// positive multiple of the chunk quantum.
    pub fn with_upload_buffer_size(mut self, size: usize) -> Self {
        self.upload_buffer_size = size;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn user_agent_prefix(&self) -> &str {
        &self.user_agent_prefix
    }

    pub fn default_token_uri(&self) -> &str {
        &self.default_token_uri
    }

    pub fn upload_buffer_size(&self) -> usize {
        self.upload_buffer_size
    }

    /// The retry policy used when the caller does not provide one.
    pub fn default_retry_policy(&self) -> Box<dyn RetryPolicy> {
        Box::new(LimitedTimeRetryPolicy::new(DEFAULT_MAXIMUM_RETRY_PERIOD))
    }

    /// The backoff policy used when the caller does not provide one.
    pub fn default_backoff_policy(&self) -> Box<dyn BackoffPolicy> {
        let policy = ExponentialBackoffPolicy::new(
            DEFAULT_INITIAL_BACKOFF_DELAY,
            DEFAULT_MAXIMUM_BACKOFF_DELAY,
            DEFAULT_BACKOFF_SCALING,
        )
        .expect("the default backoff parameters are valid");
        Box::new(policy)
    }
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            version: DEFAULT_VERSION.to_string(),
            user_agent_prefix: String::new(),
            default_token_uri: GOOGLE_OAUTH_REFRESH_ENDPOINT.to_string(),
            upload_buffer_size: 8 * 1024 * 1024,
        }
    }
}
