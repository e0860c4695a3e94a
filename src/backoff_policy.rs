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

//! Defines the trait for backoff policies and the truncated exponential
//! implementation.
//!
//! Retry loops should avoid immediately retrying a request, as the service
//! may need time to recover. [Exponential backoff] is a well known algorithm
//! to find an acceptable delay between attempts.
//!
//! [Exponential backoff]: https://en.wikipedia.org/wiki/Exponential_backoff

use crate::{Error, Result};
use std::time::Duration;

/// Defines the trait implemented by all backoff strategies.
pub trait BackoffPolicy: Send + std::fmt::Debug {
    /// Returns the delay to wait before the next attempt.
    ///
    /// Called after each failed attempt; successive calls produce the delay
    /// schedule of one retry loop.
    fn on_completion(&mut self) -> Duration;

    /// Returns a copy of this policy with a fresh delay schedule.
    fn clone_policy(&self) -> Box<dyn BackoffPolicy>;
}

/// Implements truncated exponential backoff with full jitter.
///
/// The delay doubles (more generally, grows by the scaling factor) after
/// each attempt until it reaches the maximum delay. The actual sleep time is
/// drawn uniformly from `[0, delay]` so concurrent sessions do not
/// synchronize their retries.
#[derive(Clone, Debug)]
pub struct ExponentialBackoffPolicy {
    initial_delay: Duration,
    maximum_delay: Duration,
    scaling: f64,
    current_delay: Duration,
}

impl ExponentialBackoffPolicy {
    /// Creates a new policy.
    ///
    /// # Example
    /// ```
    /// # use gcs_client::backoff_policy::ExponentialBackoffPolicy;
    /// use std::time::Duration;
    /// let policy = ExponentialBackoffPolicy::new(
    ///     Duration::from_millis(10), Duration::from_millis(160), 2.0)?;
    /// # Ok::<(), gcs_client::Error>(())
    /// ```
    pub fn new(initial_delay: Duration, maximum_delay: Duration, scaling: f64) -> Result<Self> {
        if scaling < 1.0 {
            return Err(Error::invalid_argument(format!(
                "the scaling value ({scaling}) should be >= 1.0"
            )));
        }
        if initial_delay.is_zero() {
            return Err(Error::invalid_argument(format!(
                "the initial delay ({initial_delay:?}) should be greater than zero"
            )));
        }
        if maximum_delay < initial_delay {
            return Err(Error::invalid_argument(format!(
                "the maximum delay ({maximum_delay:?}) should be greater than or equal to the initial delay ({initial_delay:?})"
            )));
        }
        Ok(Self {
            initial_delay,
            maximum_delay,
            scaling,
            current_delay: initial_delay,
        })
    }

    /// Returns the full (pre-jitter) delay and advances the schedule.
    fn next_delay(&mut self) -> Duration {
        let delay = self.current_delay;
        let grown = delay.mul_f64(self.scaling);
        self.current_delay = std::cmp::min(grown, self.maximum_delay);
        delay
    }

    fn delay_with_jitter(&mut self, rng: &mut impl rand::Rng) -> Duration {
        let delay = self.next_delay();
        rng.random_range(Duration::ZERO..=delay)
    }
}

impl BackoffPolicy for ExponentialBackoffPolicy {
    fn on_completion(&mut self) -> Duration {
        self.delay_with_jitter(&mut rand::rng())
    }

    fn clone_policy(&self) -> Box<dyn BackoffPolicy> {
        Box::new(Self {
            current_delay: self.initial_delay,
            ..self.clone()
        })
    }
}

impl Default for ExponentialBackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(10),
            maximum_delay: Duration::from_secs(300),
            scaling: 2.0,
            current_delay: Duration::from_millis(10),
        }
    }
}
