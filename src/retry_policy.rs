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

//! Defines the trait for retry policies and the common implementations.
//!
//! The retry layers only mask transient errors: HTTP 408, 429, 5xx, and
//! transport I/O failures. Permanent errors always stop the loop. A policy
//! additionally bounds the loop by an attempt budget or a wall-clock
//! deadline.

use crate::Error;
use std::cell::Cell;
use std::time::{Duration, Instant};

/// Defines the trait implemented by all retry strategies.
pub trait RetryPolicy: Send + std::fmt::Debug {
    /// Records a failure and decides whether the loop may continue.
    ///
    /// Returns false when the error is permanent or when the budget is
    /// exceeded; use [is_exhausted][RetryPolicy::is_exhausted] to tell the
    /// two conditions apart.
    fn on_failure(&self, error: &Error) -> bool;

    /// Returns true once the budget is spent.
    fn is_exhausted(&self) -> bool;

    /// Returns a copy of this policy with a fresh budget.
    fn clone_policy(&self) -> Box<dyn RetryPolicy>;
}

/// A retry policy limited by the number of transient failures.
#[derive(Debug)]
pub struct LimitedErrorCountRetryPolicy {
    maximum_failures: u32,
    failure_count: Cell<u32>,
}

impl LimitedErrorCountRetryPolicy {
    /// Creates a policy that tolerates `maximum_failures` transient errors.
    pub fn new(maximum_failures: u32) -> Self {
        Self {
            maximum_failures,
            failure_count: Cell::new(0),
        }
    }
}

impl RetryPolicy for LimitedErrorCountRetryPolicy {
    fn on_failure(&self, error: &Error) -> bool {
        if !error.is_transient() {
            return false;
        }
        self.failure_count.set(self.failure_count.get() + 1);
        !self.is_exhausted()
    }

    fn is_exhausted(&self) -> bool {
        self.failure_count.get() > self.maximum_failures
    }

    fn clone_policy(&self) -> Box<dyn RetryPolicy> {
        Box::new(Self::new(self.maximum_failures))
    }
}

/// A retry policy limited by the elapsed wall-clock time.
#[derive(Debug)]
pub struct LimitedTimeRetryPolicy {
    maximum_duration: Duration,
    deadline: Instant,
}

impl LimitedTimeRetryPolicy {
    /// Creates a policy that stops retrying `maximum_duration` after its
    /// creation.
    pub fn new(maximum_duration: Duration) -> Self {
        Self {
            maximum_duration,
            deadline: Instant::now() + maximum_duration,
        }
    }
}

impl RetryPolicy for LimitedTimeRetryPolicy {
    fn on_failure(&self, error: &Error) -> bool {
        error.is_transient() && !self.is_exhausted()
    }

    fn is_exhausted(&self) -> bool {
        Instant::now() >= self.deadline
    }

    fn clone_policy(&self) -> Box<dyn RetryPolicy> {
        Box::new(Self::new(self.maximum_duration))
    }
}
