// Copyright 2024 The Matrix.org Foundation C.I.C.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Configuration for live location sharing.

use std::time::Duration;

/// The default number of attempts made to publish a state event.
pub const DEFAULT_RETRY_LIMIT: u32 = 3;

/// The default delay before the first retry of a failed publish.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(500);

/// Configuration for the state events [`LiveShareController`] publishes.
///
/// This sets how often a failed publish is attempted again and how long to
/// wait between attempts. Only transient store errors are retried.
///
/// By default a publish is attempted 3 times.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use matrix_sdk_live_location::LocationSharingConfig;
///
/// // Try 5 times, starting with a 100ms pause between attempts.
/// let config = LocationSharingConfig::new()
///     .retry_limit(5)
///     .retry_interval(Duration::from_millis(100));
/// ```
///
/// [`LiveShareController`]: crate::LiveShareController
#[derive(Copy, Clone, Debug)]
pub struct LocationSharingConfig {
    pub(crate) retry_limit: u32,
    pub(crate) retry_interval: Duration,
}

impl Default for LocationSharingConfig {
    fn default() -> Self {
        Self { retry_limit: DEFAULT_RETRY_LIMIT, retry_interval: DEFAULT_RETRY_INTERVAL }
    }
}

impl LocationSharingConfig {
    /// Create a new default `LocationSharingConfig`.
    #[must_use]
    pub fn new() -> Self {
        Default::default()
    }

    /// Make a single publish attempt, without any retry.
    #[must_use]
    pub fn disable_retry(mut self) -> Self {
        self.retry_limit = 1;
        self
    }

    /// The total number of times a publish is attempted. A limit of `0` is
    /// treated like `1`.
    #[must_use]
    pub fn retry_limit(mut self, retry_limit: u32) -> Self {
        self.retry_limit = retry_limit.max(1);
        self
    }

    /// The initial delay between two attempts, it grows exponentially with
    /// every further attempt.
    #[must_use]
    pub fn retry_interval(mut self, retry_interval: Duration) -> Self {
        self.retry_interval = retry_interval;
        self
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::LocationSharingConfig;

    #[test]
    fn smoketest() {
        let cfg = LocationSharingConfig::new().retry_limit(4).retry_interval(Duration::from_secs(2));

        assert_eq!(cfg.retry_limit, 4);
        assert_eq!(cfg.retry_interval, Duration::from_secs(2));
    }

    #[test]
    fn testing_retry_settings() {
        let mut cfg = LocationSharingConfig::new();
        assert_eq!(cfg.retry_limit, 3);
        cfg = cfg.retry_limit(10);
        assert_eq!(cfg.retry_limit, 10);
        cfg = cfg.disable_retry();
        assert_eq!(cfg.retry_limit, 1);
        cfg = cfg.retry_limit(0);
        assert_eq!(cfg.retry_limit, 1);
    }
}
