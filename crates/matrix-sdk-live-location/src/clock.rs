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

use std::time::Duration;

use ruma::{MilliSecondsSinceUnixEpoch, UInt};
use tokio::time::Instant;

/// The time source shared by the write path and the read path of live
/// location sharing.
///
/// The wall clock is read once, when the clock is created, and every later
/// reading is derived from the monotonic time elapsed since then. Changes to
/// the system time thus never move a deadline back and forth between the
/// moment a share is started and the moment it is checked.
#[derive(Clone, Copy, Debug)]
pub struct Clock {
    anchor_ts: u64,
    anchor: Instant,
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock {
    /// Create a new clock anchored to the current system time.
    pub fn new() -> Self {
        Self::starting_at(MilliSecondsSinceUnixEpoch::now())
    }

    /// Create a new clock whose current time is `ts`.
    pub fn starting_at(ts: MilliSecondsSinceUnixEpoch) -> Self {
        Self { anchor_ts: ts.get().into(), anchor: Instant::now() }
    }

    /// The current time.
    pub fn now(&self) -> MilliSecondsSinceUnixEpoch {
        let elapsed = u64::try_from(self.anchor.elapsed().as_millis()).unwrap_or(u64::MAX);
        to_timestamp(self.anchor_ts.saturating_add(elapsed))
    }

    /// The monotonic instant at which this clock will read `ts`.
    ///
    /// Timestamps in the past map to the anchor instant or later, so sleeping
    /// until the returned instant never waits for them.
    pub fn instant_at(&self, ts: MilliSecondsSinceUnixEpoch) -> Instant {
        let ts: u64 = ts.get().into();
        let offset = Duration::from_millis(ts.saturating_sub(self.anchor_ts));

        self.anchor.checked_add(offset).unwrap_or_else(far_future)
    }
}

/// Turn a number of milliseconds since the unix epoch into a timestamp,
/// saturating at the biggest representable value.
pub(crate) fn to_timestamp(millis: u64) -> MilliSecondsSinceUnixEpoch {
    MilliSecondsSinceUnixEpoch(UInt::new_saturating(millis))
}

// Roughly 30 years, same as tokio's own "far future".
fn far_future() -> Instant {
    Instant::now() + Duration::from_secs(86400 * 365 * 30)
}
