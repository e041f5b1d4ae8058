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

//! Types for the `live-beacon-info` state event, which announces a live
//! location share.

use std::time::Duration;

use ruma::{MilliSecondsSinceUnixEpoch, OwnedEventId, OwnedRoomId, OwnedUserId, RoomId, UserId};
use serde::{Deserialize, Serialize};

use crate::{clock::to_timestamp, error::InvalidRecord, store::StateEvent};

/// The state event type of a live location share announcement. The state key
/// is the ID of the sharing user.
pub const BEACON_INFO_EVENT_TYPE: &str = "live-beacon-info";

/// The content of a `live-beacon-info` state event.
///
/// Serialized as `{"timeout": <ms>, "isLive": <bool>, "startTimestamp": <ms>}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeaconInfoEventContent {
    /// For how long the share is valid after it started.
    #[serde(with = "timeout_ms")]
    pub timeout: Duration,

    /// Whether the share is still live, `false` once it was explicitly
    /// stopped.
    #[serde(rename = "isLive")]
    pub live: bool,

    /// When the share started.
    #[serde(rename = "startTimestamp")]
    pub start_ts: MilliSecondsSinceUnixEpoch,
}

impl BeaconInfoEventContent {
    /// Create the content announcing a new live share started at `start_ts`.
    pub fn new(timeout: Duration, start_ts: MilliSecondsSinceUnixEpoch) -> Self {
        Self { timeout, live: true, start_ts }
    }

    /// The same announcement, marked as stopped.
    ///
    /// The start timestamp and the timeout are carried over untouched.
    #[must_use]
    pub fn stopped(&self) -> Self {
        Self { live: false, ..self.clone() }
    }

    /// The instant after which the share isn't active anymore, even if it was
    /// never stopped.
    pub fn deadline(&self) -> MilliSecondsSinceUnixEpoch {
        let start: u64 = self.start_ts.get().into();
        let timeout = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);

        to_timestamp(start.saturating_add(timeout))
    }

    /// Whether the share is active at `now`: it is live and its deadline is
    /// still ahead.
    pub fn is_active_at(&self, now: MilliSecondsSinceUnixEpoch) -> bool {
        self.live && now < self.deadline()
    }
}

/// A validated live location share announcement, with its identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BeaconInfo {
    /// The room the share happens in.
    pub room_id: OwnedRoomId,
    /// The user sharing their location, the state key of the event.
    pub user_id: OwnedUserId,
    /// The ID of the state event. Location beacons reference it.
    pub event_id: OwnedEventId,
    /// The content of the state event.
    pub content: BeaconInfoEventContent,
}

impl BeaconInfo {
    /// Validate a stored `live-beacon-info` state event.
    pub(crate) fn try_from_state_event(
        room_id: &RoomId,
        event: &StateEvent,
    ) -> Result<Self, InvalidRecord> {
        let user_id = UserId::parse(event.state_key.as_str())?;
        let content: BeaconInfoEventContent = serde_json::from_value(event.content.clone())?;

        if content.timeout.is_zero() {
            return Err(InvalidRecord::ZeroTimeout);
        }

        Ok(Self { room_id: room_id.to_owned(), user_id, event_id: event.event_id.clone(), content })
    }

    /// See [`BeaconInfoEventContent::deadline`].
    pub fn deadline(&self) -> MilliSecondsSinceUnixEpoch {
        self.content.deadline()
    }

    /// See [`BeaconInfoEventContent::is_active_at`].
    pub fn is_active_at(&self, now: MilliSecondsSinceUnixEpoch) -> bool {
        self.content.is_active_at(now)
    }
}

mod timeout_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(
        timeout: &Duration,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
