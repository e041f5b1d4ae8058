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

//! Types for location beacons, the pings sent while a live location share is
//! running, and for one-off static locations.

use ruma::{MilliSecondsSinceUnixEpoch, OwnedEventId, OwnedUserId};
use serde::{Deserialize, Serialize};

use crate::{error::InvalidRecord, store::BeaconEvent};

/// The content of a location beacon.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeaconEventContent {
    /// The `live-beacon-info` state event this beacon belongs to.
    pub beacon_info_event_id: OwnedEventId,

    /// The latitude, in degrees.
    pub latitude: f64,

    /// The longitude, in degrees.
    pub longitude: f64,

    /// The accuracy of the location, in meters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uncertainty: Option<f64>,

    /// When the location was emitted.
    #[serde(rename = "timestamp")]
    pub ts: MilliSecondsSinceUnixEpoch,
}

/// The content of a one-off location message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticLocationEventContent {
    /// The latitude, in degrees.
    pub latitude: f64,

    /// The longitude, in degrees.
    pub longitude: f64,

    /// The accuracy of the location, in meters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uncertainty: Option<f64>,

    /// Whether this is the location of the sender, or of a place they pinned.
    pub is_user_location: bool,

    /// When the location was sent.
    #[serde(rename = "timestamp")]
    pub ts: MilliSecondsSinceUnixEpoch,
}

/// The last known location of a running live location share.
#[derive(Clone, Debug, PartialEq)]
pub struct LastLocation {
    /// The ID of the beacon event.
    pub event_id: OwnedEventId,
    /// Who sent the beacon.
    pub sender: OwnedUserId,
    /// The content of the beacon.
    pub content: BeaconEventContent,
}

impl LastLocation {
    pub(crate) fn try_from_beacon_event(event: &BeaconEvent) -> Result<Self, InvalidRecord> {
        let content: BeaconEventContent = serde_json::from_value(event.content.clone())?;
        Ok(Self { event_id: event.event_id.clone(), sender: event.sender.clone(), content })
    }

    /// When the location was emitted.
    pub fn ts(&self) -> MilliSecondsSinceUnixEpoch {
        self.content.ts
    }
}

#[cfg(test)]
mod tests {
    use ruma::{MilliSecondsSinceUnixEpoch, event_id, owned_event_id, uint, user_id};
    use serde_json::json;
    use similar_asserts::assert_eq;

    use super::{BeaconEventContent, LastLocation};
    use crate::store::BeaconEvent;

    #[test]
    fn test_beacon_layout() {
        let content = BeaconEventContent {
            beacon_info_event_id: owned_event_id!("$beacon_info"),
            latitude: 48.8588448,
            longitude: 2.2943506,
            uncertainty: None,
            ts: MilliSecondsSinceUnixEpoch(uint!(1_636_829_458)),
        };

        assert_eq!(
            serde_json::to_value(&content).unwrap(),
            json!({
                "beaconInfoEventId": "$beacon_info",
                "latitude": 48.8588448,
                "longitude": 2.2943506,
                "timestamp": 1_636_829_458,
            })
        );
    }

    #[test]
    fn test_beacon_event_validation() {
        let mut event = BeaconEvent {
            event_id: event_id!("$location").to_owned(),
            sender: user_id!("@alice:localhost").to_owned(),
            content: json!({
                "beaconInfoEventId": "$beacon_info",
                "latitude": 10.0,
                "longitude": 20.0,
                "uncertainty": 5.0,
                "timestamp": 1_000,
            }),
        };

        let location = LastLocation::try_from_beacon_event(&event).unwrap();
        assert_eq!(location.content.uncertainty, Some(5.0));
        assert_eq!(location.ts(), MilliSecondsSinceUnixEpoch(uint!(1_000)));

        event.content = json!({ "beaconInfoEventId": "$beacon_info", "latitude": 10.0 });
        assert!(LastLocation::try_from_beacon_event(&event).is_err());
    }
}
