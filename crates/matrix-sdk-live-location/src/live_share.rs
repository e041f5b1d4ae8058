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

//! The lifecycle of the current user's live location share in a room.
//!
//! ```text
//! [no announcement] --start--> Active(deadline)
//! Active(deadline)  --stop---> Stopped
//! Active(deadline)  --now >= deadline--> Expired
//! Stopped / Expired --start--> Active(new deadline)
//! ```
//!
//! `Expired` is never written anywhere, it is derived from the announcement
//! and the current time, see [`BeaconInfoEventContent::is_active_at`].

use std::{sync::Arc, time::Duration};

use ruma::{OwnedEventId, OwnedRoomId, OwnedUserId, RoomId, UserId};
use tracing::{debug, instrument};

use crate::{
    BEACON_INFO_EVENT_TYPE, BeaconEventContent, BeaconInfo, BeaconInfoEventContent, Clock, Error,
    LocationPingSink, LocationSharingConfig, Result, StateEventStore, store::publish_state_event,
};

/// Starts, feeds and stops the live location share of one user in one room.
///
/// A user has at most one announcement per room: starting a share replaces
/// the previous announcement, whatever its state.
///
/// Concurrent calls for the same room and user are not ordered by the
/// controller, the last write reaching the store wins. Callers that need a
/// `stop` to land after a `start` must wait for the `start` to finish.
#[derive(Clone, Debug)]
pub struct LiveShareController {
    room_id: OwnedRoomId,
    own_user_id: OwnedUserId,
    store: Arc<dyn StateEventStore>,
    sink: Arc<dyn LocationPingSink>,
    clock: Clock,
    config: LocationSharingConfig,
}

impl LiveShareController {
    /// Create a new controller for the share of `own_user_id` in `room_id`.
    pub fn new(
        room_id: OwnedRoomId,
        own_user_id: OwnedUserId,
        store: Arc<dyn StateEventStore>,
        sink: Arc<dyn LocationPingSink>,
        clock: Clock,
        config: LocationSharingConfig,
    ) -> Self {
        Self { room_id, own_user_id, store, sink, clock, config }
    }

    /// The room of the share.
    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    /// The user sharing their location.
    pub fn own_user_id(&self) -> &UserId {
        &self.own_user_id
    }

    /// Start a new live location share, valid for `timeout_millis`
    /// milliseconds from now.
    ///
    /// Any previous announcement of the user in the room is superseded.
    ///
    /// Returns the ID of the announcement, which the location beacons of this
    /// share must reference, see [`LiveShareController::send_location`].
    ///
    /// # Errors
    ///
    /// [`Error::InvalidTimeout`] if `timeout_millis` is zero, nothing is
    /// written in that case. [`Error::PublishFailed`] if the announcement
    /// couldn't be published.
    #[instrument(skip(self), fields(room_id = %self.room_id, user_id = %self.own_user_id))]
    pub async fn start(&self, timeout_millis: u64) -> Result<OwnedEventId> {
        if timeout_millis == 0 {
            return Err(Error::InvalidTimeout);
        }

        let content =
            BeaconInfoEventContent::new(Duration::from_millis(timeout_millis), self.clock.now());
        let event_id = self.publish(&content).await?;

        debug!(%event_id, deadline = ?content.deadline(), "Started a live location share");

        Ok(event_id)
    }

    /// Send a location beacon for the announcement `beacon_info_event_id`.
    ///
    /// The announcement isn't checked: a beacon sent for a share that is
    /// stopped or expired is stored, and ignored by the
    /// [`RunningSharesView`](crate::RunningSharesView).
    ///
    /// # Arguments
    ///
    /// * `beacon_info_event_id` - The ID returned by
    ///   [`LiveShareController::start`].
    ///
    /// * `latitude`, `longitude` - The location, in degrees.
    ///
    /// * `uncertainty` - The accuracy of the location, in meters.
    #[instrument(skip(self), fields(room_id = %self.room_id, user_id = %self.own_user_id))]
    pub async fn send_location(
        &self,
        beacon_info_event_id: OwnedEventId,
        latitude: f64,
        longitude: f64,
        uncertainty: Option<f64>,
    ) -> Result<OwnedEventId> {
        let content = BeaconEventContent {
            beacon_info_event_id,
            latitude,
            longitude,
            uncertainty,
            ts: self.clock.now(),
        };

        Ok(self.sink.send_beacon(&self.room_id, &self.own_user_id, content).await?)
    }

    /// Stop the current live location share.
    ///
    /// A new version of the announcement is published with `isLive` set to
    /// `false`, the start timestamp and the timeout of the current version are
    /// kept. Stopping a share that is already stopped or expired publishes the
    /// same stopped announcement again, so a stop can be safely retried.
    ///
    /// # Errors
    ///
    /// [`Error::NoCurrentAnnouncement`] if the user never announced a share in
    /// this room, there are no fields to carry over in that case.
    /// [`Error::MalformedAnnouncement`] if the current announcement can't be
    /// read. [`Error::PublishFailed`] if the stopped announcement couldn't be
    /// published.
    #[instrument(skip(self), fields(room_id = %self.room_id, user_id = %self.own_user_id))]
    pub async fn stop(&self) -> Result<OwnedEventId> {
        let current = self.current_announcement().await?.ok_or_else(|| {
            Error::NoCurrentAnnouncement {
                room_id: self.room_id.clone(),
                user_id: self.own_user_id.clone(),
            }
        })?;

        if !current.content.live {
            debug!(event_id = %current.event_id, "The live location share is already stopped");
        }

        let event_id = self.publish(&current.content.stopped()).await?;

        debug!(%event_id, "Stopped the live location share");

        Ok(event_id)
    }

    /// The current announcement of the user in this room, if any, whether it
    /// is active or not.
    pub async fn current_announcement(&self) -> Result<Option<BeaconInfo>> {
        let Some(event) = self
            .store
            .get_state_event(&self.room_id, BEACON_INFO_EVENT_TYPE, self.own_user_id.as_str())
            .await?
        else {
            return Ok(None);
        };

        let content = serde_json::from_value(event.content).map_err(Error::MalformedAnnouncement)?;

        Ok(Some(BeaconInfo {
            room_id: self.room_id.clone(),
            user_id: self.own_user_id.clone(),
            event_id: event.event_id,
            content,
        }))
    }

    async fn publish(&self, content: &BeaconInfoEventContent) -> Result<OwnedEventId> {
        publish_state_event(
            self.store.as_ref(),
            &self.config,
            &self.room_id,
            BEACON_INFO_EVENT_TYPE,
            self.own_user_id.as_str(),
            serde_json::to_value(content)?,
        )
        .await
    }
}
