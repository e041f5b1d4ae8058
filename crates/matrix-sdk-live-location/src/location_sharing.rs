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

use std::sync::Arc;

use futures_core::Stream;
use ruma::{OwnedEventId, OwnedRoomId, OwnedUserId, RoomId};
use tracing::{debug, instrument};

use crate::{
    ActiveShareSummary, BeaconInfo, Clock, LiveShareController, LocationPingSink,
    LocationSharingConfig, Result, RunningSharesView, StateEventStore,
    StaticLocationEventContent,
};

/// Location sharing in a room, on behalf of the current user.
///
/// This ties a [`LiveShareController`] and a [`RunningSharesView`] sharing the
/// same store and [`Clock`] together, and sends one-off static locations.
#[derive(Clone, Debug)]
pub struct LocationSharing {
    controller: LiveShareController,
    running_shares: RunningSharesView,
    sink: Arc<dyn LocationPingSink>,
    clock: Clock,
}

impl LocationSharing {
    /// Create a new `LocationSharing` for `own_user_id` in `room_id`.
    pub fn new(
        room_id: OwnedRoomId,
        own_user_id: OwnedUserId,
        store: Arc<dyn StateEventStore>,
        sink: Arc<dyn LocationPingSink>,
        clock: Clock,
        config: LocationSharingConfig,
    ) -> Self {
        let running_shares = RunningSharesView::new(room_id.clone(), store.clone(), clock);
        let controller =
            LiveShareController::new(room_id, own_user_id, store, sink.clone(), clock, config);

        Self { controller, running_shares, sink, clock }
    }

    /// The room locations are shared in.
    pub fn room_id(&self) -> &RoomId {
        self.controller.room_id()
    }

    /// Start sharing the live location of the current user for
    /// `timeout_millis` milliseconds.
    ///
    /// See [`LiveShareController::start`].
    pub async fn start_live_location_share(&self, timeout_millis: u64) -> Result<OwnedEventId> {
        self.controller.start(timeout_millis).await
    }

    /// Send the current location of the user for the live location share
    /// `beacon_info_event_id`.
    ///
    /// See [`LiveShareController::send_location`].
    pub async fn send_live_location(
        &self,
        beacon_info_event_id: OwnedEventId,
        latitude: f64,
        longitude: f64,
        uncertainty: Option<f64>,
    ) -> Result<OwnedEventId> {
        self.controller.send_location(beacon_info_event_id, latitude, longitude, uncertainty).await
    }

    /// Stop sharing the live location of the current user.
    ///
    /// See [`LiveShareController::stop`].
    pub async fn stop_live_location_share(&self) -> Result<OwnedEventId> {
        self.controller.stop().await
    }

    /// The current announcement of the user, active or not.
    pub async fn own_announcement(&self) -> Result<Option<BeaconInfo>> {
        self.controller.current_announcement().await
    }

    /// The live location shares running in the room right now.
    pub async fn running_live_location_shares(&self) -> Result<Vec<ActiveShareSummary>> {
        self.running_shares.snapshot().await
    }

    /// Subscribe to the live location shares running in the room.
    ///
    /// See [`RunningSharesView::subscribe`].
    pub fn subscribe_to_running_live_location_shares(
        &self,
    ) -> impl Stream<Item = Vec<ActiveShareSummary>> + use<> {
        self.running_shares.subscribe()
    }

    /// Send a one-off location, unrelated to any live location share.
    ///
    /// # Arguments
    ///
    /// * `latitude`, `longitude` - The location, in degrees.
    ///
    /// * `uncertainty` - The accuracy of the location, in meters.
    ///
    /// * `is_user_location` - Whether this is where the user is, as opposed to
    ///   a place they picked.
    #[instrument(skip(self), fields(room_id = %self.room_id()))]
    pub async fn send_static_location(
        &self,
        latitude: f64,
        longitude: f64,
        uncertainty: Option<f64>,
        is_user_location: bool,
    ) -> Result<OwnedEventId> {
        let content = StaticLocationEventContent {
            latitude,
            longitude,
            uncertainty,
            is_user_location,
            ts: self.clock.now(),
        };

        let event_id = self
            .sink
            .send_static_location(self.room_id(), self.controller.own_user_id(), content)
            .await?;

        debug!(%event_id, "Sent a static location");

        Ok(event_id)
    }
}
