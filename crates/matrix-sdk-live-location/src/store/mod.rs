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

//! The storage and transport live location sharing relies on.
//!
//! Implementing the [`StateEventStore`] and [`LocationPingSink`] traits, you
//! can plug any homeserver connection and local cache into the live location
//! sharing machinery. The crate brings an in-memory implementation of both,
//! the [`MemoryStore`].

use std::{
    fmt,
    sync::atomic::{AtomicU32, Ordering},
};

use async_trait::async_trait;
use backoff::{Error as RetryError, ExponentialBackoffBuilder, future::retry};
use ruma::{OwnedEventId, OwnedRoomId, OwnedUserId, RoomId, UserId};
use serde_json::Value as JsonValue;
use tokio::sync::broadcast;
use tracing::warn;

use crate::{
    BeaconEventContent, Error, LocationSharingConfig, Result, StaticLocationEventContent,
    StoreError,
};

mod memory_store;

pub use self::memory_store::MemoryStore;
#[cfg(test)]
pub(crate) use self::memory_store::UPDATES_CAPACITY;

/// The latest state event of a room for a given event type and state key.
#[derive(Clone, Debug, PartialEq)]
pub struct StateEvent {
    /// The ID of the event.
    pub event_id: OwnedEventId,
    /// The state key of the event.
    pub state_key: String,
    /// The content of the event, as it was stored.
    pub content: JsonValue,
}

/// A location beacon sent in a room.
#[derive(Clone, Debug, PartialEq)]
pub struct BeaconEvent {
    /// The ID of the event.
    pub event_id: OwnedEventId,
    /// Who sent the beacon.
    pub sender: OwnedUserId,
    /// The content of the event, as it was stored.
    pub content: JsonValue,
}

/// A notification that the data of a room changed in a store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreUpdate {
    /// A state event was written.
    StateEvent {
        /// The room of the state event.
        room_id: OwnedRoomId,
        /// The type of the state event.
        event_type: String,
        /// The state key of the state event.
        state_key: String,
    },

    /// A location beacon was sent.
    Beacon {
        /// The room of the beacon.
        room_id: OwnedRoomId,
        /// The ID of the beacon event.
        event_id: OwnedEventId,
    },
}

impl StoreUpdate {
    /// The room whose data changed.
    pub fn room_id(&self) -> &RoomId {
        match self {
            Self::StateEvent { room_id, .. } | Self::Beacon { room_id, .. } => room_id,
        }
    }
}

/// An abstract store of room state events, which also knows the location
/// beacons of a room.
#[async_trait]
pub trait StateEventStore: fmt::Debug + Send + Sync {
    /// Publish a new version of a state event.
    ///
    /// This is a single attempt, retries are handled by the caller according
    /// to its [`LocationSharingConfig`]. Failures that may go away on their own
    /// must be reported as [`StoreError::Unavailable`].
    ///
    /// # Arguments
    ///
    /// * `room_id` - The room to publish the state event in.
    ///
    /// * `event_type` - The type of the state event.
    ///
    /// * `state_key` - The state key of the state event.
    ///
    /// * `content` - The content of the new version of the state event.
    async fn send_state_event(
        &self,
        room_id: &RoomId,
        event_type: &str,
        state_key: &str,
        content: JsonValue,
    ) -> Result<OwnedEventId, StoreError>;

    /// Get the latest version of a state event, if any.
    async fn get_state_event(
        &self,
        room_id: &RoomId,
        event_type: &str,
        state_key: &str,
    ) -> Result<Option<StateEvent>, StoreError>;

    /// Get the latest version of all the state events of a room with the given
    /// type.
    async fn get_state_events(
        &self,
        room_id: &RoomId,
        event_type: &str,
    ) -> Result<Vec<StateEvent>, StoreError>;

    /// Get the location beacons of a room that reference one of the given
    /// `live-beacon-info` events.
    ///
    /// The beacons of one announcement must be returned in the order they
    /// were stored. Beacons referencing any other event, or none, are left
    /// out.
    async fn get_beacon_events(
        &self,
        room_id: &RoomId,
        beacon_info_event_ids: &[OwnedEventId],
    ) -> Result<Vec<BeaconEvent>, StoreError>;

    /// Subscribe to the changes of the store.
    ///
    /// An update must only be sent once the change is visible to the getters
    /// of this trait.
    fn subscribe_to_updates(&self) -> broadcast::Receiver<StoreUpdate>;
}

/// Where location pings and static locations are sent to.
#[async_trait]
pub trait LocationPingSink: fmt::Debug + Send + Sync {
    /// Send a location beacon belonging to a live location share.
    async fn send_beacon(
        &self,
        room_id: &RoomId,
        sender: &UserId,
        content: BeaconEventContent,
    ) -> Result<OwnedEventId, StoreError>;

    /// Send a one-off location.
    async fn send_static_location(
        &self,
        room_id: &RoomId,
        sender: &UserId,
        content: StaticLocationEventContent,
    ) -> Result<OwnedEventId, StoreError>;
}

/// Publish a state event, retrying transient failures with an exponential
/// back-off until the retry limit of `config` is reached.
pub(crate) async fn publish_state_event(
    store: &dyn StateEventStore,
    config: &LocationSharingConfig,
    room_id: &RoomId,
    event_type: &str,
    state_key: &str,
    content: JsonValue,
) -> Result<OwnedEventId> {
    let backoff = ExponentialBackoffBuilder::new()
        .with_initial_interval(config.retry_interval)
        .with_max_elapsed_time(None)
        .build();
    let retry_limit = config.retry_limit;
    let attempts = &AtomicU32::new(0);
    let content = &content;

    let send = || async move {
        let attempt = attempts.fetch_add(1, Ordering::Relaxed) + 1;

        store.send_state_event(room_id, event_type, state_key, content.clone()).await.map_err(
            |error| {
                // Turn errors into permanent errors when the retry limit is reached.
                if error.is_transient() && attempt < retry_limit {
                    warn!(attempt, retry_limit, "Publishing `{event_type}` failed, retrying: {error}");
                    RetryError::transient(error)
                } else {
                    RetryError::Permanent(error)
                }
            },
        )
    };

    retry(backoff, send).await.map_err(|source| Error::PublishFailed {
        event_type: event_type.to_owned(),
        attempts: attempts.load(Ordering::Relaxed),
        source,
    })
}
