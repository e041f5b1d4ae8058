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

use std::{
    collections::{BTreeMap, VecDeque},
    sync::{
        Arc, Mutex, RwLock,
        atomic::{AtomicU64, Ordering},
    },
};

use async_trait::async_trait;
use ruma::{EventId, OwnedEventId, OwnedRoomId, OwnedUserId, RoomId, UserId};
use serde_json::Value as JsonValue;
use tokio::sync::broadcast;
use tracing::trace;

use super::{BeaconEvent, LocationPingSink, StateEvent, StateEventStore, StoreUpdate};
use crate::{BeaconEventContent, StaticLocationEventContent, StoreError};

/// How many updates a slow subscriber may miss before it lags.
pub(crate) const UPDATES_CAPACITY: usize = 32;

type RoomState = BTreeMap<String, BTreeMap<String, StateEvent>>;

/// Beacons by the `live-beacon-info` event ID they reference.
type RoomBeacons = BTreeMap<String, Vec<BeaconEvent>>;

/// In-memory, non-persistent implementation of the [`StateEventStore`] and
/// [`LocationPingSink`].
///
/// Cloning the store gives another handle to the same data.
///
/// Nothing is ever removed: every beacon sent to the store is kept for the
/// lifetime of the store. Beacons are indexed by the announcement they
/// reference, so looking up the beacons of the running shares doesn't get
/// slower as beacons of past shares pile up.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    room_state: Arc<RwLock<BTreeMap<OwnedRoomId, RoomState>>>,
    beacons: Arc<RwLock<BTreeMap<OwnedRoomId, RoomBeacons>>>,
    static_locations:
        Arc<RwLock<BTreeMap<OwnedRoomId, Vec<(OwnedUserId, StaticLocationEventContent)>>>>,
    send_failures: Arc<Mutex<VecDeque<StoreError>>>,
    next_event_number: Arc<AtomicU64>,
    updates: broadcast::Sender<StoreUpdate>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create a new empty `MemoryStore`.
    pub fn new() -> Self {
        Self {
            room_state: Default::default(),
            beacons: Default::default(),
            static_locations: Default::default(),
            send_failures: Default::default(),
            next_event_number: Default::default(),
            updates: broadcast::Sender::new(UPDATES_CAPACITY),
        }
    }

    /// Make the next `count` calls to [`StateEventStore::send_state_event`]
    /// fail with a transient error.
    pub fn fail_next_state_event_sends(&self, count: usize) {
        let mut failures = self.send_failures.lock().unwrap();

        for _ in 0..count {
            failures.push_back(StoreError::Unavailable("simulated outage".to_owned()));
        }
    }

    /// Make the next call to [`StateEventStore::send_state_event`] fail with
    /// the given error.
    pub fn reject_next_state_event_send(&self, error: StoreError) {
        self.send_failures.lock().unwrap().push_back(error);
    }

    /// Store a location beacon whose content is arbitrary JSON, as if it had
    /// been received from another client.
    pub fn insert_beacon_event(
        &self,
        room_id: &RoomId,
        sender: &UserId,
        content: JsonValue,
    ) -> Result<OwnedEventId, StoreError> {
        let event_id = self.next_event_id()?;
        // Beacons without a usable reference land under an empty key, which
        // no event ID can match.
        let beacon_info_event_id = content
            .get("beaconInfoEventId")
            .and_then(JsonValue::as_str)
            .unwrap_or_default()
            .to_owned();

        self.beacons
            .write()
            .unwrap()
            .entry(room_id.to_owned())
            .or_default()
            .entry(beacon_info_event_id)
            .or_default()
            .push(BeaconEvent { event_id: event_id.clone(), sender: sender.to_owned(), content });

        trace!(%room_id, %event_id, "Stored a beacon");
        self.notify(StoreUpdate::Beacon { room_id: room_id.to_owned(), event_id: event_id.clone() });

        Ok(event_id)
    }

    /// The static locations sent to a room, with their sender.
    pub fn static_locations(
        &self,
        room_id: &RoomId,
    ) -> Vec<(OwnedUserId, StaticLocationEventContent)> {
        self.static_locations.read().unwrap().get(room_id).cloned().unwrap_or_default()
    }

    /// How many subscriptions to the updates of this store are alive.
    pub fn update_receiver_count(&self) -> usize {
        self.updates.receiver_count()
    }

    fn next_event_id(&self) -> Result<OwnedEventId, StoreError> {
        let number = self.next_event_number.fetch_add(1, Ordering::Relaxed);
        Ok(EventId::parse(format!("$memory_store_{number}:localhost"))?)
    }

    fn notify(&self, update: StoreUpdate) {
        // Nobody listening is fine.
        let _ = self.updates.send(update);
    }
}

#[async_trait]
impl StateEventStore for MemoryStore {
    async fn send_state_event(
        &self,
        room_id: &RoomId,
        event_type: &str,
        state_key: &str,
        content: JsonValue,
    ) -> Result<OwnedEventId, StoreError> {
        if let Some(error) = self.send_failures.lock().unwrap().pop_front() {
            return Err(error);
        }

        let event_id = self.next_event_id()?;
        let event =
            StateEvent { event_id: event_id.clone(), state_key: state_key.to_owned(), content };

        self.room_state
            .write()
            .unwrap()
            .entry(room_id.to_owned())
            .or_default()
            .entry(event_type.to_owned())
            .or_default()
            .insert(state_key.to_owned(), event);

        trace!(%room_id, event_type, state_key, %event_id, "Stored a state event");
        self.notify(StoreUpdate::StateEvent {
            room_id: room_id.to_owned(),
            event_type: event_type.to_owned(),
            state_key: state_key.to_owned(),
        });

        Ok(event_id)
    }

    async fn get_state_event(
        &self,
        room_id: &RoomId,
        event_type: &str,
        state_key: &str,
    ) -> Result<Option<StateEvent>, StoreError> {
        Ok(self
            .room_state
            .read()
            .unwrap()
            .get(room_id)
            .and_then(|state| state.get(event_type))
            .and_then(|events| events.get(state_key))
            .cloned())
    }

    async fn get_state_events(
        &self,
        room_id: &RoomId,
        event_type: &str,
    ) -> Result<Vec<StateEvent>, StoreError> {
        Ok(self
            .room_state
            .read()
            .unwrap()
            .get(room_id)
            .and_then(|state| state.get(event_type))
            .map(|events| events.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn get_beacon_events(
        &self,
        room_id: &RoomId,
        beacon_info_event_ids: &[OwnedEventId],
    ) -> Result<Vec<BeaconEvent>, StoreError> {
        let beacons = self.beacons.read().unwrap();
        let Some(room_beacons) = beacons.get(room_id) else {
            return Ok(Vec::new());
        };

        Ok(beacon_info_event_ids
            .iter()
            .filter_map(|event_id| room_beacons.get(event_id.as_str()))
            .flatten()
            .cloned()
            .collect())
    }

    fn subscribe_to_updates(&self) -> broadcast::Receiver<StoreUpdate> {
        self.updates.subscribe()
    }
}

#[async_trait]
impl LocationPingSink for MemoryStore {
    async fn send_beacon(
        &self,
        room_id: &RoomId,
        sender: &UserId,
        content: BeaconEventContent,
    ) -> Result<OwnedEventId, StoreError> {
        self.insert_beacon_event(room_id, sender, serde_json::to_value(content)?)
    }

    async fn send_static_location(
        &self,
        room_id: &RoomId,
        sender: &UserId,
        content: StaticLocationEventContent,
    ) -> Result<OwnedEventId, StoreError> {
        let event_id = self.next_event_id()?;

        self.static_locations
            .write()
            .unwrap()
            .entry(room_id.to_owned())
            .or_default()
            .push((sender.to_owned(), content));

        Ok(event_id)
    }
}
