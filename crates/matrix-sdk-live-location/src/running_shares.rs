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

//! The live location shares currently running in a room.
//!
//! Whether a share is running depends on the current time: an announcement
//! stops being active when its deadline passes, and nothing is written to the
//! store when that happens. The [`RunningSharesView`] thus recomputes the set
//! of running shares both when the store changes and when the nearest
//! deadline among the running shares is reached.

use std::{collections::BTreeMap, future::pending, pin::pin, sync::Arc};

use async_stream::stream;
use futures_core::Stream;
use ruma::{MilliSecondsSinceUnixEpoch, OwnedEventId, OwnedRoomId, RoomId, UserId};
use tokio::{
    sync::broadcast::{self, error::RecvError},
    time::{Instant, sleep_until},
};
use tracing::{trace, warn};

use crate::{
    BEACON_INFO_EVENT_TYPE, BeaconInfo, Clock, LastLocation, Result, StateEventStore,
    StoreUpdate,
    store::{BeaconEvent, StateEvent},
};

/// A live location share that is running right now.
#[derive(Clone, Debug, PartialEq)]
pub struct ActiveShareSummary {
    /// The announcement of the share.
    pub beacon_info: BeaconInfo,
    /// The most recent location sent for this share, if any.
    pub last_location: Option<LastLocation>,
}

impl ActiveShareSummary {
    /// The user sharing their location.
    pub fn user_id(&self) -> &UserId {
        &self.beacon_info.user_id
    }

    /// When the share stops being active, unless it is stopped before.
    pub fn deadline(&self) -> MilliSecondsSinceUnixEpoch {
        self.beacon_info.deadline()
    }
}

/// The live location shares running in a room.
#[derive(Clone, Debug)]
pub struct RunningSharesView {
    room_id: OwnedRoomId,
    store: Arc<dyn StateEventStore>,
    clock: Clock,
}

impl RunningSharesView {
    /// Create a new view of the shares running in `room_id`.
    ///
    /// The `clock` must be the one used to start the shares.
    pub fn new(room_id: OwnedRoomId, store: Arc<dyn StateEventStore>, clock: Clock) -> Self {
        Self { room_id, store, clock }
    }

    /// The room of the view.
    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    /// The shares running right now.
    pub async fn snapshot(&self) -> Result<Vec<ActiveShareSummary>> {
        Ok(self.load().await?.shares)
    }

    /// Subscribe to the shares running in the room.
    ///
    /// The first item is the current list of running shares. Every further
    /// item is the full new list, sent when it changes, be it because of a new
    /// event in the store or because a share expired. A share is left out at
    /// most one timer tick after its deadline.
    ///
    /// When the store can't be read, the last list is kept, and shares still
    /// drop out of it at their deadline. The store is tried again on its next
    /// update or at the next deadline, never in a loop.
    ///
    /// Dropping the stream detaches it from the store and cancels its pending
    /// expiry wake-up.
    pub fn subscribe(&self) -> impl Stream<Item = Vec<ActiveShareSummary>> + use<> {
        let view = self.clone();
        // Subscribe before the first load, so no write can slip in between.
        let mut updates = self.store.subscribe_to_updates();

        stream!({
            let mut last_emitted: Option<Vec<ActiveShareSummary>> = None;

            loop {
                let running = match view.load().await {
                    Ok(running) => Some(running),
                    Err(error) => {
                        warn!(room_id = %view.room_id, "Couldn't load the running live location shares: {error}");

                        // Keep the last list, minus what expired since. Only
                        // deadlines still ahead may wake us up before the next
                        // store update.
                        last_emitted
                            .as_deref()
                            .map(|shares| RunningShares::still_running(shares, view.clock.now()))
                    }
                };

                let next_deadline = running.as_ref().and_then(|running| running.next_deadline);

                if let Some(running) =
                    running.filter(|running| last_emitted.as_ref() != Some(&running.shares))
                {
                    last_emitted = Some(running.shares.clone());
                    yield running.shares;
                }

                let wake_up = next_deadline.map(|deadline| view.clock.instant_at(deadline));

                match next_trigger(&mut updates, &view.room_id, wake_up).await {
                    Trigger::StoreUpdate => trace!("The store changed, reloading running shares"),
                    Trigger::Expiry => trace!("A live location share expired"),
                    Trigger::Closed => break,
                }
            }
        })
    }

    async fn load(&self) -> Result<RunningShares> {
        let now = self.clock.now();
        let announcements =
            self.store.get_state_events(&self.room_id, BEACON_INFO_EVENT_TYPE).await?;
        let active = ActiveAnnouncements::collect(&self.room_id, &announcements, now);

        let beacons = if active.is_empty() {
            Vec::new()
        } else {
            self.store.get_beacon_events(&self.room_id, &active.event_ids()).await?
        };

        Ok(RunningShares::compute(active, &beacons))
    }
}

/// What woke a subscription up.
enum Trigger {
    /// The live location data of the room changed.
    StoreUpdate,
    /// The nearest deadline was reached.
    Expiry,
    /// The store went away.
    Closed,
}

async fn next_trigger(
    updates: &mut broadcast::Receiver<StoreUpdate>,
    room_id: &RoomId,
    wake_up: Option<Instant>,
) -> Trigger {
    let mut expiry = pin!(async move {
        match wake_up {
            Some(instant) => sleep_until(instant).await,
            None => pending().await,
        }
    });

    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Ok(update) if concerns_running_shares(&update, room_id) => {
                    return Trigger::StoreUpdate;
                }
                Ok(_) => {}
                Err(RecvError::Lagged(count)) => {
                    trace!(count, "Missed store updates, reloading running shares");
                    return Trigger::StoreUpdate;
                }
                Err(RecvError::Closed) => return Trigger::Closed,
            },

            () = &mut expiry => return Trigger::Expiry,
        }
    }
}

fn concerns_running_shares(update: &StoreUpdate, room_id: &RoomId) -> bool {
    if update.room_id() != room_id {
        return false;
    }

    match update {
        StoreUpdate::StateEvent { event_type, .. } => event_type == BEACON_INFO_EVENT_TYPE,
        StoreUpdate::Beacon { .. } => true,
    }
}

/// The shares running at a given time, and when the first of them expires.
#[derive(Debug)]
struct RunningShares {
    shares: Vec<ActiveShareSummary>,
    next_deadline: Option<MilliSecondsSinceUnixEpoch>,
}

impl RunningShares {
    fn compute(active: ActiveAnnouncements, beacons: &[BeaconEvent]) -> Self {
        let mut running: BTreeMap<_, _> = active
            .0
            .into_iter()
            .map(|(event_id, beacon_info)| {
                (event_id, ActiveShareSummary { beacon_info, last_location: None })
            })
            .collect();

        // Beacons are in insertion order, so on equal timestamps the later one
        // wins.
        for event in beacons {
            let location = match LastLocation::try_from_beacon_event(event) {
                Ok(location) => location,
                Err(error) => {
                    warn!(event_id = %event.event_id, "Ignoring a malformed location beacon: {error}");
                    continue;
                }
            };

            let Some(summary) = running.get_mut(&location.content.beacon_info_event_id) else {
                // Not one of the running shares.
                continue;
            };

            if location.sender != summary.beacon_info.user_id {
                warn!(
                    event_id = %location.event_id,
                    sender = %location.sender,
                    "Ignoring a location beacon sent for someone else's live location share"
                );
                continue;
            }

            if summary.last_location.as_ref().is_none_or(|last| last.ts() <= location.ts()) {
                summary.last_location = Some(location);
            }
        }

        let next_deadline = running.values().map(ActiveShareSummary::deadline).min();

        let mut shares: Vec<_> = running.into_values().collect();
        shares.sort_by(|a, b| a.user_id().cmp(b.user_id()));

        Self { shares, next_deadline }
    }

    /// The shares among `shares` that are still running at `now`.
    fn still_running(shares: &[ActiveShareSummary], now: MilliSecondsSinceUnixEpoch) -> Self {
        let shares: Vec<_> =
            shares.iter().filter(|share| share.beacon_info.is_active_at(now)).cloned().collect();
        let next_deadline = shares.iter().map(ActiveShareSummary::deadline).min();

        Self { shares, next_deadline }
    }
}

/// The valid announcements of a room that are active at a given time, by
/// event ID.
#[derive(Debug)]
struct ActiveAnnouncements(BTreeMap<OwnedEventId, BeaconInfo>);

impl ActiveAnnouncements {
    fn collect(
        room_id: &RoomId,
        announcements: &[StateEvent],
        now: MilliSecondsSinceUnixEpoch,
    ) -> Self {
        let mut active = BTreeMap::new();

        for event in announcements {
            let beacon_info = match BeaconInfo::try_from_state_event(room_id, event) {
                Ok(beacon_info) => beacon_info,
                Err(error) => {
                    warn!(
                        event_id = %event.event_id,
                        state_key = %event.state_key,
                        "Ignoring a malformed live location share announcement: {error}"
                    );
                    continue;
                }
            };

            if beacon_info.is_active_at(now) {
                active.insert(beacon_info.event_id.clone(), beacon_info);
            }
        }

        Self(active)
    }

    fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn event_ids(&self) -> Vec<OwnedEventId> {
        self.0.keys().cloned().collect()
    }
}
