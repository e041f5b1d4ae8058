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

#![doc = include_str!("../README.md")]
#![warn(missing_debug_implementations, missing_docs)]

pub mod beacon;
pub mod beacon_info;
mod clock;
pub mod config;
mod error;
pub mod live_share;
mod location_sharing;
pub mod running_shares;
pub mod store;

pub use self::{
    beacon::{BeaconEventContent, LastLocation, StaticLocationEventContent},
    beacon_info::{BEACON_INFO_EVENT_TYPE, BeaconInfo, BeaconInfoEventContent},
    clock::Clock,
    config::LocationSharingConfig,
    error::{Error, Result, StoreError},
    live_share::LiveShareController,
    location_sharing::LocationSharing,
    running_shares::{ActiveShareSummary, RunningSharesView},
    store::{LocationPingSink, MemoryStore, StateEventStore, StoreUpdate},
};

#[cfg(test)]
matrix_sdk_live_location_test::init_tracing_for_tests!();
