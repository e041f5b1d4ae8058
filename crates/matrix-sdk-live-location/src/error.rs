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

//! Error conditions.

use ruma::{IdParseError, OwnedRoomId, OwnedUserId};
use serde_json::Error as JsonError;
use thiserror::Error;

/// Result type of the live location sharing operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors reported by a [`StateEventStore`] or a [`LocationPingSink`].
///
/// [`StateEventStore`]: crate::StateEventStore
/// [`LocationPingSink`]: crate::LocationPingSink
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store could not be reached right now, the operation may succeed if
    /// it is tried again.
    #[error("the store is temporarily unavailable: {0}")]
    Unavailable(String),

    /// An error happened in the underlying storage or transport backend.
    #[error(transparent)]
    Backend(Box<dyn std::error::Error + Send + Sync>),

    /// An error happened while serializing or deserializing some data.
    #[error(transparent)]
    Json(#[from] JsonError),

    /// An error happened while deserializing a Matrix identifier, e.g. an
    /// event id.
    #[error(transparent)]
    Identifier(#[from] IdParseError),
}

impl StoreError {
    /// Create a new [`Backend`][Self::Backend] error.
    ///
    /// Shorthand for `StoreError::Backend(Box::new(error))`.
    #[inline]
    pub fn backend<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend(Box::new(error))
    }

    /// Whether retrying the failed operation could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Internal representation of errors.
#[derive(Error, Debug)]
pub enum Error {
    /// A live location share was started with a timeout of zero.
    #[error("the timeout of a live location share must be greater than zero")]
    InvalidTimeout,

    /// A live location share was stopped but there was no announcement to
    /// stop.
    #[error("there is no live location share of {user_id} in {room_id} to stop")]
    NoCurrentAnnouncement {
        /// The room in which the share was looked up.
        room_id: OwnedRoomId,
        /// The user whose share was looked up.
        user_id: OwnedUserId,
    },

    /// Publishing a state event failed, the store's retry budget is exhausted
    /// or the failure was not worth retrying.
    #[error("publishing the `{event_type}` state event failed after {attempts} attempt(s)")]
    PublishFailed {
        /// The type of the state event that couldn't be published.
        event_type: String,
        /// How many times the publish was attempted.
        attempts: u32,
        /// The error of the last attempt.
        #[source]
        source: StoreError,
    },

    /// The current announcement exists but can't be deserialized, so its
    /// fields can't be carried over.
    #[error("the current live location share announcement is malformed: {0}")]
    MalformedAnnouncement(#[source] JsonError),

    /// A store operation other than publishing a state event failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// An error happened while serializing an event content.
    #[error(transparent)]
    Json(#[from] JsonError),
}

/// Why a stored record was left out of the live location sharing data.
#[derive(Error, Debug)]
pub(crate) enum InvalidRecord {
    /// An identifier in the record isn't valid.
    #[error(transparent)]
    Identifier(#[from] IdParseError),

    /// The content doesn't have the expected shape.
    #[error(transparent)]
    Json(#[from] JsonError),

    /// The announcement has a timeout of zero, it was never active.
    #[error("the announcement has a timeout of zero")]
    ZeroTimeout,
}
