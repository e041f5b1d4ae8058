use std::sync::Arc;

use matrix_sdk_live_location::{Clock, LocationSharing, LocationSharingConfig, MemoryStore};
use matrix_sdk_live_location_test::DEFAULT_TEST_ROOM_ID;
use ruma::{MilliSecondsSinceUnixEpoch, UInt, UserId};

mod live_share;
mod running_shares;

matrix_sdk_live_location_test::init_tracing_for_tests!();

/// When the tests start, in milliseconds since the unix epoch.
const T0: u64 = 1_655_210_176_000;

fn ts(millis: u64) -> MilliSecondsSinceUnixEpoch {
    MilliSecondsSinceUnixEpoch(UInt::new_saturating(millis))
}

/// A clock reading [`T0`] now.
fn clock() -> Clock {
    Clock::starting_at(ts(T0))
}

/// Location sharing in the default test room for `user_id`, backed by
/// `store`.
fn location_sharing(store: &MemoryStore, clock: Clock, user_id: &UserId) -> LocationSharing {
    LocationSharing::new(
        (*DEFAULT_TEST_ROOM_ID).to_owned(),
        user_id.to_owned(),
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        clock,
        LocationSharingConfig::new(),
    )
}
