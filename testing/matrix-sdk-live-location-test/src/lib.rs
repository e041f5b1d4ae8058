use once_cell::sync::Lazy;
use ruma::{RoomId, UserId, room_id, user_id};
use serde_json::{Value as JsonValue, json};

pub static ALICE: Lazy<&UserId> = Lazy::new(|| user_id!("@alice:server.name"));
pub static BOB: Lazy<&UserId> = Lazy::new(|| user_id!("@bob:other.server"));
pub static CAROL: Lazy<&UserId> = Lazy::new(|| user_id!("@carol:other.server"));

pub static DEFAULT_TEST_ROOM_ID: Lazy<&RoomId> =
    Lazy::new(|| room_id!("!SVkFJHzfwvuaIEawgC:localhost"));

/// The JSON content of a `live-beacon-info` state event.
pub fn beacon_info_content(timeout: u64, live: bool, start_ts: u64) -> JsonValue {
    json!({
        "timeout": timeout,
        "isLive": live,
        "startTimestamp": start_ts,
    })
}

/// The JSON content of a location beacon for the announcement
/// `beacon_info_event_id`.
pub fn beacon_content(
    beacon_info_event_id: &str,
    latitude: f64,
    longitude: f64,
    ts: u64,
) -> JsonValue {
    json!({
        "beaconInfoEventId": beacon_info_event_id,
        "latitude": latitude,
        "longitude": longitude,
        "timestamp": ts,
    })
}

/// Install a `tracing` subscriber printing to the test output, filtered with
/// `RUST_LOG`.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    // Another test binary in the same process may have installed one already.
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

/// Install the test `tracing` subscriber when the test binary starts.
///
/// The calling crate needs a dependency on `ctor`.
#[macro_export]
macro_rules! init_tracing_for_tests {
    () => {
        #[ctor::ctor]
        fn init_logging() {
            $crate::init_tracing();
        }
    };
}
