use std::time::Duration;

use assert_matches::assert_matches;
use assert_matches2::assert_let;
use matrix_sdk_live_location::{Error, MemoryStore};
use matrix_sdk_live_location_test::{ALICE, DEFAULT_TEST_ROOM_ID};
use tokio::time::advance;

use crate::{T0, clock, location_sharing, ts};

#[tokio::test(start_paused = true)]
async fn test_started_share_is_running() {
    let store = MemoryStore::new();
    let sharing = location_sharing(&store, clock(), *ALICE);

    let event_id = sharing.start_live_location_share(15_000).await.unwrap();

    advance(Duration::from_millis(1_000)).await;

    let shares = sharing.running_live_location_shares().await.unwrap();
    assert_eq!(shares.len(), 1);
    assert_eq!(shares[0].user_id(), *ALICE);
    assert_eq!(shares[0].beacon_info.event_id, event_id);
    assert_eq!(shares[0].deadline(), ts(T0 + 15_000));
}

#[tokio::test(start_paused = true)]
async fn test_stopped_share_is_not_running() {
    let store = MemoryStore::new();
    let sharing = location_sharing(&store, clock(), *ALICE);

    sharing.start_live_location_share(15_000).await.unwrap();

    advance(Duration::from_millis(2_000)).await;
    sharing.stop_live_location_share().await.unwrap();

    advance(Duration::from_millis(1)).await;
    assert!(sharing.running_live_location_shares().await.unwrap().is_empty());

    // The stopped announcement keeps its start and timeout.
    assert_let!(Some(announcement) = sharing.own_announcement().await.unwrap());
    assert!(!announcement.content.live);
    assert_eq!(announcement.content.start_ts, ts(T0));
    assert_eq!(announcement.content.timeout, Duration::from_millis(15_000));
}

#[tokio::test(start_paused = true)]
async fn test_share_expires_without_stop() {
    let store = MemoryStore::new();
    let sharing = location_sharing(&store, clock(), *ALICE);

    sharing.start_live_location_share(15_000).await.unwrap();

    advance(Duration::from_millis(14_999)).await;
    assert_eq!(sharing.running_live_location_shares().await.unwrap().len(), 1);

    advance(Duration::from_millis(2)).await;
    assert!(sharing.running_live_location_shares().await.unwrap().is_empty());

    // Expiring doesn't write anything.
    assert_let!(Some(announcement) = sharing.own_announcement().await.unwrap());
    assert!(announcement.content.live);
}

#[tokio::test(start_paused = true)]
async fn test_location_after_stop_does_not_revive_the_share() {
    let store = MemoryStore::new();
    let sharing = location_sharing(&store, clock(), *ALICE);

    let beacon_info_event_id = sharing.start_live_location_share(15_000).await.unwrap();
    sharing.stop_live_location_share().await.unwrap();

    advance(Duration::from_millis(500)).await;
    sharing.send_live_location(beacon_info_event_id, 48.85, 2.29, Some(10.0)).await.unwrap();

    assert!(sharing.running_live_location_shares().await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_stop_twice() {
    let store = MemoryStore::new();
    let sharing = location_sharing(&store, clock(), *ALICE);

    sharing.start_live_location_share(15_000).await.unwrap();

    sharing.stop_live_location_share().await.unwrap();
    assert_let!(Some(first) = sharing.own_announcement().await.unwrap());

    advance(Duration::from_millis(3_000)).await;
    sharing.stop_live_location_share().await.unwrap();
    assert_let!(Some(second) = sharing.own_announcement().await.unwrap());

    assert_eq!(first.content, second.content);
    assert!(!second.content.live);
}

#[tokio::test(start_paused = true)]
async fn test_stop_without_share() {
    let store = MemoryStore::new();
    let sharing = location_sharing(&store, clock(), *ALICE);

    assert_matches!(
        sharing.stop_live_location_share().await,
        Err(Error::NoCurrentAnnouncement { .. })
    );
    assert!(sharing.own_announcement().await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_new_share_supersedes_the_previous_one() {
    let store = MemoryStore::new();
    let sharing = location_sharing(&store, clock(), *ALICE);

    sharing.start_live_location_share(15_000).await.unwrap();

    advance(Duration::from_millis(5_000)).await;
    let event_id = sharing.start_live_location_share(60_000).await.unwrap();

    let shares = sharing.running_live_location_shares().await.unwrap();
    assert_eq!(shares.len(), 1);
    assert_eq!(shares[0].beacon_info.event_id, event_id);
    assert_eq!(shares[0].deadline(), ts(T0 + 65_000));

    // Only the deadline of the second share counts.
    advance(Duration::from_millis(20_000)).await;
    assert_eq!(sharing.running_live_location_shares().await.unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_timeout() {
    let store = MemoryStore::new();
    let sharing = location_sharing(&store, clock(), *ALICE);

    assert_matches!(sharing.start_live_location_share(0).await, Err(Error::InvalidTimeout));
    assert!(sharing.own_announcement().await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_static_location() {
    let store = MemoryStore::new();
    let sharing = location_sharing(&store, clock(), *ALICE);

    sharing.send_static_location(48.85, 2.29, None, true).await.unwrap();

    let locations = store.static_locations(&DEFAULT_TEST_ROOM_ID);
    assert_eq!(locations.len(), 1);

    let (sender, content) = &locations[0];
    assert_eq!(sender.as_str(), ALICE.as_str());
    assert!(content.is_user_location);
    assert_eq!(content.ts, ts(T0));

    // Static locations have nothing to do with live location shares.
    assert!(sharing.running_live_location_shares().await.unwrap().is_empty());
}
