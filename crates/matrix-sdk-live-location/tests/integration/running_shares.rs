use std::time::Duration;

use assert_matches2::assert_let;
use futures_util::{StreamExt as _, pin_mut};
use matrix_sdk_live_location::MemoryStore;
use matrix_sdk_live_location_test::{ALICE, BOB};
use stream_assert::assert_pending;
use tokio::time::{Instant, advance};

use crate::{T0, clock, location_sharing, ts};

#[tokio::test(start_paused = true)]
async fn test_share_leaves_the_view_at_its_deadline() {
    let store = MemoryStore::new();
    let sharing = location_sharing(&store, clock(), *ALICE);

    sharing.start_live_location_share(15_000).await.unwrap();
    assert_eq!(sharing.running_live_location_shares().await.unwrap().len(), 1);

    advance(Duration::from_millis(15_001)).await;
    assert!(sharing.running_live_location_shares().await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_subscription_with_several_users() {
    let store = MemoryStore::new();
    let clock = clock();
    let alice = location_sharing(&store, clock, *ALICE);
    let bob = location_sharing(&store, clock, *BOB);

    let start = Instant::now();
    let stream = alice.subscribe_to_running_live_location_shares();
    pin_mut!(stream);

    assert_let!(Some(shares) = stream.next().await);
    assert!(shares.is_empty());

    let alice_share = alice.start_live_location_share(60_000).await.unwrap();
    assert_let!(Some(shares) = stream.next().await);
    assert_eq!(shares.len(), 1);

    bob.start_live_location_share(10_000).await.unwrap();
    assert_let!(Some(shares) = stream.next().await);
    assert_eq!(shares.len(), 2);
    assert_eq!(shares[0].user_id(), *ALICE);
    assert_eq!(shares[1].user_id(), *BOB);

    alice.send_live_location(alice_share.clone(), 48.85, 2.29, None).await.unwrap();
    assert_let!(Some(shares) = stream.next().await);
    assert_let!(Some(location) = &shares[0].last_location);
    assert_eq!(location.content.beacon_info_event_id, alice_share);
    assert_eq!(location.ts(), ts(T0));
    assert!(shares[1].last_location.is_none());

    assert_pending!(stream);

    // Bob's share expires on its own.
    assert_let!(Some(shares) = stream.next().await);
    assert_eq!(start.elapsed(), Duration::from_millis(10_000));
    assert_eq!(shares.len(), 1);
    assert_eq!(shares[0].user_id(), *ALICE);
    assert!(shares[0].last_location.is_some());

    alice.stop_live_location_share().await.unwrap();
    assert_let!(Some(shares) = stream.next().await);
    assert!(shares.is_empty());

    // Nothing is running anymore, even much later.
    advance(Duration::from_secs(120)).await;
    assert_pending!(stream);
}

#[tokio::test(start_paused = true)]
async fn test_restart_after_expiry() {
    let store = MemoryStore::new();
    let sharing = location_sharing(&store, clock(), *ALICE);

    let stream = sharing.subscribe_to_running_live_location_shares();
    pin_mut!(stream);
    assert_let!(Some(_) = stream.next().await);

    sharing.start_live_location_share(1_000).await.unwrap();
    assert_let!(Some(shares) = stream.next().await);
    assert_eq!(shares.len(), 1);

    assert_let!(Some(shares) = stream.next().await);
    assert!(shares.is_empty());

    let event_id = sharing.start_live_location_share(1_000).await.unwrap();
    assert_let!(Some(shares) = stream.next().await);
    assert_eq!(shares.len(), 1);
    assert_eq!(shares[0].beacon_info.event_id, event_id);
    assert_eq!(shares[0].deadline(), ts(T0 + 2_000));
}
