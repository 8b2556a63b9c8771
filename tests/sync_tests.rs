use std::time::Duration;

use wisp::sync::SyncCenter;

#[tokio::test(start_paused = true)]
async fn wait_blocks_until_signal() {
    let center = SyncCenter::new();
    let peer = center.clone();
    let waiter = tokio::spawn(async move { peer.wait("door", None).await });

    // Let the waiter register, then release it.
    tokio::time::sleep(Duration::from_millis(50)).await;
    center.signal("door");

    let elapsed = waiter.await.expect("waiter finished");
    assert!(elapsed >= Duration::from_millis(50));
}

#[tokio::test(start_paused = true)]
async fn timeout_returns_elapsed_normally() {
    let center = SyncCenter::new();
    let elapsed = center.wait("nobody", Some(Duration::from_millis(100))).await;
    // A timeout is a normal early continuation with the full wait elapsed.
    assert!(elapsed >= Duration::from_millis(100));
    assert!(elapsed < Duration::from_millis(200));
}

#[tokio::test(start_paused = true)]
async fn one_signal_releases_all_waiters() {
    let center = SyncCenter::new();
    let a = {
        let c = center.clone();
        tokio::spawn(async move { c.wait("gate", None).await })
    };
    let b = {
        let c = center.clone();
        tokio::spawn(async move { c.wait("gate", None).await })
    };

    tokio::time::sleep(Duration::from_millis(10)).await;
    center.signal("gate");

    a.await.expect("first waiter released");
    b.await.expect("second waiter released");
}

#[tokio::test(start_paused = true)]
async fn signal_before_wait_is_lost() {
    let center = SyncCenter::new();
    // No sticky signals: this one falls on the floor.
    center.signal("early");
    let elapsed = center.wait("early", Some(Duration::from_millis(50))).await;
    assert!(elapsed >= Duration::from_millis(50), "wait must not return early");
}

#[tokio::test(start_paused = true)]
async fn empty_name_is_a_no_op() {
    let center = SyncCenter::new();
    let elapsed = center.wait("", Some(Duration::from_millis(500))).await;
    assert_eq!(elapsed, Duration::ZERO);
    center.signal("");
}

#[tokio::test(start_paused = true)]
async fn names_are_independent() {
    let center = SyncCenter::new();
    let peer = center.clone();
    let waiter = tokio::spawn(async move { peer.wait("a", Some(Duration::from_millis(80))).await });

    tokio::time::sleep(Duration::from_millis(10)).await;
    // Signalling a different name must not release the waiter; it times
    // out at its own deadline instead.
    center.signal("b");
    let elapsed = waiter.await.expect("waiter finished");
    assert!(elapsed >= Duration::from_millis(80));
}
