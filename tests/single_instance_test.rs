//! 单实例握手（Unix domain socket）。
#![cfg(unix)]

use std::time::Duration;

use clipboard_saver::instance::{InstanceCoordinator, InstanceEvent, InstanceScope};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn first_wins_second_notifies() {
    let dir = tempfile::tempdir().expect("tempdir");
    let scope = InstanceScope::new("saver-it-user-1");

    let mut primary = InstanceCoordinator::with_runtime_dir(scope.clone(), dir.path());
    let mut events = primary.subscribe();
    assert!(primary.try_acquire_or_notify().await);

    for _ in 0..2 {
        let mut secondary = InstanceCoordinator::with_runtime_dir(scope.clone(), dir.path());
        assert!(!secondary.try_acquire_or_notify().await);

        let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .expect("event in time")
            .expect("channel open");
        assert_eq!(event, InstanceEvent::SecondInstanceLaunched);
    }

    primary.dispose().await;

    let mut successor = InstanceCoordinator::with_runtime_dir(scope, dir.path());
    assert!(successor.try_acquire_or_notify().await);
    successor.dispose().await;
}

#[tokio::test]
async fn different_scopes_do_not_collide() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut alice = InstanceCoordinator::with_runtime_dir(InstanceScope::new("app-alice-1"), dir.path());
    let mut bob = InstanceCoordinator::with_runtime_dir(InstanceScope::new("app-bob-1"), dir.path());

    assert!(alice.try_acquire_or_notify().await);
    assert!(bob.try_acquire_or_notify().await);

    alice.dispose().await;
    bob.dispose().await;
}
