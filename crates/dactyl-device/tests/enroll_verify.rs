//! Scripted enroll and verify flows against the plain virtual device:
//! match decisions, the caller-owned retry contract, progress
//! reporting, cancellation, and the single-pending-operation guard.

mod common;

use common::{harness, open_plain, open_storage, settle, template};

use dactyl_core::{Error, Finger, FingerStatus, RetryCause};
use dactyl_device::{EnrollProgress, progress_channel};

#[tokio::test]
async fn enroll_then_verify_match() {
    let h = harness();
    let mut device = open_plain(&h).await;

    h.injector
        .add(Finger::LeftLittle, "testuser", true)
        .await
        .unwrap();

    let enrolled = device
        .enroll(template(&device, Finger::LeftLittle, "testuser"))
        .await
        .unwrap();
    assert_eq!(enrolled.finger(), Finger::LeftLittle);
    assert_eq!(enrolled.username(), "testuser");
    assert!(enrolled.has_template());
    assert!(!enrolled.is_device_stored());
    assert_eq!(device.finger_status(), FingerStatus::None);

    // No new event queued: the decision replays the enrollment scan.
    let result = device.verify(enrolled.clone()).await.unwrap();
    assert!(result.matched);
    assert!(result.print.unwrap().equal(&enrolled));
    assert_eq!(device.finger_status(), FingerStatus::None);

    device.close().await.unwrap();
}

#[tokio::test]
async fn enroll_then_verify_no_match() {
    let h = harness();
    let mut device = open_plain(&h).await;

    h.injector
        .add(Finger::LeftRing, "testuser", false)
        .await
        .unwrap();

    let enrolled = device
        .enroll(template(&device, Finger::LeftRing, "testuser"))
        .await
        .unwrap();

    let result = device.verify(enrolled).await.unwrap();
    assert!(!result.matched);
    assert!(result.print.is_none());
    assert_eq!(device.finger_status(), FingerStatus::None);

    device.close().await.unwrap();
}

#[tokio::test]
async fn enroll_fails_on_mismatched_attribution() {
    let h = harness();
    let mut device = open_plain(&h).await;

    h.injector
        .add(Finger::RightThumb, "someone-else", true)
        .await
        .unwrap();

    let outcome = device
        .enroll(template(&device, Finger::LeftThumb, "testuser"))
        .await;
    assert!(matches!(outcome, Err(Error::EnrollFailed(_))));
    assert_eq!(device.finger_status(), FingerStatus::None);

    device.close().await.unwrap();
}

#[tokio::test]
async fn enroll_reports_retries_and_stages() {
    let h = harness();
    let mut device = open_plain(&h).await;

    h.injector.retry(RetryCause::TooShort).await.unwrap();
    h.injector
        .add(Finger::RightIndex, "testuser", true)
        .await
        .unwrap();

    let (sink, mut progress) = progress_channel();
    let handle = device
        .enroll_start(template(&device, Finger::RightIndex, "testuser"), Some(sink))
        .unwrap();
    let enrolled = handle.wait().await.unwrap();
    assert!(enrolled.has_template());

    // The unusable scan is reported first, then one event per stage.
    assert_eq!(
        progress.recv().await.unwrap(),
        EnrollProgress::Retry {
            cause: RetryCause::TooShort
        }
    );
    for expected in 0..device.enroll_stages() {
        match progress.recv().await.unwrap() {
            EnrollProgress::Stage { stage, .. } => assert_eq!(stage, expected),
            other => panic!("unexpected progress event: {other:?}"),
        }
    }

    device.close().await.unwrap();
}

#[tokio::test]
async fn verify_retry_contract_terminates() {
    let h = harness();
    let mut device = open_plain(&h).await;

    h.injector
        .add(Finger::LeftIndex, "testuser", true)
        .await
        .unwrap();
    let enrolled = device
        .enroll(template(&device, Finger::LeftIndex, "testuser"))
        .await
        .unwrap();

    h.injector.retry(RetryCause::General).await.unwrap();
    h.injector.retry(RetryCause::RemoveFinger).await.unwrap();
    settle().await;

    // Call -> Retry -> call again: the caller owns resubmission.
    let first = device.verify(enrolled.clone()).await;
    assert!(matches!(first, Err(Error::Retry(RetryCause::General))));
    assert_eq!(device.finger_status(), FingerStatus::None);

    let second = device.verify(enrolled.clone()).await;
    assert!(matches!(second, Err(Error::Retry(RetryCause::RemoveFinger))));

    // Queue drained: the replayed enrollment scan settles it.
    let third = device.verify(enrolled).await.unwrap();
    assert!(third.matched);

    device.close().await.unwrap();
}

#[tokio::test]
async fn queued_events_win_over_replay() {
    let h = harness();
    let mut device = open_plain(&h).await;

    h.injector
        .add(Finger::LeftThumb, "alice", true)
        .await
        .unwrap();
    let enrolled = device
        .enroll(template(&device, Finger::LeftThumb, "alice"))
        .await
        .unwrap();

    // A freshly queued non-match takes precedence over the remembered
    // matching scan.
    h.injector.add(Finger::LeftThumb, "alice", false).await.unwrap();
    settle().await;

    let result = device.verify(enrolled.clone()).await.unwrap();
    assert!(!result.matched);

    // Now the non-match is the most recently consumed scan.
    let replayed = device.verify(enrolled).await.unwrap();
    assert!(!replayed.matched);

    device.close().await.unwrap();
}

#[tokio::test]
async fn second_start_is_busy_for_every_kind() {
    let h = harness();
    let mut device = open_storage(&h).await;

    let probe = template(&device, Finger::LeftThumb, "alice");
    let pending = device.enroll_start(probe.clone(), None).unwrap();

    assert!(matches!(
        device.enroll_start(probe.clone(), None),
        Err(Error::Busy)
    ));
    assert!(matches!(device.verify_start(probe.clone()), Err(Error::Busy)));
    assert!(matches!(
        device.identify_start(probe.clone(), vec![probe.clone()]),
        Err(Error::Busy)
    ));
    assert!(matches!(device.list_prints_start(), Err(Error::Busy)));
    assert!(matches!(
        device.delete_print_start(probe.clone()),
        Err(Error::Busy)
    ));
    assert!(matches!(device.clear_storage_start(), Err(Error::Busy)));

    pending.cancel();
    assert!(matches!(pending.wait().await, Err(Error::Cancelled)));

    // Guard is set synchronously, before the task first runs.
    let list = device.list_prints_start().unwrap();
    assert!(matches!(device.verify_start(probe), Err(Error::Busy)));
    list.wait().await.unwrap();

    device.close().await.unwrap();
}

#[tokio::test]
async fn cancellation_resets_status_and_completes_once() {
    let h = harness();
    let mut device = open_plain(&h).await;

    let handle = device
        .verify_start(template(&device, Finger::LeftThumb, "alice"))
        .unwrap();

    // Let the operation reach its suspension point.
    settle().await;
    assert_eq!(device.finger_status(), FingerStatus::Needed);

    handle.cancel();
    assert!(matches!(handle.wait().await, Err(Error::Cancelled)));
    assert_eq!(device.finger_status(), FingerStatus::None);

    device.close().await.unwrap();
}

#[tokio::test]
async fn waiting_operation_picks_up_late_event() {
    let h = harness();
    let mut device = open_plain(&h).await;

    let handle = device
        .verify_start(template(&device, Finger::RightLittle, "testuser"))
        .unwrap();
    settle().await;
    assert_eq!(device.finger_status(), FingerStatus::Needed);

    // The scan arrives only after the operation started waiting.
    h.injector
        .add(Finger::RightLittle, "testuser", true)
        .await
        .unwrap();

    let result = handle.wait().await.unwrap();
    assert!(result.matched);
    assert_eq!(device.finger_status(), FingerStatus::None);

    device.close().await.unwrap();
}

#[tokio::test]
async fn fifo_consumption_one_event_per_operation() {
    let h = harness();
    let mut device = open_plain(&h).await;

    h.injector
        .add(Finger::LeftMiddle, "testuser", true)
        .await
        .unwrap();
    let enrolled = device
        .enroll(template(&device, Finger::LeftMiddle, "testuser"))
        .await
        .unwrap();

    h.injector.add(Finger::LeftMiddle, "testuser", true).await.unwrap();
    h.injector.add(Finger::LeftMiddle, "testuser", false).await.unwrap();
    settle().await;

    // Each verify consumes exactly one queued event, oldest first.
    assert!(device.verify(enrolled.clone()).await.unwrap().matched);
    assert!(!device.verify(enrolled).await.unwrap().matched);

    device.close().await.unwrap();
}
