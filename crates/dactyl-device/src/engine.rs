//! The asynchronous operation engine.
//!
//! Every biometric operation shares one shape: a `*_start` call checks
//! the session guards, claims the device's single pending-operation
//! slot, and returns an [`OperationHandle`] immediately; the work runs
//! as a task on the harness-owned runtime and the completion is
//! delivered through the handle exactly once, on success, failure,
//! and cancellation alike. The synchronous convenience forms
//! (`enroll`, `verify`, ...) start an operation and await only their
//! own handle, so they can never consume a completion belonging to
//! other pending work.
//!
//! Verify and identify surface [`Error::Retry`] when the consumed scan
//! was a scripted transient failure; resubmission is the caller's
//! obligation, observable as call → `Retry` → call again. The
//! enrolled-count query behind `list_prints` retries internally
//! instead: its empty replies are a backend quirk the caller never
//! sees unless the bounded attempts run out.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use dactyl_core::constants::COUNT_QUERY_ATTEMPTS;
use dactyl_core::{DeviceCaps, Error, Finger, FingerStatus, Print, Result, RetryCause};

use crate::device::{Device, Shared};
use crate::events::{Polled, ScanEvent, SimEvent};
use crate::oracle::match_gallery;

/// Quality signal reported for simulated capture stages.
const SIMULATED_SCAN_QUALITY: u8 = 100;

/// Kind of the operation occupying the device's pending slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Enroll,
    Verify,
    Identify,
    List,
    Delete,
    Clear,
}

impl OperationKind {
    /// Name used in logs and error messages.
    pub fn name(self) -> &'static str {
        match self {
            OperationKind::Enroll => "enroll",
            OperationKind::Verify => "verify",
            OperationKind::Identify => "identify",
            OperationKind::List => "list-prints",
            OperationKind::Delete => "delete-print",
            OperationKind::Clear => "clear-storage",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Progress reported while an enrollment is pending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrollProgress {
    /// A capture stage completed.
    Stage { stage: u32, quality: u8 },
    /// A scan could not be used; the enrollment keeps waiting for
    /// another one.
    Retry { cause: RetryCause },
}

/// Sink for enrollment progress events.
pub type ProgressSink = mpsc::UnboundedSender<EnrollProgress>;

/// Create a progress sink and its receiving end.
pub fn progress_channel() -> (ProgressSink, mpsc::UnboundedReceiver<EnrollProgress>) {
    mpsc::unbounded_channel()
}

/// Outcome of a verify operation.
///
/// `print` is `Some` exactly when `matched` is true, and compares
/// equal to the probe.
#[derive(Debug, Clone)]
pub struct VerifyResult {
    pub matched: bool,
    pub print: Option<Print>,
}

/// Outcome of a successful identify operation.
#[derive(Debug, Clone)]
pub struct IdentifyResult {
    /// The gallery entry the scan matched.
    pub matched_entry: Print,
    /// The probe that was submitted.
    pub probe: Print,
}

/// Handle on one in-flight operation.
///
/// Completion is delivered exactly once through [`OperationHandle::wait`].
/// Cancellation is cooperative: [`OperationHandle::cancel`] is observed
/// at the operation's next suspension point, after which `wait` yields
/// [`Error::Cancelled`] with the device's finger status already reset.
#[derive(Debug)]
pub struct OperationHandle<T> {
    id: Uuid,
    cancel: CancellationToken,
    rx: oneshot::Receiver<Result<T>>,
}

impl<T> OperationHandle<T> {
    /// Identifier of this operation, as it appears in logs.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Request cooperative cancellation.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Await this operation's completion.
    pub async fn wait(self) -> Result<T> {
        match self.rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(Error::transport(
                "operation ended without delivering a completion",
            )),
        }
    }
}

impl Device {
    /// Start an enrollment for `template`'s finger and user.
    ///
    /// Progress is reported through `progress` while the operation is
    /// pending: one event per capture stage, plus one per recoverable
    /// scan failure. Completion yields the fully populated print.
    pub fn enroll_start(
        &self,
        template: Print,
        progress: Option<ProgressSink>,
    ) -> Result<OperationHandle<Print>> {
        self.start(
            OperationKind::Enroll,
            DeviceCaps::empty(),
            FingerStatus::Needed,
            move |shared, cancel| run_enroll(shared, cancel, template, progress),
        )
    }

    /// Enroll and wait for the completed print.
    pub async fn enroll(&self, template: Print) -> Result<Print> {
        self.enroll_start(template, None)?.wait().await
    }

    /// Start verifying `probe` against the next scan.
    ///
    /// The completion carries `(matched, matched_print)`. A scripted
    /// transient failure surfaces as [`Error::Retry`]: resubmit the
    /// same probe.
    pub fn verify_start(&self, probe: Print) -> Result<OperationHandle<VerifyResult>> {
        self.start(
            OperationKind::Verify,
            DeviceCaps::VERIFY,
            FingerStatus::Needed,
            move |shared, cancel| run_verify(shared, cancel, probe),
        )
    }

    /// Verify and wait for the result.
    pub async fn verify(&self, probe: Print) -> Result<VerifyResult> {
        self.verify_start(probe)?.wait().await
    }

    /// Start identifying `probe` against an ordered gallery.
    ///
    /// Completion yields the matched gallery entry together with the
    /// probe; [`Error::NoMatch`] if no entry matched, [`Error::Retry`]
    /// under the same obligation as verify. The matching oracle is
    /// consulted once per submission.
    pub fn identify_start(
        &self,
        probe: Print,
        gallery: Vec<Print>,
    ) -> Result<OperationHandle<IdentifyResult>> {
        self.start(
            OperationKind::Identify,
            DeviceCaps::IDENTIFY,
            FingerStatus::Needed,
            move |shared, cancel| run_identify(shared, cancel, probe, gallery),
        )
    }

    /// Identify and wait for the result.
    pub async fn identify(&self, probe: Print, gallery: Vec<Print>) -> Result<IdentifyResult> {
        self.identify_start(probe, gallery)?.wait().await
    }

    /// Start listing the stored prints in insertion order.
    pub fn list_prints_start(&self) -> Result<OperationHandle<Vec<Print>>> {
        self.start(
            OperationKind::List,
            DeviceCaps::STORAGE | DeviceCaps::STORAGE_LIST,
            FingerStatus::None,
            |shared, _cancel| run_list(shared),
        )
    }

    /// List stored prints and wait for the result.
    pub async fn list_prints(&self) -> Result<Vec<Print>> {
        self.list_prints_start()?.wait().await
    }

    /// Start deleting the stored print matching `print`.
    pub fn delete_print_start(&self, print: Print) -> Result<OperationHandle<()>> {
        self.start(
            OperationKind::Delete,
            DeviceCaps::STORAGE | DeviceCaps::STORAGE_DELETE,
            FingerStatus::None,
            move |shared, _cancel| run_delete(shared, print),
        )
    }

    /// Delete a stored print and wait for completion.
    pub async fn delete_print(&self, print: Print) -> Result<()> {
        self.delete_print_start(print)?.wait().await
    }

    /// Start clearing the storage table.
    pub fn clear_storage_start(&self) -> Result<OperationHandle<()>> {
        self.start(
            OperationKind::Clear,
            DeviceCaps::STORAGE | DeviceCaps::STORAGE_CLEAR,
            FingerStatus::None,
            |shared, _cancel| run_clear(shared),
        )
    }

    /// Clear the storage table and wait for completion.
    pub async fn clear_storage(&self) -> Result<()> {
        self.clear_storage_start()?.wait().await
    }

    /// Claim the pending slot and spawn the operation task.
    ///
    /// The guards run synchronously, so a second start observes `Busy`
    /// even before the first task has been polled. The spawned task
    /// clears the slot and resets the finger status before sending the
    /// completion, on every outcome path.
    fn start<T, F, Fut>(
        &self,
        kind: OperationKind,
        required: DeviceCaps,
        finger: FingerStatus,
        run: F,
    ) -> Result<OperationHandle<T>>
    where
        T: Send + 'static,
        F: FnOnce(Arc<Shared>, CancellationToken) -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        self.begin(kind, required, finger)?;

        let shared = Arc::clone(&self.shared);
        let cancel = CancellationToken::new();
        let (tx, rx) = oneshot::channel();
        let id = Uuid::new_v4();

        debug!(operation = %kind, %id, "operation started");
        let fut = run(Arc::clone(&shared), cancel.clone());
        tokio::spawn(async move {
            let outcome = fut.await;
            match &outcome {
                Ok(_) => debug!(operation = %kind, %id, "operation completed"),
                Err(e) => debug!(operation = %kind, %id, error = %e, "operation failed"),
            }

            {
                let mut state = shared.state();
                state.pending = None;
                state.finger_status = FingerStatus::None;
            }
            let _ = tx.send(outcome);
        });

        Ok(OperationHandle { id, cancel, rx })
    }

    fn begin(&self, kind: OperationKind, required: DeviceCaps, finger: FingerStatus) -> Result<()> {
        let mut state = self.shared.state();
        if !state.open {
            return Err(Error::NotOpen);
        }
        if !self.shared.caps.contains(required) {
            return Err(Error::Unsupported(kind.name()));
        }
        if state.pending.is_some() {
            return Err(Error::Busy);
        }
        state.pending = Some(kind);
        state.finger_status = finger;
        Ok(())
    }
}

/// Consume the next simulated input, FIFO.
///
/// A queued command wins; with the queue empty the most recently
/// consumed scan is replayed; a device that has never consumed one
/// waits here, which is also where cancellation is observed.
async fn next_event(shared: &Shared, cancel: &CancellationToken) -> Result<SimEvent> {
    let mut guard = shared.events.lock().await;
    let source = guard.as_mut().ok_or(Error::NotOpen)?;

    match source.poll_event() {
        Polled::Ready(event) => {
            shared.state().finger_status = FingerStatus::Present;
            Ok(event)
        }
        Polled::MustWait => {
            tokio::select! {
                _ = cancel.cancelled() => Err(Error::Cancelled),
                event = source.wait_event() => match event {
                    Some(event) => {
                        shared.state().finger_status = FingerStatus::Present;
                        Ok(event)
                    }
                    None => Err(Error::transport(
                        "command channel closed while waiting for a scan",
                    )),
                },
            }
        }
    }
}

async fn run_enroll(
    shared: Arc<Shared>,
    cancel: CancellationToken,
    template: Print,
    progress: Option<ProgressSink>,
) -> Result<Print> {
    loop {
        match next_event(&shared, &cancel).await? {
            SimEvent::Retry(cause) => {
                debug!(%cause, "scan not usable, waiting for another");
                if let Some(sink) = &progress {
                    let _ = sink.send(EnrollProgress::Retry { cause });
                }
                shared.state().finger_status = FingerStatus::Needed;
            }
            SimEvent::Scan(scan) => {
                if scan.finger != template.finger() || scan.username != template.username() {
                    return Err(Error::enroll_failed(format!(
                        "no pending scan for finger '{}' and user '{}'",
                        template.finger(),
                        template.username(),
                    )));
                }

                for stage in 0..shared.enroll_stages {
                    if let Some(sink) = &progress {
                        let _ = sink.send(EnrollProgress::Stage {
                            stage,
                            quality: SIMULATED_SCAN_QUALITY,
                        });
                    }
                }

                let description = if template.description().is_empty() {
                    format!(
                        "Fingerprint finger '{}' for user '{}'",
                        scan.finger, scan.username
                    )
                } else {
                    template.description().to_string()
                };

                let device_stored = shared.caps.contains(DeviceCaps::STORAGE);
                let print = Print::builder(shared.driver.as_str())
                    .finger(scan.finger)
                    .username(scan.username.clone())
                    .description(description)
                    .device_stored(device_stored)
                    .template(template_payload(&scan)?)
                    .build()?;

                if device_stored {
                    shared.state().storage.insert(print.clone());
                }

                info!(finger = %print.finger(), user = %print.username(), "enrollment complete");
                return Ok(print);
            }
        }
    }
}

async fn run_verify(
    shared: Arc<Shared>,
    cancel: CancellationToken,
    probe: Print,
) -> Result<VerifyResult> {
    match next_event(&shared, &cancel).await? {
        SimEvent::Retry(cause) => Err(Error::Retry(cause)),
        SimEvent::Scan(scan) => {
            debug!(
                finger = %scan.finger,
                user = %scan.username,
                matched = scan.matched,
                "verify decision"
            );
            if scan.matched {
                Ok(VerifyResult {
                    matched: true,
                    print: Some(probe),
                })
            } else {
                Ok(VerifyResult {
                    matched: false,
                    print: None,
                })
            }
        }
    }
}

async fn run_identify(
    shared: Arc<Shared>,
    cancel: CancellationToken,
    probe: Print,
    gallery: Vec<Print>,
) -> Result<IdentifyResult> {
    match next_event(&shared, &cancel).await? {
        SimEvent::Retry(cause) => Err(Error::Retry(cause)),
        SimEvent::Scan(scan) => match match_gallery(&scan, &gallery) {
            Some(index) => {
                info!(finger = %scan.finger, user = %scan.username, "identified");
                Ok(IdentifyResult {
                    matched_entry: gallery[index].clone(),
                    probe,
                })
            }
            None => Err(Error::NoMatch),
        },
    }
}

async fn run_list(shared: Arc<Shared>) -> Result<Vec<Print>> {
    for attempt in 1..=COUNT_QUERY_ATTEMPTS {
        let count = query_enrolled_count(&shared);
        match count {
            Some(count) => {
                debug!(count, "listing stored prints");
                return Ok(shared.state().storage.list());
            }
            None => warn!(attempt, "enrolled-count query returned an empty payload"),
        }
    }

    Err(Error::transport(format!(
        "enrolled-count query empty after {COUNT_QUERY_ATTEMPTS} attempts"
    )))
}

/// One enrolled-count query against the backend.
///
/// `None` models the known transient fault where the reply payload is
/// empty.
fn query_enrolled_count(shared: &Shared) -> Option<usize> {
    let mut state = shared.state();
    if state.empty_count_replies > 0 {
        state.empty_count_replies -= 1;
        return None;
    }
    Some(state.storage.len())
}

async fn run_delete(shared: Arc<Shared>, print: Print) -> Result<()> {
    let removed = shared.state().storage.remove(&print)?;
    debug!(finger = %removed.finger(), user = %removed.username(), "deleted print");
    Ok(())
}

async fn run_clear(shared: Arc<Shared>) -> Result<()> {
    shared.state().storage.clear();
    debug!("storage cleared");
    Ok(())
}

/// Template payload captured by a simulated scan.
///
/// Deterministic over the scan's attribution and outcome, so two
/// enrollments from identical scripted events produce equal prints.
fn template_payload(scan: &ScanEvent) -> Result<Vec<u8>> {
    #[derive(Serialize)]
    struct Payload<'a> {
        finger: Finger,
        username: &'a str,
        outcome: bool,
    }

    serde_json::to_vec(&Payload {
        finger: scan.finger,
        username: &scan.username,
        outcome: scan.matched,
    })
    .map_err(|e| Error::malformed(format!("could not encode template payload: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_kind_display() {
        assert_eq!(OperationKind::Enroll.to_string(), "enroll");
        assert_eq!(OperationKind::List.to_string(), "list-prints");
        assert_eq!(OperationKind::Clear.to_string(), "clear-storage");
    }

    #[test]
    fn test_template_payload_is_deterministic() {
        let scan = ScanEvent {
            finger: Finger::LeftLittle,
            username: "testuser".into(),
            matched: true,
        };
        assert_eq!(
            template_payload(&scan).unwrap(),
            template_payload(&scan.clone()).unwrap()
        );

        let other = ScanEvent {
            finger: Finger::LeftLittle,
            username: "testuser".into(),
            matched: false,
        };
        assert_ne!(
            template_payload(&scan).unwrap(),
            template_payload(&other).unwrap()
        );
    }

    #[test]
    fn test_progress_channel_delivers_in_order() {
        let (sink, mut rx) = progress_channel();
        sink.send(EnrollProgress::Retry {
            cause: RetryCause::TooShort,
        })
        .unwrap();
        sink.send(EnrollProgress::Stage {
            stage: 0,
            quality: SIMULATED_SCAN_QUALITY,
        })
        .unwrap();

        assert_eq!(
            rx.try_recv().unwrap(),
            EnrollProgress::Retry {
                cause: RetryCause::TooShort
            }
        );
        assert!(matches!(
            rx.try_recv().unwrap(),
            EnrollProgress::Stage { stage: 0, .. }
        ));
    }
}
