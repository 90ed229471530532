//! Simulated scan events and their consumption discipline.
//!
//! Commands queued on the channel become events here. Consumption is
//! strictly FIFO, one event per operation that needs simulated input,
//! and the most recently consumed scan is remembered: an operation
//! that finds the queue empty reuses it instead of waiting, which is
//! how a print enrolled from one `ADD` keeps matching on later
//! verifies without new socket traffic.

use dactyl_core::{Finger, RetryCause};
use dactyl_protocol::{MatchOutcome, SimCommand};

use dactyl_channel::CommandStream;

/// A consumed scan attributed to a finger and user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanEvent {
    pub finger: Finger,
    pub username: String,
    /// Binary decision this scan carries for matching.
    pub matched: bool,
}

/// One simulated input consumed by an operation.
#[derive(Debug, Clone)]
pub(crate) enum SimEvent {
    /// A usable scan.
    Scan(ScanEvent),
    /// A transient failure; the scan must be repeated.
    Retry(RetryCause),
}

impl From<SimCommand> for SimEvent {
    fn from(command: SimCommand) -> Self {
        match command {
            SimCommand::Add {
                finger,
                username,
                outcome,
            } => SimEvent::Scan(ScanEvent {
                finger,
                username,
                matched: outcome == MatchOutcome::Match,
            }),
            SimCommand::Retry { cause } => SimEvent::Retry(cause),
        }
    }
}

/// What an event poll produced.
pub(crate) enum Polled {
    /// An event was available without waiting.
    Ready(SimEvent),
    /// Nothing queued and nothing consumed before; the caller must
    /// wait on the stream.
    MustWait,
}

/// FIFO event source fed by the command listener.
///
/// Present only while the device is open.
pub(crate) struct EventSource {
    stream: CommandStream,
    last_scan: Option<ScanEvent>,
}

impl EventSource {
    pub(crate) fn new(stream: CommandStream) -> Self {
        Self {
            stream,
            last_scan: None,
        }
    }

    /// Take a queued event, or replay the most recently consumed scan.
    pub(crate) fn poll_event(&mut self) -> Polled {
        if let Some(command) = self.stream.try_next() {
            return Polled::Ready(self.consume(command.into()));
        }
        match &self.last_scan {
            Some(scan) => Polled::Ready(SimEvent::Scan(scan.clone())),
            None => Polled::MustWait,
        }
    }

    /// Wait for the next command to arrive.
    ///
    /// Returns `None` when the listener has gone away.
    pub(crate) async fn wait_event(&mut self) -> Option<SimEvent> {
        let command = self.stream.next().await?;
        Some(self.consume(command.into()))
    }

    fn consume(&mut self, event: SimEvent) -> SimEvent {
        if let SimEvent::Scan(scan) = &event {
            self.last_scan = Some(scan.clone());
        }
        event
    }
}
