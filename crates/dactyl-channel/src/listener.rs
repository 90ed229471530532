//! Device-side command socket listener.
//!
//! Accepts connections at the configured path and drains each one to
//! EOF before accepting the next, so queued commands reach the device
//! in the order their connections were made. A connection carrying an
//! unknown or ill-formed command is failed on the spot; the listener
//! itself keeps running.

use std::path::PathBuf;

use futures::StreamExt;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use dactyl_protocol::{CommandCodec, SimCommand};

use crate::{ChannelConfig, ChannelError};

/// Receiving side of the command channel, owned by the device backend.
///
/// Commands arrive in connection order. [`CommandStream::try_next`]
/// drains opportunistically without waiting; [`CommandStream::next`]
/// suspends until a command arrives or the listener goes away.
#[derive(Debug)]
pub struct CommandStream {
    rx: mpsc::UnboundedReceiver<SimCommand>,
}

impl CommandStream {
    /// Wait for the next queued command.
    ///
    /// Returns `None` once the listener has shut down and the queue is
    /// drained.
    pub async fn next(&mut self) -> Option<SimCommand> {
        self.rx.recv().await
    }

    /// Take a queued command without waiting.
    pub fn try_next(&mut self) -> Option<SimCommand> {
        self.rx.try_recv().ok()
    }
}

/// Listening end of the command channel socket.
pub struct CommandListener {
    listener: UnixListener,
    path: PathBuf,
    tx: mpsc::UnboundedSender<SimCommand>,
}

impl CommandListener {
    /// Bind the command socket at the configured path.
    ///
    /// A stale socket file from a previous instance is removed first;
    /// the device owns its well-known address.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Bind`] if the socket cannot be created.
    pub fn bind(config: &ChannelConfig) -> Result<(Self, CommandStream), ChannelError> {
        let path = config.socket_path.clone();

        if path.exists() {
            std::fs::remove_file(&path).map_err(|source| ChannelError::Bind {
                path: path.clone(),
                source,
            })?;
        }

        let listener = UnixListener::bind(&path).map_err(|source| ChannelError::Bind {
            path: path.clone(),
            source,
        })?;

        info!(path = %path.display(), "command channel listening");

        let (tx, rx) = mpsc::unbounded_channel();
        Ok((Self { listener, path, tx }, CommandStream { rx }))
    }

    /// Accept and drain connections until cancelled.
    ///
    /// Intended to be spawned; the token is the device's shutdown
    /// signal. The socket file is removed on the way out.
    pub async fn run(self, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,

                accepted = self.listener.accept() => {
                    let stream = match accepted {
                        Ok((stream, _addr)) => stream,
                        Err(e) => {
                            warn!(error = %e, "failed to accept command connection");
                            continue;
                        }
                    };

                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        drained = self.drain_connection(stream) => {
                            if drained.is_err() {
                                // Receiver dropped: the device is gone.
                                break;
                            }
                        }
                    }
                }
            }
        }

        if let Err(e) = std::fs::remove_file(&self.path) {
            debug!(path = %self.path.display(), error = %e, "could not remove socket file");
        }
        info!(path = %self.path.display(), "command channel closed");
    }

    /// Read one connection to EOF, forwarding each parsed command.
    ///
    /// A protocol error fails this connection only. Returns `Err` when
    /// the command stream receiver has been dropped.
    async fn drain_connection(&self, stream: UnixStream) -> Result<(), ()> {
        let mut framed = FramedRead::new(stream, CommandCodec::new());

        while let Some(result) = framed.next().await {
            match result {
                Ok(command) => {
                    debug!(%command, "queued scripted command");
                    if self.tx.send(command).is_err() {
                        return Err(());
                    }
                }
                Err(e) => {
                    warn!(error = %e, "failing command connection");
                    break;
                }
            }
        }

        Ok(())
    }
}
