//! Driver-side command injection.
//!
//! Mirrors what a test driver does by hand: connect to the device's
//! socket, write one command, close. Every command uses a fresh
//! connection and no reply is ever read.

use std::path::PathBuf;

use futures::SinkExt;
use tokio::net::UnixStream;
use tokio_util::codec::FramedWrite;
use tracing::debug;

use dactyl_core::{Finger, RetryCause};
use dactyl_protocol::{CommandCodec, MatchOutcome, SimCommand};

use crate::{ChannelConfig, ChannelError};

/// Writes scripted commands to a running virtual device.
///
/// # Example
///
/// ```no_run
/// use dactyl_channel::{ChannelConfig, CommandInjector};
/// use dactyl_core::{Finger, RetryCause};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let injector = CommandInjector::new(&ChannelConfig::new("/tmp/virtual-device.socket"));
///
/// // The next two scans: one unusable swipe, then a match for testuser.
/// injector.retry(RetryCause::TooShort).await?;
/// injector.add(Finger::RightThumb, "testuser", true).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct CommandInjector {
    path: PathBuf,
}

impl CommandInjector {
    /// Injector for the given channel configuration.
    pub fn new(config: &ChannelConfig) -> Self {
        Self {
            path: config.socket_path.clone(),
        }
    }

    /// Injector configured from `DACTYL_VIRTUAL_DEVICE`.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Unconfigured`] when the variable is not
    /// set.
    pub fn from_env() -> Result<Self, ChannelError> {
        Ok(Self::new(&ChannelConfig::from_env()?))
    }

    /// Send one command on a fresh connection and close it.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Connect`] if the device socket is not
    /// there, or an I/O error if the write fails.
    pub async fn send(&self, command: SimCommand) -> Result<(), ChannelError> {
        let stream = UnixStream::connect(&self.path)
            .await
            .map_err(|source| ChannelError::Connect {
                path: self.path.clone(),
                source,
            })?;

        let mut framed = FramedWrite::new(stream, CommandCodec::new());
        framed.send(command.clone()).await?;
        framed.close().await?;

        debug!(%command, "injected command");
        Ok(())
    }

    /// Queue a scan event: `ADD <finger> <username> <0|1>`.
    pub async fn add(
        &self,
        finger: Finger,
        username: impl Into<String>,
        matched: bool,
    ) -> Result<(), ChannelError> {
        let outcome = if matched {
            MatchOutcome::Match
        } else {
            MatchOutcome::NoMatch
        };
        self.send(SimCommand::Add {
            finger,
            username: username.into(),
            outcome,
        })
        .await
    }

    /// Queue a transient scan failure: `RETRY <cause>`.
    pub async fn retry(&self, cause: RetryCause) -> Result<(), ChannelError> {
        self.send(SimCommand::Retry { cause }).await
    }
}
