//! Socket transport for the virtual-device command channel.
//!
//! The device side binds a Unix stream socket at a well-known
//! filesystem path and consumes scripted commands from it
//! ([`CommandListener`]); the driver side connects, writes one command,
//! and closes ([`CommandInjector`]). The channel is write-only from the
//! driver's perspective: no replies, and rapid connect/write/close
//! sequences are expected.
//!
//! # Example
//!
//! ```no_run
//! use dactyl_channel::{ChannelConfig, CommandInjector, CommandListener};
//! use dactyl_core::Finger;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ChannelConfig::new("/tmp/virtual-device.socket");
//!
//! // Device side
//! let (listener, mut commands) = CommandListener::bind(&config)?;
//! let cancel = CancellationToken::new();
//! tokio::spawn(listener.run(cancel.clone()));
//!
//! // Driver side
//! let injector = CommandInjector::new(&config);
//! injector.add(Finger::LeftLittle, "testuser", true).await?;
//!
//! let command = commands.next().await;
//! println!("scripted: {:?}", command);
//! # Ok(())
//! # }
//! ```

mod injector;
mod listener;

pub use injector::CommandInjector;
pub use listener::{CommandListener, CommandStream};

use std::path::{Path, PathBuf};

use thiserror::Error;

use dactyl_core::constants::ENV_VIRTUAL_DEVICE;

/// Errors that can occur on the command channel transport.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The socket path environment variable is not set.
    #[error("no command socket configured: {0} is not set")]
    Unconfigured(&'static str),

    /// Failed to bind the listening socket.
    #[error("failed to bind command socket at {path}: {source}")]
    Bind {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to connect to the device's socket.
    #[error("failed to connect to command socket at {path}: {source}")]
    Connect {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Protocol-level error from the command codec.
    #[error("protocol error: {0}")]
    Protocol(#[from] dactyl_core::Error),

    /// Low-level I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Location of the command channel socket.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Filesystem path of the Unix stream socket.
    pub socket_path: PathBuf,
}

impl ChannelConfig {
    /// Configuration for an explicit socket path.
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
        }
    }

    /// Configuration from the `DACTYL_VIRTUAL_DEVICE` environment
    /// variable.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Unconfigured`] when the variable is not
    /// set; callers that treat the virtual device as optional can map
    /// this to their skip path.
    pub fn from_env() -> Result<Self, ChannelError> {
        let path = std::env::var_os(ENV_VIRTUAL_DEVICE)
            .ok_or(ChannelError::Unconfigured(ENV_VIRTUAL_DEVICE))?;
        Ok(Self::new(PathBuf::from(path)))
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }
}
