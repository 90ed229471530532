//! Command channel protocol for the virtual biometric device.
//!
//! A driver scripts a running virtual device by writing line-oriented
//! UTF-8 commands to its control socket. This crate defines the
//! enumerated command set ([`SimCommand`]) and the tokio codec
//! ([`CommandCodec`]) that frames it on a byte stream.
//!
//! The channel is fire-and-forget: the writer connects, sends, and
//! closes without waiting for a reply, and a trailing newline is not
//! required on the final command of a connection.

pub mod codec;
pub mod command;

pub use codec::CommandCodec;
pub use command::{MatchOutcome, SimCommand};
