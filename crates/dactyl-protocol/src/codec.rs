//! Tokio codec for control-channel framing.
//!
//! Commands are newline-delimited UTF-8 lines, but the channel is
//! fire-and-forget: a writer may send its last command and close the
//! connection without a terminator, so the codec also yields the final
//! unterminated line when the stream ends ([`Decoder::decode_eof`]).
//!
//! Oversized lines and invalid UTF-8 are protocol errors; they fail
//! the connection they arrived on, never the listener.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use dactyl_core::constants::MAX_COMMAND_LINE;
use dactyl_core::{Error, Result};

use crate::command::SimCommand;

/// Codec turning a byte stream into [`SimCommand`]s and back.
///
/// # Examples
///
/// ```
/// use futures::StreamExt;
/// use tokio_util::codec::FramedRead;
/// use dactyl_protocol::{CommandCodec, SimCommand};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let wire = &b"ADD left-little testuser 1\nRETRY general"[..];
/// let mut framed = FramedRead::new(wire, CommandCodec::new());
///
/// let first = framed.next().await.unwrap().unwrap();
/// assert!(matches!(first, SimCommand::Add { .. }));
///
/// // No trailing newline on the last command: still decoded at EOF.
/// let last = framed.next().await.unwrap().unwrap();
/// assert!(matches!(last, SimCommand::Retry { .. }));
/// # }
/// ```
#[derive(Debug)]
pub struct CommandCodec {
    /// Maximum accepted line length in bytes.
    max_line: usize,
}

impl CommandCodec {
    /// Create a codec with the default line limit.
    pub fn new() -> Self {
        Self {
            max_line: MAX_COMMAND_LINE,
        }
    }

    /// Create a codec with a custom line limit.
    pub fn with_max_line(max_line: usize) -> Self {
        Self { max_line }
    }

    fn parse_frame(&self, frame: &[u8]) -> Result<Option<SimCommand>> {
        let line = std::str::from_utf8(frame)
            .map_err(|_| Error::protocol("command line is not valid UTF-8"))?;

        // Blank lines carry no command.
        if line.trim().is_empty() {
            return Ok(None);
        }

        SimCommand::parse(line).map(Some)
    }
}

impl Default for CommandCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for CommandCodec {
    type Item = SimCommand;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<SimCommand>> {
        loop {
            let Some(pos) = src.iter().position(|&b| b == b'\n') else {
                if src.len() > self.max_line {
                    return Err(Error::protocol(format!(
                        "command line exceeds {} bytes",
                        self.max_line
                    )));
                }
                return Ok(None);
            };

            if pos > self.max_line {
                return Err(Error::protocol(format!(
                    "command line exceeds {} bytes",
                    self.max_line
                )));
            }

            let frame = src.split_to(pos + 1);
            if let Some(command) = self.parse_frame(&frame[..pos])? {
                return Ok(Some(command));
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<SimCommand>> {
        if let Some(command) = self.decode(src)? {
            return Ok(Some(command));
        }
        if src.is_empty() {
            return Ok(None);
        }
        if src.len() > self.max_line {
            return Err(Error::protocol(format!(
                "command line exceeds {} bytes",
                self.max_line
            )));
        }

        let frame = src.split();
        self.parse_frame(&frame)
    }
}

impl Encoder<SimCommand> for CommandCodec {
    type Error = Error;

    fn encode(&mut self, command: SimCommand, dst: &mut BytesMut) -> Result<()> {
        let line = command.to_string();
        dst.reserve(line.len() + 1);
        dst.put_slice(line.as_bytes());
        dst.put_u8(b'\n');
        Ok(())
    }
}
