//! Framing of console commands for `tokio-util` sinks.

use std::io;

use bytes::BytesMut;
use sqbridge_core::Command;
use sqbridge_core::command::COMMAND_LEN;
use tokio_util::codec::Encoder;

/// Writes each [`Command`] as its raw 8 bytes. Commands are self-delimiting.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandCodec;

impl Encoder<Command> for CommandCodec {
    type Error = io::Error;

    fn encode(&mut self, item: Command, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(COMMAND_LEN);
        dst.extend_from_slice(item.as_bytes());
        Ok(())
    }
}
