/// One primitive per sensor instruction: a single Command packet
/// followed by exactly one Ack packet whose first payload byte is a
/// confirmation code.
mod codes;
mod ops;

pub use ops::{CharBuffer, SearchResult, SysParams};

use std::io::{Read, Write};

use crate::error::{Result, TransportError};
use crate::protocol::{FramedTransport, Packet, PacketKind};

/// Wraps a framed transport with the per-call timeout every command
/// uses, and the shared "send Command, read exactly one Ack" plumbing.
#[derive(Debug)]
pub struct CommandChannel<S> {
    transport: FramedTransport<S>,
    timeout_ms: u64,
}

impl<S: Read + Write> CommandChannel<S> {
    pub fn new(transport: FramedTransport<S>, timeout_ms: u64) -> Self {
        Self {
            transport,
            timeout_ms,
        }
    }

    pub fn set_timeout_ms(&mut self, timeout_ms: u64) {
        self.timeout_ms = timeout_ms;
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    /// Update the module address used by the underlying transport once
    /// the real address is known (see `FramedTransport::set_address`).
    pub fn set_address(&mut self, address: u32) {
        self.transport.set_address(address);
    }

    /// Send a Command packet with the given payload and read back
    /// exactly one Ack packet. Anything else — wrong packet kind, or no
    /// reply before the deadline — is a `TransportError`.
    fn call(&mut self, payload: Vec<u8>) -> Result<Packet> {
        let opcode = payload.first().copied();
        self.transport
            .write(&Packet::new(PacketKind::Command, payload))?;
        let reply = self.transport.read(self.timeout_ms).ok_or_else(|| {
            tracing::error!(?opcode, "timed out waiting for reply");
            TransportError::Timeout
        })?;
        if reply.kind != PacketKind::Ack {
            return Err(TransportError::UnexpectedPacketKind {
                expected: PacketKind::Ack,
                actual: reply.kind,
            }
            .into());
        }
        tracing::debug!(?opcode, confirmation = ?reply.confirmation_code(), "command round-trip");
        Ok(reply)
    }

    /// Borrow the underlying transport, e.g. to read raw Data/EndData
    /// packets in the data-stream layer after a command's Ack.
    pub(crate) fn transport_mut(&mut self) -> &mut FramedTransport<S> {
        &mut self.transport
    }
}

#[cfg(test)]
impl<S: Read + Write> CommandChannel<S> {
    pub(crate) fn stream_mut(&mut self) -> &mut S {
        self.transport.stream_mut()
    }
}
