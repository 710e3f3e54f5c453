use std::io::{Read, Write};
use std::time::{Duration, Instant};

use super::packet::{checksum, HEADER_HI, HEADER_LO};
use super::reader::ByteReader;
use super::{Packet, PacketKind};
use crate::error::{Result, TransportError};

/// Serializes/deserializes a single packet over a `Read + Write` byte
/// stream, synchronizing to the packet prolog on every read.
#[derive(Debug)]
pub struct FramedTransport<S> {
    reader: ByteReader<S>,
    address: u32,
}

impl<S: Read + Write> FramedTransport<S> {
    pub fn new(stream: S, baud: u32, address: u32) -> Self {
        Self {
            reader: ByteReader::new(stream, baud),
            address,
        }
    }

    /// Update the module address used to build the prolog. Called once,
    /// after a successful handshake reports the sensor's real address
    /// (the driver starts out assuming the broadcast address).
    pub fn set_address(&mut self, address: u32) {
        self.address = address;
    }

    /// Emit prolog, type, big-endian length, payload, big-endian
    /// checksum. The only failure mode is the underlying write failing.
    pub fn write(&mut self, packet: &Packet) -> Result<()> {
        let mut frame = Vec::with_capacity(6 + 3 + packet.payload.len() + 2);
        frame.push(HEADER_HI);
        frame.push(HEADER_LO);
        frame.extend_from_slice(&self.address.to_be_bytes());
        frame.push(packet.kind.to_wire());
        let length = (packet.payload.len() + 2) as u16;
        frame.extend_from_slice(&length.to_be_bytes());
        frame.extend_from_slice(&packet.payload);
        let cksum = checksum(packet.kind, &packet.payload);
        frame.extend_from_slice(&cksum.to_be_bytes());

        self.reader.stream_mut().write_all(&frame).map_err(|e| {
            tracing::error!(error = %e, "packet write failed");
            TransportError::Io(e)
        })?;
        tracing::trace!(kind = ?packet.kind, length, "wrote packet");
        Ok(())
    }

    /// Synchronize to the prolog, then parse and checksum-validate a
    /// packet. Returns `None` (rather than an error) on any of: prolog
    /// never found before the deadline, a metadata/payload/checksum
    /// read timing out, `length < 2`, or a checksum mismatch. Callers
    /// treat `None` as a transport error.
    pub fn read(&mut self, timeout_ms: u64) -> Option<Packet> {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);

        self.synchronize(deadline)?;

        let meta = self.read_n_before(3, deadline)?;
        let kind = PacketKind::from_wire(meta[0])?;
        let length = u16::from_be_bytes([meta[1], meta[2]]) as usize;
        if length < 2 {
            return None;
        }

        let tail = self.read_n_before(length, deadline)?;
        let payload_len = length - 2;
        let payload = &tail[..payload_len];
        let received_cksum = u16::from_be_bytes([tail[payload_len], tail[payload_len + 1]]);

        if checksum(kind, payload) != received_cksum {
            tracing::warn!(?kind, "checksum mismatch, dropping packet");
            return None;
        }

        tracing::trace!(?kind, length = payload_len, "read packet");
        Some(Packet::new(kind, payload.to_vec()))
    }

    /// Direct access to the underlying stream, e.g. so a caller that
    /// already owns the transport can inspect what's been written.
    pub(crate) fn stream_mut(&mut self) -> &mut S {
        self.reader.stream_mut()
    }

    /// Slide a match index across the incoming stream looking for
    /// `prolog`. On any mismatch the index resets to 0 with no
    /// re-examination of earlier bytes — safe because `HEADER_HI` is
    /// distinctive and the driver never starts a read while unread data
    /// remains on the wire.
    fn synchronize(&mut self, deadline: Instant) -> Option<()> {
        let mut prolog = [0u8; 6];
        prolog[0] = HEADER_HI;
        prolog[1] = HEADER_LO;
        prolog[2..6].copy_from_slice(&self.address.to_be_bytes());

        let mut matched = 0usize;
        while matched < prolog.len() {
            let byte = self.read_byte_before(deadline)?;
            if byte == prolog[matched] {
                matched += 1;
            } else {
                matched = 0;
            }
        }
        Some(())
    }

    fn read_byte_before(&mut self, deadline: Instant) -> Option<u8> {
        let remaining = deadline.checked_duration_since(Instant::now())?;
        self.reader.read_byte(remaining.as_millis() as u64)
    }

    fn read_n_before(&mut self, count: usize, deadline: Instant) -> Option<Vec<u8>> {
        let remaining = deadline.checked_duration_since(Instant::now())?;
        self.reader.read_n(count, remaining.as_millis() as u64)
    }
}
