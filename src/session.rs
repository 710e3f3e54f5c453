/// Open/close lifecycle: serial port setup, handshake (password verify
/// + parameter read), and the session parameters that come out of it.
use std::io::{Read, Write};

use crate::commands::{CommandChannel, SysParams};
use crate::config::DriverConfig;
use crate::error::{DriverError, Result, SensorError};

/// Module address assumed before a successful handshake reports the
/// sensor's real one.
pub const DEFAULT_ADDRESS: u32 = 0xFFFF_FFFF;

/// An opened, handshaken connection to one sensor: a command channel
/// plus the parameters read during handshake. Immutable for the
/// lifetime of the session.
#[derive(Debug)]
pub struct Session<S> {
    pub channel: CommandChannel<S>,
    pub params: SysParams,
}

impl<S: Read + Write> Session<S> {
    /// Run the handshake over an already-open stream: `VerifyPassword`,
    /// then `ReadSysParam` to learn (among other things) the module's
    /// real address, which is then applied to the transport's prolog.
    /// Any failure here is folded into a single `HandshakeFailed` error
    /// — the caller is responsible for closing the underlying port.
    pub fn handshake(stream: S, config: &DriverConfig) -> Result<Self> {
        let transport =
            crate::protocol::FramedTransport::new(stream, config.baud, DEFAULT_ADDRESS);
        let mut channel = CommandChannel::new(transport, config.default_timeout_ms);

        channel
            .verify_password(config.password)
            .map_err(handshake_failed)?;
        let params = channel.read_sys_param().map_err(handshake_failed)?;
        channel.set_address(params.address);

        tracing::info!(
            address = %format!("{:#010X}", params.address),
            capacity = params.capacity,
            baud = config.baud,
            "handshake complete"
        );

        Ok(Self { channel, params })
    }

    /// Idempotent in the sense that dropping a `Session` (or calling
    /// this redundantly) never panics or re-raises; any teardown error
    /// from the underlying stream is swallowed, matching the sensor's
    /// own close semantics.
    pub fn close(self) {
        tracing::info!("session closed");
        drop(self);
    }
}

/// Fold any handshake-stage failure into a single `HandshakeFailed`
/// error; a failed handshake always raises through this path rather
/// than leaking the underlying transport/command error directly.
fn handshake_failed(err: DriverError) -> DriverError {
    tracing::error!(error = %err, "handshake failed");
    DriverError::Sensor(SensorError::HandshakeFailed(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{checksum, PacketKind};
    use crate::test_support::FakeSensor;

    fn frame(kind: PacketKind, payload: &[u8]) -> Vec<u8> {
        let mut out = vec![0xEF, 0x01, 0xFF, 0xFF, 0xFF, 0xFF];
        out.push(kind.to_wire());
        out.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
        out.extend_from_slice(payload);
        out.extend_from_slice(&checksum(kind, payload).to_be_bytes());
        out
    }

    fn sys_param_payload(address: u32) -> Vec<u8> {
        let mut p = vec![0x00]; // confirmation OK
        p.extend_from_slice(&0u16.to_be_bytes()); // status
        p.extend_from_slice(&0u16.to_be_bytes()); // system id
        p.extend_from_slice(&200u16.to_be_bytes()); // capacity
        p.extend_from_slice(&0u16.to_be_bytes()); // security level
        p.extend_from_slice(&address.to_be_bytes()); // address
        p.extend_from_slice(&1u16.to_be_bytes()); // pkt value -> 64 bytes
        p.extend_from_slice(&6u16.to_be_bytes()); // baud control -> 57600
        p
    }

    #[test]
    fn successful_handshake_caches_params_and_rekeys_address() {
        let mut fake = FakeSensor::new();
        fake.queue_reply(&frame(PacketKind::Ack, &[0x00]));
        fake.queue_reply(&frame(PacketKind::Ack, &sys_param_payload(0x1234_5678)));

        let config = DriverConfig::new("fake");
        let session = Session::handshake(fake, &config).unwrap();

        assert_eq!(session.params.capacity, 200);
        assert_eq!(session.params.data_package_length, 64);
        assert_eq!(session.params.address, 0x1234_5678);
    }

    #[test]
    fn wrong_password_is_handshake_failure() {
        let mut fake = FakeSensor::new();
        fake.queue_reply(&frame(PacketKind::Ack, &[0x13])); // incorrect password
        let config = DriverConfig::new("fake");
        let err = Session::handshake(fake, &config).unwrap_err();
        assert!(matches!(
            err,
            DriverError::Sensor(SensorError::HandshakeFailed(_))
        ));
    }
}
