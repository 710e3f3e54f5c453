use std::io::{Read, Write};

use super::codes::{require_ok, NO_FINGER, NO_MATCH_IN_LIBRARY, OK, TEMPLATES_DO_NOT_MATCH};
use super::CommandChannel;
use crate::error::{Result, SensorError, TransportError};

/// Which of the device's two volatile char buffers an instruction
/// addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharBuffer {
    One,
    Two,
}

impl CharBuffer {
    fn wire(self) -> u8 {
        match self {
            CharBuffer::One => 1,
            CharBuffer::Two => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchResult {
    pub id: u16,
    pub score: u16,
}

/// The 16-byte system parameter block read once at handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SysParams {
    pub status: u16,
    pub system_id: u16,
    pub capacity: u16,
    pub security_level: u16,
    pub address: u32,
    pub data_package_length: u16,
    pub baud: u32,
}

fn expect_len(payload: &[u8], expected: usize) -> Result<()> {
    if payload.len() != expected {
        return Err(TransportError::UnexpectedLength {
            expected,
            actual: payload.len(),
        }
        .into());
    }
    Ok(())
}

impl<S: Read + Write> CommandChannel<S> {
    /// `0x01` — capture the current finger image into the image buffer.
    /// `true` on success, `false` on the benign "no finger" code.
    pub fn get_image(&mut self) -> Result<bool> {
        let reply = self.call(vec![0x01])?;
        expect_len(&reply.payload, 1)?;
        match reply.payload[0] {
            OK => Ok(true),
            NO_FINGER => {
                tracing::warn!("no finger present");
                Ok(false)
            }
            code => Err(SensorError::from_confirmation_code(code).into()),
        }
    }

    /// `0x02` — derive a feature vector from the image buffer into
    /// `buf`.
    pub fn image_to_tz(&mut self, buf: CharBuffer) -> Result<()> {
        let reply = self.call(vec![0x02, buf.wire()])?;
        expect_len(&reply.payload, 1)?;
        require_ok(reply.payload[0])
    }

    /// `0x03` — match buffer 1 against buffer 2. Returns the match
    /// score, or `-1` on the benign "templates do not match" code.
    pub fn match_buffers(&mut self) -> Result<i32> {
        let reply = self.call(vec![0x03])?;
        expect_len(&reply.payload, 3)?;
        match reply.payload[0] {
            OK => Ok(u16::from_be_bytes([reply.payload[1], reply.payload[2]]) as i32),
            TEMPLATES_DO_NOT_MATCH => {
                tracing::warn!("templates do not match");
                Ok(-1)
            }
            code => Err(SensorError::from_confirmation_code(code).into()),
        }
    }

    /// `0x04` — search the library for a match to `buf` over
    /// `start..start+count`. `None` on the benign "no match" code.
    pub fn search(&mut self, buf: CharBuffer, start: u16, count: u16) -> Result<Option<SearchResult>> {
        let mut payload = vec![0x04, buf.wire()];
        payload.extend_from_slice(&start.to_be_bytes());
        payload.extend_from_slice(&count.to_be_bytes());
        let reply = self.call(payload)?;
        expect_len(&reply.payload, 5)?;
        match reply.payload[0] {
            OK => Ok(Some(SearchResult {
                id: u16::from_be_bytes([reply.payload[1], reply.payload[2]]),
                score: u16::from_be_bytes([reply.payload[3], reply.payload[4]]),
            })),
            NO_MATCH_IN_LIBRARY => {
                tracing::warn!("no match found in library");
                Ok(None)
            }
            code => Err(SensorError::from_confirmation_code(code).into()),
        }
    }

    /// `0x05` — combine buffers 1 and 2 into a single model in buffer 2.
    pub fn create_model(&mut self) -> Result<()> {
        let reply = self.call(vec![0x05])?;
        expect_len(&reply.payload, 1)?;
        require_ok(reply.payload[0])
    }

    /// `0x06` — write `buf` into library slot `slot`.
    pub fn store(&mut self, buf: CharBuffer, slot: u16) -> Result<()> {
        let mut payload = vec![0x06, buf.wire()];
        payload.extend_from_slice(&slot.to_be_bytes());
        let reply = self.call(payload)?;
        expect_len(&reply.payload, 1)?;
        require_ok(reply.payload[0])
    }

    /// `0x07` — load library slot `slot` into `buf`.
    pub fn load_char(&mut self, buf: CharBuffer, slot: u16) -> Result<()> {
        let mut payload = vec![0x07, buf.wire()];
        payload.extend_from_slice(&slot.to_be_bytes());
        let reply = self.call(payload)?;
        expect_len(&reply.payload, 1)?;
        require_ok(reply.payload[0])
    }

    /// `0x08` — acknowledge a char-buffer download; the caller streams
    /// the Data/EndData packets via `transport_mut()` (see
    /// `crate::datastream`).
    pub fn begin_download_char(&mut self, buf: CharBuffer) -> Result<()> {
        let reply = self.call(vec![0x08, buf.wire()])?;
        expect_len(&reply.payload, 1)?;
        require_ok(reply.payload[0])
    }

    /// `0x09` — acknowledge a char-buffer upload; the caller streams
    /// the Data/EndData packets via `transport_mut()`.
    pub fn begin_upload_char(&mut self, buf: CharBuffer) -> Result<()> {
        let reply = self.call(vec![0x09, buf.wire()])?;
        expect_len(&reply.payload, 1)?;
        require_ok(reply.payload[0])
    }

    /// `0x0A` — acknowledge an image download.
    pub fn begin_download_image(&mut self) -> Result<()> {
        let reply = self.call(vec![0x0A])?;
        expect_len(&reply.payload, 1)?;
        require_ok(reply.payload[0])
    }

    /// `0x0B` — acknowledge an image upload.
    pub fn begin_upload_image(&mut self) -> Result<()> {
        let reply = self.call(vec![0x0B])?;
        expect_len(&reply.payload, 1)?;
        require_ok(reply.payload[0])
    }

    /// `0x0C` — delete `count` slots starting at `slot`.
    pub fn delete_char(&mut self, slot: u16, count: u16) -> Result<()> {
        let mut payload = vec![0x0C];
        payload.extend_from_slice(&slot.to_be_bytes());
        payload.extend_from_slice(&count.to_be_bytes());
        let reply = self.call(payload)?;
        expect_len(&reply.payload, 1)?;
        require_ok(reply.payload[0])
    }

    /// `0x0D` — clear the entire library.
    pub fn empty_library(&mut self) -> Result<()> {
        let reply = self.call(vec![0x0D])?;
        expect_len(&reply.payload, 1)?;
        require_ok(reply.payload[0])
    }

    /// `0x0F` — read the 16-byte system parameter block.
    pub fn read_sys_param(&mut self) -> Result<SysParams> {
        let reply = self.call(vec![0x0F])?;
        expect_len(&reply.payload, 17)?;
        require_ok(reply.payload[0])?;
        let p = &reply.payload[1..];
        Ok(SysParams {
            status: u16::from_be_bytes([p[0], p[1]]),
            system_id: u16::from_be_bytes([p[2], p[3]]),
            capacity: u16::from_be_bytes([p[4], p[5]]),
            security_level: u16::from_be_bytes([p[6], p[7]]),
            address: u32::from_be_bytes([p[8], p[9], p[10], p[11]]),
            data_package_length: (32u32 << u16::from_be_bytes([p[12], p[13]])) as u16,
            baud: u16::from_be_bytes([p[14], p[15]]) as u32 * 9600,
        })
    }

    /// `0x13` — verify the handshake password (default `0x00000000`).
    pub fn verify_password(&mut self, password: u32) -> Result<()> {
        let reply = self.call([vec![0x13], password.to_be_bytes().to_vec()].concat())?;
        expect_len(&reply.payload, 1)?;
        require_ok(reply.payload[0])
    }

    /// `0x1D` — number of templates currently stored in the library.
    pub fn template_count(&mut self) -> Result<u16> {
        let reply = self.call(vec![0x1D])?;
        expect_len(&reply.payload, 3)?;
        require_ok(reply.payload[0])?;
        Ok(u16::from_be_bytes([reply.payload[1], reply.payload[2]]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{checksum, FramedTransport, PacketKind};
    use crate::test_support::FakeSensor;

    fn channel_with_reply(kind: PacketKind, payload: &[u8]) -> CommandChannel<FakeSensor> {
        let mut fake = FakeSensor::new();
        let mut frame = vec![0xEF, 0x01, 0xFF, 0xFF, 0xFF, 0xFF];
        frame.push(kind.to_wire());
        frame.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
        frame.extend_from_slice(payload);
        frame.extend_from_slice(&checksum(kind, payload).to_be_bytes());
        fake.queue_reply(&frame);
        let transport = FramedTransport::new(fake, 57_600, 0xFFFF_FFFF);
        CommandChannel::new(transport, 200)
    }

    #[test]
    fn verify_password_ok_on_correct_password() {
        let mut channel = channel_with_reply(PacketKind::Ack, &[0x00]);
        channel.verify_password(0).unwrap();
    }

    #[test]
    fn template_count_parses_two_byte_count() {
        let mut channel = channel_with_reply(PacketKind::Ack, &[0x00, 0x00, 0x03]);
        assert_eq!(channel.template_count().unwrap(), 3);
    }

    #[test]
    fn search_miss_returns_none() {
        let mut channel = channel_with_reply(PacketKind::Ack, &[0x09]);
        assert_eq!(channel.search(CharBuffer::One, 0, 200).unwrap(), None);
    }

    #[test]
    fn search_hit_returns_result() {
        let mut channel = channel_with_reply(PacketKind::Ack, &[0x00, 0x00, 0x07, 0x00, 0x78]);
        assert_eq!(
            channel.search(CharBuffer::One, 0, 200).unwrap(),
            Some(SearchResult { id: 7, score: 120 })
        );
    }

    #[test]
    fn match_mismatch_returns_negative_one() {
        let mut channel = channel_with_reply(PacketKind::Ack, &[0x08, 0x00, 0x00]);
        assert_eq!(channel.match_buffers().unwrap(), -1);
    }

    #[test]
    fn get_image_no_finger_is_false_not_error() {
        let mut channel = channel_with_reply(PacketKind::Ack, &[0x02]);
        assert_eq!(channel.get_image().unwrap(), false);
    }

    #[test]
    fn get_image_other_error_propagates() {
        let mut channel = channel_with_reply(PacketKind::Ack, &[0x03]);
        let err = channel.get_image().unwrap_err();
        assert!(matches!(
            err,
            crate::error::DriverError::Sensor(SensorError::ImageCaptureFailed)
        ));
    }

    #[test]
    fn wrong_reply_length_is_transport_error() {
        let mut channel = channel_with_reply(PacketKind::Ack, &[0x00, 0x00]);
        let err = channel.get_image().unwrap_err();
        assert!(matches!(
            err,
            crate::error::DriverError::Transport(TransportError::UnexpectedLength { .. })
        ));
    }

    #[test]
    fn non_ack_reply_is_transport_error() {
        let mut channel = channel_with_reply(PacketKind::Data, &[0x00]);
        let err = channel.get_image().unwrap_err();
        assert!(matches!(
            err,
            crate::error::DriverError::Transport(TransportError::UnexpectedPacketKind { .. })
        ));
    }
}
