/// Multi-packet download (device→host) and upload (host→device) of
/// images and templates, layered on top of the command channel's
/// already-consumed initial Ack.
use std::io::{Read, Write};

use crate::commands::{CharBuffer, CommandChannel};
use crate::error::{Result, TransportError};
use crate::image::{pack, unpack, PixelImage};
use crate::protocol::{Packet, PacketKind};

/// Concatenate Data packet payloads in arrival order, stopping at the
/// first EndData. The loop's termination check starts against the
/// Ack already consumed by the caller's `begin_*` call, so the first
/// iteration always reads the stream's first packet without needing a
/// preceding type check on that Ack — matching the device's own
/// model-download behavior.
fn read_stream<S: Read + Write>(channel: &mut CommandChannel<S>) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let timeout = channel.timeout_ms();
    let mut last_kind = PacketKind::Ack;

    while last_kind != PacketKind::EndData {
        let packet = channel
            .transport_mut()
            .read(timeout)
            .ok_or(TransportError::Timeout)?;
        match packet.kind {
            PacketKind::Data | PacketKind::EndData => {
                buf.extend_from_slice(&packet.payload);
                last_kind = packet.kind;
            }
            other => {
                return Err(TransportError::UnexpectedPacketKind {
                    expected: PacketKind::Data,
                    actual: other,
                }
                .into())
            }
        }
    }

    // Any packet the device emits after EndData while we're still
    // listening is a straggler, not part of this stream.
    let _ = channel.transport_mut().read(1);

    Ok(buf)
}

fn write_stream<S: Read + Write>(
    channel: &mut CommandChannel<S>,
    chunk_size: usize,
    data: &[u8],
) -> Result<()> {
    if data.is_empty() {
        channel
            .transport_mut()
            .write(&Packet::new(PacketKind::EndData, Vec::new()))?;
        return Ok(());
    }

    let mut offset = 0;
    while offset < data.len() {
        let end = (offset + chunk_size).min(data.len());
        let is_last = end == data.len();
        let kind = if is_last {
            PacketKind::EndData
        } else {
            PacketKind::Data
        };
        channel
            .transport_mut()
            .write(&Packet::new(kind, data[offset..end].to_vec()))?;
        offset = end;
    }
    Ok(())
}

/// `DownloadChar` (`0x08`): acknowledge, then stream the template out
/// of `buf`.
pub fn download_char<S: Read + Write>(
    channel: &mut CommandChannel<S>,
    buf: CharBuffer,
) -> Result<Vec<u8>> {
    channel.begin_download_char(buf)?;
    read_stream(channel)
}

/// `UploadChar` (`0x09`): acknowledge, then stream `data` into `buf` in
/// `data_package_length`-sized packets.
pub fn upload_char<S: Read + Write>(
    channel: &mut CommandChannel<S>,
    buf: CharBuffer,
    data_package_length: usize,
    data: &[u8],
) -> Result<()> {
    channel.begin_upload_char(buf)?;
    write_stream(channel, data_package_length, data)
}

/// `DownloadImage` (`0x0A`): acknowledge, stream the packed image, then
/// unpack it into a [`PixelImage`].
pub fn download_image<S: Read + Write>(channel: &mut CommandChannel<S>) -> Result<PixelImage> {
    channel.begin_download_image()?;
    let wire = read_stream(channel)?;
    Ok(unpack(&wire))
}

/// `UploadImage` (`0x0B`): acknowledge, pack `image`, then stream it.
pub fn upload_image<S: Read + Write>(
    channel: &mut CommandChannel<S>,
    data_package_length: usize,
    image: &PixelImage,
) -> Result<()> {
    channel.begin_upload_image()?;
    let wire = pack(image);
    write_stream(channel, data_package_length, &wire)
}

/// Upload a template to buffer 2 and read it straight back, reporting
/// success iff the echoed content equals the input. Doubles latency by
/// design — kept for bit-exact compatibility with the sensor's own
/// `uploadModel` behavior.
pub fn upload_model_with_verify<S: Read + Write>(
    channel: &mut CommandChannel<S>,
    data_package_length: usize,
    data: &[u8],
) -> Result<bool> {
    upload_char(channel, CharBuffer::Two, data_package_length, data)?;
    let echoed = download_char(channel, CharBuffer::Two)?;
    Ok(echoed == data)
}
