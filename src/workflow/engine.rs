/// Composite procedures built on top of the command layer and the
/// data-stream layer: finger-presence polling, enrol/search/match, and
/// the non-interactive upload-based variants. None of these functions
/// hold the session mutex themselves — that's `sensor.rs`'s job; each
/// call here runs against an already-exclusive `CommandChannel`.
use std::io::{Read, Write};
use std::thread;
use std::time::Duration;

use crate::commands::{CharBuffer, CommandChannel, SearchResult};
use crate::datastream;
use crate::error::{Result, SensorError};
use crate::image::PixelImage;

use super::listener::HumanActionListener;

/// The two raw scans and the combined feature vector from a data-
/// returning enrol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrollBundle {
    pub scan1: PixelImage,
    pub scan2: PixelImage,
    pub features: Vec<u8>,
}

/// Poll `GetImage` until a finger is present, checking `cancelled`
/// before every attempt.
pub fn wait_for_fingerprint<S: Read + Write>(
    channel: &mut CommandChannel<S>,
    cancelled: &dyn Fn() -> bool,
) -> Result<()> {
    loop {
        if cancelled() {
            return Err(SensorError::Cancelled.into());
        }
        if channel.get_image()? {
            return Ok(());
        }
    }
}

/// Poll `GetImage` until the finger is lifted, checking `cancelled`
/// before every attempt.
pub fn wait_for_finger_removed<S: Read + Write>(
    channel: &mut CommandChannel<S>,
    cancelled: &dyn Fn() -> bool,
) -> Result<()> {
    loop {
        if cancelled() {
            return Err(SensorError::Cancelled.into());
        }
        if !channel.get_image()? {
            return Ok(());
        }
    }
}

/// `enroll(slot, listener)`: two capture rounds combined into a single
/// model and stored in `slot`. Sleeps `default_timeout_ms` between the
/// first removal and the second put-finger callback iff
/// `settle_between_scans` — see `DriverConfig::settle_between_scans`.
pub fn enroll<S: Read + Write>(
    channel: &mut CommandChannel<S>,
    slot: u16,
    listener: &mut dyn HumanActionListener,
    settle_between_scans: bool,
    default_timeout_ms: u64,
    cancelled: &dyn Fn() -> bool,
) -> Result<()> {
    tracing::info!(slot, "starting enroll workflow");
    listener.put_finger();
    wait_for_fingerprint(channel, cancelled)?;
    channel.image_to_tz(CharBuffer::One)?;

    listener.remove_finger();
    wait_for_finger_removed(channel, cancelled)?;

    if settle_between_scans {
        thread::sleep(Duration::from_millis(default_timeout_ms));
    }

    listener.put_finger();
    wait_for_fingerprint(channel, cancelled)?;
    channel.image_to_tz(CharBuffer::Two)?;

    listener.remove_finger();
    wait_for_finger_removed(channel, cancelled)?;

    channel.create_model()?;
    channel.store(CharBuffer::Two, slot)?;
    tracing::info!(slot, "enroll workflow complete");
    Ok(())
}

/// Same shape as [`enroll`] but downloads each raw scan before deriving
/// its feature vector, and downloads the combined template afterwards.
/// Never sleeps between captures, regardless of
/// `settle_between_scans` — this asymmetry against `enroll` is
/// deliberate and must not be "fixed" to match.
pub fn enroll_with_data<S: Read + Write>(
    channel: &mut CommandChannel<S>,
    slot: u16,
    listener: &mut dyn HumanActionListener,
    cancelled: &dyn Fn() -> bool,
) -> Result<EnrollBundle> {
    tracing::info!(slot, "starting data-returning enroll workflow");
    listener.put_finger();
    wait_for_fingerprint(channel, cancelled)?;
    listener.wait_while_data_transferring();
    let scan1 = datastream::download_image(channel)?;
    channel.image_to_tz(CharBuffer::One)?;

    listener.remove_finger();
    wait_for_finger_removed(channel, cancelled)?;

    listener.put_finger();
    wait_for_fingerprint(channel, cancelled)?;
    listener.wait_while_data_transferring();
    let scan2 = datastream::download_image(channel)?;
    channel.image_to_tz(CharBuffer::Two)?;

    listener.remove_finger();
    wait_for_finger_removed(channel, cancelled)?;

    channel.create_model()?;
    channel.store(CharBuffer::Two, slot)?;
    let features = datastream::download_char(channel, CharBuffer::Two)?;

    Ok(EnrollBundle {
        scan1,
        scan2,
        features,
    })
}

/// Capture a finger and search the library over `0..capacity`.
pub fn search<S: Read + Write>(
    channel: &mut CommandChannel<S>,
    listener: &mut dyn HumanActionListener,
    capacity: u16,
    cancelled: &dyn Fn() -> bool,
) -> Result<Option<SearchResult>> {
    tracing::info!("starting search workflow");
    listener.put_finger();
    wait_for_fingerprint(channel, cancelled)?;
    channel.image_to_tz(CharBuffer::One)?;

    listener.remove_finger();
    wait_for_finger_removed(channel, cancelled)?;

    channel.search(CharBuffer::One, 0, capacity)
}

/// Load `slot` into buffer 1, capture a finger into buffer 2, and
/// match the two. Returns the match score, or `-1` on a benign
/// mismatch.
pub fn match_slot<S: Read + Write>(
    channel: &mut CommandChannel<S>,
    slot: u16,
    listener: &mut dyn HumanActionListener,
    cancelled: &dyn Fn() -> bool,
) -> Result<i32> {
    tracing::info!(slot, "starting match workflow");
    channel.load_char(CharBuffer::One, slot)?;

    listener.put_finger();
    wait_for_fingerprint(channel, cancelled)?;
    channel.image_to_tz(CharBuffer::Two)?;

    listener.remove_finger();
    wait_for_finger_removed(channel, cancelled)?;

    channel.match_buffers()
}

/// Capture a finger and download the raw image buffer. Unlike every
/// other interactive workflow, this one does not wait for the finger
/// to be lifted before issuing `DownloadImage` — the sensor's image
/// buffer already holds the capture once `GetImage` returned true, so
/// nothing downstream depends on the finger being gone yet.
pub fn capture_and_download_image<S: Read + Write>(
    channel: &mut CommandChannel<S>,
    listener: &mut dyn HumanActionListener,
    cancelled: &dyn Fn() -> bool,
) -> Result<PixelImage> {
    listener.put_finger();
    wait_for_fingerprint(channel, cancelled)?;
    listener.remove_finger();

    datastream::download_image(channel)
}

/// Upload a previously captured scan straight into the image buffer
/// and search the library with it, without ever touching the physical
/// sensor surface.
pub fn upload_and_search<S: Read + Write>(
    channel: &mut CommandChannel<S>,
    image: &PixelImage,
    data_package_length: usize,
    capacity: u16,
) -> Result<Option<SearchResult>> {
    datastream::upload_image(channel, data_package_length, image)?;
    channel.image_to_tz(CharBuffer::One)?;
    channel.search(CharBuffer::One, 0, capacity)
}

/// Enrol directly from a previously extracted feature vector, with no
/// sensor interaction beyond the upload itself.
pub fn enroll_from_template<S: Read + Write>(
    channel: &mut CommandChannel<S>,
    slot: u16,
    features: &[u8],
    data_package_length: usize,
) -> Result<()> {
    datastream::upload_char(channel, CharBuffer::Two, data_package_length, features)?;
    channel.store(CharBuffer::Two, slot)
}

/// Enrol directly from two previously captured raw scans, with no
/// sensor interaction beyond the two uploads.
pub fn enroll_from_scans<S: Read + Write>(
    channel: &mut CommandChannel<S>,
    slot: u16,
    scan1: &PixelImage,
    scan2: &PixelImage,
    data_package_length: usize,
    settle_between_scans: bool,
    default_timeout_ms: u64,
) -> Result<()> {
    datastream::upload_image(channel, data_package_length, scan1)?;
    channel.image_to_tz(CharBuffer::One)?;

    if settle_between_scans {
        thread::sleep(Duration::from_millis(default_timeout_ms));
    }

    datastream::upload_image(channel, data_package_length, scan2)?;
    channel.image_to_tz(CharBuffer::Two)?;

    channel.create_model()?;
    channel.store(CharBuffer::Two, slot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{checksum, FramedTransport, PacketKind};
    use crate::test_support::FakeSensor;
    use crate::workflow::listener::NullListener;

    fn frame(kind: PacketKind, payload: &[u8]) -> Vec<u8> {
        let mut out = vec![0xEF, 0x01, 0xFF, 0xFF, 0xFF, 0xFF];
        out.push(kind.to_wire());
        out.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
        out.extend_from_slice(payload);
        out.extend_from_slice(&checksum(kind, payload).to_be_bytes());
        out
    }

    fn ack(payload: &[u8]) -> Vec<u8> {
        frame(PacketKind::Ack, payload)
    }

    fn channel_with_frames(frames: &[Vec<u8>]) -> CommandChannel<FakeSensor> {
        let mut fake = FakeSensor::new();
        for f in frames {
            fake.queue_reply(f);
        }
        let transport = FramedTransport::new(fake, 57_600, 0xFFFF_FFFF);
        CommandChannel::new(transport, 200)
    }

    /// Re-parse a channel's written bytes and collect the opcode byte
    /// of every Command frame, skipping any Data/EndData frames a
    /// data-stream upload may have interleaved.
    fn written_opcodes(channel: &mut CommandChannel<FakeSensor>) -> Vec<u8> {
        let written = channel.stream_mut().from_host.clone();
        let mut out = Vec::new();
        let mut i = 0;
        while i < written.len() {
            let kind = PacketKind::from_wire(written[i + 6]).unwrap();
            let length = u16::from_be_bytes([written[i + 7], written[i + 8]]) as usize;
            let payload_len = length - 2;
            if kind == PacketKind::Command && payload_len > 0 {
                out.push(written[i + 9]);
            }
            i += 9 + length;
        }
        out
    }

    #[test]
    fn enroll_emits_the_spec_sequence() {
        // GetImage(no finger), GetImage(finger), Image2Tz(1),
        // GetImage(finger still), GetImage(gone), GetImage(no finger),
        // GetImage(finger), Image2Tz(2), GetImage(gone), CreateModel,
        // Store.
        let mut channel = channel_with_frames(&[
            ack(&[0x02]), // GetImage: no finger
            ack(&[0x00]), // GetImage: present
            ack(&[0x00]), // Image2Tz(1)
            ack(&[0x00]), // GetImage: still present
            ack(&[0x02]), // GetImage: gone
            ack(&[0x02]), // GetImage: no finger
            ack(&[0x00]), // GetImage: present
            ack(&[0x00]), // Image2Tz(2)
            ack(&[0x00]), // GetImage: still present
            ack(&[0x02]), // GetImage: gone
            ack(&[0x00]), // CreateModel
            ack(&[0x00]), // Store
        ]);
        let mut listener = NullListener;
        enroll(&mut channel, 3, &mut listener, false, 0, &|| false).unwrap();

        assert_eq!(
            written_opcodes(&mut channel),
            vec![0x01, 0x01, 0x02, 0x01, 0x01, 0x01, 0x01, 0x02, 0x01, 0x01, 0x05, 0x06]
        );
    }

    #[test]
    fn search_miss_returns_none() {
        let mut channel = channel_with_frames(&[
            ack(&[0x00]), // GetImage: present
            ack(&[0x00]), // Image2Tz(1)
            ack(&[0x02]), // GetImage: gone
            ack(&[0x09]), // Search: no match
        ]);
        let mut listener = NullListener;
        let result = search(&mut channel, &mut listener, 200, &|| false).unwrap();
        assert_eq!(result, None);
    }

    #[test]
    fn match_slot_reports_score() {
        let mut channel = channel_with_frames(&[
            ack(&[0x00]), // LoadChar
            ack(&[0x00]), // GetImage: present
            ack(&[0x00]), // Image2Tz(2)
            ack(&[0x02]), // GetImage: gone
            ack(&[0x00, 0x00, 0x64]), // Match: score 100
        ]);
        let mut listener = NullListener;
        let score = match_slot(&mut channel, 9, &mut listener, &|| false).unwrap();
        assert_eq!(score, 100);
    }

    #[test]
    fn cancellation_during_finger_wait_aborts_before_any_io() {
        let mut channel = channel_with_frames(&[]);
        let err = wait_for_fingerprint(&mut channel, &|| true).unwrap_err();
        assert!(matches!(
            err,
            crate::error::DriverError::Sensor(SensorError::Cancelled)
        ));
        assert!(channel.stream_mut().from_host.is_empty());
    }

    #[test]
    fn cancellation_mid_poll_stops_the_workflow() {
        let mut channel = channel_with_frames(&[ack(&[0x02])]); // one "no finger" reply
        let polls = std::cell::Cell::new(0);
        let cancelled = || {
            polls.set(polls.get() + 1);
            polls.get() > 1
        };
        // First poll consumes the queued reply and finds no finger;
        // the second call to `cancelled` (before the next GetImage)
        // reports true and the loop aborts without another round trip.
        let err = wait_for_fingerprint(&mut channel, &cancelled).unwrap_err();
        assert!(matches!(
            err,
            crate::error::DriverError::Sensor(SensorError::Cancelled)
        ));
    }

    #[test]
    fn capture_and_download_image_skips_finger_removed_wait() {
        let mut wire = vec![0u8; crate::image::ROWS * crate::image::COLS / 2];
        wire[0] = 0xA0;
        let mut channel = channel_with_frames(&[
            ack(&[0x00]),               // GetImage: present
            ack(&[0x00]),                // begin_download_image ack
            frame(PacketKind::EndData, &wire),
        ]);
        let mut listener = NullListener;
        let image = capture_and_download_image(&mut channel, &mut listener, &|| false).unwrap();
        assert_eq!(image.pixel(0, 0), 0xA0);
    }

    #[test]
    fn enroll_from_scans_does_not_touch_the_physical_sensor() {
        let mut channel = channel_with_frames(&[
            ack(&[0x00]), // begin_upload_image (scan1)
            ack(&[0x00]), // Image2Tz(1)
            ack(&[0x00]), // begin_upload_image (scan2)
            ack(&[0x00]), // Image2Tz(2)
            ack(&[0x00]), // CreateModel
            ack(&[0x00]), // Store
        ]);
        let pixels = vec![0u8; crate::image::ROWS * crate::image::COLS];
        let scan1 = PixelImage::new(pixels.clone());
        let scan2 = PixelImage::new(pixels);
        enroll_from_scans(&mut channel, 1, &scan1, &scan2, 64, false, 0).unwrap();

        assert_eq!(
            written_opcodes(&mut channel),
            vec![0x0B, 0x02, 0x0B, 0x02, 0x05, 0x06]
        );
    }
}
