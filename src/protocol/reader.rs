use std::io::Read;
use std::time::{Duration, Instant};

/// Growable ring buffer over bytes read from the UART. Doubles in place
/// when full; read/write indices wrap rather than shifting data.
#[derive(Debug)]
struct RingBuffer {
    buf: Vec<u8>,
    read: usize,
    write: usize,
    len: usize,
}

impl RingBuffer {
    fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0u8; capacity.max(1)],
            read: 0,
            write: 0,
            len: 0,
        }
    }

    fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn push(&mut self, byte: u8) {
        if self.len == self.buf.len() {
            self.grow();
        }
        self.buf[self.write] = byte;
        self.write = (self.write + 1) % self.buf.len();
        self.len += 1;
    }

    fn pop(&mut self) -> Option<u8> {
        if self.is_empty() {
            return None;
        }
        let byte = self.buf[self.read];
        self.read = (self.read + 1) % self.buf.len();
        self.len -= 1;
        Some(byte)
    }

    fn grow(&mut self) {
        let old_cap = self.buf.len();
        let mut grown = vec![0u8; old_cap * 2];
        for i in 0..self.len {
            grown[i] = self.buf[(self.read + i) % old_cap];
        }
        self.buf = grown;
        self.read = 0;
        self.write = self.len;
    }
}

/// Buffers incoming UART bytes and applies wall-clock deadlines to
/// reads, sleeping a baud-derived interval instead of busy-waiting when
/// the underlying stream has nothing buffered.
#[derive(Debug)]
pub struct ByteReader<R> {
    stream: R,
    ring: RingBuffer,
    byte_interval: Duration,
    scratch: [u8; 256],
}

impl<R: Read> ByteReader<R> {
    pub fn new(stream: R, baud: u32) -> Self {
        Self {
            stream,
            ring: RingBuffer::new(256),
            byte_interval: Self::byte_interval(baud),
            scratch: [0u8; 256],
        }
    }

    /// Approximate transmission time of one byte at `baud`, floored at
    /// 100ns so the reader never spins without a scheduling yield.
    fn byte_interval(baud: u32) -> Duration {
        let baud = baud.max(1) as u64;
        let nanos = ((1_000_000_000u64 / baud) * 8).max(100);
        Duration::from_nanos(nanos)
    }

    /// Read one byte, or `None` if `timeout_ms` elapses first.
    pub fn read_byte(&mut self, timeout_ms: u64) -> Option<u8> {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        loop {
            if let Some(b) = self.ring.pop() {
                return Some(b);
            }
            if Instant::now() >= deadline {
                return None;
            }
            if !self.fill()? {
                std::thread::sleep(self.byte_interval);
            }
        }
    }

    /// Read exactly `count` bytes under a single deadline for the whole
    /// call, or `None` if the deadline elapses before `count` bytes have
    /// arrived.
    pub fn read_n(&mut self, count: usize, timeout_ms: u64) -> Option<Vec<u8>> {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        let mut out = Vec::with_capacity(count);
        while out.len() < count {
            if let Some(b) = self.ring.pop() {
                out.push(b);
                continue;
            }
            let remaining = deadline.checked_duration_since(Instant::now())?;
            if remaining.is_zero() {
                return None;
            }
            if !self.fill()? {
                std::thread::sleep(self.byte_interval);
            }
        }
        Some(out)
    }

    /// Direct access to the underlying stream, for transports that also
    /// need to write to it.
    pub(crate) fn stream_mut(&mut self) -> &mut R {
        &mut self.stream
    }

    /// Try to pull whatever is already available from the stream into
    /// the ring buffer. Returns `Ok` wrapped in `Some(true)` if bytes
    /// were appended, `Some(false)` if the stream had nothing buffered
    /// right now, `None` on a genuine I/O error (treated as failure).
    fn fill(&mut self) -> Option<bool> {
        match self.stream.read(&mut self.scratch) {
            Ok(0) => Some(false),
            Ok(n) => {
                for &b in &self.scratch[..n] {
                    self.ring.push(b);
                }
                Some(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Some(false),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Some(false),
            Err(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reads_available_bytes_without_blocking() {
        let mut reader = ByteReader::new(Cursor::new(vec![1, 2, 3]), 57_600);
        assert_eq!(reader.read_byte(50), Some(1));
        assert_eq!(reader.read_n(2, 50), Some(vec![2, 3]));
    }

    #[test]
    fn read_n_times_out_on_short_stream() {
        let mut reader = ByteReader::new(Cursor::new(vec![1, 2]), 57_600);
        assert_eq!(reader.read_n(5, 10), None);
    }

    #[test]
    fn byte_interval_is_floored_at_100ns() {
        assert_eq!(ByteReader::<Cursor<Vec<u8>>>::byte_interval(u32::MAX), Duration::from_nanos(100));
    }

    #[test]
    fn ring_buffer_grows_past_initial_capacity() {
        let data: Vec<u8> = (0..1000).map(|i| (i % 256) as u8).collect();
        let mut reader = ByteReader::new(Cursor::new(data.clone()), 57_600);
        assert_eq!(reader.read_n(1000, 200), Some(data));
    }
}
