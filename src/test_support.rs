//! In-memory stand-in for a serial port, used by unit and integration
//! tests to script sensor replies without real hardware.
#![cfg(test)]

use std::collections::VecDeque;
use std::io::{Read, Write};

#[derive(Debug)]
pub struct FakeSensor {
    to_host: VecDeque<u8>,
    pub from_host: Vec<u8>,
}

impl FakeSensor {
    pub fn new() -> Self {
        Self {
            to_host: VecDeque::new(),
            from_host: Vec::new(),
        }
    }

    /// Queue bytes that will be handed back on subsequent `Read`s, as if
    /// the sensor had just transmitted them.
    pub fn queue_reply(&mut self, bytes: &[u8]) {
        self.to_host.extend(bytes.iter().copied());
    }
}

impl Read for FakeSensor {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut n = 0;
        while n < buf.len() {
            match self.to_host.pop_front() {
                Some(b) => {
                    buf[n] = b;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }
}

impl Write for FakeSensor {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.from_host.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
