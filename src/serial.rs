// Copyright (C) 2026 Brian Johnson
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

use std::io::{ErrorKind, Read, Write};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;
use serialport::{SerialPort as SerialPortTrait, DataBits, Parity, StopBits};

// ============================================================================
// Channel Trait
// ============================================================================

/// Byte channel the link layer runs over
pub trait Channel: Send {
    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()>;

    /// Wait up to `timeout` for one byte. `Ok(None)` means the line stayed idle.
    fn read_byte(&mut self, timeout: Duration) -> std::io::Result<Option<u8>>;

    fn close(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

// ============================================================================
// Real Serial Port Implementation
// ============================================================================

/// Serial port channel backed by the serialport crate
pub struct RealSerialPort {
    port: Box<dyn SerialPortTrait>,
}

impl RealSerialPort {
    pub fn open(
        port_name: &str,
        baud_rate: u32,
        data_bits: DataBits,
        parity: Parity,
        stop_bits: StopBits,
    ) -> Result<Self, serialport::Error> {
        let port = serialport::new(port_name, baud_rate)
            .data_bits(data_bits)
            .parity(parity)
            .stop_bits(stop_bits)
            .timeout(Duration::from_millis(100))
            .open()?;

        port.clear(serialport::ClearBuffer::All)?;

        Ok(RealSerialPort { port })
    }
}

impl Channel for RealSerialPort {
    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        self.port.write_all(buf)?;
        self.port.flush()?;
        Ok(())
    }

    fn read_byte(&mut self, timeout: Duration) -> std::io::Result<Option<u8>> {
        self.port.set_timeout(timeout)
            .map_err(|e| std::io::Error::new(ErrorKind::Other, e))?;

        let mut buf = [0u8; 1];
        match self.port.read(&mut buf) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(buf[0])),
            Err(e) if e.kind() == ErrorKind::TimedOut => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn close(&mut self) -> std::io::Result<()> {
        self.port.flush()
    }
}

// ============================================================================
// In-Memory Loopback
// ============================================================================

/// One end of an in-memory byte pipe. Bytes written on one end are read on
/// the other.
pub struct LoopbackChannel {
    tx: Sender<u8>,
    rx: Receiver<u8>,
}

impl LoopbackChannel {
    pub fn pair() -> (LoopbackChannel, LoopbackChannel) {
        let (a_tx, b_rx) = mpsc::channel();
        let (b_tx, a_rx) = mpsc::channel();
        (
            LoopbackChannel { tx: a_tx, rx: a_rx },
            LoopbackChannel { tx: b_tx, rx: b_rx },
        )
    }
}

impl Channel for LoopbackChannel {
    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        for &byte in buf {
            // A peer that went away looks like a dead line, not an error
            if self.tx.send(byte).is_err() {
                break;
            }
        }
        Ok(())
    }

    fn read_byte(&mut self, timeout: Duration) -> std::io::Result<Option<u8>> {
        match self.rx.recv_timeout(timeout) {
            Ok(byte) => Ok(Some(byte)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                std::thread::sleep(timeout);
                Ok(None)
            }
        }
    }
}

// ============================================================================
// Mock Serial Port for Testing
// ============================================================================

#[cfg(test)]
pub struct MockSerialPort {
    // Data to return on reads (None = timeout)
    read_buffer: Vec<Option<u8>>,
    read_pos: usize,
    // Track what was written
    write_log: Vec<u8>,
    // Expected writes for verification
    expected_writes: Vec<u8>,
    // Whether the link released the channel, and whether it should have
    closed: bool,
    expect_close: bool,
}

#[cfg(test)]
impl MockSerialPort {
    pub fn new(responses: Vec<Option<u8>>, expected_writes: Vec<u8>) -> Self {
        MockSerialPort {
            read_buffer: responses,
            read_pos: 0,
            write_log: Vec::new(),
            expected_writes,
            closed: false,
            expect_close: false,
        }
    }

    /// Require `close()` to have been called by the time the mock is dropped.
    pub fn expect_close(mut self) -> Self {
        self.expect_close = true;
        self
    }
}

#[cfg(test)]
impl Channel for MockSerialPort {
    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        self.write_log.extend_from_slice(buf);
        Ok(())
    }

    fn read_byte(&mut self, timeout: Duration) -> std::io::Result<Option<u8>> {
        // Out of responses = the script is wrong, fail instead of spinning
        let Some(response) = self.read_buffer.get(self.read_pos).copied() else {
            return Err(std::io::Error::new(
                ErrorKind::UnexpectedEof,
                "Mock exhausted"
            ));
        };
        self.read_pos += 1;

        // None = the line stays idle for the whole timeout
        if response.is_none() {
            std::thread::sleep(timeout);
        }
        Ok(response)
    }

    fn close(&mut self) -> std::io::Result<()> {
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
impl Drop for MockSerialPort {
    fn drop(&mut self) {
        if std::thread::panicking() {
            return;
        }

        assert_eq!(
            self.read_pos,
            self.read_buffer.len(),
            "MockSerialPort dropped with {} unconsumed responses (read {} of {} bytes)",
            self.read_buffer.len() - self.read_pos,
            self.read_pos,
            self.read_buffer.len()
        );

        assert_eq!(
            &self.write_log,
            &self.expected_writes,
            "MockSerialPort write log mismatch!\nExpected {} bytes:\n{:02X?}\nGot {} bytes:\n{:02X?}",
            self.expected_writes.len(),
            self.expected_writes,
            self.write_log.len(),
            self.write_log
        );

        assert_eq!(
            self.closed,
            self.expect_close,
            "MockSerialPort close() called: {}, expected: {}",
            self.closed,
            self.expect_close
        );
    }
}
