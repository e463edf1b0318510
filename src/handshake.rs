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

//! Connection setup and teardown.
//!
//! ```text
//!  Transmitter                 Receiver
//!      │ ── SET  (A=03) ──────▶ │        open
//!      │ ◀───── UA  (A=03) ──── │
//!      ┆        I / RR / REJ    ┆
//!      │ ── DISC (A=03) ──────▶ │        close
//!      │ ◀──── DISC (A=01) ──── │
//!      │ ── UA   (A=01) ──────▶ │
//! ```
//!
//! The side that sends a command owns the timer and retransmits it; the
//! passive side of `open` waits without one.

use log::{debug, info, warn};
use crate::error::{LinkError, Result};
use crate::frame::{Address, Control, Supervisory};
use crate::link::{Connection, LinkConfig, Role, Statistics};
use crate::parser::ParsedFrame;
use crate::serial::Channel;

impl Connection {
    /// Run the setup handshake for `config.role` over `channel`.
    pub fn open(channel: Box<dyn Channel>, config: LinkConfig) -> Result<Connection> {
        let mut conn = Connection::new(channel, config);

        match conn.config.role {
            Role::Transmitter => {
                conn.exchange(
                    Supervisory::new(Address::Transmitter, Control::Set),
                    Supervisory::new(Address::Transmitter, Control::Ua),
                    None,
                    |retries| LinkError::ConnectionTimeout { retries },
                )?;
            }
            Role::Receiver => conn.accept()?,
        }

        info!("Link established ({:?})", conn.config.role);
        Ok(conn)
    }

    /// Run the teardown handshake and release the channel. The channel is
    /// released whether or not the handshake completes.
    ///
    /// The transmitter's final UA answers a receiver command and so carries
    /// address `0x01`. Peers that expect that UA under `0x03` will retry
    /// their DISC until they time out.
    pub fn close(mut self, show_statistics: bool) -> Result<Statistics> {
        let outcome = match self.config.role {
            Role::Transmitter => self
                .exchange(
                    Supervisory::new(Address::Transmitter, Control::Disc),
                    Supervisory::new(Address::Receiver, Control::Disc),
                    None,
                    |retries| LinkError::DisconnectTimeout { retries },
                )
                .and_then(|()| self.send_supervisory(Address::Receiver, Control::Ua)),
            Role::Receiver => self.exchange(
                Supervisory::new(Address::Receiver, Control::Disc),
                Supervisory::new(Address::Receiver, Control::Ua),
                // Transmitter missed our DISC and repeated its own
                Some(Supervisory::new(Address::Transmitter, Control::Disc)),
                |retries| LinkError::DisconnectTimeout { retries },
            ),
        };

        let released = self.release();
        let stats = self.statistics();
        if show_statistics {
            info!("Link statistics:\n{}", stats);
        }

        outcome?;
        released?;
        info!("Link closed ({:?})", self.config.role);
        Ok(stats)
    }

    /// Passive side of `open`: wait, without a timer, for SET and answer UA.
    fn accept(&mut self) -> Result<()> {
        loop {
            match self.poll_frame()? {
                Some(ParsedFrame::Supervisory(Supervisory {
                    address: Address::Transmitter,
                    control: Control::Set,
                })) => {
                    debug!("Received: SET");
                    return self.send_supervisory(Address::Transmitter, Control::Ua);
                }
                Some(other) => debug!("Waiting for SET, ignored {:?}", other),
                None => {}
            }
        }
    }

    /// Send `command` and retransmit it on every timer expiry until `reply`
    /// arrives. `repeat_on` triggers an immediate resend without using up a
    /// retry. Anything else on the line is ignored.
    fn exchange(
        &mut self,
        command: Supervisory,
        reply: Supervisory,
        repeat_on: Option<Supervisory>,
        exhausted: fn(u32) -> LinkError,
    ) -> Result<()> {
        self.send_supervisory(command.address, command.control)?;
        self.timer.arm();
        let mut retries = 0;

        loop {
            match self.poll_frame()? {
                Some(ParsedFrame::Supervisory(frame)) if frame == reply => {
                    self.timer.cancel();
                    debug!("Received: {:?}", frame.control);
                    return Ok(());
                }
                Some(ParsedFrame::Supervisory(frame)) if Some(frame) == repeat_on => {
                    debug!("Peer repeated {:?}, resending {:?}", frame.control, command.control);
                    self.send_supervisory(command.address, command.control)?;
                    self.stats.retransmissions += 1;
                    self.timer.arm();
                }
                Some(other) => debug!("Waiting for {:?}, ignored {:?}", reply.control, other),
                None => {}
            }

            if self.timer.expired() {
                self.stats.timeouts += 1;
                if retries >= self.config.max_retries {
                    warn!("No {:?} after {} retransmissions of {:?}", reply.control, retries, command.control);
                    return Err(exhausted(retries));
                }
                retries += 1;
                warn!(
                    "Timeout, resending {:?} ({}/{})",
                    command.control, retries, self.config.max_retries
                );
                self.send_supervisory(command.address, command.control)?;
                self.stats.retransmissions += 1;
                self.timer.arm();
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::build_supervisory;
    use crate::link::test_support::*;
    use crate::serial::MockSerialPort;

    fn frame(address: Address, control: Control) -> Vec<u8> {
        build_supervisory(address, control).to_vec()
    }

    #[test]
    fn test_transmitter_open() {
        let responses = bytes(&frame(Address::Transmitter, Control::Ua));
        let expected_writes = frame(Address::Transmitter, Control::Set);

        let mock = Box::new(MockSerialPort::new(responses, expected_writes));
        let conn = Connection::open(mock, test_config(Role::Transmitter)).expect("open");
        assert_eq!(conn.role(), Role::Transmitter);
        assert_eq!(conn.statistics().retransmissions, 0);
    }

    #[test]
    fn test_transmitter_open_retry() {
        let mut responses = vec![None];
        responses.extend(bytes(&frame(Address::Transmitter, Control::Ua)));

        let mut expected_writes = frame(Address::Transmitter, Control::Set);
        expected_writes.extend(frame(Address::Transmitter, Control::Set));

        let mock = Box::new(MockSerialPort::new(responses, expected_writes));
        let conn = Connection::open(mock, test_config(Role::Transmitter)).expect("open");
        let stats = conn.statistics();
        assert_eq!(stats.retransmissions, 1);
        assert_eq!(stats.timeouts, 1);
    }

    #[test]
    fn test_transmitter_open_timeout() {
        let responses = vec![None; 4];
        let expected_writes = frame(Address::Transmitter, Control::Set).repeat(4);

        let mock = Box::new(MockSerialPort::new(responses, expected_writes));
        match Connection::open(mock, test_config(Role::Transmitter)) {
            Err(LinkError::ConnectionTimeout { retries }) => assert_eq!(retries, 3),
            Err(e) => panic!("unexpected error: {:?}", e),
            Ok(_) => panic!("open should time out"),
        }
    }

    #[test]
    fn test_transmitter_open_ignores_garbage() {
        // Noise and a UA with a broken BCC1 do not trigger a resend
        let mut responses = bytes(&[0x00, 0x7E, 0x55]);
        responses.extend(bytes(&[0x7E, 0x03, 0x07, 0x05, 0x7E]));
        responses.extend(bytes(&frame(Address::Receiver, Control::Ua)));
        responses.extend(bytes(&frame(Address::Transmitter, Control::Ua)));

        let expected_writes = frame(Address::Transmitter, Control::Set);

        let mock = Box::new(MockSerialPort::new(responses, expected_writes));
        Connection::open(mock, test_config(Role::Transmitter)).expect("open");
    }

    #[test]
    fn test_receiver_open() {
        let mut responses = vec![None, Some(0x42)];
        responses.extend(bytes(&frame(Address::Transmitter, Control::Set)));

        let expected_writes = frame(Address::Transmitter, Control::Ua);

        let mock = Box::new(MockSerialPort::new(responses, expected_writes));
        let conn = Connection::open(mock, test_config(Role::Receiver)).expect("open");
        assert_eq!(conn.role(), Role::Receiver);
    }

    #[test]
    fn test_transmitter_close() {
        let mut responses = bytes(&frame(Address::Transmitter, Control::Ua));
        responses.extend(bytes(&frame(Address::Receiver, Control::Disc)));

        let mut expected_writes = frame(Address::Transmitter, Control::Set);
        expected_writes.extend(frame(Address::Transmitter, Control::Disc));
        expected_writes.extend(frame(Address::Receiver, Control::Ua));

        let mock = Box::new(MockSerialPort::new(responses, expected_writes).expect_close());
        let conn = Connection::open(mock, test_config(Role::Transmitter)).expect("open");
        let stats = conn.close(true).expect("close");
        assert_eq!(stats.retransmissions, 0);
    }

    #[test]
    fn test_transmitter_close_timeout() {
        let mut responses = bytes(&frame(Address::Transmitter, Control::Ua));
        responses.extend(vec![None; 4]);

        let mut expected_writes = frame(Address::Transmitter, Control::Set);
        expected_writes.extend(frame(Address::Transmitter, Control::Disc).repeat(4));

        let mock = Box::new(MockSerialPort::new(responses, expected_writes).expect_close());
        let conn = Connection::open(mock, test_config(Role::Transmitter)).expect("open");
        match conn.close(false) {
            Err(LinkError::DisconnectTimeout { retries }) => assert_eq!(retries, 3),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_receiver_close() {
        let mut responses = bytes(&frame(Address::Transmitter, Control::Set));
        // Transmitter repeats its DISC before our DISC gets through
        responses.extend(bytes(&frame(Address::Transmitter, Control::Disc)));
        responses.extend(bytes(&frame(Address::Receiver, Control::Ua)));

        let mut expected_writes = frame(Address::Transmitter, Control::Ua);
        expected_writes.extend(frame(Address::Receiver, Control::Disc));
        expected_writes.extend(frame(Address::Receiver, Control::Disc));

        let mock = Box::new(MockSerialPort::new(responses, expected_writes).expect_close());
        let conn = Connection::open(mock, test_config(Role::Receiver)).expect("open");
        let stats = conn.close(false).expect("close");
        assert_eq!(stats.retransmissions, 1);
        assert_eq!(stats.timeouts, 0);
    }

    #[test]
    fn test_receiver_close_retry() {
        let mut responses = bytes(&frame(Address::Transmitter, Control::Set));
        responses.push(None);
        responses.extend(bytes(&frame(Address::Receiver, Control::Ua)));

        let mut expected_writes = frame(Address::Transmitter, Control::Ua);
        expected_writes.extend(frame(Address::Receiver, Control::Disc).repeat(2));

        let mock = Box::new(MockSerialPort::new(responses, expected_writes).expect_close());
        let conn = Connection::open(mock, test_config(Role::Receiver)).expect("open");
        let stats = conn.close(true).expect("close");
        assert_eq!(stats.timeouts, 1);
    }

    #[test]
    fn test_receiver_close_timeout() {
        let mut responses = bytes(&frame(Address::Transmitter, Control::Set));
        responses.extend(vec![None; 4]);

        let mut expected_writes = frame(Address::Transmitter, Control::Ua);
        expected_writes.extend(frame(Address::Receiver, Control::Disc).repeat(4));

        // The mock checks on drop that the channel was released
        let mock = Box::new(MockSerialPort::new(responses, expected_writes).expect_close());
        let conn = Connection::open(mock, test_config(Role::Receiver)).expect("open");
        match conn.close(true) {
            Err(LinkError::DisconnectTimeout { retries }) => assert_eq!(retries, 3),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
