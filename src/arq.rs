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

//! Stop-and-wait transmit side.
//!
//! One information frame is in flight at a time. The frame is encoded once
//! and every retransmission writes the same bytes, so the receiver tells a
//! repeat from new data by the sequence bit alone.

use log::{debug, warn};
use crate::codec::encode_information;
use crate::error::{LinkError, Result};
use crate::frame::{Address, Control, Supervisory};
use crate::link::{Connection, LinkState, Role};
use crate::parser::ParsedFrame;

impl Connection {
    /// Send one payload and block until the receiver acknowledges it.
    /// Returns the number of bytes written for the first transmission.
    pub fn send_frame(&mut self, payload: &[u8]) -> Result<usize> {
        self.require_role(Role::Transmitter)?;
        if payload.len() > self.config.max_payload {
            return Err(LinkError::PayloadTooLarge {
                len: payload.len(),
                max: self.config.max_payload,
            });
        }
        if self.state == LinkState::Lost {
            return Err(LinkError::LinkLost { retries: self.config.max_retries });
        }

        let seq = self.seq;
        let wire = encode_information(Address::Transmitter, seq, payload);
        self.write_information(&wire)?;
        debug!("Sent: I({}) with {} payload bytes", seq.bit(), payload.len());
        self.timer.arm();
        let mut retries = 0;

        loop {
            match self.poll_frame()? {
                Some(ParsedFrame::Supervisory(Supervisory {
                    address: Address::Transmitter,
                    control: Control::Rr(next),
                })) if next == seq.toggle() => {
                    self.timer.cancel();
                    self.seq = next;
                    debug!("Received: RR({})", next.bit());
                    return Ok(wire.len());
                }
                Some(ParsedFrame::Supervisory(Supervisory {
                    address: Address::Transmitter,
                    control: Control::Rej(rejected),
                })) if rejected == seq => {
                    self.stats.rejects_received += 1;
                    warn!("Received: REJ({}), resending frame", rejected.bit());
                    self.write_information(&wire)?;
                    self.stats.retransmissions += 1;
                    self.timer.arm();
                }
                Some(other) => debug!("Waiting for RR({}), ignored {:?}", seq.toggle().bit(), other),
                None => {}
            }

            if self.timer.expired() {
                self.stats.timeouts += 1;
                if retries >= self.config.max_retries {
                    self.state = LinkState::Lost;
                    warn!("Frame I({}) unacknowledged after {} retransmissions", seq.bit(), retries);
                    return Err(LinkError::LinkLost { retries });
                }
                retries += 1;
                warn!("Timeout, resending I({}) ({}/{})", seq.bit(), retries, self.config.max_retries);
                self.write_information(&wire)?;
                self.stats.retransmissions += 1;
                self.timer.arm();
            }
        }
    }

    fn write_information(&mut self, wire: &[u8]) -> Result<()> {
        self.channel.write_all(wire)?;
        self.stats.frames_sent += 1;
        self.stats.bytes_sent += wire.len() as u64;
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
