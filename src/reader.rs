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

//! Receive side: acknowledge, reject or drop each parsed frame.

use log::{debug, info, warn};
use crate::error::Result;
use crate::frame::{Address, Control, Supervisory};
use crate::link::{Connection, LinkState, Received, Role};
use crate::parser::ParsedFrame;

impl Connection {
    /// Block until the next new payload arrives or the transmitter
    /// disconnects. Repeats of an already delivered frame are acknowledged
    /// again but not returned.
    pub fn receive_frame(&mut self) -> Result<Received> {
        self.require_role(Role::Receiver)?;
        if self.state == LinkState::PeerClosed {
            return Ok(Received::Disconnected);
        }

        loop {
            let Some(frame) = self.poll_frame()? else {
                continue;
            };

            match frame {
                ParsedFrame::Information { address: Address::Transmitter, seq, payload } => {
                    if seq == self.seq {
                        let next = seq.toggle();
                        self.send_supervisory(Address::Transmitter, Control::Rr(next))?;
                        self.seq = next;
                        self.stats.frames_received += 1;
                        debug!("Received: I({}) with {} payload bytes", seq.bit(), payload.len());
                        return Ok(Received::Payload(payload));
                    }

                    self.stats.duplicates += 1;
                    debug!("Duplicate I({}), acknowledging again", seq.bit());
                    self.send_supervisory(Address::Transmitter, Control::Rr(self.seq))?;
                }
                ParsedFrame::Corrupted { address: Address::Transmitter, seq } => {
                    self.stats.rejects_sent += 1;
                    warn!("BCC2 mismatch on I({}), sending REJ({})", seq.bit(), self.seq.bit());
                    self.send_supervisory(Address::Transmitter, Control::Rej(self.seq))?;
                }
                ParsedFrame::Supervisory(Supervisory {
                    address: Address::Transmitter,
                    control: Control::Disc,
                }) => {
                    info!("Transmitter requested disconnect");
                    self.state = LinkState::PeerClosed;
                    return Ok(Received::Disconnected);
                }
                ParsedFrame::Supervisory(Supervisory {
                    address: Address::Transmitter,
                    control: Control::Set,
                }) => {
                    // Our UA from open was lost
                    debug!("Repeated SET, answering UA");
                    self.send_supervisory(Address::Transmitter, Control::Ua)?;
                }
                other => debug!("Ignored {:?}", other),
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
