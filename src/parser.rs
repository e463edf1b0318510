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

//! Byte-at-a-time frame parser.
//!
//! [`step`] is a pure transition function over [`ParserState`]; it does no
//! I/O and never fails. Line noise, header damage and overlong bodies all end
//! in a resync. The only damage reported upward is a BCC2 mismatch on a frame
//! whose header checked out, because the receiver answers it with REJ.
//!
//! ```text
//!  Start ─FLAG─▶ FlagSeen ─ADDR─▶ AddressSeen ─CTRL─▶ ControlSeen
//!                                                        │ BCC1 ok
//!                              ┌─────────────────────────┴──────────┐
//!                              ▼ supervisory                        ▼ information
//!                      SupervisoryBcc1Ok ─FLAG─▶ emit        Payload ─FLAG─▶ destuff,
//!                                                                           check BCC2, emit
//! ```

use crate::codec::{checksum_xor, destuff, max_stuffed_len};
use crate::frame::{Address, Control, SeqBit, Supervisory, bcc1};
use crate::protocol::*;

// ============================================================================
// Parser Output
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedFrame {
    Supervisory(Supervisory),
    Information {
        address: Address,
        seq: SeqBit,
        payload: Vec<u8>,
    },
    /// Header was valid but BCC2 did not match the payload.
    Corrupted { address: Address, seq: SeqBit },
}

// ============================================================================
// States
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ParserState {
    #[default]
    Start,
    FlagSeen,
    AddressSeen { address: Address },
    ControlSeen { address: Address, control: Control },
    SupervisoryBcc1Ok { address: Address, control: Control },
    /// Stuffed payload and BCC2 collected so far.
    Payload { address: Address, seq: SeqBit, body: Vec<u8> },
}

/// State after an unexpected byte: a FLAG may open the next frame.
fn resync(byte: u8) -> ParserState {
    if byte == FLAG {
        ParserState::FlagSeen
    } else {
        ParserState::Start
    }
}

/// Advance the parser by one byte. `limit` caps the stuffed body length.
pub fn step(state: ParserState, byte: u8, limit: usize) -> (ParserState, Option<ParsedFrame>) {
    match state {
        ParserState::Start => (resync(byte), None),

        ParserState::FlagSeen => match Address::from_byte(byte) {
            Some(address) => (ParserState::AddressSeen { address }, None),
            None => (resync(byte), None),
        },

        ParserState::AddressSeen { address } => match Control::from_byte(byte) {
            Some(control) => (ParserState::ControlSeen { address, control }, None),
            None => (resync(byte), None),
        },

        ParserState::ControlSeen { address, control } => {
            if byte != bcc1(address, control) {
                return (resync(byte), None);
            }
            match control {
                Control::Info(seq) => (
                    ParserState::Payload { address, seq, body: Vec::new() },
                    None,
                ),
                _ => (ParserState::SupervisoryBcc1Ok { address, control }, None),
            }
        }

        ParserState::SupervisoryBcc1Ok { address, control } => {
            if byte == FLAG {
                let frame = ParsedFrame::Supervisory(Supervisory::new(address, control));
                (ParserState::Start, Some(frame))
            } else {
                (ParserState::Start, None)
            }
        }

        ParserState::Payload { address, seq, mut body } => {
            if byte != FLAG {
                if body.len() >= limit {
                    return (ParserState::Start, None);
                }
                body.push(byte);
                return (ParserState::Payload { address, seq, body }, None);
            }

            // An escaped FLAG or a body without BCC2 cannot close a frame;
            // the FLAG opens the next one instead.
            if body.is_empty() || body.last() == Some(&ESC) {
                return (ParserState::FlagSeen, None);
            }

            (ParserState::Start, finish_information(address, seq, &body))
        }
    }
}

fn finish_information(address: Address, seq: SeqBit, body: &[u8]) -> Option<ParsedFrame> {
    let mut payload = destuff(body).ok()?;
    let bcc2 = payload.pop()?;
    if checksum_xor(&payload) == bcc2 {
        Some(ParsedFrame::Information { address, seq, payload })
    } else {
        Some(ParsedFrame::Corrupted { address, seq })
    }
}

// ============================================================================
// Resumable Parser
// ============================================================================

/// Parser state carried across reads on a connection.
#[derive(Debug)]
pub struct FrameParser {
    state: ParserState,
    limit: usize,
}

impl FrameParser {
    pub fn new(max_payload: usize) -> Self {
        FrameParser {
            state: ParserState::Start,
            limit: max_stuffed_len(max_payload),
        }
    }

    pub fn feed(&mut self, byte: u8) -> Option<ParsedFrame> {
        let state = std::mem::take(&mut self.state);
        let (next, frame) = step(state, byte, self.limit);
        self.state = next;
        frame
    }

    pub fn state(&self) -> &ParserState {
        &self.state
    }

    pub fn reset(&mut self) {
        self.state = ParserState::Start;
    }
}

// ============================================================================
// Tests
// ============================================================================
