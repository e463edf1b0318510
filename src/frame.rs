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

//! Frame header fields and the fixed 5-byte supervisory frames.

use crate::protocol::*;

// ============================================================================
// Sequence Bit
// ============================================================================

/// Alternating stop-and-wait sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeqBit {
    #[default]
    Zero,
    One,
}

impl SeqBit {
    pub fn toggle(self) -> SeqBit {
        match self {
            SeqBit::Zero => SeqBit::One,
            SeqBit::One => SeqBit::Zero,
        }
    }

    pub fn bit(self) -> u8 {
        match self {
            SeqBit::Zero => 0,
            SeqBit::One => 1,
        }
    }
}

// ============================================================================
// Address Field
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Address {
    /// Commands from the transmitter, replies from the receiver
    Transmitter,
    /// Commands from the receiver, replies from the transmitter
    Receiver,
}

impl Address {
    pub fn to_byte(self) -> u8 {
        match self {
            Address::Transmitter => A_TX,
            Address::Receiver => A_RX,
        }
    }

    pub fn from_byte(byte: u8) -> Option<Address> {
        match byte {
            A_TX => Some(Address::Transmitter),
            A_RX => Some(Address::Receiver),
            _ => None,
        }
    }
}

// ============================================================================
// Control Field
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Set,
    Ua,
    Disc,
    Rr(SeqBit),
    Rej(SeqBit),
    Info(SeqBit),
}

impl Control {
    pub fn to_byte(self) -> u8 {
        match self {
            Control::Set => C_SET,
            Control::Ua => C_UA,
            Control::Disc => C_DISC,
            Control::Rr(n) => (n.bit() << 7) | C_RR0,
            Control::Rej(n) => (n.bit() << 7) | C_REJ0,
            Control::Info(n) => n.bit() << 6,
        }
    }

    pub fn from_byte(byte: u8) -> Option<Control> {
        match byte {
            C_SET => Some(Control::Set),
            C_UA => Some(Control::Ua),
            C_DISC => Some(Control::Disc),
            C_RR0 => Some(Control::Rr(SeqBit::Zero)),
            C_RR1 => Some(Control::Rr(SeqBit::One)),
            C_REJ0 => Some(Control::Rej(SeqBit::Zero)),
            C_REJ1 => Some(Control::Rej(SeqBit::One)),
            C_I0 => Some(Control::Info(SeqBit::Zero)),
            C_I1 => Some(Control::Info(SeqBit::One)),
            _ => None,
        }
    }

    /// Supervisory frames carry no payload and no BCC2.
    pub fn is_supervisory(self) -> bool {
        !matches!(self, Control::Info(_))
    }
}

/// Header check over the logical (unstuffed) address and control bytes.
pub fn bcc1(address: Address, control: Control) -> u8 {
    address.to_byte() ^ control.to_byte()
}

// ============================================================================
// Supervisory Frames
// ============================================================================

/// A decoded supervisory frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Supervisory {
    pub address: Address,
    pub control: Control,
}

impl Supervisory {
    pub fn new(address: Address, control: Control) -> Self {
        Supervisory { address, control }
    }
}

pub fn build_supervisory(address: Address, control: Control) -> [u8; SUPERVISORY_LEN] {
    [FLAG, address.to_byte(), control.to_byte(), bcc1(address, control), FLAG]
}

/// Match a complete 5-byte supervisory frame held in one buffer, such as a
/// single write captured off the line. Information controls and any header or
/// BCC1 mismatch yield `None`.
///
/// A live connection sees bytes one at a time and goes through
/// [`crate::parser::FrameParser`] instead.
pub fn recognize(bytes: &[u8]) -> Option<Supervisory> {
    let [first, addr, ctrl, check, last] = bytes else {
        return None;
    };
    if *first != FLAG || *last != FLAG {
        return None;
    }
    let address = Address::from_byte(*addr)?;
    let control = Control::from_byte(*ctrl)?;
    if !control.is_supervisory() || *check != bcc1(address, control) {
        return None;
    }
    Some(Supervisory { address, control })
}

// ============================================================================
// Tests
// ============================================================================
