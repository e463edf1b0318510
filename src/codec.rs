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

//! Byte stuffing and block check characters.
//!
//! Stuffing covers every logical byte between the flags (ADDR through BCC2),
//! so a FLAG can only appear on the wire as a delimiter.

use crate::error::LinkError;
use crate::frame::{Address, Control, SeqBit, bcc1};
use crate::protocol::*;

pub fn stuff(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len() + bytes.len() / 8);
    for &byte in bytes {
        match byte {
            FLAG => out.extend_from_slice(&[ESC, ESC_FLAG]),
            ESC => out.extend_from_slice(&[ESC, ESC_ESC]),
            _ => out.push(byte),
        }
    }
    out
}

/// Inverse of [`stuff`]. An escape followed by anything other than
/// `0x5E`/`0x5D` is kept as a literal byte.
pub fn destuff(bytes: &[u8]) -> Result<Vec<u8>, LinkError> {
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == ESC {
            match bytes.get(i + 1) {
                None => return Err(LinkError::MalformedFrame),
                Some(&ESC_FLAG) => {
                    out.push(FLAG);
                    i += 2;
                    continue;
                }
                Some(&ESC_ESC) => {
                    out.push(ESC);
                    i += 2;
                    continue;
                }
                Some(_) => {}
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    Ok(out)
}

/// XOR parity. Zero is a valid result.
pub fn checksum_xor(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, &b| acc ^ b)
}

/// Build the complete wire form of an information frame.
pub fn encode_information(address: Address, seq: SeqBit, payload: &[u8]) -> Vec<u8> {
    let control = Control::Info(seq);

    let mut logical = Vec::with_capacity(payload.len() + 4);
    logical.push(address.to_byte());
    logical.push(control.to_byte());
    logical.push(bcc1(address, control));
    logical.extend_from_slice(payload);
    logical.push(checksum_xor(payload));

    let stuffed = stuff(&logical);
    let mut wire = Vec::with_capacity(stuffed.len() + 2);
    wire.push(FLAG);
    wire.extend_from_slice(&stuffed);
    wire.push(FLAG);
    wire
}

/// Largest stuffed body (payload plus BCC2) a frame of `max_payload` can have.
pub fn max_stuffed_len(max_payload: usize) -> usize {
    2 * (max_payload + 1)
}

// ============================================================================
// Tests
// ============================================================================
