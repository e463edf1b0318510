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

//! File transfer packets carried as link frame payloads.
//!
//! ```text
//!  DATA   [0x01, seq, len_hi, len_lo, data...]
//!  START  [0x02, 0x00, L1, size (L1 bytes, big-endian), 0x01, L2, name (L2 bytes)]
//!  END    [0x03, same TLVs as START]
//! ```

use thiserror::Error;

/// Data packet
pub const PKT_DATA: u8 = 0x01;

/// Start of file - carries size and name
pub const PKT_START: u8 = 0x02;

/// End of file - repeats size and name
pub const PKT_END: u8 = 0x03;

/// TLV type - file size
pub const TLV_SIZE: u8 = 0x00;

/// TLV type - file name
pub const TLV_NAME: u8 = 0x01;

/// Bytes in front of the data of a DATA packet
pub const DATA_HEADER_LEN: usize = 4;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PacketError {
    #[error("empty packet")]
    Empty,

    #[error("unknown packet type 0x{0:02X}")]
    UnknownType(u8),

    #[error("packet truncated")]
    Truncated,

    #[error("unexpected TLV type 0x{0:02X}")]
    UnexpectedField(u8),

    #[error("file size field of {0} bytes is too long")]
    SizeOverflow(usize),

    #[error("file name is not valid UTF-8")]
    InvalidName,

    #[error("{0} bytes do not fit in one packet")]
    TooLong(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub size: u64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Start(FileInfo),
    Data { sequence: u8, data: Vec<u8> },
    End(FileInfo),
}

impl Packet {
    pub fn encode(&self) -> Result<Vec<u8>, PacketError> {
        match self {
            Packet::Start(info) => encode_control(PKT_START, info),
            Packet::End(info) => encode_control(PKT_END, info),
            Packet::Data { sequence, data } => {
                let len = u16::try_from(data.len()).map_err(|_| PacketError::TooLong(data.len()))?;
                let mut out = Vec::with_capacity(DATA_HEADER_LEN + data.len());
                out.push(PKT_DATA);
                out.push(*sequence);
                out.extend_from_slice(&len.to_be_bytes());
                out.extend_from_slice(data);
                Ok(out)
            }
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<Packet, PacketError> {
        let (&kind, rest) = bytes.split_first().ok_or(PacketError::Empty)?;
        match kind {
            PKT_DATA => {
                let [sequence, hi, lo, data @ ..] = rest else {
                    return Err(PacketError::Truncated);
                };
                let len = u16::from_be_bytes([*hi, *lo]) as usize;
                let data = data.get(..len).ok_or(PacketError::Truncated)?;
                Ok(Packet::Data { sequence: *sequence, data: data.to_vec() })
            }
            PKT_START => Ok(Packet::Start(decode_control(rest)?)),
            PKT_END => Ok(Packet::End(decode_control(rest)?)),
            other => Err(PacketError::UnknownType(other)),
        }
    }
}

fn encode_control(kind: u8, info: &FileInfo) -> Result<Vec<u8>, PacketError> {
    let size = size_bytes(info.size);
    let name = info.name.as_bytes();
    let name_len = u8::try_from(name.len()).map_err(|_| PacketError::TooLong(name.len()))?;

    let mut out = Vec::with_capacity(5 + size.len() + name.len());
    out.push(kind);
    out.push(TLV_SIZE);
    out.push(size.len() as u8);
    out.extend_from_slice(&size);
    out.push(TLV_NAME);
    out.push(name_len);
    out.extend_from_slice(name);
    Ok(out)
}

fn decode_control(bytes: &[u8]) -> Result<FileInfo, PacketError> {
    let (size_field, rest) = read_tlv(bytes, TLV_SIZE)?;
    if size_field.len() > 8 {
        return Err(PacketError::SizeOverflow(size_field.len()));
    }
    let size = size_field.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64);

    let (name_field, _) = read_tlv(rest, TLV_NAME)?;
    let name = String::from_utf8(name_field.to_vec()).map_err(|_| PacketError::InvalidName)?;

    Ok(FileInfo { size, name })
}

fn read_tlv(bytes: &[u8], expected: u8) -> Result<(&[u8], &[u8]), PacketError> {
    let [kind, len, rest @ ..] = bytes else {
        return Err(PacketError::Truncated);
    };
    if *kind != expected {
        return Err(PacketError::UnexpectedField(*kind));
    }
    let len = *len as usize;
    if rest.len() < len {
        return Err(PacketError::Truncated);
    }
    Ok(rest.split_at(len))
}

/// Minimal big-endian encoding, at least one byte.
fn size_bytes(size: u64) -> Vec<u8> {
    let bytes = size.to_be_bytes();
    let skip = bytes.iter().take_while(|&&b| b == 0).count().min(7);
    bytes[skip..].to_vec()
}

// ============================================================================
// Tests
// ============================================================================
