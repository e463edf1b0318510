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

//! Link protocol constants

/// Frame delimiter - opens and closes every frame
pub const FLAG: u8 = 0x7E;

/// Escape - prefixes a stuffed FLAG or ESC inside a frame
pub const ESC: u8 = 0x7D;

/// Second byte of a stuffed FLAG (`7D 5E`)
pub const ESC_FLAG: u8 = 0x5E;

/// Second byte of a stuffed ESC (`7D 5D`)
pub const ESC_ESC: u8 = 0x5D;

/// Address - commands sent by the transmitter and the receiver's replies
pub const A_TX: u8 = 0x03;

/// Address - commands sent by the receiver and the transmitter's replies
pub const A_RX: u8 = 0x01;

/// Set up - transmitter requests a connection
pub const C_SET: u8 = 0x03;

/// Unnumbered acknowledgment - accepts SET or DISC
pub const C_UA: u8 = 0x07;

/// Disconnect - either side tears the link down
pub const C_DISC: u8 = 0x0B;

/// Receiver ready, expecting frame 0
pub const C_RR0: u8 = 0x05;

/// Receiver ready, expecting frame 1
pub const C_RR1: u8 = 0x85;

/// Reject, retransmit frame 0
pub const C_REJ0: u8 = 0x01;

/// Reject, retransmit frame 1
pub const C_REJ1: u8 = 0x81;

/// Information frame, sequence 0
pub const C_I0: u8 = 0x00;

/// Information frame, sequence 1
pub const C_I1: u8 = 0x40;

/// Length of every supervisory frame on the wire
pub const SUPERVISORY_LEN: usize = 5;
