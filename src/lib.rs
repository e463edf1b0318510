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

//! Stop-and-wait data link over a serial line.
//!
//! Frames are delimited by `0x7E` and byte stuffed. A transmitter sends one
//! information frame at a time and retransmits it on timeout or REJ until
//! the receiver acknowledges it with RR. On top of the link, [`sender`] and
//! [`receiver`] move whole files as START, DATA and END packets.

pub mod protocol;
pub mod error;
pub mod frame;
pub mod codec;
pub mod parser;
pub mod timer;
pub mod serial;
pub mod link;
pub mod handshake;
pub mod arq;
pub mod reader;
pub mod packet;
pub mod sender;
pub mod receiver;

pub use error::{LinkError, Result};
pub use link::{Connection, LinkConfig, Received, Role, Statistics};
pub use serial::{Channel, LoopbackChannel, RealSerialPort};
