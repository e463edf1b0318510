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

//! Link layer error types.
//!
//! Checksum and framing faults on the wire are handled inside the engine
//! (REJ or silent resync). Only retry exhaustion, caller mistakes and
//! channel failures reach the application.

use thiserror::Error;

use crate::link::Role;

#[derive(Debug, Error)]
pub enum LinkError {
    /// No UA answered our SET within the retry budget.
    #[error("connection timed out after {retries} retransmissions of SET")]
    ConnectionTimeout { retries: u32 },

    /// The disconnect handshake did not complete within the retry budget.
    #[error("disconnect timed out after {retries} retransmissions of DISC")]
    DisconnectTimeout { retries: u32 },

    /// An information frame was never acknowledged; the link is unusable.
    #[error("link lost after {retries} retransmissions")]
    LinkLost { retries: u32 },

    #[error("payload of {len} bytes exceeds the {max} byte maximum")]
    PayloadTooLarge { len: usize, max: usize },

    /// Destuffing failed. Never returned by the connection itself.
    #[error("malformed frame")]
    MalformedFrame,

    #[error("operation not available to the {0:?} role")]
    WrongRole(Role),

    #[error("channel error: {0}")]
    Channel(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LinkError>;
