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

//! Per-connection link state.
//!
//! A [`Connection`] owns everything the protocol mutates: the channel, the
//! parser, the retransmission timer, the sequence bit and the counters. The
//! operations live next to their state machines:
//! - `open` / `close` in [`crate::handshake`]
//! - `send_frame` in [`crate::arq`]
//! - `receive_frame` in [`crate::reader`]

use std::fmt;
use std::time::{Duration, Instant};
use log::debug;
use crate::error::{LinkError, Result};
use crate::frame::{Address, Control, SeqBit, build_supervisory};
use crate::parser::{FrameParser, ParsedFrame};
use crate::serial::Channel;
use crate::timer::RetransmitTimer;

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Transmitter,
    Receiver,
}

#[derive(Debug, Clone)]
pub struct LinkConfig {
    pub role: Role,
    /// Retransmissions allowed per frame before giving up
    pub max_retries: u32,
    /// Retransmission timeout
    pub timeout: Duration,
    /// Longest single wait for a byte from the channel
    pub read_timeout: Duration,
    /// Largest information frame payload
    pub max_payload: usize,
}

impl LinkConfig {
    pub fn new(role: Role) -> Self {
        LinkConfig {
            role,
            max_retries: 3,
            timeout: Duration::from_secs(3),
            read_timeout: Duration::from_millis(100),
            max_payload: 1000,
        }
    }
}

// ============================================================================
// Statistics
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Statistics {
    pub frames_sent: u64,
    pub bytes_sent: u64,
    pub retransmissions: u64,
    pub timeouts: u64,
    pub rejects_received: u64,
    pub frames_received: u64,
    pub duplicates: u64,
    pub rejects_sent: u64,
    pub elapsed: Duration,
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Frames sent:       {}", self.frames_sent)?;
        writeln!(f, "Bytes on the wire: {}", self.bytes_sent)?;
        writeln!(f, "Retransmissions:   {}", self.retransmissions)?;
        writeln!(f, "Timeouts:          {}", self.timeouts)?;
        writeln!(f, "REJ received:      {}", self.rejects_received)?;
        writeln!(f, "Frames delivered:  {}", self.frames_received)?;
        writeln!(f, "Duplicates:        {}", self.duplicates)?;
        writeln!(f, "REJ sent:          {}", self.rejects_sent)?;
        write!(f, "Elapsed:           {:.3}s", self.elapsed.as_secs_f64())
    }
}

// ============================================================================
// Connection
// ============================================================================

/// Outcome of [`Connection::receive_frame`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    Payload(Vec<u8>),
    /// The transmitter sent DISC; call [`Connection::close`] next.
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LinkState {
    Established,
    /// DISC seen from the peer; no more frames are accepted
    PeerClosed,
    /// Retry budget exhausted on a data frame
    Lost,
}

pub struct Connection {
    pub(crate) channel: Box<dyn Channel>,
    pub(crate) config: LinkConfig,
    pub(crate) parser: FrameParser,
    pub(crate) timer: RetransmitTimer,
    /// Transmitter: bit of the next frame to send. Receiver: bit expected next.
    pub(crate) seq: SeqBit,
    pub(crate) state: LinkState,
    pub(crate) stats: Statistics,
    pub(crate) opened_at: Instant,
}

impl Connection {
    pub(crate) fn new(channel: Box<dyn Channel>, config: LinkConfig) -> Self {
        Connection {
            channel,
            parser: FrameParser::new(config.max_payload),
            timer: RetransmitTimer::new(config.timeout),
            seq: SeqBit::Zero,
            state: LinkState::Established,
            stats: Statistics::default(),
            opened_at: Instant::now(),
            config,
        }
    }

    pub fn role(&self) -> Role {
        self.config.role
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    pub fn sequence(&self) -> SeqBit {
        self.seq
    }

    pub fn statistics(&self) -> Statistics {
        Statistics {
            elapsed: self.opened_at.elapsed(),
            ..self.stats.clone()
        }
    }

    pub(crate) fn require_role(&self, role: Role) -> Result<()> {
        if self.config.role == role {
            Ok(())
        } else {
            Err(LinkError::WrongRole(self.config.role))
        }
    }

    pub(crate) fn send_supervisory(&mut self, address: Address, control: Control) -> Result<()> {
        let frame = build_supervisory(address, control);
        self.channel.write_all(&frame)?;
        debug!("Sent: {:?} {:?}", address, control);
        Ok(())
    }

    /// Read at most one byte and feed it to the parser. `Ok(None)` covers
    /// both an idle line and a frame still in progress.
    pub(crate) fn poll_frame(&mut self) -> Result<Option<ParsedFrame>> {
        match self.channel.read_byte(self.config.read_timeout)? {
            Some(byte) => Ok(self.parser.feed(byte)),
            None => Ok(None),
        }
    }

    /// Stop the timer and hand the channel back to its owner.
    pub(crate) fn release(&mut self) -> Result<()> {
        self.timer.cancel();
        self.parser.reset();
        self.channel.close()?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Short timers so scripted timeouts stay fast; scripted idle reads
    /// sleep for `read_timeout`, which outlasts `timeout`.
    pub fn test_config(role: Role) -> LinkConfig {
        LinkConfig {
            role,
            max_retries: 3,
            timeout: Duration::from_millis(100),
            read_timeout: Duration::from_millis(150),
            max_payload: 64,
        }
    }

    pub fn bytes(frame: &[u8]) -> Vec<Option<u8>> {
        frame.iter().map(|&b| Some(b)).collect()
    }
}
