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

use std::marker::PhantomData;
use std::fs::File;
use std::path::PathBuf;
use std::io::Read;
use log::{debug, info};
use thiserror::Error;
use crate::error::LinkError;
use crate::link::{Connection, LinkConfig};
use crate::packet::{DATA_HEADER_LEN, FileInfo, Packet, PacketError};
use crate::serial::Channel;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum SenderError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("link error: {0}")]
    Link(#[from] LinkError),

    #[error("packet error: {0}")]
    Packet(#[from] PacketError),

    #[error("link is not connected")]
    NotConnected,

    #[error("Transfer complete")]
    TransferComplete,
}

// ============================================================================
// States
// ============================================================================

pub struct Connect;
pub struct SendStart;
pub struct SendData;
pub struct SendEnd;
pub struct Disconnect;

// ============================================================================
// FSM Structure
// ============================================================================

pub struct SenderFsm<State> {
    state: PhantomData<State>,
    channel: Option<Box<dyn Channel>>,
    link: Option<Connection>,
    config: LinkConfig,
    files: Vec<PathBuf>,
    current_file: Option<File>,
    info: Option<FileInfo>,
    sequence: u8,
    bytes_sent: u64,
    show_statistics: bool,
}

// ============================================================================
// Trait
// ============================================================================

pub trait SenderState: Send {
    fn step(self: Box<Self>) -> Result<Box<dyn SenderState>, SenderError>;
}

// ============================================================================
// Helper to transition states
// ============================================================================

impl<S> SenderFsm<S> {
    fn transition<T>(self) -> Box<SenderFsm<T>> {
        Box::new(SenderFsm {
            state: PhantomData,
            channel: self.channel,
            link: self.link,
            config: self.config,
            files: self.files,
            current_file: self.current_file,
            info: self.info,
            sequence: self.sequence,
            bytes_sent: self.bytes_sent,
            show_statistics: self.show_statistics,
        })
    }

    fn link(&mut self) -> Result<&mut Connection, SenderError> {
        self.link.as_mut().ok_or(SenderError::NotConnected)
    }

    fn send_packet(&mut self, packet: &Packet) -> Result<(), SenderError> {
        let payload = packet.encode()?;
        self.link()?.send_frame(&payload)?;
        Ok(())
    }

    fn chunk_size(&self) -> usize {
        self.config.max_payload.saturating_sub(DATA_HEADER_LEN).clamp(1, u16::MAX as usize)
    }
}

// ============================================================================
// State Implementations
// ============================================================================

impl SenderState for SenderFsm<Connect> {
    fn step(self: Box<Self>) -> Result<Box<dyn SenderState>, SenderError> {
        let mut fsm = *self;
        let channel = fsm.channel.take().ok_or(SenderError::NotConnected)?;
        fsm.link = Some(Connection::open(channel, fsm.config.clone())?);
        let next = fsm.transition::<SendStart>();
        Ok(next as Box<dyn SenderState>)
    }
}

impl SenderState for SenderFsm<SendStart> {
    fn step(self: Box<Self>) -> Result<Box<dyn SenderState>, SenderError> {
        let mut fsm = *self;
        let path = fsm.files[0].clone();
        let file = File::open(&path)?;
        let size = file.metadata()?.len();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let info = FileInfo { size, name };
        info!("Sending {} ({} bytes)", info.name, info.size);
        fsm.send_packet(&Packet::Start(info.clone()))?;

        fsm.current_file = Some(file);
        fsm.info = Some(info);
        fsm.sequence = 0;
        fsm.bytes_sent = 0;
        let next = fsm.transition::<SendData>();
        Ok(next as Box<dyn SenderState>)
    }
}

impl SenderState for SenderFsm<SendData> {
    fn step(self: Box<Self>) -> Result<Box<dyn SenderState>, SenderError> {
        let mut fsm = *self;

        let mut data = vec![0u8; fsm.chunk_size()];
        let bytes_read = match fsm.current_file {
            Some(ref mut file) => file.read(&mut data)?,
            None => 0,
        };

        if bytes_read == 0 {
            let next = fsm.transition::<SendEnd>();
            return Ok(next as Box<dyn SenderState>);
        }

        data.truncate(bytes_read);
        let sequence = fsm.sequence;
        fsm.send_packet(&Packet::Data { sequence, data })?;
        fsm.sequence = sequence.wrapping_add(1);
        fsm.bytes_sent += bytes_read as u64;
        debug!("Sent data packet {} ({} bytes, {} total)", sequence, bytes_read, fsm.bytes_sent);

        Ok(Box::new(fsm) as Box<dyn SenderState>)
    }
}

impl SenderState for SenderFsm<SendEnd> {
    fn step(self: Box<Self>) -> Result<Box<dyn SenderState>, SenderError> {
        let mut fsm = *self;
        if let Some(info) = fsm.info.take() {
            fsm.send_packet(&Packet::End(info.clone()))?;
            info!("Sent {} ({} bytes)", info.name, fsm.bytes_sent);
        }

        fsm.current_file = None;
        fsm.files.remove(0);

        if fsm.files.is_empty() {
            let next = fsm.transition::<Disconnect>();
            Ok(next as Box<dyn SenderState>)
        } else {
            debug!("{} files remaining", fsm.files.len());
            let next = fsm.transition::<SendStart>();
            Ok(next as Box<dyn SenderState>)
        }
    }
}

impl SenderState for SenderFsm<Disconnect> {
    fn step(self: Box<Self>) -> Result<Box<dyn SenderState>, SenderError> {
        let mut fsm = *self;
        let link = fsm.link.take().ok_or(SenderError::NotConnected)?;
        link.close(fsm.show_statistics)?;
        Err(SenderError::TransferComplete)
    }
}

// ============================================================================
// Constructor & Runner
// ============================================================================

impl SenderFsm<Connect> {
    pub fn new(
        channel: Box<dyn Channel>,
        config: LinkConfig,
        files: Vec<PathBuf>,
        show_statistics: bool,
    ) -> Result<Box<dyn SenderState>, SenderError> {
        if files.is_empty() {
            return Err(SenderError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "No files to send",
            )));
        }

        Ok(Box::new(SenderFsm {
            state: PhantomData::<Connect>,
            channel: Some(channel),
            link: None,
            config,
            files,
            current_file: None,
            info: None,
            sequence: 0,
            bytes_sent: 0,
            show_statistics,
        }))
    }
}

/// Step the machine until the transfer completes or fails.
pub fn run(mut fsm: Box<dyn SenderState>) -> Result<(), SenderError> {
    loop {
        match fsm.step() {
            Ok(next) => fsm = next,
            Err(SenderError::TransferComplete) => return Ok(()),
            Err(e) => return Err(e),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
