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
use std::io::Write;
use std::path::{Path, PathBuf};
use log::{debug, info, warn};
use thiserror::Error;
use crate::error::LinkError;
use crate::link::{Connection, LinkConfig, Received};
use crate::packet::{FileInfo, Packet, PacketError};
use crate::serial::Channel;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ReceiverError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("link error: {0}")]
    Link(#[from] LinkError),

    #[error("packet error: {0}")]
    Packet(#[from] PacketError),

    #[error("invalid file name: {0:?}")]
    InvalidFileName(String),

    #[error("link is not connected")]
    NotConnected,

    #[error("Transfer complete")]
    TransferComplete,
}

// ============================================================================
// States
// ============================================================================

pub struct Connect;
pub struct AwaitStart;
pub struct ReceiveData;
pub struct Disconnect;

// ============================================================================
// FSM Structure
// ============================================================================

pub struct ReceiverFsm<State> {
    state: PhantomData<State>,
    channel: Option<Box<dyn Channel>>,
    link: Option<Connection>,
    config: LinkConfig,
    output_dir: PathBuf,
    current_file: Option<File>,
    info: Option<FileInfo>,
    expected_sequence: u8,
    bytes_received: u64,
    files_received: usize,
    show_statistics: bool,
}

// ============================================================================
// Trait
// ============================================================================

pub trait ReceiverState: Send {
    fn step(self: Box<Self>) -> Result<Box<dyn ReceiverState>, ReceiverError>;
}

// ============================================================================
// Helper to transition states
// ============================================================================

impl<S> ReceiverFsm<S> {
    fn transition<T>(self) -> Box<ReceiverFsm<T>> {
        Box::new(ReceiverFsm {
            state: PhantomData,
            channel: self.channel,
            link: self.link,
            config: self.config,
            output_dir: self.output_dir,
            current_file: self.current_file,
            info: self.info,
            expected_sequence: self.expected_sequence,
            bytes_received: self.bytes_received,
            files_received: self.files_received,
            show_statistics: self.show_statistics,
        })
    }

    fn receive(&mut self) -> Result<Received, ReceiverError> {
        let link = self.link.as_mut().ok_or(ReceiverError::NotConnected)?;
        Ok(link.receive_frame()?)
    }
}

// ============================================================================
// State Implementations
// ============================================================================

impl ReceiverState for ReceiverFsm<Connect> {
    fn step(self: Box<Self>) -> Result<Box<dyn ReceiverState>, ReceiverError> {
        let mut fsm = *self;
        let channel = fsm.channel.take().ok_or(ReceiverError::NotConnected)?;
        fsm.link = Some(Connection::open(channel, fsm.config.clone())?);
        let next = fsm.transition::<AwaitStart>();
        Ok(next as Box<dyn ReceiverState>)
    }
}

impl ReceiverState for ReceiverFsm<AwaitStart> {
    fn step(self: Box<Self>) -> Result<Box<dyn ReceiverState>, ReceiverError> {
        let mut fsm = *self;

        let payload = match fsm.receive()? {
            Received::Payload(payload) => payload,
            Received::Disconnected => {
                if fsm.files_received == 0 {
                    warn!("Transmitter disconnected before sending a file");
                }
                let next = fsm.transition::<Disconnect>();
                return Ok(next as Box<dyn ReceiverState>);
            }
        };

        match Packet::decode(&payload) {
            Ok(Packet::Start(info)) => {
                let path = fsm.output_dir.join(safe_file_name(&info.name)?);
                info!("Receiving {} ({} bytes) into {}", info.name, info.size, path.display());
                fsm.current_file = Some(File::create(&path)?);
                fsm.info = Some(info);
                fsm.expected_sequence = 0;
                fsm.bytes_received = 0;
                let next = fsm.transition::<ReceiveData>();
                Ok(next as Box<dyn ReceiverState>)
            }
            Ok(other) => {
                warn!("Expected a start packet, ignoring {:?}", packet_kind(&other));
                Ok(Box::new(fsm) as Box<dyn ReceiverState>)
            }
            Err(e) => {
                warn!("Discarding undecodable packet: {}", e);
                Ok(Box::new(fsm) as Box<dyn ReceiverState>)
            }
        }
    }
}

impl ReceiverState for ReceiverFsm<ReceiveData> {
    fn step(self: Box<Self>) -> Result<Box<dyn ReceiverState>, ReceiverError> {
        let mut fsm = *self;

        let payload = match fsm.receive()? {
            Received::Payload(payload) => payload,
            Received::Disconnected => {
                if let Some(ref info) = fsm.info {
                    warn!(
                        "Transmitter disconnected during {} after {} of {} bytes",
                        info.name, fsm.bytes_received, info.size
                    );
                }
                fsm.current_file = None;
                let next = fsm.transition::<Disconnect>();
                return Ok(next as Box<dyn ReceiverState>);
            }
        };

        match Packet::decode(&payload) {
            Ok(Packet::Data { sequence, data }) => {
                if sequence != fsm.expected_sequence {
                    warn!(
                        "Data packet {} out of order, expected {}",
                        sequence, fsm.expected_sequence
                    );
                }
                if let Some(ref mut file) = fsm.current_file {
                    file.write_all(&data)?;
                }
                fsm.expected_sequence = sequence.wrapping_add(1);
                fsm.bytes_received += data.len() as u64;
                debug!("Received data packet {} ({} bytes, {} total)", sequence, data.len(), fsm.bytes_received);
                Ok(Box::new(fsm) as Box<dyn ReceiverState>)
            }
            Ok(Packet::End(end)) => {
                if let Some(mut file) = fsm.current_file.take() {
                    file.flush()?;
                }
                if let Some(start) = fsm.info.take() {
                    if start != end {
                        warn!("End packet {:?} does not match start packet {:?}", end, start);
                    }
                    if fsm.bytes_received != start.size {
                        warn!(
                            "{}: received {} bytes, expected {}",
                            start.name, fsm.bytes_received, start.size
                        );
                    }
                }
                info!("Received {} ({} bytes)", end.name, fsm.bytes_received);
                fsm.files_received += 1;
                let next = fsm.transition::<AwaitStart>();
                Ok(next as Box<dyn ReceiverState>)
            }
            Ok(Packet::Start(info)) => {
                warn!("Start packet for {} while a file is open, ignoring", info.name);
                Ok(Box::new(fsm) as Box<dyn ReceiverState>)
            }
            Err(e) => {
                warn!("Discarding undecodable packet: {}", e);
                Ok(Box::new(fsm) as Box<dyn ReceiverState>)
            }
        }
    }
}

impl ReceiverState for ReceiverFsm<Disconnect> {
    fn step(self: Box<Self>) -> Result<Box<dyn ReceiverState>, ReceiverError> {
        let mut fsm = *self;
        let link = fsm.link.take().ok_or(ReceiverError::NotConnected)?;
        link.close(fsm.show_statistics)?;
        info!("{} file(s) received", fsm.files_received);
        Err(ReceiverError::TransferComplete)
    }
}

// ============================================================================
// Constructor & Runner
// ============================================================================

impl ReceiverFsm<Connect> {
    pub fn new(
        channel: Box<dyn Channel>,
        config: LinkConfig,
        output_dir: PathBuf,
        show_statistics: bool,
    ) -> Box<dyn ReceiverState> {
        Box::new(ReceiverFsm {
            state: PhantomData::<Connect>,
            channel: Some(channel),
            link: None,
            config,
            output_dir,
            current_file: None,
            info: None,
            expected_sequence: 0,
            bytes_received: 0,
            files_received: 0,
            show_statistics,
        })
    }
}

/// Step the machine until the transmitter disconnects or the link fails.
pub fn run(mut fsm: Box<dyn ReceiverState>) -> Result<(), ReceiverError> {
    loop {
        match fsm.step() {
            Ok(next) => fsm = next,
            Err(ReceiverError::TransferComplete) => return Ok(()),
            Err(e) => return Err(e),
        }
    }
}

/// Only the final path component of a transmitted name is used.
fn safe_file_name(name: &str) -> Result<&Path, ReceiverError> {
    Path::new(name)
        .file_name()
        .map(Path::new)
        .ok_or_else(|| ReceiverError::InvalidFileName(name.to_string()))
}

fn packet_kind(packet: &Packet) -> &'static str {
    match packet {
        Packet::Start(_) => "start",
        Packet::Data { .. } => "data",
        Packet::End(_) => "end",
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_information;
    use crate::frame::{Address, Control, SeqBit, build_supervisory};
    use crate::link::Role;
    use crate::link::test_support::*;
    use crate::serial::MockSerialPort;

    fn supervisory(address: Address, control: Control) -> Vec<u8> {
        build_supervisory(address, control).to_vec()
    }

    fn info_frame(seq: SeqBit, packet: &Packet) -> Vec<u8> {
        encode_information(Address::Transmitter, seq, &packet.encode().unwrap())
    }

    fn output_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(name);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// Script a session delivering `packets` in order, then the teardown.
    fn session(packets: &[Packet]) -> (Vec<Option<u8>>, Vec<u8>) {
        let mut responses = bytes(&supervisory(Address::Transmitter, Control::Set));
        let mut expected_writes = supervisory(Address::Transmitter, Control::Ua);

        let mut seq = SeqBit::Zero;
        for packet in packets {
            responses.extend(bytes(&info_frame(seq, packet)));
            seq = seq.toggle();
            expected_writes.extend(supervisory(Address::Transmitter, Control::Rr(seq)));
        }

        responses.extend(bytes(&supervisory(Address::Transmitter, Control::Disc)));
        responses.extend(bytes(&supervisory(Address::Receiver, Control::Ua)));
        expected_writes.extend(supervisory(Address::Receiver, Control::Disc));
        (responses, expected_writes)
    }

    #[test]
    fn test_safe_file_name() {
        assert_eq!(safe_file_name("penguin.gif").unwrap(), Path::new("penguin.gif"));
        assert_eq!(safe_file_name("../../etc/passwd").unwrap(), Path::new("passwd"));
        assert_eq!(safe_file_name("/tmp/x.bin").unwrap(), Path::new("x.bin"));
        assert!(safe_file_name("..").is_err());
        assert!(safe_file_name("").is_err());
    }

    #[test]
    fn test_receiver_full_transfer() {
        let dir = output_dir("arqlink_receiver_full");
        let info = FileInfo { size: 9, name: "small.txt".to_string() };
        let (responses, expected_writes) = session(&[
            Packet::Start(info.clone()),
            Packet::Data { sequence: 0, data: b"Test data".to_vec() },
            Packet::End(info),
        ]);

        let mock = Box::new(MockSerialPort::new(responses, expected_writes).expect_close());
        let fsm = ReceiverFsm::new(mock, test_config(Role::Receiver), dir.clone(), true);

        match run(fsm) {
            Ok(()) => {},
            Err(e) => panic!("Transfer failed: {:?}", e),
        }

        let filepath = dir.join("small.txt");
        let content = std::fs::read(&filepath).expect("Should read file");
        assert_eq!(content, b"Test data");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_receiver_multiple_files() {
        let dir = output_dir("arqlink_receiver_multi");
        let first = FileInfo { size: 4, name: "one.bin".to_string() };
        let second = FileInfo { size: 6, name: "two.bin".to_string() };
        let (responses, expected_writes) = session(&[
            Packet::Start(first.clone()),
            Packet::Data { sequence: 0, data: vec![0x7E, 0x7D, 0x7E, 0x7D] },
            Packet::End(first),
            Packet::Start(second.clone()),
            Packet::Data { sequence: 0, data: b"abc".to_vec() },
            Packet::Data { sequence: 1, data: b"def".to_vec() },
            Packet::End(second),
        ]);

        let mock = Box::new(MockSerialPort::new(responses, expected_writes).expect_close());
        let fsm = ReceiverFsm::new(mock, test_config(Role::Receiver), dir.clone(), false);
        run(fsm).expect("transfer");

        assert_eq!(std::fs::read(dir.join("one.bin")).unwrap(), vec![0x7E, 0x7D, 0x7E, 0x7D]);
        assert_eq!(std::fs::read(dir.join("two.bin")).unwrap(), b"abcdef");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_receiver_tolerates_bad_packets() {
        let dir = output_dir("arqlink_receiver_bad");
        let info = FileInfo { size: 2, name: "ok.txt".to_string() };
        let stray = Packet::Data { sequence: 9, data: b"zz".to_vec() };

        let mut responses = bytes(&supervisory(Address::Transmitter, Control::Set));
        let mut expected_writes = supervisory(Address::Transmitter, Control::Ua);

        // Stray data before start, then an undecodable payload
        responses.extend(bytes(&info_frame(SeqBit::Zero, &stray)));
        expected_writes.extend(supervisory(Address::Transmitter, Control::Rr(SeqBit::One)));
        responses.extend(bytes(&encode_information(Address::Transmitter, SeqBit::One, &[0x44])));
        expected_writes.extend(supervisory(Address::Transmitter, Control::Rr(SeqBit::Zero)));

        responses.extend(bytes(&info_frame(SeqBit::Zero, &Packet::Start(info.clone()))));
        expected_writes.extend(supervisory(Address::Transmitter, Control::Rr(SeqBit::One)));
        responses.extend(bytes(&info_frame(SeqBit::One, &Packet::Data { sequence: 0, data: b"ok".to_vec() })));
        expected_writes.extend(supervisory(Address::Transmitter, Control::Rr(SeqBit::Zero)));
        responses.extend(bytes(&info_frame(SeqBit::Zero, &Packet::End(info))));
        expected_writes.extend(supervisory(Address::Transmitter, Control::Rr(SeqBit::One)));

        responses.extend(bytes(&supervisory(Address::Transmitter, Control::Disc)));
        responses.extend(bytes(&supervisory(Address::Receiver, Control::Ua)));
        expected_writes.extend(supervisory(Address::Receiver, Control::Disc));

        let mock = Box::new(MockSerialPort::new(responses, expected_writes).expect_close());
        let fsm = ReceiverFsm::new(mock, test_config(Role::Receiver), dir.clone(), false);
        run(fsm).expect("transfer");

        assert_eq!(std::fs::read(dir.join("ok.txt")).unwrap(), b"ok");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_receiver_disconnect_mid_file() {
        let dir = output_dir("arqlink_receiver_partial");
        let info = FileInfo { size: 100, name: "partial.bin".to_string() };
        let (responses, expected_writes) = session(&[
            Packet::Start(info),
            Packet::Data { sequence: 0, data: vec![1, 2, 3] },
        ]);

        let mock = Box::new(MockSerialPort::new(responses, expected_writes).expect_close());
        let fsm = ReceiverFsm::new(mock, test_config(Role::Receiver), dir.clone(), false);
        run(fsm).expect("disconnect is not an error");

        assert_eq!(std::fs::read(dir.join("partial.bin")).unwrap(), vec![1, 2, 3]);
        std::fs::remove_dir_all(&dir).ok();
    }
}
