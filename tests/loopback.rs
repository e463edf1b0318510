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

//! Both ends of the link running on threads over an in-memory line.

use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use arqlink::frame::{Address, Control, SeqBit, Supervisory, recognize};
use arqlink::receiver::{self, ReceiverFsm};
use arqlink::sender::{self, SenderFsm};
use arqlink::{Channel, Connection, LinkConfig, LinkError, LoopbackChannel, Received, Role, Statistics};

fn config(role: Role) -> LinkConfig {
    let mut config = LinkConfig::new(role);
    config.max_retries = 5;
    config.timeout = Duration::from_millis(500);
    config.read_timeout = Duration::from_millis(20);
    config.max_payload = 64;
    config
}

/// Receive until the transmitter disconnects, then close.
fn receive_all(channel: Box<dyn Channel>) -> (Vec<Vec<u8>>, Statistics) {
    let mut conn = Connection::open(channel, config(Role::Receiver)).expect("receiver open");
    let mut delivered = Vec::new();
    loop {
        match conn.receive_frame().expect("receive") {
            Received::Payload(payload) => delivered.push(payload),
            Received::Disconnected => break,
        }
    }
    let stats = conn.close(true).expect("receiver close");
    (delivered, stats)
}

fn send_all(channel: Box<dyn Channel>, payloads: &[Vec<u8>]) -> Statistics {
    let mut conn = Connection::open(channel, config(Role::Transmitter)).expect("transmitter open");
    for payload in payloads {
        conn.send_frame(payload).expect("send");
    }
    conn.close(true).expect("transmitter close")
}

/// Corrupts one payload bit of the first information frame written.
struct CorruptFirstInfo {
    inner: LoopbackChannel,
    done: bool,
}

impl Channel for CorruptFirstInfo {
    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        let is_info = buf.len() > 5 && buf[2] & 0xBF == 0;
        if is_info && !self.done {
            self.done = true;
            let mut corrupted = buf.to_vec();
            corrupted[4] ^= 0x01;
            return self.inner.write_all(&corrupted);
        }
        self.inner.write_all(buf)
    }

    fn read_byte(&mut self, timeout: Duration) -> std::io::Result<Option<u8>> {
        self.inner.read_byte(timeout)
    }
}

/// Swallows the first supervisory frame matching `target`.
struct DropFirst {
    inner: LoopbackChannel,
    target: Supervisory,
    done: bool,
}

impl Channel for DropFirst {
    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        if !self.done && recognize(buf) == Some(self.target) {
            self.done = true;
            return Ok(());
        }
        self.inner.write_all(buf)
    }

    fn read_byte(&mut self, timeout: Duration) -> std::io::Result<Option<u8>> {
        self.inner.read_byte(timeout)
    }
}

#[test]
fn test_transfer_over_loopback() {
    let (tx_end, rx_end) = LoopbackChannel::pair();
    let payloads = vec![
        b"hello".to_vec(),
        vec![0x7E, 0x7D, 0x7E, 0x7D, 0x5E, 0x5D],
        Vec::new(),
        (0..64).map(|i| i as u8).collect::<Vec<u8>>(),
        vec![0x7E; 64],
    ];

    let receiver = thread::spawn(move || receive_all(Box::new(rx_end)));
    let tx_stats = send_all(Box::new(tx_end), &payloads);
    let (delivered, rx_stats) = receiver.join().expect("receiver thread");

    assert_eq!(delivered, payloads);
    assert_eq!(tx_stats.frames_sent, payloads.len() as u64);
    assert_eq!(tx_stats.retransmissions, 0);
    assert_eq!(rx_stats.frames_received, payloads.len() as u64);
    assert_eq!(rx_stats.duplicates, 0);
}

#[test]
fn test_corrupted_frame_rejected_and_resent() {
    let (tx_end, rx_end) = LoopbackChannel::pair();
    let tx_end = CorruptFirstInfo { inner: tx_end, done: false };
    let payloads = vec![b"hello world".to_vec(), b"second".to_vec()];

    let receiver = thread::spawn(move || receive_all(Box::new(rx_end)));
    let tx_stats = send_all(Box::new(tx_end), &payloads);
    let (delivered, rx_stats) = receiver.join().expect("receiver thread");

    assert_eq!(delivered, payloads);
    assert_eq!(rx_stats.rejects_sent, 1);
    assert_eq!(tx_stats.rejects_received, 1);
    assert_eq!(tx_stats.retransmissions, 1);
}

#[test]
fn test_lost_ack_causes_duplicate_not_redelivery() {
    let (tx_end, rx_end) = LoopbackChannel::pair();
    let rr1 = Supervisory::new(Address::Transmitter, Control::Rr(SeqBit::One));
    let rx_end = DropFirst { inner: rx_end, target: rr1, done: false };
    let payloads = vec![b"first".to_vec(), b"second".to_vec()];

    let receiver = thread::spawn(move || receive_all(Box::new(rx_end)));
    let tx_stats = send_all(Box::new(tx_end), &payloads);
    let (delivered, rx_stats) = receiver.join().expect("receiver thread");

    assert_eq!(delivered, payloads);
    assert_eq!(rx_stats.duplicates, 1);
    assert!(tx_stats.timeouts >= 1);
    assert!(tx_stats.retransmissions >= 1);
}

#[test]
fn test_open_without_peer_times_out() {
    let (tx_end, _silent) = LoopbackChannel::pair();
    let mut config = config(Role::Transmitter);
    config.max_retries = 2;
    config.timeout = Duration::from_millis(50);

    match Connection::open(Box::new(tx_end), config) {
        Err(LinkError::ConnectionTimeout { retries }) => assert_eq!(retries, 2),
        Err(e) => panic!("unexpected error: {:?}", e),
        Ok(_) => panic!("open should time out"),
    }
}

#[test]
fn test_file_transfer_over_loopback() {
    let source_dir = std::env::temp_dir().join("arqlink_loopback_source");
    let output_dir = std::env::temp_dir().join("arqlink_loopback_output");
    std::fs::create_dir_all(&source_dir).unwrap();
    std::fs::create_dir_all(&output_dir).unwrap();

    let content: Vec<u8> = (0..1000u32).map(|i| (i * 7 % 256) as u8).collect();
    let files: Vec<PathBuf> = vec![source_dir.join("alpha.bin"), source_dir.join("beta.txt")];
    std::fs::write(&files[0], &content).unwrap();
    std::fs::write(&files[1], b"short text file").unwrap();

    let (tx_end, rx_end) = LoopbackChannel::pair();
    let rx_dir = output_dir.clone();
    let rx_thread = thread::spawn(move || {
        let fsm = ReceiverFsm::new(Box::new(rx_end), config(Role::Receiver), rx_dir, false);
        receiver::run(fsm)
    });

    let fsm = SenderFsm::new(Box::new(tx_end), config(Role::Transmitter), files, false)
        .expect("sender");
    sender::run(fsm).expect("send");
    rx_thread.join().expect("receiver thread").expect("receive");

    assert_eq!(std::fs::read(output_dir.join("alpha.bin")).unwrap(), content);
    assert_eq!(std::fs::read(output_dir.join("beta.txt")).unwrap(), b"short text file");

    std::fs::remove_dir_all(&source_dir).ok();
    std::fs::remove_dir_all(&output_dir).ok();
}
