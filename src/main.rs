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

use clap::{Parser, Subcommand};
use log::info;
use serialport::{DataBits, Parity, StopBits};
use std::path::PathBuf;
use std::time::Duration;
use arqlink::packet::DATA_HEADER_LEN;
use arqlink::receiver::{self, ReceiverError, ReceiverFsm};
use arqlink::sender::{self, SenderError, SenderFsm};
use arqlink::{LinkConfig, RealSerialPort, Role};

#[derive(Parser)]
#[command(name = "arqlink")]
#[command(about = "Stop-and-wait file transfer over an RS-232 link", long_about = None)]
#[command(disable_help_subcommand = true)]
struct Cli {
    /// Serial port to use (e.g., /dev/ttyS0 or COM1)
    #[arg(short, long)]
    port: String,

    /// Baud rate
    #[arg(short, long, default_value = "9600")]
    baud: u32,

    /// Data bits (5, 6, 7, or 8)
    #[arg(long, default_value = "8", value_name = "BITS", value_parser = parse_data_bits)]
    data_bits: DataBits,

    /// Parity (none, odd, or even)
    #[arg(long, default_value = "none", value_parser = parse_parity)]
    parity: Parity,

    /// Stop bits (1 or 2)
    #[arg(long, default_value = "1", value_name = "BITS", value_parser = parse_stop_bits)]
    stop_bits: StopBits,

    /// Retransmissions per frame before giving up
    #[arg(long, default_value = "3")]
    retries: u32,

    /// Retransmission timeout in seconds
    #[arg(long, default_value = "3", value_name = "SECS")]
    timeout: u64,

    /// Largest frame payload in bytes
    #[arg(long, default_value = "1000", value_name = "BYTES")]
    max_payload: usize,

    /// Log link statistics when the connection closes
    #[arg(long)]
    statistics: bool,

    /// Enable debug output
    #[arg(long)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send files to a receiving peer
    Send {
        /// Files to send
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Receive files until the transmitter disconnects
    Receive {
        /// Directory to save received files
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
    },
}

fn parse_data_bits(bits: &str) -> Result<DataBits, String> {
    match bits.trim() {
        "5" => Ok(DataBits::Five),
        "6" => Ok(DataBits::Six),
        "7" => Ok(DataBits::Seven),
        "8" => Ok(DataBits::Eight),
        _ => Err(format!("{} is not 5, 6, 7 or 8", bits)),
    }
}

fn parse_parity(parity: &str) -> Result<Parity, String> {
    match parity.to_lowercase().as_str() {
        "none" | "n" => Ok(Parity::None),
        "odd" | "o" => Ok(Parity::Odd),
        "even" | "e" => Ok(Parity::Even),
        _ => Err(format!("{} is not none, odd or even", parity)),
    }
}

fn parse_stop_bits(bits: &str) -> Result<StopBits, String> {
    match bits.trim() {
        "1" => Ok(StopBits::One),
        "2" => Ok(StopBits::Two),
        _ => Err(format!("{} is not 1 or 2", bits)),
    }
}

/// Upper bound for `--timeout`
const MAX_TIMEOUT_SECS: u64 = 3600;

fn link_config(cli: &Cli, role: Role) -> Result<LinkConfig, String> {
    if cli.max_payload <= DATA_HEADER_LEN || cli.max_payload > u16::MAX as usize {
        return Err(format!(
            "Invalid max payload: {}. Must be between {} and {}",
            cli.max_payload,
            DATA_HEADER_LEN + 1,
            u16::MAX
        ));
    }
    if cli.timeout == 0 || cli.timeout > MAX_TIMEOUT_SECS {
        return Err(format!(
            "Invalid timeout: {}. Must be between 1 and {} seconds",
            cli.timeout, MAX_TIMEOUT_SECS
        ));
    }

    let mut config = LinkConfig::new(role);
    config.max_retries = cli.retries;
    config.timeout = Duration::from_secs(cli.timeout);
    config.max_payload = cli.max_payload;
    Ok(config)
}

fn exit_with(message: String) -> ! {
    eprintln!("Error: {}", message);
    std::process::exit(1);
}

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp_millis()
        .init();

    let role = match cli.command {
        Commands::Send { .. } => Role::Transmitter,
        Commands::Receive { .. } => Role::Receiver,
    };
    let config = link_config(&cli, role).unwrap_or_else(|e| exit_with(e));

    info!("Opening serial port: {}", cli.port);
    info!("Settings: {} baud, {:?}, {:?}, {:?}", cli.baud, cli.data_bits, cli.parity, cli.stop_bits);

    let port = RealSerialPort::open(&cli.port, cli.baud, cli.data_bits, cli.parity, cli.stop_bits);
    let serial_port = match port {
        Ok(port) => port,
        Err(e) => exit_with(format!("Failed to open serial port: {}", e)),
    };

    match cli.command {
        Commands::Send { files } => {
            if let Err(e) = send_files(serial_port, config, files, cli.statistics) {
                exit_with(format!("Send failed: {}", e));
            }
            info!("Files sent successfully");
        }
        Commands::Receive { output_dir } => {
            info!("Receiving files to: {}", output_dir.display());
            if let Err(e) = receive_files(serial_port, config, output_dir, cli.statistics) {
                exit_with(format!("Receive failed: {}", e));
            }
            info!("Files received successfully");
        }
    }
}

fn send_files(
    serial_port: RealSerialPort,
    config: LinkConfig,
    files: Vec<PathBuf>,
    statistics: bool,
) -> Result<(), SenderError> {
    for file in &files {
        if !file.is_file() {
            return Err(SenderError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("File not found: {}", file.display()),
            )));
        }
    }

    let fsm = SenderFsm::new(Box::new(serial_port), config, files, statistics)?;
    sender::run(fsm)
}

fn receive_files(
    serial_port: RealSerialPort,
    config: LinkConfig,
    output_dir: PathBuf,
    statistics: bool,
) -> Result<(), ReceiverError> {
    if !output_dir.is_dir() {
        return Err(ReceiverError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Output directory not found: {}", output_dir.display()),
        )));
    }

    let fsm = ReceiverFsm::new(Box::new(serial_port), config, output_dir, statistics);
    receiver::run(fsm)
}
