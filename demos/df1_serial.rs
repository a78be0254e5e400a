//! Example: SLC 500 data tables over DF1
//!
//! Run with: cargo run --example df1_serial
//!
//! The serial port is reached through a serial-to-TCP bridge (e.g. ser2net
//! listening on port 4001). Any byte channel works once it implements
//! `Transport` and hands back one complete frame per request.
//!
//! This example demonstrates:
//! - Implementing `Transport` for a byte stream
//! - Full-duplex DF1 with CRC16 trailers
//! - Reading and writing integer and float files
//! - Setting a single bit in a bit file
//! - Reading the same table through EtherNet/IP with Execute PCCC

use ab_eip::checksum::CheckMode;
use ab_eip::df1::{DLE, ETX};
use ab_eip::{Client, ClientConfig, Df1Client, Df1Config, Result, Transport};
use std::io::{Read, Write};
use std::net::{Ipv4Addr, TcpStream};
use std::time::Duration;

/// Serial bridge that reads until `DLE ETX` and the trailer.
struct SerialBridge {
    stream: TcpStream,
    trailer_len: usize,
}

impl SerialBridge {
    fn connect(addr: &str, mode: CheckMode) -> Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_read_timeout(Some(Duration::from_secs(3)))?;
        Ok(Self {
            stream,
            trailer_len: mode.trailer_len(),
        })
    }

    fn read_byte(&mut self) -> Result<u8> {
        let mut byte = [0u8; 1];
        self.stream.read_exact(&mut byte)?;
        Ok(byte[0])
    }
}

impl Transport for SerialBridge {
    fn send_receive(&mut self, request: &[u8]) -> Result<Vec<u8>> {
        self.send(request)?;
        let mut frame = Vec::new();
        let mut escaped = false;
        loop {
            let byte = self.read_byte()?;
            frame.push(byte);
            if escaped {
                escaped = false;
                if byte == ETX {
                    break;
                }
            } else if byte == DLE {
                escaped = true;
            }
        }
        for _ in 0..self.trailer_len {
            frame.push(self.read_byte()?);
        }
        Ok(frame)
    }

    fn send(&mut self, request: &[u8]) -> Result<()> {
        self.stream.write_all(request)?;
        Ok(())
    }
}

fn main() -> Result<()> {
    // =========================================================================
    // Open the DF1 link
    // =========================================================================

    let bridge = SerialBridge::connect("127.0.0.1:4001", CheckMode::Crc16)?;
    let config = Df1Config::new(1, 0).with_check_mode(CheckMode::Crc16);
    let mut df1 = Df1Client::new(bridge, config);

    // =========================================================================
    // Integer and Float Files
    // =========================================================================

    println!("=== Data Tables over DF1 ===\n");

    let words = df1.read_words("N7:0", 4)?;
    println!("N7:0-N7:3 = {words:?}");

    df1.write_words("N7:10", &[100, 200])?;
    println!("N7:10-N7:11 written");

    let raw = df1.read("F8:0", 4)?;
    let value = f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
    println!("F8:0 = {value:.3}");

    // Node 2 on the same link
    let remote = df1.read_words("dst=2;N7:0", 1)?;
    println!("node 2 N7:0 = {}", remote[0]);

    // =========================================================================
    // Bits
    // =========================================================================

    println!("\n=== Bits ===\n");

    df1.write_bit("B3:0/4", true)?;
    let word = df1.read_words("B3:0", 1)?[0];
    println!("B3:0 = 0b{word:016b} (bit 4 = {})", word & (1 << 4) != 0);

    // =========================================================================
    // Same table through EtherNet/IP
    // =========================================================================

    println!("\n=== Execute PCCC ===\n");

    let mut client = Client::connect(ClientConfig::new(Ipv4Addr::new(192, 168, 1, 20)))?;
    let data = client.read_pccc("N7:0", 8)?;
    println!("N7:0-N7:3 via EtherNet/IP = {data:02X?}");
    client.write_pccc_bit("B3/20", false)?;
    client.close();

    Ok(())
}
