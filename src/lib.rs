//! # Allen-Bradley EtherNet/IP Protocol Library
//!
//! A Rust library for reading and writing Allen-Bradley controller tags over
//! EtherNet/IP (CIP), with the legacy PCCC command set for SLC 500 / PLC-5
//! data tables over both encapsulated sessions and DF1 serial links.
//!
//! This is a **protocol-only** library: no polling, schedulers or tag
//! databases. Each call produces a fixed sequence of request/reply exchanges.
//! No automatic retries, caching, or reconnection.
//!
//! ## Features
//!
//! - **Session handling** - Register/Unregister Session, optional backplane
//!   routing (Unconnected Send) and connected messaging (Forward Open)
//! - **Tag services** - Read/Write Tag, fragmented variants, Read-Modify-Write
//!   bit writes and Multiple Service Packets
//! - **Introspection** - controller and program tag enumeration, structure
//!   template expansion
//! - **PCCC** - typed-logical read/write/bit-write for `N7:0`-style addresses,
//!   through Execute PCCC or DF1 framing with BCC/CRC16
//! - **No panics** - all errors returned as `Result<T, EipError>`
//!
//! ## Quick Start
//!
//! ```no_run
//! use ab_eip::{Client, ClientConfig};
//! use std::net::Ipv4Addr;
//!
//! fn main() -> ab_eip::Result<()> {
//!     // ControlLogix processor in slot 0
//!     let config = ClientConfig::new(Ipv4Addr::new(192, 168, 1, 10)).with_slot(0);
//!     let mut client = Client::connect(config)?;
//!
//!     let speed = client.read_f32("Line1.Speed")?;
//!     println!("Line1.Speed = {speed}");
//!
//!     client.write_i32("Program:MainProgram.Setpoint", 1200)?;
//!     client.write_bit("Flags[5]", true)?;
//!
//!     client.close();
//!     Ok(())
//! }
//! ```
//!
//! ## Tag Addresses
//!
//! | Form | Meaning |
//! |------|---------|
//! | `Name`, `Name[i]`, `Name[i,j,k]` | controller tag, optional array indices |
//! | `Program:MainProgram.Name` | program-scoped tag |
//! | `slot=N;Name` | route this request through backplane slot `N` |
//! | `type=0xC4;Name` | element type, lets large reads be planned up front |
//! | `x=0x52;Name` | force the fragmented service |
//! | `class=0x6B;5` | raw class/instance addressing |
//!
//! PCCC addresses use the data-table form: `N7:1`, `B9:0/3`, `B3/35`,
//! `T4:2.ACC`, optionally prefixed with `s=`, `dst=` and `src=` for DF1.
//!
//! ## Raw Reads and Multi-Tag Reads
//!
//! ```no_run
//! # use ab_eip::{Client, ClientConfig, StatusResult};
//! # use std::net::Ipv4Addr;
//! # let mut client = Client::connect(ClientConfig::new(Ipv4Addr::LOCALHOST))?;
//! // 500 DINTs: split into Read Tag Fragmented requests of 480 bytes
//! let reply = client.read_tag("type=0xC4;Trend", 500)?;
//! assert_eq!(reply.data.len(), 2000);
//!
//! for result in client.read_multiple(&["A", "B", "Missing"])? {
//!     match result {
//!         StatusResult::Ok { payload, .. } => println!("{payload:02X?}"),
//!         StatusResult::Err { status, .. } => println!("failed: {status}"),
//!     }
//! }
//! # Ok::<(), ab_eip::EipError>(())
//! ```
//!
//! ## Introspection
//!
//! ```no_run
//! # use ab_eip::{Client, ClientConfig};
//! # use std::net::Ipv4Addr;
//! # let mut client = Client::connect(ClientConfig::new(Ipv4Addr::LOCALHOST))?;
//! for mut tag in client.enumerate_tags()? {
//!     if tag.is_struct() {
//!         client.enumerate_struct(&mut tag)?;
//!     }
//!     println!("{} {:?}", tag.name, tag.members.iter().map(|m| &m.name).collect::<Vec<_>>());
//! }
//! # Ok::<(), ab_eip::EipError>(())
//! ```
//!
//! ## Error Handling
//!
//! ```no_run
//! use ab_eip::{CipGeneralStatus, Client, ClientConfig, EipError};
//! use std::net::Ipv4Addr;
//!
//! let mut client = Client::connect(ClientConfig::new(Ipv4Addr::new(192, 168, 1, 10)))?;
//!
//! match client.read_i32("Counts[3]") {
//!     Ok(value) => println!("Counts[3] = {value}"),
//!     Err(EipError::Timeout) => println!("Communication timeout"),
//!     Err(EipError::CipStatus { status: CipGeneralStatus::PathSegmentError, .. }) => {
//!         println!("No such tag");
//!     }
//!     Err(e) if e.is_session_invalid() => {
//!         println!("Session lost: {e}");
//!         client.register()?;
//!     }
//!     Err(e) => println!("Error: {e}"),
//! }
//! # Ok::<(), EipError>(())
//! ```
//!
//! ## Logging
//!
//! The library logs through [`tracing`](https://docs.rs/tracing): session
//! transitions at `debug`, frames as hex at `trace`. Install any subscriber
//! to see them.

#![warn(clippy::all)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod address;
pub mod checksum;
pub mod client;
pub mod data_type;
pub mod df1;
pub mod encapsulation;
pub mod error;
pub mod metadata;
pub mod path;
pub mod pccc;
pub mod response;
pub mod service;
pub mod strategy;
pub mod transport;
pub mod utils;

// Public re-exports
pub use address::{bit_word_path, Modifier, TagAddress};
pub use checksum::{bcc, crc16, CheckMode};
pub use client::{Client, ClientConfig, Session, SessionState};
pub use data_type::{CipDataType, TagType};
pub use df1::{Df1Client, Df1Config};
pub use error::{CipGeneralStatus, EipError, Result};
pub use metadata::{AbStructHandle, AbTagItem};
pub use path::{decode_path, encode_path, LogicalKind, PathSegment, TagPath};
pub use pccc::{PcccAddress, PcccFileType, PcccStatus};
pub use response::{ReadReply, StatusResult};
pub use strategy::ProtocolStrategy;
pub use transport::{TcpTransport, Transport, DEFAULT_EIP_PORT, DEFAULT_TIMEOUT};
