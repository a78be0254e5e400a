//! Byte transports for EtherNet/IP and DF1.
//!
//! The protocol layer only sees the [`Transport`] trait: one request frame in,
//! one complete reply frame out. [`TcpTransport`] is the blocking TCP
//! implementation for EtherNet/IP; a DF1 application implements the trait
//! over its serial port.
//!
//! # Constants
//!
//! - [`DEFAULT_EIP_PORT`] - EtherNet/IP explicit messaging port (44818)
//! - [`DEFAULT_TIMEOUT`] - Default timeout (2 seconds)
//!
//! # Example
//!
//! ```no_run
//! use ab_eip::transport::{TcpTransport, Transport};
//! use std::time::Duration;
//!
//! let mut transport = TcpTransport::new(
//!     "192.168.1.10:44818".parse().unwrap(),
//!     Duration::from_secs(2),
//! ).unwrap();
//!
//! let (command, body) = ab_eip::encapsulation::register_session();
//! let request = ab_eip::encapsulation::wrap(command, 0, &body, None).unwrap();
//! let reply = transport.send_receive(&request).unwrap();
//! ```

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

use crate::encapsulation::ENCAPSULATION_HEADER_SIZE;
use crate::error::{EipError, Result};

/// Default EtherNet/IP TCP port.
pub const DEFAULT_EIP_PORT: u16 = 44818;

/// Default timeout for one exchange.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// A blocking request/reply byte channel.
///
/// Implementations return exactly one complete reply frame per request and
/// map an expired deadline to [`EipError::Timeout`].
pub trait Transport {
    /// Sends a frame and waits for its reply.
    fn send_receive(&mut self, request: &[u8]) -> Result<Vec<u8>>;

    /// Sends a frame that has no reply.
    fn send(&mut self, request: &[u8]) -> Result<()>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send_receive(&mut self, request: &[u8]) -> Result<Vec<u8>> {
        (**self).send_receive(request)
    }

    fn send(&mut self, request: &[u8]) -> Result<()> {
        (**self).send(request)
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn send_receive(&mut self, request: &[u8]) -> Result<Vec<u8>> {
        (**self).send_receive(request)
    }

    fn send(&mut self, request: &[u8]) -> Result<()> {
        (**self).send(request)
    }
}

/// TCP transport for EtherNet/IP encapsulation.
///
/// Replies are read as a 24-byte encapsulation header followed by the
/// number of bytes it declares.
pub struct TcpTransport {
    stream: TcpStream,
    remote_addr: SocketAddr,
}

impl TcpTransport {
    /// Connects to the target.
    ///
    /// # Errors
    ///
    /// Returns `Timeout` if the connection is not established in time and
    /// `Io` for other socket errors.
    pub fn new(plc_addr: SocketAddr, timeout: Duration) -> Result<Self> {
        let stream = TcpStream::connect_timeout(&plc_addr, timeout).map_err(map_io)?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;
        stream.set_nodelay(true)?;

        Ok(Self {
            stream,
            remote_addr: plc_addr,
        })
    }

    /// Connects with the default timeout.
    pub fn with_default_timeout(plc_addr: SocketAddr) -> Result<Self> {
        Self::new(plc_addr, DEFAULT_TIMEOUT)
    }

    /// Changes the read/write deadline.
    pub fn set_timeout(&self, timeout: Duration) -> Result<()> {
        self.stream.set_read_timeout(Some(timeout))?;
        self.stream.set_write_timeout(Some(timeout))?;
        Ok(())
    }

    /// Returns the remote address.
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    fn read_frame(&mut self) -> Result<Vec<u8>> {
        let mut frame = vec![0u8; ENCAPSULATION_HEADER_SIZE];
        self.stream.read_exact(&mut frame).map_err(map_io)?;

        let length = u16::from_le_bytes([frame[2], frame[3]]) as usize;
        frame.resize(ENCAPSULATION_HEADER_SIZE + length, 0);
        self.stream
            .read_exact(&mut frame[ENCAPSULATION_HEADER_SIZE..])
            .map_err(map_io)?;
        Ok(frame)
    }
}

impl Transport for TcpTransport {
    fn send_receive(&mut self, request: &[u8]) -> Result<Vec<u8>> {
        self.send(request)?;
        self.read_frame()
    }

    fn send(&mut self, request: &[u8]) -> Result<()> {
        self.stream.write_all(request).map_err(map_io)?;
        self.stream.flush().map_err(map_io)
    }
}

impl std::fmt::Debug for TcpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpTransport")
            .field("remote_addr", &self.remote_addr)
            .field("local_addr", &self.stream.local_addr().ok())
            .finish()
    }
}

fn map_io(e: io::Error) -> EipError {
    match e.kind() {
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => EipError::Timeout,
        _ => EipError::Io(e),
    }
}
