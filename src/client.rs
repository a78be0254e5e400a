//! High-level EtherNet/IP client for Logix and SLC/PLC-5 controllers.
//!
//! This module provides the [`Client`] struct, the primary interface for
//! reading and writing controller tags over an encapsulated CIP session.
//!
//! # Overview
//!
//! The client handles:
//! - Session registration and best-effort unregistration
//! - Address analysis (`slot=`, `type=`, `x=` modifiers) and path encoding
//! - Backplane routing through Unconnected Send, or connected messaging
//! - Fragmented reads and writes with offset bookkeeping
//! - Tag enumeration and structure template expansion
//! - PCCC commands through Execute PCCC
//!
//! # Example
//!
//! ```no_run
//! use ab_eip::{Client, ClientConfig};
//! use std::net::Ipv4Addr;
//!
//! let config = ClientConfig::new(Ipv4Addr::new(192, 168, 1, 10)).with_slot(0);
//! let mut client = Client::connect(config)?;
//!
//! let speed = client.read_f32("Line1.Speed")?;
//! client.write_i32("Counts[3]", 42)?;
//! client.write_bit("Flags[5]", true)?;
//!
//! for tag in client.enumerate_tags()? {
//!     println!("{} (0x{:04X})", tag.name, tag.symbol_type());
//! }
//! # let _ = speed;
//! # Ok::<(), ab_eip::EipError>(())
//! ```
//!
//! # Session state
//!
//! ```text
//! Disconnected -> Registering -> Ready -> (Reading | Writing | Introspecting)*
//!              -> Unregistering -> Disconnected
//! ```
//!
//! Only `Ready` accepts operations. A transport failure, an expired deadline
//! or an invalid-session encapsulation status drops the session back to
//! `Disconnected`; call [`Client::register`] again to continue.
//!
//! # Thread Safety
//!
//! Every operation takes `&mut self`, so requests on one session are never
//! interleaved. Share a client between threads behind a `Mutex`.

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use tracing::{debug, error, trace, warn};

use crate::address::{bit_word_path, TagAddress};
use crate::data_type::{CipDataType, TagType};
use crate::encapsulation::{
    parse_register_reply, register_session, send_rr_data_body, send_unit_data_body,
    unregister_session, wrap, COMMAND_SEND_RR_DATA, COMMAND_SEND_UNIT_DATA,
};
use crate::error::{EipError, Result};
use crate::metadata::AbTagItem;
use crate::path::TagPath;
use crate::pccc::{self, SERVICE_EXECUTE_PCCC};
use crate::response::{decode_frame, ReadReply, StatusResult};
use crate::service::{
    backplane_route, bit_masks, Fragment, ForwardCloseRequest, ForwardOpenReply,
    ForwardOpenRequest, FragmentPlan, UnconnectedSend, SERVICE_FORWARD_CLOSE,
    SERVICE_FORWARD_OPEN, SERVICE_GET_ATTRIBUTE_LIST, SERVICE_GET_INSTANCE_ATTRIBUTE_LIST,
    SERVICE_READ_FRAGMENT, SERVICE_READ_MODIFY_WRITE, SERVICE_READ_TAG, SERVICE_WRITE_FRAGMENT,
    SERVICE_WRITE_TAG,
};
use crate::strategy::ProtocolStrategy;
use crate::transport::{TcpTransport, Transport, DEFAULT_EIP_PORT, DEFAULT_TIMEOUT};
use crate::utils::{hex_dump, pack_string, unpack_string, STRING_WIRE_SIZE};

/// Default service data ceiling for unconnected messaging.
pub const DEFAULT_MAX_FRAGMENT_SIZE: usize = 480;

/// Default originator vendor id.
pub const DEFAULT_VENDOR_ID: u16 = 0xF33D;

/// Default originator serial number.
pub const DEFAULT_SERIAL_NUMBER: u32 = 0x2150_4345;

/// Requested packet interval of a connection, in microseconds.
pub const DEFAULT_RPI_US: u32 = 2_000_000;

const T_O_CONNECTION_ID_BASE: u32 = 0x4142_0000;

/// Configuration for creating an EtherNet/IP client.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClientConfig {
    /// Controller address (port defaults to 44818).
    pub plc_addr: SocketAddr,
    /// Deadline for each exchange, including every fragment.
    pub timeout: Duration,
    /// Backplane slot of the processor, if requests must be routed.
    pub slot: Option<u8>,
    /// Largest value window sent or requested in one service.
    pub max_fragment_size: usize,
    /// Sender context echoed by the target.
    pub sender_context: [u8; 8],
    /// Vendor id used in the PCCC requestor id and Forward Open.
    pub vendor_id: u16,
    /// Serial number used in the PCCC requestor id and Forward Open.
    pub serial_number: u32,
    /// Open a CIP connection after registering and send through it.
    pub connected: bool,
}

impl ClientConfig {
    /// Creates a configuration for a controller at `ip`.
    ///
    /// # Example
    ///
    /// ```
    /// use ab_eip::ClientConfig;
    /// use std::net::Ipv4Addr;
    ///
    /// let config = ClientConfig::new(Ipv4Addr::new(192, 168, 1, 10));
    /// assert_eq!(config.plc_addr.port(), 44818);
    /// assert_eq!(config.max_fragment_size, 480);
    /// ```
    pub fn new(ip: impl Into<IpAddr>) -> Self {
        Self {
            plc_addr: SocketAddr::new(ip.into(), DEFAULT_EIP_PORT),
            timeout: DEFAULT_TIMEOUT,
            slot: None,
            max_fragment_size: DEFAULT_MAX_FRAGMENT_SIZE,
            sender_context: [0; 8],
            vendor_id: DEFAULT_VENDOR_ID,
            serial_number: DEFAULT_SERIAL_NUMBER,
            connected: false,
        }
    }

    /// Sets a custom port (default is 44818).
    pub fn with_port(mut self, port: u16) -> Self {
        self.plc_addr.set_port(port);
        self
    }

    /// Sets a custom timeout (default is 2 seconds).
    ///
    /// # Example
    ///
    /// ```
    /// use ab_eip::ClientConfig;
    /// use std::net::Ipv4Addr;
    /// use std::time::Duration;
    ///
    /// let config = ClientConfig::new(Ipv4Addr::new(192, 168, 1, 10))
    ///     .with_timeout(Duration::from_secs(5));
    /// ```
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Routes every request through the backplane to `slot`.
    pub fn with_slot(mut self, slot: u8) -> Self {
        self.slot = Some(slot);
        self
    }

    /// Sets the fragment ceiling (default is 480 bytes).
    pub fn with_max_fragment_size(mut self, size: usize) -> Self {
        self.max_fragment_size = size;
        self
    }

    /// Sets the sender context.
    pub fn with_sender_context(mut self, context: [u8; 8]) -> Self {
        self.sender_context = context;
        self
    }

    /// Sets the originator vendor id.
    pub fn with_vendor_id(mut self, vendor_id: u16) -> Self {
        self.vendor_id = vendor_id;
        self
    }

    /// Sets the originator serial number.
    pub fn with_serial_number(mut self, serial_number: u32) -> Self {
        self.serial_number = serial_number;
        self
    }

    /// Enables connected messaging (Forward Open after registering).
    pub fn with_connected(mut self, connected: bool) -> Self {
        self.connected = connected;
        self
    }

    fn route(&self) -> Option<Vec<u8>> {
        self.slot.map(backplane_route)
    }
}

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No session is registered.
    Disconnected,
    /// Register Session is in flight.
    Registering,
    /// Idle and accepting operations.
    Ready,
    /// A read is in progress.
    Reading,
    /// A write is in progress.
    Writing,
    /// Enumeration or template expansion is in progress.
    Introspecting,
    /// Unregister Session is being sent.
    Unregistering,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Disconnected => "Disconnected",
            SessionState::Registering => "Registering",
            SessionState::Ready => "Ready",
            SessionState::Reading => "Reading",
            SessionState::Writing => "Writing",
            SessionState::Introspecting => "Introspecting",
            SessionState::Unregistering => "Unregistering",
        };
        f.write_str(name)
    }
}

/// A wrapping 16-bit counter for TNS and connected sequence numbers.
///
/// # Example
///
/// ```
/// use ab_eip::client::SequenceCounter;
///
/// let mut counter = SequenceCounter::new(0xFFFF);
/// assert_eq!(counter.advance(), 0xFFFF);
/// assert_eq!(counter.advance(), 0);
/// assert_eq!(counter.peek(), 1);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceCounter {
    next: u16,
}

impl SequenceCounter {
    /// Creates a counter whose first value is `start`.
    pub fn new(start: u16) -> Self {
        Self { next: start }
    }

    /// Returns the current value and moves to the next one.
    pub fn advance(&mut self) -> u16 {
        let value = self.next;
        self.next = self.next.wrapping_add(1);
        value
    }

    /// Returns the value the next `advance` will hand out.
    pub fn peek(&self) -> u16 {
        self.next
    }
}

/// A registered session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Handle assigned by the target.
    pub session_handle: u32,
    /// Route to the processor, if requests are routed.
    pub router_path: Option<Vec<u8>>,
    /// Sequence count of connected requests, while a connection is open.
    pub connected_sequence: Option<SequenceCounter>,
    /// Connection id for connected requests, while a connection is open.
    pub o_to_t_id: Option<u32>,
    connection_serial: u16,
}

impl Session {
    fn new(session_handle: u32, router_path: Option<Vec<u8>>) -> Self {
        Self {
            session_handle,
            router_path,
            connected_sequence: None,
            o_to_t_id: None,
            connection_serial: 0,
        }
    }

    /// Returns whether a CIP connection is open.
    pub fn is_connected(&self) -> bool {
        self.o_to_t_id.is_some()
    }
}

/// EtherNet/IP client for Logix and SLC/PLC-5 controllers.
///
/// Each call produces a fixed sequence of request/reply exchanges; nothing is
/// retried or cached. A call that needs several fragments either completes
/// all of them or returns the first error.
///
/// # Example
///
/// ```no_run
/// use ab_eip::{Client, ClientConfig};
/// use std::net::Ipv4Addr;
///
/// let mut client = Client::connect(ClientConfig::new(Ipv4Addr::new(192, 168, 1, 10)))?;
///
/// // 10 DINTs, fragmented if they exceed the configured ceiling
/// let reply = client.read_tag("type=0xC4;Counts", 10)?;
/// assert_eq!(reply.data.len(), 40);
///
/// // Three tags in one Multiple Service Packet
/// for result in client.read_multiple(&["A", "B", "C"])? {
///     println!("{result}");
/// }
/// # Ok::<(), ab_eip::EipError>(())
/// ```
pub struct Client<T: Transport = TcpTransport> {
    transport: T,
    config: ClientConfig,
    strategy: ProtocolStrategy,
    state: SessionState,
    session: Option<Session>,
    tns: SequenceCounter,
    connection_serial: SequenceCounter,
}

impl Client<TcpTransport> {
    /// Connects to the controller and registers a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP connection or the registration fails.
    pub fn connect(config: ClientConfig) -> Result<Self> {
        let transport = TcpTransport::new(config.plc_addr, config.timeout)?;
        let mut client = Self::with_transport(transport, config);
        client.register()?;
        Ok(client)
    }
}

impl<T: Transport> Client<T> {
    /// Creates an unregistered client over an existing transport.
    pub fn with_transport(transport: T, config: ClientConfig) -> Self {
        Self {
            transport,
            config,
            strategy: ProtocolStrategy::default(),
            state: SessionState::Disconnected,
            session: None,
            tns: SequenceCounter::new(1),
            connection_serial: SequenceCounter::new(1),
        }
    }

    /// Replaces the codec strategy.
    pub fn with_strategy(mut self, strategy: ProtocolStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns the session state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Returns the registered session, if any.
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Returns the transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Registers a session, then opens a connection if configured.
    ///
    /// # Errors
    ///
    /// Returns `NotReady` unless the client is `Disconnected`, or the
    /// transport/encapsulation error of the handshake.
    pub fn register(&mut self) -> Result<()> {
        if self.state != SessionState::Disconnected {
            return Err(self.not_ready());
        }
        let (command, body) = register_session();
        let frame = wrap(command, 0, &body, Some(self.config.sender_context))?;
        self.set_state(SessionState::Registering);

        trace!(frame = %hex_dump(&frame), "eip tx");
        let handle = match self
            .transport
            .send_receive(&frame)
            .and_then(|reply| {
                trace!(frame = %hex_dump(&reply), "eip rx");
                parse_register_reply(&reply)
            }) {
            Ok(handle) => handle,
            Err(e) => {
                self.set_state(SessionState::Disconnected);
                return Err(e);
            }
        };

        self.session = Some(Session::new(handle, self.config.route()));
        self.set_state(SessionState::Ready);
        debug!(session_handle = handle, "session registered");

        if self.config.connected {
            self.forward_open()?;
        }
        Ok(())
    }

    /// Closes any connection and unregisters the session.
    ///
    /// Best effort: failures are logged, not returned, since the transport
    /// is usually going away.
    pub fn unregister(&mut self) {
        if self.session.as_ref().is_some_and(Session::is_connected)
            && self.state == SessionState::Ready
        {
            if let Err(e) = self.forward_close() {
                warn!(error = %e, "forward close failed");
            }
        }
        let Some(session) = self.session.take() else {
            self.set_state(SessionState::Disconnected);
            return;
        };
        self.set_state(SessionState::Unregistering);
        let frame = unregister_session(session.session_handle);
        trace!(frame = %hex_dump(&frame), "eip tx");
        if let Err(e) = self.transport.send(&frame) {
            warn!(session_handle = session.session_handle, error = %e, "unregister session failed");
        }
        self.set_state(SessionState::Disconnected);
    }

    /// Unregisters and drops the client.
    pub fn close(mut self) {
        self.unregister();
    }

    /// Opens a class 3 connection; later requests travel in SendUnitData.
    ///
    /// # Errors
    ///
    /// Returns `NotReady` outside `Ready`, or the Forward Open error.
    pub fn forward_open(&mut self) -> Result<()> {
        self.run(SessionState::Ready, |client| {
            if client.session.as_ref().is_some_and(Session::is_connected) {
                return Ok(());
            }
            let serial = client.connection_serial.advance();
            let route = client.router_path();
            let request = ForwardOpenRequest {
                t_o_connection_id: T_O_CONNECTION_ID_BASE | serial as u32,
                connection_serial: serial,
                vendor_id: client.config.vendor_id,
                originator_serial: client.config.serial_number,
                rpi_us: DEFAULT_RPI_US,
                route,
            }
            .to_bytes();

            let cip = client.exchange_direct(&request)?;
            let (payload, _) = client
                .strategy
                .service
                .decode_single(&cip, SERVICE_FORWARD_OPEN)?
                .into_result()
                .map_err(|e| e.with_raw(&cip))?;
            let reply = ForwardOpenReply::parse(&payload)?;

            let session = client.session_mut()?;
            session.o_to_t_id = Some(reply.o_t_connection_id);
            session.connected_sequence = Some(SequenceCounter::new(1));
            session.connection_serial = serial;
            debug!(
                o_to_t_id = reply.o_t_connection_id,
                t_o_id = reply.t_o_connection_id,
                serial,
                "connection opened"
            );
            Ok(())
        })
    }

    /// Closes the open connection, if any.
    ///
    /// # Errors
    ///
    /// Returns `NotReady` outside `Ready`, or the Forward Close error. The
    /// connection is forgotten locally either way.
    pub fn forward_close(&mut self) -> Result<()> {
        self.run(SessionState::Ready, |client| {
            let vendor_id = client.config.vendor_id;
            let originator_serial = client.config.serial_number;
            let session = client.session_mut()?;
            if session.o_to_t_id.take().is_none() {
                return Ok(());
            }
            session.connected_sequence = None;
            let request = ForwardCloseRequest {
                connection_serial: session.connection_serial,
                vendor_id,
                originator_serial,
                route: session.router_path.clone().unwrap_or_default(),
            }
            .to_bytes();

            let cip = client.exchange_direct(&request)?;
            client
                .strategy
                .service
                .decode_single(&cip, SERVICE_FORWARD_CLOSE)?
                .into_result()
                .map_err(|e| e.with_raw(&cip))?;
            debug!("connection closed");
            Ok(())
        })
    }

    /// Reads `elements` elements of a tag.
    ///
    /// The address may carry modifiers: `slot=N;` routes this request,
    /// `type=0xNN;` announces the element type so an oversized read is split
    /// into planned fragments up front, `x=0x52;` forces Read Tag Fragmented.
    /// Without a known size, a single Read Tag is sent and continued with
    /// fragments while the reply reports more data.
    ///
    /// # Errors
    ///
    /// Returns `AddressParse` for a malformed address, the CIP status of a
    /// failing reply, `FragmentFailed` if a later fragment fails, or
    /// `InconsistentFragmentation` if offsets and continuation flags disagree.
    pub fn read_tag(&mut self, address: &str, elements: u16) -> Result<ReadReply> {
        let address = TagAddress::parse(address)?;
        self.run(SessionState::Reading, |client| {
            client.read_inner(&address, elements, None)
        })
    }

    /// Writes `elements` elements of type `tag_type`.
    ///
    /// Data larger than the fragment ceiling, or any data with `x=0x52;`, is
    /// written with Write Tag Fragmented in increasing offset order.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` for empty data, the CIP status of a failing
    /// reply, or `FragmentFailed` if a later fragment fails.
    pub fn write_tag(
        &mut self,
        address: &str,
        tag_type: TagType,
        elements: u16,
        data: &[u8],
    ) -> Result<()> {
        let address = TagAddress::parse(address)?;
        self.run(SessionState::Writing, |client| {
            client.write_inner(&address, tag_type, elements, data)
        })
    }

    /// Sets or clears one bit of a BOOL array (`Flags[37]`) with an atomic
    /// Read-Modify-Write on the DINT holding it.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use ab_eip::{Client, ClientConfig};
    /// # use std::net::Ipv4Addr;
    /// # let mut client = Client::connect(ClientConfig::new(Ipv4Addr::LOCALHOST))?;
    /// // OR mask 0x00000020, AND mask 0xFFFFFFFF on Flags[0]
    /// client.write_bit("Flags[5]", true)?;
    /// # Ok::<(), ab_eip::EipError>(())
    /// ```
    pub fn write_bit(&mut self, address: &str, state: bool) -> Result<()> {
        let address = TagAddress::parse(address)?;
        self.run(SessionState::Writing, |client| {
            let (path, bit) = bit_word_path(&address)?;
            let (or_mask, and_mask) = bit_masks(bit, state)?;
            let encoded = client.strategy.path.encode(&path)?;
            let request = client
                .strategy
                .service
                .read_modify_write(&encoded, or_mask, and_mask)?;
            debug!(address = address.source(), bit, state, "read-modify-write");
            client
                .request(&request, SERVICE_READ_MODIFY_WRITE, address.slot())?
                .into_result()?;
            Ok(())
        })
    }

    /// Reads one element of each tag in a single Multiple Service Packet.
    ///
    /// Returns one result per address, in order; a failing tag does not fail
    /// the others.
    ///
    /// # Errors
    ///
    /// Returns `AddressParse` for any malformed address, `InvalidParameter`
    /// for an empty list, or the error of the packet exchange itself.
    pub fn read_multiple(&mut self, addresses: &[&str]) -> Result<Vec<StatusResult>> {
        let parsed = addresses
            .iter()
            .map(|a| TagAddress::parse(a))
            .collect::<Result<Vec<_>>>()?;
        self.run(SessionState::Reading, |client| {
            let mut requests = Vec::with_capacity(parsed.len());
            for address in &parsed {
                let path = client.strategy.path.encode(&address.tag_path()?)?;
                requests.push(client.strategy.service.read_tag(&path, 1)?);
            }
            let packet = client.strategy.service.multiple(requests)?;
            let slot = parsed.first().and_then(TagAddress::slot);
            let cip = client.exchange(&packet, slot)?;
            client
                .strategy
                .service
                .decode_multiple(&cip, SERVICE_READ_TAG)
                .map_err(|e| e.with_raw(&cip))
        })
    }

    /// Reads a BOOL.
    pub fn read_bool(&mut self, address: &str) -> Result<bool> {
        let [value] = self.read_value::<1>(address, CipDataType::Bool)?;
        Ok(value != 0)
    }

    /// Writes a BOOL.
    pub fn write_bool(&mut self, address: &str, value: bool) -> Result<()> {
        self.write_value(address, CipDataType::Bool, &[value as u8])
    }

    /// Reads a SINT.
    pub fn read_i8(&mut self, address: &str) -> Result<i8> {
        Ok(i8::from_le_bytes(self.read_value(address, CipDataType::Sint)?))
    }

    /// Writes a SINT.
    pub fn write_i8(&mut self, address: &str, value: i8) -> Result<()> {
        self.write_value(address, CipDataType::Sint, &value.to_le_bytes())
    }

    /// Reads an INT.
    pub fn read_i16(&mut self, address: &str) -> Result<i16> {
        Ok(i16::from_le_bytes(self.read_value(address, CipDataType::Int)?))
    }

    /// Writes an INT.
    pub fn write_i16(&mut self, address: &str, value: i16) -> Result<()> {
        self.write_value(address, CipDataType::Int, &value.to_le_bytes())
    }

    /// Reads a UINT.
    pub fn read_u16(&mut self, address: &str) -> Result<u16> {
        Ok(u16::from_le_bytes(self.read_value(address, CipDataType::Uint)?))
    }

    /// Writes a UINT.
    pub fn write_u16(&mut self, address: &str, value: u16) -> Result<()> {
        self.write_value(address, CipDataType::Uint, &value.to_le_bytes())
    }

    /// Reads a DINT.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use ab_eip::{Client, ClientConfig};
    /// # use std::net::Ipv4Addr;
    /// # let mut client = Client::connect(ClientConfig::new(Ipv4Addr::LOCALHOST))?;
    /// let count = client.read_i32("Program:MainProgram.PartCount")?;
    /// # let _ = count;
    /// # Ok::<(), ab_eip::EipError>(())
    /// ```
    pub fn read_i32(&mut self, address: &str) -> Result<i32> {
        Ok(i32::from_le_bytes(self.read_value(address, CipDataType::Dint)?))
    }

    /// Writes a DINT.
    pub fn write_i32(&mut self, address: &str, value: i32) -> Result<()> {
        self.write_value(address, CipDataType::Dint, &value.to_le_bytes())
    }

    /// Reads a UDINT.
    pub fn read_u32(&mut self, address: &str) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_value(address, CipDataType::Udint)?))
    }

    /// Writes a UDINT.
    pub fn write_u32(&mut self, address: &str, value: u32) -> Result<()> {
        self.write_value(address, CipDataType::Udint, &value.to_le_bytes())
    }

    /// Reads a LINT.
    pub fn read_i64(&mut self, address: &str) -> Result<i64> {
        Ok(i64::from_le_bytes(self.read_value(address, CipDataType::Lint)?))
    }

    /// Writes a LINT.
    pub fn write_i64(&mut self, address: &str, value: i64) -> Result<()> {
        self.write_value(address, CipDataType::Lint, &value.to_le_bytes())
    }

    /// Reads a REAL.
    pub fn read_f32(&mut self, address: &str) -> Result<f32> {
        Ok(f32::from_le_bytes(self.read_value(address, CipDataType::Real)?))
    }

    /// Writes a REAL.
    pub fn write_f32(&mut self, address: &str, value: f32) -> Result<()> {
        self.write_value(address, CipDataType::Real, &value.to_le_bytes())
    }

    /// Reads an LREAL.
    pub fn read_f64(&mut self, address: &str) -> Result<f64> {
        Ok(f64::from_le_bytes(self.read_value(address, CipDataType::Lreal)?))
    }

    /// Writes an LREAL.
    pub fn write_f64(&mut self, address: &str, value: f64) -> Result<()> {
        self.write_value(address, CipDataType::Lreal, &value.to_le_bytes())
    }

    /// Reads a Logix STRING.
    pub fn read_string(&mut self, address: &str) -> Result<String> {
        let address = TagAddress::parse(address)?;
        self.run(SessionState::Reading, |client| {
            let reply = client.read_inner(&address, 1, Some(STRING_WIRE_SIZE))?;
            unpack_string(&reply.data)
        })
    }

    /// Writes a Logix STRING (at most 82 ASCII characters).
    pub fn write_string(&mut self, address: &str, value: &str) -> Result<()> {
        let data = pack_string(value)?;
        self.write_tag(address, TagType::STRING, 1, &data)
    }

    /// Lists the controller-scoped user tags.
    ///
    /// System tags, `__` tags and module-scoped tags are filtered out.
    /// Structure members are not expanded; see [`Client::enumerate_struct`].
    pub fn enumerate_tags(&mut self) -> Result<Vec<AbTagItem>> {
        self.run(SessionState::Introspecting, |client| {
            client.enumerate(Vec::new(), None)
        })
    }

    /// Lists the user tags of one program, prefixed `Program:<name>.`.
    pub fn enumerate_program_tags(&mut self, program: &str) -> Result<Vec<AbTagItem>> {
        self.run(SessionState::Introspecting, |client| {
            let scope = client
                .strategy
                .path
                .encode(&TagPath::new().symbol(format!("Program:{program}")))?;
            client.enumerate(scope, Some(program))
        })
    }

    /// Reads the template of a structure tag and fills `item.members`.
    ///
    /// Members that are themselves structures are left unexpanded.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if `item` is not a structure, or the
    /// error of either template round trip.
    pub fn enumerate_struct(&mut self, item: &mut AbTagItem) -> Result<()> {
        if !item.is_struct() {
            return Err(EipError::invalid_parameter(
                "item",
                format!("'{}' is not a structure", item.name),
            ));
        }
        let symbol_type = item.symbol_type();
        let members = self.run(SessionState::Introspecting, |client| {
            let request = client.strategy.metadata.struct_handle_request(symbol_type)?;
            let (payload, _) = client
                .request(&request, SERVICE_GET_ATTRIBUTE_LIST, None)?
                .into_result()?;
            let handle = client.strategy.metadata.parse_struct_handle(&payload)?;
            let total = handle.member_list_len()?;

            let mut data = Vec::with_capacity(total as usize);
            loop {
                let offset = data.len() as u32;
                let length = total.saturating_sub(offset).min(u16::MAX as u32) as u16;
                let request = client
                    .strategy
                    .metadata
                    .template_request(symbol_type, offset, length)?;
                let (chunk, more_data) = client
                    .request(&request, SERVICE_READ_TAG, None)?
                    .into_result()?;
                if more_data && chunk.is_empty() {
                    return Err(client.stalled(offset as usize, total as usize));
                }
                data.extend_from_slice(&chunk);
                if !more_data {
                    break;
                }
            }

            let template = client.strategy.metadata.parse_template(&data, &handle)?;
            debug!(
                handle = handle.structure_handle,
                name = template.name.as_deref().unwrap_or_default(),
                members = template.members.len(),
                "template decoded"
            );
            Ok(template.members)
        })?;
        item.members = members;
        Ok(())
    }

    /// Reads `byte_len` bytes of an SLC/PLC-5 data-table address
    /// (`N7:0`, `F8:2`, `T4:1.ACC`) through Execute PCCC.
    ///
    /// Reads above 236 bytes are split into commands of whole elements with
    /// advancing element numbers.
    ///
    /// # Errors
    ///
    /// Returns the PCCC or CIP error of a failing command, wrapped in
    /// `FragmentFailed` when the read was split, or
    /// `InconsistentFragmentation` if a command returns the wrong size.
    pub fn read_pccc(&mut self, address: &str, byte_len: usize) -> Result<Vec<u8>> {
        let address = TagAddress::parse(address)?;
        self.run(SessionState::Reading, |client| {
            let target = client.strategy.pccc.parse_address(address.body())?;
            let plan = target.transfer_plan(byte_len)?;
            if plan.len() > 1 {
                debug!(
                    address = %target,
                    total = byte_len,
                    commands = plan.len(),
                    "split pccc read"
                );
            }

            let mut data = Vec::with_capacity(byte_len);
            for fragment in plan.fragments() {
                let chunk = target
                    .at_offset(fragment.offset)
                    .and_then(|start| {
                        let tns = client.tns.advance();
                        let command = client.strategy.pccc.read(tns, &start, fragment.size)?;
                        client.pccc_exchange(tns, &command, address.slot())
                    })
                    .map_err(|e| plan.fragment_error(fragment, e))?;
                if let Err(e) = plan.check(fragment, chunk.len(), !fragment.last) {
                    error!(error = %e, "pccc reply size disagrees with the request");
                    return Err(e);
                }
                data.extend_from_slice(&chunk);
            }
            Ok(data)
        })
    }

    /// Writes bytes to an SLC/PLC-5 data-table address, split like
    /// [`Client::read_pccc`].
    pub fn write_pccc(&mut self, address: &str, data: &[u8]) -> Result<()> {
        let address = TagAddress::parse(address)?;
        self.run(SessionState::Writing, |client| {
            let target = client.strategy.pccc.parse_address(address.body())?;
            let plan = target.transfer_plan(data.len())?;
            for fragment in plan.fragments() {
                let window = &data[fragment.offset..fragment.offset + fragment.size];
                target
                    .at_offset(fragment.offset)
                    .and_then(|start| {
                        let tns = client.tns.advance();
                        let command = client.strategy.pccc.write(tns, &start, window)?;
                        client.pccc_exchange(tns, &command, address.slot())
                    })
                    .map_err(|e| plan.fragment_error(fragment, e))?;
            }
            Ok(())
        })
    }

    /// Sets or clears one bit of a data-table address (`B3:0/4`, `B3/20`).
    pub fn write_pccc_bit(&mut self, address: &str, state: bool) -> Result<()> {
        let address = TagAddress::parse(address)?;
        self.run(SessionState::Writing, |client| {
            let target = client.strategy.pccc.parse_address(address.body())?;
            let tns = client.tns.advance();
            let command = client.strategy.pccc.write_bit(tns, &target, state)?;
            client.pccc_exchange(tns, &command, address.slot()).map(|_| ())
        })
    }

    fn read_value<const N: usize>(
        &mut self,
        address: &str,
        data_type: CipDataType,
    ) -> Result<[u8; N]> {
        let address = TagAddress::parse(address)?;
        self.run(SessionState::Reading, |client| {
            let reply = client.read_inner(&address, 1, Some(N))?;
            if reply.tag_type.data_type() != Some(data_type) {
                return Err(EipError::malformed_response(format!(
                    "'{}' is 0x{:04X}, expected {}",
                    address.source(),
                    reply.tag_type.code,
                    data_type
                ))
                .with_raw(&reply.data));
            }
            reply.data.get(..N).and_then(|b| b.try_into().ok()).ok_or_else(|| {
                EipError::malformed_response(format!(
                    "'{}' returned {} bytes, expected {N}",
                    address.source(),
                    reply.data.len()
                ))
                .with_raw(&reply.data)
            })
        })
    }

    fn write_value(&mut self, address: &str, data_type: CipDataType, data: &[u8]) -> Result<()> {
        self.write_tag(address, TagType::elementary(data_type), 1, data)
    }

    fn read_inner(
        &mut self,
        address: &TagAddress,
        elements: u16,
        known_size: Option<usize>,
    ) -> Result<ReadReply> {
        let path = self.strategy.path.encode(&address.tag_path()?)?;
        let total = known_size.or_else(|| {
            address
                .type_code()
                .and_then(CipDataType::from_code)
                .map(|t| t.size() * elements as usize)
        });
        let max = self.config.max_fragment_size;
        let force = address.force_fragment();

        match total {
            Some(total) if force || total > max => {
                self.read_planned(&path, elements, total, address.slot())
            }
            _ => self.read_continued(&path, elements, force, address.slot()),
        }
    }

    fn read_planned(
        &mut self,
        path: &[u8],
        elements: u16,
        total: usize,
        slot: Option<u8>,
    ) -> Result<ReadReply> {
        let plan = FragmentPlan::new(total, self.config.max_fragment_size)?;
        debug!(total, fragments = plan.len(), "fragmented read");

        let mut data = Vec::with_capacity(total);
        let mut tag_type = None;
        for fragment in plan.fragments() {
            let reply = self
                .read_fragment(path, elements, fragment, slot)
                .map_err(|e| plan.fragment_error(fragment, e))?;
            if let Err(e) = plan.check(fragment, reply.data.len(), reply.more_data) {
                error!(error = %e, "fragment bookkeeping disagrees with reply");
                return Err(e);
            }
            tag_type.get_or_insert(reply.tag_type);
            data.extend_from_slice(&reply.data);
        }

        let tag_type = tag_type
            .ok_or_else(|| EipError::malformed_response("fragmented read returned no fragments"))?;
        Ok(ReadReply {
            tag_type,
            data,
            more_data: false,
        })
    }

    fn read_fragment(
        &mut self,
        path: &[u8],
        elements: u16,
        fragment: Fragment,
        slot: Option<u8>,
    ) -> Result<ReadReply> {
        let request = self
            .strategy
            .service
            .read_fragment(path, elements, fragment.offset as u32)?;
        trace!(offset = fragment.offset, size = fragment.size, "read fragment");
        ReadReply::from_status(self.request(&request, SERVICE_READ_FRAGMENT, slot)?)
    }

    fn read_continued(
        &mut self,
        path: &[u8],
        elements: u16,
        force: bool,
        slot: Option<u8>,
    ) -> Result<ReadReply> {
        let (request, service) = if force {
            (
                self.strategy.service.read_fragment(path, elements, 0)?,
                SERVICE_READ_FRAGMENT,
            )
        } else {
            (self.strategy.service.read_tag(path, elements)?, SERVICE_READ_TAG)
        };
        let first = ReadReply::from_status(self.request(&request, service, slot)?)?;
        let tag_type = first.tag_type;
        let expected = tag_type
            .data_type()
            .map(|t| t.size() * usize::from(elements));
        let mut more_data = first.more_data;
        let mut data = first.data;

        while more_data {
            let offset = data.len();
            let request = self
                .strategy
                .service
                .read_fragment(path, elements, offset as u32)?;
            trace!(offset, "continue read");
            let next = self
                .request(&request, SERVICE_READ_FRAGMENT, slot)
                .and_then(ReadReply::from_status)
                .map_err(|e| EipError::FragmentFailed {
                    offset,
                    total: expected,
                    source: Box::new(e),
                })?;
            if next.data.is_empty() && next.more_data {
                return Err(self.stalled(offset, expected.unwrap_or(offset)));
            }
            data.extend_from_slice(&next.data);
            more_data = next.more_data;
        }

        Ok(ReadReply {
            tag_type,
            data,
            more_data: false,
        })
    }

    fn write_inner(
        &mut self,
        address: &TagAddress,
        tag_type: TagType,
        elements: u16,
        data: &[u8],
    ) -> Result<()> {
        if data.is_empty() {
            return Err(EipError::invalid_parameter("data", "cannot be empty"));
        }
        let path = self.strategy.path.encode(&address.tag_path()?)?;
        let slot = address.slot();
        let max = self.config.max_fragment_size;

        if !address.force_fragment() && data.len() <= max {
            let request = self
                .strategy
                .service
                .write_tag(&path, tag_type, elements, data)?;
            self.request(&request, SERVICE_WRITE_TAG, slot)?.into_result()?;
            return Ok(());
        }

        let plan = FragmentPlan::new(data.len(), max)?;
        debug!(total = data.len(), fragments = plan.len(), "fragmented write");
        for fragment in plan.fragments() {
            let window = &data[fragment.offset..fragment.offset + fragment.size];
            let request = self.strategy.service.write_fragment(
                &path,
                tag_type,
                elements,
                fragment.offset as u32,
                window,
            )?;
            trace!(offset = fragment.offset, size = fragment.size, "write fragment");
            self.request(&request, SERVICE_WRITE_FRAGMENT, slot)
                .and_then(StatusResult::into_result)
                .map_err(|e| plan.fragment_error(fragment, e))?;
        }
        Ok(())
    }

    fn enumerate(&mut self, scope: Vec<u8>, program: Option<&str>) -> Result<Vec<AbTagItem>> {
        let mut items = Vec::new();
        let mut start = 0u32;
        loop {
            let request = self.strategy.metadata.symbol_list_request(&scope, start)?;
            let (payload, more_data) = self
                .request(&request, SERVICE_GET_INSTANCE_ATTRIBUTE_LIST, None)?
                .into_result()?;
            let page = self
                .strategy
                .metadata
                .parse_symbol_list(&payload, program)?;
            trace!(start, tags = page.items.len(), more_data, "symbol page");
            items.extend(page.items);

            match page.last_instance {
                Some(last) if more_data => start = last + 1,
                None if more_data => return Err(self.stalled(start as usize, start as usize)),
                _ => break,
            }
        }
        debug!(count = items.len(), program, "tags enumerated");
        Ok(items)
    }

    fn pccc_exchange(&mut self, tns: u16, command: &[u8], slot: Option<u8>) -> Result<Vec<u8>> {
        let request =
            pccc::wrap_execute_pccc(self.config.vendor_id, self.config.serial_number, command);
        let (payload, _) = self
            .request(&request, SERVICE_EXECUTE_PCCC, slot)?
            .into_result()?;
        let reply = pccc::unwrap_execute_pccc(&payload)?;
        self.strategy
            .pccc
            .parse_reply(reply, tns)
            .map_err(|e| e.with_raw(&payload))
    }

    /// Sends one request and decodes its status.
    fn request(&mut self, request: &[u8], service: u8, slot: Option<u8>) -> Result<StatusResult> {
        let cip = self.exchange(request, slot)?;
        self.strategy
            .service
            .decode_single(&cip, service)
            .map_err(|e| e.with_raw(&cip))
    }

    /// Sends one CIP request on the session and returns the CIP reply.
    fn exchange(&mut self, request: &[u8], slot: Option<u8>) -> Result<Vec<u8>> {
        let session = self.session_mut()?;
        let connected = match (session.o_to_t_id, session.connected_sequence.as_mut()) {
            (Some(connection_id), Some(sequence)) => Some((connection_id, sequence.advance())),
            _ => None,
        };
        let slot_route = slot.map(backplane_route);
        let slot_ignored = connected.is_some()
            && slot_route.is_some()
            && slot_route.as_ref() != session.router_path.as_ref();
        let route = slot_route.or_else(|| session.router_path.clone());

        if let Some((connection_id, sequence)) = connected {
            if slot_ignored {
                warn!(
                    slot,
                    "slot= is ignored on a connected session; requests follow the connection route"
                );
            }
            let body = send_unit_data_body(connection_id, sequence, request);
            return self.transact(COMMAND_SEND_UNIT_DATA, &body, Some(sequence));
        }
        let body = match route {
            Some(route) => {
                send_rr_data_body(&UnconnectedSend::new(request.to_vec(), route)?.to_bytes())
            }
            None => send_rr_data_body(request),
        };
        self.transact(COMMAND_SEND_RR_DATA, &body, None)
    }

    /// Sends a request to the directly attached Connection Manager.
    fn exchange_direct(&mut self, request: &[u8]) -> Result<Vec<u8>> {
        self.transact(COMMAND_SEND_RR_DATA, &send_rr_data_body(request), None)
    }

    fn transact(&mut self, command: u16, body: &[u8], sequence: Option<u16>) -> Result<Vec<u8>> {
        let handle = self.session_mut()?.session_handle;
        let frame = wrap(command, handle, body, Some(self.config.sender_context))?;
        trace!(frame = %hex_dump(&frame), "eip tx");
        let reply = self.transport.send_receive(&frame)?;
        trace!(frame = %hex_dump(&reply), "eip rx");

        let decoded = decode_frame(&reply)?;
        if let Some(expected) = sequence {
            if decoded.sequence != Some(expected) {
                return Err(EipError::malformed_response(format!(
                    "connected reply sequence {:?}, expected {expected}",
                    decoded.sequence
                ))
                .with_raw(&reply));
            }
        }
        Ok(decoded.cip)
    }

    /// Runs one operation from `Ready`, moving to `state` while it runs.
    fn run<R>(
        &mut self,
        state: SessionState,
        operation: impl FnOnce(&mut Self) -> Result<R>,
    ) -> Result<R> {
        if self.state != SessionState::Ready {
            return Err(self.not_ready());
        }
        self.set_state(state);
        let result = operation(self);
        match &result {
            Err(e) if e.is_session_invalid() => {
                warn!(error = %e, "session lost");
                self.session = None;
                self.set_state(SessionState::Disconnected);
            }
            _ => self.set_state(SessionState::Ready),
        }
        result
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state != state {
            trace!(from = %self.state, to = %state, "session state");
            self.state = state;
        }
    }

    fn not_ready(&self) -> EipError {
        EipError::NotReady {
            state: self.state.to_string(),
        }
    }

    fn session_mut(&mut self) -> Result<&mut Session> {
        let state = self.state;
        self.session.as_mut().ok_or_else(|| EipError::NotReady {
            state: state.to_string(),
        })
    }

    fn router_path(&self) -> Vec<u8> {
        self.session
            .as_ref()
            .and_then(|s| s.router_path.clone())
            .unwrap_or_default()
    }

    fn stalled(&self, offset: usize, total: usize) -> EipError {
        let e = EipError::InconsistentFragmentation {
            offset,
            total,
            received: 0,
            more_data: true,
        };
        error!(error = %e, "reply reported more data without progress");
        e
    }
}

impl<T: Transport> Drop for Client<T> {
    fn drop(&mut self) {
        if self.session.is_some() {
            self.unregister();
        }
    }
}

impl<T: Transport> fmt::Debug for Client<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::net::Ipv4Addr;

    use crate::encapsulation::{unwrap, COMMAND_REGISTER_SESSION};

    #[derive(Default)]
    struct Scripted {
        replies: VecDeque<Result<Vec<u8>>>,
        sent: Vec<Vec<u8>>,
    }

    impl Transport for Scripted {
        fn send_receive(&mut self, request: &[u8]) -> Result<Vec<u8>> {
            self.sent.push(request.to_vec());
            self.replies
                .pop_front()
                .unwrap_or_else(|| Err(EipError::Timeout))
        }

        fn send(&mut self, request: &[u8]) -> Result<()> {
            self.sent.push(request.to_vec());
            Ok(())
        }
    }

    fn register_reply(handle: u32) -> Vec<u8> {
        wrap(COMMAND_REGISTER_SESSION, handle, &[1, 0, 0, 0], None).unwrap()
    }

    fn rr_reply(cip: &[u8]) -> Vec<u8> {
        wrap(COMMAND_SEND_RR_DATA, 0x11, &send_rr_data_body(cip), None).unwrap()
    }

    fn ready_client(replies: Vec<Vec<u8>>) -> Client<Scripted> {
        let mut transport = Scripted::default();
        transport.replies.push_back(Ok(register_reply(0x11)));
        transport.replies.extend(replies.into_iter().map(Ok));
        let mut client =
            Client::with_transport(transport, ClientConfig::new(Ipv4Addr::LOCALHOST));
        client.register().unwrap();
        client
    }

    fn sent_cip(client: &Client<Scripted>, index: usize) -> Vec<u8> {
        let frame = unwrap(&client.transport.sent[index]).unwrap();
        // interface handle, timeout, count, null item, data item header
        frame.body[16..].to_vec()
    }

    #[test]
    fn test_client_config_new() {
        let config = ClientConfig::new(Ipv4Addr::new(192, 168, 1, 10));
        assert_eq!(config.plc_addr.ip(), IpAddr::from(Ipv4Addr::new(192, 168, 1, 10)));
        assert_eq!(config.plc_addr.port(), DEFAULT_EIP_PORT);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert_eq!(config.slot, None);
        assert!(!config.connected);
    }

    #[test]
    fn test_client_config_builders() {
        let config = ClientConfig::new(Ipv4Addr::LOCALHOST)
            .with_port(2222)
            .with_timeout(Duration::from_secs(5))
            .with_slot(3)
            .with_max_fragment_size(1000)
            .with_sender_context(*b"abcdefgh")
            .with_vendor_id(1)
            .with_serial_number(2)
            .with_connected(true);
        assert_eq!(config.plc_addr.port(), 2222);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.route(), Some(vec![0x01, 3]));
        assert_eq!(config.max_fragment_size, 1000);
        assert_eq!(&config.sender_context, b"abcdefgh");
        assert_eq!((config.vendor_id, config.serial_number), (1, 2));
        assert!(config.connected);
    }

    #[test]
    fn test_sequence_counter_wraps() {
        let mut counter = SequenceCounter::new(65534);
        assert_eq!(counter.advance(), 65534);
        assert_eq!(counter.advance(), 65535);
        assert_eq!(counter.advance(), 0);
        assert_eq!(counter.peek(), 1);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(SessionState::Introspecting.to_string(), "Introspecting");
        assert_eq!(SessionState::Disconnected.to_string(), "Disconnected");
    }

    #[test]
    fn test_register_and_drop_unregisters() {
        let client = ready_client(vec![]);
        assert_eq!(client.state(), SessionState::Ready);
        assert_eq!(client.session().unwrap().session_handle, 0x11);
        drop(client);
    }

    #[test]
    fn test_operations_need_ready() {
        let mut client =
            Client::with_transport(Scripted::default(), ClientConfig::new(Ipv4Addr::LOCALHOST));
        let err = client.read_i32("Tag").unwrap_err();
        assert!(matches!(err, EipError::NotReady { ref state } if state == "Disconnected"));
    }

    #[test]
    fn test_read_i32() {
        let mut client = ready_client(vec![rr_reply(&[0xCC, 0, 0, 0, 0xC4, 0, 0x2A, 0, 0, 0])]);
        assert_eq!(client.read_i32("Tag").unwrap(), 42);
        assert_eq!(sent_cip(&client, 1), hex::decode("4c039103546167000100").unwrap());
        assert_eq!(client.state(), SessionState::Ready);
    }

    #[test]
    fn test_read_type_mismatch() {
        let mut client = ready_client(vec![rr_reply(&[0xCC, 0, 0, 0, 0xCA, 0, 0, 0, 0, 0])]);
        assert!(matches!(
            client.read_i32("Tag"),
            Err(EipError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn test_slot_wraps_unconnected_send() {
        let mut transport = Scripted::default();
        transport.replies.push_back(Ok(register_reply(0x11)));
        transport
            .replies
            .push_back(Ok(rr_reply(&[0xCD, 0, 0, 0])));
        let mut client = Client::with_transport(
            transport,
            ClientConfig::new(Ipv4Addr::LOCALHOST).with_slot(2),
        );
        client.register().unwrap();
        client.write_i16("T", 7).unwrap();

        let cip = sent_cip(&client, 1);
        assert_eq!(&cip[..8], &[0x52, 0x02, 0x20, 0x06, 0x24, 0x01, 0x0A, 0xF0]);
        assert_eq!(&cip[cip.len() - 4..], &[0x01, 0x00, 0x01, 0x02]);
    }

    #[test]
    fn test_invalid_session_disconnects() {
        let mut frame = rr_reply(&[0xCC, 0, 0, 0]);
        frame[8] = 0x64;
        let mut client = ready_client(vec![frame]);
        let err = client.read_i32("Tag").unwrap_err();
        assert!(err.is_session_invalid());
        assert_eq!(client.state(), SessionState::Disconnected);
        assert!(client.session().is_none());
    }

    #[test]
    fn test_cip_error_keeps_session() {
        let mut client = ready_client(vec![rr_reply(&[0xCC, 0, 0x04, 0])]);
        let err = client.read_i32("Missing").unwrap_err();
        assert!(matches!(err, EipError::CipStatus { .. }));
        assert_eq!(client.state(), SessionState::Ready);
    }

    #[test]
    fn test_debug() {
        let client =
            Client::with_transport(Scripted::default(), ClientConfig::new(Ipv4Addr::LOCALHOST));
        assert!(format!("{client:?}").contains("Client"));
    }
}
