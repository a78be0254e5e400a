//! EtherNet/IP encapsulation header and Common Packet Format items.
//!
//! Every message on the TCP connection starts with a 24-byte header:
//!
//! | Bytes | Field | Description |
//! |-------|-------|-------------|
//! | 0..2 | command | encapsulation command (LE) |
//! | 2..4 | length | number of bytes following the header (LE) |
//! | 4..8 | session handle | assigned by the target at Register Session |
//! | 8..12 | status | 0 on requests, error code on replies |
//! | 12..20 | sender context | echoed back unchanged by the target |
//! | 20..24 | options | always 0 |
//!
//! SendRRData / SendUnitData bodies carry a Common Packet Format (CPF) list:
//! interface handle (u32), timeout (u16), item count (u16), then items of
//! `type (u16), length (u16), data`.
//!
//! # Example
//!
//! ```
//! use ab_eip::encapsulation::{unwrap, wrap, COMMAND_SEND_RR_DATA};
//!
//! let frame = wrap(COMMAND_SEND_RR_DATA, 0x1234_5678, &[0xAA, 0xBB], None).unwrap();
//! assert_eq!(frame.len(), 26);
//!
//! let message = unwrap(&frame).unwrap();
//! assert_eq!(message.header.session_handle, 0x1234_5678);
//! assert_eq!(message.body, vec![0xAA, 0xBB]);
//! ```

use crate::error::{EipError, Result};

/// Encapsulation header size in bytes.
pub const ENCAPSULATION_HEADER_SIZE: usize = 24;

/// NOP command.
pub const COMMAND_NOP: u16 = 0x0000;
/// Register Session command.
pub const COMMAND_REGISTER_SESSION: u16 = 0x0065;
/// Unregister Session command.
pub const COMMAND_UNREGISTER_SESSION: u16 = 0x0066;
/// SendRRData command (unconnected request/reply).
pub const COMMAND_SEND_RR_DATA: u16 = 0x006F;
/// SendUnitData command (connected messaging).
pub const COMMAND_SEND_UNIT_DATA: u16 = 0x0070;

/// Encapsulation protocol version sent at registration.
pub const PROTOCOL_VERSION: u16 = 1;

/// CPF item: null address.
pub const ITEM_NULL_ADDRESS: u16 = 0x0000;
/// CPF item: connected address (carries the O->T connection id).
pub const ITEM_CONNECTED_ADDRESS: u16 = 0x00A1;
/// CPF item: connected data (sequence count + CIP message).
pub const ITEM_CONNECTED_DATA: u16 = 0x00B1;
/// CPF item: unconnected data (CIP message).
pub const ITEM_UNCONNECTED_DATA: u16 = 0x00B2;

/// Timeout field of the CPF list, in seconds.
pub const CPF_TIMEOUT: u16 = 0x000A;

/// Fixed header preceding every encapsulated message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncapsulationHeader {
    /// Encapsulation command.
    pub command: u16,
    /// Length of the body following the header.
    pub length: u16,
    /// Session handle.
    pub session_handle: u32,
    /// Status (0 = success).
    pub status: u32,
    /// Opaque context echoed by the target.
    pub sender_context: [u8; 8],
    /// Options (always 0).
    pub options: u32,
}

impl EncapsulationHeader {
    /// Creates a request header.
    pub fn new(command: u16, session_handle: u32, length: u16, sender_context: [u8; 8]) -> Self {
        Self {
            command,
            length,
            session_handle,
            status: 0,
            sender_context,
            options: 0,
        }
    }

    /// Serializes the header.
    pub fn to_bytes(self) -> [u8; ENCAPSULATION_HEADER_SIZE] {
        let mut bytes = [0u8; ENCAPSULATION_HEADER_SIZE];
        bytes[0..2].copy_from_slice(&self.command.to_le_bytes());
        bytes[2..4].copy_from_slice(&self.length.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.session_handle.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.status.to_le_bytes());
        bytes[12..20].copy_from_slice(&self.sender_context);
        bytes[20..24].copy_from_slice(&self.options.to_le_bytes());
        bytes
    }

    /// Parses a header.
    ///
    /// # Errors
    ///
    /// Returns `MalformedHeader` if fewer than 24 bytes are given.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < ENCAPSULATION_HEADER_SIZE {
            return Err(EipError::malformed_header(format!(
                "header too short: expected {} bytes, got {}",
                ENCAPSULATION_HEADER_SIZE,
                data.len()
            )));
        }

        let mut sender_context = [0u8; 8];
        sender_context.copy_from_slice(&data[12..20]);

        Ok(Self {
            command: u16::from_le_bytes([data[0], data[1]]),
            length: u16::from_le_bytes([data[2], data[3]]),
            session_handle: u32::from_le_bytes([data[4], data[5], data[6], data[7]]),
            status: u32::from_le_bytes([data[8], data[9], data[10], data[11]]),
            sender_context,
            options: u32::from_le_bytes([data[20], data[21], data[22], data[23]]),
        })
    }
}

/// An unwrapped encapsulated message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encapsulated {
    /// Parsed header.
    pub header: EncapsulationHeader,
    /// Bytes following the header.
    pub body: Vec<u8>,
}

impl Encapsulated {
    /// Returns an error if the header status is not zero.
    pub fn check_status(&self) -> Result<()> {
        if self.header.status == 0 {
            Ok(())
        } else {
            Err(EipError::Encapsulation {
                status: self.header.status,
            })
        }
    }
}

/// Prefixes `body` with an encapsulation header.
///
/// The status and options fields are zero; a missing sender context is
/// sent as eight zero bytes.
///
/// # Errors
///
/// Returns `InvalidParameter` if `body` exceeds the 65535 bytes the length
/// field can declare.
pub fn wrap(
    command: u16,
    session_handle: u32,
    body: &[u8],
    context: Option<[u8; 8]>,
) -> Result<Vec<u8>> {
    let length = u16::try_from(body.len()).map_err(|_| {
        EipError::invalid_parameter(
            "body",
            format!("{} bytes exceed the encapsulation length field", body.len()),
        )
    })?;
    let header =
        EncapsulationHeader::new(command, session_handle, length, context.unwrap_or_default());
    let mut frame = Vec::with_capacity(ENCAPSULATION_HEADER_SIZE + body.len());
    frame.extend_from_slice(&header.to_bytes());
    frame.extend_from_slice(body);
    Ok(frame)
}

/// Splits a frame into header and body.
///
/// # Errors
///
/// Returns `MalformedHeader` if the frame is shorter than 24 bytes or than
/// the length declared in the header.
pub fn unwrap(frame: &[u8]) -> Result<Encapsulated> {
    let header = EncapsulationHeader::from_bytes(frame)?;
    let end = ENCAPSULATION_HEADER_SIZE + header.length as usize;
    if frame.len() < end {
        return Err(EipError::malformed_header(format!(
            "declared length {} exceeds the {} bytes received",
            header.length,
            frame.len() - ENCAPSULATION_HEADER_SIZE
        )));
    }
    Ok(Encapsulated {
        header,
        body: frame[ENCAPSULATION_HEADER_SIZE..end].to_vec(),
    })
}

/// Returns the command and body of a Register Session request.
pub fn register_session() -> (u16, Vec<u8>) {
    let mut body = Vec::with_capacity(4);
    body.extend_from_slice(&PROTOCOL_VERSION.to_le_bytes());
    body.extend_from_slice(&0u16.to_le_bytes());
    (COMMAND_REGISTER_SESSION, body)
}

/// Extracts the session handle from a Register Session reply.
///
/// # Errors
///
/// Returns `MalformedHeader` for a short frame, `Encapsulation` for a non-zero
/// status and `MalformedResponse` if the target assigned handle 0.
pub fn parse_register_reply(frame: &[u8]) -> Result<u32> {
    let header = EncapsulationHeader::from_bytes(frame)?;
    if header.status != 0 {
        return Err(EipError::Encapsulation {
            status: header.status,
        });
    }
    if header.command != COMMAND_REGISTER_SESSION {
        return Err(EipError::malformed_response(format!(
            "expected Register Session reply, got command 0x{:04X}",
            header.command
        ))
        .with_raw(frame));
    }
    if header.session_handle == 0 {
        return Err(
            EipError::malformed_response("target assigned session handle 0").with_raw(frame)
        );
    }
    Ok(header.session_handle)
}

/// Builds a complete Unregister Session frame.
pub fn unregister_session(session_handle: u32) -> Vec<u8> {
    EncapsulationHeader::new(COMMAND_UNREGISTER_SESSION, session_handle, 0, [0; 8])
        .to_bytes()
        .to_vec()
}

/// A Common Packet Format item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpfItem {
    /// Item type id.
    pub type_id: u16,
    /// Item data.
    pub data: Vec<u8>,
}

impl CpfItem {
    /// Creates an item.
    pub fn new(type_id: u16, data: Vec<u8>) -> Self {
        Self { type_id, data }
    }

    /// Null address item.
    pub fn null_address() -> Self {
        Self::new(ITEM_NULL_ADDRESS, Vec::new())
    }

    /// Unconnected data item.
    pub fn unconnected_data(cip: &[u8]) -> Self {
        Self::new(ITEM_UNCONNECTED_DATA, cip.to_vec())
    }

    /// Connected address item.
    pub fn connected_address(connection_id: u32) -> Self {
        Self::new(ITEM_CONNECTED_ADDRESS, connection_id.to_le_bytes().to_vec())
    }

    /// Connected data item, prefixed with the sequence count.
    pub fn connected_data(sequence: u16, cip: &[u8]) -> Self {
        let mut data = Vec::with_capacity(2 + cip.len());
        data.extend_from_slice(&sequence.to_le_bytes());
        data.extend_from_slice(cip);
        Self::new(ITEM_CONNECTED_DATA, data)
    }
}

/// Serializes a CPF list with interface handle 0.
pub fn encode_cpf(timeout: u16, items: &[CpfItem]) -> Vec<u8> {
    let size: usize = items.iter().map(|i| 4 + i.data.len()).sum();
    let mut bytes = Vec::with_capacity(8 + size);
    bytes.extend_from_slice(&0u32.to_le_bytes());
    bytes.extend_from_slice(&timeout.to_le_bytes());
    bytes.extend_from_slice(&(items.len() as u16).to_le_bytes());
    for item in items {
        bytes.extend_from_slice(&item.type_id.to_le_bytes());
        bytes.extend_from_slice(&(item.data.len() as u16).to_le_bytes());
        bytes.extend_from_slice(&item.data);
    }
    bytes
}

/// Parses a CPF list.
///
/// # Errors
///
/// Returns `MalformedResponse` if the list or an item is truncated.
pub fn decode_cpf(body: &[u8]) -> Result<Vec<CpfItem>> {
    if body.len() < 8 {
        return Err(EipError::malformed_response(format!(
            "CPF list too short: expected at least 8 bytes, got {}",
            body.len()
        ))
        .with_raw(body));
    }

    let count = u16::from_le_bytes([body[6], body[7]]) as usize;
    let mut items = Vec::with_capacity(count);
    let mut pos = 8usize;

    for index in 0..count {
        let header = body.get(pos..pos + 4).ok_or_else(|| {
            EipError::malformed_response(format!("CPF item {index} header truncated"))
                .with_raw(body)
        })?;
        let type_id = u16::from_le_bytes([header[0], header[1]]);
        let length = u16::from_le_bytes([header[2], header[3]]) as usize;
        pos += 4;

        let data = body.get(pos..pos + length).ok_or_else(|| {
            EipError::malformed_response(format!(
                "CPF item {index} (type 0x{type_id:04X}) declares {length} bytes, {} available",
                body.len() - pos
            ))
            .with_raw(body)
        })?;
        items.push(CpfItem::new(type_id, data.to_vec()));
        pos += length;
    }

    Ok(items)
}

/// Builds a SendRRData body carrying one unconnected CIP request.
pub fn send_rr_data_body(cip: &[u8]) -> Vec<u8> {
    encode_cpf(
        CPF_TIMEOUT,
        &[CpfItem::null_address(), CpfItem::unconnected_data(cip)],
    )
}

/// Builds a SendUnitData body carrying one connected CIP request.
pub fn send_unit_data_body(connection_id: u32, sequence: u16, cip: &[u8]) -> Vec<u8> {
    encode_cpf(
        0,
        &[
            CpfItem::connected_address(connection_id),
            CpfItem::connected_data(sequence, cip),
        ],
    )
}
