//! Reply decoding: encapsulation, CPF walk and CIP general status.
//!
//! A reply frame is unwrapped in three steps:
//!
//! 1. [`decode_frame`] checks the encapsulation status and extracts the CIP
//!    reply from the unconnected (0xB2) or connected (0xB1) data item.
//! 2. [`decode_single`] or [`decode_multiple`] reads the general status of one
//!    reply or of every sub-reply of a Multiple Service Packet.
//! 3. [`ReadReply::parse`] strips the type code from read data.
//!
//! CIP reply layout:
//!
//! ```text
//! service|0x80 | reserved | general status | ext status words | ext status... | data
//! ```
//!
//! General status 0x06 (partial transfer) is not an error: the reply carries
//! data and `more_data` is set, asking for the next fragment.

use std::fmt;

use crate::data_type::TagType;
use crate::encapsulation::{decode_cpf, unwrap, ITEM_CONNECTED_DATA, ITEM_UNCONNECTED_DATA};
use crate::error::{CipGeneralStatus, EipError, Result};
use crate::service::{REPLY_FLAG, SERVICE_MULTIPLE};

/// General status: embedded service error in a Multiple Service reply.
const STATUS_EMBEDDED_SERVICE_ERROR: u8 = 0x1E;

/// CIP reply extracted from an encapsulated frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyFrame {
    /// Session handle of the reply.
    pub session_handle: u32,
    /// Sequence count of a connected reply.
    pub sequence: Option<u16>,
    /// CIP reply bytes.
    pub cip: Vec<u8>,
}

/// Unwraps an encapsulated reply and returns the CIP reply it carries.
///
/// # Errors
///
/// Returns `MalformedHeader` for a short frame, `Encapsulation` for a non-zero
/// status and `MalformedResponse` if no data item is present.
pub fn decode_frame(frame: &[u8]) -> Result<ReplyFrame> {
    let message = unwrap(frame)?;
    message.check_status()?;

    // Body: interface handle (4) + timeout (2) + CPF items.
    if message.body.len() < 6 {
        return Err(EipError::malformed_response(format!(
            "reply body too short: expected at least 6 bytes, got {}",
            message.body.len()
        ))
        .with_raw(frame));
    }
    let items = decode_cpf(&message.body).map_err(|e| e.with_raw(frame))?;

    for item in items {
        match item.type_id {
            ITEM_UNCONNECTED_DATA => {
                return Ok(ReplyFrame {
                    session_handle: message.header.session_handle,
                    sequence: None,
                    cip: item.data,
                })
            }
            ITEM_CONNECTED_DATA => {
                if item.data.len() < 2 {
                    return Err(EipError::malformed_response(
                        "connected data item without sequence count",
                    )
                    .with_raw(frame));
                }
                return Ok(ReplyFrame {
                    session_handle: message.header.session_handle,
                    sequence: Some(u16::from_le_bytes([item.data[0], item.data[1]])),
                    cip: item.data[2..].to_vec(),
                });
            }
            _ => {}
        }
    }
    Err(EipError::malformed_response("reply has no data item").with_raw(frame))
}

/// A parsed CIP reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CipReply {
    /// Reply service code (request service | 0x80).
    pub service: u8,
    /// General status byte.
    pub general_status: u8,
    /// Additional status words.
    pub extended: Vec<u16>,
    /// Reply data following the status.
    pub data: Vec<u8>,
}

impl CipReply {
    /// Parses a reply.
    ///
    /// # Errors
    ///
    /// Returns `MalformedResponse` if the reply is shorter than 4 bytes or
    /// the extended status runs past its end.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 4 {
            return Err(EipError::malformed_response(format!(
                "CIP reply too short: expected at least 4 bytes, got {}",
                bytes.len()
            ))
            .with_raw(bytes));
        }
        let ext_words = bytes[3] as usize;
        let data_start = 4 + ext_words * 2;
        if bytes.len() < data_start {
            return Err(EipError::malformed_response(format!(
                "CIP reply declares {ext_words} extended status words, {} bytes available",
                bytes.len() - 4
            ))
            .with_raw(bytes));
        }

        let extended = bytes[4..data_start]
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        Ok(Self {
            service: bytes[0],
            general_status: bytes[2],
            extended,
            data: bytes[data_start..].to_vec(),
        })
    }

    /// Returns the decoded general status.
    pub fn status(&self) -> CipGeneralStatus {
        CipGeneralStatus::from_code(self.general_status)
    }

    /// Returns whether the target has more data for this request.
    pub fn more_data(&self) -> bool {
        self.status() == CipGeneralStatus::PartialTransfer
    }

    /// Maps the reply to a [`StatusResult`].
    pub fn into_status_result(self) -> StatusResult {
        let status = self.status();
        if status.is_success() {
            StatusResult::Ok {
                payload: self.data,
                more_data: status == CipGeneralStatus::PartialTransfer,
            }
        } else {
            StatusResult::Err {
                status,
                extended: self.extended,
            }
        }
    }
}

/// Outcome of one CIP service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusResult {
    /// Success or partial transfer.
    Ok {
        /// Reply data following the status.
        payload: Vec<u8>,
        /// The target has more data; request the next fragment.
        more_data: bool,
    },
    /// Failing general status.
    Err {
        /// Decoded general status.
        status: CipGeneralStatus,
        /// Additional status words.
        extended: Vec<u16>,
    },
}

impl StatusResult {
    /// Returns whether the service succeeded.
    pub fn is_ok(&self) -> bool {
        matches!(self, StatusResult::Ok { .. })
    }

    /// Returns the continuation flag (false on error).
    pub fn more_data(&self) -> bool {
        matches!(self, StatusResult::Ok { more_data: true, .. })
    }

    /// Converts into `(payload, more_data)` or a `CipStatus` error.
    pub fn into_result(self) -> Result<(Vec<u8>, bool)> {
        match self {
            StatusResult::Ok { payload, more_data } => Ok((payload, more_data)),
            StatusResult::Err { status, extended } => {
                Err(EipError::cip_status(status.code(), extended))
            }
        }
    }
}

impl fmt::Display for StatusResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusResult::Ok { payload, more_data } => {
                write!(f, "OK ({} bytes", payload.len())?;
                if *more_data {
                    f.write_str(", more data")?;
                }
                f.write_str(")")
            }
            StatusResult::Err { status, .. } => {
                write!(f, "Error 0x{:02X}: {}", status.code(), status.description())
            }
        }
    }
}

/// Decodes a single reply to `service`.
///
/// A failing status is returned as [`StatusResult::Err`] whatever the reply
/// service, so routing errors reported by an Unconnected Send are surfaced
/// as CIP errors.
///
/// # Errors
///
/// Returns `MalformedResponse` if the reply is truncated or answers another
/// service.
pub fn decode_single(cip: &[u8], service: u8) -> Result<StatusResult> {
    let reply = CipReply::parse(cip)?;
    if !reply.status().is_success() {
        return Ok(reply.into_status_result());
    }
    if reply.service != service | REPLY_FLAG {
        return Err(EipError::malformed_response(format!(
            "expected reply to service 0x{:02X}, got 0x{:02X}",
            service, reply.service
        ))
        .with_raw(cip));
    }
    Ok(reply.into_status_result())
}

/// Decodes a Multiple Service Packet reply into one result per request.
///
/// Layout of the outer reply data: count (u16), one u16 offset per reply
/// measured from the count field, then the replies. Each sub-reply carries
/// its own general status; the outer status is 0x00, or 0x1E when at least
/// one sub-reply failed. Every sub-reply must answer `service`, the service
/// of the packed requests.
///
/// # Errors
///
/// Returns `MalformedResponse` for a truncated table, an out-of-range offset
/// or a sub-reply to another service, and `CipStatus` if the packet as a
/// whole was rejected.
pub fn decode_multiple(cip: &[u8], service: u8) -> Result<Vec<StatusResult>> {
    let reply = CipReply::parse(cip)?;
    if reply.general_status != 0 && reply.general_status != STATUS_EMBEDDED_SERVICE_ERROR {
        return Err(EipError::cip_status(reply.general_status, reply.extended).with_raw(cip));
    }
    if reply.service != SERVICE_MULTIPLE | REPLY_FLAG {
        return Err(EipError::malformed_response(format!(
            "expected Multiple Service reply, got service 0x{:02X}",
            reply.service
        ))
        .with_raw(cip));
    }

    let data = &reply.data;
    let malformed = |reason: String| EipError::malformed_response(reason).with_raw(cip);
    if data.len() < 2 {
        return Err(malformed("Multiple Service reply has no count".to_string()));
    }
    let count = u16::from_le_bytes([data[0], data[1]]) as usize;
    let table_end = 2 + count * 2;
    if data.len() < table_end {
        return Err(malformed(format!(
            "offset table of {count} entries needs {table_end} bytes, got {}",
            data.len()
        )));
    }

    let offsets: Vec<usize> = data[2..table_end]
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]) as usize)
        .collect();

    let mut results = Vec::with_capacity(count);
    for (index, &start) in offsets.iter().enumerate() {
        let end = offsets.get(index + 1).copied().unwrap_or(data.len());
        if start < table_end || end < start || end > data.len() {
            return Err(malformed(format!(
                "reply {index} spans {start}..{end} outside {table_end}..{}",
                data.len()
            )));
        }
        let sub_reply = CipReply::parse(&data[start..end])?;
        if sub_reply.service != service | REPLY_FLAG {
            return Err(malformed(format!(
                "reply {index} answers service 0x{:02X}, expected 0x{:02X}",
                sub_reply.service,
                service | REPLY_FLAG
            )));
        }
        results.push(sub_reply.into_status_result());
    }
    Ok(results)
}

/// Data of a Read Tag / Read Tag Fragmented reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadReply {
    /// Type announced by the reply.
    pub tag_type: TagType,
    /// Value bytes.
    pub data: Vec<u8>,
    /// The target has more data.
    pub more_data: bool,
}

impl ReadReply {
    /// Splits read data into type and value.
    ///
    /// # Errors
    ///
    /// Returns `MalformedResponse` if the type prefix is truncated.
    pub fn parse(payload: &[u8], more_data: bool) -> Result<Self> {
        let (tag_type, len) = TagType::from_bytes(payload).ok_or_else(|| {
            EipError::malformed_response(format!(
                "read reply of {} bytes has no type code",
                payload.len()
            ))
            .with_raw(payload)
        })?;
        Ok(Self {
            tag_type,
            data: payload[len..].to_vec(),
            more_data,
        })
    }

    /// Decodes a [`StatusResult`] of a read service.
    pub fn from_status(result: StatusResult) -> Result<Self> {
        let (payload, more_data) = result.into_result()?;
        Self::parse(&payload, more_data)
    }
}
