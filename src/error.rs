//! Error types for the EtherNet/IP and PCCC protocol stack.

use std::fmt;
use std::io;
use thiserror::Error;

use crate::pccc::PcccStatus;

/// Result type alias for EtherNet/IP operations.
pub type Result<T> = std::result::Result<T, EipError>;

/// Encapsulation status: the session handle is not registered.
pub const ENCAP_STATUS_INVALID_SESSION: u32 = 0x64;
/// Encapsulation status: the message length is invalid.
pub const ENCAP_STATUS_INVALID_LENGTH: u32 = 0x65;

/// Errors that can occur during EtherNet/IP or DF1 communication.
#[derive(Debug, Error)]
pub enum EipError {
    /// I/O error reported by the transport.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The deadline for the current exchange expired.
    #[error("Communication timeout")]
    Timeout,

    /// The 24-byte encapsulation header could not be parsed.
    #[error("Malformed encapsulation header: {reason}")]
    MalformedHeader {
        /// Description of the header error.
        reason: String,
    },

    /// A reply was too short or structurally inconsistent.
    #[error("Malformed response: {reason}")]
    MalformedResponse {
        /// Description of the response error.
        reason: String,
        /// Frame that triggered the error (may be empty).
        raw: Vec<u8>,
    },

    /// The encapsulation header carried a non-zero status.
    #[error("Encapsulation status 0x{status:08X}: {}", encapsulation_status_text(.status))]
    Encapsulation {
        /// Status field of the encapsulation header.
        status: u32,
    },

    /// A CIP service reply carried a failing general status.
    #[error("CIP error 0x{:02X}: {}", .status.code(), .status.description())]
    CipStatus {
        /// Decoded general status.
        status: CipGeneralStatus,
        /// Additional (extended) status words.
        extended: Vec<u16>,
        /// Frame that triggered the error (may be empty).
        raw: Vec<u8>,
    },

    /// A PCCC reply carried a failing STS / EXT STS.
    #[error("PCCC error: {status}")]
    PcccStatus {
        /// Decoded STS / EXT STS pair.
        status: PcccStatus,
        /// Frame that triggered the error (may be empty).
        raw: Vec<u8>,
    },

    /// BCC or CRC16 verification of a DF1 frame failed.
    #[error("Checksum mismatch: expected 0x{expected:04X}, received 0x{received:04X}")]
    ChecksumMismatch {
        /// Check value computed over the received bytes.
        expected: u16,
        /// Check value carried by the frame.
        received: u16,
    },

    /// An address string could not be parsed.
    #[error("Invalid address '{address}': {reason}")]
    AddressParse {
        /// The offending address string.
        address: String,
        /// Description of the parse error.
        reason: String,
    },

    /// Invalid parameter provided.
    #[error("Invalid parameter '{parameter}': {reason}")]
    InvalidParameter {
        /// Name of the invalid parameter.
        parameter: String,
        /// Description of why the parameter is invalid.
        reason: String,
    },

    /// Fragment offset bookkeeping disagreed with the continuation flag.
    #[error(
        "Inconsistent fragmentation at offset {offset} of {total}: \
         received {received} bytes, more_data={more_data}"
    )]
    InconsistentFragmentation {
        /// Offset of the fragment that disagreed.
        offset: usize,
        /// Total number of bytes requested.
        total: usize,
        /// Bytes received for this fragment.
        received: usize,
        /// Continuation flag carried by the reply.
        more_data: bool,
    },

    /// A fragment failed after earlier fragments had completed.
    #[error("Fragment at offset {offset} of {} failed: {source}", byte_total(.total))]
    FragmentFailed {
        /// Offset of the failed fragment.
        offset: usize,
        /// Total number of bytes of the logical operation, `None` when a
        /// continued read of unknown size failed.
        total: Option<usize>,
        /// The error that aborted the fragment.
        #[source]
        source: Box<EipError>,
    },

    /// Transaction number of a PCCC reply did not match the request.
    #[error("TNS mismatch: expected 0x{expected:04X}, received 0x{received:04X}")]
    TnsMismatch {
        /// TNS sent with the request.
        expected: u16,
        /// TNS carried by the reply.
        received: u16,
    },

    /// The session is not in a state that accepts the operation.
    #[error("Session not ready (state: {state})")]
    NotReady {
        /// Current session state.
        state: String,
    },
}

impl EipError {
    /// Creates a new `MalformedHeader` error.
    pub fn malformed_header(reason: impl Into<String>) -> Self {
        Self::MalformedHeader {
            reason: reason.into(),
        }
    }

    /// Creates a new `MalformedResponse` error without an attached frame.
    ///
    /// # Example
    ///
    /// ```
    /// use ab_eip::EipError;
    ///
    /// let err = EipError::malformed_response("reply too short");
    /// assert_eq!(err.to_string(), "Malformed response: reply too short");
    /// ```
    pub fn malformed_response(reason: impl Into<String>) -> Self {
        Self::MalformedResponse {
            reason: reason.into(),
            raw: Vec::new(),
        }
    }

    /// Creates a new `CipStatus` error from a raw general status code.
    pub fn cip_status(code: u8, extended: Vec<u16>) -> Self {
        Self::CipStatus {
            status: CipGeneralStatus::from_code(code),
            extended,
            raw: Vec::new(),
        }
    }

    /// Creates a new `PcccStatus` error.
    pub fn pccc_status(status: PcccStatus) -> Self {
        Self::PcccStatus {
            status,
            raw: Vec::new(),
        }
    }

    /// Creates a new `AddressParse` error.
    ///
    /// # Example
    ///
    /// ```
    /// use ab_eip::EipError;
    ///
    /// let err = EipError::address_parse("N7", "missing ':'");
    /// assert_eq!(err.to_string(), "Invalid address 'N7': missing ':'");
    /// ```
    pub fn address_parse(address: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::AddressParse {
            address: address.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new `InvalidParameter` error.
    pub fn invalid_parameter(parameter: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            reason: reason.into(),
        }
    }

    /// Attaches the frame that triggered the error, for diagnostics.
    ///
    /// Only the decode-level variants carry a frame; other variants are
    /// returned unchanged. An already attached frame is kept.
    pub fn with_raw(mut self, frame: &[u8]) -> Self {
        match &mut self {
            Self::MalformedResponse { raw, .. }
            | Self::CipStatus { raw, .. }
            | Self::PcccStatus { raw, .. }
                if raw.is_empty() =>
            {
                raw.extend_from_slice(frame);
            }
            _ => {}
        }
        self
    }

    /// Returns the attached frame, if any.
    pub fn raw(&self) -> Option<&[u8]> {
        match self {
            Self::MalformedResponse { raw, .. }
            | Self::CipStatus { raw, .. }
            | Self::PcccStatus { raw, .. }
                if !raw.is_empty() =>
            {
                Some(raw)
            }
            Self::FragmentFailed { source, .. } => source.raw(),
            _ => None,
        }
    }

    /// Returns whether this error invalidates the registered session.
    ///
    /// Transport loss and an expired deadline count as well: replies are
    /// correlated by arrival order only, so a late reply would be taken for
    /// the next request's. The caller must register a new session before
    /// issuing more requests.
    pub fn is_session_invalid(&self) -> bool {
        match self {
            Self::Encapsulation { status } => {
                *status == ENCAP_STATUS_INVALID_SESSION || *status == ENCAP_STATUS_INVALID_LENGTH
            }
            Self::Io(_) | Self::Timeout => true,
            Self::FragmentFailed { source, .. } => source.is_session_invalid(),
            _ => false,
        }
    }
}

fn byte_total(total: &Option<usize>) -> String {
    total.map_or_else(|| "unknown size".to_string(), |t| t.to_string())
}

/// Returns a description for an encapsulation header status.
pub fn encapsulation_status_description(status: u32) -> &'static str {
    match status {
        0x0000 => "Success",
        0x0001 => "Invalid or unsupported encapsulation command",
        0x0002 => "Insufficient memory resources in the receiver",
        0x0003 => "Poorly formed or incorrect data in the data portion",
        ENCAP_STATUS_INVALID_SESSION => "Invalid session handle",
        ENCAP_STATUS_INVALID_LENGTH => "Invalid message length",
        0x0069 => "Unsupported encapsulation protocol revision",
        _ => "Unknown encapsulation status",
    }
}

fn encapsulation_status_text(status: &u32) -> &'static str {
    encapsulation_status_description(*status)
}

/// CIP general status of a service reply.
///
/// The named variants are the codes a Logix controller reports for tag
/// services; every other documented code maps to [`CipGeneralStatus::Other`]
/// with its own message, and undocumented codes to
/// [`CipGeneralStatus::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CipGeneralStatus {
    /// 0x00 - service completed.
    Success,
    /// 0x04 - request path segment error.
    PathSegmentError,
    /// 0x05 - request path destination unknown.
    PathDestinationUnknown,
    /// 0x06 - partial transfer, more data follows.
    PartialTransfer,
    /// 0x0A - attribute list error.
    AttributeListError,
    /// 0x0C - object state conflict.
    ObjectStateConflict,
    /// 0x13 - insufficient request data.
    InsufficientRequestData,
    /// 0x1C - insufficient attribute count.
    InsufficientAttributeCount,
    /// 0x1E - embedded service request error.
    ServiceRequestError,
    /// 0x20 - invalid parameter / data type mismatch.
    TypeMismatch,
    /// 0x26 - request path size invalid.
    PathSizeInvalid,
    /// Another documented CIP general status.
    Other(u8),
    /// A code outside the documented general status space.
    Unknown(u8),
}

impl CipGeneralStatus {
    /// Maps a raw general status byte.
    pub fn from_code(code: u8) -> Self {
        match code {
            0x00 => Self::Success,
            0x04 => Self::PathSegmentError,
            0x05 => Self::PathDestinationUnknown,
            0x06 => Self::PartialTransfer,
            0x0A => Self::AttributeListError,
            0x0C => Self::ObjectStateConflict,
            0x13 => Self::InsufficientRequestData,
            0x1C => Self::InsufficientAttributeCount,
            0x1E => Self::ServiceRequestError,
            0x20 => Self::TypeMismatch,
            0x26 => Self::PathSizeInvalid,
            c if documented_description(c).is_some() => Self::Other(c),
            c => Self::Unknown(c),
        }
    }

    /// Returns the raw general status byte.
    pub fn code(self) -> u8 {
        match self {
            Self::Success => 0x00,
            Self::PathSegmentError => 0x04,
            Self::PathDestinationUnknown => 0x05,
            Self::PartialTransfer => 0x06,
            Self::AttributeListError => 0x0A,
            Self::ObjectStateConflict => 0x0C,
            Self::InsufficientRequestData => 0x13,
            Self::InsufficientAttributeCount => 0x1C,
            Self::ServiceRequestError => 0x1E,
            Self::TypeMismatch => 0x20,
            Self::PathSizeInvalid => 0x26,
            Self::Other(c) | Self::Unknown(c) => c,
        }
    }

    /// Returns whether the status lets the caller use the payload.
    ///
    /// Partial transfer counts as success with continuation.
    pub fn is_success(self) -> bool {
        matches!(self, Self::Success | Self::PartialTransfer)
    }

    /// Returns a human readable description. Never empty.
    pub fn description(self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::PathSegmentError => {
                "Request path segment error: the path could not be parsed or the tag does not exist"
            }
            Self::PathDestinationUnknown => {
                "Request path destination unknown: the object, instance or member does not exist"
            }
            Self::PartialTransfer => "Partial transfer: only part of the data was transferred",
            Self::AttributeListError => "Attribute list error: an attribute in the reply failed",
            Self::ObjectStateConflict => {
                "Object state conflict: the object cannot service the request now"
            }
            Self::InsufficientRequestData => "Insufficient request data: the request was too short",
            Self::InsufficientAttributeCount => "Insufficient attribute count in the request",
            Self::ServiceRequestError => "Embedded service request error",
            Self::TypeMismatch => "Invalid parameter: the data type does not match the tag",
            Self::PathSizeInvalid => "Request path size invalid",
            Self::Other(c) => documented_description(c).unwrap_or("Unknown CIP general status"),
            Self::Unknown(_) => "Unknown CIP general status",
        }
    }
}

impl fmt::Display for CipGeneralStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X} ({})", self.code(), self.description())
    }
}

fn documented_description(code: u8) -> Option<&'static str> {
    let text = match code {
        0x01 => "Connection failure",
        0x02 => "Resource unavailable",
        0x03 => "Invalid parameter value",
        0x07 => "Connection lost",
        0x08 => "Service not supported",
        0x09 => "Invalid attribute value",
        0x0B => "Already in requested mode/state",
        0x0D => "Object already exists",
        0x0E => "Attribute not settable",
        0x0F => "Privilege violation",
        0x10 => "Device state conflict",
        0x11 => "Reply data too large",
        0x12 => "Fragmentation of a primitive value",
        0x14 => "Attribute not supported",
        0x15 => "Too much data",
        0x16 => "Object does not exist",
        0x17 => "Service fragmentation sequence not in progress",
        0x18 => "No stored attribute data",
        0x19 => "Store operation failure",
        0x1A => "Routing failure, request packet too large",
        0x1B => "Routing failure, response packet too large",
        0x1D => "Invalid attribute value list",
        0x1F => "Vendor specific error",
        0x21 => "Write-once value or medium already written",
        0x22 => "Invalid reply received",
        0x23 => "Buffer overflow",
        0x24 => "Invalid message format",
        0x25 => "Key failure in path",
        0x27 => "Unexpected attribute in list",
        0x28 => "Invalid member ID",
        0x29 => "Member not settable",
        0x2A => "Group 2 only server general failure",
        0x2B => "Unknown Modbus error",
        0x2C => "Attribute not gettable",
        _ => return None,
    };
    Some(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_malformed_response_display() {
        let err = EipError::malformed_response("reply too short");
        assert_eq!(err.to_string(), "Malformed response: reply too short");
    }

    #[test]
    fn test_cip_status_display() {
        let err = EipError::cip_status(0x05, vec![]);
        assert!(err.to_string().starts_with("CIP error 0x05: Request path destination unknown"));
    }

    #[test]
    fn test_fragment_failed_display() {
        let known = EipError::FragmentFailed {
            offset: 8,
            total: Some(20),
            source: Box::new(EipError::Timeout),
        };
        assert_eq!(
            known.to_string(),
            "Fragment at offset 8 of 20 failed: Communication timeout"
        );
        let unknown = EipError::FragmentFailed {
            offset: 480,
            total: None,
            source: Box::new(EipError::Timeout),
        };
        assert!(unknown.to_string().contains("of unknown size"));
    }

    #[test]
    fn test_timeout_display() {
        assert_eq!(EipError::Timeout.to_string(), "Communication timeout");
    }

    #[test]
    fn test_with_raw_attaches_once() {
        let err = EipError::cip_status(0x04, vec![])
            .with_raw(&[0xCC, 0x00, 0x04])
            .with_raw(&[0xFF]);
        assert_eq!(err.raw(), Some(&[0xCC, 0x00, 0x04][..]));

        let err = EipError::Timeout.with_raw(&[0x01]);
        assert!(err.raw().is_none());
    }

    #[test]
    fn test_session_invalid() {
        assert!(EipError::Encapsulation { status: 0x64 }.is_session_invalid());
        assert!(EipError::Encapsulation { status: 0x65 }.is_session_invalid());
        assert!(!EipError::Encapsulation { status: 0x01 }.is_session_invalid());
        assert!(EipError::Timeout.is_session_invalid());
        assert!(!EipError::cip_status(0x04, vec![]).is_session_invalid());
    }

    #[test]
    fn test_named_status_codes_roundtrip() {
        for code in [0x00, 0x04, 0x05, 0x06, 0x0A, 0x0C, 0x13, 0x1C, 0x1E, 0x20, 0x26] {
            let status = CipGeneralStatus::from_code(code);
            assert!(!matches!(status, CipGeneralStatus::Other(_) | CipGeneralStatus::Unknown(_)));
            assert_eq!(status.code(), code);
        }
    }

    #[test]
    fn test_status_mapping_is_total_and_distinct() {
        let mut messages = HashSet::new();
        for code in 0..=u8::MAX {
            let status = CipGeneralStatus::from_code(code);
            assert_eq!(status.code(), code);
            let text = status.description();
            assert!(!text.is_empty());
            if !matches!(status, CipGeneralStatus::Unknown(_)) {
                assert!(messages.insert(text), "duplicate message for 0x{code:02X}");
            }
        }
        assert_eq!(CipGeneralStatus::from_code(0x7F), CipGeneralStatus::Unknown(0x7F));
    }

    #[test]
    fn test_partial_transfer_is_success() {
        assert!(CipGeneralStatus::PartialTransfer.is_success());
        assert!(!CipGeneralStatus::PathSegmentError.is_success());
    }
}
