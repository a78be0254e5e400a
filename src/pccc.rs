//! PCCC typed-logical commands for SLC / MicroLogix / PLC-5 data files.
//!
//! Legacy controllers are addressed by data-table file and element
//! (`N7:1`, `B9:0/3`, `F8:10`). The same command body is carried two ways:
//! raw inside a DF1 serial frame ([`crate::df1`]) or wrapped in the CIP
//! Execute PCCC service (0x4B) over EtherNet/IP.
//!
//! Command body ("Protected Typed Logical ... with Three Address Fields"):
//!
//! | Byte | Field |
//! |------|-------|
//! | 0 | CMD (0x0F) |
//! | 1 | STS (0x00 on requests) |
//! | 2..4 | TNS (LE) |
//! | 4 | FNC (0xA2 read, 0xAA write, 0xAB masked bit write) |
//! | 5 | byte size |
//! | .. | file number (var-len) |
//! | .. | file type code |
//! | .. | element number (var-len) |
//! | .. | sub-element number (var-len) |
//! | .. | data |
//!
//! A var-len field is one byte when the value is below 255, otherwise 0xFF
//! followed by the value as u16 LE.
//!
//! # Example
//!
//! ```
//! use ab_eip::pccc::{read_command, PcccAddress, PcccFileType};
//!
//! let address = PcccAddress::parse("N7:1").unwrap();
//! assert_eq!(address.file_type(), Some(PcccFileType::Integer));
//!
//! let body = read_command(0x1234, &address, 2).unwrap();
//! assert_eq!(body, vec![0x0F, 0x00, 0x34, 0x12, 0xA2, 0x02, 0x07, 0x89, 0x01, 0x00]);
//! ```

use std::fmt;

use crate::address::parse_number;
use crate::error::{EipError, Result};
use crate::service::FragmentPlan;

/// PCCC command code for typed-logical commands.
pub const CMD_TYPED: u8 = 0x0F;
/// Bit set in the command code of a reply.
pub const REPLY_FLAG: u8 = 0x40;
/// Protected typed logical read with three address fields.
pub const FNC_READ: u8 = 0xA2;
/// Protected typed logical write with three address fields.
pub const FNC_WRITE: u8 = 0xAA;
/// Protected typed logical masked write with three address fields.
pub const FNC_MASK_WRITE: u8 = 0xAB;

/// Largest data block one typed-logical command may carry.
pub const MAX_DATA_BYTES: usize = 236;

/// STS value announcing an EXT STS byte.
pub const STS_EXTENDED: u8 = 0xF0;

/// CIP Execute PCCC service.
pub const SERVICE_EXECUTE_PCCC: u8 = 0x4B;
/// PCCC object class.
pub const CLASS_PCCC: u8 = 0x67;
/// Length byte of the requestor id (length + vendor + serial).
pub const REQUESTOR_ID_LEN: u8 = 7;

/// Data-table file types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PcccFileType {
    /// `O` - outputs.
    Output,
    /// `I` - inputs.
    Input,
    /// `S` - status.
    Status,
    /// `B` - bits.
    Bit,
    /// `T` - timers.
    Timer,
    /// `C` - counters.
    Counter,
    /// `R` - control.
    Control,
    /// `N` - integers.
    Integer,
    /// `F` - floats.
    Float,
    /// `ST` - strings.
    String,
    /// `A` - ASCII.
    Ascii,
    /// `L` - long integers.
    Long,
    /// `MG` - message.
    Message,
    /// `PD` - PID.
    Pid,
    /// `PLS` - programmable limit switch.
    Pls,
}

impl PcccFileType {
    const ALL: [PcccFileType; 15] = [
        PcccFileType::Output,
        PcccFileType::Input,
        PcccFileType::Status,
        PcccFileType::Bit,
        PcccFileType::Timer,
        PcccFileType::Counter,
        PcccFileType::Control,
        PcccFileType::Integer,
        PcccFileType::Float,
        PcccFileType::String,
        PcccFileType::Ascii,
        PcccFileType::Long,
        PcccFileType::Message,
        PcccFileType::Pid,
        PcccFileType::Pls,
    ];

    /// Returns the file type code sent on the wire.
    pub fn code(self) -> u8 {
        match self {
            PcccFileType::Output => 0x8B,
            PcccFileType::Input => 0x8C,
            PcccFileType::Status => 0x84,
            PcccFileType::Bit => 0x85,
            PcccFileType::Timer => 0x86,
            PcccFileType::Counter => 0x87,
            PcccFileType::Control => 0x88,
            PcccFileType::Integer => 0x89,
            PcccFileType::Float => 0x8A,
            PcccFileType::String => 0x8D,
            PcccFileType::Ascii => 0x8E,
            PcccFileType::Long => 0x91,
            PcccFileType::Message => 0x92,
            PcccFileType::Pid => 0x93,
            PcccFileType::Pls => 0x94,
        }
    }

    /// Looks up a file type code.
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.code() == code)
    }

    /// Returns the address prefix (`N`, `ST`, ...).
    pub fn prefix(self) -> &'static str {
        match self {
            PcccFileType::Output => "O",
            PcccFileType::Input => "I",
            PcccFileType::Status => "S",
            PcccFileType::Bit => "B",
            PcccFileType::Timer => "T",
            PcccFileType::Counter => "C",
            PcccFileType::Control => "R",
            PcccFileType::Integer => "N",
            PcccFileType::Float => "F",
            PcccFileType::String => "ST",
            PcccFileType::Ascii => "A",
            PcccFileType::Long => "L",
            PcccFileType::Message => "MG",
            PcccFileType::Pid => "PD",
            PcccFileType::Pls => "PLS",
        }
    }

    /// Looks up an address prefix, case-insensitively.
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.prefix().eq_ignore_ascii_case(prefix))
    }

    /// Returns the size of one element in bytes.
    pub fn element_size(self) -> usize {
        match self {
            PcccFileType::Timer | PcccFileType::Counter | PcccFileType::Control => 6,
            PcccFileType::Float | PcccFileType::Long => 4,
            PcccFileType::String => 84,
            PcccFileType::Message => 50,
            PcccFileType::Pid => 46,
            PcccFileType::Pls => 12,
            _ => 2,
        }
    }

    fn default_file(self) -> Option<u16> {
        match self {
            PcccFileType::Output => Some(0),
            PcccFileType::Input => Some(1),
            PcccFileType::Status => Some(2),
            _ => None,
        }
    }

    fn sub_element(self, mnemonic: &str) -> Option<u16> {
        let mnemonic = mnemonic.to_ascii_uppercase();
        match (self, mnemonic.as_str()) {
            (PcccFileType::Timer | PcccFileType::Counter, "PRE") => Some(1),
            (PcccFileType::Timer | PcccFileType::Counter, "ACC") => Some(2),
            (PcccFileType::Control, "LEN") => Some(1),
            (PcccFileType::Control, "POS") => Some(2),
            _ => None,
        }
    }
}

/// A parsed data-table address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PcccAddress {
    /// File number.
    pub file_block: u16,
    /// File type code.
    pub data_code: u8,
    /// Element (word offset within the file).
    pub element_start: u32,
    /// Sub-element (`.PRE`, `.ACC`, ...); 0 for whole elements.
    pub sub_element: u16,
    /// Bit within the element, for bit access.
    pub bit: Option<u8>,
}

impl PcccAddress {
    /// Parses `<File><Number>:<Element>[.<Sub>][/<Bit>]` or `B<Number>/<BitNumber>`.
    ///
    /// `O`, `I` and `S` may omit the file number (`O:0`, `S:1/5`). In the
    /// bit-number form `B3/35` the element and bit are derived from the bit
    /// number (element 2, bit 3).
    ///
    /// # Errors
    ///
    /// Returns `AddressParse` for unknown file letters, non-numeric fields,
    /// bits above 15 or elements above 0xFFFF.
    ///
    /// # Example
    ///
    /// ```
    /// use ab_eip::pccc::PcccAddress;
    ///
    /// let address = PcccAddress::parse("B3/35").unwrap();
    /// assert_eq!((address.file_block, address.element_start, address.bit), (3, 2, Some(3)));
    /// ```
    pub fn parse(address: &str) -> Result<Self> {
        let text = address.trim();
        let letters = text
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(text.len());
        let (prefix, rest) = text.split_at(letters);
        let file_type = PcccFileType::from_prefix(prefix)
            .ok_or_else(|| {
                EipError::address_parse(address, format!("unknown file type '{prefix}'"))
            })?;

        let number_end = rest.find([':', '/']).unwrap_or(rest.len());
        let (number, rest) = rest.split_at(number_end);
        let file_block = if number.is_empty() {
            file_type
                .default_file()
                .ok_or_else(|| EipError::address_parse(address, "missing file number"))?
        } else {
            parse_field(address, "file number", number, u16::MAX as u32)? as u16
        };

        if let Some(bit_number) = rest.strip_prefix('/') {
            if file_type != PcccFileType::Bit {
                return Err(EipError::address_parse(
                    address,
                    "bit-number form is only valid for B files",
                ));
            }
            let bit_number = parse_field(address, "bit number", bit_number, 16 * 0xFFFF + 15)?;
            return Ok(Self {
                file_block,
                data_code: file_type.code(),
                element_start: bit_number / 16,
                sub_element: 0,
                bit: Some((bit_number % 16) as u8),
            });
        }

        let rest = rest
            .strip_prefix(':')
            .ok_or_else(|| EipError::address_parse(address, "missing ':' before the element"))?;
        let (rest, bit) = match rest.split_once('/') {
            Some((element, bit)) => (element, Some(parse_field(address, "bit", bit, 15)? as u8)),
            None => (rest, None),
        };
        let (element, sub_element) = match rest.split_once('.') {
            Some((element, mnemonic)) => {
                let sub = file_type.sub_element(mnemonic).ok_or_else(|| {
                    EipError::address_parse(address, format!("unknown sub-element '{mnemonic}'"))
                })?;
                (element, sub)
            }
            None => (rest, 0),
        };

        Ok(Self {
            file_block,
            data_code: file_type.code(),
            element_start: parse_field(address, "element", element, 0xFFFF)?,
            sub_element,
            bit,
        })
    }

    /// Returns the file type named by `data_code`.
    pub fn file_type(&self) -> Option<PcccFileType> {
        PcccFileType::from_code(self.data_code)
    }

    /// Returns the size of one element, 2 for unknown codes.
    pub fn element_size(&self) -> usize {
        self.file_type().map_or(2, PcccFileType::element_size)
    }

    /// Splits a transfer of `byte_len` bytes into commands of whole elements,
    /// each at most [`MAX_DATA_BYTES`].
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if `byte_len` is 0, or if a sub-element
    /// address would need more than one command.
    ///
    /// # Example
    ///
    /// ```
    /// use ab_eip::pccc::PcccAddress;
    ///
    /// let plan = PcccAddress::parse("N7:0").unwrap().transfer_plan(300).unwrap();
    /// let sizes: Vec<usize> = plan.fragments().map(|f| f.size).collect();
    /// assert_eq!(sizes, vec![236, 64]);
    /// ```
    pub fn transfer_plan(&self, byte_len: usize) -> Result<FragmentPlan> {
        let size = self.element_size();
        let max = (MAX_DATA_BYTES / size).max(1) * size;
        let plan = FragmentPlan::new(byte_len, max.min(MAX_DATA_BYTES))?;
        if plan.len() > 1 && self.sub_element != 0 {
            return Err(EipError::invalid_parameter(
                "byte_len",
                format!("{self} is a sub-element; at most {MAX_DATA_BYTES} bytes per transfer"),
            ));
        }
        Ok(plan)
    }

    /// Returns the address of the element `offset` bytes into a transfer.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if the element would exceed 0xFFFF.
    pub fn at_offset(&self, offset: usize) -> Result<Self> {
        let element = self.element_start as usize + offset / self.element_size();
        if element > 0xFFFF {
            return Err(EipError::invalid_parameter(
                "byte_len",
                format!("transfer from {self} runs past element 65535"),
            ));
        }
        Ok(Self {
            element_start: element as u32,
            ..*self
        })
    }
}

impl fmt::Display for PcccAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = self.file_type().map_or("?", PcccFileType::prefix);
        write!(f, "{}{}:{}", prefix, self.file_block, self.element_start)?;
        if self.sub_element != 0 {
            write!(f, ".{}", self.sub_element)?;
        }
        if let Some(bit) = self.bit {
            write!(f, "/{bit}")?;
        }
        Ok(())
    }
}

fn parse_field(address: &str, field: &str, text: &str, max: u32) -> Result<u32> {
    let value = parse_number(text.trim())
        .ok_or_else(|| {
            EipError::address_parse(address, format!("{field} '{text}' is not a number"))
        })?;
    if value > max {
        return Err(EipError::address_parse(
            address,
            format!("{field} {value} exceeds {max}"),
        ));
    }
    Ok(value)
}

/// Appends a var-len address field.
pub fn push_varlen(buf: &mut Vec<u8>, value: u16) {
    if value < 0xFF {
        buf.push(value as u8);
    } else {
        buf.push(0xFF);
        buf.extend_from_slice(&value.to_le_bytes());
    }
}

fn command_header(tns: u16, function: u8, byte_len: u8, address: &PcccAddress) -> Vec<u8> {
    let mut body = Vec::with_capacity(16);
    body.push(CMD_TYPED);
    body.push(0x00);
    body.extend_from_slice(&tns.to_le_bytes());
    body.push(function);
    body.push(byte_len);
    push_varlen(&mut body, address.file_block);
    body.push(address.data_code);
    // element_start is bounded to 0xFFFF by the parser
    push_varlen(&mut body, address.element_start.min(0xFFFF) as u16);
    push_varlen(&mut body, address.sub_element);
    body
}

fn check_size(size: usize) -> Result<u8> {
    if size == 0 || size > MAX_DATA_BYTES {
        return Err(EipError::invalid_parameter(
            "byte_len",
            format!("must be between 1 and {MAX_DATA_BYTES}, got {size}"),
        ));
    }
    Ok(size as u8)
}

/// Builds a typed-logical read of `byte_len` bytes.
///
/// # Errors
///
/// Returns `InvalidParameter` if `byte_len` is 0 or above [`MAX_DATA_BYTES`].
pub fn read_command(tns: u16, address: &PcccAddress, byte_len: usize) -> Result<Vec<u8>> {
    let byte_len = check_size(byte_len)?;
    Ok(command_header(tns, FNC_READ, byte_len, address))
}

/// Builds a typed-logical write of `data`.
///
/// # Errors
///
/// Returns `InvalidParameter` if `data` is empty or above [`MAX_DATA_BYTES`].
pub fn write_command(tns: u16, address: &PcccAddress, data: &[u8]) -> Result<Vec<u8>> {
    let byte_len = check_size(data.len())?;
    let mut body = command_header(tns, FNC_WRITE, byte_len, address);
    body.extend_from_slice(data);
    Ok(body)
}

/// Builds a masked write of one word: bits set in `mask` take their value
/// from `value`.
pub fn mask_write_command(tns: u16, address: &PcccAddress, mask: u16, value: u16) -> Vec<u8> {
    let mut body = command_header(tns, FNC_MASK_WRITE, 2, address);
    body.extend_from_slice(&mask.to_le_bytes());
    body.extend_from_slice(&value.to_le_bytes());
    body
}

/// Builds a masked write that sets or clears the address's bit.
///
/// # Errors
///
/// Returns `AddressParse` if the address has no bit.
pub fn bit_write_command(tns: u16, address: &PcccAddress, state: bool) -> Result<Vec<u8>> {
    let bit = address.bit.ok_or_else(|| {
        EipError::address_parse(address.to_string(), "bit write needs a '/bit' address")
    })?;
    let mask = 1u16 << bit;
    Ok(mask_write_command(tns, address, mask, if state { mask } else { 0 }))
}

/// Parses a PCCC reply and returns its data.
///
/// Reply layout: `CMD|0x40, STS, TNS(2), [EXT STS], data`.
///
/// # Errors
///
/// Returns `MalformedResponse` for short frames or a non-reply command,
/// `TnsMismatch` for a stale reply and `PcccStatus` for a failing STS.
pub fn parse_reply(reply: &[u8], expected_tns: u16) -> Result<Vec<u8>> {
    if reply.len() < 4 {
        return Err(EipError::malformed_response(format!(
            "PCCC reply too short: expected at least 4 bytes, got {}",
            reply.len()
        ))
        .with_raw(reply));
    }
    if reply[0] & REPLY_FLAG == 0 {
        return Err(EipError::malformed_response(format!(
            "PCCC command 0x{:02X} is not a reply",
            reply[0]
        ))
        .with_raw(reply));
    }

    let tns = u16::from_le_bytes([reply[2], reply[3]]);
    if tns != expected_tns {
        return Err(EipError::TnsMismatch {
            expected: expected_tns,
            received: tns,
        });
    }

    let sts = reply[1];
    if sts == 0 {
        return Ok(reply[4..].to_vec());
    }
    let ext_sts = if sts == STS_EXTENDED {
        let ext = reply.get(4).copied().ok_or_else(|| {
            EipError::malformed_response("PCCC reply announces EXT STS but has none")
                .with_raw(reply)
        })?;
        Some(ext)
    } else {
        None
    };
    Err(EipError::pccc_status(PcccStatus::new(sts, ext_sts)).with_raw(reply))
}

/// Wraps a PCCC command in a CIP Execute PCCC request.
///
/// Request: `0x4B, 2, 0x20 0x67 0x24 0x01, requestor id (7, vendor, serial), pccc`.
pub fn wrap_execute_pccc(vendor_id: u16, serial_number: u32, pccc: &[u8]) -> Vec<u8> {
    let mut request = Vec::with_capacity(13 + pccc.len());
    request.push(SERVICE_EXECUTE_PCCC);
    request.push(0x02);
    request.extend_from_slice(&[0x20, CLASS_PCCC, 0x24, 0x01]);
    request.push(REQUESTOR_ID_LEN);
    request.extend_from_slice(&vendor_id.to_le_bytes());
    request.extend_from_slice(&serial_number.to_le_bytes());
    request.extend_from_slice(pccc);
    request
}

/// Strips the requestor id from the payload of an Execute PCCC reply.
///
/// # Errors
///
/// Returns `MalformedResponse` if the requestor id is truncated.
pub fn unwrap_execute_pccc(payload: &[u8]) -> Result<&[u8]> {
    let len = payload.first().copied().unwrap_or(0) as usize;
    if len == 0 || payload.len() < len {
        return Err(EipError::malformed_response(format!(
            "Execute PCCC reply: requestor id of {} bytes in {} byte payload",
            len,
            payload.len()
        ))
        .with_raw(payload));
    }
    Ok(&payload[len..])
}

/// STS / EXT STS pair of a failing PCCC reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PcccStatus {
    sts: u8,
    ext_sts: Option<u8>,
}

impl PcccStatus {
    /// Creates a status; `ext_sts` is only kept when `sts` is 0xF0.
    pub fn new(sts: u8, ext_sts: Option<u8>) -> Self {
        Self {
            sts,
            ext_sts: if sts == STS_EXTENDED { ext_sts } else { None },
        }
    }

    /// Returns the STS byte.
    pub fn sts(&self) -> u8 {
        self.sts
    }

    /// Returns the EXT STS byte.
    pub fn ext_sts(&self) -> Option<u8> {
        self.ext_sts
    }

    /// Returns whether STS is zero.
    pub fn is_success(&self) -> bool {
        self.sts == 0
    }

    /// Returns whether the error was raised by the local link layer.
    pub fn is_local(&self) -> bool {
        self.sts & 0x0F != 0
    }

    /// Returns the most specific description.
    pub fn description(&self) -> &'static str {
        if self.is_local() {
            return local_sts_description(self.sts).unwrap_or(UNKNOWN_STATUS);
        }
        if self.sts == STS_EXTENDED {
            return self
                .ext_sts
                .and_then(ext_sts_description)
                .unwrap_or(UNKNOWN_STATUS);
        }
        remote_sts_description(self.sts).unwrap_or(UNKNOWN_STATUS)
    }
}

impl fmt::Display for PcccStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ext_sts {
            Some(ext) => write!(
                f,
                "STS 0x{:02X} EXT STS 0x{:02X}: {}",
                self.sts,
                ext,
                self.description()
            ),
            None => write!(f, "STS 0x{:02X}: {}", self.sts, self.description()),
        }
    }
}

const UNKNOWN_STATUS: &str = "Unknown PCCC status";

/// Local (link layer) errors, low nibble of STS.
pub fn local_sts_description(sts: u8) -> Option<&'static str> {
    let text = match sts & 0x0F {
        0x00 => "Success",
        0x01 => "Destination node is out of buffer space",
        0x02 => "Cannot guarantee delivery: remote node did not acknowledge",
        0x03 => "Duplicate token holder detected",
        0x04 => "Local port is disconnected",
        0x05 => "Application layer timed out waiting for a response",
        0x06 => "Duplicate node detected",
        0x07 => "Station is offline",
        0x08 => "Hardware fault",
        _ => return None,
    };
    Some(text)
}

/// Remote (application) errors, high nibble of STS.
pub fn remote_sts_description(sts: u8) -> Option<&'static str> {
    let text = match sts & 0xF0 {
        0x00 => "Success",
        0x10 => "Illegal command or format",
        0x20 => "Host has a problem and will not communicate",
        0x30 => "Remote node host is missing, disconnected or shut down",
        0x40 => "Host could not complete function due to hardware fault",
        0x50 => "Addressing problem or memory protect rungs",
        0x60 => "Function not allowed due to command protection selection",
        0x70 => "Processor is in Program mode",
        0x80 => "Compatibility mode file missing or communication zone problem",
        0x90 => "Remote node cannot buffer command",
        0xA0 => "Wait ACK: 1775-KA buffer full",
        0xB0 => "Remote node problem due to download",
        0xC0 => "Wait ACK: remote buffer full",
        0xD0 => "Unused remote status 0xD0",
        0xE0 => "Unused remote status 0xE0",
        0xF0 => "Error code in the EXT STS byte",
        _ => return None,
    };
    Some(text)
}

/// Extended status carried after STS 0xF0.
pub fn ext_sts_description(ext_sts: u8) -> Option<&'static str> {
    let text = match ext_sts {
        0x01 => "A field has an illegal value",
        0x02 => "Fewer levels specified in address than minimum for any address",
        0x03 => "More levels specified in address than system supports",
        0x04 => "Symbol not found",
        0x05 => "Symbol is of improper format",
        0x06 => "Address does not point to something usable",
        0x07 => "File is wrong size",
        0x08 => "Situation has changed since the start of the command",
        0x09 => "Data or file is too large",
        0x0A => "Transaction size plus word address is too large",
        0x0B => "Access denied, improper privilege",
        0x0C => "Condition cannot be generated, resource is not available",
        0x0D => "Condition already exists, resource is already available",
        0x0E => "Command cannot be executed",
        0x0F => "Histogram overflow",
        0x10 => "No access",
        0x11 => "Illegal data type",
        0x12 => "Invalid parameter or invalid data",
        0x13 => "Address reference exists to deleted area",
        0x14 => "Command execution failure for unknown reason",
        0x15 => "Data conversion error",
        0x16 => "Scanner not able to communicate with 1771 rack adapter",
        0x17 => "Type mismatch",
        0x18 => "1771 module response was not valid",
        0x19 => "Duplicated label",
        0x1A => "File is open; another node owns it",
        0x1B => "Another node is the program owner",
        0x1C => "Reserved extended status 0x1C",
        0x1D => "Reserved extended status 0x1D",
        0x1E => "Data table element protection violation",
        0x1F => "Temporary internal problem",
        0x22 => "Remote rack fault",
        0x23 => "Timeout",
        0x24 => "Unknown error",
        _ => return None,
    };
    Some(text)
}
