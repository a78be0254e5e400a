//! DF1 serial framing and a PCCC client for serial links.
//!
//! A DF1 message frames the PCCC command with DLE control sequences:
//!
//! ```text
//! [DLE SOH station]  DLE STX  dst src pccc...  DLE ETX  BCC | CRC16
//! ```
//!
//! The `DLE SOH station` header is present on half-duplex links only; a
//! station byte equal to DLE is doubled. Every 0x10 in the application data
//! is sent twice. The trailer is one BCC byte or a CRC16 (LE):
//!
//! - BCC covers the station byte and the application data.
//! - CRC16 covers the same bytes plus the ETX byte.
//!
//! The serial port itself is a collaborator behind [`Transport`]: it must
//! return one complete reply frame per [`Transport::send_receive`] call.

use tracing::{debug, trace};

use crate::address::TagAddress;
use crate::checksum::{bcc, crc16, CheckMode};
use crate::client::SequenceCounter;
use crate::error::{EipError, Result};
use crate::pccc::{self, PcccAddress};
use crate::transport::Transport;
use crate::utils::hex_dump;

/// Data link escape.
pub const DLE: u8 = 0x10;
/// Start of header (half-duplex station).
pub const SOH: u8 = 0x01;
/// Start of text.
pub const STX: u8 = 0x02;
/// End of text.
pub const ETX: u8 = 0x03;
/// Positive acknowledge.
pub const ACK: u8 = 0x06;
/// Negative acknowledge.
pub const NAK: u8 = 0x15;

/// DF1 link settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Df1Config {
    /// Half-duplex station address; `None` on full-duplex links.
    pub station: Option<u8>,
    /// Destination node placed in the application data.
    pub dst: u8,
    /// Source node placed in the application data.
    pub src: u8,
    /// Frame trailer.
    pub check_mode: CheckMode,
}

impl Default for Df1Config {
    fn default() -> Self {
        Self {
            station: None,
            dst: 1,
            src: 0,
            check_mode: CheckMode::Bcc,
        }
    }
}

impl Df1Config {
    /// Creates a full-duplex configuration with BCC trailers.
    pub fn new(dst: u8, src: u8) -> Self {
        Self {
            dst,
            src,
            ..Self::default()
        }
    }

    /// Sets the half-duplex station address.
    pub fn with_station(mut self, station: u8) -> Self {
        self.station = Some(station);
        self
    }

    /// Sets the trailer type.
    pub fn with_check_mode(mut self, check_mode: CheckMode) -> Self {
        self.check_mode = check_mode;
        self
    }
}

fn push_stuffed(frame: &mut Vec<u8>, byte: u8) {
    frame.push(byte);
    if byte == DLE {
        frame.push(DLE);
    }
}

fn trailer(covered: &[u8], mode: CheckMode) -> Vec<u8> {
    match mode {
        CheckMode::Bcc => vec![bcc(covered)],
        CheckMode::Crc16 => {
            let mut data = covered.to_vec();
            data.push(ETX);
            crc16(&data).to_le_bytes().to_vec()
        }
    }
}

/// Frames application data for the wire.
///
/// # Example
///
/// ```
/// use ab_eip::checksum::CheckMode;
/// use ab_eip::df1::encode_frame;
///
/// let frame = encode_frame(None, &[0x01, 0x10, 0x02], CheckMode::Bcc);
/// assert_eq!(frame, vec![0x10, 0x02, 0x01, 0x10, 0x10, 0x02, 0x10, 0x03, 0xED]);
/// ```
pub fn encode_frame(station: Option<u8>, data: &[u8], mode: CheckMode) -> Vec<u8> {
    let mut frame = Vec::with_capacity(data.len() * 2 + 8);
    let mut covered = Vec::with_capacity(data.len() + 1);

    if let Some(station) = station {
        frame.extend_from_slice(&[DLE, SOH]);
        push_stuffed(&mut frame, station);
        covered.push(station);
    }
    frame.extend_from_slice(&[DLE, STX]);
    for &byte in data {
        push_stuffed(&mut frame, byte);
    }
    covered.extend_from_slice(data);
    frame.extend_from_slice(&[DLE, ETX]);
    frame.extend_from_slice(&trailer(&covered, mode));
    frame
}

/// Extracts the application data from a received frame.
///
/// Leading `DLE ACK` sequences are skipped and an optional `DLE SOH station`
/// header is accepted.
///
/// # Errors
///
/// Returns `MalformedResponse` for a NAK, a missing STX/ETX or a truncated
/// trailer, and `ChecksumMismatch` when the trailer does not verify.
pub fn decode_frame(frame: &[u8], mode: CheckMode) -> Result<Vec<u8>> {
    let malformed =
        |reason: &str| EipError::malformed_response(format!("DF1: {reason}")).with_raw(frame);

    let mut pos = 0usize;
    while frame.get(pos..pos + 2) == Some(&[DLE, ACK][..]) {
        pos += 2;
    }
    if frame.get(pos..pos + 2) == Some(&[DLE, NAK][..]) {
        return Err(malformed("frame rejected with NAK"));
    }

    let mut covered = Vec::with_capacity(frame.len());
    if frame.get(pos..pos + 2) == Some(&[DLE, SOH][..]) {
        pos += 2;
        let station = *frame.get(pos).ok_or_else(|| malformed("missing station"))?;
        pos += if station == DLE { 2 } else { 1 };
        covered.push(station);
    }
    if frame.get(pos..pos + 2) != Some(&[DLE, STX][..]) {
        return Err(malformed("missing DLE STX"));
    }
    pos += 2;

    let data_start = covered.len();
    loop {
        let byte = *frame.get(pos).ok_or_else(|| malformed("missing DLE ETX"))?;
        pos += 1;
        if byte != DLE {
            covered.push(byte);
            continue;
        }
        match frame.get(pos) {
            Some(&DLE) => {
                covered.push(DLE);
                pos += 1;
            }
            Some(&ETX) => {
                pos += 1;
                break;
            }
            Some(other) => {
                return Err(malformed(&format!("unexpected control DLE 0x{other:02X}")));
            }
            None => return Err(malformed("frame ends after DLE")),
        }
    }

    let received = frame
        .get(pos..pos + mode.trailer_len())
        .ok_or_else(|| malformed("checksum truncated"))?;
    let (expected, received) = match mode {
        CheckMode::Bcc => (bcc(&covered) as u16, received[0] as u16),
        CheckMode::Crc16 => {
            let mut data = covered.clone();
            data.push(ETX);
            (crc16(&data), u16::from_le_bytes([received[0], received[1]]))
        }
    };
    if expected != received {
        return Err(EipError::ChecksumMismatch { expected, received });
    }

    Ok(covered.split_off(data_start))
}

/// PCCC client over a DF1 serial link.
///
/// Each call sends one frame and waits for one reply; the TNS of the reply
/// must match the request.
pub struct Df1Client<T: Transport> {
    transport: T,
    config: Df1Config,
    tns: SequenceCounter,
}

impl<T: Transport> Df1Client<T> {
    /// Creates a client on an open serial transport.
    pub fn new(transport: T, config: Df1Config) -> Self {
        Self {
            transport,
            config,
            tns: SequenceCounter::new(1),
        }
    }

    /// Returns the link settings.
    pub fn config(&self) -> &Df1Config {
        &self.config
    }

    /// Returns the transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Consumes the client and returns the transport.
    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Reads `byte_len` bytes starting at a data-table address.
    ///
    /// The address may carry `s=`, `dst=` and `src=` modifiers, e.g.
    /// `dst=2;N7:0`. Reads above 236 bytes advance the element number
    /// over several commands.
    pub fn read(&mut self, address: &str, byte_len: usize) -> Result<Vec<u8>> {
        let (parsed, target) = parse_address(address)?;
        let plan = target.transfer_plan(byte_len)?;
        let mut data = Vec::with_capacity(byte_len);
        for fragment in plan.fragments() {
            let chunk = target
                .at_offset(fragment.offset)
                .and_then(|start| {
                    self.exchange(&parsed, &start, |tns, start| {
                        pccc::read_command(tns, start, fragment.size)
                    })
                })
                .map_err(|e| plan.fragment_error(fragment, e))?;
            plan.check(fragment, chunk.len(), !fragment.last)?;
            data.extend_from_slice(&chunk);
        }
        Ok(data)
    }

    /// Reads `count` 16-bit words.
    pub fn read_words(&mut self, address: &str, count: usize) -> Result<Vec<u16>> {
        let data = self.read(address, count * 2)?;
        Ok(data
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect())
    }

    /// Writes raw bytes starting at a data-table address.
    ///
    /// Transfers above 236 bytes are sent as several commands; the first
    /// failing command aborts the rest.
    pub fn write(&mut self, address: &str, data: &[u8]) -> Result<()> {
        let (parsed, target) = parse_address(address)?;
        let plan = target.transfer_plan(data.len())?;
        for fragment in plan.fragments() {
            let window = &data[fragment.offset..fragment.offset + fragment.size];
            target
                .at_offset(fragment.offset)
                .and_then(|start| {
                    self.exchange(&parsed, &start, |tns, start| {
                        pccc::write_command(tns, start, window)
                    })
                })
                .map_err(|e| plan.fragment_error(fragment, e))?;
        }
        Ok(())
    }

    /// Writes 16-bit words.
    pub fn write_words(&mut self, address: &str, words: &[u16]) -> Result<()> {
        let data: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
        self.write(address, &data)
    }

    /// Sets or clears one bit with a masked write (`B3:0/4`, `B3/20`).
    pub fn write_bit(&mut self, address: &str, state: bool) -> Result<()> {
        let (parsed, target) = parse_address(address)?;
        self.exchange(&parsed, &target, |tns, target| {
            pccc::bit_write_command(tns, target, state)
        })
        .map(|_| ())
    }

    fn exchange<F>(
        &mut self,
        parsed: &TagAddress,
        pccc_address: &PcccAddress,
        build: F,
    ) -> Result<Vec<u8>>
    where
        F: FnOnce(u16, &PcccAddress) -> Result<Vec<u8>>,
    {
        let station = parsed.station().or(self.config.station);
        let dst = parsed.dst().unwrap_or(self.config.dst);
        let src = parsed.src().unwrap_or(self.config.src);

        let tns = self.tns.advance();
        let command = build(tns, pccc_address)?;

        let mut data = Vec::with_capacity(command.len() + 2);
        data.push(dst);
        data.push(src);
        data.extend_from_slice(&command);
        let frame = encode_frame(station, &data, self.config.check_mode);

        debug!(address = %pccc_address, tns, dst, src, "df1 request");
        trace!(frame = %hex_dump(&frame), "df1 tx");
        let reply = self.transport.send_receive(&frame)?;
        trace!(frame = %hex_dump(&reply), "df1 rx");

        let data = decode_frame(&reply, self.config.check_mode)?;
        if data.len() < 2 {
            return Err(
                EipError::malformed_response("DF1 reply has no application data").with_raw(&reply)
            );
        }
        pccc::parse_reply(&data[2..], tns).map_err(|e| e.with_raw(&reply))
    }
}

fn parse_address(address: &str) -> Result<(TagAddress, PcccAddress)> {
    let parsed = TagAddress::parse(address)?;
    let target = PcccAddress::parse(parsed.body())?;
    Ok((parsed, target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct Scripted {
        sent: Vec<Vec<u8>>,
        replies: VecDeque<Vec<u8>>,
    }

    impl Transport for Scripted {
        fn send_receive(&mut self, request: &[u8]) -> Result<Vec<u8>> {
            self.sent.push(request.to_vec());
            self.replies.pop_front().ok_or(EipError::Timeout)
        }

        fn send(&mut self, request: &[u8]) -> Result<()> {
            self.sent.push(request.to_vec());
            Ok(())
        }
    }

    fn reply_frame(data: &[u8], mode: CheckMode) -> Vec<u8> {
        let mut frame = vec![DLE, ACK];
        frame.extend(encode_frame(None, data, mode));
        frame
    }

    #[test]
    fn test_encode_frame_stuffs_station_and_data() {
        let frame = encode_frame(Some(0x10), &[0x10], CheckMode::Bcc);
        assert_eq!(
            frame,
            vec![DLE, SOH, 0x10, 0x10, DLE, STX, 0x10, 0x10, DLE, ETX, 0xE0]
        );
    }

    #[test]
    fn test_decode_frame_roundtrip_both_modes() {
        let data = hex::decode("0700 0f00 1010 a202 0789 0100".replace(' ', "")).unwrap();
        for mode in [CheckMode::Bcc, CheckMode::Crc16] {
            for station in [None, Some(3), Some(DLE)] {
                let frame = encode_frame(station, &data, mode);
                assert_eq!(decode_frame(&frame, mode).unwrap(), data);
            }
        }
    }

    #[test]
    fn test_decode_frame_checksum_mismatch() {
        let mut frame = encode_frame(None, &[1, 2, 3], CheckMode::Crc16);
        let last = frame.len() - 1;
        frame[last] ^= 0xFF;
        assert!(matches!(
            decode_frame(&frame, CheckMode::Crc16),
            Err(EipError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_decode_frame_errors() {
        assert!(decode_frame(&[DLE, NAK], CheckMode::Bcc).is_err());
        assert!(decode_frame(&[DLE, STX, 1, 2], CheckMode::Bcc).is_err());
        assert!(decode_frame(&[DLE, STX, 1, DLE, ETX], CheckMode::Bcc).is_err());
        assert!(decode_frame(&[DLE, STX, 1, DLE, 0x07, DLE, ETX, 0], CheckMode::Bcc).is_err());
        assert!(decode_frame(&[0x55], CheckMode::Bcc).is_err());
    }

    #[test]
    fn test_client_read_words() {
        let reply = reply_frame(
            &[0x00, 0x01, 0x4F, 0x00, 0x01, 0x00, 0x2A, 0x00, 0x10, 0x00],
            CheckMode::Bcc,
        );
        let transport = Scripted {
            sent: Vec::new(),
            replies: VecDeque::from([reply]),
        };
        let mut client = Df1Client::new(transport, Df1Config::new(1, 0));

        assert_eq!(client.read_words("N7:0", 2).unwrap(), vec![42, 16]);

        let sent = &client.transport_mut().sent[0];
        let data = decode_frame(sent, CheckMode::Bcc).unwrap();
        assert_eq!(
            data,
            vec![0x01, 0x00, 0x0F, 0x00, 0x01, 0x00, 0xA2, 0x04, 0x07, 0x89, 0x00, 0x00]
        );
    }

    #[test]
    fn test_client_modifiers_override_config() {
        let reply = reply_frame(&[0x00, 0x05, 0x4F, 0x00, 0x01, 0x00], CheckMode::Crc16);
        let transport = Scripted {
            sent: Vec::new(),
            replies: VecDeque::from([reply]),
        };
        let config = Df1Config::new(1, 0).with_check_mode(CheckMode::Crc16);
        let mut client = Df1Client::new(transport, config);

        client.write_bit("s=4;dst=5;src=0;B3/17", true).unwrap();

        let sent = client.into_inner().sent.remove(0);
        assert_eq!(&sent[..3], &[DLE, SOH, 0x04]);
        let data = decode_frame(&sent, CheckMode::Crc16).unwrap();
        assert_eq!(data[0], 5);
        assert_eq!(
            &data[6..],
            &[0xAB, 0x02, 0x03, 0x85, 0x01, 0x00, 0x02, 0x00, 0x02, 0x00]
        );
    }

    #[test]
    fn test_client_write_splits_at_236_bytes() {
        let transport = Scripted {
            sent: Vec::new(),
            replies: VecDeque::from([
                reply_frame(&[0x00, 0x01, 0x4F, 0x00, 0x01, 0x00], CheckMode::Bcc),
                reply_frame(&[0x00, 0x01, 0x4F, 0x00, 0x02, 0x00], CheckMode::Bcc),
            ]),
        };
        let mut client = Df1Client::new(transport, Df1Config::new(1, 0));
        let values: Vec<u8> = (0..300).map(|i| i as u8).collect();

        client.write("N7:0", &values).unwrap();

        let sent = client.into_inner().sent;
        assert_eq!(sent.len(), 2);
        let first = decode_frame(&sent[0], CheckMode::Bcc).unwrap();
        assert_eq!(&first[6..12], &[0xAA, 0xEC, 0x07, 0x89, 0x00, 0x00]);
        assert_eq!(&first[12..], &values[..236]);
        let second = decode_frame(&sent[1], CheckMode::Bcc).unwrap();
        assert_eq!(&second[4..6], &[0x02, 0x00]);
        assert_eq!(&second[6..12], &[0xAA, 0x40, 0x07, 0x89, 0x76, 0x00]);
        assert_eq!(&second[12..], &values[236..]);
    }

    #[test]
    fn test_client_read_chunk_failure_aborts() {
        let mut first = vec![0x00, 0x01, 0x4F, 0x00, 0x01, 0x00];
        first.extend(vec![0u8; 236]);
        let transport = Scripted {
            sent: Vec::new(),
            replies: VecDeque::from([
                reply_frame(&first, CheckMode::Bcc),
                reply_frame(&[0x00, 0x01, 0x4F, 0x10, 0x02, 0x00], CheckMode::Bcc),
            ]),
        };
        let mut client = Df1Client::new(transport, Df1Config::new(1, 0));

        match client.read("N7:0", 300) {
            Err(EipError::FragmentFailed {
                offset,
                total,
                source,
            }) => {
                assert_eq!((offset, total), (236, Some(300)));
                assert!(matches!(*source, EipError::PcccStatus { .. }));
            }
            other => panic!("expected FragmentFailed, got {other:?}"),
        }
    }

    #[test]
    fn test_client_tns_mismatch() {
        let reply = reply_frame(&[0x00, 0x01, 0x4F, 0x00, 0x09, 0x00], CheckMode::Bcc);
        let transport = Scripted {
            sent: Vec::new(),
            replies: VecDeque::from([reply]),
        };
        let mut client = Df1Client::new(transport, Df1Config::default());
        assert!(matches!(
            client.write_words("N7:0", &[1]),
            Err(EipError::TnsMismatch { expected: 1, received: 9 })
        ));
    }
}
