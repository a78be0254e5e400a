//! Codec strategy injected into [`Client`](crate::Client).
//!
//! The client never encodes or decodes bytes itself; it calls the four codec
//! traits held by a [`ProtocolStrategy`]. Every trait method has a default
//! body implementing the Logix / SLC wire format, so an alternative strategy
//! overrides only the hooks that differ:
//!
//! ```
//! use ab_eip::strategy::{PathCodec, ProtocolStrategy};
//! use ab_eip::{Result, TagPath};
//!
//! /// Sends tag names upper-cased.
//! struct UpperCasePaths;
//!
//! impl PathCodec for UpperCasePaths {
//!     fn encode(&self, path: &TagPath) -> Result<Vec<u8>> {
//!         let upper = path.to_string().to_ascii_uppercase();
//!         ab_eip::encode_path(&ab_eip::TagAddress::parse(&upper)?.tag_path()?)
//!     }
//! }
//!
//! let strategy = ProtocolStrategy::default().with_path_codec(UpperCasePaths);
//! let bytes = strategy.path.encode(&TagPath::new().symbol("abc")).unwrap();
//! assert_eq!(&bytes[2..5], b"ABC");
//! ```

use std::fmt;

use crate::data_type::TagType;
use crate::error::Result;
use crate::metadata::{self, AbStructHandle, StructTemplate, SymbolPage};
use crate::path::{self, TagPath};
use crate::pccc::{self, PcccAddress};
use crate::response::{self, StatusResult};
use crate::service::{
    MultipleServiceRequest, ReadFragmentRequest, ReadModifyWriteRequest, ReadTagRequest,
    WriteFragmentRequest, WriteTagRequest,
};

/// Request path encoding.
pub trait PathCodec: Send + Sync {
    /// Encodes a tag path.
    fn encode(&self, path: &TagPath) -> Result<Vec<u8>> {
        path::encode_path(path)
    }

    /// Decodes an encoded path.
    fn decode(&self, bytes: &[u8]) -> Result<TagPath> {
        path::decode_path(bytes)
    }
}

/// CIP tag service requests and reply decoding.
pub trait ServiceCodec: Send + Sync {
    /// Read Tag.
    fn read_tag(&self, path: &[u8], elements: u16) -> Result<Vec<u8>> {
        Ok(ReadTagRequest::new(path, elements)?.to_bytes())
    }

    /// Read Tag Fragmented.
    fn read_fragment(&self, path: &[u8], elements: u16, offset: u32) -> Result<Vec<u8>> {
        Ok(ReadFragmentRequest::new(path, elements, offset)?.to_bytes())
    }

    /// Write Tag.
    fn write_tag(
        &self,
        path: &[u8],
        tag_type: TagType,
        elements: u16,
        data: &[u8],
    ) -> Result<Vec<u8>> {
        Ok(WriteTagRequest::new(path, tag_type, elements, data)?.to_bytes())
    }

    /// Write Tag Fragmented.
    fn write_fragment(
        &self,
        path: &[u8],
        tag_type: TagType,
        elements: u16,
        offset: u32,
        data: &[u8],
    ) -> Result<Vec<u8>> {
        Ok(WriteFragmentRequest::new(path, tag_type, elements, offset, data)?.to_bytes())
    }

    /// Read-Modify-Write.
    fn read_modify_write(&self, path: &[u8], or_mask: u32, and_mask: u32) -> Result<Vec<u8>> {
        Ok(ReadModifyWriteRequest::new(path, or_mask, and_mask)?.to_bytes())
    }

    /// Multiple Service Packet.
    fn multiple(&self, requests: Vec<Vec<u8>>) -> Result<Vec<u8>> {
        Ok(MultipleServiceRequest::new(requests)?.to_bytes())
    }

    /// Decodes one reply.
    fn decode_single(&self, cip: &[u8], service: u8) -> Result<StatusResult> {
        response::decode_single(cip, service)
    }

    /// Decodes a Multiple Service Packet reply whose requests all use
    /// `service`.
    fn decode_multiple(&self, cip: &[u8], service: u8) -> Result<Vec<StatusResult>> {
        response::decode_multiple(cip, service)
    }
}

/// PCCC command encoding.
pub trait PcccCodec: Send + Sync {
    /// Parses a data-table address.
    fn parse_address(&self, address: &str) -> Result<PcccAddress> {
        PcccAddress::parse(address)
    }

    /// Typed-logical read.
    fn read(&self, tns: u16, address: &PcccAddress, byte_len: usize) -> Result<Vec<u8>> {
        pccc::read_command(tns, address, byte_len)
    }

    /// Typed-logical write.
    fn write(&self, tns: u16, address: &PcccAddress, data: &[u8]) -> Result<Vec<u8>> {
        pccc::write_command(tns, address, data)
    }

    /// Masked single-bit write.
    fn write_bit(&self, tns: u16, address: &PcccAddress, state: bool) -> Result<Vec<u8>> {
        pccc::bit_write_command(tns, address, state)
    }

    /// Parses a reply and checks its TNS.
    fn parse_reply(&self, reply: &[u8], tns: u16) -> Result<Vec<u8>> {
        pccc::parse_reply(reply, tns)
    }
}

/// Tag enumeration and structure template decoding.
pub trait MetadataCodec: Send + Sync {
    /// Enumeration request.
    fn symbol_list_request(&self, scope: &[u8], start_instance: u32) -> Result<Vec<u8>> {
        metadata::symbol_list_request(scope, start_instance)
    }

    /// Enumeration reply.
    fn parse_symbol_list(&self, data: &[u8], program: Option<&str>) -> Result<SymbolPage> {
        metadata::parse_symbol_list(data, program)
    }

    /// Template attributes request.
    fn struct_handle_request(&self, symbol_type: u16) -> Result<Vec<u8>> {
        metadata::struct_handle_request(symbol_type)
    }

    /// Template attributes reply.
    fn parse_struct_handle(&self, data: &[u8]) -> Result<AbStructHandle> {
        metadata::parse_struct_handle(data)
    }

    /// Member list request.
    fn template_request(&self, symbol_type: u16, offset: u32, length: u16) -> Result<Vec<u8>> {
        metadata::template_request(symbol_type, offset, length)
    }

    /// Member list reply.
    fn parse_template(&self, data: &[u8], handle: &AbStructHandle) -> Result<StructTemplate> {
        metadata::parse_template(data, handle)
    }
}

/// Logix path encoding.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogixPathCodec;

impl PathCodec for LogixPathCodec {}

/// Logix tag services.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogixServiceCodec;

impl ServiceCodec for LogixServiceCodec {}

/// SLC / PLC-5 typed-logical PCCC.
#[derive(Debug, Clone, Copy, Default)]
pub struct TypedPcccCodec;

impl PcccCodec for TypedPcccCodec {}

/// Logix symbol and template objects.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogixMetadataCodec;

impl MetadataCodec for LogixMetadataCodec {}

/// The four codecs used by a client.
pub struct ProtocolStrategy {
    /// Path encoding.
    pub path: Box<dyn PathCodec>,
    /// Tag services.
    pub service: Box<dyn ServiceCodec>,
    /// PCCC commands.
    pub pccc: Box<dyn PcccCodec>,
    /// Metadata requests.
    pub metadata: Box<dyn MetadataCodec>,
}

impl Default for ProtocolStrategy {
    fn default() -> Self {
        Self {
            path: Box::new(LogixPathCodec),
            service: Box::new(LogixServiceCodec),
            pccc: Box::new(TypedPcccCodec),
            metadata: Box::new(LogixMetadataCodec),
        }
    }
}

impl ProtocolStrategy {
    /// Replaces the path codec.
    pub fn with_path_codec(mut self, codec: impl PathCodec + 'static) -> Self {
        self.path = Box::new(codec);
        self
    }

    /// Replaces the service codec.
    pub fn with_service_codec(mut self, codec: impl ServiceCodec + 'static) -> Self {
        self.service = Box::new(codec);
        self
    }

    /// Replaces the PCCC codec.
    pub fn with_pccc_codec(mut self, codec: impl PcccCodec + 'static) -> Self {
        self.pccc = Box::new(codec);
        self
    }

    /// Replaces the metadata codec.
    pub fn with_metadata_codec(mut self, codec: impl MetadataCodec + 'static) -> Self {
        self.metadata = Box::new(codec);
        self
    }
}

impl fmt::Debug for ProtocolStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtocolStrategy").finish_non_exhaustive()
    }
}
