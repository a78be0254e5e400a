//! Tag and structure metadata of Logix controllers.
//!
//! Enumeration reads the Symbol object (class 0x6B) with Get Instance
//! Attribute List, one page per request, continuing from the last instance
//! id while the controller answers with "partial transfer".
//!
//! Structure introspection takes two requests against the Template object
//! (class 0x6C):
//!
//! 1. Get Attribute List for attributes 4, 5, 2, 1 yields an
//!    [`AbStructHandle`].
//! 2. Read Tag on the template instance yields 8-byte member records followed
//!    by a NUL-terminated name table.
//!
//! # Symbol type word
//!
//! | Bits | Meaning |
//! |------|---------|
//! | 0x8000 | structure |
//! | 0x6000 | array dimensions |
//! | 0x1000 | system / reserved tag |
//! | 0x0FFF | type code or template instance |

use crate::data_type::CipDataType;
use crate::error::{EipError, Result};
use crate::service::{
    encode_request, SERVICE_GET_ATTRIBUTE_LIST, SERVICE_GET_INSTANCE_ATTRIBUTE_LIST,
    SERVICE_READ_TAG,
};

/// Symbol object class.
pub const CLASS_SYMBOL: u8 = 0x6B;
/// Template object class.
pub const CLASS_TEMPLATE: u8 = 0x6C;

/// Structure flag of the symbol type.
pub const SYMBOL_STRUCT: u16 = 0x8000;
/// Two-dimension flag of the symbol type.
pub const SYMBOL_DIM_2: u16 = 0x4000;
/// One-dimension flag of the symbol type.
pub const SYMBOL_DIM_1: u16 = 0x2000;
/// System (reserved) flag of the symbol type.
pub const SYMBOL_SYSTEM: u16 = 0x1000;
/// Type code / template instance bits of the symbol type.
pub const SYMBOL_TYPE_MASK: u16 = 0x0FFF;

/// Bytes subtracted from the template definition size (`words * 4`) to get
/// the member list length. Empirical Logix value; do not derive.
pub const TEMPLATE_READ_OVERHEAD: u32 = 21;
/// Added to the on-wire member offset. Empirical Logix value; do not derive.
pub const MEMBER_OFFSET_ADJUST: u32 = 2;

/// Size of one member record in a template reply.
pub const MEMBER_RECORD_SIZE: usize = 8;

/// Symbol attributes requested per record: name, type, dimensions.
const SYMBOL_ATTRIBUTES: [u16; 3] = [1, 2, 8];
/// Template attributes: definition size, structure size, member count, handle.
const TEMPLATE_ATTRIBUTES: [u16; 4] = [4, 5, 2, 1];

/// Prefix of controller-internal tag names.
const RESERVED_PREFIX: &str = "__";

/// A controller tag or structure member.
///
/// `is_struct` and `array_dimension` are always derived from the symbol type.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AbTagItem {
    /// Symbol instance id (0 for structure members).
    pub instance_id: u32,
    /// Tag or member name.
    pub name: String,
    symbol_type: u16,
    /// Array lengths per dimension, -1 when unknown.
    pub array_length: [i32; 3],
    /// Offset inside the parent structure, for members only.
    pub byte_offset: Option<u32>,
    /// Members of a structure tag, filled in by
    /// [`Client::enumerate_struct`](crate::Client::enumerate_struct).
    pub members: Vec<AbTagItem>,
}

impl AbTagItem {
    /// Creates an item with unknown array lengths.
    pub fn new(instance_id: u32, name: impl Into<String>, symbol_type: u16) -> Self {
        Self {
            instance_id,
            name: name.into(),
            symbol_type,
            array_length: [-1; 3],
            byte_offset: None,
            members: Vec::new(),
        }
    }

    /// Returns the raw symbol type.
    pub fn symbol_type(&self) -> u16 {
        self.symbol_type
    }

    /// Returns whether the item is a structure.
    pub fn is_struct(&self) -> bool {
        self.symbol_type & SYMBOL_STRUCT != 0
    }

    /// Returns the number of array dimensions encoded in the symbol type.
    pub fn array_dimension(&self) -> u8 {
        if self.symbol_type & SYMBOL_DIM_2 != 0 {
            2
        } else if self.symbol_type & SYMBOL_DIM_1 != 0 {
            1
        } else {
            0
        }
    }

    /// Returns the type code (or template instance for structures).
    pub fn type_code(&self) -> u16 {
        self.symbol_type & SYMBOL_TYPE_MASK
    }

    /// Returns whether the controller marks the tag as system/reserved.
    pub fn is_system(&self) -> bool {
        self.symbol_type & SYMBOL_SYSTEM != 0
    }

    /// Returns the elementary type of a non-structure item.
    pub fn data_type(&self) -> Option<CipDataType> {
        if self.is_struct() {
            None
        } else {
            CipDataType::from_code(self.type_code())
        }
    }
}

/// Template attributes needed to read a structure's member list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AbStructHandle {
    /// Number of attributes returned.
    pub return_count: u16,
    /// Template definition size in 32-bit words.
    pub template_object_definition_size: u32,
    /// Bytes transferred when the structure is read as a tag.
    pub template_structure_size: u32,
    /// Number of members.
    pub member_count: u16,
    /// Structure handle (CRC) used in typed writes.
    pub structure_handle: u16,
}

impl AbStructHandle {
    /// Returns the number of bytes of the member list.
    ///
    /// # Errors
    ///
    /// Returns `MalformedResponse` if the definition size is too small.
    pub fn member_list_len(&self) -> Result<u32> {
        self.template_object_definition_size
            .checked_mul(4)
            .and_then(|bytes| bytes.checked_sub(TEMPLATE_READ_OVERHEAD))
            .ok_or_else(|| {
                EipError::malformed_response(format!(
                    "template definition size {} is too small",
                    self.template_object_definition_size
                ))
            })
    }
}

fn instance_segment(path: &mut Vec<u8>, instance: u32) {
    if instance <= 0xFFFF {
        path.extend_from_slice(&[0x25, 0x00]);
        path.extend_from_slice(&(instance as u16).to_le_bytes());
    } else {
        path.extend_from_slice(&[0x26, 0x00]);
        path.extend_from_slice(&instance.to_le_bytes());
    }
}

fn attribute_list(attributes: &[u16]) -> Vec<u8> {
    let mut data = Vec::with_capacity(2 + attributes.len() * 2);
    data.extend_from_slice(&(attributes.len() as u16).to_le_bytes());
    for attribute in attributes {
        data.extend_from_slice(&attribute.to_le_bytes());
    }
    data
}

/// Builds one enumeration request starting at `start_instance`.
///
/// `scope` is the encoded `Program:Name` symbolic segment for program tags,
/// or empty for controller tags.
pub fn symbol_list_request(scope: &[u8], start_instance: u32) -> Result<Vec<u8>> {
    let mut path = scope.to_vec();
    path.extend_from_slice(&[0x20, CLASS_SYMBOL]);
    instance_segment(&mut path, start_instance);
    encode_request(
        SERVICE_GET_INSTANCE_ATTRIBUTE_LIST,
        &path,
        &attribute_list(&SYMBOL_ATTRIBUTES),
    )
}

/// One page of an enumeration reply.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SymbolPage {
    /// User tags that survived filtering.
    pub items: Vec<AbTagItem>,
    /// Instance id of the last record, filtered or not.
    pub last_instance: Option<u32>,
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn take(&mut self, len: usize, what: &str) -> Result<&'a [u8]> {
        let bytes = self.data.get(self.pos..self.pos + len).ok_or_else(|| {
            EipError::malformed_response(format!(
                "{what} truncated at byte {} of {}",
                self.pos,
                self.data.len()
            ))
            .with_raw(self.data)
        })?;
        self.pos += len;
        Ok(bytes)
    }

    fn u16(&mut self, what: &str) -> Result<u16> {
        let b = self.take(2, what)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self, what: &str) -> Result<u32> {
        let b = self.take(4, what)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
}

/// Returns whether an enumerated tag is a user tag.
pub fn is_user_tag(item: &AbTagItem) -> bool {
    !item.is_system() && !item.name.starts_with(RESERVED_PREFIX) && !item.name.contains(':')
}

/// Parses an enumeration reply.
///
/// Records are `instance (u32), name length (u16), name, symbol type (u16),
/// dimensions (3 x u32)`. System tags, `__` names and module-scoped names
/// containing `:` are dropped; surviving names are prefixed with
/// `Program:<program>.` when `program` is given.
///
/// # Errors
///
/// Returns `MalformedResponse` if a record is truncated.
pub fn parse_symbol_list(data: &[u8], program: Option<&str>) -> Result<SymbolPage> {
    let mut reader = Reader::new(data);
    let mut page = SymbolPage::default();

    while !reader.is_empty() {
        let instance_id = reader.u32("symbol instance")?;
        let name_len = reader.u16("symbol name length")? as usize;
        let name = String::from_utf8_lossy(reader.take(name_len, "symbol name")?).into_owned();
        let symbol_type = reader.u16("symbol type")?;
        let mut array_length = [0i32; 3];
        for length in array_length.iter_mut() {
            *length = reader.u32("symbol dimensions")? as i32;
        }
        page.last_instance = Some(instance_id);

        let mut item = AbTagItem::new(instance_id, name, symbol_type);
        item.array_length = array_length;
        if !is_user_tag(&item) {
            continue;
        }
        if let Some(program) = program {
            item.name = format!("Program:{program}.{}", item.name);
        }
        page.items.push(item);
    }
    Ok(page)
}

fn template_path(instance: u16) -> Vec<u8> {
    let mut path = vec![0x20, CLASS_TEMPLATE];
    instance_segment(&mut path, instance as u32);
    path
}

/// Builds the Get Attribute List request for a structure's template.
///
/// # Errors
///
/// Returns `InvalidParameter` if `symbol_type` is not a structure.
pub fn struct_handle_request(symbol_type: u16) -> Result<Vec<u8>> {
    if symbol_type & SYMBOL_STRUCT == 0 {
        return Err(EipError::invalid_parameter(
            "symbol_type",
            format!("0x{symbol_type:04X} is not a structure"),
        ));
    }
    encode_request(
        SERVICE_GET_ATTRIBUTE_LIST,
        &template_path(symbol_type & SYMBOL_TYPE_MASK),
        &attribute_list(&TEMPLATE_ATTRIBUTES),
    )
}

/// Parses the Get Attribute List reply for a template.
///
/// Each attribute is `id (u16), status (u16), value`; the values of
/// attributes 4, 5, 2, 1 sit at offsets 6, 14, 22 and 28.
///
/// # Errors
///
/// Returns `MalformedResponse` for short replies or failing attributes.
pub fn parse_struct_handle(data: &[u8]) -> Result<AbStructHandle> {
    if data.len() < 30 {
        return Err(EipError::malformed_response(format!(
            "template attributes reply too short: expected 30 bytes, got {}",
            data.len()
        ))
        .with_raw(data));
    }
    let u16_at = |i: usize| u16::from_le_bytes([data[i], data[i + 1]]);
    let u32_at = |i: usize| u32::from_le_bytes([data[i], data[i + 1], data[i + 2], data[i + 3]]);

    for (attribute, status_at) in [(4u16, 4usize), (5, 12), (2, 20), (1, 26)] {
        if u16_at(status_at) != 0 {
            return Err(EipError::malformed_response(format!(
                "template attribute {attribute} failed with status 0x{:04X}",
                u16_at(status_at)
            ))
            .with_raw(data));
        }
    }

    Ok(AbStructHandle {
        return_count: u16_at(0),
        template_object_definition_size: u32_at(6),
        template_structure_size: u32_at(14),
        member_count: u16_at(22),
        structure_handle: u16_at(28),
    })
}

/// Builds the Read Tag request for `length` bytes of a template's member
/// list, starting at `offset`.
pub fn template_request(symbol_type: u16, offset: u32, length: u16) -> Result<Vec<u8>> {
    let mut data = Vec::with_capacity(6);
    data.extend_from_slice(&offset.to_le_bytes());
    data.extend_from_slice(&length.to_le_bytes());
    encode_request(
        SERVICE_READ_TAG,
        &template_path(symbol_type & SYMBOL_TYPE_MASK),
        &data,
    )
}

/// Decoded member list of a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructTemplate {
    /// Structure name from the name table, when present.
    pub name: Option<String>,
    /// Members in declaration order.
    pub members: Vec<AbTagItem>,
}

/// Parses a template member list.
///
/// `member_count` records of `array length (u16), symbol type (u16),
/// offset (u32)` are followed by NUL-terminated names. A first name of the
/// form `Name;n...` is the structure name. Empty names left by NUL padding
/// at the end of the table are dropped.
///
/// # Errors
///
/// Returns `MalformedResponse` if records or names are missing.
pub fn parse_template(data: &[u8], handle: &AbStructHandle) -> Result<StructTemplate> {
    let count = handle.member_count as usize;
    let mut reader = Reader::new(data);
    let mut records = Vec::with_capacity(count);
    for _ in 0..count {
        let array_len = reader.u16("member record")?;
        let symbol_type = reader.u16("member record")?;
        let offset = reader.u32("member record")?;
        records.push((array_len, symbol_type, offset));
    }

    let table = &data[count * MEMBER_RECORD_SIZE..];
    let mut names: Vec<String> = Vec::with_capacity(count + 1);
    let mut start = 0usize;
    for (i, &byte) in table.iter().enumerate() {
        if byte == 0 {
            names.push(String::from_utf8_lossy(&table[start..i]).into_owned());
            start = i + 1;
        }
    }

    while names.last().is_some_and(|n| n.is_empty()) {
        names.pop();
    }

    let mut names = names.into_iter().peekable();
    let template_name = match names.peek() {
        Some(first) if first.contains(';') => names
            .next()
            .map(|n| n.split(';').next().unwrap_or_default().to_string()),
        _ => None,
    };
    if names.len() < count {
        return Err(EipError::malformed_response(format!(
            "template lists {count} members but {} names",
            names.len()
        ))
        .with_raw(data));
    }

    let members = records
        .into_iter()
        .zip(names)
        .map(|((array_len, symbol_type, offset), name)| {
            let mut member = AbTagItem::new(0, name, symbol_type);
            member.array_length = [array_len as i32, -1, -1];
            member.byte_offset = Some(offset.wrapping_add(MEMBER_OFFSET_ADJUST));
            member
        })
        .collect();

    Ok(StructTemplate {
        name: template_name,
        members,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(instance: u32, name: &str, symbol_type: u16, dims: [u32; 3]) -> Vec<u8> {
        let mut bytes = instance.to_le_bytes().to_vec();
        bytes.extend_from_slice(&(name.len() as u16).to_le_bytes());
        bytes.extend_from_slice(name.as_bytes());
        bytes.extend_from_slice(&symbol_type.to_le_bytes());
        for d in dims {
            bytes.extend_from_slice(&d.to_le_bytes());
        }
        bytes
    }

    #[test]
    fn test_symbol_type_bitfields() {
        for v in 0..=u16::MAX {
            let item = AbTagItem::new(0, "t", v);
            assert_eq!(item.is_struct(), v & 0x8000 != 0);
            let expected = if v & 0x4000 != 0 {
                2
            } else if v & 0x2000 != 0 {
                1
            } else {
                0
            };
            assert_eq!(item.array_dimension(), expected);
            assert_eq!(item.type_code(), v & 0xFFF);
        }
    }

    #[test]
    fn test_item_data_type() {
        assert_eq!(AbTagItem::new(1, "a", 0x20C4).data_type(), Some(CipDataType::Dint));
        assert_eq!(AbTagItem::new(1, "a", 0x8FCE).data_type(), None);
    }

    #[test]
    fn test_symbol_list_request() {
        let request = symbol_list_request(&[], 0).unwrap();
        assert_eq!(
            request,
            hex::decode("5503206b25000000 0300 0100 0200 0800".replace(' ', "")).unwrap()
        );

        let request = symbol_list_request(&[], 0x0001_0002).unwrap();
        assert_eq!(&request[2..10], &[0x20, 0x6B, 0x26, 0x00, 0x02, 0x00, 0x01, 0x00]);
    }

    #[test]
    fn test_parse_symbol_list_filters() {
        let mut data = record(1, "Speed", 0x00C4, [0, 0, 0]);
        data.extend(record(2, "__Hidden", 0x00C4, [0, 0, 0]));
        data.extend(record(3, "Local:1:I", 0x8123, [0, 0, 0]));
        data.extend(record(4, "Sys", 0x10C4, [0, 0, 0]));
        data.extend(record(5, "Recipe", 0xA0F0, [10, 0, 0]));

        let page = parse_symbol_list(&data, None).unwrap();
        assert_eq!(page.last_instance, Some(5));
        let names: Vec<&str> = page.items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Speed", "Recipe"]);
        assert_eq!(page.items[1].array_length, [10, 0, 0]);
        assert!(page.items[1].is_struct());
        assert_eq!(page.items[1].array_dimension(), 1);
    }

    #[test]
    fn test_parse_symbol_list_program_prefix() {
        let data = record(7, "Step", 0x00C3, [0, 0, 0]);
        let page = parse_symbol_list(&data, Some("MainProgram")).unwrap();
        assert_eq!(page.items[0].name, "Program:MainProgram.Step");
    }

    #[test]
    fn test_parse_symbol_list_truncated() {
        let data = record(1, "Speed", 0x00C4, [0, 0, 0]);
        assert!(parse_symbol_list(&data[..data.len() - 1], None).is_err());
        assert_eq!(parse_symbol_list(&[], None).unwrap(), SymbolPage::default());
    }

    #[test]
    fn test_struct_handle_request() {
        let request = struct_handle_request(0x8F12).unwrap();
        assert_eq!(
            request,
            hex::decode("0303206c2500120f 0400 0400 0500 0200 0100".replace(' ', "")).unwrap()
        );
        assert!(struct_handle_request(0x00C4).is_err());
    }

    #[test]
    fn test_parse_struct_handle() {
        let data = hex::decode(
            "0400 0400 0000 22000000 0500 0000 1c000000 0200 0000 0300 0100 0000 ce0f"
                .replace(' ', ""),
        )
        .unwrap();
        let handle = parse_struct_handle(&data).unwrap();
        assert_eq!(
            handle,
            AbStructHandle {
                return_count: 4,
                template_object_definition_size: 0x22,
                template_structure_size: 0x1C,
                member_count: 3,
                structure_handle: 0x0FCE,
            }
        );
        assert_eq!(handle.member_list_len().unwrap(), 0x22 * 4 - 21);

        let mut failed = data.clone();
        failed[12] = 0x05;
        assert!(parse_struct_handle(&failed).is_err());
        assert!(parse_struct_handle(&data[..29]).is_err());
    }

    #[test]
    fn test_member_list_len_too_small() {
        let handle = AbStructHandle {
            return_count: 4,
            template_object_definition_size: 5,
            template_structure_size: 0,
            member_count: 0,
            structure_handle: 0,
        };
        assert!(handle.member_list_len().is_err());
    }

    #[test]
    fn test_template_request() {
        let request = template_request(0x8F12, 0, 115).unwrap();
        assert_eq!(request, hex::decode("4c03206c2500120f000000007300").unwrap());
    }

    fn handle(member_count: u16) -> AbStructHandle {
        AbStructHandle {
            return_count: 4,
            template_object_definition_size: 0x22,
            template_structure_size: 0x1C,
            member_count,
            structure_handle: 0x1234,
        }
    }

    #[test]
    fn test_parse_template_with_structure_name() {
        let mut data = Vec::new();
        data.extend_from_slice(&[0x00, 0x00, 0xC4, 0x00, 0x00, 0x00, 0x00, 0x00]);
        data.extend_from_slice(&[0x0A, 0x00, 0xCA, 0x20, 0x04, 0x00, 0x00, 0x00]);
        data.extend_from_slice(b"Recipe;n\0Count\0Values\0");

        let template = parse_template(&data, &handle(2)).unwrap();
        assert_eq!(template.name.as_deref(), Some("Recipe"));
        assert_eq!(template.members.len(), 2);

        let count = &template.members[0];
        assert_eq!(count.name, "Count");
        assert_eq!(count.data_type(), Some(CipDataType::Dint));
        assert_eq!(count.byte_offset, Some(2));

        let values = &template.members[1];
        assert_eq!(values.name, "Values");
        assert_eq!(values.array_dimension(), 1);
        assert_eq!(values.array_length[0], 10);
        assert_eq!(values.byte_offset, Some(6));
    }

    #[test]
    fn test_parse_template_without_structure_name() {
        let mut data = vec![0x00, 0x00, 0xC1, 0x00, 0x00, 0x00, 0x00, 0x00];
        data.extend_from_slice(b"Flag\0");
        let template = parse_template(&data, &handle(1)).unwrap();
        assert_eq!(template.name, None);
        assert_eq!(template.members[0].name, "Flag");
    }

    #[test]
    fn test_parse_template_padded_name_table() {
        let mut data = vec![0x00, 0x00, 0xC1, 0x00, 0x00, 0x00, 0x00, 0x00];
        data.extend_from_slice(b"Flag\0\0\0");
        let template = parse_template(&data, &handle(1)).unwrap();
        assert_eq!(template.name, None);
        assert_eq!(template.members.len(), 1);
        assert_eq!(template.members[0].name, "Flag");

        let mut data = vec![0x00, 0x00, 0xC1, 0x00, 0x00, 0x00, 0x00, 0x00];
        data.extend_from_slice(b"Flags;n\0Flag\0\0\0\0");
        let template = parse_template(&data, &handle(1)).unwrap();
        assert_eq!(template.name.as_deref(), Some("Flags"));
        assert_eq!(template.members[0].name, "Flag");
    }

    #[test]
    fn test_parse_template_missing_names() {
        let mut data = vec![0u8; 16];
        data.extend_from_slice(b"Only\0");
        assert!(parse_template(&data, &handle(2)).is_err());

        let mut padded = vec![0u8; 16];
        padded.extend_from_slice(b"Only\0\0\0\0");
        assert!(parse_template(&padded, &handle(2)).is_err());
        assert!(parse_template(&data[..10], &handle(2)).is_err());
    }
}
