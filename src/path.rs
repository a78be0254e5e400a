//! CIP request path encoding and decoding.
//!
//! A request path is a sequence of segments. Two families are used by the
//! tag services:
//!
//! | Segment | Tag byte(s) | Layout |
//! |---------|-------------|--------|
//! | ANSI extended symbolic | `0x91` | length, ASCII bytes, pad byte if length is odd |
//! | Logical class | `0x20` / `0x21` / `0x22` | 8-bit value / pad + u16 LE / pad + u32 LE |
//! | Logical instance | `0x24` / `0x25` / `0x26` | 8-bit value / pad + u16 LE / pad + u32 LE |
//! | Element (array index) | `0x28` / `0x29` / `0x2A` | 8-bit value / pad + u16 LE / pad + u32 LE |
//!
//! The width of a logical segment is chosen from the magnitude of its value
//! (`< 256`, `< 65536`, otherwise 32-bit) so decoding is never ambiguous.
//! Every segment is an even number of bytes, which makes the encoded path a
//! whole number of 16-bit words.
//!
//! # Example
//!
//! ```
//! use ab_eip::{TagPath, decode_path, encode_path};
//!
//! let path = TagPath::new().symbol("Motor").elements(&[3, 300]);
//! let bytes = encode_path(&path).unwrap();
//! assert_eq!(
//!     bytes,
//!     [0x91, 0x05, b'M', b'o', b't', b'o', b'r', 0x00, 0x28, 0x03, 0x29, 0x00, 0x2C, 0x01]
//! );
//! assert_eq!(decode_path(&bytes).unwrap(), path);
//! ```

use std::fmt;

use crate::error::{EipError, Result};

/// ANSI extended symbolic segment.
pub const SEGMENT_SYMBOLIC: u8 = 0x91;
/// Logical class segment, 8-bit value.
pub const SEGMENT_CLASS_8: u8 = 0x20;
/// Logical class segment, 16-bit value.
pub const SEGMENT_CLASS_16: u8 = 0x21;
/// Logical class segment, 32-bit value.
pub const SEGMENT_CLASS_32: u8 = 0x22;
/// Logical instance segment, 8-bit value.
pub const SEGMENT_INSTANCE_8: u8 = 0x24;
/// Logical instance segment, 16-bit value.
pub const SEGMENT_INSTANCE_16: u8 = 0x25;
/// Logical instance segment, 32-bit value.
pub const SEGMENT_INSTANCE_32: u8 = 0x26;
/// Element segment, 8-bit value.
pub const SEGMENT_ELEMENT_8: u8 = 0x28;
/// Element segment, 16-bit value.
pub const SEGMENT_ELEMENT_16: u8 = 0x29;
/// Element segment, 32-bit value.
pub const SEGMENT_ELEMENT_32: u8 = 0x2A;

/// Maximum number of array dimensions following a symbolic segment.
pub const MAX_ARRAY_DIMENSIONS: usize = 3;

/// Kind of a numeric (logical) path segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LogicalKind {
    /// Object class.
    Class,
    /// Object instance.
    Instance,
    /// Array element index.
    Element,
}

impl LogicalKind {
    fn base_tag(self) -> u8 {
        match self {
            LogicalKind::Class => SEGMENT_CLASS_8,
            LogicalKind::Instance => SEGMENT_INSTANCE_8,
            LogicalKind::Element => SEGMENT_ELEMENT_8,
        }
    }

    fn from_tag(tag: u8) -> Option<(Self, usize)> {
        let kind = match tag & 0xFC {
            SEGMENT_CLASS_8 => LogicalKind::Class,
            SEGMENT_INSTANCE_8 => LogicalKind::Instance,
            SEGMENT_ELEMENT_8 => LogicalKind::Element,
            _ => return None,
        };
        let width = match tag & 0x03 {
            0 => 1,
            1 => 2,
            2 => 4,
            _ => return None,
        };
        Some((kind, width))
    }
}

/// One segment of a [`TagPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PathSegment {
    /// Tag or member name.
    Symbolic(String),
    /// Class, instance or element number.
    Logical(LogicalKind, u32),
    /// Undecoded trailing bytes (emitted verbatim on encode).
    Raw(Vec<u8>),
}

/// Ordered list of request path segments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TagPath {
    segments: Vec<PathSegment>,
}

impl TagPath {
    /// Creates an empty path.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a path from segments.
    pub fn from_segments(segments: Vec<PathSegment>) -> Self {
        Self { segments }
    }

    /// Appends a symbolic segment.
    pub fn symbol(mut self, name: impl Into<String>) -> Self {
        self.segments.push(PathSegment::Symbolic(name.into()));
        self
    }

    /// Appends a class segment.
    pub fn class(mut self, class: u32) -> Self {
        self.segments.push(PathSegment::Logical(LogicalKind::Class, class));
        self
    }

    /// Appends an instance segment.
    pub fn instance(mut self, instance: u32) -> Self {
        self.segments
            .push(PathSegment::Logical(LogicalKind::Instance, instance));
        self
    }

    /// Appends one element segment.
    pub fn element(mut self, index: u32) -> Self {
        self.segments
            .push(PathSegment::Logical(LogicalKind::Element, index));
        self
    }

    /// Appends one element segment per array dimension.
    pub fn elements(mut self, indices: &[u32]) -> Self {
        for index in indices {
            self = self.element(*index);
        }
        self
    }

    /// Returns the segments.
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Returns a mutable reference to the segments.
    pub fn segments_mut(&mut self) -> &mut Vec<PathSegment> {
        &mut self.segments
    }

    /// Returns whether the path has no segments.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns the trailing array indices (empty when the path ends in a symbol).
    pub fn trailing_elements(&self) -> Vec<u32> {
        let mut indices: Vec<u32> = self
            .segments
            .iter()
            .rev()
            .map_while(|segment| match segment {
                PathSegment::Logical(LogicalKind::Element, index) => Some(*index),
                _ => None,
            })
            .collect();
        indices.reverse();
        indices
    }

    /// Replaces the trailing array indices.
    pub fn with_trailing_elements(mut self, indices: &[u32]) -> Self {
        while matches!(
            self.segments.last(),
            Some(PathSegment::Logical(LogicalKind::Element, _))
        ) {
            self.segments.pop();
        }
        self.elements(indices)
    }
}

impl fmt::Display for TagPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut in_index = false;
        let mut first = true;
        for segment in &self.segments {
            match segment {
                PathSegment::Logical(LogicalKind::Element, index) => {
                    if in_index {
                        write!(f, ",{index}")?;
                    } else {
                        write!(f, "[{index}")?;
                        in_index = true;
                    }
                    continue;
                }
                _ if in_index => {
                    write!(f, "]")?;
                    in_index = false;
                }
                _ => {}
            }
            if !first {
                write!(f, ".")?;
            }
            first = false;
            match segment {
                PathSegment::Symbolic(name) => write!(f, "{name}")?,
                PathSegment::Logical(LogicalKind::Class, class) => write!(f, "@class={class}")?,
                PathSegment::Logical(LogicalKind::Instance, instance) => {
                    write!(f, "@instance={instance}")?
                }
                PathSegment::Raw(bytes) => write!(f, "@raw({} bytes)", bytes.len())?,
                PathSegment::Logical(LogicalKind::Element, _) => {}
            }
        }
        if in_index {
            write!(f, "]")?;
        }
        Ok(())
    }
}

/// Encodes a path to its byte form.
///
/// # Errors
///
/// Returns `InvalidParameter` if a symbolic name is empty, longer than 255
/// bytes or not ASCII, or if more than three array indices follow a symbol.
pub fn encode_path(path: &TagPath) -> Result<Vec<u8>> {
    let mut bytes = Vec::with_capacity(path.segments.len() * 8);
    let mut dimensions = 0usize;

    for segment in &path.segments {
        match segment {
            PathSegment::Symbolic(name) => {
                dimensions = 0;
                encode_symbolic(name, &mut bytes)?;
            }
            PathSegment::Logical(kind, value) => {
                if *kind == LogicalKind::Element {
                    dimensions += 1;
                    if dimensions > MAX_ARRAY_DIMENSIONS {
                        return Err(EipError::invalid_parameter(
                            "path",
                            format!("at most {MAX_ARRAY_DIMENSIONS} array dimensions"),
                        ));
                    }
                } else {
                    dimensions = 0;
                }
                encode_logical(*kind, *value, &mut bytes);
            }
            PathSegment::Raw(raw) => bytes.extend_from_slice(raw),
        }
    }

    Ok(bytes)
}

fn encode_symbolic(name: &str, bytes: &mut Vec<u8>) -> Result<()> {
    if name.is_empty() {
        return Err(EipError::invalid_parameter("path", "symbol name is empty"));
    }
    if !name.is_ascii() {
        return Err(EipError::invalid_parameter(
            "path",
            format!("symbol '{name}' is not ASCII"),
        ));
    }
    let len = u8::try_from(name.len()).map_err(|_| {
        EipError::invalid_parameter("path", format!("symbol '{name}' exceeds 255 bytes"))
    })?;

    bytes.push(SEGMENT_SYMBOLIC);
    bytes.push(len);
    bytes.extend_from_slice(name.as_bytes());
    if len % 2 == 1 {
        bytes.push(0x00);
    }
    Ok(())
}

fn encode_logical(kind: LogicalKind, value: u32, bytes: &mut Vec<u8>) {
    let tag = kind.base_tag();
    if value < 0x100 {
        bytes.push(tag);
        bytes.push(value as u8);
    } else if value < 0x1_0000 {
        bytes.push(tag | 0x01);
        bytes.push(0x00);
        bytes.extend_from_slice(&(value as u16).to_le_bytes());
    } else {
        bytes.push(tag | 0x02);
        bytes.push(0x00);
        bytes.extend_from_slice(&value.to_le_bytes());
    }
}

/// Decodes a byte path produced by [`encode_path`].
///
/// Decoding stops at the first unrecognised segment tag; the remaining bytes
/// are kept as a trailing [`PathSegment::Raw`].
///
/// # Errors
///
/// Returns `MalformedResponse` if a recognised segment is truncated.
pub fn decode_path(bytes: &[u8]) -> Result<TagPath> {
    let mut segments = Vec::new();
    let mut pos = 0usize;

    while pos < bytes.len() {
        let tag = bytes[pos];
        if tag == SEGMENT_SYMBOLIC {
            let len = *bytes
                .get(pos + 1)
                .ok_or_else(|| truncated(bytes, pos))? as usize;
            let start = pos + 2;
            let end = start + len;
            let name = bytes.get(start..end).ok_or_else(|| truncated(bytes, pos))?;
            let name = std::str::from_utf8(name).map_err(|_| {
                EipError::malformed_response(format!("symbol at offset {pos} is not ASCII"))
                    .with_raw(bytes)
            })?;
            segments.push(PathSegment::Symbolic(name.to_string()));
            pos = end + (len % 2);
        } else if let Some((kind, width)) = LogicalKind::from_tag(tag) {
            // 16- and 32-bit forms carry a pad byte after the tag.
            let start = if width == 1 { pos + 1 } else { pos + 2 };
            let raw = bytes
                .get(start..start + width)
                .ok_or_else(|| truncated(bytes, pos))?;
            let value = match width {
                1 => u32::from(raw[0]),
                2 => u32::from(u16::from_le_bytes([raw[0], raw[1]])),
                _ => u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]),
            };
            segments.push(PathSegment::Logical(kind, value));
            pos = start + width;
        } else {
            segments.push(PathSegment::Raw(bytes[pos..].to_vec()));
            break;
        }
    }

    if pos > bytes.len() {
        return Err(truncated(bytes, pos));
    }

    Ok(TagPath { segments })
}

fn truncated(bytes: &[u8], pos: usize) -> EipError {
    EipError::malformed_response(format!("path segment at offset {pos} is truncated"))
        .with_raw(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(path: &TagPath) -> TagPath {
        let bytes = encode_path(path).unwrap();
        assert_eq!(bytes.len() % 2, 0, "path must be word aligned");
        decode_path(&bytes).unwrap()
    }

    #[test]
    fn test_symbolic_even_length() {
        let bytes = encode_path(&TagPath::new().symbol("AB")).unwrap();
        assert_eq!(bytes, [0x91, 0x02, b'A', b'B']);
    }

    #[test]
    fn test_symbolic_odd_length_is_padded() {
        let bytes = encode_path(&TagPath::new().symbol("ABC")).unwrap();
        assert_eq!(bytes, [0x91, 0x03, b'A', b'B', b'C', 0x00]);
    }

    #[test]
    fn test_class_instance_widths() {
        let path = TagPath::new().class(0x6B).instance(0x1234);
        let bytes = encode_path(&path).unwrap();
        assert_eq!(bytes, [0x20, 0x6B, 0x25, 0x00, 0x34, 0x12]);

        let bytes = encode_path(&TagPath::new().instance(0x0001_0000)).unwrap();
        assert_eq!(bytes, [0x26, 0x00, 0x00, 0x00, 0x01, 0x00]);
    }

    #[test]
    fn test_element_widths() {
        let bytes = encode_path(&TagPath::new().element(255)).unwrap();
        assert_eq!(bytes, [0x28, 0xFF]);

        let bytes = encode_path(&TagPath::new().element(256)).unwrap();
        assert_eq!(bytes, [0x29, 0x00, 0x00, 0x01]);

        let bytes = encode_path(&TagPath::new().element(65_535)).unwrap();
        assert_eq!(bytes, [0x29, 0x00, 0xFF, 0xFF]);

        let bytes = encode_path(&TagPath::new().element(65_536)).unwrap();
        assert_eq!(bytes, [0x2A, 0x00, 0x00, 0x00, 0x01, 0x00]);
    }

    #[test]
    fn test_roundtrip_boundary_values() {
        for value in [0u32, 1, 255, 256, 65_535, 65_536, u32::MAX] {
            let path = TagPath::new().symbol("Tag").element(value);
            assert_eq!(roundtrip(&path), path, "element {value}");

            let path = TagPath::new().class(value).instance(value);
            assert_eq!(roundtrip(&path), path, "class/instance {value}");
        }
    }

    #[test]
    fn test_roundtrip_nested_members() {
        let path = TagPath::new()
            .symbol("Program:MainProgram")
            .symbol("Recipe")
            .elements(&[1, 2, 3])
            .symbol("Step");
        assert_eq!(roundtrip(&path), path);
    }

    #[test]
    fn test_too_many_dimensions() {
        let path = TagPath::new().symbol("Cube").elements(&[1, 2, 3, 4]);
        assert!(encode_path(&path).is_err());

        // A new symbol resets the dimension count
        let path = TagPath::new()
            .symbol("A")
            .elements(&[1, 2, 3])
            .symbol("B")
            .elements(&[4, 5, 6]);
        assert!(encode_path(&path).is_ok());
    }

    #[test]
    fn test_invalid_symbols() {
        assert!(encode_path(&TagPath::new().symbol("")).is_err());
        assert!(encode_path(&TagPath::new().symbol("Température")).is_err());
        assert!(encode_path(&TagPath::new().symbol("x".repeat(256))).is_err());
    }

    #[test]
    fn test_decode_stops_at_unknown_segment() {
        let bytes = [0x91, 0x02, b'A', b'B', 0x34, 0x04, 0x00, 0x00];
        let path = decode_path(&bytes).unwrap();
        assert_eq!(
            path.segments(),
            &[
                PathSegment::Symbolic("AB".into()),
                PathSegment::Raw(vec![0x34, 0x04, 0x00, 0x00])
            ]
        );
        assert_eq!(encode_path(&path).unwrap(), bytes);
    }

    #[test]
    fn test_decode_truncated() {
        assert!(decode_path(&[0x91, 0x05, b'A']).is_err());
        assert!(decode_path(&[0x29, 0x00, 0x01]).is_err());
        assert!(decode_path(&[0x28]).is_err());
    }

    #[test]
    fn test_trailing_elements() {
        let path = TagPath::new().symbol("Tag").elements(&[4, 5]);
        assert_eq!(path.trailing_elements(), vec![4, 5]);

        let path = path.with_trailing_elements(&[0]);
        assert_eq!(path.trailing_elements(), vec![0]);
        assert_eq!(path.segments().len(), 2);
    }

    #[test]
    fn test_display() {
        let path = TagPath::new()
            .symbol("Program:Main")
            .symbol("Data")
            .elements(&[1, 2])
            .symbol("Value");
        assert_eq!(path.to_string(), "Program:Main.Data[1,2].Value");
    }
}
