//! CIP elementary data types used by Logix controllers.
//!
//! Every Read Tag reply starts with a 16-bit type code, and every Write Tag
//! request must name one. The codes below are the elementary types; a
//! structure is announced by [`TYPE_STRUCT`] followed by its 16-bit
//! structure handle.
//!
//! | Type | Code | Size |
//! |------|------|------|
//! | BOOL | 0xC1 | 1 |
//! | SINT | 0xC2 | 1 |
//! | INT | 0xC3 | 2 |
//! | DINT | 0xC4 | 4 |
//! | LINT | 0xC5 | 8 |
//! | USINT | 0xC6 | 1 |
//! | UINT | 0xC7 | 2 |
//! | UDINT | 0xC8 | 4 |
//! | ULINT | 0xC9 | 8 |
//! | REAL | 0xCA | 4 |
//! | LREAL | 0xCB | 8 |
//! | BOOL array (packed DWORD) | 0xD3 | 4 |
//!
//! # Example
//!
//! ```
//! use ab_eip::CipDataType;
//!
//! assert_eq!(CipDataType::Dint.code(), 0xC4);
//! assert_eq!(CipDataType::from_code(0xCA), Some(CipDataType::Real));
//! assert_eq!(CipDataType::Lreal.size(), 8);
//! ```

use std::fmt;

/// Type code announcing a structure; followed by a 16-bit handle.
pub const TYPE_STRUCT: u16 = 0x02A0;

/// Structure handle of the built-in Logix STRING type.
pub const STRING_STRUCT_HANDLE: u16 = 0x0FCE;

/// Elementary CIP data types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CipDataType {
    /// BOOL.
    Bool,
    /// SINT (i8).
    Sint,
    /// INT (i16).
    Int,
    /// DINT (i32).
    Dint,
    /// LINT (i64).
    Lint,
    /// USINT (u8).
    Usint,
    /// UINT (u16).
    Uint,
    /// UDINT (u32).
    Udint,
    /// ULINT (u64).
    Ulint,
    /// REAL (f32).
    Real,
    /// LREAL (f64).
    Lreal,
    /// Packed BOOL array (32 bits per element).
    BitArray,
}

impl CipDataType {
    /// Returns the 16-bit type code.
    pub fn code(self) -> u16 {
        self.code_const()
    }

    const fn code_const(self) -> u16 {
        match self {
            CipDataType::Bool => 0xC1,
            CipDataType::Sint => 0xC2,
            CipDataType::Int => 0xC3,
            CipDataType::Dint => 0xC4,
            CipDataType::Lint => 0xC5,
            CipDataType::Usint => 0xC6,
            CipDataType::Uint => 0xC7,
            CipDataType::Udint => 0xC8,
            CipDataType::Ulint => 0xC9,
            CipDataType::Real => 0xCA,
            CipDataType::Lreal => 0xCB,
            CipDataType::BitArray => 0xD3,
        }
    }

    /// Looks up a type code.
    pub fn from_code(code: u16) -> Option<Self> {
        let data_type = match code {
            0xC1 => CipDataType::Bool,
            0xC2 => CipDataType::Sint,
            0xC3 => CipDataType::Int,
            0xC4 => CipDataType::Dint,
            0xC5 => CipDataType::Lint,
            0xC6 => CipDataType::Usint,
            0xC7 => CipDataType::Uint,
            0xC8 => CipDataType::Udint,
            0xC9 => CipDataType::Ulint,
            0xCA => CipDataType::Real,
            0xCB => CipDataType::Lreal,
            0xD3 => CipDataType::BitArray,
            _ => return None,
        };
        Some(data_type)
    }

    /// Returns the on-wire size of one element in bytes.
    pub fn size(self) -> usize {
        match self {
            CipDataType::Bool | CipDataType::Sint | CipDataType::Usint => 1,
            CipDataType::Int | CipDataType::Uint => 2,
            CipDataType::Dint | CipDataType::Udint | CipDataType::Real | CipDataType::BitArray => 4,
            CipDataType::Lint | CipDataType::Ulint | CipDataType::Lreal => 8,
        }
    }
}

impl fmt::Display for CipDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CipDataType::Bool => "BOOL",
            CipDataType::Sint => "SINT",
            CipDataType::Int => "INT",
            CipDataType::Dint => "DINT",
            CipDataType::Lint => "LINT",
            CipDataType::Usint => "USINT",
            CipDataType::Uint => "UINT",
            CipDataType::Udint => "UDINT",
            CipDataType::Ulint => "ULINT",
            CipDataType::Real => "REAL",
            CipDataType::Lreal => "LREAL",
            CipDataType::BitArray => "BOOL[]",
        };
        f.write_str(name)
    }
}

/// Type announced by a read reply or required by a write request.
///
/// Elementary types are a bare code; structures are [`TYPE_STRUCT`]
/// followed by the structure handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TagType {
    /// Type code.
    pub code: u16,
    /// Structure handle, present when `code` is [`TYPE_STRUCT`].
    pub struct_handle: Option<u16>,
}

impl TagType {
    /// Logix STRING.
    pub const STRING: TagType = TagType::structure(STRING_STRUCT_HANDLE);

    /// An elementary type.
    pub const fn elementary(data_type: CipDataType) -> Self {
        Self {
            code: data_type.code_const(),
            struct_handle: None,
        }
    }

    /// A structure identified by its handle.
    pub const fn structure(handle: u16) -> Self {
        Self {
            code: TYPE_STRUCT,
            struct_handle: Some(handle),
        }
    }

    /// Returns whether this is a structure.
    pub fn is_struct(&self) -> bool {
        self.code == TYPE_STRUCT
    }

    /// Returns the elementary type, if any.
    pub fn data_type(&self) -> Option<CipDataType> {
        CipDataType::from_code(self.code)
    }

    /// Serializes the type as sent in write requests.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = self.code.to_le_bytes().to_vec();
        if let Some(handle) = self.struct_handle {
            bytes.extend_from_slice(&handle.to_le_bytes());
        }
        bytes
    }

    /// Parses the type prefix of a read reply; returns it with its length.
    pub fn from_bytes(data: &[u8]) -> Option<(Self, usize)> {
        let code = u16::from_le_bytes([*data.first()?, *data.get(1)?]);
        if code == TYPE_STRUCT {
            let handle = u16::from_le_bytes([*data.get(2)?, *data.get(3)?]);
            Some((Self::structure(handle), 4))
        } else {
            Some((
                Self {
                    code,
                    struct_handle: None,
                },
                2,
            ))
        }
    }
}

impl From<CipDataType> for TagType {
    fn from(data_type: CipDataType) -> Self {
        Self::elementary(data_type)
    }
}
