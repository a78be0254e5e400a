//! Address strings: inline modifiers and tag path analysis.
//!
//! An address string is a list of `key=value;` modifiers followed by the
//! address body:
//!
//! | Form | Meaning |
//! |------|---------|
//! | `Name`, `Name[i]`, `Name[i,j,k]` | controller tag, optional array indices |
//! | `Program:MainProgram.Name` | program-scoped tag |
//! | `Udt.Member[2].Field` | structure members |
//! | `slot=N;` | route through backplane slot `N` |
//! | `type=0xNN;` | CIP data type to use when writing |
//! | `x=0x52;` | force the fragmented read/write service |
//! | `class=N;Instance` | raw class/instance addressing |
//! | `s=N;` | PCCC station (DF1) |
//! | `dst=N;src=N;` | PCCC destination/source node |
//!
//! Modifiers are tokenised into a typed list before the body is analysed, so
//! an unknown key or a malformed value is reported instead of silently
//! falling back to a default.
//!
//! # Example
//!
//! ```
//! use ab_eip::{Modifier, TagAddress, TagPath};
//!
//! let address = TagAddress::parse("slot=2;Program:MainProgram.Speeds[4]").unwrap();
//! assert_eq!(address.modifiers(), &[Modifier::Slot(2)]);
//! assert_eq!(
//!     address.tag_path().unwrap(),
//!     TagPath::new().symbol("Program:MainProgram").symbol("Speeds").element(4)
//! );
//! ```

use crate::error::{EipError, Result};
use crate::path::{TagPath, MAX_ARRAY_DIMENSIONS};

/// Service code that the `x=` modifier uses to force fragmented access.
pub const FORCE_FRAGMENT_SERVICE: u8 = 0x52;

/// A typed inline modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    /// `slot=N` - backplane slot of the target processor.
    Slot(u8),
    /// `type=0xNN` - CIP data type code.
    Type(u16),
    /// `x=0xNN` - explicit service code.
    Service(u8),
    /// `class=N` - raw class addressing, body is the instance id.
    Class(u32),
    /// `s=N` - PCCC station number.
    Station(u8),
    /// `dst=N` - PCCC destination node.
    Dst(u8),
    /// `src=N` - PCCC source node.
    Src(u8),
}

impl Modifier {
    fn parse(address: &str, token: &str) -> Result<Self> {
        let (key, value) = token
            .split_once('=')
            .ok_or_else(|| {
                EipError::address_parse(address, format!("'{token}' is not key=value"))
            })?;
        let key = key.trim().to_ascii_lowercase();
        let value = parse_number(value.trim())
            .ok_or_else(|| EipError::address_parse(address, format!("'{value}' is not a number")))?;

        let narrow = |max: u32| -> Result<u32> {
            if value > max {
                Err(EipError::address_parse(
                    address,
                    format!("'{key}' value {value} exceeds {max}"),
                ))
            } else {
                Ok(value)
            }
        };

        let modifier = match key.as_str() {
            "slot" => Modifier::Slot(narrow(0xFF)? as u8),
            "type" => Modifier::Type(narrow(0xFFFF)? as u16),
            "x" => Modifier::Service(narrow(0xFF)? as u8),
            "class" => Modifier::Class(value),
            "s" => Modifier::Station(narrow(0xFF)? as u8),
            "dst" => Modifier::Dst(narrow(0xFF)? as u8),
            "src" => Modifier::Src(narrow(0xFF)? as u8),
            _ => {
                return Err(EipError::address_parse(
                    address,
                    format!("unknown modifier '{key}'"),
                ))
            }
        };
        Ok(modifier)
    }
}

/// Parses a decimal or `0x`-prefixed hexadecimal number.
pub(crate) fn parse_number(text: &str) -> Option<u32> {
    if let Some(hex) = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
    {
        u32::from_str_radix(hex, 16).ok()
    } else {
        text.parse().ok()
    }
}

/// An address string split into modifiers and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagAddress {
    source: String,
    modifiers: Vec<Modifier>,
    body: String,
}

impl TagAddress {
    /// Tokenises an address string.
    ///
    /// # Errors
    ///
    /// Returns `AddressParse` for unknown modifiers, non-numeric values or an
    /// empty body.
    pub fn parse(address: &str) -> Result<Self> {
        let mut tokens: Vec<&str> = address.split(';').collect();
        let body = tokens.pop().unwrap_or_default().trim();
        if body.is_empty() {
            return Err(EipError::address_parse(address, "address body is empty"));
        }

        let mut modifiers = Vec::with_capacity(tokens.len());
        for token in tokens.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
            let modifier = Modifier::parse(address, token)?;
            if modifiers
                .iter()
                .any(|m| std::mem::discriminant(m) == std::mem::discriminant(&modifier))
            {
                return Err(EipError::address_parse(
                    address,
                    format!("modifier '{token}' given twice"),
                ));
            }
            modifiers.push(modifier);
        }

        Ok(Self {
            source: address.to_string(),
            modifiers,
            body: body.to_string(),
        })
    }

    /// Returns the original address string.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns the modifiers in the order they appeared.
    pub fn modifiers(&self) -> &[Modifier] {
        &self.modifiers
    }

    /// Returns the address body (text after the last `;`).
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Returns the `slot=` modifier.
    pub fn slot(&self) -> Option<u8> {
        self.modifiers.iter().find_map(|m| match m {
            Modifier::Slot(v) => Some(*v),
            _ => None,
        })
    }

    /// Returns the `type=` modifier.
    pub fn type_code(&self) -> Option<u16> {
        self.modifiers.iter().find_map(|m| match m {
            Modifier::Type(v) => Some(*v),
            _ => None,
        })
    }

    /// Returns whether `x=0x52` requests the fragmented service.
    pub fn force_fragment(&self) -> bool {
        self.modifiers
            .iter()
            .any(|m| *m == Modifier::Service(FORCE_FRAGMENT_SERVICE))
    }

    /// Returns the `s=` modifier.
    pub fn station(&self) -> Option<u8> {
        self.modifiers.iter().find_map(|m| match m {
            Modifier::Station(v) => Some(*v),
            _ => None,
        })
    }

    /// Returns the `dst=` modifier.
    pub fn dst(&self) -> Option<u8> {
        self.modifiers.iter().find_map(|m| match m {
            Modifier::Dst(v) => Some(*v),
            _ => None,
        })
    }

    /// Returns the `src=` modifier.
    pub fn src(&self) -> Option<u8> {
        self.modifiers.iter().find_map(|m| match m {
            Modifier::Src(v) => Some(*v),
            _ => None,
        })
    }

    /// Analyses the body into a CIP request path.
    ///
    /// # Errors
    ///
    /// Returns `AddressParse` for empty members, malformed or non-numeric
    /// indices, more than three dimensions, or a non-numeric instance after
    /// `class=`.
    pub fn tag_path(&self) -> Result<TagPath> {
        let class = self.modifiers.iter().find_map(|m| match m {
            Modifier::Class(v) => Some(*v),
            _ => None,
        });
        if let Some(class) = class {
            let instance = parse_number(&self.body).ok_or_else(|| {
                EipError::address_parse(&self.source, "instance after 'class=' must be numeric")
            })?;
            return Ok(TagPath::new().class(class).instance(instance));
        }

        let mut path = TagPath::new();
        for member in split_members(&self.body) {
            let member = member.trim();
            let (name, indices) = match member.find('[') {
                Some(open) => {
                    let close = member
                        .rfind(']')
                        .filter(|c| *c == member.len() - 1)
                        .ok_or_else(|| {
                            EipError::address_parse(
                                &self.source,
                                format!("unbalanced '[' in '{member}'"),
                            )
                        })?;
                    (&member[..open], Some(&member[open + 1..close]))
                }
                None => (member, None),
            };

            if name.is_empty() {
                return Err(EipError::address_parse(&self.source, "empty member name"));
            }
            if name.contains(']') {
                return Err(EipError::address_parse(
                    &self.source,
                    format!("unexpected ']' in '{member}'"),
                ));
            }
            path = path.symbol(name);

            if let Some(indices) = indices {
                let indices = parse_indices(&self.source, indices)?;
                path = path.elements(&indices);
            }
        }
        Ok(path)
    }
}

fn split_members(body: &str) -> Vec<&str> {
    let mut members = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (i, c) in body.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            '.' if depth == 0 => {
                members.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    members.push(&body[start..]);
    members
}

fn parse_indices(address: &str, text: &str) -> Result<Vec<u32>> {
    let indices = text
        .split(',')
        .map(|part| {
            parse_number(part.trim()).ok_or_else(|| {
                EipError::address_parse(address, format!("index '{}' is not a number", part.trim()))
            })
        })
        .collect::<Result<Vec<u32>>>()?;

    if indices.len() > MAX_ARRAY_DIMENSIONS {
        return Err(EipError::address_parse(
            address,
            format!("at most {MAX_ARRAY_DIMENSIONS} array dimensions are supported"),
        ));
    }
    Ok(indices)
}

/// Splits a bit address `Tag[n]` into the 32-bit word path and the bit index.
///
/// Logix BOOL arrays are packed into DINTs: bit `n` lives in word `n / 32`
/// at position `n % 32`.
///
/// # Errors
///
/// Returns `AddressParse` if the path does not end with exactly one index.
pub fn bit_word_path(address: &TagAddress) -> Result<(TagPath, u32)> {
    let path = address.tag_path()?;
    match path.trailing_elements().as_slice() {
        [index] => Ok((path.with_trailing_elements(&[index / 32]), index % 32)),
        _ => Err(EipError::address_parse(
            address.source(),
            "bit access needs exactly one trailing index, e.g. 'Flags[5]'",
        )),
    }
}
