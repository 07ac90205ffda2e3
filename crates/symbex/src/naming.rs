//! Symbolic variable naming
//!
//! Every buffer registered with the engine is named `<base>.<tag>#<field>`.
//! The engine correlates solved bytes back to a logical value purely by this
//! string, and uses the tag to choose how to rebuild a host value from them.
//! The tag therefore names the reconstruction type, not the in-memory
//! representation of the registered bytes.
//!
//! Encoding is injective: `base` may not contain `#`, and `field` may
//! contain neither `.` nor `#`, so the last `#` and the `.` two characters
//! before it always delimit the tag.

use std::fmt;

use symbex_sdk::{SymbexError, SymbexResult};

/// Field name for a value's payload
pub const FIELD_VALUE: &str = "value";

/// Field name for a container's size header
pub const FIELD_SIZE: &str = "size";

/// Reconstruction type tag.
///
/// The character alphabet is a public contract with the engine's value
/// reconstruction and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    /// Machine-word integer (`i`)
    Int,
    /// Byte string (`s`)
    ByteString,
    /// Unicode text (`u`)
    Text,
    /// Raw byte buffer (`b`)
    Bytes,
    /// Container length (`l`)
    Size,
}

impl TypeTag {
    /// Tag character
    pub const fn as_char(self) -> char {
        match self {
            TypeTag::Int => 'i',
            TypeTag::ByteString => 's',
            TypeTag::Text => 'u',
            TypeTag::Bytes => 'b',
            TypeTag::Size => 'l',
        }
    }

    /// Parse a tag character
    pub const fn from_char(c: char) -> Option<Self> {
        match c {
            'i' => Some(TypeTag::Int),
            's' => Some(TypeTag::ByteString),
            'u' => Some(TypeTag::Text),
            'b' => Some(TypeTag::Bytes),
            'l' => Some(TypeTag::Size),
            _ => None,
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// An encoded symbolic variable name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SymbolicName(String);

impl SymbolicName {
    /// Borrow as `&str`
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split an encoded name into `(base, tag, field)`.
    pub fn parse(name: &str) -> Option<(&str, TypeTag, &str)> {
        let hash = name.rfind('#')?;
        let field = &name[hash + 1..];
        let head = &name[..hash];
        let tag_char = head.chars().next_back()?;
        let base = head[..head.len() - tag_char.len_utf8()].strip_suffix('.')?;
        if base.is_empty() || base.contains('#') || field.is_empty() || field.contains('.') {
            return None;
        }
        Some((base, TypeTag::from_char(tag_char)?, field))
    }
}

impl fmt::Display for SymbolicName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SymbolicName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Builds symbolic names, rejecting anything that would not round-trip.
#[derive(Debug, Clone, Copy)]
pub struct NameEncoder {
    max_len: usize,
}

impl NameEncoder {
    /// Encoder accepting names of at most `max_len` bytes
    pub const fn new(max_len: usize) -> Self {
        Self { max_len }
    }

    /// Longest accepted encoded name
    pub const fn max_len(&self) -> usize {
        self.max_len
    }

    /// Encode `<base>.<tag>#<field>`.
    pub fn encode(&self, base: &str, tag: TypeTag, field: &str) -> SymbexResult<SymbolicName> {
        if base.is_empty() {
            return Err(SymbexError::InvalidName("base name is empty".to_string()));
        }
        if base.contains('#') {
            return Err(SymbexError::InvalidName(format!(
                "base name '{}' contains '#'",
                base
            )));
        }
        if field.is_empty() || field.contains('.') || field.contains('#') {
            return Err(SymbexError::InvalidName(format!(
                "field name '{}' must be non-empty without '.' or '#'",
                field
            )));
        }

        let encoded = format!("{}.{}#{}", base, tag.as_char(), field);
        if encoded.len() > self.max_len {
            return Err(SymbexError::InvalidName(format!(
                "'{}' is {} bytes, limit is {}",
                encoded,
                encoded.len(),
                self.max_len
            )));
        }
        Ok(SymbolicName(encoded))
    }
}
