//! HostValue - the closed set of host value kinds the bridge understands
//!
//! The host owns every value. Containers are shared handles
//! (`Rc<RefCell<_>>`), so handing the same container back to the caller is
//! a `clone()` of the handle: the share count goes up by exactly one and the
//! storage is untouched.
//!
//! Each container carries an explicit size header word. That word is the
//! memory the backend tracks when a container's length is made symbolic, so
//! it is kept in sync with the element storage by every mutator.
//!
//! ```text
//! Int(i64)                inline, marshaled through a stack copy
//! Text(Rc<TextObject>)    immutable; marshaling builds a new TextObject
//! List(Shared<ListObject>)      mutable, size header marked in place
//! Mapping(Shared<MapObject>)    mutable, size header marked in place
//! Tuple(Shared<TupleObject>)    immutable contents, size header marked in place
//! ```

use std::cell::RefCell;
use std::rc::Rc;

/// Shared, interior-mutable handle to a host container
pub type Shared<T> = Rc<RefCell<T>>;

/// Size in bytes of one UCS-4 code unit in a text scratch buffer
pub const CODE_UNIT_SIZE: usize = std::mem::size_of::<u32>();

/// Handle to a host value.
#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    /// Absence of a value
    None,
    /// Boolean (not marshalable)
    Bool(bool),
    /// Machine-word integer
    Int(i64),
    /// Floating point (not marshalable)
    Float(f64),
    /// Unicode text
    Text(Rc<TextObject>),
    /// Mutable ordered sequence
    List(Shared<ListObject>),
    /// Key/value mapping
    Mapping(Shared<MapObject>),
    /// Immutable ordered sequence
    Tuple(Shared<TupleObject>),
}

impl HostValue {
    /// Build a text value
    pub fn text(s: &str) -> Self {
        HostValue::Text(Rc::new(TextObject::new(s)))
    }

    /// Build a list value
    pub fn list(items: Vec<HostValue>) -> Self {
        HostValue::List(Rc::new(RefCell::new(ListObject::new(items))))
    }

    /// Build a mapping value
    pub fn mapping(entries: Vec<(HostValue, HostValue)>) -> Self {
        let mut map = MapObject::new();
        for (key, value) in entries {
            map.insert(key, value);
        }
        HostValue::Mapping(Rc::new(RefCell::new(map)))
    }

    /// Build a tuple value
    pub fn tuple(items: Vec<HostValue>) -> Self {
        HostValue::Tuple(Rc::new(RefCell::new(TupleObject::new(items))))
    }

    /// Kind name for diagnostics
    pub const fn type_name(&self) -> &'static str {
        match self {
            HostValue::None => "none",
            HostValue::Bool(_) => "bool",
            HostValue::Int(_) => "int",
            HostValue::Float(_) => "float",
            HostValue::Text(_) => "text",
            HostValue::List(_) => "list",
            HostValue::Mapping(_) => "mapping",
            HostValue::Tuple(_) => "tuple",
        }
    }

    /// Check if this is the absence value
    pub const fn is_none(&self) -> bool {
        matches!(self, HostValue::None)
    }

    /// Extract integer value
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            HostValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Extract boolean value
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            HostValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Borrow the text object, if this is text
    pub fn as_text(&self) -> Option<&Rc<TextObject>> {
        match self {
            HostValue::Text(t) => Some(t),
            _ => None,
        }
    }

    /// Number of live handles to the underlying storage.
    ///
    /// Inline values have no shared storage and report `None`.
    pub fn share_count(&self) -> Option<usize> {
        match self {
            HostValue::Text(t) => Some(Rc::strong_count(t)),
            HostValue::List(l) => Some(Rc::strong_count(l)),
            HostValue::Mapping(m) => Some(Rc::strong_count(m)),
            HostValue::Tuple(t) => Some(Rc::strong_count(t)),
            _ => None,
        }
    }

    /// Whether both handles point at the same storage
    pub fn same_storage(&self, other: &HostValue) -> bool {
        match (self, other) {
            (HostValue::Text(a), HostValue::Text(b)) => Rc::ptr_eq(a, b),
            (HostValue::List(a), HostValue::List(b)) => Rc::ptr_eq(a, b),
            (HostValue::Mapping(a), HostValue::Mapping(b)) => Rc::ptr_eq(a, b),
            (HostValue::Tuple(a), HostValue::Tuple(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<i64> for HostValue {
    fn from(i: i64) -> Self {
        HostValue::Int(i)
    }
}

impl From<bool> for HostValue {
    fn from(b: bool) -> Self {
        HostValue::Bool(b)
    }
}

impl From<&str> for HostValue {
    fn from(s: &str) -> Self {
        HostValue::text(s)
    }
}

/// View a size header word as the raw bytes the backend registers.
pub fn word_bytes_mut(word: &mut usize) -> &mut [u8] {
    // Safety: usize has no invalid bit patterns and the slice covers exactly
    // the word, borrowed mutably for the slice's lifetime.
    unsafe {
        std::slice::from_raw_parts_mut(
            word as *mut usize as *mut u8,
            std::mem::size_of::<usize>(),
        )
    }
}

// ============================================================================
// Text
// ============================================================================

/// Immutable Unicode text with a size header (length in code points).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextObject {
    size: usize,
    data: String,
}

impl TextObject {
    /// Create from a Rust string
    pub fn new(s: &str) -> Self {
        Self {
            size: s.chars().count(),
            data: s.to_string(),
        }
    }

    /// Rebuild text from UCS-4 code units.
    ///
    /// Returns `None` if any unit is not a Unicode scalar value.
    pub fn from_code_units(units: &[u32]) -> Option<Self> {
        let data = units
            .iter()
            .map(|&u| char::from_u32(u))
            .collect::<Option<String>>()?;
        Some(Self {
            size: units.len(),
            data,
        })
    }

    /// Length in code points
    pub fn len(&self) -> usize {
        self.size
    }

    /// Check if text is empty
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Borrow as `&str`
    pub fn as_str(&self) -> &str {
        &self.data
    }

    /// Iterate over UCS-4 code units
    pub fn code_units(&self) -> impl Iterator<Item = u32> + Clone + '_ {
        self.data.chars().map(u32::from)
    }

    /// Size header word
    pub fn size_word_mut(&mut self) -> &mut usize {
        &mut self.size
    }
}

// ============================================================================
// List
// ============================================================================

/// Mutable ordered sequence with a size header.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ListObject {
    size: usize,
    items: Vec<HostValue>,
}

impl ListObject {
    /// Create from items
    pub fn new(items: Vec<HostValue>) -> Self {
        Self {
            size: items.len(),
            items,
        }
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.size
    }

    /// Check if list is empty
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Element storage
    pub fn items(&self) -> &[HostValue] {
        &self.items
    }

    /// Append an element
    pub fn push(&mut self, value: HostValue) {
        self.items.push(value);
        self.size = self.items.len();
    }

    /// Remove and return the last element
    pub fn pop(&mut self) -> Option<HostValue> {
        let value = self.items.pop();
        self.size = self.items.len();
        value
    }

    /// Size header word
    pub fn size_word_mut(&mut self) -> &mut usize {
        &mut self.size
    }
}

// ============================================================================
// Mapping
// ============================================================================

/// Key/value mapping with a used-entry count header.
///
/// Keys compare by value; inserting an existing key replaces its value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MapObject {
    used: usize,
    entries: Vec<(HostValue, HostValue)>,
}

impl MapObject {
    /// Create an empty mapping
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an entry, returning the previous value
    pub fn insert(&mut self, key: HostValue, value: HostValue) -> Option<HostValue> {
        let previous = match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        };
        self.used = self.entries.len();
        previous
    }

    /// Look up a value by key
    pub fn get(&self, key: &HostValue) -> Option<&HostValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.used
    }

    /// Check if mapping is empty
    pub fn is_empty(&self) -> bool {
        self.used == 0
    }

    /// Used-entry count header word
    pub fn size_word_mut(&mut self) -> &mut usize {
        &mut self.used
    }
}

// ============================================================================
// Tuple
// ============================================================================

/// Immutable ordered sequence with a size header.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TupleObject {
    size: usize,
    items: Box<[HostValue]>,
}

impl TupleObject {
    /// Create from items
    pub fn new(items: Vec<HostValue>) -> Self {
        Self {
            size: items.len(),
            items: items.into_boxed_slice(),
        }
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.size
    }

    /// Check if tuple is empty
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Element storage
    pub fn items(&self) -> &[HostValue] {
        &self.items
    }

    /// Size header word
    pub fn size_word_mut(&mut self) -> &mut usize {
        &mut self.size
    }
}
