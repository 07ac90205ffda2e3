//! Value marshaling
//!
//! Turns a host value into tracked engine memory and hands back the value
//! the host should keep using. Dispatch is over the closed [`HostValue`]
//! set:
//!
//! | Kind    | Validation            | Registered                | Returned          |
//! |---------|-----------------------|---------------------------|-------------------|
//! | Int     | value range           | `i#value` (stack copy)    | new int           |
//! | None    | always rejected       | nothing                   | `InvalidTarget`   |
//! | Text    | size constraint       | `u#value` scratch, `l#size` | new text        |
//! | List    | size constraint       | `l#size` in place         | same list         |
//! | Mapping | none                  | `l#size` in place         | same mapping      |
//! | Tuple   | none                  | `l#size` in place         | same tuple        |
//!
//! Every branch validates and encodes its names before the first engine
//! call, so a rejected request leaves the engine untouched.

use std::rc::Rc;

use symbex_sdk::{
    word_bytes_mut, Assumption, Comparison, GuestChannel, HostValue, ListObject, MapObject,
    Shared, SymbexError, SymbexResult, TextObject, TupleObject, CODE_UNIT_SIZE,
};

use crate::config::SymbexConfig;
use crate::naming::{NameEncoder, SymbolicName, TypeTag, FIELD_SIZE, FIELD_VALUE};
use crate::size::{self, SizeConstraint, ValueRange};

/// Largest code point accepted by `assume_ascii`
const ASCII_MAX: i64 = 0x7f;

/// Marshals host values into symbolic engine memory.
pub struct ValueMarshaler<'a> {
    channel: &'a dyn GuestChannel,
    names: NameEncoder,
    max_symbolic_size: usize,
}

impl<'a> ValueMarshaler<'a> {
    /// Create a marshaler over `channel`
    pub fn new(channel: &'a dyn GuestChannel, config: &SymbexConfig) -> Self {
        Self {
            channel,
            names: NameEncoder::new(config.max_name_len),
            max_symbolic_size: config.max_symbolic_size,
        }
    }

    /// Name encoder in use
    pub fn names(&self) -> &NameEncoder {
        &self.names
    }

    /// Make any supported value symbolic.
    ///
    /// For integers `max_size`/`min_size` bound the value itself; for every
    /// other kind they bound the container length.
    pub fn make_symbolic(
        &self,
        value: &HostValue,
        name: &str,
        max_size: i64,
        min_size: i64,
    ) -> SymbexResult<HostValue> {
        match value {
            HostValue::Int(i) => self
                .make_symbolic_int(*i, name, ValueRange::new(max_size, min_size))
                .map(HostValue::Int),
            _ => self.make_symbolic_sequence(value, name, max_size, min_size),
        }
    }

    /// Make an integer symbolic, optionally constraining it to `range`.
    pub fn make_symbolic_int(&self, value: i64, name: &str, range: ValueRange) -> SymbexResult<i64> {
        self.ensure_active()?;
        range.check_value(value)?;
        let var = self.names.encode(name, TypeTag::Int, FIELD_VALUE)?;

        let mut raw = value.to_ne_bytes();
        self.register(&mut raw, &var);
        let value = i64::from_ne_bytes(raw);

        range.constrain_value(self.channel, var.as_str(), value);
        Ok(value)
    }

    /// Make a text, list, mapping or tuple symbolic.
    pub fn make_symbolic_sequence(
        &self,
        value: &HostValue,
        name: &str,
        max_size: i64,
        min_size: i64,
    ) -> SymbexResult<HostValue> {
        self.ensure_active()?;
        let constraint = SizeConstraint::new(max_size, min_size)?;

        match value {
            HostValue::None => Err(SymbexError::InvalidTarget(
                "cannot make symbolic none".to_string(),
            )),
            HostValue::Text(text) => self.text(text, name, constraint).map(HostValue::Text),
            HostValue::List(list) => self.list(list, name, constraint).map(HostValue::List),
            HostValue::Mapping(map) => self.mapping(map, name, constraint).map(HostValue::Mapping),
            HostValue::Tuple(tuple) => self.tuple(tuple, name, constraint).map(HostValue::Tuple),
            HostValue::Bool(_) | HostValue::Int(_) | HostValue::Float(_) => {
                Err(SymbexError::UnsupportedType {
                    got: value.type_name(),
                })
            }
        }
    }

    /// Constrain every code point of a text value to ASCII.
    pub fn assume_ascii(&self, value: &HostValue) -> SymbexResult<()> {
        self.ensure_active()?;
        let text = value.as_text().ok_or(SymbexError::UnsupportedType {
            got: value.type_name(),
        })?;
        for (index, unit) in text.code_units().enumerate() {
            size::emit(
                self.channel,
                Assumption::new(
                    format!("code_unit[{}]", index),
                    Comparison::Le,
                    i64::from(unit),
                    ASCII_MAX,
                ),
            );
        }
        Ok(())
    }

    fn ensure_active(&self) -> SymbexResult<()> {
        if self.channel.engine_active() {
            Ok(())
        } else {
            Err(SymbexError::NotSymbolicMode)
        }
    }

    fn register(&self, buf: &mut [u8], name: &SymbolicName) {
        tracing::debug!(name = name.as_str(), len = buf.len(), "make concolic");
        self.channel.make_concolic(buf, name.as_str());
    }

    fn text(
        &self,
        text: &TextObject,
        name: &str,
        constraint: SizeConstraint,
    ) -> SymbexResult<Rc<TextObject>> {
        constraint.check_size(text.len())?;
        let value_var = self.names.encode(name, TypeTag::Text, FIELD_VALUE)?;
        let size_var = if constraint.tracks_size() {
            Some(self.names.encode(name, TypeTag::Size, FIELD_SIZE)?)
        } else {
            None
        };

        let mut scratch = ScratchBuffer::from_code_units(text.code_units())?;
        self.register(scratch.as_mut_bytes(), &value_var);
        let mut result = Rc::new(scratch.to_text()?);
        drop(scratch);

        // The size word registered must be the one inside the returned value.
        if let Some(size_var) = size_var {
            let obj = Rc::get_mut(&mut result).ok_or_else(|| {
                SymbexError::ConstructionFailure("new text is already shared".to_string())
            })?;
            self.register(word_bytes_mut(obj.size_word_mut()), &size_var);
            constraint.constrain_size(self.channel, size_var.as_str(), result.len());
        }
        Ok(result)
    }

    fn list(
        &self,
        list: &Shared<ListObject>,
        name: &str,
        constraint: SizeConstraint,
    ) -> SymbexResult<Shared<ListObject>> {
        {
            let mut obj = list
                .try_borrow_mut()
                .map_err(|_| SymbexError::InvalidTarget("list is borrowed".to_string()))?;
            constraint.check_size(obj.len())?;

            if constraint.tracks_size() {
                let size_var = self.names.encode(name, TypeTag::Size, FIELD_SIZE)?;
                self.register(word_bytes_mut(obj.size_word_mut()), &size_var);
                constraint.constrain_size(self.channel, size_var.as_str(), obj.len());
            }
        }
        Ok(Rc::clone(list))
    }

    fn mapping(
        &self,
        map: &Shared<MapObject>,
        name: &str,
        constraint: SizeConstraint,
    ) -> SymbexResult<Shared<MapObject>> {
        warn_ignored_bounds("mapping", name, constraint);
        {
            let mut obj = map
                .try_borrow_mut()
                .map_err(|_| SymbexError::InvalidTarget("mapping is borrowed".to_string()))?;
            let size_var = self.names.encode(name, TypeTag::Size, FIELD_SIZE)?;
            self.register(word_bytes_mut(obj.size_word_mut()), &size_var);
            size::constrain_count(self.channel, size_var.as_str(), obj.len(), self.max_symbolic_size);
        }
        Ok(Rc::clone(map))
    }

    fn tuple(
        &self,
        tuple: &Shared<TupleObject>,
        name: &str,
        constraint: SizeConstraint,
    ) -> SymbexResult<Shared<TupleObject>> {
        warn_ignored_bounds("tuple", name, constraint);
        {
            let mut obj = tuple
                .try_borrow_mut()
                .map_err(|_| SymbexError::InvalidTarget("tuple is borrowed".to_string()))?;
            let size_var = self.names.encode(name, TypeTag::Size, FIELD_SIZE)?;
            self.register(word_bytes_mut(obj.size_word_mut()), &size_var);
            size::constrain_count(self.channel, size_var.as_str(), obj.len(), self.max_symbolic_size);
        }
        Ok(Rc::clone(tuple))
    }
}

impl std::fmt::Debug for ValueMarshaler<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueMarshaler")
            .field("names", &self.names)
            .field("max_symbolic_size", &self.max_symbolic_size)
            .finish()
    }
}

// Mapping and tuple counts are only bounded engine-side.
// TODO: validate mapping/tuple bounds like lists once that policy is confirmed.
fn warn_ignored_bounds(kind: &str, name: &str, constraint: SizeConstraint) {
    if constraint != SizeConstraint::fixed() {
        tracing::warn!(
            kind,
            name,
            max_size = constraint.max_size,
            min_size = constraint.min_size,
            "explicit size bounds are not applied to this container kind"
        );
    }
}

// ============================================================================
// Scratch memory
// ============================================================================

#[cfg(test)]
thread_local! {
    static LIVE_SCRATCH: std::cell::Cell<usize> = const { std::cell::Cell::new(0) };
}

/// Number of scratch buffers alive on this thread
#[cfg(test)]
pub(crate) fn live_scratch() -> usize {
    LIVE_SCRATCH.with(|c| c.get())
}

/// Heap buffer holding UCS-4 code units while they are registered.
///
/// Released by `Drop` on every exit path.
struct ScratchBuffer {
    bytes: Vec<u8>,
}

impl ScratchBuffer {
    fn try_alloc(len: usize) -> SymbexResult<Self> {
        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(len)
            .map_err(|_| SymbexError::AllocationFailure { bytes: len })?;
        bytes.resize(len, 0);
        #[cfg(test)]
        LIVE_SCRATCH.with(|c| c.set(c.get() + 1));
        Ok(Self { bytes })
    }

    fn from_code_units<I>(units: I) -> SymbexResult<Self>
    where
        I: Iterator<Item = u32> + Clone,
    {
        let len = units
            .clone()
            .count()
            .checked_mul(CODE_UNIT_SIZE)
            .ok_or(SymbexError::AllocationFailure { bytes: usize::MAX })?;
        let mut scratch = Self::try_alloc(len)?;
        for (chunk, unit) in scratch.bytes.chunks_exact_mut(CODE_UNIT_SIZE).zip(units) {
            chunk.copy_from_slice(&unit.to_ne_bytes());
        }
        Ok(scratch)
    }

    fn as_mut_bytes(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    fn to_text(&self) -> SymbexResult<TextObject> {
        let units: Vec<u32> = self
            .bytes
            .chunks_exact(CODE_UNIT_SIZE)
            .map(|c| u32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        TextObject::from_code_units(&units).ok_or_else(|| {
            SymbexError::ConstructionFailure("scratch buffer is not valid text".to_string())
        })
    }
}

impl Drop for ScratchBuffer {
    fn drop(&mut self) {
        #[cfg(test)]
        LIVE_SCRATCH.with(|c| c.set(c.get() - 1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use symbex_sdk::{Recorded, RecordingChannel};

    fn marshal<'a>(channel: &'a dyn GuestChannel, config: &SymbexConfig) -> ValueMarshaler<'a> {
        ValueMarshaler::new(channel, config)
    }

    /// Engine stand-in that overwrites registered buffers with 0xFF
    /// and remembers how many scratch buffers were alive at the time.
    struct CorruptingChannel {
        live_at_register: Cell<usize>,
    }

    impl GuestChannel for CorruptingChannel {
        fn engine_active(&self) -> bool {
            true
        }

        fn invoke_plugin(&self, _plugin: &str, _payload: &[u8]) -> i32 {
            0
        }

        fn make_concolic(&self, buf: &mut [u8], _name: &str) {
            self.live_at_register.set(live_scratch());
            buf.fill(0xFF);
        }

        fn assume(&self, _assumption: &Assumption) {}
    }

    #[test]
    fn test_int_in_range_emits_two_assumptions() {
        let channel = RecordingChannel::new();
        let config = SymbexConfig::default();
        let m = marshal(&channel, &config);

        let out = m.make_symbolic(&HostValue::Int(5), "req", 10, 0).unwrap();
        assert_eq!(out, HostValue::Int(5));
        assert_eq!(channel.concolic_names(), vec!["req.i#value".to_string()]);

        let a = channel.assumptions();
        assert_eq!(a.len(), 2);
        assert_eq!((a[0].comparison, a[0].bound), (Comparison::Ge, 0));
        assert_eq!((a[1].comparison, a[1].bound), (Comparison::Le, 10));
    }

    #[test]
    fn test_int_out_of_range_touches_nothing() {
        let channel = RecordingChannel::new();
        let config = SymbexConfig::default();
        let err = marshal(&channel, &config)
            .make_symbolic(&HostValue::Int(11), "req", 10, 0)
            .unwrap_err();
        assert!(matches!(err, SymbexError::ConstraintViolation(_)));
        assert_eq!(channel.call_count(), 0);
    }

    #[test]
    fn test_int_without_range_is_only_registered() {
        let channel = RecordingChannel::new();
        let config = SymbexConfig::default();
        let v = marshal(&channel, &config)
            .make_symbolic_int(-42, "n", ValueRange::unbounded())
            .unwrap();
        assert_eq!(v, -42);
        assert_eq!(channel.call_count(), 1);
        assert_eq!(
            channel.events()[0],
            Recorded::MakeConcolic {
                name: "n.i#value".to_string(),
                bytes: (-42i64).to_ne_bytes().to_vec(),
            }
        );
    }

    #[test]
    fn test_none_is_invalid_target() {
        let channel = RecordingChannel::new();
        let config = SymbexConfig::default();
        let err = marshal(&channel, &config)
            .make_symbolic(&HostValue::None, "x", -1, 0)
            .unwrap_err();
        assert!(matches!(err, SymbexError::InvalidTarget(_)));
        assert_eq!(channel.call_count(), 0);
    }

    #[test]
    fn test_unsupported_kinds() {
        let channel = RecordingChannel::new();
        let config = SymbexConfig::default();
        let m = marshal(&channel, &config);
        for value in [HostValue::Float(1.5), HostValue::Bool(true)] {
            let err = m.make_symbolic(&value, "x", -1, 0).unwrap_err();
            assert!(matches!(err, SymbexError::UnsupportedType { .. }));
        }
    }

    #[test]
    fn test_text_builds_new_value() {
        let channel = RecordingChannel::new();
        let config = SymbexConfig::default();
        let input = HostValue::text("hello");

        let out = marshal(&channel, &config)
            .make_symbolic(&input, "greeting", 10, 2)
            .unwrap();

        assert_eq!(out.as_text().unwrap().as_str(), "hello");
        assert!(!out.same_storage(&input));
        assert_eq!(input.share_count(), Some(1));
        assert_eq!(
            channel.concolic_names(),
            vec!["greeting.u#value".to_string(), "greeting.l#size".to_string()]
        );
        assert_eq!(channel.assumptions().len(), 2);
        assert_eq!(live_scratch(), 0);
    }

    #[test]
    fn test_text_scratch_holds_code_units() {
        let channel = RecordingChannel::new();
        let config = SymbexConfig::default();
        marshal(&channel, &config)
            .make_symbolic(&HostValue::text("é"), "t", -1, 0)
            .unwrap();

        let expected = 0xE9u32.to_ne_bytes().to_vec();
        assert_eq!(
            channel.events(),
            vec![Recorded::MakeConcolic {
                name: "t.u#value".to_string(),
                bytes: expected,
            }]
        );
    }

    /// Engine stand-in that remembers where each named buffer lives
    struct AddressChannel {
        registered: std::cell::RefCell<Vec<(String, usize)>>,
    }

    impl GuestChannel for AddressChannel {
        fn engine_active(&self) -> bool {
            true
        }

        fn invoke_plugin(&self, _plugin: &str, _payload: &[u8]) -> i32 {
            0
        }

        fn make_concolic(&self, buf: &mut [u8], name: &str) {
            self.registered
                .borrow_mut()
                .push((name.to_string(), buf.as_ptr() as usize));
        }

        fn assume(&self, _assumption: &Assumption) {}
    }

    #[test]
    fn test_text_size_word_registered_on_returned_value() {
        let channel = AddressChannel {
            registered: std::cell::RefCell::new(Vec::new()),
        };
        let config = SymbexConfig::default();
        let out = marshal(&channel, &config)
            .make_symbolic(&HostValue::text("hello"), "greeting", 10, 2)
            .unwrap();

        let registered = channel
            .registered
            .borrow()
            .iter()
            .find(|(name, _)| name == "greeting.l#size")
            .map(|(_, addr)| *addr)
            .unwrap();

        let mut text = match out {
            HostValue::Text(text) => text,
            other => panic!("expected text, got {:?}", other),
        };
        let returned = Rc::get_mut(&mut text).unwrap().size_word_mut() as *mut usize as usize;
        assert_eq!(registered, returned);
    }

    #[test]
    fn test_text_scratch_sized_from_contents() {
        let scratch = ScratchBuffer::from_code_units("aé😀".chars().map(u32::from)).unwrap();
        assert_eq!(scratch.bytes.len(), 3 * CODE_UNIT_SIZE);
        assert_eq!(scratch.to_text().unwrap().as_str(), "aé😀");
    }

    #[test]
    fn test_text_violation_allocates_nothing() {
        let channel = RecordingChannel::new();
        let config = SymbexConfig::default();
        let err = marshal(&channel, &config)
            .make_symbolic(&HostValue::text("toolong"), "t", 3, 0)
            .unwrap_err();
        assert!(matches!(err, SymbexError::ConstraintViolation(_)));
        assert_eq!(channel.call_count(), 0);
        assert_eq!(live_scratch(), 0);
    }

    #[test]
    fn test_text_construction_failure_releases_scratch() {
        let channel = CorruptingChannel {
            live_at_register: Cell::new(0),
        };
        let config = SymbexConfig::default();
        let err = marshal(&channel, &config)
            .make_symbolic(&HostValue::text("ab"), "t", 10, 0)
            .unwrap_err();
        assert!(matches!(err, SymbexError::ConstructionFailure(_)));
        assert_eq!(channel.live_at_register.get(), 1);
        assert_eq!(live_scratch(), 0);
    }

    #[test]
    fn test_negative_min_rejected_for_sequences() {
        let channel = RecordingChannel::new();
        let config = SymbexConfig::default();
        let err = marshal(&channel, &config)
            .make_symbolic(&HostValue::list(vec![]), "l", 5, -1)
            .unwrap_err();
        assert!(matches!(err, SymbexError::ConstraintViolation(_)));
        assert_eq!(channel.call_count(), 0);
    }

    #[test]
    fn test_list_is_aliased_and_only_size_tracked() {
        let channel = RecordingChannel::new();
        let config = SymbexConfig::default();
        let input = HostValue::list(vec![HostValue::Int(1), HostValue::Int(2)]);

        let out = marshal(&channel, &config)
            .make_symbolic(&input, "items", 4, 1)
            .unwrap();

        assert!(out.same_storage(&input));
        assert_eq!(input.share_count(), Some(2));
        assert_eq!(channel.concolic_names(), vec!["items.l#size".to_string()]);
        match &channel.events()[0] {
            Recorded::MakeConcolic { bytes, .. } => {
                assert_eq!(bytes.len(), std::mem::size_of::<usize>());
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_list_fixed_size_registers_nothing() {
        let channel = RecordingChannel::new();
        let config = SymbexConfig::default();
        let input = HostValue::list(vec![]);
        let out = marshal(&channel, &config)
            .make_symbolic(&input, "items", -1, 0)
            .unwrap();
        assert!(out.same_storage(&input));
        assert_eq!(channel.call_count(), 0);
    }

    #[test]
    fn test_borrowed_list_is_rejected() {
        let channel = RecordingChannel::new();
        let config = SymbexConfig::default();
        let input = HostValue::list(vec![]);
        let HostValue::List(inner) = &input else {
            unreachable!()
        };
        let _guard = inner.borrow();
        let err = marshal(&channel, &config)
            .make_symbolic(&input, "items", 4, 0)
            .unwrap_err();
        assert!(matches!(err, SymbexError::InvalidTarget(_)));
    }

    #[test]
    fn test_mapping_skips_local_validation() {
        let channel = RecordingChannel::new();
        let config = SymbexConfig::default();
        let input = HostValue::mapping(vec![
            (HostValue::text("a"), HostValue::Int(1)),
            (HostValue::text("b"), HostValue::Int(2)),
        ]);

        // Bounds that would reject a list of the same size
        let out = marshal(&channel, &config)
            .make_symbolic(&input, "m", 1, 0)
            .unwrap();

        assert!(out.same_storage(&input));
        let a = channel.assumptions();
        assert_eq!(a.len(), 2);
        assert_eq!((a[0].comparison, a[0].bound), (Comparison::Ge, 0));
        assert_eq!((a[1].comparison, a[1].bound), (Comparison::Lt, 1024));
    }

    #[test]
    fn test_tuple_uses_configured_limit() {
        let channel = RecordingChannel::new();
        let config = SymbexConfig {
            max_symbolic_size: 16,
            ..SymbexConfig::default()
        };
        let input = HostValue::tuple(vec![HostValue::Int(1)]);
        let out = marshal(&channel, &config)
            .make_symbolic(&input, "t", -1, 0)
            .unwrap();
        assert!(out.same_storage(&input));
        assert_eq!(channel.concolic_names(), vec!["t.l#size".to_string()]);
        assert_eq!(channel.assumptions()[1].bound, 16);
    }

    #[test]
    fn test_inactive_engine_makes_no_calls() {
        let channel = RecordingChannel::inactive();
        let config = SymbexConfig::default();
        let m = marshal(&channel, &config);
        let values = [
            HostValue::Int(1),
            HostValue::None,
            HostValue::text("x"),
            HostValue::list(vec![]),
            HostValue::mapping(vec![]),
            HostValue::tuple(vec![]),
        ];
        for value in &values {
            assert_eq!(
                m.make_symbolic(value, "x", 10, 0).unwrap_err(),
                SymbexError::NotSymbolicMode
            );
        }
        assert_eq!(m.assume_ascii(&HostValue::text("x")), Err(SymbexError::NotSymbolicMode));
        assert_eq!(channel.call_count(), 0);
    }

    #[test]
    fn test_overlong_name_rejected_before_side_effects() {
        let channel = RecordingChannel::new();
        let config = SymbexConfig {
            max_name_len: 8,
            ..SymbexConfig::default()
        };
        let err = marshal(&channel, &config)
            .make_symbolic(&HostValue::text("abc"), "abcdefgh", 10, 0)
            .unwrap_err();
        assert!(matches!(err, SymbexError::InvalidName(_)));
        assert_eq!(channel.call_count(), 0);
        assert_eq!(live_scratch(), 0);
    }

    #[test]
    fn test_assume_ascii() {
        let channel = RecordingChannel::new();
        let config = SymbexConfig::default();
        let m = marshal(&channel, &config);
        m.assume_ascii(&HostValue::text("ok")).unwrap();
        let a = channel.assumptions();
        assert_eq!(a.len(), 2);
        assert!(a.iter().all(|x| x.comparison == Comparison::Le && x.bound == 0x7f));

        assert!(matches!(
            m.assume_ascii(&HostValue::Int(1)),
            Err(SymbexError::UnsupportedType { got: "int" })
        ));
    }
}
