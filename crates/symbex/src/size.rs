//! Size and value-range constraints
//!
//! Validation and emission are split: `check_*` never touches the engine,
//! and `constrain_*` is only called after a check has passed.
//!
//! Container size semantics, keyed on `max_size`:
//!
//! ```text
//! max_size <  0   fixed size, nothing checked or assumed
//! max_size == 0   lower bound only: size >= min_size
//! max_size >  0   both bounds: min_size <= size <= max_size
//! ```

use symbex_sdk::{Assumption, Comparison, GuestChannel, SymbexError, SymbexResult};

/// How a [`SizeConstraint`] bounds a container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeMode {
    /// Size is not constrained
    Fixed,
    /// Only `size >= min_size`
    AtLeast,
    /// `min_size <= size <= max_size`
    Between,
}

/// Requested bounds on a container's length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeConstraint {
    /// Upper bound (sign selects the mode)
    pub max_size: i64,
    /// Lower bound, never negative
    pub min_size: i64,
}

impl SizeConstraint {
    /// Build a constraint, rejecting a negative lower bound
    pub fn new(max_size: i64, min_size: i64) -> SymbexResult<Self> {
        if min_size < 0 {
            return Err(SymbexError::ConstraintViolation(
                "minimum size cannot be negative".to_string(),
            ));
        }
        Ok(Self { max_size, min_size })
    }

    /// Constraint that leaves the size fixed
    pub const fn fixed() -> Self {
        Self {
            max_size: -1,
            min_size: 0,
        }
    }

    /// Mode selected by `max_size`
    pub const fn mode(&self) -> SizeMode {
        if self.max_size < 0 {
            SizeMode::Fixed
        } else if self.max_size == 0 {
            SizeMode::AtLeast
        } else {
            SizeMode::Between
        }
    }

    /// Whether the size becomes symbolic under this constraint
    pub const fn tracks_size(&self) -> bool {
        self.max_size >= 0
    }

    /// Check a concrete size against the bounds. No side effects.
    pub fn check_size(&self, size: usize) -> SymbexResult<()> {
        let size = size_as_i64(size);
        let ok = match self.mode() {
            SizeMode::Fixed => true,
            SizeMode::AtLeast => size >= self.min_size,
            SizeMode::Between => size >= self.min_size && size <= self.max_size,
        };
        if ok {
            Ok(())
        } else {
            Err(SymbexError::ConstraintViolation(format!(
                "size {} outside [{}, {}]",
                size,
                self.min_size,
                if self.max_size > 0 {
                    self.max_size.to_string()
                } else {
                    "inf".to_string()
                }
            )))
        }
    }

    /// Emit the size assumptions for `subject`.
    ///
    /// The upper bound is only emitted when `max_size > 0`; the lower bound
    /// is always emitted, including the trivial `size >= 0`.
    pub fn constrain_size(&self, channel: &dyn GuestChannel, subject: &str, size: usize) {
        let size = size_as_i64(size);
        if self.max_size > 0 {
            emit(channel, Assumption::new(subject, Comparison::Le, size, self.max_size));
        }
        emit(channel, Assumption::new(subject, Comparison::Ge, size, self.min_size));
    }
}

/// Requested bounds on an integer's value.
///
/// A range is only meaningful when `max >= min`; otherwise the integer is
/// left unconstrained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueRange {
    /// Inclusive upper bound
    pub max: i64,
    /// Inclusive lower bound
    pub min: i64,
}

impl ValueRange {
    /// Build a range
    pub const fn new(max: i64, min: i64) -> Self {
        Self { max, min }
    }

    /// Range that constrains nothing
    pub const fn unbounded() -> Self {
        Self { max: -1, min: 0 }
    }

    /// Whether the bounds form a range
    pub const fn is_valid(&self) -> bool {
        self.max >= self.min
    }

    /// Whether `value` lies in the range
    pub const fn contains(&self, value: i64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Check a concrete value. No side effects.
    pub fn check_value(&self, value: i64) -> SymbexResult<()> {
        if self.is_valid() && !self.contains(value) {
            return Err(SymbexError::ConstraintViolation(format!(
                "value {} outside [{}, {}]",
                value, self.min, self.max
            )));
        }
        Ok(())
    }

    /// Emit `value >= min` and `value <= max` when the range is valid
    pub fn constrain_value(&self, channel: &dyn GuestChannel, subject: &str, value: i64) {
        if self.is_valid() {
            emit(channel, Assumption::new(subject, Comparison::Ge, value, self.min));
            emit(channel, Assumption::new(subject, Comparison::Le, value, self.max));
        }
    }
}

/// Emit `0 <= count < limit` for an unvalidated container count
pub(crate) fn constrain_count(channel: &dyn GuestChannel, subject: &str, count: usize, limit: usize) {
    let count = size_as_i64(count);
    emit(channel, Assumption::new(subject, Comparison::Ge, count, 0));
    emit(channel, Assumption::new(subject, Comparison::Lt, count, size_as_i64(limit)));
}

pub(crate) fn emit(channel: &dyn GuestChannel, assumption: Assumption) {
    tracing::debug!(%assumption, "assume");
    channel.assume(&assumption);
}

fn size_as_i64(size: usize) -> i64 {
    i64::try_from(size).unwrap_or(i64::MAX)
}
