//! Symbolic test harness
//!
//! A symbolic test asks for its inputs by name through [`TestInputs`]. Under
//! [`run_symbolic`] those inputs are marshaled into symbolic memory and the
//! test body runs inside a concolic session; a returned error or a panic
//! marks the path as an error path. Under [`replay`] the inputs come from a
//! recorded assignment instead and the engine is never contacted.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};

use symbex_sdk::{DetachedChannel, GuestChannel, HostValue, SymbexError, SymbexResult};

use crate::config::SymbexConfig;
use crate::marshal::ValueMarshaler;
use crate::session::SessionController;
use crate::size::{SizeConstraint, ValueRange};

/// Concrete input values keyed by input name
pub type Assignment = HashMap<String, HostValue>;

/// A test whose inputs are explored symbolically.
pub trait SymbolicTest {
    /// Called once before the test body, outside the session
    fn set_up(&mut self) {}

    /// The test body
    fn run_test(&mut self, inputs: &mut TestInputs<'_>) -> anyhow::Result<()>;
}

/// Source of named test inputs.
pub struct TestInputs<'a> {
    marshaler: ValueMarshaler<'a>,
    replay: Option<&'a Assignment>,
}

impl<'a> TestInputs<'a> {
    /// Inputs backed by the engine, or by `replay` when given
    pub fn new(
        channel: &'a dyn GuestChannel,
        config: &SymbexConfig,
        replay: Option<&'a Assignment>,
    ) -> Self {
        Self {
            marshaler: ValueMarshaler::new(channel, config),
            replay,
        }
    }

    /// Whether inputs come from a recorded assignment
    pub fn is_replay(&self) -> bool {
        self.replay.is_some()
    }

    /// Integer input, symbolic around `default`
    pub fn get_int(&self, name: &str, default: i64, range: Option<ValueRange>) -> SymbexResult<i64> {
        if let Some(assignment) = self.replay {
            return match replayed(assignment, name) {
                None => Ok(default),
                Some(HostValue::Int(i)) => Ok(*i),
                Some(other) => Err(SymbexError::ArgumentError(format!(
                    "replayed '{}' is {}, expected int",
                    name,
                    other.type_name()
                ))),
            };
        }
        self.marshaler
            .make_symbolic_int(default, name, range.unwrap_or(ValueRange::unbounded()))
    }

    /// Text input, symbolic around `default`.
    ///
    /// With `ascii`, every code point is additionally constrained to ASCII.
    pub fn get_string(
        &self,
        name: &str,
        default: &str,
        bounds: Option<SizeConstraint>,
        ascii: bool,
    ) -> SymbexResult<HostValue> {
        if let Some(assignment) = self.replay {
            return match replayed(assignment, name) {
                None => Ok(HostValue::text(default)),
                Some(v @ HostValue::Text(_)) => Ok(v.clone()),
                Some(other) => Err(SymbexError::ArgumentError(format!(
                    "replayed '{}' is {}, expected text",
                    name,
                    other.type_name()
                ))),
            };
        }

        let bounds = bounds.unwrap_or(SizeConstraint::fixed());
        let value = self.marshaler.make_symbolic_sequence(
            &HostValue::text(default),
            name,
            bounds.max_size,
            bounds.min_size,
        )?;
        if ascii {
            self.marshaler.assume_ascii(&value)?;
        }
        Ok(value)
    }
}

fn replayed<'v>(assignment: &'v Assignment, name: &str) -> Option<&'v HostValue> {
    let value = assignment.get(name);
    if value.is_none() {
        tracing::info!(name, "key not found in assignment, using default");
    }
    value
}

/// Result of one symbolic run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    /// Whether the test body failed
    pub is_error_path: bool,
    /// Raw status of the start message
    pub start_status: i32,
    /// Raw status of the end message; `None` in interactive runs
    pub end_status: Option<i32>,
}

/// Run `test` inside a concolic session.
///
/// Interactive runs do not stop exploration on errors, report test failures
/// through the log, and leave the session open.
pub fn run_symbolic<T: SymbolicTest + ?Sized>(
    channel: &dyn GuestChannel,
    config: &SymbexConfig,
    test: &mut T,
    max_time: u32,
    interactive: bool,
) -> RunOutcome {
    test.set_up();

    let session = SessionController::new(channel, config);
    let start_status = session.start(!interactive, max_time, config.session.use_random_select);

    let mut inputs = TestInputs::new(channel, config, None);
    let result = panic::catch_unwind(AssertUnwindSafe(|| test.run_test(&mut inputs)));
    let is_error_path = match result {
        Ok(Ok(())) => false,
        Ok(Err(err)) => {
            if interactive {
                tracing::error!(error = format!("{:#}", err), "symbolic test failed");
            }
            true
        }
        Err(_) => {
            if interactive {
                tracing::error!("symbolic test panicked");
            }
            true
        }
    };

    let end_status = if interactive {
        None
    } else {
        Some(session.end(is_error_path))
    };

    RunOutcome {
        is_error_path,
        start_status,
        end_status,
    }
}

/// Run `test` concretely with inputs taken from `assignment`.
pub fn replay<T: SymbolicTest + ?Sized>(
    config: &SymbexConfig,
    test: &mut T,
    assignment: &Assignment,
) -> anyhow::Result<()> {
    test.set_up();
    let mut inputs = TestInputs::new(&DetachedChannel, config, Some(assignment));
    test.run_test(&mut inputs)
}
