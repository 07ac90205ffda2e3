//! Host entry points
//!
//! Registers the bridge's operations by name (e.g. "symbex.symint") into an
//! [`EntryRegistry`]. Host programs call these with positional arguments;
//! omitted or `None` bounds fall back to "no constraint".

use std::sync::Arc;

use symbex_sdk::{CallResult, EntryRegistry, GuestChannel, HostValue, SymbexError, SymbexResult};

use crate::config::SymbexConfig;
use crate::marshal::ValueMarshaler;
use crate::session::SessionController;
use crate::size::ValueRange;

/// Upper bound used when the caller gives none
const DEFAULT_MAX: i64 = -1;

/// Lower bound used when the caller gives none
const DEFAULT_MIN: i64 = 0;

/// Register all symbex entry points into the given registry.
///
/// After calling this, the registry contains:
/// - `symbex.symint(value, name[, max, min])`
/// - `symbex.symsequence(value, name[, max, min])`
/// - `symbex.assumeascii(text)`
/// - `symbex.startconcolic([max_time[, stop_on_error[, use_random_select]]])`
/// - `symbex.endconcolic([is_error_path])`
pub fn register_symbex(registry: &mut EntryRegistry, config: SymbexConfig) {
    let config = Arc::new(config);

    let cfg = Arc::clone(&config);
    registry.register("symbex.symint", move |ch, args| CallResult::from(symint(ch, &cfg, args)));

    let cfg = Arc::clone(&config);
    registry.register("symbex.symsequence", move |ch, args| {
        CallResult::from(symsequence(ch, &cfg, args))
    });

    let cfg = Arc::clone(&config);
    registry.register("symbex.assumeascii", move |ch, args| {
        CallResult::from(assume_ascii(ch, &cfg, args))
    });

    let cfg = Arc::clone(&config);
    registry.register("symbex.startconcolic", move |ch, args| {
        CallResult::from(start_concolic(ch, &cfg, args))
    });

    let cfg = config;
    registry.register("symbex.endconcolic", move |ch, args| {
        CallResult::from(end_concolic(ch, &cfg, args))
    });
}

fn symint(ch: &dyn GuestChannel, cfg: &SymbexConfig, args: &[HostValue]) -> SymbexResult<HostValue> {
    let value = int_arg(args, 0, "value")?.ok_or_else(|| missing("value"))?;
    let name = name_arg(args, 1)?;
    let range = ValueRange::new(
        int_arg(args, 2, "max_value")?.unwrap_or(DEFAULT_MAX),
        int_arg(args, 3, "min_value")?.unwrap_or(DEFAULT_MIN),
    );
    ValueMarshaler::new(ch, cfg)
        .make_symbolic_int(value, &name, range)
        .map(HostValue::Int)
}

fn symsequence(ch: &dyn GuestChannel, cfg: &SymbexConfig, args: &[HostValue]) -> SymbexResult<HostValue> {
    let value = args.first().ok_or_else(|| missing("value"))?;
    let name = name_arg(args, 1)?;
    let max_size = int_arg(args, 2, "max_size")?.unwrap_or(DEFAULT_MAX);
    let min_size = int_arg(args, 3, "min_size")?.unwrap_or(DEFAULT_MIN);
    ValueMarshaler::new(ch, cfg).make_symbolic_sequence(value, &name, max_size, min_size)
}

fn assume_ascii(ch: &dyn GuestChannel, cfg: &SymbexConfig, args: &[HostValue]) -> SymbexResult<HostValue> {
    let value = args.first().ok_or_else(|| missing("value"))?;
    ValueMarshaler::new(ch, cfg).assume_ascii(value)?;
    Ok(HostValue::None)
}

fn start_concolic(ch: &dyn GuestChannel, cfg: &SymbexConfig, args: &[HostValue]) -> SymbexResult<HostValue> {
    let max_time = match int_arg(args, 0, "max_time")? {
        Some(t) => u32::try_from(t)
            .map_err(|_| SymbexError::ArgumentError(format!("max_time {} out of range", t)))?,
        None => cfg.session.max_time,
    };
    let stop_on_error = bool_arg(args, 1, "stop_on_error")?.unwrap_or(cfg.session.stop_on_error);
    let use_random_select =
        bool_arg(args, 2, "use_random_select")?.unwrap_or(cfg.session.use_random_select);
    let status = SessionController::new(ch, cfg).start(stop_on_error, max_time, use_random_select);
    Ok(HostValue::Int(i64::from(status)))
}

fn end_concolic(ch: &dyn GuestChannel, cfg: &SymbexConfig, args: &[HostValue]) -> SymbexResult<HostValue> {
    let is_error_path = bool_arg(args, 0, "is_error_path")?.unwrap_or(false);
    let status = SessionController::new(ch, cfg).end(is_error_path);
    Ok(HostValue::Int(i64::from(status)))
}

fn missing(what: &str) -> SymbexError {
    SymbexError::ArgumentError(format!("missing argument '{}'", what))
}

/// Optional integer argument; absent and `None` both mean "not given"
fn int_arg(args: &[HostValue], index: usize, what: &str) -> SymbexResult<Option<i64>> {
    match args.get(index) {
        None | Some(HostValue::None) => Ok(None),
        Some(HostValue::Int(i)) => Ok(Some(*i)),
        Some(other) => Err(SymbexError::ArgumentError(format!(
            "'{}' must be int, got {}",
            what,
            other.type_name()
        ))),
    }
}

/// Optional boolean argument; integers are accepted as truth values
fn bool_arg(args: &[HostValue], index: usize, what: &str) -> SymbexResult<Option<bool>> {
    match args.get(index) {
        None | Some(HostValue::None) => Ok(None),
        Some(HostValue::Bool(b)) => Ok(Some(*b)),
        Some(HostValue::Int(i)) => Ok(Some(*i != 0)),
        Some(other) => Err(SymbexError::ArgumentError(format!(
            "'{}' must be bool, got {}",
            what,
            other.type_name()
        ))),
    }
}

fn name_arg(args: &[HostValue], index: usize) -> SymbexResult<String> {
    match args.get(index) {
        Some(HostValue::Text(t)) => Ok(t.as_str().to_string()),
        Some(other) => Err(SymbexError::ArgumentError(format!(
            "'name' must be text, got {}",
            other.type_name()
        ))),
        None => Err(missing("name")),
    }
}
