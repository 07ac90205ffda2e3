//! Entry-point dispatch by symbolic name
//!
//! Host programs reach the bridge through named entry points
//! (e.g. "symbex.symint"). Modules register their handlers here and the
//! host resolves names once, then calls through the returned handler.

use std::collections::HashMap;
use std::sync::Arc;

use crate::channel::GuestChannel;
use crate::error::SymbexError;
use crate::value::HostValue;

/// Result of an entry-point call
#[derive(Debug)]
pub enum CallResult {
    /// Call handled successfully, returned a value
    Value(HostValue),
    /// Call failed with an error
    Error(SymbexError),
    /// Entry point not recognized
    Unhandled,
}

impl CallResult {
    /// Successful result carrying the absence value
    #[inline]
    pub fn none() -> Self {
        Self::Value(HostValue::None)
    }

    /// Successful result carrying an integer
    #[inline]
    pub fn int(val: i64) -> Self {
        Self::Value(HostValue::Int(val))
    }

    /// Convert into a `Result`, treating `Unhandled` as an argument error
    pub fn into_result(self) -> Result<HostValue, SymbexError> {
        match self {
            Self::Value(v) => Ok(v),
            Self::Error(e) => Err(e),
            Self::Unhandled => Err(SymbexError::ArgumentError(
                "entry point not recognized".to_string(),
            )),
        }
    }
}

impl From<Result<HostValue, SymbexError>> for CallResult {
    fn from(result: Result<HostValue, SymbexError>) -> Self {
        match result {
            Ok(v) => Self::Value(v),
            Err(e) => Self::Error(e),
        }
    }
}

/// An entry-point handler
pub type EntryFn = Arc<dyn Fn(&dyn GuestChannel, &[HostValue]) -> CallResult + Send + Sync>;

/// Registry of entry points indexed by name.
pub struct EntryRegistry {
    handlers: HashMap<String, EntryFn>,
}

impl EntryRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register an entry point by name
    pub fn register(
        &mut self,
        name: &str,
        handler: impl Fn(&dyn GuestChannel, &[HostValue]) -> CallResult + Send + Sync + 'static,
    ) {
        self.handlers.insert(name.to_string(), Arc::new(handler));
    }

    /// Get a handler by name
    pub fn get(&self, name: &str) -> Option<EntryFn> {
        self.handlers.get(name).cloned()
    }

    /// Call an entry point by name; unknown names yield `Unhandled`
    pub fn call(&self, name: &str, channel: &dyn GuestChannel, args: &[HostValue]) -> CallResult {
        match self.handlers.get(name) {
            Some(handler) => handler(channel, args),
            None => CallResult::Unhandled,
        }
    }

    /// Check if a handler is registered
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Get the number of registered handlers
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for EntryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EntryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryRegistry")
            .field("names", &self.names())
            .finish()
    }
}
