//! GuestChannel trait - abstract execution-engine operations
//!
//! Defines the interface the guest side needs from the symbolic execution
//! engine. The marshaler and session controller program against this trait
//! and never reach for process-wide engine state directly, so a recording
//! double can stand in for the engine.

use std::fmt;

/// Comparison carried by an [`Assumption`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparison {
    /// `observed >= bound`
    Ge,
    /// `observed <= bound`
    Le,
    /// `observed < bound`
    Lt,
}

impl Comparison {
    /// Operator text
    pub const fn symbol(self) -> &'static str {
        match self {
            Comparison::Ge => ">=",
            Comparison::Le => "<=",
            Comparison::Lt => "<",
        }
    }
}

/// A path constraint over one symbolic variable.
///
/// `observed` is the concrete value read from the tracked memory at the time
/// the assumption is made; the engine evaluates the comparison over the
/// symbolic expression behind it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Assumption {
    /// Symbolic variable name the constraint applies to
    pub subject: String,
    /// Comparison operator
    pub comparison: Comparison,
    /// Concrete value of the tracked memory
    pub observed: i64,
    /// Right-hand side constant
    pub bound: i64,
}

impl Assumption {
    /// Build an assumption
    pub fn new(subject: impl Into<String>, comparison: Comparison, observed: i64, bound: i64) -> Self {
        Self {
            subject: subject.into(),
            comparison,
            observed,
            bound,
        }
    }

    /// Evaluate against the concrete value
    pub fn holds(&self) -> bool {
        match self.comparison {
            Comparison::Ge => self.observed >= self.bound,
            Comparison::Le => self.observed <= self.bound,
            Comparison::Lt => self.observed < self.bound,
        }
    }
}

impl fmt::Display for Assumption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.subject, self.comparison.symbol(), self.bound)
    }
}

/// Channel to the execution engine.
///
/// Every method is a synchronous round trip. The engine's symbolic-variable
/// table and path-constraint set are append-only from the guest's point of
/// view: nothing here removes a variable or retracts a constraint.
pub trait GuestChannel {
    /// Whether the engine is currently tracking symbolic data
    fn engine_active(&self) -> bool;

    /// Send a raw request to an engine plugin and return its status code
    fn invoke_plugin(&self, plugin: &str, payload: &[u8]) -> i32;

    /// Register `buf` as a concolic variable named `name`.
    ///
    /// The current contents are preserved as the concrete value.
    fn make_concolic(&self, buf: &mut [u8], name: &str);

    /// Narrow the current path constraints
    fn assume(&self, assumption: &Assumption);
}

/// Status reported by [`DetachedChannel`] for every plugin call
pub const DETACHED_STATUS: i32 = -1;

/// Channel for running without an engine.
///
/// Reports the engine as inactive and drops every request. Concrete replay
/// uses it so that no input can become symbolic by accident.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetachedChannel;

impl GuestChannel for DetachedChannel {
    fn engine_active(&self) -> bool {
        false
    }

    fn invoke_plugin(&self, _plugin: &str, _payload: &[u8]) -> i32 {
        DETACHED_STATUS
    }

    fn make_concolic(&self, _buf: &mut [u8], _name: &str) {}

    fn assume(&self, _assumption: &Assumption) {}
}
