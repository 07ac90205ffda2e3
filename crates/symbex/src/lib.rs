//! Symbex - guest-side bridge to a concolic execution engine
//!
//! Marshals host values into symbolic engine memory and drives the session
//! protocol that brackets an exploration run.
//!
//! # Example
//!
//! ```ignore
//! use symbex::{SessionController, SymbexConfig, ValueMarshaler};
//! use symbex_sdk::HostValue;
//!
//! let config = SymbexConfig::default();
//! let session = SessionController::new(&channel, &config);
//! session.start(true, 60, false);
//!
//! let marshaler = ValueMarshaler::new(&channel, &config);
//! let name = marshaler.make_symbolic(&HostValue::text("alice"), "user", 16, 1)?;
//! let age = marshaler.make_symbolic(&HostValue::Int(30), "age", 120, 0)?;
//!
//! // ... run the code under test with `name` and `age` ...
//!
//! session.end(false);
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod harness;
pub mod marshal;
pub mod module;
pub mod naming;
pub mod session;
pub mod size;

pub use config::{ConfigError, SessionDefaults, SymbexConfig};
pub use harness::{replay, run_symbolic, Assignment, RunOutcome, SymbolicTest, TestInputs};
pub use marshal::ValueMarshaler;
pub use module::register_symbex;
pub use naming::{NameEncoder, SymbolicName, TypeTag, FIELD_SIZE, FIELD_VALUE};
pub use session::{
    ConcolicCommand, ConcolicStatus, SessionController, SessionMessage, SESSION_MESSAGE_SIZE,
};
pub use size::{SizeConstraint, SizeMode, ValueRange};
