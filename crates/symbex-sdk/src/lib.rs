//! Symbex SDK - host value model and engine interface
//!
//! This crate provides the types shared by the guest-side bridge and the
//! host program embedding it:
//!
//! - [`HostValue`]: the closed set of host value kinds that can be marshaled
//! - [`GuestChannel`]: the single collaborator through which the execution
//!   engine is reached
//! - [`SymbexError`]: the failure taxonomy of every marshaling call
//! - [`EntryRegistry`]: name-based entry points for host programs
//! - [`DetachedChannel`]: an inert channel for runs without an engine
//! - [`RecordingChannel`]: an engine stand-in that records requests

#![warn(missing_docs)]

pub mod channel;
pub mod error;
pub mod handler;
pub mod recording;
pub mod value;

pub use channel::{Assumption, Comparison, DetachedChannel, GuestChannel, DETACHED_STATUS};
pub use error::{SymbexError, SymbexResult};
pub use handler::{CallResult, EntryFn, EntryRegistry};
pub use recording::{Recorded, RecordingChannel};
pub use value::{
    word_bytes_mut, HostValue, ListObject, MapObject, Shared, TextObject, TupleObject,
    CODE_UNIT_SIZE,
};
