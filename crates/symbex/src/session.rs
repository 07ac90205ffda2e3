//! Concolic session control
//!
//! Sessions are started and ended by sending a fixed-layout message to the
//! engine's session plugin. The engine reads the raw bytes, so the layout is
//! a wire contract:
//!
//! ```text
//! offset  size  field
//!      0     4  command        (ConcolicCommand, u32)
//!      4     4  max_time       (seconds, 0 = unbounded)
//!      8     1  is_error_path  (0 or 1)
//!      9     4  result_ptr
//!     13     4  result_size
//!     17        end, no padding
//! ```
//!
//! Fields are native-endian, as the engine reads them straight out of guest
//! memory. The message is 17 bytes, not the 20 of a naturally aligned
//! struct with the same fields.

use symbex_sdk::GuestChannel;

use crate::config::SymbexConfig;

/// Size of a session message on the wire.
pub const SESSION_MESSAGE_SIZE: usize = std::mem::size_of::<SessionMessage>();

const _: () = assert!(SESSION_MESSAGE_SIZE == 17);

/// Session command. Values are wire-stable and must never be renumbered.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcolicCommand {
    /// Begin exploring
    Start = 0,
    /// Terminate the current path
    End = 1,
    /// Reserved: fetch alternate solutions into a guest buffer
    EnumerateAlternates = 2,
}

impl ConcolicCommand {
    /// Decode a raw command value
    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::Start),
            1 => Some(Self::End),
            2 => Some(Self::EnumerateAlternates),
            _ => None,
        }
    }
}

/// Status codes reported by the session plugin.
///
/// The controller passes raw codes through untouched; this is for callers
/// that want to interpret them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcolicStatus {
    /// Request accepted
    Ok = 0,
    /// Result buffer too small
    TooSmall = 1,
    /// Request failed
    Error = 2,
}

impl ConcolicStatus {
    /// Decode a raw status code
    pub const fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(Self::Ok),
            1 => Some(Self::TooSmall),
            2 => Some(Self::Error),
            _ => None,
        }
    }
}

/// Session-control message as laid out on the wire.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionMessage {
    /// Raw [`ConcolicCommand`]
    pub command: u32,

    /// Exploration time budget in seconds
    pub max_time: u32,

    /// Whether the ending path is an error path
    pub is_error_path: u8,

    /// Guest address of the result buffer
    pub result_ptr: u32,

    /// Size of the result buffer in bytes
    pub result_size: u32,
}

impl SessionMessage {
    /// Start a session with a time budget
    pub const fn start(max_time: u32) -> Self {
        Self {
            command: ConcolicCommand::Start as u32,
            max_time,
            is_error_path: 0,
            result_ptr: 0,
            result_size: 0,
        }
    }

    /// End the current path
    pub const fn end(is_error_path: bool) -> Self {
        Self {
            command: ConcolicCommand::End as u32,
            max_time: 0,
            is_error_path: is_error_path as u8,
            result_ptr: 0,
            result_size: 0,
        }
    }

    /// Request alternates into a guest buffer. Message shape only: the
    /// engine side of this command is not wired up.
    pub const fn enumerate_alternates(result_ptr: u32, result_size: u32) -> Self {
        Self {
            command: ConcolicCommand::EnumerateAlternates as u32,
            max_time: 0,
            is_error_path: 0,
            result_ptr,
            result_size,
        }
    }

    /// Decoded command, if the raw value is known
    pub fn command(&self) -> Option<ConcolicCommand> {
        ConcolicCommand::from_raw(self.command)
    }

    /// Read a message from raw bytes (must be at least SESSION_MESSAGE_SIZE bytes).
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < SESSION_MESSAGE_SIZE {
            return None;
        }
        // Safety: SessionMessage is repr(C, packed) with no padding and every
        // bit pattern is a valid value.
        Some(unsafe { std::ptr::read_unaligned(bytes.as_ptr() as *const SessionMessage) })
    }

    /// Write the message to its wire form.
    pub fn to_bytes(&self) -> [u8; SESSION_MESSAGE_SIZE] {
        let mut bytes = [0u8; SESSION_MESSAGE_SIZE];
        // Safety: the buffer is exactly SESSION_MESSAGE_SIZE bytes and the
        // write is unaligned, so any address is valid for it.
        unsafe {
            std::ptr::write_unaligned(bytes.as_mut_ptr() as *mut SessionMessage, *self);
        }
        bytes
    }
}

/// Sends session-control messages through a [`GuestChannel`].
pub struct SessionController<'a> {
    channel: &'a dyn GuestChannel,
    plugin: String,
}

impl<'a> SessionController<'a> {
    /// Create a controller talking to the configured plugin
    pub fn new(channel: &'a dyn GuestChannel, config: &SymbexConfig) -> Self {
        Self {
            channel,
            plugin: config.plugin_name.clone(),
        }
    }

    /// Start a session.
    ///
    /// `stop_on_error` and `use_random_select` are accepted for callers but
    /// the message layout has no field for them; only `max_time` reaches the
    /// engine. Returns the plugin's raw status.
    pub fn start(&self, stop_on_error: bool, max_time: u32, use_random_select: bool) -> i32 {
        tracing::debug!(
            stop_on_error,
            use_random_select,
            "session policy hints are not transmitted"
        );
        self.send(&SessionMessage::start(max_time))
    }

    /// End the current path. Returns the plugin's raw status.
    pub fn end(&self, is_error_path: bool) -> i32 {
        self.send(&SessionMessage::end(is_error_path))
    }

    /// Send one message and return the plugin's raw status
    pub fn send(&self, message: &SessionMessage) -> i32 {
        let command = message.command;
        let status = self.channel.invoke_plugin(&self.plugin, &message.to_bytes());
        tracing::debug!(plugin = %self.plugin, command, status, "session message sent");
        status
    }
}

impl std::fmt::Debug for SessionController<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("plugin", &self.plugin)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use symbex_sdk::{Recorded, RecordingChannel};

    #[test]
    fn test_message_size() {
        assert_eq!(SESSION_MESSAGE_SIZE, 17);
        assert_eq!(SessionMessage::end(true).to_bytes().len(), 17);
    }

    #[test]
    fn test_field_offsets() {
        let msg = SessionMessage {
            command: 2,
            max_time: 0x0A0B_0C0D,
            is_error_path: 1,
            result_ptr: 0x1122_3344,
            result_size: 0x5566_7788,
        };
        let bytes = msg.to_bytes();
        assert_eq!(bytes[0..4], 2u32.to_ne_bytes());
        assert_eq!(bytes[4..8], 0x0A0B_0C0Du32.to_ne_bytes());
        assert_eq!(bytes[8], 1);
        assert_eq!(bytes[9..13], 0x1122_3344u32.to_ne_bytes());
        assert_eq!(bytes[13..17], 0x5566_7788u32.to_ne_bytes());
    }

    #[test]
    fn test_from_bytes() {
        let msg = SessionMessage::enumerate_alternates(0x1000, 64);
        let restored = SessionMessage::from_bytes(&msg.to_bytes()).unwrap();
        assert_eq!(restored.command(), Some(ConcolicCommand::EnumerateAlternates));
        // Copy packed fields to locals to avoid unaligned references
        let result_ptr = restored.result_ptr;
        let result_size = restored.result_size;
        assert_eq!(result_ptr, 0x1000);
        assert_eq!(result_size, 64);

        assert!(SessionMessage::from_bytes(&[0u8; 16]).is_none());
    }

    #[test]
    fn test_command_values_are_stable() {
        assert_eq!(ConcolicCommand::Start as u32, 0);
        assert_eq!(ConcolicCommand::End as u32, 1);
        assert_eq!(ConcolicCommand::EnumerateAlternates as u32, 2);
        assert_eq!(ConcolicCommand::from_raw(3), None);
    }

    #[test]
    fn test_status_decoding() {
        assert_eq!(ConcolicStatus::from_raw(0), Some(ConcolicStatus::Ok));
        assert_eq!(ConcolicStatus::from_raw(1), Some(ConcolicStatus::TooSmall));
        assert_eq!(ConcolicStatus::from_raw(2), Some(ConcolicStatus::Error));
        assert_eq!(ConcolicStatus::from_raw(-1), None);
    }

    #[test]
    fn test_status_is_passed_through() {
        let channel = RecordingChannel::new();
        channel.set_status(7);
        let config = SymbexConfig::default();
        let session = SessionController::new(&channel, &config);
        assert_eq!(session.start(true, 30, false), 7);
        assert_eq!(session.end(false), 7);
    }

    #[test]
    fn test_start_goes_to_configured_plugin() {
        let channel = RecordingChannel::new();
        let config = SymbexConfig {
            plugin_name: "Custom".to_string(),
            ..SymbexConfig::default()
        };
        SessionController::new(&channel, &config).start(false, 5, true);
        match &channel.events()[0] {
            Recorded::Invoke { plugin, payload } => {
                assert_eq!(plugin, "Custom");
                assert_eq!(payload.len(), SESSION_MESSAGE_SIZE);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
}
