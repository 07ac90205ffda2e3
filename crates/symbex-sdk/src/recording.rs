//! In-process channel that records every request
//!
//! The test double for the marshaler and session controller. Requests are
//! logged in call order.

use parking_lot::Mutex;

use crate::channel::{Assumption, GuestChannel};

/// One request observed by a [`RecordingChannel`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recorded {
    /// `invoke_plugin` call
    Invoke {
        /// Target plugin
        plugin: String,
        /// Raw request bytes
        payload: Vec<u8>,
    },
    /// `make_concolic` call
    MakeConcolic {
        /// Symbolic variable name
        name: String,
        /// Buffer contents at registration time
        bytes: Vec<u8>,
    },
    /// `assume` call
    Assume(Assumption),
}

/// Channel that records requests instead of forwarding them.
#[derive(Debug)]
pub struct RecordingChannel {
    active: Mutex<bool>,
    status: Mutex<i32>,
    log: Mutex<Vec<Recorded>>,
}

impl RecordingChannel {
    /// Active channel whose plugin calls report status 0
    pub fn new() -> Self {
        Self {
            active: Mutex::new(true),
            status: Mutex::new(0),
            log: Mutex::new(Vec::new()),
        }
    }

    /// Channel reporting an inactive engine
    pub fn inactive() -> Self {
        let channel = Self::new();
        channel.set_active(false);
        channel
    }

    /// Toggle whether the engine reports itself active
    pub fn set_active(&self, active: bool) {
        *self.active.lock() = active;
    }

    /// Status returned by subsequent plugin calls
    pub fn set_status(&self, status: i32) {
        *self.status.lock() = status;
    }

    /// Snapshot of every recorded request
    pub fn events(&self) -> Vec<Recorded> {
        self.log.lock().clone()
    }

    /// Number of recorded requests
    pub fn call_count(&self) -> usize {
        self.log.lock().len()
    }

    /// Names registered through `make_concolic`, in order
    pub fn concolic_names(&self) -> Vec<String> {
        self.log
            .lock()
            .iter()
            .filter_map(|e| match e {
                Recorded::MakeConcolic { name, .. } => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    /// Assumptions emitted, in order
    pub fn assumptions(&self) -> Vec<Assumption> {
        self.log
            .lock()
            .iter()
            .filter_map(|e| match e {
                Recorded::Assume(a) => Some(a.clone()),
                _ => None,
            })
            .collect()
    }

    /// Plugin payloads sent, in order
    pub fn payloads(&self) -> Vec<Vec<u8>> {
        self.log
            .lock()
            .iter()
            .filter_map(|e| match e {
                Recorded::Invoke { payload, .. } => Some(payload.clone()),
                _ => None,
            })
            .collect()
    }

    /// Forget all recorded requests
    pub fn clear(&self) {
        self.log.lock().clear();
    }
}

impl Default for RecordingChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl GuestChannel for RecordingChannel {
    fn engine_active(&self) -> bool {
        *self.active.lock()
    }

    fn invoke_plugin(&self, plugin: &str, payload: &[u8]) -> i32 {
        tracing::trace!(plugin, len = payload.len(), "recorded plugin call");
        self.log.lock().push(Recorded::Invoke {
            plugin: plugin.to_string(),
            payload: payload.to_vec(),
        });
        *self.status.lock()
    }

    fn make_concolic(&self, buf: &mut [u8], name: &str) {
        tracing::trace!(name, len = buf.len(), "recorded concolic buffer");
        self.log.lock().push(Recorded::MakeConcolic {
            name: name.to_string(),
            bytes: buf.to_vec(),
        });
    }

    fn assume(&self, assumption: &Assumption) {
        self.log.lock().push(Recorded::Assume(assumption.clone()));
    }
}
