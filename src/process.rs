//! Process identity.
//!
//! Process management lives outside this crate. Callers pass their [`Pid`]
//! into every operation, the same way a syscall layer feeds task identity
//! into kernel IPC entry points. The one obligation the process layer
//! carries is to call [`close_all_by_pid`](crate::table::close_all_by_pid)
//! exactly once per terminating process, after that process can issue no
//! further mailbox calls and before its process-table slot is reused.

/// Identifier of a process, assigned by the external process layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pid(pub u64);

impl Pid {
    /// Get the raw u64 value.
    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// Create a Pid from a raw u64.
    pub fn from_u64(raw: u64) -> Self {
        Pid(raw)
    }
}

impl core::fmt::Display for Pid {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}
