//! Mailbox message storage.
//!
//! A message's payload lives inline in a fixed-capacity array, so the
//! buffer pool's footprint is known at compile time and queuing a message
//! never allocates.

/// Maximum number of payload bytes in a single message.
pub const MAX_MESSAGE_LENGTH: usize = 64;

/// One message's storage: a length plus a fixed-capacity byte array.
#[derive(Clone, Copy)]
pub struct MsgBuffer {
    len: usize,
    bytes: [u8; MAX_MESSAGE_LENGTH],
}

impl MsgBuffer {
    /// An empty buffer.
    pub const fn empty() -> Self {
        MsgBuffer {
            len: 0,
            bytes: [0u8; MAX_MESSAGE_LENGTH],
        }
    }

    /// Number of payload bytes currently stored.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if no payload is stored.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Copy `payload` in, replacing any previous contents.
    ///
    /// `payload` must not exceed [`MAX_MESSAGE_LENGTH`]; callers validate
    /// length before claiming a buffer.
    pub(crate) fn store(&mut self, payload: &[u8]) {
        debug_assert!(payload.len() <= MAX_MESSAGE_LENGTH);
        self.len = payload.len();
        self.bytes[..payload.len()].copy_from_slice(payload);
    }

    /// Copy the stored payload into `out`, returning the byte count.
    ///
    /// `out` must have room for [`len`](Self::len) bytes; callers check
    /// the stored length before dequeuing.
    pub(crate) fn load(&self, out: &mut [u8]) -> usize {
        out[..self.len].copy_from_slice(&self.bytes[..self.len]);
        self.len
    }

    /// Borrow the stored payload.
    pub fn payload(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

impl core::fmt::Debug for MsgBuffer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MsgBuffer").field("len", &self.len).finish()
    }
}
