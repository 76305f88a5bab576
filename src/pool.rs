//! Global message buffer pool.
//!
//! A fixed arena of [`MsgBuffer`]s shared by every mailbox. Claim and
//! release go through a lock-free free list, so they never block and never
//! involve any mailbox's monitor lock. After a claim, the buffer is owned
//! by exactly one pending-queue entry of exactly one mailbox until it is
//! released; the sender that claimed it and the receiver that dequeues it
//! are the only actors that ever touch its payload.
//!
//! Claim/release and the payload copies are crate-internal; the mailbox
//! operations validate message lengths before any copy. The public
//! surface of the pool is introspection only.

use crate::mailbox::MAX_BUFFERS_PER_MAILBOX;
use crate::message::MsgBuffer;
use crate::table::NUM_MAILBOXES;
use core::sync::atomic::{AtomicBool, Ordering};
use crossbeam_queue::ArrayQueue;
use spin::Mutex as SpinMutex;

/// Total number of message buffers shared across all mailboxes.
pub const NUM_MESSAGE_BUFFERS: usize = 256;

// Every mailbox can sit at its queue bound without exhausting the pool.
static_assertions::const_assert!(NUM_MESSAGE_BUFFERS >= NUM_MAILBOXES * MAX_BUFFERS_PER_MAILBOX);

/// Reference to one claimed buffer in the pool arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufRef(usize);

impl BufRef {
    /// Arena index of the referenced buffer.
    pub fn index(self) -> usize {
        self.0
    }
}

/// The fixed arena of message buffers plus its free list.
pub struct BufferPool {
    /// Payload storage. Each slot is only ever touched by its current
    /// owner; the per-slot lock is uncontended by construction.
    slots: Box<[SpinMutex<MsgBuffer>]>,
    /// Indices of free slots. Lock-free, so claim/release never block.
    free: ArrayQueue<usize>,
    /// Claim state per slot, for double-claim/double-release detection.
    in_use: Box<[AtomicBool]>,
}

impl BufferPool {
    /// Build a pool with every buffer free.
    pub fn new() -> Self {
        let slots = (0..NUM_MESSAGE_BUFFERS)
            .map(|_| SpinMutex::new(MsgBuffer::empty()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        let in_use = (0..NUM_MESSAGE_BUFFERS)
            .map(|_| AtomicBool::new(false))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        let free = ArrayQueue::new(NUM_MESSAGE_BUFFERS);
        for idx in 0..NUM_MESSAGE_BUFFERS {
            // The queue was sized to hold every index.
            let _ = free.push(idx);
        }
        BufferPool {
            slots,
            free,
            in_use,
        }
    }

    /// Claim one free buffer. Never blocks; `None` when the pool is empty.
    pub(crate) fn claim(&self) -> Option<BufRef> {
        let idx = self.free.pop()?;
        let was = self.in_use[idx].swap(true, Ordering::AcqRel);
        debug_assert!(!was, "claimed buffer {} already in use", idx);
        Some(BufRef(idx))
    }

    /// Release a claimed buffer back to the free list. Never blocks.
    pub(crate) fn release(&self, buf: BufRef) {
        let was = self.in_use[buf.0].swap(false, Ordering::AcqRel);
        if !was {
            log::error!("MBOX: double release of buffer {}", buf.0);
            return;
        }
        if self.free.push(buf.0).is_err() {
            // Unreachable while the in_use flags stay consistent.
            log::error!("MBOX: free list overflow releasing buffer {}", buf.0);
        }
    }

    /// Copy `payload` into the referenced buffer.
    pub(crate) fn write(&self, buf: BufRef, payload: &[u8]) {
        self.slots[buf.0].lock().store(payload);
    }

    /// Stored payload length of the referenced buffer.
    pub(crate) fn stored_len(&self, buf: BufRef) -> usize {
        self.slots[buf.0].lock().len()
    }

    /// Copy the referenced buffer's payload into `out`; returns the count.
    pub(crate) fn read(&self, buf: BufRef, out: &mut [u8]) -> usize {
        self.slots[buf.0].lock().load(out)
    }

    /// Number of currently free buffers (snapshot).
    pub fn free_count(&self) -> usize {
        self.free.len()
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}
