//! Fixed mailbox table and the process-wide facade.
//!
//! The table is an arena of [`NUM_MAILBOXES`] slots, each either free or
//! holding an `Arc<Mailbox>`. Slot scan/claim/clear happens under one
//! dedicated lock held only for those few operations; it covers the
//! allocation race that exists before any per-mailbox lock does. Handles
//! are slot indices; out-of-range handles are rejected at lookup.
//!
//! Retirement ordering mirrors creation: the closing path marks the
//! mailbox retired under its own monitor first, then clears the table
//! slot, so a concurrent `create` never observes a slot mid-transition
//! and a blocked waiter still holding the `Arc` keeps its monitor alive.

use crate::error::{MboxError, MboxResult};
use crate::mailbox::Mailbox;
use crate::pool::BufferPool;
use crate::process::Pid;
use spin::{Mutex as SpinMutex, Once};
use std::sync::Arc;

/// Number of mailbox slots in the table.
pub const NUM_MAILBOXES: usize = 16;

/// Handle of a mailbox: its slot index in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MboxId(pub u32);

impl MboxId {
    /// Get the raw u32 value.
    pub fn as_u32(self) -> u32 {
        self.0
    }

    /// Create an MboxId from a raw u32.
    pub fn from_u32(raw: u32) -> Self {
        MboxId(raw)
    }

    /// Slot index in the table.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl core::fmt::Display for MboxId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fixed table of mailbox slots plus the buffer pool they share.
pub struct MboxTable {
    /// Slot array; `None` slots are free. The lock is held only for
    /// scan/claim/clear, never while touching a mailbox's monitor.
    slots: SpinMutex<Box<[Option<Arc<Mailbox>>]>>,
    /// Payload storage shared by every mailbox in this table.
    pool: Arc<BufferPool>,
}

impl MboxTable {
    /// Build a table with every slot free and the whole pool available.
    ///
    /// No monitor resources exist until `create` claims a slot, so unused
    /// mailboxes cost nothing but their table entry.
    pub fn new() -> Self {
        MboxTable {
            slots: SpinMutex::new(vec![None; NUM_MAILBOXES].into_boxed_slice()),
            pool: Arc::new(BufferPool::new()),
        }
    }

    /// Buffer pool shared by this table's mailboxes.
    pub fn pool(&self) -> &Arc<BufferPool> {
        &self.pool
    }

    /// Claim the first free slot and install a fresh mailbox in it.
    ///
    /// Fails with `NoMailboxAvailable` when every slot is taken.
    pub fn create(&self) -> MboxResult<MboxId> {
        let id = {
            let mut slots = self.slots.lock();
            let idx = slots
                .iter()
                .position(|slot| slot.is_none())
                .ok_or(MboxError::NoMailboxAvailable)?;
            let id = MboxId(idx as u32);
            slots[idx] = Some(Arc::new(Mailbox::new(id, self.pool.clone())));
            id
        };
        log::debug!("MBOX: created mailbox {}", id);
        Ok(id)
    }

    /// Look up a mailbox by handle. Returns a cloned `Arc` if the slot is
    /// in use.
    pub fn get(&self, id: MboxId) -> Option<Arc<Mailbox>> {
        let slots = self.slots.lock();
        slots.get(id.index()).and_then(|slot| slot.clone())
    }

    fn lookup(&self, id: MboxId) -> MboxResult<Arc<Mailbox>> {
        self.get(id).ok_or(MboxError::InvalidHandle)
    }

    /// Open the mailbox `id` for `pid`.
    pub fn open(&self, id: MboxId, pid: Pid) -> MboxResult<()> {
        self.lookup(id)?.open(pid)
    }

    /// Close the mailbox `id` for `pid`, retiring the slot if `pid` was
    /// the last opener.
    pub fn close(&self, id: MboxId, pid: Pid) -> MboxResult<()> {
        let mbox = self.lookup(id)?;
        if mbox.close(pid)? {
            // Only the close that retired the mailbox reaches here, and
            // the slot cannot have been reused before it is cleared.
            self.slots.lock()[id.index()] = None;
        }
        Ok(())
    }

    /// Send `payload` to mailbox `id`, blocking while its queue is full.
    pub fn send(&self, id: MboxId, pid: Pid, payload: &[u8]) -> MboxResult<()> {
        self.lookup(id)?.send(pid, payload)
    }

    /// Receive from mailbox `id` into `out`, blocking while its queue is
    /// empty. Returns the number of bytes copied.
    pub fn recv(&self, id: MboxId, pid: Pid, out: &mut [u8]) -> MboxResult<usize> {
        self.lookup(id)?.recv(pid, out)
    }

    /// Non-blocking send; `WouldBlock` when the queue is full.
    pub fn try_send(&self, id: MboxId, pid: Pid, payload: &[u8]) -> MboxResult<()> {
        self.lookup(id)?.try_send(pid, payload)
    }

    /// Non-blocking receive; `WouldBlock` when the queue is empty.
    pub fn try_recv(&self, id: MboxId, pid: Pid, out: &mut [u8]) -> MboxResult<usize> {
        self.lookup(id)?.try_recv(pid, out)
    }

    /// Release every hold `pid` has, retiring mailboxes it was the last
    /// opener of. Called by the process-termination path exactly once per
    /// dying process; idempotent and never blocks on a full or empty
    /// queue. Returns the number of holds released.
    pub fn close_all_by_pid(&self, pid: Pid) -> usize {
        let mut closed = 0;
        for idx in 0..NUM_MAILBOXES {
            let id = MboxId(idx as u32);
            let mbox = {
                let slots = self.slots.lock();
                slots[idx].clone()
            };
            if let Some(mbox) = mbox {
                match mbox.close(pid) {
                    Ok(true) => {
                        closed += 1;
                        self.slots.lock()[idx] = None;
                    }
                    Ok(false) => closed += 1,
                    // The pid simply never held this mailbox, or it
                    // retired under us; both are no-ops for the sweep.
                    Err(MboxError::NotOpen) | Err(MboxError::InvalidHandle) => {}
                    Err(err) => {
                        log::error!(
                            "MBOX: exit sweep could not close mailbox {} for pid {}: {}",
                            id,
                            pid,
                            err
                        );
                    }
                }
            }
        }
        if closed > 0 {
            log::debug!("MBOX: exit sweep closed {} mailboxes for pid {}", closed, pid);
        }
        closed
    }

    /// Number of free table slots (snapshot).
    pub fn free_slots(&self) -> usize {
        let slots = self.slots.lock();
        slots.iter().filter(|slot| slot.is_none()).count()
    }
}

impl Default for MboxTable {
    fn default() -> Self {
        Self::new()
    }
}

// ===========================================================================
// Process-wide mailbox table
// ===========================================================================

/// The process-wide table, built on first use with every slot free.
static TABLE: Once<MboxTable> = Once::new();

fn table() -> &'static MboxTable {
    TABLE.call_once(MboxTable::new)
}

/// Create a mailbox in the process-wide table. Returns its handle.
pub fn create_mailbox() -> MboxResult<MboxId> {
    table().create()
}

/// Look up a mailbox in the process-wide table.
pub fn get_mailbox(id: MboxId) -> Option<Arc<Mailbox>> {
    table().get(id)
}

/// Open mailbox `id` for `pid` in the process-wide table.
pub fn open_mailbox(id: MboxId, pid: Pid) -> MboxResult<()> {
    table().open(id, pid)
}

/// Close mailbox `id` for `pid` in the process-wide table.
pub fn close_mailbox(id: MboxId, pid: Pid) -> MboxResult<()> {
    table().close(id, pid)
}

/// Send `payload` to mailbox `id`, blocking while its queue is full.
pub fn send_message(id: MboxId, pid: Pid, payload: &[u8]) -> MboxResult<()> {
    table().send(id, pid, payload)
}

/// Receive from mailbox `id` into `out`, blocking while its queue is
/// empty. Returns the number of bytes copied.
pub fn recv_message(id: MboxId, pid: Pid, out: &mut [u8]) -> MboxResult<usize> {
    table().recv(id, pid, out)
}

/// Non-blocking send to the process-wide table.
pub fn try_send_message(id: MboxId, pid: Pid, payload: &[u8]) -> MboxResult<()> {
    table().try_send(id, pid, payload)
}

/// Non-blocking receive from the process-wide table.
pub fn try_recv_message(id: MboxId, pid: Pid, out: &mut [u8]) -> MboxResult<usize> {
    table().try_recv(id, pid, out)
}

/// Release every hold `pid` has in the process-wide table. Invoked by the
/// process-termination path; idempotent. Returns the holds released.
pub fn close_all_by_pid(pid: Pid) -> usize {
    table().close_all_by_pid(pid)
}
