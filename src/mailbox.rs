//! A single mailbox: bounded FIFO message queue with blocking send/recv.
//!
//! ## Monitor discipline
//!
//! Each mailbox is a classic monitor: one mutex guarding all of its state
//! plus two condition variables, `not_full` for senders and `not_empty`
//! for receivers. Waiters re-check their predicate in a loop on every
//! wakeup, because a wakeup is a hint that the condition *may* hold, not
//! a promise: another waiter can win the race for the freed slot.
//!
//! ## Storage
//!
//! Payloads live in the shared [`BufferPool`]; the pending queue holds
//! [`BufRef`]s. A buffer is claimed on send and released on recv (or by
//! the retirement drain); in between it belongs to exactly one mailbox's
//! pending queue.
//!
//! ## Retirement
//!
//! The last `close` retires the mailbox: the `retired` flag is set under
//! the monitor, every queued buffer goes back to the pool, and both
//! condition variables are woken so blocked waiters observe the flag and
//! fail out instead of sleeping forever. Waiters hold the mailbox through
//! an `Arc`, so the monitor's lock and condition variables outlive the
//! table slot they came from.

use crate::error::{MboxError, MboxResult};
use crate::message::MAX_MESSAGE_LENGTH;
use crate::pool::{BufRef, BufferPool};
use crate::process::Pid;
use crate::table::MboxId;
use std::collections::{BTreeSet, VecDeque};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

/// Maximum number of messages queued in a single mailbox.
pub const MAX_BUFFERS_PER_MAILBOX: usize = 16;

/// Mutable mailbox state, guarded by the monitor mutex.
struct MboxState {
    /// FIFO of claimed pool buffers holding queued messages.
    pending: VecDeque<BufRef>,
    /// Processes currently holding this mailbox open.
    openers: BTreeSet<Pid>,
    /// Set once, when the last opener leaves; waiters fail out on wakeup.
    retired: bool,
}

/// A mailbox: bounded message queue with per-process open accounting.
pub struct Mailbox {
    /// Table slot this mailbox occupies.
    id: MboxId,
    /// Monitor lock over all mailbox state.
    state: Mutex<MboxState>,
    /// Senders wait here while the queue is full.
    not_full: Condvar,
    /// Receivers wait here while the queue is empty.
    not_empty: Condvar,
    /// Shared payload storage.
    pool: Arc<BufferPool>,
}

impl Mailbox {
    /// Create an empty mailbox for table slot `id`.
    pub(crate) fn new(id: MboxId, pool: Arc<BufferPool>) -> Self {
        Mailbox {
            id,
            state: Mutex::new(MboxState {
                pending: VecDeque::with_capacity(MAX_BUFFERS_PER_MAILBOX),
                openers: BTreeSet::new(),
                retired: false,
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
            pool,
        }
    }

    /// Table handle of this mailbox.
    pub fn id(&self) -> MboxId {
        self.id
    }

    fn lock_state(&self) -> MboxResult<MutexGuard<'_, MboxState>> {
        self.state.lock().map_err(|_| {
            log::error!("MBOX: mailbox {} monitor lock poisoned", self.id);
            MboxError::LockOrConditionFailure
        })
    }

    fn wait_on<'a>(
        &self,
        cv: &Condvar,
        guard: MutexGuard<'a, MboxState>,
    ) -> MboxResult<MutexGuard<'a, MboxState>> {
        cv.wait(guard).map_err(|_| {
            log::error!("MBOX: mailbox {} condition wait failed", self.id);
            MboxError::LockOrConditionFailure
        })
    }

    /// Register `pid` as an opener of this mailbox.
    ///
    /// Fails with `AlreadyOpen` if `pid` is already registered, or
    /// `InvalidHandle` if the mailbox has been retired.
    pub fn open(&self, pid: Pid) -> MboxResult<()> {
        let mut state = self.lock_state()?;
        if state.retired {
            return Err(MboxError::InvalidHandle);
        }
        if !state.openers.insert(pid) {
            return Err(MboxError::AlreadyOpen);
        }
        log::debug!("MBOX: pid {} opened mailbox {}", pid, self.id);
        Ok(())
    }

    /// Remove `pid` from the openers; retire the mailbox when the set
    /// empties. Returns `true` when this close retired the mailbox.
    ///
    /// Retirement drains every queued buffer back to the pool. Both
    /// condition variables are woken after any successful close so a
    /// waiter whose hold was just removed (exit sweep) or whose mailbox
    /// retired re-checks its predicate and fails out.
    pub fn close(&self, pid: Pid) -> MboxResult<bool> {
        let retired = {
            let mut state = self.lock_state()?;
            if state.retired {
                return Err(MboxError::InvalidHandle);
            }
            if !state.openers.remove(&pid) {
                return Err(MboxError::NotOpen);
            }
            log::debug!("MBOX: pid {} closed mailbox {}", pid, self.id);
            if state.openers.is_empty() {
                state.retired = true;
                // Nothing queued may outlive the mailbox: every buffer
                // goes back to the pool before the slot is reused.
                while let Some(buf) = state.pending.pop_front() {
                    self.pool.release(buf);
                }
                log::debug!("MBOX: retired mailbox {}", self.id);
                true
            } else {
                false
            }
        };
        self.not_full.notify_all();
        self.not_empty.notify_all();
        Ok(retired)
    }

    /// Send `payload` to this mailbox, blocking while the queue is full.
    ///
    /// The caller must have opened the mailbox. Payloads longer than
    /// [`MAX_MESSAGE_LENGTH`] fail with `InvalidLength` before any state
    /// is touched; zero-length payloads are valid.
    pub fn send(&self, pid: Pid, payload: &[u8]) -> MboxResult<()> {
        if payload.len() > MAX_MESSAGE_LENGTH {
            return Err(MboxError::InvalidLength);
        }
        let mut state = self.lock_state()?;
        loop {
            if state.retired {
                return Err(MboxError::InvalidHandle);
            }
            if !state.openers.contains(&pid) {
                return Err(MboxError::NotOpen);
            }
            if state.pending.len() < MAX_BUFFERS_PER_MAILBOX {
                break;
            }
            // Queue full: wait for a receiver, then re-check everything.
            state = self.wait_on(&self.not_full, state)?;
        }
        let buf = match self.pool.claim() {
            Some(buf) => buf,
            None => {
                drop(state);
                // A consumed wakeup must not die with this failure:
                // queue space still exists for another parked sender.
                self.not_full.notify_one();
                return Err(MboxError::PoolExhausted);
            }
        };
        self.pool.write(buf, payload);
        state.pending.push_back(buf);
        drop(state);
        // Wake one receiver that may be waiting for a message.
        self.not_empty.notify_one();
        Ok(())
    }

    /// Try to send without blocking.
    ///
    /// Returns `WouldBlock` instead of waiting when the queue is full.
    pub fn try_send(&self, pid: Pid, payload: &[u8]) -> MboxResult<()> {
        if payload.len() > MAX_MESSAGE_LENGTH {
            return Err(MboxError::InvalidLength);
        }
        let mut state = self.lock_state()?;
        if state.retired {
            return Err(MboxError::InvalidHandle);
        }
        if !state.openers.contains(&pid) {
            return Err(MboxError::NotOpen);
        }
        if state.pending.len() >= MAX_BUFFERS_PER_MAILBOX {
            return Err(MboxError::WouldBlock);
        }
        let buf = self.pool.claim().ok_or(MboxError::PoolExhausted)?;
        self.pool.write(buf, payload);
        state.pending.push_back(buf);
        drop(state);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Receive the oldest message into `out`, blocking while the queue is
    /// empty. Returns the number of bytes copied.
    ///
    /// Messages are delivered in send order regardless of sender. If the
    /// stored message is longer than `out`, the call fails with
    /// `MessageTooLarge` and the message stays queued, so a retry with a
    /// larger buffer still retrieves it.
    pub fn recv(&self, pid: Pid, out: &mut [u8]) -> MboxResult<usize> {
        let mut state = self.lock_state()?;
        loop {
            if state.retired {
                return Err(MboxError::InvalidHandle);
            }
            if !state.openers.contains(&pid) {
                return Err(MboxError::NotOpen);
            }
            if let Some(&front) = state.pending.front() {
                return self.finish_recv(state, front, out);
            }
            // Queue empty: wait for a sender, then re-check everything.
            state = self.wait_on(&self.not_empty, state)?;
        }
    }

    /// Try to receive without blocking.
    ///
    /// Returns `WouldBlock` instead of waiting when the queue is empty.
    pub fn try_recv(&self, pid: Pid, out: &mut [u8]) -> MboxResult<usize> {
        let state = self.lock_state()?;
        if state.retired {
            return Err(MboxError::InvalidHandle);
        }
        if !state.openers.contains(&pid) {
            return Err(MboxError::NotOpen);
        }
        match state.pending.front() {
            Some(&front) => self.finish_recv(state, front, out),
            None => Err(MboxError::WouldBlock),
        }
    }

    /// Dequeue `front`, copy it out and release its buffer. The front is
    /// inspected before it is popped: an undersized `out` leaves the
    /// message queued and passes the wakeup to another receiver.
    fn finish_recv(
        &self,
        mut state: MutexGuard<'_, MboxState>,
        front: BufRef,
        out: &mut [u8],
    ) -> MboxResult<usize> {
        let len = self.pool.stored_len(front);
        if len > out.len() {
            drop(state);
            // This failure may have consumed a sender's wakeup. Hand it
            // on so a receiver with room for the message re-checks.
            self.not_empty.notify_one();
            return Err(MboxError::MessageTooLarge);
        }
        state.pending.pop_front();
        let copied = self.pool.read(front, out);
        self.pool.release(front);
        drop(state);
        // Wake one sender that may be waiting for space.
        self.not_full.notify_one();
        Ok(copied)
    }

    /// Number of queued messages (snapshot; may be stale).
    pub fn pending_len(&self) -> usize {
        self.snapshot().pending.len()
    }

    /// Number of processes holding this mailbox open (snapshot).
    pub fn opener_count(&self) -> usize {
        self.snapshot().openers.len()
    }

    /// Returns `true` once the last opener has left.
    pub fn is_retired(&self) -> bool {
        self.snapshot().retired
    }

    // The introspection snapshots read through poisoning: they mutate
    // nothing and serve diagnostics, where a stale answer beats none.
    fn snapshot(&self) -> MutexGuard<'_, MboxState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
