//! Inter-process mailbox IPC with kernel-style fixed resource pools.
//!
//! A fixed table of mailbox slots and a fixed pool of message buffers,
//! shared by every process in the system. Unrelated processes open a
//! mailbox by handle and exchange bounded-size messages through a
//! blocking bounded-buffer protocol; when the last opener closes, the
//! slot retires and becomes reusable.
//!
//! ## Operations
//!
//! All kernel-facing entry points operate on the process-wide table:
//! - [`create_mailbox`]: claim a free slot, returns its [`MboxId`]
//! - [`open_mailbox`] / [`close_mailbox`]: per-process open accounting
//! - [`send_message`]: copy a payload in, blocking while the queue is full
//! - [`recv_message`]: copy the oldest message out, blocking while empty
//! - [`try_send_message`] / [`try_recv_message`]: non-blocking variants
//! - [`close_all_by_pid`]: exit sweep releasing a dead process's holds
//! - [`get_mailbox`]: direct `Arc<`[`Mailbox`]`>` access
//!
//! [`MboxTable`] is also constructible directly for a private table, e.g.
//! under test.
//!
//! ## Blocking model
//!
//! Each mailbox is a monitor: one mutex plus `not_full`/`not_empty`
//! condition variables, predicates re-checked in a loop on every wakeup.
//! Slot and buffer allocation never ride on any mailbox's monitor: the
//! table scan/claim runs under its own dedicated lock and the buffer
//! pool free list is lock-free, so neither can block behind a full
//! queue.
//!
//! ## Example
//!
//! ```
//! use kmbox::{close_mailbox, create_mailbox, open_mailbox, recv_message, send_message, Pid};
//!
//! let me = Pid(7);
//! let id = create_mailbox()?;
//! open_mailbox(id, me)?;
//!
//! send_message(id, me, b"hi")?;
//! let mut out = [0u8; 10];
//! let n = recv_message(id, me, &mut out)?;
//! assert_eq!(&out[..n], b"hi");
//!
//! close_mailbox(id, me)?;
//! # Ok::<(), kmbox::MboxError>(())
//! ```

pub mod error;
pub mod mailbox;
pub mod message;
pub mod pool;
pub mod process;
pub mod table;

pub use error::{MboxError, MboxResult};
pub use mailbox::{Mailbox, MAX_BUFFERS_PER_MAILBOX};
pub use message::{MsgBuffer, MAX_MESSAGE_LENGTH};
pub use pool::{BufRef, BufferPool, NUM_MESSAGE_BUFFERS};
pub use process::Pid;
pub use table::{
    close_all_by_pid, close_mailbox, create_mailbox, get_mailbox, open_mailbox, recv_message,
    send_message, try_recv_message, try_send_message, MboxId, MboxTable, NUM_MAILBOXES,
};
