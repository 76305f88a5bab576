//! Mailbox error types.
//!
//! Every failure kind is a distinct variant so callers can tell
//! would-block-forever conditions apart from plain misuse. Nothing here
//! collapses into a generic failure value.

pub type MboxResult<T> = Result<T, MboxError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MboxError {
    #[error("no mailbox available")]
    NoMailboxAvailable,
    #[error("mailbox resource allocation failed")]
    ResourceAllocationFailed,
    #[error("invalid mailbox handle")]
    InvalidHandle,
    #[error("mailbox not open by calling process")]
    NotOpen,
    #[error("mailbox already open by calling process")]
    AlreadyOpen,
    #[error("invalid message length")]
    InvalidLength,
    #[error("message larger than receive buffer")]
    MessageTooLarge,
    #[error("message buffer pool exhausted")]
    PoolExhausted,
    #[error("would block")]
    WouldBlock,
    #[error("lock or condition variable failure")]
    LockOrConditionFailure,
}
