use thiserror::Error;

use crate::codec::MboxMsg;
use crate::platform::AddressSpace;

pub type InitResult<T> = Result<T, InitError>;

/// Reasons the channel could not be brought up. None of these are fatal to
/// the host; the mailbox just stays unusable.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InitError {
    #[error("mailbox already initialised")]
    AlreadyInitialized,

    #[error("no mailbox channel: {0}")]
    NoChannel(&'static str),

    #[error("no interrupt line described for the mailbox")]
    MissingInterruptLine,

    #[error("mailbox registers in {0:?} space, only IO is supported")]
    UnsupportedAddressSpace(AddressSpace),

    #[error("mailbox hardware setup failed: {0}")]
    HardwareSetupFailed(&'static str),
}

/// A rejected send. The message is handed back untouched.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SendError {
    #[error("mailbox used before initialisation")]
    NotInitialized(MboxMsg),

    /// Retryable once the in-flight message completes.
    #[error("a mailbox message is already in flight")]
    Busy(MboxMsg),

    #[error("mailbox has been shut down")]
    Closed(MboxMsg),
}

impl SendError {
    pub fn into_message(self) -> MboxMsg {
        match self {
            SendError::NotInitialized(msg) | SendError::Busy(msg) | SendError::Closed(msg) => msg,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, SendError::Busy(_))
    }
}
