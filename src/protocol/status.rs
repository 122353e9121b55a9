//! Message lifecycle states
//!
//! Per message identifier: `Unsent -> Sent -> {ExecutedOk | ExecutedFailed}`.
//! `Sent` lives on the source layer, the executed states on the destination.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::MessageHash;
use crate::error::BridgeError;

/// Lifecycle state of a message identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MessageStatus {
    /// Never recorded on this layer
    Unsent,
    /// Recorded in the sent set and appended to the queue
    Sent,
    /// Relayed and the inner call succeeded
    ExecutedOk,
    /// Relayed and the inner call reverted; state changes were rolled back
    ExecutedFailed,
}

impl MessageStatus {
    /// Returns true for states a relay can no longer change
    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::ExecutedOk | Self::ExecutedFailed)
    }

    /// Returns the status name as a string
    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unsent => "unsent",
            Self::Sent => "sent",
            Self::ExecutedOk => "executed",
            Self::ExecutedFailed => "failed",
        }
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress of a message as tracked by an off-chain relayer
///
/// This is the relayer's bookkeeping, not ledger state: it moves to
/// `Confirmed` or `RelayFailed` from what the destination layer reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RelayStatus {
    /// Seen on the source layer, not yet submitted
    Pending,
    /// Handed to the destination layer
    Submitted,
    /// Destination reports `ExecutedOk`
    Confirmed,
    /// Destination reports `ExecutedFailed`; only an operator replay can help
    RelayFailed,
}

impl RelayStatus {
    /// Returns true once the relayer has nothing left to do for the message
    #[inline]
    pub const fn is_final(self) -> bool {
        matches!(self, Self::Confirmed | Self::RelayFailed)
    }

    /// Maps a destination ledger status to the relayer's view
    pub const fn from_destination(status: MessageStatus) -> Self {
        match status {
            MessageStatus::ExecutedOk => Self::Confirmed,
            MessageStatus::ExecutedFailed => Self::RelayFailed,
            MessageStatus::Unsent | MessageStatus::Sent => Self::Pending,
        }
    }
}

/// Result of a relay attempt that was accepted by the messenger
///
/// Authorization and input errors are returned as `Err` instead. A failed inner
/// call is not an error for the caller of relay: it is recorded and reported
/// here.
#[derive(Debug)]
pub enum RelayOutcome {
    /// The inner call succeeded and the message is now `ExecutedOk`
    Relayed { message_hash: MessageHash },
    /// The inner call reverted and the message is now `ExecutedFailed`
    Failed {
        message_hash: MessageHash,
        error: BridgeError,
    },
    /// The message was already terminal; nothing was executed
    AlreadyExecuted {
        message_hash: MessageHash,
        status: MessageStatus,
    },
}

impl RelayOutcome {
    pub fn message_hash(&self) -> MessageHash {
        match self {
            Self::Relayed { message_hash }
            | Self::Failed { message_hash, .. }
            | Self::AlreadyExecuted { message_hash, .. } => *message_hash,
        }
    }

    /// Returns the status of the message after this relay
    pub fn status(&self) -> MessageStatus {
        match self {
            Self::Relayed { .. } => MessageStatus::ExecutedOk,
            Self::Failed { .. } => MessageStatus::ExecutedFailed,
            Self::AlreadyExecuted { status, .. } => *status,
        }
    }

    /// Returns the inner call error of a failed relay
    pub fn error(&self) -> Option<&BridgeError> {
        match self {
            Self::Failed { error, .. } => Some(error),
            _ => None,
        }
    }
}
