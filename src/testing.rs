//! Test utilities and fake recipients for exercising the gateway callback
//!
//! These fakes stand in for recipient contracts that implement
//! `onScrollGatewayCallback`. Register one on a [`Domain`](crate::Domain) with
//! [`register_callback`](crate::Domain::register_callback) to make its address
//! a contract from the gateway's point of view.
//!
//! They are designed for integration tests that verify callback ordering,
//! rollback of failed finalizes and replay behavior.

use std::sync::{Arc, Mutex};

use crate::domain::gateway::{CallbackContext, GatewayCallback};
use crate::{BridgeError, Result};

// ============================================================================
// Recording Receiver
// ============================================================================

/// A recipient that accepts every callback and remembers what it saw.
///
/// Clones share the same record, so a test can keep one handle and register
/// another.
#[derive(Clone, Debug, Default)]
pub struct RecordingReceiver {
    calls: Arc<Mutex<Vec<CallbackContext>>>,
}

impl RecordingReceiver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every callback received so far, oldest first
    pub fn calls(&self) -> Vec<CallbackContext> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl GatewayCallback for RecordingReceiver {
    fn on_gateway_callback(&self, context: &CallbackContext) -> Result<()> {
        self.calls.lock().unwrap().push(context.clone());
        Ok(())
    }
}

// ============================================================================
// Reverting Receiver
// ============================================================================

/// A recipient whose callback reverts, optionally only for a number of calls.
///
/// This allows testing scenarios like:
/// - A finalize that fails and is recorded as a failed relay
/// - A failed message that succeeds when the operator replays it
#[derive(Clone, Debug)]
pub struct RevertingReceiver {
    reason: String,
    remaining_failures: Arc<Mutex<Option<usize>>>,
    attempts: Arc<Mutex<usize>>,
}

impl RevertingReceiver {
    /// Reverts on every call
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            remaining_failures: Arc::new(Mutex::new(None)),
            attempts: Arc::new(Mutex::new(0)),
        }
    }

    /// Reverts on the first `count` calls and accepts every call after that
    pub fn failing_times(reason: impl Into<String>, count: usize) -> Self {
        let receiver = Self::new(reason);
        *receiver.remaining_failures.lock().unwrap() = Some(count);
        receiver
    }

    /// Number of times the callback ran, whether it reverted or not
    pub fn attempts(&self) -> usize {
        *self.attempts.lock().unwrap()
    }
}

impl GatewayCallback for RevertingReceiver {
    fn on_gateway_callback(&self, _context: &CallbackContext) -> Result<()> {
        *self.attempts.lock().unwrap() += 1;

        let mut remaining = self.remaining_failures.lock().unwrap();
        match remaining.as_mut() {
            Some(0) => Ok(()),
            Some(count) => {
                *count -= 1;
                Err(BridgeError::CallbackReverted {
                    reason: self.reason.clone(),
                })
            }
            None => Err(BridgeError::CallbackReverted {
                reason: self.reason.clone(),
            }),
        }
    }
}
