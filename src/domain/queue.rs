//! Message queue
//!
//! Append-only log of outgoing message hashes. The index assigned to a hash
//! is the number of hashes appended before it, which is also the nonce the
//! messenger stamps into the message.

use std::collections::HashMap;

use alloy_primitives::{Address, B256, U256};
use tracing::debug;

use super::StateBuffer;
use crate::contracts::messenger::AppendMessage;
use crate::error::{BridgeError, Result};

#[derive(Debug, Clone)]
pub struct MessageQueue {
    address: Address,
    messenger: Address,
    messages: HashMap<u64, B256>,
    next_index: u64,
}

impl MessageQueue {
    pub fn new(address: Address, messenger: Address) -> Self {
        Self {
            address,
            messenger,
            messages: HashMap::new(),
            next_index: 0,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Index the next appended hash will receive
    pub fn next_index(&self) -> u64 {
        self.next_index
    }

    pub fn message_at(&self, index: u64) -> Option<B256> {
        self.messages.get(&index).copied()
    }

    pub fn len(&self) -> u64 {
        self.next_index
    }

    pub fn is_empty(&self) -> bool {
        self.next_index == 0
    }

    /// Appends `message_hash` and returns its index. Only the messenger may append.
    pub fn append(&mut self, caller: Address, message_hash: B256) -> Result<u64> {
        if caller != self.messenger {
            return Err(BridgeError::OnlyMessenger { caller });
        }
        let index = self.next_index;
        self.messages.insert(index, message_hash);
        self.next_index += 1;
        Ok(index)
    }
}

impl StateBuffer<'_> {
    pub(crate) fn append_message(&mut self, caller: Address, message_hash: B256) -> Result<u64> {
        let index = self.state.queue.append(caller, message_hash)?;
        let queue = self.state.queue.address();
        self.emit(
            queue,
            &AppendMessage {
                index: U256::from(index),
                messageHash: message_hash,
            },
        );
        debug!(
            queue_index = index,
            message_hash = %message_hash,
            event = "message_appended"
        );
        Ok(index)
    }
}
