//! Finalized batches of L2 messages, as recorded on L1
//!
//! Proof generation and verification are outside this crate. The owner records
//! which L2 message hashes a finalized batch commits to, and a relay on L1 is
//! accepted when its proof names the batch that contains the message.

use std::collections::{BTreeMap, HashMap};

use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::StateBuffer;
use crate::contracts::messenger::FinalizeBatch;
use crate::error::{BridgeError, Result};

/// Inclusion proof submitted with an L2 to L1 relay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageProof {
    pub batch_index: u64,
}

#[derive(Debug, Clone, Default)]
pub struct BatchInclusion {
    batches: BTreeMap<u64, u64>,
    included: HashMap<B256, u64>,
    message_count: u64,
}

impl BatchInclusion {
    pub fn finalize_batch(&mut self, batch_index: u64, message_hashes: &[B256]) -> Result<()> {
        if self.batches.contains_key(&batch_index) {
            return Err(BridgeError::BatchAlreadyFinalized { batch_index });
        }
        if let Some(message_hash) = message_hashes
            .iter()
            .find(|hash| self.included.contains_key(*hash))
        {
            return Err(BridgeError::DuplicateMessage {
                message_hash: *message_hash,
            });
        }
        for hash in message_hashes {
            self.included.insert(*hash, batch_index);
        }
        self.batches.insert(batch_index, message_hashes.len() as u64);
        self.message_count += message_hashes.len() as u64;
        Ok(())
    }

    /// Returns true when `message_hash` belongs to the batch named by `proof`
    pub fn verify(&self, message_hash: B256, proof: &MessageProof) -> bool {
        self.included.get(&message_hash) == Some(&proof.batch_index)
    }

    pub fn batch_of(&self, message_hash: B256) -> Option<u64> {
        self.included.get(&message_hash).copied()
    }

    pub fn is_finalized(&self, batch_index: u64) -> bool {
        self.batches.contains_key(&batch_index)
    }

    /// Index the next finalized batch is expected to use
    pub fn next_batch_index(&self) -> u64 {
        self.batches
            .last_key_value()
            .map_or(0, |(index, _)| index + 1)
    }

    /// Number of L2 messages covered by all finalized batches
    pub fn message_count(&self) -> u64 {
        self.message_count
    }
}

impl StateBuffer<'_> {
    pub(crate) fn finalize_batch(
        &mut self,
        caller: Address,
        batch_index: u64,
        message_hashes: &[B256],
    ) -> Result<()> {
        self.only_owner(caller)?;
        let layer = self.env.layer;
        let rollup = self
            .state
            .rollup
            .as_mut()
            .ok_or(BridgeError::WrongLayer { layer })?;
        rollup.finalize_batch(batch_index, message_hashes)?;

        let messenger = self.state.messenger.address();
        self.emit(
            messenger,
            &FinalizeBatch {
                batchIndex: U256::from(batch_index),
                messageCount: U256::from(message_hashes.len()),
            },
        );
        info!(
            batch_index = batch_index,
            message_count = message_hashes.len(),
            event = "batch_finalized"
        );
        Ok(())
    }
}
