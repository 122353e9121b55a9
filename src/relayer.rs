//! Off-chain message relayer
//!
//! The relayer reads `SentMessage` logs from both layers, keeps a
//! [`RelayStatus`] per message hash and submits each pending message to the
//! other layer once. L2 to L1 messages wait until their batch is finalized on
//! L1. A message whose relay failed stays `RelayFailed`: the relayer never
//! retries it, only an operator replay on the destination can move it on.
//!
//! Only the status of a confirmed message is kept; its body is dropped.
//!
//! # Example
//!
//! ```rust
//! use rollup_bridge::{Bridge, Layer, MessageRequest, Relayer, RelayStatus};
//! use alloy_primitives::{Address, U256};
//!
//! # fn main() -> Result<(), rollup_bridge::BridgeError> {
//! let mut bridge = Bridge::devnet()?;
//! let alice = Address::repeat_byte(0xa1);
//! bridge.l1_mut().fund(alice, U256::from(5))?;
//!
//! let request = MessageRequest::builder()
//!     .target(Address::repeat_byte(0xb0))
//!     .value(U256::from(5))
//!     .gas_limit(21_000)
//!     .build();
//! let receipt = bridge.l1_mut().send_message(alice, U256::from(5), &request)?;
//!
//! let mut relayer = Relayer::new(Address::repeat_byte(0xee));
//! assert_eq!(relayer.poll(&bridge), 1);
//! let report = relayer.relay_pending(&mut bridge);
//!
//! assert_eq!(report.confirmed, vec![receipt.message_hash]);
//! assert_eq!(relayer.status(receipt.message_hash), Some(RelayStatus::Confirmed));
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;

use alloy_primitives::Address;
use alloy_sol_types::SolEvent;
use tracing::{debug, info, warn};

use crate::bridge::Bridge;
use crate::contracts::messenger::SentMessage;
use crate::domain::Domain;
use crate::protocol::{CrossDomainMessage, Layer, MessageHash, RelayStatus};
use crate::spans;

/// A message the relayer has seen on its source layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedMessage {
    pub source: Layer,
    pub message: CrossDomainMessage,
    pub gas_limit: u64,
}

/// What one [`Relayer::relay_pending`] pass did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayReport {
    /// Relayed, inner call succeeded
    pub confirmed: Vec<MessageHash>,
    /// Relayed, inner call failed
    pub failed: Vec<MessageHash>,
    /// L2 messages whose batch is not finalized yet
    pub awaiting_finalization: Vec<MessageHash>,
    /// Submissions the destination refused outright, still pending
    pub rejected: Vec<MessageHash>,
}

#[derive(Debug)]
pub struct Relayer {
    address: Address,
    cursors: HashMap<Layer, usize>,
    /// Pending hashes in discovery order
    pending: Vec<MessageHash>,
    messages: HashMap<MessageHash, TrackedMessage>,
    statuses: HashMap<MessageHash, RelayStatus>,
}

impl Relayer {
    /// Creates a relayer that submits L2 to L1 messages as `address`
    pub fn new(address: Address) -> Self {
        Self {
            address,
            cursors: HashMap::new(),
            pending: Vec::new(),
            messages: HashMap::new(),
            statuses: HashMap::new(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn status(&self, message_hash: MessageHash) -> Option<RelayStatus> {
        self.statuses.get(&message_hash).copied()
    }

    /// The tracked message, until it is confirmed
    pub fn message(&self, message_hash: MessageHash) -> Option<&TrackedMessage> {
        self.messages.get(&message_hash)
    }

    /// Number of tracked messages still waiting to be submitted
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Reads new `SentMessage` logs on both layers. Returns how many new
    /// messages were found.
    pub fn poll(&mut self, bridge: &Bridge) -> usize {
        self.poll_domain(bridge.l1()) + self.poll_domain(bridge.l2())
    }

    fn poll_domain(&mut self, domain: &Domain) -> usize {
        let source = domain.layer();
        let cursor = self.cursors.get(&source).copied().unwrap_or(0);
        let span = spans::relayer_poll(source, cursor);
        let _guard = span.enter();

        let logs = domain.logs();
        let messenger = domain.messenger_address();
        let mut found = 0;
        for log in logs.iter().skip(cursor) {
            if log.address != messenger
                || log.data.topics().first() != Some(&SentMessage::SIGNATURE_HASH)
            {
                continue;
            }
            let event = match SentMessage::decode_log_data(&log.data) {
                Ok(event) => event,
                Err(error) => {
                    warn!(error = %error, event = "sent_message_undecodable");
                    continue;
                }
            };
            let message = CrossDomainMessage::new(
                event.sender,
                event.target,
                event.value,
                event.messageNonce,
                event.message,
            );
            let message_hash = message.hash();
            if self.statuses.contains_key(&message_hash) {
                continue;
            }
            debug!(
                source = %source,
                message_hash = %message_hash,
                nonce = %message.nonce,
                event = "message_discovered"
            );
            self.messages.insert(
                message_hash,
                TrackedMessage {
                    source,
                    message,
                    gas_limit: u64::try_from(event.gasLimit).unwrap_or(u64::MAX),
                },
            );
            self.statuses.insert(message_hash, RelayStatus::Pending);
            self.pending.push(message_hash);
            found += 1;
        }
        self.cursors.insert(source, logs.len());
        found
    }

    /// Submits every pending message once, in discovery order.
    pub fn relay_pending(&mut self, bridge: &mut Bridge) -> RelayReport {
        let mut report = RelayReport::default();
        let queue = std::mem::take(&mut self.pending);
        for message_hash in queue {
            let Some(tracked) = self.messages.get(&message_hash).cloned() else {
                continue;
            };
            if tracked.source == Layer::L2 && bridge.l1().batch_of(message_hash).is_none() {
                report.awaiting_finalization.push(message_hash);
                self.pending.push(message_hash);
                continue;
            }

            let span = spans::relayer_submit(tracked.source, &message_hash);
            let _guard = span.enter();
            self.statuses.insert(message_hash, RelayStatus::Submitted);

            match bridge.relay_message(tracked.source, &tracked.message, self.address) {
                Ok(outcome) => {
                    let status = RelayStatus::from_destination(outcome.status());
                    self.statuses.insert(message_hash, status);
                    if let Some(error) = outcome.error() {
                        spans::record_error_with_context(
                            "RelayFailed",
                            &error.to_string(),
                            Some("message can only be replayed by the destination owner"),
                        );
                    }
                    match status {
                        RelayStatus::Confirmed => {
                            self.messages.remove(&message_hash);
                            report.confirmed.push(message_hash);
                        }
                        _ => report.failed.push(message_hash),
                    }
                    info!(
                        source = %tracked.source,
                        message_hash = %message_hash,
                        status = ?status,
                        event = "relay_submitted"
                    );
                }
                Err(error) => {
                    spans::record_error(&error);
                    warn!(
                        source = %tracked.source,
                        message_hash = %message_hash,
                        error = %error,
                        event = "relay_submission_rejected"
                    );
                    self.statuses.insert(message_hash, RelayStatus::Pending);
                    self.pending.push(message_hash);
                    report.rejected.push(message_hash);
                }
            }
        }
        report
    }

    /// Re-reads destination status for messages that failed, picking up
    /// operator replays. Returns how many moved to `Confirmed`.
    pub fn sync(&mut self, bridge: &Bridge) -> usize {
        let mut replayed = Vec::new();
        for (message_hash, status) in self.statuses.iter_mut() {
            if *status != RelayStatus::RelayFailed {
                continue;
            }
            let Some(tracked) = self.messages.get(message_hash) else {
                continue;
            };
            let destination = bridge
                .domain(tracked.source.counterpart())
                .message_status(*message_hash);
            if RelayStatus::from_destination(destination) == RelayStatus::Confirmed {
                *status = RelayStatus::Confirmed;
                replayed.push(*message_hash);
            }
        }
        for message_hash in &replayed {
            self.messages.remove(message_hash);
        }
        replayed.len()
    }
}
