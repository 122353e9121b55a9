//! Cross-domain messenger
//!
//! Per message hash the messenger moves through
//! `Unsent -> Sent -> {ExecutedOk | ExecutedFailed}`. Sending records the hash
//! in the sent set and appends it to the queue; relaying executes the inner
//! call in a nested buffer and records the terminal state whether or not the
//! inner call succeeded.

use std::collections::{HashMap, HashSet};

use alloy_primitives::{Address, Bytes, B256, U256};
use bon::Builder;
use tracing::{info, warn};

use super::fees::{self, ExcessFeePolicy};
use super::rollup::MessageProof;
use super::{CallContext, StateBuffer};
use crate::contracts::messenger::{
    FailedRelayedMessage, Paused, RelayedMessage, SentMessage, Unpaused,
};
use crate::error::{BridgeError, Result};
use crate::protocol::{
    apply_l1_to_l2_alias, CrossDomainMessage, MessageHash, MessageStatus, RelayOutcome,
};

/// Default upper bound on the gas limit a sender may request
pub const DEFAULT_MAX_GAS_LIMIT: u64 = 10_000_000;

/// A message send request
///
/// # Example
///
/// ```rust
/// use rollup_bridge::MessageRequest;
/// use alloy_primitives::{Address, U256};
///
/// let request = MessageRequest::builder()
///     .target(Address::repeat_byte(0x42))
///     .value(U256::from(1000))
///     .gas_limit(21_000)
///     .build();
///
/// assert!(request.payload.is_empty());
/// assert!(request.refund_address.is_none());
/// ```
#[derive(Builder, Debug, Clone, PartialEq, Eq)]
pub struct MessageRequest {
    /// Contract or account called on the counterpart layer
    pub target: Address,
    /// Native value delivered with the call
    pub value: U256,
    /// Calldata forwarded to the target
    #[builder(default)]
    pub payload: Bytes,
    /// Gas the relay may spend on the counterpart layer
    pub gas_limit: u64,
    /// Receiver of excess value under [`ExcessFeePolicy::Refund`], the sender if unset
    pub refund_address: Option<Address>,
}

/// Result of a successful send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    pub message_hash: MessageHash,
    /// Position in the message queue, equal to the message nonce
    pub queue_index: u64,
    /// Fee credited to the fee vault
    pub fee: U256,
    /// The message as it must be relayed on the counterpart layer
    pub message: CrossDomainMessage,
}

#[derive(Debug, Clone)]
pub struct Messenger {
    address: Address,
    counterpart: Address,
    fee_vault: Address,
    paused: bool,
    max_gas_limit: u64,
    excess_fee_policy: ExcessFeePolicy,
    sent: HashSet<MessageHash>,
    executed: HashMap<MessageHash, MessageStatus>,
}

impl Messenger {
    pub fn new(
        address: Address,
        counterpart: Address,
        fee_vault: Address,
        max_gas_limit: u64,
        excess_fee_policy: ExcessFeePolicy,
    ) -> Self {
        Self {
            address,
            counterpart,
            fee_vault,
            paused: false,
            max_gas_limit,
            excess_fee_policy,
            sent: HashSet::new(),
            executed: HashMap::new(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Messenger on the other layer
    pub fn counterpart(&self) -> Address {
        self.counterpart
    }

    pub fn fee_vault(&self) -> Address {
        self.fee_vault
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn max_gas_limit(&self) -> u64 {
        self.max_gas_limit
    }

    pub fn excess_fee_policy(&self) -> ExcessFeePolicy {
        self.excess_fee_policy
    }

    pub fn is_sent(&self, message_hash: MessageHash) -> bool {
        self.sent.contains(&message_hash)
    }

    /// True only for messages whose inner call succeeded
    pub fn is_executed(&self, message_hash: MessageHash) -> bool {
        self.executed.get(&message_hash) == Some(&MessageStatus::ExecutedOk)
    }

    /// Status of `message_hash` as seen by this layer
    pub fn status(&self, message_hash: MessageHash) -> MessageStatus {
        if let Some(status) = self.executed.get(&message_hash) {
            *status
        } else if self.sent.contains(&message_hash) {
            MessageStatus::Sent
        } else {
            MessageStatus::Unsent
        }
    }
}

impl<'a> StateBuffer<'a> {
    pub(crate) fn send_message(
        &mut self,
        caller: Address,
        msg_value: U256,
        request: &MessageRequest,
    ) -> Result<SendReceipt> {
        let messenger = &self.state.messenger;
        if messenger.paused {
            return Err(BridgeError::Paused);
        }
        if request.gas_limit > messenger.max_gas_limit {
            return Err(BridgeError::GasLimitTooHigh {
                gas_limit: request.gas_limit,
                max: messenger.max_gas_limit,
            });
        }

        let fee = self.state.oracle.estimate_fee(request.gas_limit)?;
        let settlement = fees::settle(messenger.excess_fee_policy, request.value, fee, msg_value)?;
        let address = messenger.address;
        let excess_to = match messenger.excess_fee_policy {
            ExcessFeePolicy::Refund => request.refund_address.unwrap_or(caller),
            ExcessFeePolicy::Reject | ExcessFeePolicy::RetainInVault => messenger.fee_vault,
        };
        let fee_vault = messenger.fee_vault;

        let accounts = &mut self.state.accounts;
        accounts.transfer(caller, address, msg_value)?;
        accounts.transfer(address, fee_vault, settlement.fee)?;
        accounts.transfer(address, excess_to, settlement.excess)?;

        let nonce = U256::from(self.state.queue.next_index());
        let message = CrossDomainMessage::new(
            caller,
            request.target,
            request.value,
            nonce,
            request.payload.clone(),
        );
        let message_hash = message.hash();
        if !self.state.messenger.sent.insert(message_hash) {
            return Err(BridgeError::DuplicateMessage { message_hash });
        }
        let queue_index = self.append_message(address, message_hash)?;

        self.emit(
            address,
            &SentMessage {
                sender: caller,
                target: request.target,
                value: request.value,
                messageNonce: nonce,
                gasLimit: U256::from(request.gas_limit),
                message: request.payload.clone(),
            },
        );
        info!(
            layer = %self.env.layer,
            message_hash = %message_hash,
            queue_index = queue_index,
            sender = %caller,
            target = %request.target,
            value = %request.value,
            fee = %settlement.fee,
            event = "message_sent"
        );

        Ok(SendReceipt {
            message_hash,
            queue_index,
            fee: settlement.fee,
            message,
        })
    }

    /// Delivers a message from the counterpart layer.
    ///
    /// A message already in a terminal state is skipped before any other
    /// check, so a duplicate delivery never runs the inner call twice.
    pub(crate) fn relay_message(
        &mut self,
        caller: Address,
        message: &CrossDomainMessage,
        proof: Option<&MessageProof>,
    ) -> Result<RelayOutcome> {
        let message_hash = message.hash();
        if let Some(status) = self.state.messenger.executed.get(&message_hash).copied() {
            info!(
                layer = %self.env.layer,
                message_hash = %message_hash,
                status = %status,
                event = "relay_replay_skipped"
            );
            return Ok(RelayOutcome::AlreadyExecuted {
                message_hash,
                status,
            });
        }
        if self.state.messenger.paused {
            return Err(BridgeError::Paused);
        }
        self.authenticate_relay(caller, message_hash, proof)?;
        self.check_relay_target(message.target)?;

        let result = self.execute(message);
        Ok(self.record_execution(message_hash, result))
    }

    /// Re-executes a message whose previous relay failed. Owner only.
    pub(crate) fn replay_failed_message(
        &mut self,
        caller: Address,
        message: &CrossDomainMessage,
    ) -> Result<RelayOutcome> {
        self.only_owner(caller)?;
        let message_hash = message.hash();
        let status = self.state.messenger.status(message_hash);
        if status != MessageStatus::ExecutedFailed {
            return Err(BridgeError::NotReplayable {
                message_hash,
                status,
            });
        }
        if self.state.messenger.paused {
            return Err(BridgeError::Paused);
        }
        self.check_relay_target(message.target)?;

        let result = self.execute(message);
        Ok(self.record_execution(message_hash, result))
    }

    pub(crate) fn set_paused(&mut self, caller: Address, paused: bool) -> Result<()> {
        self.only_owner(caller)?;
        self.state.messenger.paused = paused;
        let messenger = self.state.messenger.address;
        if paused {
            self.emit(messenger, &Paused { account: caller });
        } else {
            self.emit(messenger, &Unpaused { account: caller });
        }
        info!(layer = %self.env.layer, paused = paused, event = "messenger_pause_changed");
        Ok(())
    }

    /// L2 accepts relays from the aliased L1 messenger only. L1 accepts relays
    /// from anyone holding a proof that the message is in a finalized batch.
    fn authenticate_relay(
        &self,
        caller: Address,
        message_hash: MessageHash,
        proof: Option<&MessageProof>,
    ) -> Result<()> {
        let layer = self.env.layer;
        if !layer.requires_proof() {
            let expected = apply_l1_to_l2_alias(self.state.messenger.counterpart);
            if caller != expected {
                return Err(BridgeError::UnauthorizedRelayer { caller, layer });
            }
            return Ok(());
        }

        let rollup = self
            .state
            .rollup
            .as_ref()
            .ok_or(BridgeError::WrongLayer { layer })?;
        match proof {
            Some(proof) if rollup.verify(message_hash, proof) => Ok(()),
            _ => Err(BridgeError::InvalidProof { message_hash }),
        }
    }

    fn check_relay_target(&self, target: Address) -> Result<()> {
        if target == self.state.messenger.address || target == self.state.queue.address() {
            return Err(BridgeError::ForbiddenTarget { target });
        }
        Ok(())
    }

    /// Runs the inner call with the message sender as the cross-domain sender.
    /// Its state changes and logs are kept only if it succeeds.
    fn execute(&mut self, message: &CrossDomainMessage) -> Result<()> {
        let ctx = CallContext {
            caller: self.state.messenger.address,
            value: message.value,
            xdomain_sender: Some(message.sender),
        };
        let mut inner = self.nested();
        inner.call(&ctx, message.target, &message.payload)?;
        self.commit(inner);
        Ok(())
    }

    fn record_execution(&mut self, message_hash: B256, result: Result<()>) -> RelayOutcome {
        let messenger = self.state.messenger.address;
        match result {
            Ok(()) => {
                self.state
                    .messenger
                    .executed
                    .insert(message_hash, MessageStatus::ExecutedOk);
                self.emit(
                    messenger,
                    &RelayedMessage {
                        messageHash: message_hash,
                    },
                );
                info!(
                    layer = %self.env.layer,
                    message_hash = %message_hash,
                    event = "message_relayed"
                );
                RelayOutcome::Relayed { message_hash }
            }
            Err(error) => {
                self.state
                    .messenger
                    .executed
                    .insert(message_hash, MessageStatus::ExecutedFailed);
                self.emit(
                    messenger,
                    &FailedRelayedMessage {
                        messageHash: message_hash,
                    },
                );
                warn!(
                    layer = %self.env.layer,
                    message_hash = %message_hash,
                    error = %error,
                    event = "message_relay_failed"
                );
                RelayOutcome::Failed {
                    message_hash,
                    error,
                }
            }
        }
    }
}
