//! Cross-domain message format
//!
//! A cross-domain message is never stored whole. It is defined by its
//! canonical encoding, the ABI encoding of
//! `relayMessage(address,address,uint256,uint256,bytes)` including the 4-byte
//! selector, and identified by the keccak256 hash of that encoding. Only the
//! hash is persisted in the sent and executed sets.

use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use alloy_sol_types::SolCall;
use bon::Builder;

use crate::contracts::messenger::relayMessageCall;
use crate::error::Result;

/// Identifier of a cross-domain message
pub type MessageHash = B256;

/// A cross-domain call from `sender` on one layer to `target` on the other
///
/// # Format
///
/// - selector: bytes4 (0x8ef1332e)
/// - from: address (32 bytes, left padded)
/// - to: address (32 bytes, left padded)
/// - value: uint256 (32 bytes)
/// - nonce: uint256 (32 bytes)
/// - message: dynamic bytes (offset, length, padded data)
///
/// # Example
///
/// ```rust
/// use rollup_bridge::CrossDomainMessage;
/// use alloy_primitives::{Address, Bytes, U256};
///
/// let message = CrossDomainMessage::builder()
///     .sender(Address::repeat_byte(0x11))
///     .target(Address::repeat_byte(0x22))
///     .value(U256::from(1000))
///     .nonce(U256::ZERO)
///     .build();
///
/// assert_eq!(message.hash(), message.clone().hash());
/// assert_eq!(CrossDomainMessage::decode(&message.encode()).unwrap(), message);
/// ```
#[derive(Builder, Debug, Clone, PartialEq, Eq, Hash)]
pub struct CrossDomainMessage {
    /// Contract or account that sent the message on the source layer
    pub sender: Address,
    /// Contract or account called on the destination layer
    pub target: Address,
    /// Native value delivered with the call
    pub value: U256,
    /// Queue index assigned by the source message queue
    pub nonce: U256,
    /// Calldata forwarded to the target
    #[builder(default)]
    pub payload: Bytes,
}

impl CrossDomainMessage {
    /// Size of the encoding for an empty payload
    pub const MIN_ENCODED_SIZE: usize = 4 + 6 * 32;

    pub fn new(sender: Address, target: Address, value: U256, nonce: U256, payload: Bytes) -> Self {
        Self {
            sender,
            target,
            value,
            nonce,
            payload,
        }
    }

    /// Returns the canonical encoding of the message
    pub fn encode(&self) -> Bytes {
        relayMessageCall {
            from: self.sender,
            to: self.target,
            value: self.value,
            nonce: self.nonce,
            message: self.payload.clone(),
        }
        .abi_encode()
        .into()
    }

    /// Returns the message identifier, keccak256 of [`CrossDomainMessage::encode`]
    pub fn hash(&self) -> MessageHash {
        keccak256(self.encode())
    }

    /// Parses a canonical encoding back into a message
    ///
    /// Fails if the selector is not `relayMessage` or the body is malformed.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let call = relayMessageCall::abi_decode(bytes)?;
        Ok(Self {
            sender: call.from,
            target: call.to,
            value: call.value,
            nonce: call.nonce,
            payload: call.message,
        })
    }

    /// Returns the nonce as a queue index, if it fits
    pub fn queue_index(&self) -> Option<u64> {
        u64::try_from(self.nonce).ok()
    }
}
