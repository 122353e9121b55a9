//! # rollup-bridge
//!
//! The cross-domain WETH bridge core of a two-layer rollup, as a
//! deterministic in-process model of both layers.
//!
//! A user's WETH transfer becomes a uniquely identified cross-domain message
//! on the sending layer. The message is queued, relayed to the other layer,
//! and finalized there by releasing WETH to the recipient. Relaying is
//! idempotent, and a failed finalize is recorded instead of being lost.
//!
//! ## Quick Start
//!
//! ```rust
//! use rollup_bridge::{Bridge, BridgeError, Layer, TransferRequest};
//! use alloy_primitives::{Address, U256};
//!
//! # fn main() -> Result<(), BridgeError> {
//! let mut bridge = Bridge::devnet()?;
//! let alice = Address::repeat_byte(0xa1);
//!
//! // Alice holds WETH on L2 and withdraws it to L1
//! let l2 = bridge.l2_mut();
//! l2.fund(alice, U256::from(1000))?;
//! l2.wrap(alice, U256::from(1000))?;
//! let request = TransferRequest::builder()
//!     .token(l2.weth_address())
//!     .amount(U256::from(1000))
//!     .gas_limit(21_000)
//!     .build();
//! let receipt = l2.withdraw_erc20(alice, U256::ZERO, &request)?;
//! assert_eq!(receipt.queue_index, 0);
//!
//! // The L1 messenger holds the ETH that earlier deposits locked
//! let l1_messenger = bridge.config().l1.messenger;
//! bridge.l1_mut().fund(l1_messenger, U256::from(1000))?;
//!
//! // L2 messages reach L1 once their batch is finalized
//! bridge.finalize_l2_batch()?;
//! let outcome = bridge.relay_message(Layer::L2, &receipt.message, alice)?;
//! assert!(outcome.error().is_none());
//! assert_eq!(bridge.l1().weth_balance_of(alice), U256::from(1000));
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - **Canonical message encoding**: the message hash is keccak256 of the
//!   `relayMessage(address,address,uint256,uint256,bytes)` call
//! - **Replay protection**: relaying an executed message is a no-op
//! - **Atomic transitions**: every operation commits fully or not at all, and
//!   a reverted inner relay call rolls back its value and custody changes
//! - **Layer-specific relay authentication**: address aliasing on L2, batch
//!   inclusion proofs on L1
//! - **Wire-compatible events** for off-chain indexers and relayers
//!
//! ## Public API
//!
//! - [`Bridge`] and [`Domain`] - both layers, and one layer, of the bridge
//! - [`Relayer`] - the off-chain loop delivering messages between layers
//! - [`CrossDomainMessage`], [`MessageStatus`] and [`RelayOutcome`] - message types
//! - [`apply_l1_to_l2_alias`] and [`undo_l1_to_l2_alias`] - address aliasing
//! - [`BridgeConfig`] and [`DomainConfig`] - deployment configuration
//! - [`BridgeError`] and [`Result`] - Error types for error handling
//! - [`contracts`] - ABI bindings for every event and call on the wire

mod bridge;
mod config;
mod error;
mod protocol;
mod relayer;

pub mod contracts;
pub mod domain;

pub use bridge::Bridge;
pub use config::{BridgeConfig, DomainConfig, CONFIG_ENV_VAR};
pub use domain::fees::ExcessFeePolicy;
pub use domain::gateway::{
    CallbackContext, GatewayCallback, GatewayPairing, TransferParams, TransferRequest,
};
pub use domain::messenger::{MessageRequest, SendReceipt, DEFAULT_MAX_GAS_LIMIT};
pub use domain::rollup::MessageProof;
pub use domain::{decode_events, Domain};
pub use error::{BridgeError, Result, TokenRole};
pub use protocol::{
    apply_l1_to_l2_alias, undo_l1_to_l2_alias, CrossDomainMessage, InvalidLayer, Layer,
    MessageHash, MessageStatus, RelayOutcome, RelayStatus, L1_TO_L2_ALIAS_OFFSET,
};
pub use relayer::{RelayReport, Relayer, TrackedMessage};

// Public module for advanced users who need custom instrumentation
pub mod spans;

// Fake callback recipients for tests
pub mod testing;
