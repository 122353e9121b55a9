use alloy_primitives::{Address, B256, U256};
use thiserror::Error;

use crate::protocol::{Layer, MessageStatus};

/// Which side of a gateway pairing a token check refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRole {
    L1,
    L2,
}

impl std::fmt::Display for TokenRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::L1 => f.write_str("l1 token"),
            Self::L2 => f.write_str("l2 token"),
        }
    }
}

#[derive(Error, Debug)]
pub enum BridgeError {
    // Caller input errors
    #[error("Unsupported token: {token}")]
    UnsupportedToken { token: Address },

    #[error("Amount must be greater than zero")]
    ZeroAmount,

    #[error("Attached value {actual} does not match amount {expected}")]
    ValueMismatch { expected: U256, actual: U256 },

    #[error("Insufficient fee: required {required}, provided {provided}")]
    InsufficientFee { required: U256, provided: U256 },

    #[error("Attached value {provided} exceeds required {required}")]
    ExcessFee { required: U256, provided: U256 },

    #[error("Fee overflow: {fee_per_gas} per gas for {gas_limit} gas")]
    FeeOverflow { fee_per_gas: U256, gas_limit: u64 },

    #[error("Gas limit {gas_limit} exceeds maximum {max}")]
    GasLimitTooHigh { gas_limit: u64, max: u64 },

    #[error("Forbidden relay target: {target}")]
    ForbiddenTarget { target: Address },

    #[error("Token mismatch on {role}: expected {expected}, got {actual}")]
    TokenMismatch {
        role: TokenRole,
        expected: Address,
        actual: Address,
    },

    // Authorization errors
    #[error("Caller {caller} is not the messenger")]
    OnlyMessenger { caller: Address },

    #[error("Cross-domain sender {sender:?} is not the counterpart gateway")]
    OnlyCounterpart { sender: Option<Address> },

    #[error("Caller {caller} is not authorized to relay messages on {layer}")]
    UnauthorizedRelayer { caller: Address, layer: Layer },

    #[error("Message {message_hash} is not part of a finalized batch")]
    InvalidProof { message_hash: B256 },

    #[error("Caller {caller} is not the owner")]
    NotOwner { caller: Address },

    #[error("Messenger is paused")]
    Paused,

    // Lifecycle errors
    #[error("Contract at {contract} is already initialized")]
    AlreadyInitialized { contract: Address },

    #[error("Contract at {contract} is not initialized")]
    NotInitialized { contract: Address },

    #[error("Zero address supplied for {field}")]
    ZeroAddress { field: &'static str },

    #[error("Duplicated message: {message_hash}")]
    DuplicateMessage { message_hash: B256 },

    #[error("Message {message_hash} cannot be replayed from status {status}")]
    NotReplayable {
        message_hash: B256,
        status: MessageStatus,
    },

    #[error("Operation is not available on {layer}")]
    WrongLayer { layer: Layer },

    #[error("Batch {batch_index} is already finalized")]
    BatchAlreadyFinalized { batch_index: u64 },

    // Downstream execution failures
    #[error("Insufficient balance for {account}: has {available}, needs {required}")]
    InsufficientBalance {
        account: Address,
        available: U256,
        required: U256,
    },

    #[error("Insufficient allowance from {owner} to {spender}: has {available}, needs {required}")]
    InsufficientAllowance {
        owner: Address,
        spender: Address,
        available: U256,
        required: U256,
    },

    #[error("Recipient {recipient} has no code to receive the callback")]
    RecipientNotContract { recipient: Address },

    #[error("Callback reverted: {reason}")]
    CallbackReverted { reason: String },

    #[error("Unknown function selector {selector:?} for {target}")]
    UnknownSelector { target: Address, selector: [u8; 4] },

    #[error("No gateway registered for token {token}")]
    NoGatewayForToken { token: Address },

    #[error("Balance overflow for {account}")]
    Overflow { account: Address },

    // Encoding and configuration
    #[error("ABI encoding/decoding error: {0}")]
    Abi(#[from] alloy_sol_types::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
