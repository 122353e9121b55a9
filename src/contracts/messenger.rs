//! Messenger and message queue ABI bindings
//!
//! Off-chain relayers and indexers filter on these exact signatures, so field
//! order and `indexed` markers must not change.

use alloy_sol_types::sol;

sol! {
    /// Emitted by the sending messenger for every outgoing message.
    #[derive(Debug, PartialEq, Eq)]
    event SentMessage(
        address indexed sender,
        address indexed target,
        uint256 value,
        uint256 messageNonce,
        uint256 gasLimit,
        bytes message
    );

    /// Emitted by the receiving messenger when the inner call succeeded.
    #[derive(Debug, PartialEq, Eq)]
    event RelayedMessage(bytes32 indexed messageHash);

    /// Emitted by the receiving messenger when the inner call reverted.
    #[derive(Debug, PartialEq, Eq)]
    event FailedRelayedMessage(bytes32 indexed messageHash);

    #[derive(Debug, PartialEq, Eq)]
    event Paused(address account);

    #[derive(Debug, PartialEq, Eq)]
    event Unpaused(address account);

    /// Emitted when the owner changes the counterpart fee per gas unit.
    #[derive(Debug, PartialEq, Eq)]
    event UpdateFeePerGas(uint256 oldFeePerGas, uint256 newFeePerGas);

    /// Emitted by the message queue for every appended message hash.
    #[derive(Debug, PartialEq, Eq)]
    event AppendMessage(uint256 index, bytes32 messageHash);

    /// Emitted on L1 when a batch of L2 messages becomes provable.
    #[derive(Debug, PartialEq, Eq)]
    event FinalizeBatch(uint256 indexed batchIndex, uint256 messageCount);

    /// Canonical call shape of a cross-domain message.
    ///
    /// Signature: relayMessage(address,address,uint256,uint256,bytes)
    /// Selector: 0x8ef1332e
    #[derive(Debug, PartialEq, Eq)]
    function relayMessage(
        address from,
        address to,
        uint256 value,
        uint256 nonce,
        bytes message
    ) external;
}
