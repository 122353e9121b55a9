//! Integration tests for the WETH bridge across both layers
//!
//! Every test deploys the devnet configuration and drives it the way users,
//! relayers and operators would: through the public `Bridge`, `Domain` and
//! `Relayer` APIs, checking balances, statuses and emitted events.

use std::sync::{Arc, Mutex};

use alloy_primitives::{address, Address, Bytes, U256};
use alloy_sol_types::{SolCall, SolEvent};
use rollup_bridge::contracts::gateway::{
    finalizeWithdrawERC20Call, DepositERC20, FinalizeDepositERC20,
    FinalizeWithdrawERC20, SetERC20Gateway, WithdrawERC20,
};
use rollup_bridge::contracts::messenger::{
    FailedRelayedMessage, RelayedMessage, SentMessage, UpdateFeePerGas,
};
use rollup_bridge::testing::{RecordingReceiver, RevertingReceiver};
use rollup_bridge::{
    Bridge, BridgeConfig, BridgeError, CrossDomainMessage, ExcessFeePolicy, Layer,
    MessageProof, MessageRequest, MessageStatus, RelayOutcome, RelayReport, RelayStatus, Relayer,
    TokenRole, TransferParams, TransferRequest,
};
use rstest::{fixture, rstest};
use tracing_subscriber::layer::SubscriberExt;

const ALICE: Address = address!("a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1");
const BOB: Address = address!("b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0");
const MALLORY: Address = address!("6666666666666666666666666666666666666666");
const RELAYER: Address = address!("eeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee");

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[fixture]
fn bridge() -> Bridge {
    init_tracing();
    Bridge::devnet().unwrap()
}

/// Gives `account` `amount` of WETH on `layer`
fn mint_weth(bridge: &mut Bridge, layer: Layer, account: Address, amount: u64) {
    let domain = bridge.domain_mut(layer);
    domain.fund(account, U256::from(amount)).unwrap();
    domain.wrap(account, U256::from(amount)).unwrap();
}

fn weth_request(bridge: &Bridge, layer: Layer, amount: u64, gas_limit: u64) -> TransferRequest {
    TransferRequest::builder()
        .token(bridge.domain(layer).weth_address())
        .amount(U256::from(amount))
        .gas_limit(gas_limit)
        .build()
}

fn owner(bridge: &Bridge) -> Address {
    bridge.config().l1.owner
}

// ============================================================================
// Initiating transfers
// ============================================================================

#[rstest]
fn test_withdraw_queues_message(mut bridge: Bridge) {
    mint_weth(&mut bridge, Layer::L2, ALICE, 1000);
    let config = bridge.config().clone();
    let messenger_before = bridge.l2().balance_of(config.l2.messenger);

    let request = weth_request(&bridge, Layer::L2, 1000, 21_000);
    let receipt = bridge.l2_mut().withdraw_erc20(ALICE, U256::ZERO, &request).unwrap();

    assert_eq!(receipt.queue_index, 0);
    assert_eq!(receipt.fee, U256::ZERO);

    let l2 = bridge.l2();
    let withdrawals = l2.events::<WithdrawERC20>();
    assert_eq!(withdrawals.len(), 1);
    assert_eq!(withdrawals[0].from, ALICE);
    assert_eq!(withdrawals[0].to, ALICE);
    assert_eq!(withdrawals[0].amount, U256::from(1000));
    assert_eq!(withdrawals[0].l1Token, config.l1.weth);
    assert_eq!(withdrawals[0].l2Token, config.l2.weth);

    assert_eq!(
        l2.balance_of(config.l2.messenger),
        messenger_before + U256::from(1000)
    );
    assert_eq!(l2.balance_of(config.l2.fee_vault), U256::ZERO);
    assert_eq!(l2.weth_balance_of(ALICE), U256::ZERO);
    assert_eq!(l2.weth_total_supply(), U256::ZERO);

    let payload = finalizeWithdrawERC20Call {
        l1Token: config.l1.weth,
        l2Token: config.l2.weth,
        from: ALICE,
        to: ALICE,
        amount: U256::from(1000),
        data: Bytes::new(),
    }
    .abi_encode();
    let expected = CrossDomainMessage::new(
        config.l2.gateway,
        config.l1.gateway,
        U256::from(1000),
        U256::ZERO,
        payload.into(),
    );
    assert_eq!(receipt.message, expected);
    assert_eq!(receipt.message_hash, expected.hash());
    assert_eq!(l2.queued_message(0), Some(expected.hash()));
    assert_eq!(l2.message_status(expected.hash()), MessageStatus::Sent);
}

#[rstest]
fn test_deposit_locks_eth_in_messenger(mut bridge: Bridge) {
    mint_weth(&mut bridge, Layer::L1, ALICE, 700);
    let request = TransferRequest::builder()
        .token(bridge.l1().weth_address())
        .to(BOB)
        .amount(U256::from(700))
        .gas_limit(200_000)
        .build();
    let receipt = bridge.l1_mut().deposit_erc20(ALICE, U256::ZERO, &request).unwrap();

    let l1 = bridge.l1();
    assert_eq!(l1.balance_of(l1.messenger_address()), U256::from(700));
    assert_eq!(l1.weth_total_supply(), U256::ZERO);
    assert_eq!(l1.weth_balance_of(l1.gateway_address()), U256::ZERO);

    let deposits = l1.events::<DepositERC20>();
    assert_eq!(deposits[0].to, BOB);
    assert_eq!(receipt.message.target, bridge.config().l2.gateway);
    assert_eq!(receipt.message.sender, bridge.config().l1.gateway);
}

#[rstest]
fn test_zero_amount_is_rejected(mut bridge: Bridge) {
    mint_weth(&mut bridge, Layer::L1, ALICE, 10);
    let request = weth_request(&bridge, Layer::L1, 0, 21_000);

    let err = bridge.l1_mut().deposit_erc20(ALICE, U256::ZERO, &request).unwrap_err();

    assert!(matches!(err, BridgeError::ZeroAmount));
    assert_eq!(bridge.l1().next_queue_index(), 0);
    assert!(bridge.l1().logs().iter().all(|log| {
        log.data.topics().first() != Some(&SentMessage::SIGNATURE_HASH)
    }));
}

#[rstest]
fn test_unsupported_token_is_rejected(mut bridge: Bridge) {
    let request = TransferRequest::builder()
        .token(Address::repeat_byte(0x77))
        .amount(U256::from(1))
        .gas_limit(21_000)
        .build();
    let err = bridge.l1_mut().deposit_erc20(ALICE, U256::ZERO, &request).unwrap_err();
    assert!(matches!(err, BridgeError::UnsupportedToken { .. }));
}

#[rstest]
fn test_gas_limit_above_maximum(mut bridge: Bridge) {
    mint_weth(&mut bridge, Layer::L1, ALICE, 10);
    let request = weth_request(&bridge, Layer::L1, 10, 10_000_001);
    let err = bridge.l1_mut().deposit_erc20(ALICE, U256::ZERO, &request).unwrap_err();
    insta::assert_snapshot!(err, @"Gas limit 10000001 exceeds maximum 10000000");
    assert_eq!(bridge.l1().weth_balance_of(ALICE), U256::from(10));
}

#[rstest]
fn test_indexed_fields_are_topics(mut bridge: Bridge) {
    mint_weth(&mut bridge, Layer::L1, ALICE, 5);
    let request = weth_request(&bridge, Layer::L1, 5, 21_000);
    bridge.l1_mut().deposit_erc20(ALICE, U256::ZERO, &request).unwrap();

    let l1 = bridge.l1();
    let deposit_log = l1
        .logs()
        .iter()
        .find(|log| log.data.topics()[0] == DepositERC20::SIGNATURE_HASH)
        .unwrap();
    assert_eq!(deposit_log.data.topics().len(), 4);
    assert_eq!(deposit_log.address, l1.gateway_address());
    assert_eq!(deposit_log.data.topics()[3], ALICE.into_word());

    let sent_log = l1
        .logs()
        .iter()
        .find(|log| log.data.topics()[0] == SentMessage::SIGNATURE_HASH)
        .unwrap();
    assert_eq!(sent_log.data.topics().len(), 3);
    assert_eq!(sent_log.address, l1.messenger_address());
}

// ============================================================================
// Fees
// ============================================================================

#[rstest]
fn test_fee_is_gas_limit_times_price(mut bridge: Bridge) {
    let owner = owner(&bridge);
    bridge.l1_mut().set_fee_per_gas(owner, U256::from(3)).unwrap();
    mint_weth(&mut bridge, Layer::L1, ALICE, 100);
    bridge.l1_mut().fund(ALICE, U256::from(300_000)).unwrap();

    let request = weth_request(&bridge, Layer::L1, 100, 100_000);
    let receipt = bridge
        .l1_mut()
        .deposit_erc20(ALICE, U256::from(300_000), &request)
        .unwrap();

    let l1 = bridge.l1();
    assert_eq!(receipt.fee, U256::from(300_000));
    assert_eq!(l1.estimate_fee(100_000).unwrap(), U256::from(300_000));
    assert_eq!(l1.balance_of(l1.fee_vault_address()), U256::from(300_000));
    assert_eq!(l1.balance_of(l1.messenger_address()), U256::from(100));
    assert_eq!(l1.balance_of(ALICE), U256::ZERO);

    let updates = l1.events::<UpdateFeePerGas>();
    assert_eq!(updates[0].oldFeePerGas, U256::ZERO);
    assert_eq!(updates[0].newFeePerGas, U256::from(3));
}

#[rstest]
fn test_insufficient_fee(mut bridge: Bridge) {
    let owner = owner(&bridge);
    bridge.l1_mut().set_fee_per_gas(owner, U256::from(2)).unwrap();
    mint_weth(&mut bridge, Layer::L1, ALICE, 100);
    bridge.l1_mut().fund(ALICE, U256::from(100_000)).unwrap();

    let request = weth_request(&bridge, Layer::L1, 100, 50_000);
    let err = bridge
        .l1_mut()
        .deposit_erc20(ALICE, U256::from(99_999), &request)
        .unwrap_err();

    insta::assert_snapshot!(err, @"Insufficient fee: required 100100, provided 100099");
    assert_eq!(bridge.l1().balance_of(ALICE), U256::from(100_000));
    assert_eq!(bridge.l1().weth_balance_of(ALICE), U256::from(100));
}

#[rstest]
fn test_fee_overflow_is_rejected(mut bridge: Bridge) {
    let owner = owner(&bridge);
    bridge.l1_mut().set_fee_per_gas(owner, U256::MAX).unwrap();
    mint_weth(&mut bridge, Layer::L1, ALICE, 100);

    let request = weth_request(&bridge, Layer::L1, 100, 2);
    let err = bridge
        .l1_mut()
        .deposit_erc20(ALICE, U256::ZERO, &request)
        .unwrap_err();

    assert!(matches!(err, BridgeError::FeeOverflow { gas_limit: 2, .. }));
    assert_eq!(bridge.l1().next_queue_index(), 0);
    assert_eq!(bridge.l1().weth_balance_of(ALICE), U256::from(100));
}

#[rstest]
#[case::reject(ExcessFeePolicy::Reject, None)]
#[case::retain(ExcessFeePolicy::RetainInVault, Some((0, 150)))]
#[case::refund(ExcessFeePolicy::Refund, Some((50, 100)))]
fn test_excess_fee_policy(#[case] policy: ExcessFeePolicy, #[case] expected: Option<(u64, u64)>) {
    init_tracing();
    let mut config = BridgeConfig::devnet();
    config.l1.fee_per_gas = U256::from(1);
    config.l1.excess_fee_policy = policy;
    let mut bridge = Bridge::new(config).unwrap();
    mint_weth(&mut bridge, Layer::L1, ALICE, 10);
    bridge.l1_mut().fund(ALICE, U256::from(150)).unwrap();

    let request = weth_request(&bridge, Layer::L1, 10, 100);
    let result = bridge.l1_mut().deposit_erc20(ALICE, U256::from(150), &request);

    let l1 = bridge.l1();
    match expected {
        None => {
            assert!(matches!(result, Err(BridgeError::ExcessFee { .. })));
            assert_eq!(l1.balance_of(ALICE), U256::from(150));
        }
        Some((alice, vault)) => {
            assert_eq!(result.unwrap().fee, U256::from(100));
            assert_eq!(l1.balance_of(ALICE), U256::from(alice));
            assert_eq!(l1.balance_of(l1.fee_vault_address()), U256::from(vault));
        }
    }
}

// ============================================================================
// Relaying and finalizing
// ============================================================================

#[rstest]
fn test_deposit_round_trip(mut bridge: Bridge) {
    mint_weth(&mut bridge, Layer::L1, ALICE, 1000);
    let request = weth_request(&bridge, Layer::L1, 1000, 200_000);
    let receipt = bridge.l1_mut().deposit_erc20(ALICE, U256::ZERO, &request).unwrap();

    let outcome = bridge.relay_message(Layer::L1, &receipt.message, RELAYER).unwrap();
    assert!(matches!(outcome, RelayOutcome::Relayed { .. }));

    let l2 = bridge.l2();
    assert_eq!(l2.weth_balance_of(ALICE), U256::from(1000));
    assert_eq!(l2.weth_total_supply(), U256::from(1000));
    assert!(l2.is_message_executed(receipt.message_hash));
    assert_eq!(
        bridge.message_status(Layer::L1, receipt.message_hash),
        MessageStatus::ExecutedOk
    );

    let finalized = l2.events::<FinalizeDepositERC20>();
    assert_eq!(finalized.len(), 1);
    assert_eq!(finalized[0].from, ALICE);
    assert_eq!(finalized[0].amount, U256::from(1000));
    assert_eq!(l2.events::<RelayedMessage>()[0].messageHash, receipt.message_hash);
}

/// Collects the names of spans opened while it is the active subscriber
#[derive(Clone, Default)]
struct SpanNames(Arc<Mutex<Vec<&'static str>>>);

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for SpanNames {
    fn on_new_span(
        &self,
        attrs: &tracing::span::Attributes<'_>,
        _id: &tracing::span::Id,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        self.0.lock().unwrap().push(attrs.metadata().name());
    }
}

#[test]
fn test_relayed_finalize_opens_finalize_span() {
    let names = SpanNames::default();
    let subscriber = tracing_subscriber::registry().with(names.clone());

    tracing::subscriber::with_default(subscriber, || {
        let mut bridge = Bridge::devnet().unwrap();
        mint_weth(&mut bridge, Layer::L1, ALICE, 1000);
        let request = weth_request(&bridge, Layer::L1, 1000, 200_000);
        let receipt = bridge.l1_mut().deposit_erc20(ALICE, U256::ZERO, &request).unwrap();
        bridge.relay_message(Layer::L1, &receipt.message, RELAYER).unwrap();
    });

    let names = names.0.lock().unwrap();
    let relay = names.iter().position(|name| *name == "rollup_bridge.relay_message");
    let finalize = names.iter().position(|name| *name == "rollup_bridge.finalize");
    assert!(relay.is_some());
    assert!(finalize > relay);
}

#[rstest]
fn test_withdrawal_needs_finalized_batch(mut bridge: Bridge) {
    mint_weth(&mut bridge, Layer::L1, ALICE, 400);
    let deposit = weth_request(&bridge, Layer::L1, 400, 200_000);
    let receipt = bridge.l1_mut().deposit_erc20(ALICE, U256::ZERO, &deposit).unwrap();
    bridge.relay_message(Layer::L1, &receipt.message, RELAYER).unwrap();

    let withdrawal = weth_request(&bridge, Layer::L2, 400, 21_000);
    let receipt = bridge.l2_mut().withdraw_erc20(ALICE, U256::ZERO, &withdrawal).unwrap();

    let err = bridge
        .relay_message(Layer::L2, &receipt.message, RELAYER)
        .unwrap_err();
    assert!(matches!(err, BridgeError::InvalidProof { .. }));

    assert_eq!(bridge.finalize_l2_batch().unwrap(), Some(0));
    assert_eq!(bridge.l1().batch_of(receipt.message_hash), Some(0));
    bridge.relay_message(Layer::L2, &receipt.message, RELAYER).unwrap();

    let l1 = bridge.l1();
    assert_eq!(l1.weth_balance_of(ALICE), U256::from(400));
    assert_eq!(l1.balance_of(l1.messenger_address()), U256::ZERO);
    assert_eq!(l1.events::<FinalizeWithdrawERC20>()[0].to, ALICE);
}

#[rstest]
fn test_relay_with_wrong_batch_proof(mut bridge: Bridge) {
    mint_weth(&mut bridge, Layer::L2, ALICE, 10);
    let request = weth_request(&bridge, Layer::L2, 10, 21_000);
    let receipt = bridge.l2_mut().withdraw_erc20(ALICE, U256::ZERO, &request).unwrap();
    bridge.finalize_l2_batch().unwrap();

    let err = bridge
        .l1_mut()
        .relay_message_with_proof(RELAYER, &receipt.message, MessageProof { batch_index: 5 })
        .unwrap_err();
    assert!(matches!(err, BridgeError::InvalidProof { .. }));
}

#[rstest]
fn test_relay_on_l2_requires_aliased_messenger(mut bridge: Bridge) {
    mint_weth(&mut bridge, Layer::L1, ALICE, 10);
    let request = weth_request(&bridge, Layer::L1, 10, 21_000);
    let receipt = bridge.l1_mut().deposit_erc20(ALICE, U256::ZERO, &request).unwrap();

    // The unaliased L1 messenger address is not a valid caller on L2
    let l1_messenger = bridge.config().l1.messenger;
    let err = bridge
        .l2_mut()
        .relay_message(l1_messenger, &receipt.message)
        .unwrap_err();
    assert!(matches!(err, BridgeError::UnauthorizedRelayer { layer: Layer::L2, .. }));
    assert_eq!(
        bridge.l2().message_status(receipt.message_hash),
        MessageStatus::Unsent
    );
}

#[rstest]
fn test_relay_is_idempotent(mut bridge: Bridge) {
    mint_weth(&mut bridge, Layer::L1, ALICE, 1000);
    let request = weth_request(&bridge, Layer::L1, 1000, 200_000);
    let receipt = bridge.l1_mut().deposit_erc20(ALICE, U256::ZERO, &request).unwrap();

    bridge.relay_message(Layer::L1, &receipt.message, RELAYER).unwrap();
    let second = bridge.relay_message(Layer::L1, &receipt.message, RELAYER).unwrap();

    assert!(matches!(
        second,
        RelayOutcome::AlreadyExecuted {
            status: MessageStatus::ExecutedOk,
            ..
        }
    ));
    let l2 = bridge.l2();
    assert_eq!(l2.weth_balance_of(ALICE), U256::from(1000));
    assert_eq!(l2.events::<RelayedMessage>().len(), 1);
    assert_eq!(l2.events::<FinalizeDepositERC20>().len(), 1);
}

#[rstest]
fn test_forbidden_relay_targets(mut bridge: Bridge) {
    let l2 = bridge.config().l2.clone();
    for target in [l2.messenger, l2.message_queue] {
        let message = CrossDomainMessage::new(ALICE, target, U256::ZERO, U256::ZERO, Bytes::new());
        let err = bridge.relay_message(Layer::L1, &message, RELAYER).unwrap_err();
        assert!(matches!(err, BridgeError::ForbiddenTarget { .. }));
    }
}

// ============================================================================
// Authorization of finalize calls
// ============================================================================

fn finalize_params(bridge: &Bridge, to: Address, amount: u64) -> TransferParams {
    TransferParams::builder()
        .l1_token(bridge.config().l1.weth)
        .l2_token(bridge.config().l2.weth)
        .from(MALLORY)
        .to(to)
        .amount(U256::from(amount))
        .build()
}

#[rstest]
fn test_direct_finalize_is_rejected(mut bridge: Bridge) {
    let params = finalize_params(&bridge, MALLORY, 1000);
    let l2_messenger = bridge.config().l2.messenger;
    let l2 = bridge.l2_mut();

    let err = l2.finalize_deposit_erc20(MALLORY, U256::ZERO, &params).unwrap_err();
    assert!(matches!(err, BridgeError::OnlyMessenger { caller } if caller == MALLORY));

    // Even the messenger itself needs a cross-domain sender
    let err = l2
        .finalize_deposit_erc20(l2_messenger, U256::from(1000), &params)
        .unwrap_err();
    insta::assert_snapshot!(err, @"Cross-domain sender None is not the counterpart gateway");
    assert_eq!(l2.weth_balance_of(MALLORY), U256::ZERO);

    let err = l2.finalize_withdraw_erc20(MALLORY, U256::ZERO, &params).unwrap_err();
    assert!(matches!(err, BridgeError::UnknownSelector { .. }));
}

#[rstest]
fn test_forged_message_fails_relay(mut bridge: Bridge) {
    let config = bridge.config().clone();
    let params = finalize_params(&bridge, MALLORY, 1000);
    let messenger_before = bridge.l2().balance_of(config.l2.messenger);

    // Mallory sends the gateway's finalize call herself
    bridge.l1_mut().fund(MALLORY, U256::from(1000)).unwrap();
    let request = MessageRequest::builder()
        .target(config.l2.gateway)
        .value(U256::from(1000))
        .payload(params.finalize_calldata(Layer::L2))
        .gas_limit(100_000)
        .build();
    let receipt = bridge
        .l1_mut()
        .send_message(MALLORY, U256::from(1000), &request)
        .unwrap();

    let outcome = bridge.relay_message(Layer::L1, &receipt.message, RELAYER).unwrap();

    assert!(matches!(
        outcome.error(),
        Some(BridgeError::OnlyCounterpart { sender: Some(sender) }) if *sender == MALLORY
    ));
    let l2 = bridge.l2();
    assert_eq!(l2.message_status(receipt.message_hash), MessageStatus::ExecutedFailed);
    assert_eq!(l2.weth_balance_of(MALLORY), U256::ZERO);
    assert_eq!(l2.balance_of(config.l2.messenger), messenger_before);
    assert_eq!(l2.balance_of(config.l2.gateway), U256::ZERO);
    assert_eq!(l2.events::<FailedRelayedMessage>().len(), 1);
    assert!(l2.events::<FinalizeDepositERC20>().is_empty());
}

#[rstest]
#[case::l1_token(true, TokenRole::L1)]
#[case::l2_token(false, TokenRole::L2)]
fn test_token_mismatch_fails_relay(
    mut bridge: Bridge,
    #[case] corrupt_l1: bool,
    #[case] role: TokenRole,
) {
    let config = bridge.config().clone();
    let mut params = finalize_params(&bridge, ALICE, 10);
    if corrupt_l1 {
        params.l1_token = config.l2.weth;
    } else {
        params.l2_token = config.l1.weth;
    }

    let messenger_before = bridge.l2().balance_of(config.l2.messenger);
    let supply_before = bridge.l2().weth_total_supply();

    // A message really sent by the L1 gateway, carrying the wrong pairing
    bridge.l1_mut().fund(config.l1.gateway, U256::from(10)).unwrap();
    let request = MessageRequest::builder()
        .target(config.l2.gateway)
        .value(U256::from(10))
        .payload(params.finalize_calldata(Layer::L2))
        .gas_limit(100_000)
        .build();
    let receipt = bridge
        .l1_mut()
        .send_message(config.l1.gateway, U256::from(10), &request)
        .unwrap();

    let outcome = bridge.relay_message(Layer::L1, &receipt.message, RELAYER).unwrap();
    assert!(matches!(
        outcome.error(),
        Some(BridgeError::TokenMismatch { role: actual, .. }) if *actual == role
    ));

    let l2 = bridge.l2();
    assert_eq!(l2.message_status(receipt.message_hash), MessageStatus::ExecutedFailed);
    assert_eq!(l2.weth_balance_of(ALICE), U256::ZERO);
    assert_eq!(l2.balance_of(config.l2.messenger), messenger_before);
    assert_eq!(l2.balance_of(config.l2.gateway), U256::ZERO);
    assert_eq!(l2.weth_balance_of(config.l2.gateway), U256::ZERO);
    assert_eq!(l2.weth_total_supply(), supply_before);
    assert!(l2.events::<FinalizeDepositERC20>().is_empty());
}

#[rstest]
fn test_value_mismatch_fails_relay(mut bridge: Bridge) {
    let config = bridge.config().clone();
    let params = finalize_params(&bridge, ALICE, 10);
    let messenger_before = bridge.l2().balance_of(config.l2.messenger);

    // The L1 gateway claims 10 but only attaches 5
    bridge.l1_mut().fund(config.l1.gateway, U256::from(5)).unwrap();
    let request = MessageRequest::builder()
        .target(config.l2.gateway)
        .value(U256::from(5))
        .payload(params.finalize_calldata(Layer::L2))
        .gas_limit(100_000)
        .build();
    let receipt = bridge
        .l1_mut()
        .send_message(config.l1.gateway, U256::from(5), &request)
        .unwrap();

    let outcome = bridge.relay_message(Layer::L1, &receipt.message, RELAYER).unwrap();
    assert!(matches!(
        outcome.error(),
        Some(BridgeError::ValueMismatch { expected, actual })
            if *expected == U256::from(10) && *actual == U256::from(5)
    ));

    let l2 = bridge.l2();
    assert_eq!(l2.message_status(receipt.message_hash), MessageStatus::ExecutedFailed);
    assert_eq!(l2.weth_balance_of(ALICE), U256::ZERO);
    assert_eq!(l2.balance_of(config.l2.messenger), messenger_before);
    assert_eq!(l2.balance_of(config.l2.gateway), U256::ZERO);
    assert!(l2.events::<FinalizeDepositERC20>().is_empty());
}

// ============================================================================
// Recipient callbacks
// ============================================================================

fn deposit_with_data(bridge: &mut Bridge, to: Address, amount: u64, data: &[u8]) -> CrossDomainMessage {
    mint_weth(bridge, Layer::L1, ALICE, amount);
    let request = TransferRequest::builder()
        .token(bridge.l1().weth_address())
        .to(to)
        .amount(U256::from(amount))
        .data(Bytes::copy_from_slice(data))
        .gas_limit(300_000)
        .build();
    bridge
        .l1_mut()
        .deposit_erc20(ALICE, U256::ZERO, &request)
        .unwrap()
        .message
}

#[rstest]
fn test_callback_runs_after_transfer(mut bridge: Bridge) {
    let receiver = RecordingReceiver::new();
    bridge.l2_mut().register_callback(BOB, Arc::new(receiver.clone()));

    let message = deposit_with_data(&mut bridge, BOB, 250, &[0xde, 0xad]);
    bridge.relay_message(Layer::L1, &message, RELAYER).unwrap();

    let calls = receiver.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].recipient, BOB);
    assert_eq!(calls[0].token, bridge.config().l2.weth);
    assert_eq!(calls[0].gateway, bridge.config().l2.gateway);
    assert_eq!(calls[0].token_balance, U256::from(250));
    assert_eq!(calls[0].data, Bytes::from(vec![0xde, 0xad]));
}

#[rstest]
fn test_empty_data_skips_callback(mut bridge: Bridge) {
    let receiver = RecordingReceiver::new();
    bridge.l2_mut().register_callback(BOB, Arc::new(receiver.clone()));

    let message = deposit_with_data(&mut bridge, BOB, 250, &[]);
    bridge.relay_message(Layer::L1, &message, RELAYER).unwrap();

    assert_eq!(receiver.call_count(), 0);
    assert_eq!(bridge.l2().weth_balance_of(BOB), U256::from(250));
}

#[rstest]
fn test_callback_to_account_without_code_fails(mut bridge: Bridge) {
    let message = deposit_with_data(&mut bridge, BOB, 250, &[1]);
    let outcome = bridge.relay_message(Layer::L1, &message, RELAYER).unwrap();
    assert!(matches!(
        outcome.error(),
        Some(BridgeError::RecipientNotContract { recipient }) if *recipient == BOB
    ));
    assert_eq!(bridge.l2().weth_balance_of(BOB), U256::ZERO);
}

#[rstest]
fn test_failed_relay_conserves_value_and_replays(mut bridge: Bridge) {
    let receiver = RevertingReceiver::failing_times("not ready", 1);
    bridge.l2_mut().register_callback(BOB, Arc::new(receiver.clone()));
    let message = deposit_with_data(&mut bridge, BOB, 600, &[7]);

    let l2_messenger = bridge.config().l2.messenger;
    let messenger_before = bridge.l2().balance_of(l2_messenger);
    let supply_before = bridge.l2().weth_total_supply();

    let outcome = bridge.relay_message(Layer::L1, &message, RELAYER).unwrap();
    insta::assert_snapshot!(outcome.error().unwrap(), @"Callback reverted: not ready");

    let l2 = bridge.l2();
    assert_eq!(l2.balance_of(l2_messenger), messenger_before);
    assert_eq!(l2.weth_total_supply(), supply_before);
    assert_eq!(l2.weth_balance_of(BOB), U256::ZERO);
    assert_eq!(l2.weth_balance_of(l2.gateway_address()), U256::ZERO);

    // Relaying again does not run the inner call
    let again = bridge.relay_message(Layer::L1, &message, RELAYER).unwrap();
    assert!(matches!(
        again,
        RelayOutcome::AlreadyExecuted {
            status: MessageStatus::ExecutedFailed,
            ..
        }
    ));
    assert_eq!(receiver.attempts(), 1);

    let owner = owner(&bridge);
    let err = bridge
        .l2_mut()
        .replay_failed_message(MALLORY, &message)
        .unwrap_err();
    assert!(matches!(err, BridgeError::NotOwner { .. }));

    let replayed = bridge.l2_mut().replay_failed_message(owner, &message).unwrap();
    assert!(replayed.error().is_none());
    assert_eq!(receiver.attempts(), 2);

    let l2 = bridge.l2();
    assert_eq!(l2.weth_balance_of(BOB), U256::from(600));
    assert_eq!(l2.balance_of(l2_messenger), messenger_before - U256::from(600));
    assert_eq!(l2.message_status(message.hash()), MessageStatus::ExecutedOk);

    let err = bridge
        .l2_mut()
        .replay_failed_message(owner, &message)
        .unwrap_err();
    assert!(matches!(
        err,
        BridgeError::NotReplayable {
            status: MessageStatus::ExecutedOk,
            ..
        }
    ));
}

// ============================================================================
// Router
// ============================================================================

#[rstest]
fn test_router_deposit(mut bridge: Bridge) {
    mint_weth(&mut bridge, Layer::L1, ALICE, 300);
    let router = bridge.l1().router_address();
    let request = weth_request(&bridge, Layer::L1, 300, 100_000);

    let err = bridge
        .l1_mut()
        .router_deposit_erc20(ALICE, U256::ZERO, &request)
        .unwrap_err();
    assert!(matches!(err, BridgeError::InsufficientAllowance { .. }));

    bridge.l1_mut().approve(ALICE, router, U256::from(300));
    let receipt = bridge
        .l1_mut()
        .router_deposit_erc20(ALICE, U256::ZERO, &request)
        .unwrap();

    let deposits = bridge.l1().events::<DepositERC20>();
    assert_eq!(deposits[0].from, ALICE);
    assert_eq!(deposits[0].to, ALICE);
    assert_eq!(bridge.l1().weth_allowance(ALICE, router), U256::ZERO);

    bridge.relay_message(Layer::L1, &receipt.message, RELAYER).unwrap();
    assert_eq!(bridge.l2().weth_balance_of(ALICE), U256::from(300));
}

#[rstest]
fn test_router_gateway_registration(mut bridge: Bridge) {
    let config = bridge.config().clone();
    let registered = bridge.l2().events::<SetERC20Gateway>();
    assert_eq!(registered[0].token, config.l2.weth);
    assert_eq!(registered[0].newGateway, config.l2.gateway);

    // Removing the mapping leaves the token without a route
    bridge
        .l2_mut()
        .set_gateway(config.l2.owner, config.l2.weth, Address::ZERO)
        .unwrap();
    mint_weth(&mut bridge, Layer::L2, ALICE, 5);
    let request = weth_request(&bridge, Layer::L2, 5, 21_000);
    let err = bridge
        .l2_mut()
        .router_withdraw_erc20(ALICE, U256::ZERO, &request)
        .unwrap_err();
    assert!(matches!(err, BridgeError::NoGatewayForToken { .. }));
}

// ============================================================================
// Pausing
// ============================================================================

#[rstest]
fn test_pause_blocks_send_and_relay(mut bridge: Bridge) {
    mint_weth(&mut bridge, Layer::L1, ALICE, 20);
    let request = weth_request(&bridge, Layer::L1, 10, 21_000);
    let receipt = bridge.l1_mut().deposit_erc20(ALICE, U256::ZERO, &request).unwrap();

    let owner = owner(&bridge);
    bridge.l1_mut().set_paused(owner, true).unwrap();
    bridge.l2_mut().set_paused(owner, true).unwrap();

    let err = bridge.l1_mut().deposit_erc20(ALICE, U256::ZERO, &request).unwrap_err();
    assert!(matches!(err, BridgeError::Paused));
    let err = bridge.relay_message(Layer::L1, &receipt.message, RELAYER).unwrap_err();
    assert!(matches!(err, BridgeError::Paused));
    assert_eq!(bridge.l2().weth_balance_of(ALICE), U256::ZERO);

    bridge.l2_mut().set_paused(owner, false).unwrap();
    bridge.relay_message(Layer::L1, &receipt.message, RELAYER).unwrap();
    assert_eq!(bridge.l2().weth_balance_of(ALICE), U256::from(10));
}

// ============================================================================
// Relayer
// ============================================================================

#[rstest]
fn test_relayer_delivers_both_directions(mut bridge: Bridge) {
    mint_weth(&mut bridge, Layer::L1, ALICE, 1000);
    mint_weth(&mut bridge, Layer::L2, BOB, 200);

    // Bob's withdrawal is paid out of ETH locked by Alice's deposit
    let deposit = weth_request(&bridge, Layer::L1, 1000, 200_000);
    let deposit = bridge.l1_mut().deposit_erc20(ALICE, U256::ZERO, &deposit).unwrap();
    let withdrawal = weth_request(&bridge, Layer::L2, 200, 21_000);
    let withdrawal = bridge.l2_mut().withdraw_erc20(BOB, U256::ZERO, &withdrawal).unwrap();

    let mut relayer = Relayer::new(RELAYER);
    assert_eq!(relayer.poll(&bridge), 2);
    assert_eq!(relayer.poll(&bridge), 0);

    let report = relayer.relay_pending(&mut bridge);
    assert_eq!(report.confirmed, vec![deposit.message_hash]);
    assert_eq!(report.awaiting_finalization, vec![withdrawal.message_hash]);
    assert_eq!(
        relayer.status(withdrawal.message_hash),
        Some(RelayStatus::Pending)
    );

    bridge.finalize_l2_batch().unwrap();
    let report = relayer.relay_pending(&mut bridge);
    assert_eq!(report.confirmed, vec![withdrawal.message_hash]);
    assert_eq!(relayer.pending_count(), 0);

    assert_eq!(bridge.l2().weth_balance_of(ALICE), U256::from(1000));
    assert_eq!(bridge.l1().weth_balance_of(BOB), U256::from(200));
    let l1_messenger = bridge.config().l1.messenger;
    assert_eq!(bridge.l1().balance_of(l1_messenger), U256::from(800));
}

#[rstest]
fn test_relayer_does_not_retry_failed_messages(mut bridge: Bridge) {
    let message = deposit_with_data(&mut bridge, BOB, 50, &[9]);
    let message_hash = message.hash();

    let mut relayer = Relayer::new(RELAYER);
    relayer.poll(&bridge);
    let report = relayer.relay_pending(&mut bridge);
    assert_eq!(report.failed, vec![message_hash]);
    assert_eq!(relayer.status(message_hash), Some(RelayStatus::RelayFailed));

    assert_eq!(relayer.relay_pending(&mut bridge), RelayReport::default());

    // Bob deploys code and the operator replays
    let receiver = RecordingReceiver::new();
    bridge.l2_mut().register_callback(BOB, Arc::new(receiver.clone()));
    let owner = owner(&bridge);
    bridge.l2_mut().replay_failed_message(owner, &message).unwrap();

    assert!(relayer.message(message_hash).is_some());
    assert_eq!(relayer.sync(&bridge), 1);
    assert_eq!(relayer.status(message_hash), Some(RelayStatus::Confirmed));
    assert!(relayer.message(message_hash).is_none());
    assert_eq!(receiver.call_count(), 1);
}

#[rstest]
fn test_relayer_keeps_rejected_messages_pending(mut bridge: Bridge) {
    mint_weth(&mut bridge, Layer::L1, ALICE, 10);
    let request = weth_request(&bridge, Layer::L1, 10, 21_000);
    let receipt = bridge.l1_mut().deposit_erc20(ALICE, U256::ZERO, &request).unwrap();
    let owner = owner(&bridge);
    bridge.l2_mut().set_paused(owner, true).unwrap();

    let mut relayer = Relayer::new(RELAYER);
    relayer.poll(&bridge);
    let report = relayer.relay_pending(&mut bridge);
    assert_eq!(report.rejected, vec![receipt.message_hash]);
    assert_eq!(relayer.status(receipt.message_hash), Some(RelayStatus::Pending));
    assert_eq!(relayer.pending_count(), 1);
    let tracked = relayer.message(receipt.message_hash).unwrap();
    assert_eq!(tracked.source, Layer::L1);
    assert_eq!(tracked.gas_limit, 21_000);

    bridge.l2_mut().set_paused(owner, false).unwrap();
    let report = relayer.relay_pending(&mut bridge);
    assert_eq!(report.confirmed, vec![receipt.message_hash]);
    assert_eq!(relayer.pending_count(), 0);
    assert!(relayer.message(receipt.message_hash).is_none());
}

#[rstest]
fn test_relayer_drops_confirmed_messages(mut bridge: Bridge) {
    let mut relayer = Relayer::new(RELAYER);
    let mut hashes = Vec::new();
    for _ in 0..3 {
        mint_weth(&mut bridge, Layer::L1, ALICE, 10);
        let request = weth_request(&bridge, Layer::L1, 10, 21_000);
        let receipt = bridge.l1_mut().deposit_erc20(ALICE, U256::ZERO, &request).unwrap();
        assert_eq!(relayer.poll(&bridge), 1);
        assert_eq!(relayer.pending_count(), 1);

        let report = relayer.relay_pending(&mut bridge);
        assert_eq!(report.confirmed, vec![receipt.message_hash]);
        assert_eq!(relayer.pending_count(), 0);
        hashes.push(receipt.message_hash);
    }

    for message_hash in hashes {
        assert_eq!(relayer.status(message_hash), Some(RelayStatus::Confirmed));
        assert!(relayer.message(message_hash).is_none());
    }
    assert_eq!(relayer.poll(&bridge), 0);
    assert_eq!(relayer.relay_pending(&mut bridge), RelayReport::default());
    assert_eq!(bridge.l2().weth_balance_of(ALICE), U256::from(30));
}
