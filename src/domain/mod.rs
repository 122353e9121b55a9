//! One side of the bridge as an in-process ledger
//!
//! A [`Domain`] owns every contract deployed on one layer: native balances,
//! WETH, the message queue, the gas oracle, the messenger, the gateways and
//! the router, plus batch finalization on L1.
//!
//! Every public operation is a single atomic transition. It runs against a
//! `StateBuffer` holding a copy of the state and the logs emitted so far,
//! and the buffer is committed only if the operation returns `Ok`. The inner
//! call of a relay runs in a nested buffer of its own, so a reverted inner
//! call leaves no trace besides the failure event the messenger records.

pub mod accounts;
pub mod fees;
pub mod gateway;
pub mod messenger;
pub mod queue;
pub mod rollup;
pub mod router;
pub mod weth;

use std::collections::HashMap;
use std::sync::Arc;

use alloy_chains::NamedChain;
use alloy_primitives::{Address, Log, B256, U256};
use alloy_sol_types::SolEvent;
use tracing::debug;

use crate::config::DomainConfig;
use crate::error::{BridgeError, Result};
use crate::protocol::{CrossDomainMessage, Layer, MessageHash, MessageStatus, RelayOutcome};
use crate::spans;

use accounts::Accounts;
use fees::GasOracle;
use gateway::{Gateway, GatewayCallback, GatewayPairing, TransferParams, TransferRequest, WethGateway};
use messenger::{MessageRequest, Messenger, SendReceipt};
use queue::MessageQueue;
use rollup::{BatchInclusion, MessageProof};
use router::GatewayRouter;
use weth::WrappedNative;

/// Parts of a domain no transition can change
#[derive(Debug)]
struct Env {
    layer: Layer,
    chain: NamedChain,
    owner: Address,
    gateway: Address,
    hooks: HashMap<Address, Arc<dyn GatewayCallback>>,
}

#[derive(Debug, Clone)]
struct DomainState {
    accounts: Accounts,
    weth: WrappedNative,
    queue: MessageQueue,
    oracle: GasOracle,
    messenger: Messenger,
    rollup: Option<BatchInclusion>,
    gateways: HashMap<Address, Gateway>,
    router: GatewayRouter,
}

/// Who is calling, with how much value, and on whose behalf across domains
///
/// `xdomain_sender` is only set for calls the messenger makes while relaying
/// and lives exactly as long as that call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CallContext {
    pub(crate) caller: Address,
    pub(crate) value: U256,
    pub(crate) xdomain_sender: Option<Address>,
}

/// Working copy of a domain's state for one transition
pub(crate) struct StateBuffer<'a> {
    env: &'a Env,
    state: DomainState,
    logs: Vec<Log>,
}

impl<'a> StateBuffer<'a> {
    fn new(env: &'a Env, state: DomainState) -> Self {
        Self {
            env,
            state,
            logs: Vec::new(),
        }
    }

    /// Starts a nested call on top of the current state
    fn nested(&self) -> StateBuffer<'a> {
        StateBuffer::new(self.env, self.state.clone())
    }

    /// Adopts the state and logs of a nested call that succeeded
    fn commit(&mut self, inner: StateBuffer<'a>) {
        self.state = inner.state;
        self.logs.extend(inner.logs);
    }

    pub(crate) fn emit<E: SolEvent>(&mut self, emitter: Address, event: &E) {
        self.logs.push(Log {
            address: emitter,
            data: event.encode_log_data(),
        });
    }

    pub(crate) fn only_owner(&self, caller: Address) -> Result<()> {
        if caller != self.env.owner {
            return Err(BridgeError::NotOwner { caller });
        }
        Ok(())
    }

    /// Moves `ctx.value` to `target` and runs `calldata` against it.
    ///
    /// Gateways decode their finalize calls; any other address behaves like an
    /// account without code and only receives the value.
    pub(crate) fn call(&mut self, ctx: &CallContext, target: Address, calldata: &[u8]) -> Result<()> {
        self.state.accounts.transfer(ctx.caller, target, ctx.value)?;
        if self.state.gateways.contains_key(&target) {
            return self.call_gateway(ctx, target, calldata);
        }
        debug!(
            target = %target,
            value = %ctx.value,
            calldata_len = calldata.len(),
            event = "plain_call"
        );
        Ok(())
    }
}

/// One layer of the bridge
///
/// # Example
///
/// ```rust
/// use rollup_bridge::{BridgeConfig, Domain, Layer};
/// use alloy_primitives::{Address, U256};
///
/// let config = BridgeConfig::devnet();
/// let mut l1 = Domain::new(Layer::L1, &config.l1, &config.l2, false).unwrap();
///
/// let alice = Address::repeat_byte(0xa1);
/// l1.fund(alice, U256::from(1000)).unwrap();
/// l1.wrap(alice, U256::from(400)).unwrap();
///
/// assert_eq!(l1.balance_of(alice), U256::from(600));
/// assert_eq!(l1.weth_balance_of(alice), U256::from(400));
/// ```
#[derive(Debug)]
pub struct Domain {
    env: Env,
    state: DomainState,
    logs: Vec<Log>,
}

impl Domain {
    /// Deploys every contract of `layer` as described by `config`.
    ///
    /// `counterpart` is the configuration of the other layer; its messenger is
    /// the only sender this layer's messenger will accept messages from.
    /// Gateways start uninitialized.
    pub fn new(
        layer: Layer,
        config: &DomainConfig,
        counterpart: &DomainConfig,
        testnet: bool,
    ) -> Result<Self> {
        let mut accounts = Accounts::default();
        accounts.credit(config.messenger, config.messenger_genesis_balance)?;

        let state = DomainState {
            accounts,
            weth: WrappedNative::new(config.weth),
            queue: MessageQueue::new(config.message_queue, config.messenger),
            oracle: GasOracle::new(config.fee_per_gas),
            messenger: Messenger::new(
                config.messenger,
                counterpart.messenger,
                config.fee_vault,
                config.max_gas_limit,
                config.excess_fee_policy,
            ),
            rollup: layer.requires_proof().then(BatchInclusion::default),
            gateways: HashMap::from([(
                config.gateway,
                Gateway::Weth(WethGateway::new(config.gateway, layer)),
            )]),
            router: GatewayRouter::new(config.router),
        };
        let env = Env {
            layer,
            chain: layer.named_chain(testnet),
            owner: config.owner,
            gateway: config.gateway,
            hooks: HashMap::new(),
        };
        debug!(
            layer = %layer,
            chain = %env.chain,
            messenger = %config.messenger,
            gateway = %config.gateway,
            event = "domain_deployed"
        );
        Ok(Self {
            env,
            state,
            logs: Vec::new(),
        })
    }

    /// Runs `op` against a copy of the state and keeps the result only on `Ok`
    fn transact<T>(&mut self, op: impl FnOnce(&mut StateBuffer<'_>) -> Result<T>) -> Result<T> {
        let mut buffer = StateBuffer::new(&self.env, self.state.clone());
        let result = op(&mut buffer);
        match result {
            Ok(output) => {
                let StateBuffer { state, logs, .. } = buffer;
                self.state = state;
                self.logs.extend(logs);
                Ok(output)
            }
            Err(error) => {
                spans::record_error(&error);
                Err(error)
            }
        }
    }

    // ---- messaging ----

    /// Sends a message to `request.target` on the other layer.
    ///
    /// `msg_value` must cover `request.value` plus the fee; what happens to
    /// anything beyond that depends on the configured
    /// [`ExcessFeePolicy`](fees::ExcessFeePolicy).
    pub fn send_message(
        &mut self,
        caller: Address,
        msg_value: U256,
        request: &MessageRequest,
    ) -> Result<SendReceipt> {
        let span = spans::send_message(
            self.env.layer,
            caller,
            request.target,
            request.value,
            request.gas_limit,
        );
        let _guard = span.enter();
        self.transact(|tx| tx.send_message(caller, msg_value, request))
    }

    /// Delivers a message from L1 on L2. Only the aliased L1 messenger may call.
    pub fn relay_message(
        &mut self,
        caller: Address,
        message: &CrossDomainMessage,
    ) -> Result<RelayOutcome> {
        let span = spans::relay_message(self.env.layer, &message.hash(), message.nonce);
        let _guard = span.enter();
        self.transact(|tx| tx.relay_message(caller, message, None))
    }

    /// Delivers a message from L2 on L1, proving it is part of a finalized batch.
    pub fn relay_message_with_proof(
        &mut self,
        caller: Address,
        message: &CrossDomainMessage,
        proof: MessageProof,
    ) -> Result<RelayOutcome> {
        let span = spans::relay_message(self.env.layer, &message.hash(), message.nonce);
        let _guard = span.enter();
        self.transact(|tx| tx.relay_message(caller, message, Some(&proof)))
    }

    /// Re-executes a message whose relay failed. Owner only.
    pub fn replay_failed_message(
        &mut self,
        caller: Address,
        message: &CrossDomainMessage,
    ) -> Result<RelayOutcome> {
        let span = spans::replay_message(self.env.layer, &message.hash());
        let _guard = span.enter();
        self.transact(|tx| tx.replay_failed_message(caller, message))
    }

    // ---- gateway ----

    /// Binds `gateway` to its counterpart, router, messenger and tokens. Owner only, once.
    pub fn initialize_gateway(
        &mut self,
        caller: Address,
        gateway: Address,
        pairing: GatewayPairing,
    ) -> Result<()> {
        self.transact(|tx| tx.initialize_gateway(caller, gateway, pairing))
    }

    /// Moves WETH from L1 to L2 through this layer's gateway.
    ///
    /// `msg_value` pays the fee; the WETH itself is pulled from the caller.
    pub fn deposit_erc20(
        &mut self,
        caller: Address,
        msg_value: U256,
        request: &TransferRequest,
    ) -> Result<SendReceipt> {
        self.expect_layer(Layer::L1)?;
        let span = spans::deposit(caller, request.token, request.amount, request.gas_limit);
        let _guard = span.enter();
        let ctx = self.external_call(caller, msg_value);
        let gateway = self.env.gateway;
        self.transact(|tx| tx.initiate_transfer(&ctx, gateway, request))
    }

    /// Moves WETH from L2 to L1 through this layer's gateway.
    pub fn withdraw_erc20(
        &mut self,
        caller: Address,
        msg_value: U256,
        request: &TransferRequest,
    ) -> Result<SendReceipt> {
        self.expect_layer(Layer::L2)?;
        let span = spans::withdraw(caller, request.token, request.amount, request.gas_limit);
        let _guard = span.enter();
        let ctx = self.external_call(caller, msg_value);
        let gateway = self.env.gateway;
        self.transact(|tx| tx.initiate_transfer(&ctx, gateway, request))
    }

    /// [`Domain::deposit_erc20`] through the router. The caller approves the router.
    pub fn router_deposit_erc20(
        &mut self,
        caller: Address,
        msg_value: U256,
        request: &TransferRequest,
    ) -> Result<SendReceipt> {
        self.expect_layer(Layer::L1)?;
        let span = spans::deposit(caller, request.token, request.amount, request.gas_limit);
        let _guard = span.enter();
        self.transact(|tx| tx.route_transfer(caller, msg_value, request))
    }

    /// [`Domain::withdraw_erc20`] through the router. The caller approves the router.
    pub fn router_withdraw_erc20(
        &mut self,
        caller: Address,
        msg_value: U256,
        request: &TransferRequest,
    ) -> Result<SendReceipt> {
        self.expect_layer(Layer::L2)?;
        let span = spans::withdraw(caller, request.token, request.amount, request.gas_limit);
        let _guard = span.enter();
        self.transact(|tx| tx.route_transfer(caller, msg_value, request))
    }

    /// Calls `finalizeDepositERC20` on this layer's gateway directly, outside
    /// of any relay. Only a relay by the messenger can pass its checks.
    pub fn finalize_deposit_erc20(
        &mut self,
        caller: Address,
        msg_value: U256,
        params: &TransferParams,
    ) -> Result<()> {
        self.finalize_direct(caller, msg_value, params, Layer::L2)
    }

    /// Calls `finalizeWithdrawERC20` on this layer's gateway directly.
    pub fn finalize_withdraw_erc20(
        &mut self,
        caller: Address,
        msg_value: U256,
        params: &TransferParams,
    ) -> Result<()> {
        self.finalize_direct(caller, msg_value, params, Layer::L1)
    }

    fn finalize_direct(
        &mut self,
        caller: Address,
        msg_value: U256,
        params: &TransferParams,
        destination: Layer,
    ) -> Result<()> {
        let ctx = self.external_call(caller, msg_value);
        let gateway = self.env.gateway;
        let calldata = params.finalize_calldata(destination);
        self.transact(|tx| tx.call(&ctx, gateway, &calldata))
    }

    // ---- admin ----

    /// Points the router entry for `token` at `gateway`. Owner only.
    pub fn set_gateway(&mut self, caller: Address, token: Address, gateway: Address) -> Result<()> {
        self.transact(|tx| tx.set_token_gateway(caller, token, gateway))
    }

    pub fn set_fee_per_gas(&mut self, caller: Address, fee_per_gas: U256) -> Result<()> {
        self.transact(|tx| tx.update_fee_per_gas(caller, fee_per_gas))
    }

    /// Pausing blocks sends, relays and replays until unpaused. Owner only.
    pub fn set_paused(&mut self, caller: Address, paused: bool) -> Result<()> {
        self.transact(|tx| tx.set_paused(caller, paused))
    }

    /// Records a finalized batch of L2 message hashes. L1 only, owner only.
    pub fn finalize_batch(
        &mut self,
        caller: Address,
        batch_index: u64,
        message_hashes: &[B256],
    ) -> Result<()> {
        let span = spans::finalize_batch(batch_index, message_hashes.len());
        let _guard = span.enter();
        self.transact(|tx| tx.finalize_batch(caller, batch_index, message_hashes))
    }

    // ---- accounts ----

    /// Mints native balance out of thin air, as a genesis allocation would.
    pub fn fund(&mut self, account: Address, amount: U256) -> Result<()> {
        self.transact(|tx| tx.state.accounts.credit(account, amount))
    }

    /// Wraps `amount` of `account`'s ETH into WETH.
    pub fn wrap(&mut self, account: Address, amount: U256) -> Result<()> {
        self.transact(|tx| tx.state.weth.deposit(&mut tx.state.accounts, account, amount))
    }

    /// Unwraps `amount` of `account`'s WETH back into ETH.
    pub fn unwrap_weth(&mut self, account: Address, amount: U256) -> Result<()> {
        self.transact(|tx| tx.state.weth.withdraw(&mut tx.state.accounts, account, amount))
    }

    pub fn approve(&mut self, owner: Address, spender: Address, amount: U256) {
        self.state.weth.approve(owner, spender, amount);
    }

    /// Attaches callback code to `recipient`, making it a contract for the gateway
    pub fn register_callback(&mut self, recipient: Address, hook: Arc<dyn GatewayCallback>) {
        self.env.hooks.insert(recipient, hook);
    }

    // ---- queries ----

    pub fn layer(&self) -> Layer {
        self.env.layer
    }

    pub fn chain(&self) -> NamedChain {
        self.env.chain
    }

    pub fn owner(&self) -> Address {
        self.env.owner
    }

    pub fn gateway_address(&self) -> Address {
        self.env.gateway
    }

    pub fn messenger_address(&self) -> Address {
        self.state.messenger.address()
    }

    /// Messenger on the other layer this messenger accepts messages from
    pub fn counterpart_messenger(&self) -> Address {
        self.state.messenger.counterpart()
    }

    pub fn queue_address(&self) -> Address {
        self.state.queue.address()
    }

    pub fn fee_vault_address(&self) -> Address {
        self.state.messenger.fee_vault()
    }

    pub fn weth_address(&self) -> Address {
        self.state.weth.address()
    }

    pub fn router_address(&self) -> Address {
        self.state.router.address()
    }

    pub fn balance_of(&self, account: Address) -> U256 {
        self.state.accounts.balance_of(account)
    }

    pub fn weth_balance_of(&self, account: Address) -> U256 {
        self.state.weth.balance_of(account)
    }

    pub fn weth_allowance(&self, owner: Address, spender: Address) -> U256 {
        self.state.weth.allowance(owner, spender)
    }

    pub fn weth_total_supply(&self) -> U256 {
        self.state.weth.total_supply()
    }

    pub fn message_status(&self, message_hash: MessageHash) -> MessageStatus {
        self.state.messenger.status(message_hash)
    }

    pub fn is_message_sent(&self, message_hash: MessageHash) -> bool {
        self.state.messenger.is_sent(message_hash)
    }

    /// True only when the message was relayed and its inner call succeeded
    pub fn is_message_executed(&self, message_hash: MessageHash) -> bool {
        self.state.messenger.is_executed(message_hash)
    }

    pub fn is_paused(&self) -> bool {
        self.state.messenger.is_paused()
    }

    pub fn next_queue_index(&self) -> u64 {
        self.state.queue.next_index()
    }

    pub fn queued_message(&self, index: u64) -> Option<MessageHash> {
        self.state.queue.message_at(index)
    }

    pub fn fee_per_gas(&self) -> U256 {
        self.state.oracle.fee_per_gas()
    }

    pub fn estimate_fee(&self, gas_limit: u64) -> Result<U256> {
        self.state.oracle.estimate_fee(gas_limit)
    }

    /// Batch an L2 message was finalized in. Always `None` on L2.
    pub fn batch_of(&self, message_hash: MessageHash) -> Option<u64> {
        self.state.rollup.as_ref()?.batch_of(message_hash)
    }

    /// Number of L2 messages covered by finalized batches. Always zero on L2.
    pub fn finalized_message_count(&self) -> u64 {
        self.state
            .rollup
            .as_ref()
            .map_or(0, BatchInclusion::message_count)
    }

    pub fn next_batch_index(&self) -> u64 {
        self.state
            .rollup
            .as_ref()
            .map_or(0, BatchInclusion::next_batch_index)
    }

    pub fn router_gateway(&self, token: Address) -> Option<Address> {
        self.state.router.get_gateway(token)
    }

    pub fn gateway_pairing(&self, gateway: Address) -> Option<GatewayPairing> {
        self.state
            .gateways
            .get(&gateway)
            .and_then(|gateway| gateway.pairing().ok())
            .copied()
    }

    /// Every log emitted by committed transitions, oldest first
    pub fn logs(&self) -> &[Log] {
        &self.logs
    }

    /// Decodes every committed log of type `E`
    pub fn events<E: SolEvent>(&self) -> Vec<E> {
        decode_events(&self.logs)
    }

    // ---- helpers ----

    fn expect_layer(&self, layer: Layer) -> Result<()> {
        if self.env.layer != layer {
            return Err(BridgeError::WrongLayer {
                layer: self.env.layer,
            });
        }
        Ok(())
    }

    fn external_call(&self, caller: Address, value: U256) -> CallContext {
        CallContext {
            caller,
            value,
            xdomain_sender: None,
        }
    }
}

/// Decodes the logs of type `E` among `logs`, skipping everything else
pub fn decode_events<E: SolEvent>(logs: &[Log]) -> Vec<E> {
    logs.iter()
        .filter(|log| log.data.topics().first() == Some(&E::SIGNATURE_HASH))
        .filter_map(|log| E::decode_log_data(&log.data).ok())
        .collect()
}
