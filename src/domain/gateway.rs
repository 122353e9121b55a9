//! WETH gateway
//!
//! The gateway turns a user's WETH transfer into a cross-domain message and,
//! on the receiving layer, turns the relayed message back into WETH held by
//! the recipient. The backing ETH travels with the message: the sending
//! gateway unwraps before sending and the receiving gateway wraps what the
//! messenger delivers.
//!
//! L1 initiates with `deposit_erc20` and finalizes with
//! `finalize_withdraw_erc20`; L2 initiates with `withdraw_erc20` and finalizes
//! with `finalize_deposit_erc20`.

use std::fmt;

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{SolCall, SolValue};
use bon::Builder;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::messenger::{MessageRequest, SendReceipt};
use super::{CallContext, StateBuffer};
use crate::contracts::gateway::{
    finalizeDepositERC20Call, finalizeWithdrawERC20Call, DepositERC20, FinalizeDepositERC20,
    FinalizeWithdrawERC20, WithdrawERC20,
};
use crate::error::{BridgeError, Result, TokenRole};
use crate::protocol::Layer;
use crate::spans;

/// Identities a gateway is bound to at initialization
#[derive(Builder, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayPairing {
    /// Gateway on the other layer
    pub counterpart: Address,
    pub router: Address,
    pub messenger: Address,
    /// WETH on L1
    pub l1_token: Address,
    /// WETH on L2
    pub l2_token: Address,
}

impl GatewayPairing {
    /// Token held on `layer`
    pub fn local_token(&self, layer: Layer) -> Address {
        match layer {
            Layer::L1 => self.l1_token,
            Layer::L2 => self.l2_token,
        }
    }

    /// Token held on the counterpart of `layer`
    pub fn remote_token(&self, layer: Layer) -> Address {
        self.local_token(layer.counterpart())
    }

    fn validate(&self) -> Result<()> {
        let fields = [
            ("counterpart", self.counterpart),
            ("router", self.router),
            ("messenger", self.messenger),
            ("l1_token", self.l1_token),
            ("l2_token", self.l2_token),
        ];
        match fields.into_iter().find(|(_, address)| address.is_zero()) {
            Some((field, _)) => Err(BridgeError::ZeroAddress { field }),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WethGateway {
    address: Address,
    layer: Layer,
    pairing: Option<GatewayPairing>,
}

impl WethGateway {
    pub fn new(address: Address, layer: Layer) -> Self {
        Self {
            address,
            layer,
            pairing: None,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn layer(&self) -> Layer {
        self.layer
    }

    pub fn is_initialized(&self) -> bool {
        self.pairing.is_some()
    }

    pub fn pairing(&self) -> Result<&GatewayPairing> {
        self.pairing.as_ref().ok_or(BridgeError::NotInitialized {
            contract: self.address,
        })
    }

    /// Binds the gateway to its pairing. Can only happen once.
    pub fn initialize(&mut self, pairing: GatewayPairing) -> Result<()> {
        if self.pairing.is_some() {
            return Err(BridgeError::AlreadyInitialized {
                contract: self.address,
            });
        }
        pairing.validate()?;
        self.pairing = Some(pairing);
        Ok(())
    }
}

/// Every gateway kind the router can point at
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum Gateway {
    Weth(WethGateway),
}

impl Gateway {
    pub fn address(&self) -> Address {
        match self {
            Self::Weth(gateway) => gateway.address(),
        }
    }

    pub fn pairing(&self) -> Result<&GatewayPairing> {
        match self {
            Self::Weth(gateway) => gateway.pairing(),
        }
    }

    fn initialize(&mut self, pairing: GatewayPairing) -> Result<()> {
        match self {
            Self::Weth(gateway) => gateway.initialize(pairing),
        }
    }
}

/// A user's request to move WETH to the other layer
///
/// # Example
///
/// ```rust
/// use rollup_bridge::TransferRequest;
/// use alloy_primitives::{Address, U256};
///
/// let request = TransferRequest::builder()
///     .token(Address::repeat_byte(0x04))
///     .amount(U256::from(1000))
///     .gas_limit(21_000)
///     .build();
///
/// // Without an explicit recipient the sender receives the funds
/// assert!(request.to.is_none());
/// ```
#[derive(Builder, Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub token: Address,
    /// Recipient on the other layer, the sender if unset
    pub to: Option<Address>,
    pub amount: U256,
    /// Passed to the recipient's callback after the funds arrive
    #[builder(default)]
    pub data: Bytes,
    pub gas_limit: u64,
}

/// The six fields shared by the initiate and finalize events and calls
#[derive(Builder, Debug, Clone, PartialEq, Eq)]
pub struct TransferParams {
    pub l1_token: Address,
    pub l2_token: Address,
    pub from: Address,
    pub to: Address,
    pub amount: U256,
    #[builder(default)]
    pub data: Bytes,
}

impl TransferParams {
    /// Calldata of the finalize call the gateway on `destination` accepts
    pub fn finalize_calldata(&self, destination: Layer) -> Bytes {
        let calldata = match destination {
            Layer::L2 => finalizeDepositERC20Call {
                l1Token: self.l1_token,
                l2Token: self.l2_token,
                from: self.from,
                to: self.to,
                amount: self.amount,
                data: self.data.clone(),
            }
            .abi_encode(),
            Layer::L1 => finalizeWithdrawERC20Call {
                l1Token: self.l1_token,
                l2Token: self.l2_token,
                from: self.from,
                to: self.to,
                amount: self.amount,
                data: self.data.clone(),
            }
            .abi_encode(),
        };
        calldata.into()
    }
}

impl From<finalizeDepositERC20Call> for TransferParams {
    fn from(call: finalizeDepositERC20Call) -> Self {
        Self {
            l1_token: call.l1Token,
            l2_token: call.l2Token,
            from: call.from,
            to: call.to,
            amount: call.amount,
            data: call.data,
        }
    }
}

impl From<finalizeWithdrawERC20Call> for TransferParams {
    fn from(call: finalizeWithdrawERC20Call) -> Self {
        Self {
            l1_token: call.l1Token,
            l2_token: call.l2Token,
            from: call.from,
            to: call.to,
            amount: call.amount,
            data: call.data,
        }
    }
}

macro_rules! transfer_event {
    ($event:ident, $params:expr) => {
        $event {
            l1Token: $params.l1_token,
            l2Token: $params.l2_token,
            from: $params.from,
            to: $params.to,
            amount: $params.amount,
            data: $params.data.clone(),
        }
    };
}

/// What a recipient sees when the gateway notifies it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackContext {
    pub gateway: Address,
    pub recipient: Address,
    pub token: Address,
    pub amount: U256,
    /// Recipient's token balance when the callback runs
    pub token_balance: U256,
    pub data: Bytes,
}

/// Code behind a recipient address that accepts `onScrollGatewayCallback`
///
/// An `Err` reverts the whole finalize call it runs in.
pub trait GatewayCallback: fmt::Debug + Send + Sync {
    fn on_gateway_callback(&self, context: &CallbackContext) -> Result<()>;
}

impl StateBuffer<'_> {
    pub(crate) fn initialize_gateway(
        &mut self,
        caller: Address,
        gateway: Address,
        pairing: GatewayPairing,
    ) -> Result<()> {
        self.only_owner(caller)?;
        self.state
            .gateways
            .get_mut(&gateway)
            .ok_or(BridgeError::NotInitialized { contract: gateway })?
            .initialize(pairing)?;
        info!(
            layer = %self.env.layer,
            gateway = %gateway,
            counterpart = %pairing.counterpart,
            event = "gateway_initialized"
        );
        Ok(())
    }

    fn gateway_pairing(&self, gateway: Address) -> Result<GatewayPairing> {
        self.state
            .gateways
            .get(&gateway)
            .ok_or(BridgeError::NotInitialized { contract: gateway })?
            .pairing()
            .copied()
    }

    /// Pulls the caller's WETH into the gateway, unwraps it and sends the
    /// finalize message to the counterpart gateway.
    ///
    /// When the router calls, `request.data` carries the original sender
    /// and calldata packed as `abi.encode(address, bytes)`.
    pub(crate) fn initiate_transfer(
        &mut self,
        ctx: &CallContext,
        gateway: Address,
        request: &TransferRequest,
    ) -> Result<SendReceipt> {
        let layer = self.env.layer;
        let pairing = self.gateway_pairing(gateway)?;
        if request.token != pairing.local_token(layer) {
            return Err(BridgeError::UnsupportedToken {
                token: request.token,
            });
        }
        if request.amount.is_zero() {
            return Err(BridgeError::ZeroAmount);
        }

        let (from, data) = if ctx.caller == pairing.router {
            <(Address, Bytes)>::abi_decode_params(&request.data)?
        } else {
            (ctx.caller, request.data.clone())
        };
        let params = TransferParams {
            l1_token: pairing.l1_token,
            l2_token: pairing.l2_token,
            from,
            to: request.to.unwrap_or(from),
            amount: request.amount,
            data,
        };

        self.state.accounts.transfer(ctx.caller, gateway, ctx.value)?;
        self.state
            .weth
            .transfer_from(ctx.caller, from, gateway, params.amount)?;
        self.state
            .weth
            .withdraw(&mut self.state.accounts, gateway, params.amount)?;

        let message = MessageRequest {
            target: pairing.counterpart,
            value: params.amount,
            payload: params.finalize_calldata(layer.counterpart()),
            gas_limit: request.gas_limit,
            refund_address: Some(from),
        };
        let msg_value = params
            .amount
            .checked_add(ctx.value)
            .ok_or(BridgeError::Overflow { account: gateway })?;
        let receipt = self.send_message(gateway, msg_value, &message)?;

        let event = match layer {
            Layer::L1 => {
                self.emit(gateway, &transfer_event!(DepositERC20, params));
                "deposit_initiated"
            }
            Layer::L2 => {
                self.emit(gateway, &transfer_event!(WithdrawERC20, params));
                "withdrawal_initiated"
            }
        };
        info!(
            layer = %layer,
            message_hash = %receipt.message_hash,
            from = %params.from,
            to = %params.to,
            amount = %params.amount,
            event = event
        );
        Ok(receipt)
    }

    /// Entry point for calls that land on a gateway address
    pub(crate) fn call_gateway(
        &mut self,
        ctx: &CallContext,
        gateway: Address,
        calldata: &[u8],
    ) -> Result<()> {
        let mut selector = [0u8; 4];
        let len = calldata.len().min(4);
        selector[..len].copy_from_slice(&calldata[..len]);

        let params: TransferParams = match self.env.layer {
            Layer::L2 if selector == finalizeDepositERC20Call::SELECTOR => {
                finalizeDepositERC20Call::abi_decode(calldata)?.into()
            }
            Layer::L1 if selector == finalizeWithdrawERC20Call::SELECTOR => {
                finalizeWithdrawERC20Call::abi_decode(calldata)?.into()
            }
            _ => {
                return Err(BridgeError::UnknownSelector {
                    target: gateway,
                    selector,
                })
            }
        };
        self.finalize_transfer(ctx, gateway, &params)
    }

    /// Checks, in order: the caller is the messenger, the cross-domain sender
    /// is the counterpart gateway, both tokens match the pairing, and the
    /// attached value equals the amount. Then wraps the received ETH, pays the
    /// recipient and notifies it if `data` is non-empty.
    fn finalize_transfer(
        &mut self,
        ctx: &CallContext,
        gateway: Address,
        params: &TransferParams,
    ) -> Result<()> {
        let span = spans::finalize(self.env.layer, params.from, params.to, params.amount);
        let _guard = span.enter();
        let result = self.release_transfer(ctx, gateway, params);
        if let Err(error) = &result {
            spans::record_error(error);
        }
        result
    }

    fn release_transfer(
        &mut self,
        ctx: &CallContext,
        gateway: Address,
        params: &TransferParams,
    ) -> Result<()> {
        let layer = self.env.layer;
        let pairing = self.gateway_pairing(gateway)?;
        if ctx.caller != pairing.messenger {
            return Err(BridgeError::OnlyMessenger { caller: ctx.caller });
        }
        if ctx.xdomain_sender != Some(pairing.counterpart) {
            return Err(BridgeError::OnlyCounterpart {
                sender: ctx.xdomain_sender,
            });
        }
        if params.l1_token != pairing.l1_token {
            return Err(BridgeError::TokenMismatch {
                role: TokenRole::L1,
                expected: pairing.l1_token,
                actual: params.l1_token,
            });
        }
        if params.l2_token != pairing.l2_token {
            return Err(BridgeError::TokenMismatch {
                role: TokenRole::L2,
                expected: pairing.l2_token,
                actual: params.l2_token,
            });
        }
        if ctx.value != params.amount {
            return Err(BridgeError::ValueMismatch {
                expected: params.amount,
                actual: ctx.value,
            });
        }

        self.state
            .weth
            .deposit(&mut self.state.accounts, gateway, params.amount)?;
        self.state.weth.transfer(gateway, params.to, params.amount)?;
        if !params.data.is_empty() {
            self.notify_recipient(gateway, params)?;
        }

        let event = match layer {
            Layer::L2 => {
                self.emit(gateway, &transfer_event!(FinalizeDepositERC20, params));
                "deposit_finalized"
            }
            Layer::L1 => {
                self.emit(gateway, &transfer_event!(FinalizeWithdrawERC20, params));
                "withdrawal_finalized"
            }
        };
        info!(
            layer = %layer,
            from = %params.from,
            to = %params.to,
            amount = %params.amount,
            event = event
        );
        Ok(())
    }

    fn notify_recipient(&mut self, gateway: Address, params: &TransferParams) -> Result<()> {
        let hook = self
            .env
            .hooks
            .get(&params.to)
            .ok_or(BridgeError::RecipientNotContract {
                recipient: params.to,
            })?;
        let context = CallbackContext {
            gateway,
            recipient: params.to,
            token: self.state.weth.address(),
            amount: params.amount,
            token_balance: self.state.weth.balance_of(params.to),
            data: params.data.clone(),
        };
        hook.on_gateway_callback(&context)
    }
}
