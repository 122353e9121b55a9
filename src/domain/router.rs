//! Gateway router
//!
//! Maps each token to the gateway that bridges it and forwards transfers
//! there unchanged, except that the original sender is packed in front of the
//! calldata so the gateway can tell who it is acting for.

use std::collections::HashMap;

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::SolValue;
use tracing::{debug, info};

use super::gateway::TransferRequest;
use super::messenger::SendReceipt;
use super::{CallContext, StateBuffer};
use crate::contracts::gateway::SetERC20Gateway;
use crate::error::{BridgeError, Result};

#[derive(Debug, Clone)]
pub struct GatewayRouter {
    address: Address,
    gateways: HashMap<Address, Address>,
}

impl GatewayRouter {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            gateways: HashMap::new(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn get_gateway(&self, token: Address) -> Option<Address> {
        self.gateways.get(&token).copied()
    }

    /// Points `token` at `gateway` and returns the previous gateway, or zero.
    /// Setting the zero address removes the mapping.
    pub fn set_gateway(&mut self, token: Address, gateway: Address) -> Address {
        let old = if gateway.is_zero() {
            self.gateways.remove(&token)
        } else {
            self.gateways.insert(token, gateway)
        };
        old.unwrap_or_default()
    }
}

/// Packs the original sender in front of user calldata, as
/// `abi.encode(address, bytes)`
pub fn pack_router_data(sender: Address, data: &Bytes) -> Bytes {
    (sender, data.clone()).abi_encode_params().into()
}

impl StateBuffer<'_> {
    pub(crate) fn set_token_gateway(
        &mut self,
        caller: Address,
        token: Address,
        gateway: Address,
    ) -> Result<()> {
        self.only_owner(caller)?;
        let old = self.state.router.set_gateway(token, gateway);
        let router = self.state.router.address();
        self.emit(
            router,
            &SetERC20Gateway {
                token,
                oldGateway: old,
                newGateway: gateway,
            },
        );
        info!(
            layer = %self.env.layer,
            token = %token,
            old_gateway = %old,
            new_gateway = %gateway,
            event = "token_gateway_set"
        );
        Ok(())
    }

    /// Forwards a transfer and its attached value to the token's gateway.
    pub(crate) fn route_transfer(
        &mut self,
        caller: Address,
        msg_value: U256,
        request: &TransferRequest,
    ) -> Result<SendReceipt> {
        let router = self.state.router.address();
        let gateway = self
            .state
            .router
            .get_gateway(request.token)
            .ok_or(BridgeError::NoGatewayForToken {
                token: request.token,
            })?;
        self.state.accounts.transfer(caller, router, msg_value)?;

        debug!(
            token = %request.token,
            gateway = %gateway,
            sender = %caller,
            event = "transfer_routed"
        );
        let forwarded = TransferRequest {
            data: pack_router_data(caller, &request.data),
            ..request.clone()
        };
        let ctx = CallContext {
            caller: router,
            value: msg_value,
            xdomain_sender: None,
        };
        self.initiate_transfer(&ctx, gateway, &forwarded)
    }
}
