//! Both layers of the bridge, deployed and wired together
//!
//! [`Bridge::new`] deploys a [`Domain`] per layer from a [`BridgeConfig`],
//! initializes both gateways against each other and registers them with
//! their routers. Delivery between the layers is explicit: somebody (usually
//! a [`Relayer`](crate::Relayer)) calls [`Bridge::relay_message`].

use alloy_primitives::{Address, B256};
use tracing::info;

use crate::config::{BridgeConfig, DomainConfig};
use crate::domain::gateway::GatewayPairing;
use crate::domain::rollup::MessageProof;
use crate::domain::Domain;
use crate::error::{BridgeError, Result};
use crate::protocol::{
    apply_l1_to_l2_alias, CrossDomainMessage, Layer, MessageHash, MessageStatus, RelayOutcome,
};

/// A deployed two-layer bridge
///
/// # Example
///
/// ```rust
/// use rollup_bridge::{Bridge, Layer, TransferRequest};
/// use alloy_primitives::{Address, U256};
///
/// # fn main() -> Result<(), rollup_bridge::BridgeError> {
/// let mut bridge = Bridge::devnet()?;
/// let alice = Address::repeat_byte(0xa1);
///
/// let l1 = bridge.l1_mut();
/// l1.fund(alice, U256::from(1000))?;
/// l1.wrap(alice, U256::from(1000))?;
/// let weth = l1.weth_address();
///
/// let request = TransferRequest::builder()
///     .token(weth)
///     .amount(U256::from(1000))
///     .gas_limit(200_000)
///     .build();
/// let receipt = l1.deposit_erc20(alice, U256::ZERO, &request)?;
///
/// let outcome = bridge.relay_message(Layer::L1, &receipt.message, alice)?;
/// assert!(outcome.error().is_none());
///
/// assert_eq!(bridge.l2().weth_balance_of(alice), U256::from(1000));
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Bridge {
    config: BridgeConfig,
    l1: Domain,
    l2: Domain,
}

impl Bridge {
    /// Deploys and wires both layers.
    ///
    /// Fails with [`BridgeError::InvalidConfig`] if the configuration does not
    /// validate.
    pub fn new(config: BridgeConfig) -> Result<Self> {
        config.validate()?;
        let mut l1 = Domain::new(Layer::L1, &config.l1, &config.l2, config.testnet)?;
        let mut l2 = Domain::new(Layer::L2, &config.l2, &config.l1, config.testnet)?;

        let (l1_token, l2_token) = (config.l1.weth, config.l2.weth);
        wire_gateway(&mut l1, &config.l1, &config.l2, l1_token, l2_token)?;
        wire_gateway(&mut l2, &config.l2, &config.l1, l1_token, l2_token)?;

        info!(
            l1_chain = %l1.chain(),
            l2_chain = %l2.chain(),
            l1_gateway = %config.l1.gateway,
            l2_gateway = %config.l2.gateway,
            event = "bridge_deployed"
        );
        Ok(Self { config, l1, l2 })
    }

    /// Deploys [`BridgeConfig::devnet`]
    pub fn devnet() -> Result<Self> {
        Self::new(BridgeConfig::devnet())
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn l1(&self) -> &Domain {
        &self.l1
    }

    pub fn l1_mut(&mut self) -> &mut Domain {
        &mut self.l1
    }

    pub fn l2(&self) -> &Domain {
        &self.l2
    }

    pub fn l2_mut(&mut self) -> &mut Domain {
        &mut self.l2
    }

    pub fn domain(&self, layer: Layer) -> &Domain {
        match layer {
            Layer::L1 => &self.l1,
            Layer::L2 => &self.l2,
        }
    }

    pub fn domain_mut(&mut self, layer: Layer) -> &mut Domain {
        match layer {
            Layer::L1 => &mut self.l1,
            Layer::L2 => &mut self.l2,
        }
    }

    /// Delivers `message`, sent on `source`, to the other layer.
    ///
    /// L1 to L2 messages are delivered by the aliased L1 messenger, as the
    /// rollup does for L1 messages it includes; `relayer` is not used. L2 to
    /// L1 messages are submitted by `relayer` with a proof naming the
    /// finalized batch that contains them, and fail with
    /// [`BridgeError::InvalidProof`] until that batch exists.
    pub fn relay_message(
        &mut self,
        source: Layer,
        message: &CrossDomainMessage,
        relayer: Address,
    ) -> Result<RelayOutcome> {
        match source {
            Layer::L1 => {
                let caller = apply_l1_to_l2_alias(self.config.l1.messenger);
                self.l2.relay_message(caller, message)
            }
            Layer::L2 => {
                let message_hash = message.hash();
                let batch_index = self
                    .l1
                    .batch_of(message_hash)
                    .ok_or(BridgeError::InvalidProof { message_hash })?;
                self.l1
                    .relay_message_with_proof(relayer, message, MessageProof { batch_index })
            }
        }
    }

    /// Finalizes every L2 message not yet covered by a batch into a new batch
    /// on L1. Returns the batch index, or `None` if there was nothing to add.
    pub fn finalize_l2_batch(&mut self) -> Result<Option<u64>> {
        let start = self.l1.finalized_message_count();
        let end = self.l2.next_queue_index();
        if start >= end {
            return Ok(None);
        }

        let message_hashes: Vec<B256> = (start..end)
            .filter_map(|index| self.l2.queued_message(index))
            .collect();
        let batch_index = self.l1.next_batch_index();
        self.l1
            .finalize_batch(self.config.l1.owner, batch_index, &message_hashes)?;
        Ok(Some(batch_index))
    }

    /// Status of a message sent on `source`: the destination's terminal
    /// status once relayed, the source's status before that.
    pub fn message_status(&self, source: Layer, message_hash: MessageHash) -> MessageStatus {
        let destination = self.domain(source.counterpart()).message_status(message_hash);
        if destination.is_terminal() {
            destination
        } else {
            self.domain(source).message_status(message_hash)
        }
    }
}

fn wire_gateway(
    domain: &mut Domain,
    local: &DomainConfig,
    remote: &DomainConfig,
    l1_token: Address,
    l2_token: Address,
) -> Result<()> {
    let pairing = GatewayPairing {
        counterpart: remote.gateway,
        router: local.router,
        messenger: local.messenger,
        l1_token,
        l2_token,
    };
    domain.initialize_gateway(local.owner, local.gateway, pairing)?;
    domain.set_gateway(local.owner, local.weth, local.gateway)
}
