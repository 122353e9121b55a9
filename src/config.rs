//! Bridge deployment configuration
//!
//! A [`BridgeConfig`] names every contract address on both layers plus the
//! fee parameters of each messenger. It can be built in code, parsed from
//! JSON, or loaded from the file named by the `BRIDGE_CONFIG` environment
//! variable.
//!
//! # Example
//!
//! ```rust
//! use rollup_bridge::BridgeConfig;
//!
//! let config = BridgeConfig::devnet();
//! config.validate().unwrap();
//! assert!(!config.testnet);
//! ```

use std::collections::HashMap;
use std::path::Path;

use alloy_primitives::{address, Address, U256};
use bon::Builder;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::fees::ExcessFeePolicy;
use crate::domain::messenger::DEFAULT_MAX_GAS_LIMIT;
use crate::error::{BridgeError, Result};
use crate::protocol::Layer;

/// Environment variable holding the path of a JSON config file
pub const CONFIG_ENV_VAR: &str = "BRIDGE_CONFIG";

fn default_max_gas_limit() -> u64 {
    DEFAULT_MAX_GAS_LIMIT
}

/// Contract addresses and fee parameters of one layer
#[derive(Builder, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainConfig {
    /// Admin allowed to pause, set fees, initialize gateways and finalize batches
    pub owner: Address,
    pub messenger: Address,
    pub message_queue: Address,
    pub fee_vault: Address,
    pub gateway: Address,
    pub router: Address,
    pub weth: Address,

    /// Price per gas unit of the counterpart layer
    #[builder(default)]
    #[serde(default)]
    pub fee_per_gas: U256,

    #[builder(default = DEFAULT_MAX_GAS_LIMIT)]
    #[serde(default = "default_max_gas_limit")]
    pub max_gas_limit: u64,

    #[builder(default)]
    #[serde(default)]
    pub excess_fee_policy: ExcessFeePolicy,

    /// ETH the messenger holds before any deposit, used to pay out relayed value
    #[builder(default)]
    #[serde(default)]
    pub messenger_genesis_balance: U256,
}

impl DomainConfig {
    fn named_addresses(&self) -> [(&'static str, Address); 7] {
        [
            ("owner", self.owner),
            ("messenger", self.messenger),
            ("messageQueue", self.message_queue),
            ("feeVault", self.fee_vault),
            ("gateway", self.gateway),
            ("router", self.router),
            ("weth", self.weth),
        ]
    }

    /// Rejects zero addresses and two roles sharing one address.
    pub fn validate(&self, layer: Layer) -> Result<()> {
        let mut seen: HashMap<Address, &'static str> = HashMap::new();
        for (name, address) in self.named_addresses() {
            if address.is_zero() {
                return Err(BridgeError::InvalidConfig(format!(
                    "{layer} {name} is the zero address"
                )));
            }
            if let Some(other) = seen.insert(address, name) {
                return Err(BridgeError::InvalidConfig(format!(
                    "{layer} {name} and {other} share address {address}"
                )));
            }
        }
        if self.max_gas_limit == 0 {
            return Err(BridgeError::InvalidConfig(format!(
                "{layer} maxGasLimit must be greater than zero"
            )));
        }
        Ok(())
    }
}

/// Configuration of both layers
#[derive(Builder, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeConfig {
    pub l1: DomainConfig,
    pub l2: DomainConfig,
    /// Selects the test networks when naming chains
    #[builder(default)]
    #[serde(default)]
    pub testnet: bool,
}

impl BridgeConfig {
    /// Local deployment using the well-known rollup addresses.
    ///
    /// The L2 messenger starts with a large genesis balance so deposits can be
    /// paid out; the L1 messenger starts empty and is funded by deposits.
    pub fn devnet() -> Self {
        let owner = address!("1000000000000000000000000000000000000001");
        Self {
            l1: DomainConfig::builder()
                .owner(owner)
                .messenger(address!("6774bcbd5cecef1336b5300fb5186a12ddd8b367"))
                .message_queue(address!("0d7e906bd9cafa154b048cfa766cc1e54e39af9b"))
                .fee_vault(address!("1000000000000000000000000000000000000002"))
                .gateway(address!("7ac440cae8eb6328de4fa621163a792c1ea9d4fe"))
                .router(address!("f8b1378579659d8f7ee5f3c929c2f3e332e41fd6"))
                .weth(address!("c02aaa39b223fe8d0a0e5c4f27ead9083c756cc2"))
                .build(),
            l2: DomainConfig::builder()
                .owner(owner)
                .messenger(address!("781e90f1c8fc4611c9b7497c3b47f99ef6969cbc"))
                .message_queue(address!("5300000000000000000000000000000000000000"))
                .fee_vault(address!("5300000000000000000000000000000000000005"))
                .gateway(address!("7003e7b7186f0e6601203b99f7b8decbfa391cf9"))
                .router(address!("4c0926ff5252a435fd19e10ed15e5a37ba33a9b1"))
                .weth(address!("5300000000000000000000000000000000000004"))
                .messenger_genesis_balance(U256::from(10u64).pow(U256::from(27u64)))
                .build(),
            testnet: false,
        }
    }

    pub fn domain(&self, layer: Layer) -> &DomainConfig {
        match layer {
            Layer::L1 => &self.l1,
            Layer::L2 => &self.l2,
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.l1.validate(Layer::L1)?;
        self.l2.validate(Layer::L2)?;
        if self.l1.weth == self.l2.weth {
            return Err(BridgeError::InvalidConfig(format!(
                "L1 and L2 weth share address {}",
                self.l1.weth
            )));
        }
        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), event = "config_file_loading");
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Loads `.env` if present, then reads the file named by `BRIDGE_CONFIG`.
    /// Falls back to [`BridgeConfig::devnet`] when the variable is unset.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        match std::env::var(CONFIG_ENV_VAR) {
            Ok(path) => Self::from_file(path),
            Err(_) => {
                info!(event = "config_devnet_fallback");
                Ok(Self::devnet())
            }
        }
    }
}
