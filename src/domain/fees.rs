//! Cross-domain fee estimation and settlement

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::StateBuffer;
use crate::contracts::messenger::UpdateFeePerGas;
use crate::error::{BridgeError, Result};

/// What happens to value attached beyond `value + fee` on a send
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExcessFeePolicy {
    /// The send fails with [`BridgeError::ExcessFee`]
    #[default]
    Reject,
    /// The excess is credited to the fee vault together with the fee
    RetainInVault,
    /// The excess is paid back to the refund address of the send
    Refund,
}

/// Execution price of the counterpart layer, as seen from this layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasOracle {
    fee_per_gas: U256,
}

impl GasOracle {
    pub fn new(fee_per_gas: U256) -> Self {
        Self { fee_per_gas }
    }

    pub fn fee_per_gas(&self) -> U256 {
        self.fee_per_gas
    }

    /// Returns `fee_per_gas * gas_limit`, failing if it does not fit in 256 bits
    pub fn estimate_fee(&self, gas_limit: u64) -> Result<U256> {
        self.fee_per_gas
            .checked_mul(U256::from(gas_limit))
            .ok_or(BridgeError::FeeOverflow {
                fee_per_gas: self.fee_per_gas,
                gas_limit,
            })
    }

    /// Sets a new price and returns the previous one
    pub fn set_fee_per_gas(&mut self, fee_per_gas: U256) -> U256 {
        std::mem::replace(&mut self.fee_per_gas, fee_per_gas)
    }
}

/// How the value attached to a send is split
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeSettlement {
    /// Amount owed to the fee vault
    pub fee: U256,
    /// Attached value beyond `value + fee`
    pub excess: U256,
}

/// Splits `provided` into the delivered value, the fee and the excess.
pub fn settle(policy: ExcessFeePolicy, value: U256, fee: U256, provided: U256) -> Result<FeeSettlement> {
    let required = value.saturating_add(fee);
    let excess = provided
        .checked_sub(required)
        .ok_or(BridgeError::InsufficientFee { required, provided })?;
    if !excess.is_zero() && policy == ExcessFeePolicy::Reject {
        return Err(BridgeError::ExcessFee { required, provided });
    }
    Ok(FeeSettlement { fee, excess })
}

impl StateBuffer<'_> {
    pub(crate) fn update_fee_per_gas(&mut self, caller: Address, fee_per_gas: U256) -> Result<()> {
        self.only_owner(caller)?;
        let old = self.state.oracle.set_fee_per_gas(fee_per_gas);
        let queue = self.state.queue.address();
        self.emit(
            queue,
            &UpdateFeePerGas {
                oldFeePerGas: old,
                newFeePerGas: fee_per_gas,
            },
        );
        info!(
            layer = %self.env.layer,
            old_fee_per_gas = %old,
            new_fee_per_gas = %fee_per_gas,
            event = "fee_per_gas_updated"
        );
        Ok(())
    }
}
