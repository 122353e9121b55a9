//! Native balance ledger

use std::collections::HashMap;

use alloy_primitives::{Address, U256};

use crate::error::{BridgeError, Result};

/// Native asset balances of every account on one layer
#[derive(Debug, Clone, Default)]
pub struct Accounts {
    balances: HashMap<Address, U256>,
}

impl Accounts {
    pub fn balance_of(&self, account: Address) -> U256 {
        self.balances.get(&account).copied().unwrap_or_default()
    }

    pub fn credit(&mut self, account: Address, amount: U256) -> Result<()> {
        if amount.is_zero() {
            return Ok(());
        }
        let balance = self.balances.entry(account).or_default();
        *balance = balance
            .checked_add(amount)
            .ok_or(BridgeError::Overflow { account })?;
        Ok(())
    }

    pub fn debit(&mut self, account: Address, amount: U256) -> Result<()> {
        if amount.is_zero() {
            return Ok(());
        }
        let available = self.balance_of(account);
        let remaining = available
            .checked_sub(amount)
            .ok_or(BridgeError::InsufficientBalance {
                account,
                available,
                required: amount,
            })?;
        self.balances.insert(account, remaining);
        Ok(())
    }

    pub fn transfer(&mut self, from: Address, to: Address, amount: U256) -> Result<()> {
        self.debit(from, amount)?;
        self.credit(to, amount)
    }
}
