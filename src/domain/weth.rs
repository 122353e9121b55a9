//! Wrapped native asset
//!
//! The bridge only relies on a narrow slice of the token: wrap, unwrap,
//! transfer, allowance-based pull and balance queries. The ETH backing every
//! wrapped unit is held by the token address itself.

use std::collections::HashMap;

use alloy_primitives::{Address, U256};

use super::accounts::Accounts;
use crate::error::{BridgeError, Result};

#[derive(Debug, Clone)]
pub struct WrappedNative {
    address: Address,
    balances: HashMap<Address, U256>,
    allowances: HashMap<(Address, Address), U256>,
    total_supply: U256,
}

impl WrappedNative {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            balances: HashMap::new(),
            allowances: HashMap::new(),
            total_supply: U256::ZERO,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn balance_of(&self, owner: Address) -> U256 {
        self.balances.get(&owner).copied().unwrap_or_default()
    }

    pub fn allowance(&self, owner: Address, spender: Address) -> U256 {
        self.allowances
            .get(&(owner, spender))
            .copied()
            .unwrap_or_default()
    }

    pub fn total_supply(&self) -> U256 {
        self.total_supply
    }

    /// Wraps `amount` of `from`'s native balance.
    pub fn deposit(&mut self, accounts: &mut Accounts, from: Address, amount: U256) -> Result<()> {
        accounts.transfer(from, self.address, amount)?;
        self.mint(from, amount)
    }

    /// Unwraps `amount` back into `from`'s native balance.
    pub fn withdraw(&mut self, accounts: &mut Accounts, from: Address, amount: U256) -> Result<()> {
        self.burn(from, amount)?;
        accounts.transfer(self.address, from, amount)
    }

    pub fn approve(&mut self, owner: Address, spender: Address, amount: U256) {
        self.allowances.insert((owner, spender), amount);
    }

    pub fn transfer(&mut self, from: Address, to: Address, amount: U256) -> Result<()> {
        self.burn(from, amount)?;
        self.mint(to, amount)
    }

    pub fn transfer_from(
        &mut self,
        spender: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<()> {
        if spender != from {
            let available = self.allowance(from, spender);
            if available < amount {
                return Err(BridgeError::InsufficientAllowance {
                    owner: from,
                    spender,
                    available,
                    required: amount,
                });
            }
            if available != U256::MAX {
                self.allowances.insert((from, spender), available - amount);
            }
        }
        self.transfer(from, to, amount)
    }

    fn mint(&mut self, to: Address, amount: U256) -> Result<()> {
        let balance = self.balances.entry(to).or_default();
        *balance = balance
            .checked_add(amount)
            .ok_or(BridgeError::Overflow { account: to })?;
        self.total_supply += amount;
        Ok(())
    }

    fn burn(&mut self, from: Address, amount: U256) -> Result<()> {
        let available = self.balance_of(from);
        if available < amount {
            return Err(BridgeError::InsufficientBalance {
                account: from,
                available,
                required: amount,
            });
        }
        self.balances.insert(from, available - amount);
        self.total_supply -= amount;
        Ok(())
    }
}
