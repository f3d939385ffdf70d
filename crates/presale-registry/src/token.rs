//! # Token Ledger
//!
//! A mintable, pausable, ownable fungible-token ledger. The same type
//! backs both collaborators of a sale:
//!
//! - the **sale token**, as the engine's [`MintSink`]. It is created paused,
//!   so purchasers cannot move units until the owner unpauses after
//!   finalization. Minting is not affected by the pause flag.
//! - the **membership token**, as the engine's [`HoldingOracle`].
//!
//! Minting authority is ownership. The owner hands it to the sale's
//! address before the sale opens, and the sale hands it back when it
//! finalizes.

use std::collections::HashMap;

use parking_lot::RwLock;

use presale_core::{Address, U256};

use crate::error::RegistryError;
use crate::traits::{HoldingOracle, MintError, MintSink};

#[derive(Debug)]
struct Ledger {
    owner: Address,
    paused: bool,
    balances: HashMap<Address, U256>,
    total_supply: U256,
}

impl Ledger {
    fn credit(&mut self, account: &Address, amount: U256) -> Result<(), RegistryError> {
        let supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(RegistryError::Overflow)?;
        let balance = self.balances.get(account).copied().unwrap_or(U256::ZERO);
        let updated = balance.checked_add(amount).ok_or(RegistryError::Overflow)?;
        self.balances.insert(*account, updated);
        self.total_supply = supply;
        Ok(())
    }
}

/// Mintable, pausable, ownable token ledger.
#[derive(Debug)]
pub struct Token {
    ledger: RwLock<Ledger>,
}

impl Token {
    /// A token whose holder transfers start paused.
    pub fn paused(owner: Address) -> Self {
        Self::with_state(owner, true)
    }

    /// A token whose holder transfers start enabled.
    pub fn unpaused(owner: Address) -> Self {
        Self::with_state(owner, false)
    }

    fn with_state(owner: Address, paused: bool) -> Self {
        Self {
            ledger: RwLock::new(Ledger {
                owner,
                paused,
                balances: HashMap::new(),
                total_supply: U256::ZERO,
            }),
        }
    }

    /// Current owner (and minting authority).
    pub fn owner(&self) -> Address {
        self.ledger.read().owner
    }

    /// Whether holder transfers are paused.
    pub fn is_paused(&self) -> bool {
        self.ledger.read().paused
    }

    /// Hand ownership to `new_owner`. Owner only.
    pub fn transfer_ownership(
        &self,
        caller: &Address,
        new_owner: &Address,
    ) -> Result<(), RegistryError> {
        let mut ledger = self.ledger.write();
        ensure_owner(&ledger, caller)?;
        tracing::info!(from = %ledger.owner, to = %new_owner, "token ownership transferred");
        ledger.owner = *new_owner;
        Ok(())
    }

    /// Create `amount` units for `to`. Owner only.
    pub fn mint(&self, caller: &Address, to: &Address, amount: U256) -> Result<(), RegistryError> {
        let mut ledger = self.ledger.write();
        ensure_owner(&ledger, caller)?;
        ledger.credit(to, amount)?;
        tracing::debug!(to = %to, amount = %amount, "minted");
        Ok(())
    }

    /// Disable holder transfers. Owner only.
    pub fn pause(&self, caller: &Address) -> Result<(), RegistryError> {
        let mut ledger = self.ledger.write();
        ensure_owner(&ledger, caller)?;
        ledger.paused = true;
        Ok(())
    }

    /// Enable holder transfers. Owner only.
    pub fn unpause(&self, caller: &Address) -> Result<(), RegistryError> {
        let mut ledger = self.ledger.write();
        ensure_owner(&ledger, caller)?;
        ledger.paused = false;
        Ok(())
    }

    /// Move `amount` from `from` to `to`. Rejected while paused.
    pub fn transfer(
        &self,
        from: &Address,
        to: &Address,
        amount: U256,
    ) -> Result<(), RegistryError> {
        let mut ledger = self.ledger.write();
        if ledger.paused {
            return Err(RegistryError::TokenPaused);
        }
        let balance = ledger.balances.get(from).copied().unwrap_or(U256::ZERO);
        if balance < amount {
            return Err(RegistryError::InsufficientBalance {
                account: *from,
                balance,
                requested: amount,
            });
        }
        if from == to {
            return Ok(());
        }
        let to_balance = ledger.balances.get(to).copied().unwrap_or(U256::ZERO);
        let updated = to_balance.checked_add(amount).ok_or(RegistryError::Overflow)?;
        ledger.balances.insert(*from, balance - amount);
        ledger.balances.insert(*to, updated);
        Ok(())
    }
}

fn ensure_owner(ledger: &Ledger, caller: &Address) -> Result<(), RegistryError> {
    if *caller != ledger.owner {
        return Err(RegistryError::NotOwner {
            caller: *caller,
            owner: ledger.owner,
        });
    }
    Ok(())
}

impl HoldingOracle for Token {
    fn balance_of(&self, account: &Address) -> U256 {
        self.ledger
            .read()
            .balances
            .get(account)
            .copied()
            .unwrap_or(U256::ZERO)
    }

    fn total_supply(&self) -> U256 {
        self.ledger.read().total_supply
    }
}

impl MintSink for Token {
    fn minter(&self) -> Address {
        self.owner()
    }

    fn issue(
        &self,
        minter: &Address,
        beneficiary: &Address,
        amount: U256,
    ) -> Result<(), MintError> {
        self.mint(minter, beneficiary, amount).map_err(MintError::from)
    }

    fn release_minting_authority(&self, minter: &Address, to: &Address) -> Result<(), MintError> {
        self.transfer_ownership(minter, to).map_err(MintError::from)
    }
}

impl From<RegistryError> for MintError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::NotOwner { caller, owner } => MintError::NotMinter {
                expected: owner,
                caller,
            },
            RegistryError::Overflow => MintError::Overflow,
            other @ (RegistryError::TokenPaused | RegistryError::InsufficientBalance { .. }) => {
                MintError::Refused(other.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> Address {
        Address::with_last_byte(0xa1)
    }

    fn sale() -> Address {
        Address::with_last_byte(0xc5)
    }

    fn holder() -> Address {
        Address::with_last_byte(0x01)
    }

    fn units(n: u64) -> U256 {
        U256::from(n)
    }

    #[test]
    fn test_starts_paused() {
        let token = Token::paused(owner());
        assert!(token.is_paused());
        assert!(!Token::unpaused(owner()).is_paused());
    }

    #[test]
    fn test_mint_owner_only() {
        let token = Token::paused(owner());
        assert!(matches!(
            token.mint(&holder(), &holder(), units(5)),
            Err(RegistryError::NotOwner { .. })
        ));
        token.mint(&owner(), &holder(), units(5)).unwrap();
        assert_eq!(token.balance_of(&holder()), units(5));
        assert_eq!(token.total_supply(), units(5));
    }

    #[test]
    fn test_mint_allowed_while_paused_transfer_not() {
        let token = Token::paused(owner());
        token.mint(&owner(), &holder(), units(10)).unwrap();
        assert_eq!(
            token.transfer(&holder(), &owner(), units(1)),
            Err(RegistryError::TokenPaused)
        );
        token.unpause(&owner()).unwrap();
        token.transfer(&holder(), &owner(), units(4)).unwrap();
        assert_eq!(token.balance_of(&holder()), units(6));
        assert_eq!(token.balance_of(&owner()), units(4));
        assert_eq!(token.total_supply(), units(10));
    }

    #[test]
    fn test_transfer_insufficient_balance() {
        let token = Token::unpaused(owner());
        token.mint(&owner(), &holder(), units(1)).unwrap();
        assert!(matches!(
            token.transfer(&holder(), &owner(), units(2)),
            Err(RegistryError::InsufficientBalance { .. })
        ));
        assert_eq!(token.balance_of(&holder()), units(1));
    }

    #[test]
    fn test_mint_overflow_leaves_ledger_unchanged() {
        let token = Token::unpaused(owner());
        token.mint(&owner(), &holder(), U256::MAX).unwrap();
        assert_eq!(
            token.mint(&owner(), &owner(), units(1)),
            Err(RegistryError::Overflow)
        );
        assert_eq!(token.balance_of(&owner()), U256::ZERO);
        assert_eq!(token.total_supply(), U256::MAX);
    }

    #[test]
    fn test_sink_requires_minting_authority() {
        let token = Token::paused(owner());
        let err = token.issue(&sale(), &holder(), units(10)).unwrap_err();
        assert_eq!(
            err,
            MintError::NotMinter {
                expected: owner(),
                caller: sale()
            }
        );

        token.transfer_ownership(&owner(), &sale()).unwrap();
        assert_eq!(token.minter(), sale());
        token.issue(&sale(), &holder(), units(10)).unwrap();
        assert_eq!(token.balance_of(&holder()), units(10));
    }

    #[test]
    fn test_release_minting_authority() {
        let token = Token::paused(owner());
        token.transfer_ownership(&owner(), &sale()).unwrap();
        assert!(token.release_minting_authority(&owner(), &owner()).is_err());
        token.release_minting_authority(&sale(), &owner()).unwrap();
        assert_eq!(token.owner(), owner());
        assert!(token.issue(&sale(), &holder(), units(1)).is_err());
    }

    #[test]
    fn test_registry_errors_map_to_mint_errors() {
        assert_eq!(
            MintError::from(RegistryError::NotOwner {
                caller: sale(),
                owner: owner(),
            }),
            MintError::NotMinter {
                expected: owner(),
                caller: sale()
            }
        );
        assert_eq!(MintError::from(RegistryError::Overflow), MintError::Overflow);
        assert!(matches!(
            MintError::from(RegistryError::TokenPaused),
            MintError::Refused(_)
        ));
    }

    #[test]
    fn test_transfer_to_self_keeps_balance() {
        let token = Token::unpaused(owner());
        token.mint(&owner(), &holder(), units(3)).unwrap();
        token.transfer(&holder(), &holder(), units(2)).unwrap();
        assert_eq!(token.balance_of(&holder()), units(3));
    }
}
