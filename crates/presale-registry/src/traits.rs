//! # Collaborator Interfaces
//!
//! The three capabilities the sale engine consumes but does not own.
//! Each is a trait object seam so the engine can be driven by in-process
//! ledgers, fakes in tests, or adapters to out-of-process services.
//!
//! ## Contract
//!
//! - All methods take `&self`. Implementations that mutate use interior
//!   mutability, so one `Arc` can be shared by the engine and by whoever
//!   administers the collaborator.
//! - Calls are synchronous and complete before the engine re-validates
//!   its invariants.
//! - `Send + Sync` bounds let a locked engine be shared across threads.

use thiserror::Error;

use presale_core::{Address, U256};

/// Error raised by a [`MintSink`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MintError {
    /// The caller does not hold minting authority.
    #[error("minting authority belongs to {expected}, not {caller}")]
    NotMinter {
        /// Current holder of minting authority.
        expected: Address,
        /// Identity that attempted to mint.
        caller: Address,
    },

    /// Issuance would overflow a balance or the total supply.
    #[error("issuance overflows supply")]
    Overflow,

    /// The sink refused the operation for a reason of its own.
    #[error("mint sink refused: {0}")]
    Refused(String),
}

/// Answers whether an address may purchase.
pub trait AccessOracle: Send + Sync + std::fmt::Debug {
    /// Whether `account` is on the allowlist.
    fn is_approved(&self, account: &Address) -> bool;
}

/// Read-only view of the membership token.
pub trait HoldingOracle: Send + Sync + std::fmt::Debug {
    /// Membership balance of `account`.
    fn balance_of(&self, account: &Address) -> U256;

    /// Total membership supply.
    fn total_supply(&self) -> U256;
}

/// Creates sale-token units on behalf of whoever holds minting authority.
pub trait MintSink: Send + Sync + std::fmt::Debug {
    /// Current holder of minting authority.
    fn minter(&self) -> Address;

    /// Create `amount` units owned by `beneficiary`.
    ///
    /// Fails with [`MintError::NotMinter`] unless `minter` currently holds
    /// minting authority.
    fn issue(
        &self,
        minter: &Address,
        beneficiary: &Address,
        amount: U256,
    ) -> Result<(), MintError>;

    /// Hand minting authority from `minter` to `to`.
    fn release_minting_authority(&self, minter: &Address, to: &Address) -> Result<(), MintError>;
}
