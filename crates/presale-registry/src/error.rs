//! Errors raised by the in-process registries.

use thiserror::Error;

use presale_core::{Address, U256};

/// Errors from [`Allowlist`](crate::Allowlist) and [`Token`](crate::Token) operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The caller is not the registry owner.
    #[error("{caller} is not the owner ({owner})")]
    NotOwner {
        /// Identity that attempted the operation.
        caller: Address,
        /// Current owner.
        owner: Address,
    },

    /// Holder transfers are disabled while the token is paused.
    #[error("token transfers are paused")]
    TokenPaused,

    /// The sender's balance does not cover the transfer.
    #[error("{account} holds {balance}, cannot move {requested}")]
    InsufficientBalance {
        /// Account being debited.
        account: Address,
        /// Its balance.
        balance: U256,
        /// Amount requested.
        requested: U256,
    },

    /// Arithmetic overflow in a balance or the total supply.
    #[error("balance or supply overflow")]
    Overflow,
}
