//! # Identities
//!
//! Account addresses and the identifier newtypes of the presale engine.
//!
//! Accounts are 20-byte [`Address`] values, the same shape as the ledgers
//! the sale mints into. Sales and purchases get UUID-backed newtypes so a
//! `PurchaseId` cannot be passed where a `SaleId` is expected.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use alloy_primitives::Address;

use crate::error::CoreError;

/// Parse a hex account address, with or without the `0x` prefix.
pub fn parse_address(input: &str) -> Result<Address, CoreError> {
    Address::from_str(input.trim()).map_err(|e| CoreError::InvalidAddress {
        input: input.to_string(),
        reason: e.to_string(),
    })
}

/// Unique identifier for a sale instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SaleId(pub Uuid);

/// Unique identifier for an admitted purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PurchaseId(pub Uuid);

impl SaleId {
    /// Generate a new random sale identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SaleId {
    fn default() -> Self {
        Self::new()
    }
}

impl PurchaseId {
    /// Generate a new random purchase identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PurchaseId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SaleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sale:{}", self.0)
    }
}

impl std::fmt::Display for PurchaseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "purchase:{}", self.0)
    }
}
