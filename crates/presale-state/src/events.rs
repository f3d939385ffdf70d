//! # Sale Event Log
//!
//! Every committed state change appends one [`SaleEvent`] to an
//! append-only, sequence-numbered [`EventLog`]. Rejected operations
//! append nothing.

use serde::{Deserialize, Serialize};

use presale_core::amount::decimal;
use presale_core::{Address, PurchaseId, Rate, Timestamp, U256};

/// A committed state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SaleEvent {
    /// Tokens were bought through the purchase entry point.
    TokenPurchase {
        purchase_id: PurchaseId,
        purchaser: Address,
        beneficiary: Address,
        /// Open phase the purchase was admitted in.
        phase: usize,
        /// Payment forwarded to the wallet.
        #[serde(with = "decimal")]
        value: U256,
        /// Tokens issued.
        #[serde(with = "decimal")]
        amount: U256,
    },
    TokenRateChanged {
        old_rate: Rate,
        new_rate: Rate,
    },
    Paused,
    Unpaused,
    /// The global cap has been fully issued.
    CapReached {
        /// Purchaser whose request was clipped, if the cap was hit by a partial fill.
        remainder_purchaser: Option<Address>,
        #[serde(with = "decimal")]
        remainder_amount: U256,
    },
    PremiumAllocation {
        beneficiary: Address,
        #[serde(with = "decimal")]
        amount: U256,
    },
    Finalized {
        wallet: Address,
        /// Unsold supply minted to the wallet.
        #[serde(with = "decimal")]
        unsold_minted: U256,
        /// Identity that now holds minting authority.
        minting_authority: Address,
    },
}

impl SaleEvent {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::TokenPurchase { .. } => "TOKEN_PURCHASE",
            Self::TokenRateChanged { .. } => "TOKEN_RATE_CHANGED",
            Self::Paused => "PAUSED",
            Self::Unpaused => "UNPAUSED",
            Self::CapReached { .. } => "CAP_REACHED",
            Self::PremiumAllocation { .. } => "PREMIUM_ALLOCATION",
            Self::Finalized { .. } => "FINALIZED",
        }
    }
}

/// A logged event with its position and time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// 0-based position in the log.
    pub sequence: u64,
    pub timestamp: Timestamp,
    pub event: SaleEvent,
}

/// Append-only log of sale events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLog {
    records: Vec<EventRecord>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `event` and return its sequence number.
    pub fn append(&mut self, timestamp: Timestamp, event: SaleEvent) -> u64 {
        let sequence = self.records.len() as u64;
        tracing::trace!(sequence, event = event.name(), "sale event");
        self.records.push(EventRecord {
            sequence,
            timestamp,
            event,
        });
        sequence
    }

    /// All records, oldest first.
    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    /// Records with `sequence >= from`.
    pub fn since(&self, from: u64) -> &[EventRecord] {
        let start = usize::try_from(from).unwrap_or(usize::MAX).min(self.records.len());
        &self.records[start..]
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The most recent record.
    pub fn last(&self) -> Option<&EventRecord> {
        self.records.last()
    }
}
