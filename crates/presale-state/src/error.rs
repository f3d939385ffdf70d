//! # Sale Errors
//!
//! Every rejection surfaces synchronously as a [`SaleError`] and leaves
//! the sale untouched. [`SaleError::kind`] collapses the structured
//! variants onto a stable [`SaleErrorKind`] for callers that match on
//! the category only.

use thiserror::Error;

use presale_core::{Address, CoreError, Timestamp, U256};
use presale_registry::MintError;

use crate::lifecycle::LifecycleError;

/// Errors raised by [`Crowdsale`](crate::Crowdsale) operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SaleError {
    /// The caller lacks the privilege the operation requires.
    #[error("{caller} is not authorized to {operation}")]
    NotAuthorized {
        /// Identity that made the call.
        caller: Address,
        /// Operation that was refused.
        operation: &'static str,
    },

    /// Outside `[start_time, end_time)`, or the sale is paused.
    #[error("sale is not open: {0}")]
    SaleNotOpen(String),

    /// A mutating operation was attempted after finalization.
    #[error("sale is finalized, cannot {0}")]
    SaleFinalized(&'static str),

    /// The beneficiary is not on the allowlist.
    #[error("{beneficiary} is not approved to purchase")]
    NotApproved {
        /// Rejected beneficiary.
        beneficiary: Address,
    },

    /// The current phase does not admit this request.
    #[error("ineligible in current phase: {0}")]
    IneligiblePhase(String),

    /// A first-phase purchase would exceed the investor's personal cap.
    #[error("{beneficiary} personal cap {cap} exceeded: holds {purchased}, would add {granted}")]
    PersonalCapExceeded {
        /// Investor.
        beneficiary: Address,
        /// Personal cap at the time of the purchase.
        cap: U256,
        /// Tokens already bought in the first phase.
        purchased: U256,
        /// Tokens this purchase would grant.
        granted: U256,
    },

    /// Not enough global-cap headroom for the request.
    #[error("global cap exhausted: {headroom} units of headroom left")]
    GlobalCapExhausted {
        /// Remaining headroom at the time of the request.
        headroom: U256,
    },

    /// Zero payment, zero rate, zero allocation, or arithmetic overflow.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// `finalize` was called a second time.
    #[error("sale is already finalized")]
    AlreadyFinalized,

    /// `finalize` before `end_time` with headroom remaining.
    #[error("cannot finalize at {now}: sale runs until {end_time} and the cap is not reached")]
    PrematureFinalization {
        /// Time of the attempt.
        now: Timestamp,
        /// Scheduled end of the sale.
        end_time: Timestamp,
    },

    /// Payment arrived outside the purchase entry point.
    #[error("direct payments are rejected; use the purchase entry point")]
    DirectPaymentRejected,

    /// Premium pre-allocation on a sale configured without a threshold.
    #[error("premium pre-allocation is not configured for this sale")]
    PremiumDisabled,

    /// The mint sink refused the issuance.
    #[error("mint sink refused issuance: {0}")]
    Mint(#[from] MintError),

    /// The sale configuration violates an invariant.
    #[error("invalid sale configuration: {0}")]
    Config(#[from] CoreError),

    /// Internal lifecycle transition was refused.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

/// Stable category of a [`SaleError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SaleErrorKind {
    NotAuthorized,
    SaleNotOpen,
    SaleFinalized,
    NotApproved,
    IneligiblePhase,
    PersonalCapExceeded,
    GlobalCapExhausted,
    InvalidAmount,
    AlreadyFinalized,
    PrematureFinalization,
    DirectPaymentRejected,
    PremiumDisabled,
    MintRefused,
    InvalidConfig,
    InvalidTransition,
}

impl SaleErrorKind {
    /// SCREAMING_SNAKE_CASE name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotAuthorized => "NOT_AUTHORIZED",
            Self::SaleNotOpen => "SALE_NOT_OPEN",
            Self::SaleFinalized => "SALE_FINALIZED",
            Self::NotApproved => "NOT_APPROVED",
            Self::IneligiblePhase => "INELIGIBLE_PHASE",
            Self::PersonalCapExceeded => "PERSONAL_CAP_EXCEEDED",
            Self::GlobalCapExhausted => "GLOBAL_CAP_EXHAUSTED",
            Self::InvalidAmount => "INVALID_AMOUNT",
            Self::AlreadyFinalized => "ALREADY_FINALIZED",
            Self::PrematureFinalization => "PREMATURE_FINALIZATION",
            Self::DirectPaymentRejected => "DIRECT_PAYMENT_REJECTED",
            Self::PremiumDisabled => "PREMIUM_DISABLED",
            Self::MintRefused => "MINT_REFUSED",
            Self::InvalidConfig => "INVALID_CONFIG",
            Self::InvalidTransition => "INVALID_TRANSITION",
        }
    }
}

impl std::fmt::Display for SaleErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl SaleError {
    /// The category of this error.
    pub fn kind(&self) -> SaleErrorKind {
        match self {
            Self::NotAuthorized { .. } => SaleErrorKind::NotAuthorized,
            Self::SaleNotOpen(_) => SaleErrorKind::SaleNotOpen,
            Self::SaleFinalized(_) => SaleErrorKind::SaleFinalized,
            Self::NotApproved { .. } => SaleErrorKind::NotApproved,
            Self::IneligiblePhase(_) => SaleErrorKind::IneligiblePhase,
            Self::PersonalCapExceeded { .. } => SaleErrorKind::PersonalCapExceeded,
            Self::GlobalCapExhausted { .. } => SaleErrorKind::GlobalCapExhausted,
            Self::InvalidAmount(_) => SaleErrorKind::InvalidAmount,
            Self::AlreadyFinalized => SaleErrorKind::AlreadyFinalized,
            Self::PrematureFinalization { .. } => SaleErrorKind::PrematureFinalization,
            Self::DirectPaymentRejected => SaleErrorKind::DirectPaymentRejected,
            Self::PremiumDisabled => SaleErrorKind::PremiumDisabled,
            Self::Mint(_) => SaleErrorKind::MintRefused,
            Self::Config(_) => SaleErrorKind::InvalidConfig,
            Self::Lifecycle(_) => SaleErrorKind::InvalidTransition,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names() {
        assert_eq!(SaleError::AlreadyFinalized.kind().to_string(), "ALREADY_FINALIZED");
        assert_eq!(
            SaleError::GlobalCapExhausted {
                headroom: U256::ZERO
            }
            .kind(),
            SaleErrorKind::GlobalCapExhausted
        );
        let mint = SaleError::from(MintError::Overflow);
        assert_eq!(mint.kind().as_str(), "MINT_REFUSED");
    }

    #[test]
    fn test_messages_carry_context() {
        let err = SaleError::NotAuthorized {
            caller: Address::with_last_byte(0x01),
            operation: "set the rate",
        };
        let msg = err.to_string();
        assert!(msg.contains("set the rate"));
        assert!(msg.contains("0x0000000000000000000000000000000000000001"));
    }
}
