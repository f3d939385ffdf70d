//! # Cap Arithmetic
//!
//! The two ceilings on issuance and the bookkeeping behind them.
//!
//! - **Global cap.** [`compute_fill`] converts a payment at the current
//!   rate and clips it to the remaining headroom. A clipped purchase is a
//!   partial fill: the headroom is granted and the unconverted payment is
//!   reported back as `unfilled_payment`.
//! - **Personal cap.** [`personal_cap`] is the investor's pro-rata share
//!   of the global cap, `floor(global_cap * balance / total_supply)`.
//!   [`FirstPhaseLedger`] accumulates each investor's first-phase grants
//!   against it.
//!
//! All divisions round toward zero.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use presale_core::amount::decimal;
use presale_core::{mul_div_floor, Address, Rate, U256};

use crate::error::SaleError;

/// Outcome of converting a payment against the remaining headroom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fill {
    /// `payment * rate`.
    #[serde(with = "decimal")]
    pub requested: U256,
    /// Tokens actually issued, `min(requested, headroom)`.
    #[serde(with = "decimal")]
    pub granted: U256,
    /// Payment not converted because the headroom ran out.
    #[serde(with = "decimal")]
    pub unfilled_payment: U256,
}

impl Fill {
    /// Whether the purchase was clipped by the global cap.
    pub fn is_partial(&self) -> bool {
        self.granted < self.requested
    }
}

/// Convert `payment` at `rate` against `global_cap - tokens_issued` of headroom.
///
/// Fails with `InvalidAmount` when `payment * rate` overflows.
pub fn compute_fill(
    payment: U256,
    rate: Rate,
    tokens_issued: U256,
    global_cap: U256,
) -> Result<Fill, SaleError> {
    let requested = rate.tokens_for(payment).ok_or_else(|| {
        SaleError::InvalidAmount(format!("{payment} at rate {rate} overflows 256 bits"))
    })?;
    let headroom = global_cap.saturating_sub(tokens_issued);
    if requested <= headroom {
        return Ok(Fill {
            requested,
            granted: requested,
            unfilled_payment: U256::ZERO,
        });
    }
    // floor(headroom / rate) <= floor(requested / rate) == payment
    let converted = rate.payment_for(headroom);
    Ok(Fill {
        requested,
        granted: headroom,
        unfilled_payment: payment - converted,
    })
}

/// `floor(global_cap * balance / total_supply)`.
///
/// Fails with `InvalidAmount` when the supply is zero or the product overflows.
pub fn personal_cap(
    global_cap: U256,
    balance: U256,
    total_supply: U256,
) -> Result<U256, SaleError> {
    if total_supply.is_zero() {
        return Err(SaleError::InvalidAmount(
            "membership supply is zero; personal cap is undefined".to_string(),
        ));
    }
    mul_div_floor(global_cap, balance, total_supply).ok_or_else(|| {
        SaleError::InvalidAmount(format!("personal cap of balance {balance} overflows"))
    })
}

/// Cumulative first-phase grants per investor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirstPhaseLedger {
    purchased: BTreeMap<Address, U256>,
}

impl FirstPhaseLedger {
    /// An empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Tokens `investor` has received during the first phase.
    pub fn purchased(&self, investor: &Address) -> U256 {
        self.purchased.get(investor).copied().unwrap_or(U256::ZERO)
    }

    /// The investor's total if `granted` were added, or `PersonalCapExceeded`.
    ///
    /// Does not record anything; call [`record`](Self::record) after the
    /// issuance commits.
    pub fn check(&self, investor: &Address, granted: U256, cap: U256) -> Result<U256, SaleError> {
        let purchased = self.purchased(investor);
        let exceeded = || SaleError::PersonalCapExceeded {
            beneficiary: *investor,
            cap,
            purchased,
            granted,
        };
        let total = purchased.checked_add(granted).ok_or_else(exceeded)?;
        if total > cap {
            return Err(exceeded());
        }
        Ok(total)
    }

    /// Store the investor's new cumulative total.
    pub fn record(&mut self, investor: Address, total: U256) {
        self.purchased.insert(investor, total);
    }

    /// Number of investors with first-phase purchases.
    pub fn len(&self) -> usize {
        self.purchased.len()
    }

    /// Whether nobody has bought in the first phase.
    pub fn is_empty(&self) -> bool {
        self.purchased.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u(n: u64) -> U256 {
        U256::from(n)
    }

    fn rate(n: u64) -> Rate {
        Rate::from_u64(n).unwrap()
    }

    // ── Global cap ───────────────────────────────────────────────────

    #[test]
    fn test_full_fill() {
        let fill = compute_fill(u(1), rate(10), U256::ZERO, u(20_000_000)).unwrap();
        assert_eq!(fill.granted, u(10));
        assert_eq!(fill.unfilled_payment, U256::ZERO);
        assert!(!fill.is_partial());
    }

    #[test]
    fn test_exact_headroom_is_full_fill() {
        let fill = compute_fill(u(2), rate(5), u(90), u(100)).unwrap();
        assert_eq!(fill.granted, u(10));
        assert!(!fill.is_partial());
    }

    #[test]
    fn test_partial_fill_rate_one() {
        // 1 unit of headroom, payment worth 3 units at rate 1.
        let fill = compute_fill(u(3), rate(1), u(19_999_999), u(20_000_000)).unwrap();
        assert_eq!(fill.requested, u(3));
        assert_eq!(fill.granted, u(1));
        assert_eq!(fill.unfilled_payment, u(2));
        assert!(fill.is_partial());
    }

    #[test]
    fn test_partial_fill_rate_equals_cap() {
        let cap = U256::from(20_000_000u64) * U256::from(10u64).pow(U256::from(18u64));
        let fill = compute_fill(u(2), Rate::new(cap).unwrap(), U256::ZERO, cap).unwrap();
        assert_eq!(fill.granted, cap);
        assert_eq!(fill.unfilled_payment, u(1));
    }

    #[test]
    fn test_partial_fill_rounds_converted_payment_down() {
        // headroom 15 at rate 10 converts 1 unit of payment, 2 remain unfilled.
        let fill = compute_fill(u(3), rate(10), u(85), u(100)).unwrap();
        assert_eq!(fill.granted, u(15));
        assert_eq!(fill.unfilled_payment, u(2));
    }

    #[test]
    fn test_overflowing_payment_rejected() {
        let err = compute_fill(U256::MAX, rate(2), U256::ZERO, u(100)).unwrap_err();
        assert!(matches!(err, SaleError::InvalidAmount(_)));
    }

    // ── Personal cap ─────────────────────────────────────────────────

    #[test]
    fn test_personal_cap_half_supply() {
        let e18 = U256::from(10u64).pow(U256::from(18u64));
        let cap = U256::from(20_000_000u64) * e18;
        let balance = U256::from(20u64) * e18;
        let supply = U256::from(40u64) * e18;
        // 2e25 * 2e19 overflows u128 but not 256 bits.
        assert_eq!(personal_cap(cap, balance, supply).unwrap(), cap / u(2));
    }

    #[test]
    fn test_personal_cap_floors() {
        assert_eq!(personal_cap(u(100), u(1), u(3)).unwrap(), u(33));
        assert_eq!(personal_cap(u(100), U256::ZERO, u(3)).unwrap(), U256::ZERO);
    }

    #[test]
    fn test_personal_cap_zero_supply() {
        assert!(matches!(
            personal_cap(u(100), U256::ZERO, U256::ZERO),
            Err(SaleError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_first_phase_ledger_accumulates() {
        let investor = Address::with_last_byte(1);
        let mut ledger = FirstPhaseLedger::new();
        let total = ledger.check(&investor, u(40), u(50)).unwrap();
        ledger.record(investor, total);
        assert_eq!(ledger.purchased(&investor), u(40));

        let err = ledger.check(&investor, u(11), u(50)).unwrap_err();
        assert_eq!(
            err,
            SaleError::PersonalCapExceeded {
                beneficiary: investor,
                cap: u(50),
                purchased: u(40),
                granted: u(11),
            }
        );
        assert_eq!(ledger.check(&investor, u(10), u(50)).unwrap(), u(50));
        assert_eq!(ledger.len(), 1);
    }
}
