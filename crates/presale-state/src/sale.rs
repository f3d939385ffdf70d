//! # Crowdsale Engine
//!
//! Owns the mutable state of one sale and evaluates every operation
//! against it. Collaborators are injected as trait objects: the engine
//! consults the [`AccessOracle`] and [`HoldingOracle`], issues through the
//! [`MintSink`], and reads "now" from a [`Clock`].
//!
//! ## Atomicity
//!
//! Each operation validates everything it needs, then performs its one
//! external side effect (an issuance), and only then commits state. A
//! failure at any step before the commit leaves the sale untouched. The
//! engine takes `&mut self`; callers that share a sale across threads go
//! through [`SharedCrowdsale`](crate::SharedCrowdsale).
//!
//! Finalization has two external effects: the unsold mint to the wallet,
//! then the release of minting authority. The sale records the unsold mint
//! as soon as it succeeds, so a finalize that fails on the release can be
//! retried without minting the unsold supply twice. Once recorded, the
//! remaining headroom is zero.
//!
//! ## Purchase admission order
//!
//! 1. not finalized (`SaleFinalized`)
//! 2. not paused (`SaleNotOpen`)
//! 3. caller is the beneficiary (`NotAuthorized`)
//! 4. payment is positive (`InvalidAmount`)
//! 5. inside `[start_time, end_time)` (`SaleNotOpen`)
//! 6. headroom left under the global cap (`GlobalCapExhausted`)
//! 7. beneficiary is allowlisted (`NotApproved`)
//! 8. phase rule holds (`IneligiblePhase`, `PersonalCapExceeded`)
//!
//! ## Remainder policy
//!
//! A purchase that overflows the remaining headroom is partially filled
//! and its unconverted payment is refunded at purchase time. The receipt
//! reports the refund, and `remainder_purchaser`/`remainder_amount` keep
//! an audit record of it. Only the converted part counts toward
//! `funds_raised`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use presale_core::amount::decimal;
use presale_core::{Address, Clock, PurchaseId, Rate, SaleConfig, SaleId, Timestamp, U256};
use presale_registry::{AccessOracle, HoldingOracle, MintError, MintSink};

use crate::cap::{compute_fill, personal_cap, FirstPhaseLedger};
use crate::error::SaleError;
use crate::events::{EventLog, SaleEvent};
use crate::lifecycle::{LifecycleState, SaleLifecycle};
use crate::phase::{resolve_phase, PhaseRule, SalePhase};

// ─── Collaborators ───────────────────────────────────────────────────

/// The capabilities a sale consults but does not own.
#[derive(Debug, Clone)]
pub struct Collaborators {
    /// Allowlist.
    pub access: Arc<dyn AccessOracle>,
    /// Membership token.
    pub holdings: Arc<dyn HoldingOracle>,
    /// Sale token.
    pub mint: Arc<dyn MintSink>,
    /// Time input.
    pub clock: Arc<dyn Clock>,
}

// ─── Receipts and snapshots ──────────────────────────────────────────

/// Outcome of an admitted purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseReceipt {
    pub purchase_id: PurchaseId,
    pub beneficiary: Address,
    /// Open phase the purchase was admitted in.
    pub phase: usize,
    #[serde(with = "decimal")]
    pub payment: U256,
    /// `payment * rate` before clipping.
    #[serde(with = "decimal")]
    pub requested_tokens: U256,
    #[serde(with = "decimal")]
    pub granted_tokens: U256,
    /// Payment forwarded to the wallet.
    #[serde(with = "decimal")]
    pub forwarded_payment: U256,
    /// Payment returned to the purchaser because the cap ran out.
    #[serde(with = "decimal")]
    pub refunded_payment: U256,
    pub timestamp: Timestamp,
}

impl PurchaseReceipt {
    /// Whether the purchase was clipped by the global cap.
    pub fn is_partial(&self) -> bool {
        self.granted_tokens < self.requested_tokens
    }
}

/// Point-in-time view of a sale, for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaleSnapshot {
    pub sale_id: SaleId,
    pub phase: SalePhase,
    pub lifecycle: LifecycleState,
    pub rate: Rate,
    pub paused: bool,
    #[serde(with = "decimal")]
    pub tokens_issued: U256,
    #[serde(with = "decimal")]
    pub global_cap: U256,
    #[serde(with = "decimal")]
    pub funds_raised: U256,
    pub remainder_purchaser: Option<Address>,
    #[serde(with = "decimal")]
    pub remainder_amount: U256,
    pub events: usize,
}

// ─── Crowdsale ───────────────────────────────────────────────────────

/// The crowdsale state machine.
#[derive(Debug)]
pub struct Crowdsale {
    config: SaleConfig,
    collaborators: Collaborators,
    rate: Rate,
    paused: bool,
    tokens_issued: U256,
    funds_raised: U256,
    remainder_purchaser: Option<Address>,
    remainder_amount: U256,
    /// Unsold supply already minted to the wallet by a finalize attempt.
    unsold_minted: Option<U256>,
    lifecycle: SaleLifecycle,
    first_phase: FirstPhaseLedger,
    events: EventLog,
}

impl Crowdsale {
    /// Build a sale from a validated configuration.
    pub fn new(config: SaleConfig, collaborators: Collaborators) -> Result<Self, SaleError> {
        config.validate()?;
        tracing::info!(
            sale_id = %config.sale_id,
            rate = %config.rate,
            global_cap = %config.global_cap,
            phases = config.schedule.phase_count(),
            "crowdsale created"
        );
        Ok(Self {
            rate: config.rate,
            config,
            collaborators,
            paused: false,
            tokens_issued: U256::ZERO,
            funds_raised: U256::ZERO,
            remainder_purchaser: None,
            remainder_amount: U256::ZERO,
            unsold_minted: None,
            lifecycle: SaleLifecycle::new(),
            first_phase: FirstPhaseLedger::new(),
            events: EventLog::new(),
        })
    }

    // ── Purchases ────────────────────────────────────────────────────

    /// Buy tokens for `beneficiary` with `payment`. The caller must be the beneficiary.
    pub fn buy_tokens(
        &mut self,
        caller: &Address,
        beneficiary: &Address,
        payment: U256,
    ) -> Result<PurchaseReceipt, SaleError> {
        let result = self.try_buy(caller, beneficiary, payment);
        if let Err(e) = &result {
            tracing::debug!(
                kind = %e.kind(),
                beneficiary = %beneficiary,
                payment = %payment,
                "purchase rejected"
            );
        }
        result
    }

    /// Value sent to the sale outside [`buy_tokens`](Self::buy_tokens). Always rejected.
    pub fn receive_payment(&self, from: &Address, payment: U256) -> Result<(), SaleError> {
        tracing::debug!(from = %from, payment = %payment, "direct payment rejected");
        Err(SaleError::DirectPaymentRejected)
    }

    fn try_buy(
        &mut self,
        caller: &Address,
        beneficiary: &Address,
        payment: U256,
    ) -> Result<PurchaseReceipt, SaleError> {
        if self.lifecycle.is_finalized() {
            return Err(SaleError::SaleFinalized("buy tokens"));
        }
        if self.paused {
            return Err(SaleError::SaleNotOpen("sale is paused".to_string()));
        }
        if caller != beneficiary {
            return Err(SaleError::NotAuthorized {
                caller: *caller,
                operation: "buy tokens for another address",
            });
        }
        if payment.is_zero() {
            return Err(SaleError::InvalidAmount("payment must be greater than zero".to_string()));
        }

        let now = self.collaborators.clock.now();
        let (index, rule) = match resolve_phase(&self.config.schedule, now) {
            SalePhase::Open { index, rule } => (index, rule),
            other => return Err(SaleError::SaleNotOpen(format!("{other} at {now}"))),
        };

        let headroom = self.headroom();
        if headroom.is_zero() {
            return Err(SaleError::GlobalCapExhausted { headroom });
        }
        if !self.collaborators.access.is_approved(beneficiary) {
            return Err(SaleError::NotApproved {
                beneficiary: *beneficiary,
            });
        }

        let fill = compute_fill(payment, self.rate, self.tokens_issued, self.config.global_cap)?;

        let first_phase_total = match rule {
            PhaseRule::PersonalCap => {
                let cap = self.personal_cap_of(beneficiary)?;
                Some(self.first_phase.check(beneficiary, fill.granted, cap)?)
            }
            PhaseRule::HolderGated => {
                if self.collaborators.holdings.balance_of(beneficiary).is_zero() {
                    return Err(SaleError::IneligiblePhase(format!(
                        "phase {index} is restricted to membership holders"
                    )));
                }
                None
            }
            PhaseRule::Unrestricted => None,
        };

        let forwarded = payment - fill.unfilled_payment;
        let tokens_issued = self.tokens_issued + fill.granted;
        let funds_raised = self
            .funds_raised
            .checked_add(forwarded)
            .ok_or_else(|| SaleError::InvalidAmount("funds raised overflows".to_string()))?;

        self.collaborators
            .mint
            .issue(&self.config.sale_address, beneficiary, fill.granted)?;

        // Commit.
        self.tokens_issued = tokens_issued;
        self.funds_raised = funds_raised;
        if let Some(total) = first_phase_total {
            self.first_phase.record(*beneficiary, total);
        }
        if fill.is_partial() {
            self.remainder_purchaser = Some(*beneficiary);
            self.remainder_amount = fill.unfilled_payment;
        }

        let receipt = PurchaseReceipt {
            purchase_id: PurchaseId::new(),
            beneficiary: *beneficiary,
            phase: index,
            payment,
            requested_tokens: fill.requested,
            granted_tokens: fill.granted,
            forwarded_payment: forwarded,
            refunded_payment: fill.unfilled_payment,
            timestamp: now,
        };
        self.events.append(
            now,
            SaleEvent::TokenPurchase {
                purchase_id: receipt.purchase_id,
                purchaser: *caller,
                beneficiary: *beneficiary,
                phase: index,
                value: forwarded,
                amount: fill.granted,
            },
        );
        tracing::info!(
            purchase_id = %receipt.purchase_id,
            beneficiary = %beneficiary,
            phase = index,
            tokens = %fill.granted,
            refunded = %fill.unfilled_payment,
            "purchase admitted"
        );

        if self.tokens_issued == self.config.global_cap {
            self.mark_cap_reached(now, "purchase exhausted the global cap")?;
        }
        Ok(receipt)
    }

    // ── Premium pre-allocation ───────────────────────────────────────

    /// Issue `amount` tokens directly to a premium holder before the sale opens.
    pub fn allocate_to_premium_holder(
        &mut self,
        caller: &Address,
        beneficiary: &Address,
        amount: U256,
    ) -> Result<(), SaleError> {
        self.require_administrator(caller, "allocate to premium holders")?;
        self.require_not_finalized("allocate to premium holders")?;
        let threshold = self.config.premium_threshold.ok_or(SaleError::PremiumDisabled)?;

        let now = self.collaborators.clock.now();
        let phase = resolve_phase(&self.config.schedule, now);
        if phase != SalePhase::Pending {
            return Err(SaleError::IneligiblePhase(format!(
                "premium pre-allocation is only possible before the sale starts, now {phase}"
            )));
        }
        let balance = self.collaborators.holdings.balance_of(beneficiary);
        if balance < threshold {
            return Err(SaleError::IneligiblePhase(format!(
                "{beneficiary} holds {balance}, premium threshold is {threshold}"
            )));
        }
        if amount.is_zero() {
            return Err(SaleError::InvalidAmount(
                "allocation must be greater than zero".to_string(),
            ));
        }
        let headroom = self.headroom();
        if amount > headroom {
            return Err(SaleError::GlobalCapExhausted { headroom });
        }

        self.collaborators
            .mint
            .issue(&self.config.sale_address, beneficiary, amount)?;

        self.tokens_issued += amount;
        self.events.append(
            now,
            SaleEvent::PremiumAllocation {
                beneficiary: *beneficiary,
                amount,
            },
        );
        tracing::info!(beneficiary = %beneficiary, tokens = %amount, "premium allocation");

        if self.tokens_issued == self.config.global_cap {
            self.mark_cap_reached(now, "premium allocation exhausted the global cap")?;
        }
        Ok(())
    }

    // ── Governance ───────────────────────────────────────────────────

    /// Replace the conversion rate. Applies to subsequent purchases only.
    pub fn set_rate(&mut self, caller: &Address, new_rate: U256) -> Result<(), SaleError> {
        self.require_administrator(caller, "set the rate")?;
        self.require_not_finalized("set the rate")?;
        let new_rate = Rate::new(new_rate)
            .map_err(|_| SaleError::InvalidAmount("rate must be greater than zero".to_string()))?;

        let old_rate = self.rate;
        self.rate = new_rate;
        let now = self.collaborators.clock.now();
        self.events
            .append(now, SaleEvent::TokenRateChanged { old_rate, new_rate });
        tracing::info!(old_rate = %old_rate, new_rate = %new_rate, "rate changed");
        Ok(())
    }

    /// Stop admitting purchases. Pausing a paused sale is a no-op.
    pub fn pause(&mut self, caller: &Address) -> Result<(), SaleError> {
        self.require_administrator(caller, "pause the sale")?;
        self.require_not_finalized("pause the sale")?;
        if self.paused {
            return Ok(());
        }
        self.paused = true;
        let now = self.collaborators.clock.now();
        self.events.append(now, SaleEvent::Paused);
        tracing::info!(sale_id = %self.config.sale_id, "sale paused");
        Ok(())
    }

    /// Resume admitting purchases. Unpausing a running sale is a no-op.
    pub fn unpause(&mut self, caller: &Address) -> Result<(), SaleError> {
        self.require_administrator(caller, "unpause the sale")?;
        self.require_not_finalized("unpause the sale")?;
        if !self.paused {
            return Ok(());
        }
        self.paused = false;
        let now = self.collaborators.clock.now();
        self.events.append(now, SaleEvent::Unpaused);
        tracing::info!(sale_id = %self.config.sale_id, "sale unpaused");
        Ok(())
    }

    // ── Finalization ─────────────────────────────────────────────────

    /// End the sale: mint the unsold supply to the wallet and hand minting
    /// authority back to the administrator.
    ///
    /// Allowed once `end_time` has passed or the cap has been issued.
    /// Returns the unsold amount minted to the wallet. If the release fails
    /// after the unsold mint, a retry reuses the recorded mint.
    pub fn finalize(&mut self, caller: &Address) -> Result<U256, SaleError> {
        self.require_administrator(caller, "finalize the sale")?;
        if self.lifecycle.is_finalized() {
            return Err(SaleError::AlreadyFinalized);
        }
        let now = self.collaborators.clock.now();
        let end_time = self.config.schedule.end_time();
        if now < end_time && !self.cap_issued() {
            return Err(SaleError::PrematureFinalization { now, end_time });
        }
        let minter = self.collaborators.mint.minter();
        if minter != self.config.sale_address {
            return Err(SaleError::Mint(MintError::NotMinter {
                expected: minter,
                caller: self.config.sale_address,
            }));
        }

        let unsold = match self.unsold_minted {
            Some(minted) => minted,
            None => {
                let unsold = self.headroom();
                if !unsold.is_zero() {
                    self.collaborators.mint.issue(
                        &self.config.sale_address,
                        &self.config.wallet,
                        unsold,
                    )?;
                }
                self.unsold_minted = Some(unsold);
                unsold
            }
        };
        if let Err(e) = self
            .collaborators
            .mint
            .release_minting_authority(&self.config.sale_address, &self.config.administrator)
        {
            tracing::warn!(
                sale_id = %self.config.sale_id,
                unsold = %unsold,
                error = %e,
                "minting authority release failed; unsold mint recorded"
            );
            return Err(e.into());
        }

        let reason = if unsold.is_zero() {
            "cap issued"
        } else {
            "end time passed; unsold supply minted to wallet"
        };
        self.lifecycle.finalize(now, reason)?;
        self.events.append(
            now,
            SaleEvent::Finalized {
                wallet: self.config.wallet,
                unsold_minted: unsold,
                minting_authority: self.config.administrator,
            },
        );
        tracing::info!(
            sale_id = %self.config.sale_id,
            wallet = %self.config.wallet,
            unsold = %unsold,
            "sale finalized"
        );
        Ok(unsold)
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// The immutable sale configuration.
    pub fn config(&self) -> &SaleConfig {
        &self.config
    }

    /// Current conversion rate.
    pub fn rate(&self) -> Rate {
        self.rate
    }

    pub fn wallet(&self) -> Address {
        self.config.wallet
    }

    pub fn administrator(&self) -> Address {
        self.config.administrator
    }

    pub fn global_cap(&self) -> U256 {
        self.config.global_cap
    }

    /// Sale-token units issued so far, premium allocations included.
    pub fn tokens_issued(&self) -> U256 {
        self.tokens_issued
    }

    /// Payment forwarded to the wallet, net of refunds.
    pub fn funds_raised(&self) -> U256 {
        self.funds_raised
    }

    /// Last purchaser whose request was clipped by the global cap.
    pub fn remainder_purchaser(&self) -> Option<Address> {
        self.remainder_purchaser
    }

    /// Payment refunded to [`remainder_purchaser`](Self::remainder_purchaser).
    pub fn remainder_amount(&self) -> U256 {
        self.remainder_amount
    }

    /// Unsold supply minted to the wallet at finalization, once that mint has happened.
    pub fn unsold_minted(&self) -> Option<U256> {
        self.unsold_minted
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_finalized(&self) -> bool {
        self.lifecycle.is_finalized()
    }

    /// Whether `end_time` has passed or the cap has been issued.
    pub fn has_ended(&self) -> bool {
        self.collaborators.clock.now() >= self.config.schedule.end_time() || self.cap_issued()
    }

    /// Phase at the clock's current instant.
    pub fn phase(&self) -> SalePhase {
        self.phase_at(self.collaborators.clock.now())
    }

    /// Phase at `now`.
    pub fn phase_at(&self, now: Timestamp) -> SalePhase {
        resolve_phase(&self.config.schedule, now)
    }

    /// First-phase personal cap of `investor` at current membership balances.
    pub fn personal_cap_of(&self, investor: &Address) -> Result<U256, SaleError> {
        let holdings = &self.collaborators.holdings;
        personal_cap(
            self.config.global_cap,
            holdings.balance_of(investor),
            holdings.total_supply(),
        )
    }

    /// Tokens `investor` has received during the first phase.
    pub fn purchased_in_first_phase(&self, investor: &Address) -> U256 {
        self.first_phase.purchased(investor)
    }

    pub fn lifecycle(&self) -> &SaleLifecycle {
        &self.lifecycle
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Reporting view of the current state.
    pub fn snapshot(&self) -> SaleSnapshot {
        SaleSnapshot {
            sale_id: self.config.sale_id,
            phase: self.phase(),
            lifecycle: self.lifecycle.state(),
            rate: self.rate,
            paused: self.paused,
            tokens_issued: self.tokens_issued,
            global_cap: self.config.global_cap,
            funds_raised: self.funds_raised,
            remainder_purchaser: self.remainder_purchaser,
            remainder_amount: self.remainder_amount,
            events: self.events.len(),
        }
    }

    // ── Internals ────────────────────────────────────────────────────

    fn headroom(&self) -> U256 {
        if self.unsold_minted.is_some() {
            return U256::ZERO;
        }
        self.config.global_cap.saturating_sub(self.tokens_issued)
    }

    fn cap_issued(&self) -> bool {
        self.tokens_issued >= self.config.global_cap
    }

    fn require_administrator(
        &self,
        caller: &Address,
        operation: &'static str,
    ) -> Result<(), SaleError> {
        if *caller != self.config.administrator {
            return Err(SaleError::NotAuthorized {
                caller: *caller,
                operation,
            });
        }
        Ok(())
    }

    fn require_not_finalized(&self, operation: &'static str) -> Result<(), SaleError> {
        if self.lifecycle.is_finalized() {
            return Err(SaleError::SaleFinalized(operation));
        }
        Ok(())
    }

    fn mark_cap_reached(&mut self, now: Timestamp, reason: &str) -> Result<(), SaleError> {
        self.lifecycle.reach_cap(now, reason)?;
        self.events.append(
            now,
            SaleEvent::CapReached {
                remainder_purchaser: self.remainder_purchaser,
                remainder_amount: self.remainder_amount,
            },
        );
        tracing::info!(
            sale_id = %self.config.sale_id,
            remainder_purchaser = ?self.remainder_purchaser,
            remainder_amount = %self.remainder_amount,
            "global cap reached"
        );
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────


#[cfg(test)]
mod proptests {
    use super::*;
    use presale_core::{ManualClock, SaleSchedule};
    use presale_registry::{Allowlist, Token};
    use proptest::prelude::*;

    const DAY: u64 = 86_400;

    fn at(secs: i64) -> Timestamp {
        Timestamp::from_epoch_secs(secs).unwrap()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn issued_never_exceeds_caps(
            cap in 1u64..5_000,
            holdings in prop::collection::vec(0u64..100, 3),
            steps in prop::collection::vec((0usize..3, 1u64..400, 0u64..8), 1..40),
        ) {
            let admin = Address::with_last_byte(0xa1);
            let sale_address = Address::with_last_byte(0xc5);
            let buyers: Vec<Address> = (1u8..=3).map(Address::with_last_byte).collect();
            let start = 1_800_000_000i64;
            let day = DAY as i64;
            let schedule = SaleSchedule::new(
                at(start),
                vec![at(start + 10 * day), at(start + 20 * day), at(start + 30 * day)],
            ).unwrap();
            let config = SaleConfig::new(
                admin,
                sale_address,
                Address::with_last_byte(0xf0),
                schedule,
                Rate::from_u64(3).unwrap(),
                U256::from(cap),
            ).unwrap();

            let clock = ManualClock::new(at(start));
            let allowlist = Arc::new(Allowlist::new(admin));
            allowlist.add_approved(&admin, &buyers).unwrap();
            let membership = Arc::new(Token::unpaused(admin));
            for (b, h) in buyers.iter().zip(&holdings) {
                membership.mint(&admin, b, U256::from(*h)).unwrap();
            }
            let token = Arc::new(Token::paused(admin));
            token.transfer_ownership(&admin, &sale_address).unwrap();

            let mut sale = Crowdsale::new(config, Collaborators {
                access: allowlist,
                holdings: membership.clone(),
                mint: token.clone(),
                clock: Arc::new(clock.clone()),
            }).unwrap();

            for (who, payment, days) in steps {
                clock.advance(days * DAY).unwrap();
                let b = buyers[who];
                let in_first_phase = sale.phase().index() == Some(1);
                if sale.buy_tokens(&b, &b, U256::from(payment)).is_ok() && in_first_phase {
                    let personal = sale.personal_cap_of(&b).unwrap();
                    prop_assert!(sale.purchased_in_first_phase(&b) <= personal);
                }
                prop_assert!(sale.tokens_issued() <= U256::from(cap));
                prop_assert_eq!(token.total_supply(), sale.tokens_issued());
            }
        }
    }
}
