//! # Phase Resolver
//!
//! Maps an instant onto the sale's phase. A pure function of the
//! schedule and the time input; it holds no state.
//!
//! ```text
//! Pending ──▶ Open(1) ──▶ Open(2) ──▶ … ──▶ Open(K) ──▶ Closed
//!             personal    holder              unrestricted
//!             cap         gated
//! ```
//!
//! With `K = 2` there is no holder-gated phase: the personal-cap phase is
//! followed directly by the unrestricted one.

use serde::{Deserialize, Serialize};

use presale_core::{SaleSchedule, Timestamp};

/// Admission rule applied during an open phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PhaseRule {
    /// Purchases are bounded by the investor's pro-rata personal cap.
    PersonalCap,
    /// Purchases require a positive membership balance.
    HolderGated,
    /// Only the allowlist and the global cap apply.
    Unrestricted,
}

impl std::fmt::Display for PhaseRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::PersonalCap => "PERSONAL_CAP",
            Self::HolderGated => "HOLDER_GATED",
            Self::Unrestricted => "UNRESTRICTED",
        };
        f.write_str(s)
    }
}

/// Where the sale stands in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SalePhase {
    /// Before `start_time`. Only premium pre-allocation is possible.
    Pending,
    /// Inside open phase `index` (1-based).
    Open {
        /// 1-based phase number.
        index: usize,
        /// Admission rule for this phase.
        rule: PhaseRule,
    },
    /// At or after `end_time`.
    Closed,
}

impl SalePhase {
    /// Whether purchases may be admitted at all.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open { .. })
    }

    /// The open phase number, if open.
    pub fn index(&self) -> Option<usize> {
        match self {
            Self::Open { index, .. } => Some(*index),
            _ => None,
        }
    }
}

impl std::fmt::Display for SalePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => f.write_str("PENDING"),
            Self::Open { index, rule } => write!(f, "OPEN_PHASE_{index} ({rule})"),
            Self::Closed => f.write_str("CLOSED"),
        }
    }
}

/// The admission rule of open phase `index` in a sale with `phase_count` open phases.
pub fn rule_for(index: usize, phase_count: usize) -> PhaseRule {
    if index <= 1 {
        PhaseRule::PersonalCap
    } else if index >= phase_count {
        PhaseRule::Unrestricted
    } else {
        PhaseRule::HolderGated
    }
}

/// Resolve the phase of `schedule` at `now`.
pub fn resolve_phase(schedule: &SaleSchedule, now: Timestamp) -> SalePhase {
    if now < schedule.start_time() {
        return SalePhase::Pending;
    }
    match schedule.open_phase_at(now) {
        Some(index) => SalePhase::Open {
            index,
            rule: rule_for(index, schedule.phase_count()),
        },
        None => SalePhase::Closed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> Timestamp {
        Timestamp::from_epoch_secs(secs).unwrap()
    }

    fn make_schedule(ends: &[i64]) -> SaleSchedule {
        SaleSchedule::new(at(1_000), ends.iter().map(|s| at(*s)).collect()).unwrap()
    }

    fn open_phase(index: usize, rule: PhaseRule) -> SalePhase {
        SalePhase::Open { index, rule }
    }

    #[test]
    fn test_three_phase_sale() {
        let s = make_schedule(&[2_000, 3_000, 4_000]);
        assert_eq!(resolve_phase(&s, at(999)), SalePhase::Pending);
        assert_eq!(resolve_phase(&s, at(1_000)), open_phase(1, PhaseRule::PersonalCap));
        assert_eq!(resolve_phase(&s, at(2_000)), open_phase(2, PhaseRule::HolderGated));
        assert_eq!(resolve_phase(&s, at(3_999)), open_phase(3, PhaseRule::Unrestricted));
        assert_eq!(resolve_phase(&s, at(4_000)), SalePhase::Closed);
    }

    #[test]
    fn test_two_phase_sale_has_no_holder_gate() {
        let s = make_schedule(&[2_000, 3_000]);
        assert_eq!(resolve_phase(&s, at(2_500)), open_phase(2, PhaseRule::Unrestricted));
    }

    #[test]
    fn test_four_phase_sale_has_two_holder_gated_phases() {
        let s = make_schedule(&[2_000, 3_000, 4_000, 5_000]);
        assert_eq!(resolve_phase(&s, at(2_000)).index(), Some(2));
        assert_eq!(rule_for(2, 4), PhaseRule::HolderGated);
        assert_eq!(rule_for(3, 4), PhaseRule::HolderGated);
        assert_eq!(rule_for(4, 4), PhaseRule::Unrestricted);
    }

    #[test]
    fn test_display() {
        assert_eq!(SalePhase::Pending.to_string(), "PENDING");
        assert_eq!(
            open_phase(2, PhaseRule::HolderGated).to_string(),
            "OPEN_PHASE_2 (HOLDER_GATED)"
        );
        assert!(!SalePhase::Closed.is_open());
    }

    #[test]
    fn test_serde_tagged() {
        let phase = open_phase(1, PhaseRule::PersonalCap);
        let json = serde_json::to_value(phase).unwrap();
        assert_eq!(json["phase"], "OPEN");
        assert_eq!(json["rule"], "PERSONAL_CAP");
        assert_eq!(serde_json::from_value::<SalePhase>(json).unwrap(), phase);
    }
}
