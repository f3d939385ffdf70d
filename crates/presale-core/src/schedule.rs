//! # Sale Schedule — Phase Boundaries
//!
//! The time boundaries of a phased sale: `start_time` followed by `K ≥ 2`
//! strictly increasing phase ends, the last of which is `end_time`.
//!
//! ```text
//! start_time ──▶ phase_ends[0] ──▶ phase_ends[1] ──▶ … ──▶ phase_ends[K-1] = end_time
//!     │  open phase 1  │   open phase 2  │        …       │  open phase K  │
//! ```
//!
//! Open phase `i` (1-based) covers `[previous boundary, phase_ends[i-1])`.
//! A schedule is validated at construction and immutable afterwards, so
//! every consumer can rely on the ordering invariant without re-checking.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::temporal::Timestamp;

/// Minimum number of open phases: a gated first phase and an open final phase.
pub const MIN_OPEN_PHASES: usize = 2;

/// Validated phase boundaries of a sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawSchedule", into = "RawSchedule")]
pub struct SaleSchedule {
    start_time: Timestamp,
    phase_ends: Vec<Timestamp>,
}

#[derive(Serialize, Deserialize)]
struct RawSchedule {
    start_time: Timestamp,
    phase_ends: Vec<Timestamp>,
}

impl SaleSchedule {
    /// Build a schedule, enforcing strictly increasing boundaries.
    pub fn new(start_time: Timestamp, phase_ends: Vec<Timestamp>) -> Result<Self, CoreError> {
        if phase_ends.len() < MIN_OPEN_PHASES {
            return Err(CoreError::InvalidSchedule(format!(
                "at least {MIN_OPEN_PHASES} phase ends are required, got {}",
                phase_ends.len()
            )));
        }
        let mut previous = start_time;
        for (i, end) in phase_ends.iter().enumerate() {
            if *end <= previous {
                return Err(CoreError::InvalidSchedule(format!(
                    "phase {} ends at {end}, not after preceding boundary {previous}",
                    i + 1
                )));
            }
            previous = *end;
        }
        Ok(Self {
            start_time,
            phase_ends,
        })
    }

    /// When the first open phase begins.
    pub fn start_time(&self) -> Timestamp {
        self.start_time
    }

    /// When the final open phase ends and the sale closes.
    pub fn end_time(&self) -> Timestamp {
        // Non-empty by construction.
        self.phase_ends[self.phase_ends.len() - 1]
    }

    /// Number of open phases (`K`).
    pub fn phase_count(&self) -> usize {
        self.phase_ends.len()
    }

    /// All phase end boundaries, in order.
    pub fn phase_ends(&self) -> &[Timestamp] {
        &self.phase_ends
    }

    /// The `[begin, end)` window of open phase `index` (1-based).
    pub fn window(&self, index: usize) -> Option<(Timestamp, Timestamp)> {
        if index == 0 || index > self.phase_ends.len() {
            return None;
        }
        let begin = if index == 1 {
            self.start_time
        } else {
            self.phase_ends[index - 2]
        };
        Some((begin, self.phase_ends[index - 1]))
    }

    /// The 1-based open phase containing `now`, or `None` outside
    /// `[start_time, end_time)`.
    pub fn open_phase_at(&self, now: Timestamp) -> Option<usize> {
        if now < self.start_time {
            return None;
        }
        self.phase_ends
            .iter()
            .position(|end| now < *end)
            .map(|i| i + 1)
    }
}

impl TryFrom<RawSchedule> for SaleSchedule {
    type Error = CoreError;

    fn try_from(raw: RawSchedule) -> Result<Self, Self::Error> {
        Self::new(raw.start_time, raw.phase_ends)
    }
}

impl From<SaleSchedule> for RawSchedule {
    fn from(s: SaleSchedule) -> Self {
        Self {
            start_time: s.start_time,
            phase_ends: s.phase_ends,
        }
    }
}
