//! # Sale Lifecycle
//!
//! The one-way latches of a sale as an explicit state enum with a
//! transition log.
//!
//! ```text
//! Open ──▶ CapReached ──▶ Finalized (terminal)
//!   │                        ▲
//!   └────────────────────────┘
//! ```
//!
//! `CapReached` is entered by whichever issuance brings `tokens_issued`
//! to the global cap. No transition leaves `Finalized`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use presale_core::Timestamp;

// ─── Lifecycle State ─────────────────────────────────────────────────

/// Lifecycle state of a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleState {
    /// Accepting issuance while headroom remains.
    Open,
    /// The global cap has been issued; awaiting finalization.
    CapReached,
    /// Finalized (terminal).
    Finalized,
}

impl LifecycleState {
    /// Whether this state is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finalized)
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Open => "OPEN",
            Self::CapReached => "CAP_REACHED",
            Self::Finalized => "FINALIZED",
        };
        f.write_str(s)
    }
}

// ─── Errors ──────────────────────────────────────────────────────────

/// Errors from lifecycle transitions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    /// Attempted transition is not valid from the current state.
    #[error("invalid sale transition: {from} -> {to}")]
    InvalidTransition {
        /// Current state.
        from: LifecycleState,
        /// Attempted target state.
        to: LifecycleState,
    },

    /// The sale is in a terminal state.
    #[error("sale is in terminal state {0}")]
    TerminalState(LifecycleState),
}

/// Record of a lifecycle transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleTransitionRecord {
    /// State before the transition.
    pub from_state: LifecycleState,
    /// State after the transition.
    pub to_state: LifecycleState,
    /// When the transition occurred.
    pub timestamp: Timestamp,
    /// Reason for the transition.
    pub reason: String,
}

// ─── Lifecycle ───────────────────────────────────────────────────────

/// Current lifecycle state and the ordered history that led to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLifecycle {
    state: LifecycleState,
    transitions: Vec<LifecycleTransitionRecord>,
}

impl Default for SaleLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl SaleLifecycle {
    /// A fresh lifecycle in `Open`.
    pub fn new() -> Self {
        Self {
            state: LifecycleState::Open,
            transitions: Vec::new(),
        }
    }

    /// Current state.
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Ordered transition log.
    pub fn transitions(&self) -> &[LifecycleTransitionRecord] {
        &self.transitions
    }

    /// Whether the cap-reached latch has been set, including after finalization.
    pub fn cap_reached(&self) -> bool {
        self.state == LifecycleState::CapReached
            || self
                .transitions
                .iter()
                .any(|t| t.to_state == LifecycleState::CapReached)
    }

    /// Whether the sale is finalized.
    pub fn is_finalized(&self) -> bool {
        self.state.is_terminal()
    }

    /// OPEN → CAP_REACHED.
    pub fn reach_cap(&mut self, at: Timestamp, reason: &str) -> Result<(), LifecycleError> {
        self.require_state(LifecycleState::Open, LifecycleState::CapReached)?;
        self.do_transition(LifecycleState::CapReached, at, reason);
        Ok(())
    }

    /// OPEN or CAP_REACHED → FINALIZED.
    pub fn finalize(&mut self, at: Timestamp, reason: &str) -> Result<(), LifecycleError> {
        if self.state.is_terminal() {
            return Err(LifecycleError::TerminalState(self.state));
        }
        self.do_transition(LifecycleState::Finalized, at, reason);
        Ok(())
    }

    fn require_state(
        &self,
        expected: LifecycleState,
        target: LifecycleState,
    ) -> Result<(), LifecycleError> {
        if self.state.is_terminal() {
            return Err(LifecycleError::TerminalState(self.state));
        }
        if self.state != expected {
            return Err(LifecycleError::InvalidTransition {
                from: self.state,
                to: target,
            });
        }
        Ok(())
    }

    fn do_transition(&mut self, to: LifecycleState, at: Timestamp, reason: &str) {
        self.transitions.push(LifecycleTransitionRecord {
            from_state: self.state,
            to_state: to,
            timestamp: at,
            reason: reason.to_string(),
        });
        self.state = to;
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
