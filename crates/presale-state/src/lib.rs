//! # presale-state — The Crowdsale State Machine
//!
//! Decides, for every purchase, whether it is admissible and how many
//! sale-token units it mints; enforces the personal and global caps;
//! records the remainder of a cap-exhausting purchase; and finalizes the
//! sale exactly once.
//!
//! ## Modules
//!
//! - **Phase** (`phase.rs`): pure resolver from an instant to
//!   `Pending`, `Open { index, rule }` or `Closed`.
//! - **Cap** (`cap.rs`): global-cap fill with partial-fill remainder,
//!   pro-rata personal cap, first-phase purchase ledger.
//! - **Lifecycle** (`lifecycle.rs`): `Open → CapReached → Finalized`
//!   latches with a transition log.
//! - **Events** (`events.rs`): sequence-numbered log of committed changes.
//! - **Sale** (`sale.rs`): the `Crowdsale` engine over injected collaborators.
//! - **Shared** (`shared.rs`): mutex-serialized handle for concurrent callers.
//!
//! ## Crate Policy
//!
//! - Failed operations leave no trace in state or in the event log.
//! - All arithmetic is checked 256-bit; divisions round toward zero.
//! - No `.unwrap()` outside tests.

pub mod cap;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod phase;
pub mod sale;
pub mod shared;

pub use cap::{compute_fill, personal_cap, FirstPhaseLedger, Fill};
pub use error::{SaleError, SaleErrorKind};
pub use events::{EventLog, EventRecord, SaleEvent};
pub use lifecycle::{LifecycleError, LifecycleState, LifecycleTransitionRecord, SaleLifecycle};
pub use phase::{resolve_phase, rule_for, PhaseRule, SalePhase};
pub use sale::{Collaborators, Crowdsale, PurchaseReceipt, SaleSnapshot};
pub use shared::SharedCrowdsale;
