//! # presale-core — Foundational Types for the Phased Presale Engine
//!
//! The leaf of the workspace DAG. Every other `presale-*` crate depends on
//! this one; it depends on nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **256-bit amounts.** Token and payment quantities are `U256`. Pro-rata
//!    products (`global_cap * balance`) stay exact where `u128` overflows.
//!
//! 2. **Unrepresentable invalid states.** `Rate` cannot be zero and a
//!    `SaleSchedule` cannot hold unordered boundaries; both are validated
//!    at construction and on deserialization.
//!
//! 3. **Time is an input.** The engine reads the current instant through
//!    the `Clock` trait and never advances it.
//!
//! 4. **UTC-only timestamps.** `Timestamp` is seconds precision with a `Z`
//!    suffix on the wire.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `presale-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod amount;
pub mod config;
pub mod error;
pub mod identity;
pub mod schedule;
pub mod temporal;

// Re-export primary types for ergonomic imports.
pub use amount::{mul_div_floor, parse_amount, Rate, U256};
pub use config::{ConfigError, SaleConfig};
pub use error::CoreError;
pub use identity::{parse_address, Address, PurchaseId, SaleId};
pub use schedule::SaleSchedule;
pub use temporal::{Clock, ManualClock, SystemClock, Timestamp};
