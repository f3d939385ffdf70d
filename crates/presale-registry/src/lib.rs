//! # presale-registry — Collaborators of the Sale Engine
//!
//! Defines the trait seams through which the sale engine consults its
//! collaborators, and the in-process implementations used by the CLI and
//! by tests:
//!
//! - [`AccessOracle`], implemented by [`Allowlist`].
//! - [`HoldingOracle`], implemented by [`Token`] acting as the membership token.
//! - [`MintSink`], implemented by [`Token`] acting as the sale token.
//!
//! ## Crate Policy
//!
//! - Depends only on `presale-core` internally.
//! - Every mutation is authorized against the registry's owner.
//! - No `.unwrap()` outside tests.

pub mod allowlist;
pub mod error;
pub mod token;
pub mod traits;

pub use allowlist::{Allowlist, AllowlistAction, AllowlistUpdate};
pub use error::RegistryError;
pub use token::Token;
pub use traits::{AccessOracle, HoldingOracle, MintError, MintSink};
