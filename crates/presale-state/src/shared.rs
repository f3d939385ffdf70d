//! # Shared Crowdsale Handle
//!
//! A cloneable handle that serializes every operation on one
//! [`Crowdsale`] behind a `parking_lot::Mutex`. Each call holds the lock
//! for its full duration, collaborator calls included, so concurrent
//! purchases are admitted one at a time in lock-acquisition order and the
//! global cap holds under contention.

use std::sync::Arc;

use parking_lot::Mutex;

use presale_core::{Address, U256};

use crate::error::SaleError;
use crate::sale::{Crowdsale, PurchaseReceipt, SaleSnapshot};

/// Thread-safe, cloneable handle to a [`Crowdsale`].
#[derive(Debug, Clone)]
pub struct SharedCrowdsale {
    inner: Arc<Mutex<Crowdsale>>,
}

impl SharedCrowdsale {
    /// Wrap a sale for shared use.
    pub fn new(sale: Crowdsale) -> Self {
        Self {
            inner: Arc::new(Mutex::new(sale)),
        }
    }

    /// See [`Crowdsale::buy_tokens`].
    pub fn buy_tokens(
        &self,
        caller: &Address,
        beneficiary: &Address,
        payment: U256,
    ) -> Result<PurchaseReceipt, SaleError> {
        self.inner.lock().buy_tokens(caller, beneficiary, payment)
    }

    /// See [`Crowdsale::allocate_to_premium_holder`].
    pub fn allocate_to_premium_holder(
        &self,
        caller: &Address,
        beneficiary: &Address,
        amount: U256,
    ) -> Result<(), SaleError> {
        self.inner
            .lock()
            .allocate_to_premium_holder(caller, beneficiary, amount)
    }

    /// See [`Crowdsale::set_rate`].
    pub fn set_rate(&self, caller: &Address, new_rate: U256) -> Result<(), SaleError> {
        self.inner.lock().set_rate(caller, new_rate)
    }

    /// See [`Crowdsale::pause`].
    pub fn pause(&self, caller: &Address) -> Result<(), SaleError> {
        self.inner.lock().pause(caller)
    }

    /// See [`Crowdsale::unpause`].
    pub fn unpause(&self, caller: &Address) -> Result<(), SaleError> {
        self.inner.lock().unpause(caller)
    }

    /// See [`Crowdsale::finalize`].
    pub fn finalize(&self, caller: &Address) -> Result<U256, SaleError> {
        self.inner.lock().finalize(caller)
    }

    /// Current state.
    pub fn snapshot(&self) -> SaleSnapshot {
        self.inner.lock().snapshot()
    }

    /// Run a read-only closure against the locked sale.
    pub fn read<R>(&self, f: impl FnOnce(&Crowdsale) -> R) -> R {
        f(&self.inner.lock())
    }
}
